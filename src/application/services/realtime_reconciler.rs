use crate::application::ports::change_feed::{ChangeFeed, ChangeFilter};
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::overlay::{overlay_pending, ObservedRecord};
use crate::application::services::result_cache::ResultCache;
use crate::domain::entities::change_event::id_to_string;
use crate::domain::entities::{ChangeEvent, ChangeKind};
use crate::shared::error::AppError;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

pub type RecordPredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One locally observed server collection.
#[derive(Clone)]
pub struct CollectionSpec {
    pub name: String,
    pub feed_filter: ChangeFilter,
    pub id_field: String,
    pub cache_key: Option<String>,
    predicate: Option<RecordPredicate>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, feed_filter: ChangeFilter) -> Self {
        Self {
            name: name.into(),
            feed_filter,
            id_field: "id".to_string(),
            cache_key: None,
            predicate: None,
        }
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Snapshot is mirrored into the result cache under this key.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Extra membership rule on top of the feed filter, e.g. `status != "cancelled"`.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.feed_filter.entity_type
    }

    pub fn matches(&self, record: &Value) -> bool {
        if let (Some(column), Some(expected)) =
            (&self.feed_filter.column, &self.feed_filter.equals)
        {
            let actual = record.get(column).and_then(id_to_string);
            if actual.as_deref() != Some(expected.as_str()) {
                return false;
            }
        }
        self.predicate
            .as_ref()
            .map_or(true, |predicate| predicate(record))
    }
}

impl fmt::Debug for CollectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSpec")
            .field("name", &self.name)
            .field("feed_filter", &self.feed_filter)
            .field("id_field", &self.id_field)
            .field("cache_key", &self.cache_key)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

struct ObservedCollection {
    spec: CollectionSpec,
    // arrival order
    records: Vec<(String, Value)>,
}

impl ObservedCollection {
    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|(existing, _)| existing == id)
    }

    fn upsert(&mut self, id: String, record: Value) {
        match self.position(&id) {
            Some(index) => self.records[index].1 = record,
            None => self.records.push((id, record)),
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.records.remove(index);
                true
            }
            None => false,
        }
    }

    fn values(&self) -> Vec<Value> {
        self.records.iter().map(|(_, record)| record.clone()).collect()
    }

    /// Returns whether the local list changed.
    fn apply(&mut self, event: &ChangeEvent) -> bool {
        let Some(id) = event.record_id(&self.spec.id_field) else {
            tracing::warn!(
                target: "offline::realtime",
                collection = %self.spec.name,
                kind = ?event.kind,
                "change event without record id ignored"
            );
            return false;
        };

        match (event.kind, event.new_record.as_ref()) {
            (ChangeKind::Delete, _) => self.remove(&id),
            (_, Some(record)) if self.spec.matches(record) => {
                self.upsert(id, record.clone());
                true
            }
            // moved out of the filter, or an insert we never cared about
            (_, Some(_)) => self.remove(&id),
            (_, None) => false,
        }
    }
}

/// サーバーの変更通知をローカルの一覧へ反映する
///
/// Events are applied to whatever list is held when they arrive. A missed
/// event is only healed by the next [`replace_snapshot`](Self::replace_snapshot).
pub struct RealtimeReconciler {
    collections: RwLock<HashMap<String, ObservedCollection>>,
    cache: Option<Arc<ResultCache>>,
}

impl RealtimeReconciler {
    pub fn new(cache: Option<Arc<ResultCache>>) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            cache,
        }
    }

    pub async fn register(&self, spec: CollectionSpec) -> Result<(), AppError> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&spec.name) {
            return Err(AppError::InvalidInput(format!(
                "collection {} is already registered",
                spec.name
            )));
        }
        collections.insert(
            spec.name.clone(),
            ObservedCollection {
                spec,
                records: Vec::new(),
            },
        );
        Ok(())
    }

    pub async fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Installs the result of a full fetch. Records without an id are dropped.
    pub async fn replace_snapshot(
        &self,
        collection: &str,
        records: Vec<Value>,
    ) -> Result<usize, AppError> {
        // cache mirrors are written in the same order as the lists they copy
        let mut collections = self.collections.write().await;
        let observed = collections
            .get_mut(collection)
            .ok_or_else(|| AppError::NotFound(format!("collection {collection}")))?;

        let id_field = observed.spec.id_field.clone();
        observed.records = records
            .into_iter()
            .filter_map(|record| {
                let id = record.get(&id_field).and_then(id_to_string)?;
                Some((id, record))
            })
            .collect();

        let count = observed.records.len();
        if let Some(key) = observed.spec.cache_key.clone() {
            self.mirror(&key, observed.values()).await;
        }
        Ok(count)
    }

    /// Applies one event to every collection observing its entity type.
    /// Returns how many collections changed.
    pub async fn apply(&self, event: &ChangeEvent) -> usize {
        let mut changed = 0;
        let mut collections = self.collections.write().await;
        for observed in collections
            .values_mut()
            .filter(|observed| observed.spec.entity_type() == event.entity_type)
        {
            if !observed.apply(event) {
                continue;
            }
            changed += 1;
            if let Some(key) = observed.spec.cache_key.as_deref() {
                self.mirror(key, observed.values()).await;
            }
        }
        drop(collections);

        if changed > 0 {
            tracing::debug!(
                target: "offline::realtime",
                entity_type = %event.entity_type,
                kind = ?event.kind,
                changed,
                "change event applied"
            );
        }
        changed
    }

    pub async fn snapshot(&self, collection: &str) -> Option<Vec<Value>> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(ObservedCollection::values)
    }

    /// Server view with queued actions layered on top.
    pub async fn observe(
        &self,
        collection: &str,
        queue: &ActionQueue,
    ) -> Result<Vec<ObservedRecord>, AppError> {
        let (snapshot, id_field) = {
            let collections = self.collections.read().await;
            let observed = collections
                .get(collection)
                .ok_or_else(|| AppError::NotFound(format!("collection {collection}")))?;
            (observed.values(), observed.spec.id_field.clone())
        };
        let pending = queue.pending_for_collection(collection).await;
        Ok(overlay_pending(&snapshot, &pending, collection, &id_field))
    }

    /// Forgets every held list, e.g. on sign-out. Registrations stay.
    pub async fn reset(&self) {
        for observed in self.collections.write().await.values_mut() {
            observed.records.clear();
        }
    }

    /// Subscribes to the feed for one registered collection and applies
    /// events in the background until the feed closes.
    pub async fn attach(
        self: &Arc<Self>,
        collection: &str,
        feed: &dyn ChangeFeed,
    ) -> Result<JoinHandle<()>, AppError> {
        let filter = self
            .collections
            .read()
            .await
            .get(collection)
            .map(|observed| observed.spec.feed_filter.clone())
            .ok_or_else(|| AppError::NotFound(format!("collection {collection}")))?;
        let events = feed.subscribe(filter).await?;
        Ok(self.spawn_feed(events))
    }

    pub fn spawn_feed(self: &Arc<Self>, events: mpsc::Receiver<ChangeEvent>) -> JoinHandle<()> {
        let stream = stream::unfold(events, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        });
        self.spawn_stream(stream)
    }

    pub fn spawn_stream<S>(self: &Arc<Self>, events: S) -> JoinHandle<()>
    where
        S: Stream<Item = ChangeEvent> + Send + 'static,
    {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            let mut events = Box::pin(events);
            while let Some(event) = events.next().await {
                reconciler.apply(&event).await;
            }
            tracing::debug!(target: "offline::realtime", "change feed closed");
        })
    }

    async fn mirror(&self, key: &str, values: Vec<Value>) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        if let Err(err) = cache.put(key, Value::Array(values)).await {
            tracing::warn!(
                target: "offline::realtime",
                cache_key = key,
                error = %err,
                "failed to mirror collection into result cache"
            );
        }
    }
}
