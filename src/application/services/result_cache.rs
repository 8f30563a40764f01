use crate::application::ports::key_value_store::KeyValueStore;
use crate::domain::entities::{CacheEntry, CachedResult};
use crate::domain::value_objects::CacheKey;
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub const DEFAULT_MAX_AGE_MINUTES: i64 = 30;

/// 最後に取得できたクエリ結果のキャッシュ
///
/// Entries are replaced wholesale per key and never evicted for being old;
/// staleness is only reported. Writers are serialized by `write_gate` and swap
/// the map in after the store accepted it, so readers are never held up by
/// store I/O.
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    clock: Arc<dyn Clock>,
    max_age_minutes: i64,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    write_gate: Mutex<()>,
}

impl ResultCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        storage_key: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            storage_key: storage_key.into(),
            clock,
            max_age_minutes: DEFAULT_MAX_AGE_MINUTES,
            entries: RwLock::new(HashMap::new()),
            write_gate: Mutex::new(()),
        }
    }

    /// [`entry`](Self::entry) と [`needs_refresh`](Self::needs_refresh) が使う既定の鮮度
    pub fn with_max_age(mut self, max_age_minutes: i64) -> Self {
        self.max_age_minutes = max_age_minutes;
        self
    }

    pub fn max_age_minutes(&self) -> i64 {
        self.max_age_minutes
    }

    pub async fn load_from_store(&self) -> Result<usize, AppError> {
        let _gate = self.write_gate.lock().await;
        let loaded = match self.store.get(&self.storage_key).await? {
            Some(bytes) => serde_json::from_slice::<HashMap<CacheKey, CacheEntry>>(&bytes)
                .map_err(|err| {
                    AppError::DeserializationError(format!("result cache is unreadable: {err}"))
                })?,
            None => HashMap::new(),
        };
        let count = loaded.len();
        *self.entries.write().await = loaded;
        Ok(count)
    }

    /// キャッシュを丸ごと差し替え
    pub async fn put(&self, key: &str, data: Value) -> Result<(), AppError> {
        let key = CacheKey::new(key.to_string()).map_err(AppError::ValidationError)?;
        let entry = CacheEntry::new(key.clone(), data, self.clock.now());

        let _gate = self.write_gate.lock().await;
        let mut next = self.entries.read().await.clone();
        next.insert(key, entry);
        self.persist(next).await
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.lookup(key).await.map(|entry| entry.data)
    }

    /// Cached data plus a staleness flag the UI may choose to surface.
    pub async fn get_entry(&self, key: &str, max_age_minutes: i64) -> Option<CachedResult> {
        let now = self.clock.now();
        self.lookup(key).await.map(|entry| CachedResult {
            is_stale: is_expired(&entry, max_age_minutes, now),
            cached_at: entry.cached_at,
            data: entry.data,
        })
    }

    /// True when nothing is cached for `key` or the entry is older than `max_age_minutes`.
    /// A window too large to represent never expires.
    pub async fn is_stale(&self, key: &str, max_age_minutes: i64) -> bool {
        match self.lookup(key).await {
            Some(entry) => is_expired(&entry, max_age_minutes, self.clock.now()),
            None => true,
        }
    }

    /// [`get_entry`](Self::get_entry) with the configured window.
    pub async fn entry(&self, key: &str) -> Option<CachedResult> {
        self.get_entry(key, self.max_age_minutes).await
    }

    /// [`is_stale`](Self::is_stale) with the configured window.
    pub async fn needs_refresh(&self, key: &str) -> bool {
        self.is_stale(key, self.max_age_minutes).await
    }

    pub async fn remove(&self, key: &str) -> Result<bool, AppError> {
        let Ok(key) = CacheKey::new(key.to_string()) else {
            return Ok(false);
        };
        let _gate = self.write_gate.lock().await;
        let mut next = self.entries.read().await.clone();
        if next.remove(&key).is_none() {
            return Ok(false);
        }
        self.persist(next).await?;
        Ok(true)
    }

    pub async fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Drops every entry, e.g. on logout.
    pub async fn clear(&self) -> Result<(), AppError> {
        let _gate = self.write_gate.lock().await;
        self.store.remove(&self.storage_key).await?;
        self.entries.write().await.clear();
        tracing::debug!(target: "offline::cache", "result cache cleared");
        Ok(())
    }

    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let key = CacheKey::new(key.to_string()).ok()?;
        self.entries.read().await.get(&key).cloned()
    }

    async fn persist(&self, next: HashMap<CacheKey, CacheEntry>) -> Result<(), AppError> {
        let encoded = serde_json::to_vec(&next)
            .map_err(|err| AppError::SerializationError(err.to_string()))?;
        self.store
            .set(&self.storage_key, Bytes::from(encoded))
            .await?;
        *self.entries.write().await = next;
        Ok(())
    }
}

fn is_expired(entry: &CacheEntry, max_age_minutes: i64, now: DateTime<Utc>) -> bool {
    match Duration::try_minutes(max_age_minutes) {
        Some(max_age) => entry.is_older_than(max_age, now),
        None => false,
    }
}
