use crate::application::ports::action_executor::ActionDispatcher;
use crate::application::ports::key_value_store::KeyValueStore;
use crate::application::ports::network_probe::NetworkProbe;
use crate::application::services::{
    ActionQueue, DeadLetterBox, NetworkMonitor, OfflineGateway, RealtimeReconciler, ResultCache,
    SyncOrchestrator,
};
use crate::domain::entities::ProbeReading;
use crate::infrastructure::storage::SqliteKeyValueStore;
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// オフライン同期レイヤー全体の状態
#[derive(Clone)]
pub struct OfflineRuntime {
    pub config: AppConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub monitor: Arc<NetworkMonitor>,
    pub queue: Arc<ActionQueue>,
    pub cache: Arc<ResultCache>,
    pub dead_letters: Arc<DeadLetterBox>,
    pub dispatcher: Arc<ActionDispatcher>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub gateway: Arc<OfflineGateway>,
    pub reconciler: Arc<RealtimeReconciler>,
}

impl OfflineRuntime {
    /// Opens the configured sqlite store and restores persisted state from it.
    pub async fn initialize(
        config: AppConfig,
        probe: Arc<dyn NetworkProbe>,
        dispatcher: Arc<ActionDispatcher>,
    ) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;
        let store = Arc::new(SqliteKeyValueStore::connect(&config.storage).await?);
        Self::with_store(config, store, Arc::new(SystemClock), probe, dispatcher).await
    }

    pub async fn with_store(
        config: AppConfig,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        probe: Arc<dyn NetworkProbe>,
        dispatcher: Arc<ActionDispatcher>,
    ) -> Result<Self, AppError> {
        config.validate().map_err(AppError::ConfigurationError)?;

        let queue = Arc::new(ActionQueue::new(
            Arc::clone(&store),
            config.storage.queue_key.clone(),
            Arc::clone(&clock),
        ));
        let cache = Arc::new(
            ResultCache::new(
                Arc::clone(&store),
                config.storage.cache_key.clone(),
                Arc::clone(&clock),
            )
            .with_max_age(config.cache.max_age_minutes),
        );
        let dead_letters = Arc::new(DeadLetterBox::new(
            Arc::clone(&store),
            config.storage.dead_letter_key.clone(),
            clock,
        ));

        let queued = queue.load_from_store().await?;
        let cached = cache.load_from_store().await?;
        let dropped = dead_letters.load_from_store().await?;
        tracing::info!(
            target: "offline::runtime",
            queued,
            cached,
            dropped,
            "offline state restored"
        );

        let monitor = Arc::new(NetworkMonitor::new(probe));
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&monitor),
            Arc::clone(&queue),
            Arc::clone(&dead_letters),
            Arc::clone(&dispatcher),
            &config.sync,
        );
        let gateway = Arc::new(OfflineGateway::new(
            Arc::clone(&monitor),
            Arc::clone(&queue),
            Arc::clone(&dispatcher),
        ));
        let reconciler = Arc::new(RealtimeReconciler::new(Some(Arc::clone(&cache))));

        Ok(Self {
            config,
            store,
            monitor,
            queue,
            cache,
            dead_letters,
            dispatcher,
            orchestrator,
            gateway,
            reconciler,
        })
    }

    /// Channel for the platform's connectivity callbacks, sized from config.
    pub fn platform_channel(&self) -> (mpsc::Sender<ProbeReading>, mpsc::Receiver<ProbeReading>) {
        mpsc::channel(self.config.network.event_buffer)
    }

    /// Takes a first reading, then keeps the monitor fed. With `auto_sync`
    /// a non-empty queue starts draining as soon as the device is online.
    pub async fn start(
        &self,
        platform_events: Option<mpsc::Receiver<ProbeReading>>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        self.monitor.refresh().await;
        if let Some(events) = platform_events {
            handles.push(self.monitor.spawn_listener(events));
        }
        let every = Duration::from_secs(self.config.network.probe_interval_secs);
        handles.push(self.monitor.spawn_probe_loop(every));
        handles
    }

    /// ログアウト時に端末上のデータを破棄
    pub async fn logout(&self) -> Result<(), AppError> {
        let discarded = self.queue.clear().await?;
        self.dead_letters.clear().await?;
        self.cache.clear().await?;
        self.reconciler.reset().await;
        tracing::info!(target: "offline::runtime", discarded, "local offline data cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{ActionPayload, ActionType};
    use crate::infrastructure::storage::MemoryKeyValueStore;
    use async_trait::async_trait;
    use serde_json::json;

    struct StaticProbe(ProbeReading);

    #[async_trait]
    impl NetworkProbe for StaticProbe {
        async fn probe(&self) -> Result<ProbeReading, AppError> {
            Ok(self.0)
        }
    }

    async fn runtime(store: Arc<dyn KeyValueStore>, reading: ProbeReading) -> OfflineRuntime {
        OfflineRuntime::with_store(
            AppConfig::default(),
            store,
            Arc::new(SystemClock),
            Arc::new(StaticProbe(reading)),
            Arc::new(ActionDispatcher::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_restores_queue_from_shared_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let first = runtime(Arc::clone(&store), ProbeReading::offline()).await;
        first
            .queue
            .enqueue(
                ActionType::SendMessage,
                ActionPayload::new(json!({"body": "hello"})).unwrap(),
                None,
            )
            .await
            .unwrap();
        first.cache.put("requests", json!([])).await.unwrap();

        let second = runtime(store, ProbeReading::offline()).await;
        assert_eq!(second.queue.len().await, 1);
        assert!(second.cache.get("requests").await.is_some());
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let state = runtime(Arc::new(MemoryKeyValueStore::new()), ProbeReading::offline()).await;
        state
            .queue
            .enqueue(
                ActionType::UpdateProfile,
                ActionPayload::new(json!({"name": "n"})).unwrap(),
                None,
            )
            .await
            .unwrap();
        state.cache.put("profile", json!({"name": "n"})).await.unwrap();

        state.logout().await.unwrap();

        assert!(state.queue.is_empty().await);
        assert!(state.cache.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = AppConfig::default();
        config.sync.max_attempts = 0;
        let result = OfflineRuntime::with_store(
            config,
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(SystemClock),
            Arc::new(StaticProbe(ProbeReading::offline())),
            Arc::new(ActionDispatcher::new()),
        )
        .await;
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_cache_window_comes_from_config() {
        let mut config = AppConfig::default();
        config.cache.max_age_minutes = 10;
        let clock = crate::shared::clock::ManualClock::default();
        let state = OfflineRuntime::with_store(
            config,
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(clock.clone()),
            Arc::new(StaticProbe(ProbeReading::offline())),
            Arc::new(ActionDispatcher::new()),
        )
        .await
        .unwrap();
        assert_eq!(state.cache.max_age_minutes(), 10);

        state.cache.put("requests", json!([])).await.unwrap();
        clock.advance(chrono::Duration::minutes(10));
        assert!(!state.cache.needs_refresh("requests").await);
        clock.advance(chrono::Duration::minutes(1));
        assert!(state.cache.needs_refresh("requests").await);
    }

    #[tokio::test]
    async fn test_start_takes_first_reading() {
        let state = runtime(Arc::new(MemoryKeyValueStore::new()), ProbeReading::online()).await;
        let (_tx, rx) = state.platform_channel();
        let handles = state.start(Some(rx)).await;
        assert!(state.monitor.is_online());
        assert_eq!(handles.len(), 2);
        for handle in handles {
            handle.abort();
        }
    }
}
