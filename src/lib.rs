pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
mod state;

pub use application::ports::{
    ActionDispatcher, ActionExecutor, ChangeFeed, ChangeFilter, ExecutionError, KeyValueStore,
    NetworkProbe,
};
pub use application::services::{
    ActionQueue, CollectionSpec, DeadLetterBox, NetworkMonitor, ObservedRecord, OfflineGateway,
    RealtimeReconciler, ResultCache, SubmitOutcome, SyncOrchestrator,
};
pub use state::OfflineRuntime;

/// ログ設定の初期化
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logging() -> bool {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pickup_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
