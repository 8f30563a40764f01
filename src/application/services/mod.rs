pub mod action_queue;
pub mod dead_letter_box;
pub mod network_monitor;
pub mod offline_gateway;
pub mod overlay;
pub mod realtime_reconciler;
pub mod result_cache;
pub mod sync_orchestrator;

pub use action_queue::ActionQueue;
pub use dead_letter_box::DeadLetterBox;
pub use network_monitor::{NetworkMonitor, SubscriptionId};
pub use offline_gateway::{OfflineGateway, SubmitOutcome};
pub use overlay::{overlay_pending, ObservedRecord};
pub use realtime_reconciler::{CollectionSpec, RealtimeReconciler};
pub use result_cache::ResultCache;
pub use sync_orchestrator::SyncOrchestrator;
