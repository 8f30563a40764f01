pub mod cache_entry;
pub mod change_event;
pub mod dead_letter;
pub mod network_state;
pub mod offline_action;
pub mod sync_result;

pub use cache_entry::{CacheEntry, CachedResult};
pub use change_event::{ChangeEvent, ChangeKind};
pub use dead_letter::{DeadLetter, DropReason};
pub use network_state::{NetworkState, ProbeReading};
pub use offline_action::{ActionMetadata, ActionTarget, OfflineAction, TargetEffect};
pub use sync_result::{DrainOutcome, DrainReport, ManualSyncResult, SyncEvent};
