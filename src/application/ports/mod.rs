pub mod action_executor;
pub mod change_feed;
pub mod key_value_store;
pub mod network_probe;
pub mod sync_trigger;

pub use action_executor::{ActionDispatcher, ActionExecutor, ExecutionError};
pub use change_feed::{ChangeFeed, ChangeFilter};
pub use key_value_store::KeyValueStore;
pub use network_probe::NetworkProbe;
pub use sync_trigger::SyncTrigger;
