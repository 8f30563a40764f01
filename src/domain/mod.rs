pub mod entities;
pub mod value_objects;

pub use entities::{ChangeEvent, NetworkState, OfflineAction};
pub use value_objects::{ActionId, ActionPayload, ActionType, CacheKey};
