pub mod action_id;
pub mod action_type;
pub mod cache_key;
pub mod payload;

pub use action_id::ActionId;
pub use action_type::ActionType;
pub use cache_key::CacheKey;
pub use payload::ActionPayload;
