use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;

/// 永続キーバリューストアのポート
///
/// Writes are atomic per key. A returned `Ok` from `set`/`remove` is the
/// durability boundary callers rely on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError>;
    async fn set(&self, key: &str, value: Bytes) -> Result<(), AppError>;
    async fn remove(&self, key: &str) -> Result<(), AppError>;
}
