use crate::domain::entities::ProbeReading;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Platform connectivity plus backend reachability check, on demand.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn probe(&self) -> Result<ProbeReading, AppError>;
}
