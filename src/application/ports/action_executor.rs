use crate::domain::value_objects::{ActionPayload, ActionType};
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// Network blip, server 5xx, timeout. Worth retrying.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Validation or authorization failure. Retrying cannot succeed.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl ExecutionError {
    pub fn transient(message: impl Into<String>) -> Self {
        ExecutionError::Transient(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ExecutionError::Rejected(message.into())
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, ExecutionError::Rejected(_))
    }
}

impl From<anyhow::Error> for ExecutionError {
    fn from(err: anyhow::Error) -> Self {
        ExecutionError::Transient(err.to_string())
    }
}

impl From<AppError> for ExecutionError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::ValidationError(msg) | AppError::InvalidInput(msg) => {
                ExecutionError::Rejected(msg)
            }
            other => ExecutionError::Transient(other.to_string()),
        }
    }
}

impl From<ExecutionError> for AppError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Rejected(msg) => AppError::ValidationError(msg),
            ExecutionError::Transient(msg) => AppError::Execution(msg),
        }
    }
}

/// バックエンドに対して実際にミューテーションを行う実行器
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, payload: &ActionPayload) -> Result<Value, ExecutionError>;
}

struct FnExecutor<F>(F);

#[async_trait]
impl<F, Fut> ActionExecutor for FnExecutor<F>
where
    F: Fn(ActionPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ExecutionError>> + Send + 'static,
{
    async fn execute(&self, payload: &ActionPayload) -> Result<Value, ExecutionError> {
        (self.0)(payload.clone()).await
    }
}

/// Registry from action type to the executor supplied by the business layer.
#[derive(Default)]
pub struct ActionDispatcher {
    executors: RwLock<HashMap<ActionType, Arc<dyn ActionExecutor>>>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the executor for `action_type`.
    pub fn register(
        &self,
        action_type: ActionType,
        executor: Arc<dyn ActionExecutor>,
    ) -> Result<(), AppError> {
        if !action_type.is_known() {
            return Err(AppError::InvalidInput(format!(
                "Cannot register executor for unknown action type '{action_type}'"
            )));
        }

        let mut executors = self
            .executors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if executors.insert(action_type.clone(), executor).is_some() {
            tracing::debug!(
                target: "offline::dispatch",
                action_type = %action_type,
                "replaced registered executor"
            );
        }
        Ok(())
    }

    pub fn register_fn<F, Fut>(&self, action_type: ActionType, f: F) -> Result<(), AppError>
    where
        F: Fn(ActionPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ExecutionError>> + Send + 'static,
    {
        self.register(action_type, Arc::new(FnExecutor(f)))
    }

    pub fn executor_for(&self, action_type: &ActionType) -> Option<Arc<dyn ActionExecutor>> {
        if !action_type.is_known() {
            return None;
        }
        self.executors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(action_type)
            .cloned()
    }

    pub fn is_registered(&self, action_type: &ActionType) -> bool {
        self.executor_for(action_type).is_some()
    }

    pub fn registered_types(&self) -> Vec<ActionType> {
        let executors = self
            .executors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ActionType::ALL
            .into_iter()
            .filter(|kind| executors.contains_key(kind))
            .collect()
    }
}
