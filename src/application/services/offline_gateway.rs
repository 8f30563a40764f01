use crate::application::ports::action_executor::ActionDispatcher;
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::network_monitor::NetworkMonitor;
use crate::domain::entities::{ActionTarget, OfflineAction};
use crate::domain::value_objects::{ActionPayload, ActionType};
use crate::shared::error::AppError;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Ran against the backend; carries the executor's result.
    Executed(Value),
    /// Stored for later. The UI renders a placeholder keyed by `action.id`.
    Queued(OfflineAction),
}

impl SubmitOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, SubmitOutcome::Queued(_))
    }
}

/// UI からの操作をオンラインなら即実行、オフラインならキューへ積む
pub struct OfflineGateway {
    monitor: Arc<NetworkMonitor>,
    queue: Arc<ActionQueue>,
    dispatcher: Arc<ActionDispatcher>,
}

impl OfflineGateway {
    pub fn new(
        monitor: Arc<NetworkMonitor>,
        queue: Arc<ActionQueue>,
        dispatcher: Arc<ActionDispatcher>,
    ) -> Self {
        Self {
            monitor,
            queue,
            dispatcher,
        }
    }

    pub async fn submit(
        &self,
        action_type: ActionType,
        payload: ActionPayload,
        target: Option<ActionTarget>,
    ) -> Result<SubmitOutcome, AppError> {
        let executor = self.dispatcher.executor_for(&action_type).ok_or_else(|| {
            AppError::ConfigurationError(format!("no executor registered for {action_type}"))
        })?;

        if !self.monitor.is_online() {
            let action = self.queue.enqueue(action_type, payload, target).await?;
            return Ok(SubmitOutcome::Queued(action));
        }

        let value = executor.execute(&payload).await.map_err(|err| {
            tracing::debug!(
                target: "offline::gateway",
                action_type = %action_type,
                error = %err,
                "direct execution failed"
            );
            AppError::from(err)
        })?;
        Ok(SubmitOutcome::Executed(value))
    }
}
