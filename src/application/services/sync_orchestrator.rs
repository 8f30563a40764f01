use crate::application::ports::action_executor::ActionDispatcher;
use crate::application::ports::sync_trigger::SyncTrigger;
use crate::application::services::action_queue::ActionQueue;
use crate::application::services::dead_letter_box::DeadLetterBox;
use crate::application::services::network_monitor::NetworkMonitor;
use crate::domain::entities::{
    DrainOutcome, DrainReport, DropReason, ManualSyncResult, OfflineAction, SyncEvent,
};
use crate::domain::value_objects::ActionId;
use crate::infrastructure::offline::metrics::{SyncMetrics, SyncMetricsSnapshot};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::broadcast;

enum Step {
    Synced,
    Retrying,
    Dropped,
    /// Removed from the queue by someone else (e.g. logout) before it ran.
    Vanished,
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// キューの同期処理（single-flight）
pub struct SyncOrchestrator {
    monitor: Arc<NetworkMonitor>,
    queue: Arc<ActionQueue>,
    dead_letters: Arc<DeadLetterBox>,
    dispatcher: Arc<ActionDispatcher>,
    max_attempts: u32,
    draining: AtomicBool,
    events: broadcast::Sender<SyncEvent>,
    metrics: SyncMetrics,
}

impl SyncOrchestrator {
    /// Builds the orchestrator and, when `auto_sync` is on, registers it as the
    /// monitor's reconnect trigger.
    pub fn new(
        monitor: Arc<NetworkMonitor>,
        queue: Arc<ActionQueue>,
        dead_letters: Arc<DeadLetterBox>,
        dispatcher: Arc<ActionDispatcher>,
        config: &SyncConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let auto_sync = config.auto_sync;
        Arc::new_cyclic(|weak: &Weak<Self>| {
            if auto_sync {
                let trigger: Weak<dyn SyncTrigger> = weak.clone();
                monitor.set_sync_trigger(trigger);
            }
            Self {
                monitor,
                queue,
                dead_letters,
                dispatcher,
                max_attempts: config.max_attempts.max(1),
                draining: AtomicBool::new(false),
                events,
                metrics: SyncMetrics::new(),
            }
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// One pass over the queue. Never fails; everything that goes wrong ends
    /// up in the report or in the affected action's metadata.
    pub async fn drain(&self) -> DrainOutcome {
        // must stay ahead of the first await
        if self.draining.swap(true, Ordering::AcqRel) {
            self.metrics.record_skip();
            tracing::debug!(target: "offline::sync", "drain already running, skipping");
            return DrainOutcome::AlreadyRunning;
        }
        let _guard = DrainGuard(&self.draining);

        if !self.monitor.is_online() {
            self.metrics.record_skip();
            tracing::debug!(target: "offline::sync", "offline, drain skipped");
            return DrainOutcome::Offline;
        }

        let started = Instant::now();
        let snapshot = self.queue.list_all().await;
        self.emit(SyncEvent::DrainStarted {
            queued: snapshot.len(),
        });

        let mut report = DrainReport::default();
        for action in snapshot {
            if !self.monitor.is_online() {
                tracing::info!(
                    target: "offline::sync",
                    "connection lost mid-drain, leaving the rest queued"
                );
                break;
            }

            match self.process(action).await {
                Ok(Step::Synced) => report.synced_count += 1,
                Ok(Step::Retrying) => report.failed_count += 1,
                Ok(Step::Dropped) => report.dropped_count += 1,
                Ok(Step::Vanished) => {}
                Err(err) => {
                    tracing::error!(
                        target: "offline::sync",
                        error = %err,
                        "queue persistence failed, ending drain early"
                    );
                    report.storage_error = Some(err.to_string());
                    break;
                }
            }
        }

        if report.storage_error.is_none() {
            if let Err(err) = self.queue.flush_to_store().await {
                report.storage_error = Some(err.to_string());
            }
        }
        report.remaining_count = self.queue.len().await as u32;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_pass(&report, elapsed_ms);
        tracing::info!(
            target: "offline::sync",
            synced = report.synced_count,
            failed = report.failed_count,
            dropped = report.dropped_count,
            remaining = report.remaining_count,
            elapsed_ms,
            "drain finished"
        );
        self.emit(SyncEvent::DrainFinished(report.clone()));

        DrainOutcome::Completed(report)
    }

    /// The "sync now" affordance.
    pub async fn manual_sync(&self) -> ManualSyncResult {
        if !self.monitor.is_online() {
            return ManualSyncResult::failure(
                "No internet connection. Pending changes will sync once you are back online.",
            );
        }

        match self.drain().await {
            DrainOutcome::Completed(report) => ManualSyncResult {
                success: report.is_clean(),
                message: describe(&report),
                report: Some(report),
            },
            DrainOutcome::AlreadyRunning => ManualSyncResult {
                success: true,
                message: "Sync already in progress".to_string(),
                report: None,
            },
            DrainOutcome::Offline => ManualSyncResult::failure("No internet connection."),
        }
    }

    async fn process(&self, action: OfflineAction) -> Result<Step, AppError> {
        if self.queue.get(&action.id).await.is_none() {
            return Ok(Step::Vanished);
        }

        let Some(executor) = self.dispatcher.executor_for(&action.action_type) else {
            tracing::warn!(
                target: "offline::sync",
                action_id = %action.id,
                action_type = %action.action_type,
                "no executor registered, dropping action"
            );
            return self
                .drop_action(&action.id, DropReason::UnknownActionType, None)
                .await;
        };

        match executor.execute(&action.payload).await {
            Ok(_) => {
                if self.queue.dequeue_by_id(&action.id).await?.is_none() {
                    return Ok(Step::Vanished);
                }
                tracing::debug!(
                    target: "offline::sync",
                    action_id = %action.id,
                    action_type = %action.action_type,
                    "action synced"
                );
                self.emit(SyncEvent::ActionSynced { id: action.id });
                Ok(Step::Synced)
            }
            Err(err) => {
                let message = err.to_string();
                let Some(updated) = self.queue.record_failure(&action.id, &message).await? else {
                    return Ok(Step::Vanished);
                };
                let attempts = updated.metadata.attempts;

                if err.is_permanent() {
                    tracing::warn!(
                        target: "offline::sync",
                        action_id = %action.id,
                        error = %message,
                        "action rejected by executor, dropping"
                    );
                    return self
                        .drop_action(&action.id, DropReason::Rejected, Some(message))
                        .await;
                }

                if attempts >= self.max_attempts {
                    tracing::warn!(
                        target: "offline::sync",
                        action_id = %action.id,
                        attempts,
                        error = %message,
                        "retry ceiling reached, dropping action"
                    );
                    return self
                        .drop_action(&action.id, DropReason::RetriesExhausted, Some(message))
                        .await;
                }

                tracing::info!(
                    target: "offline::sync",
                    action_id = %action.id,
                    attempts,
                    max_attempts = self.max_attempts,
                    error = %message,
                    "action failed, will retry on next drain"
                );
                self.emit(SyncEvent::ActionFailed {
                    id: action.id,
                    attempts,
                    error: message,
                });
                Ok(Step::Retrying)
            }
        }
    }

    /// Dead-letters first, then dequeues, so a storage failure in between can
    /// duplicate a letter but never lose the action.
    async fn drop_action(
        &self,
        id: &ActionId,
        reason: DropReason,
        error: Option<String>,
    ) -> Result<Step, AppError> {
        let Some(current) = self.queue.get(id).await else {
            return Ok(Step::Vanished);
        };
        let letter = self.dead_letters.push(current, reason, error).await?;
        self.queue.dequeue_by_id(id).await?;
        self.emit(SyncEvent::ActionDropped(Box::new(letter)));
        Ok(Step::Dropped)
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SyncTrigger for SyncOrchestrator {
    async fn on_online(&self) {
        let pending = self.queue.len().await;
        if pending == 0 {
            return;
        }
        tracing::info!(target: "offline::sync", pending, "back online, draining queue");
        self.drain().await;
    }
}

fn describe(report: &DrainReport) -> String {
    if let Some(err) = &report.storage_error {
        return format!("Sync interrupted: {err}");
    }
    let mut message = format!("Synced {} action(s)", report.synced_count);
    if report.failed_count > 0 {
        message.push_str(&format!(", {} will retry", report.failed_count));
    }
    if report.dropped_count > 0 {
        message.push_str(&format!(", {} could not be synced", report.dropped_count));
    }
    message
}
