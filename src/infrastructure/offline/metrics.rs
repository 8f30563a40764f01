use crate::domain::entities::DrainReport;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassOutcome {
    Clean,
    Partial,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetricsSnapshot {
    pub passes: u64,
    pub skipped_passes: u64,
    pub total_synced: u64,
    pub total_failed: u64,
    pub total_dropped: u64,
    pub consecutive_failed_passes: u64,
    pub last_pass_ms: Option<u64>,
    pub last_outcome: Option<PassOutcome>,
    pub last_duration_ms: Option<u64>,
    pub last_storage_error: Option<String>,
}

#[derive(Default, Clone)]
struct LastPass {
    outcome: Option<PassOutcome>,
    duration_ms: Option<u64>,
    storage_error: Option<String>,
}

/// Drain counters kept per orchestrator.
pub struct SyncMetrics {
    passes: AtomicU64,
    skipped: AtomicU64,
    synced: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    consecutive_failed: AtomicU64,
    last_pass_ms: AtomicU64,
    last: Mutex<LastPass>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            passes: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            synced: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            consecutive_failed: AtomicU64::new(0),
            last_pass_ms: AtomicU64::new(0),
            last: Mutex::new(LastPass::default()),
        }
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self, report: &DrainReport, duration_ms: u64) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.synced
            .fetch_add(u64::from(report.synced_count), Ordering::Relaxed);
        self.failed
            .fetch_add(u64::from(report.failed_count), Ordering::Relaxed);
        self.dropped
            .fetch_add(u64::from(report.dropped_count), Ordering::Relaxed);
        self.last_pass_ms.store(current_unix_ms(), Ordering::Relaxed);

        let outcome = if report.is_clean() {
            self.consecutive_failed.store(0, Ordering::Relaxed);
            PassOutcome::Clean
        } else {
            self.consecutive_failed.fetch_add(1, Ordering::Relaxed);
            PassOutcome::Partial
        };

        if let Ok(mut guard) = self.last.lock() {
            guard.outcome = Some(outcome);
            guard.duration_ms = Some(duration_ms);
            guard.storage_error = report.storage_error.clone();
        }
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        let last = self
            .last
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|_| LastPass::default());

        SyncMetricsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            skipped_passes: self.skipped.load(Ordering::Relaxed),
            total_synced: self.synced.load(Ordering::Relaxed),
            total_failed: self.failed.load(Ordering::Relaxed),
            total_dropped: self.dropped.load(Ordering::Relaxed),
            consecutive_failed_passes: self.consecutive_failed.load(Ordering::Relaxed),
            last_pass_ms: to_option(self.last_pass_ms.load(Ordering::Relaxed)),
            last_outcome: last.outcome,
            last_duration_ms: last.duration_ms,
            last_storage_error: last.storage_error,
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn to_option(value: u64) -> Option<u64> {
    if value == 0 { None } else { Some(value) }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}
