#![allow(dead_code)]

use async_trait::async_trait;
use pickup_sync::domain::entities::ProbeReading;
use pickup_sync::shared::clock::{Clock, ManualClock};
use pickup_sync::shared::config::AppConfig;
use pickup_sync::shared::error::AppError;
use pickup_sync::{
    ActionDispatcher, ActionExecutor, ExecutionError, KeyValueStore, NetworkProbe, OfflineRuntime,
};
use pickup_sync::domain::value_objects::ActionPayload;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Probe whose answer the test flips by hand.
pub struct SwitchableProbe {
    reading: Mutex<ProbeReading>,
}

impl SwitchableProbe {
    pub fn new(reading: ProbeReading) -> Arc<Self> {
        Arc::new(Self {
            reading: Mutex::new(reading),
        })
    }

    pub fn set(&self, reading: ProbeReading) {
        *self.reading.lock().unwrap() = reading;
    }
}

#[async_trait]
impl NetworkProbe for SwitchableProbe {
    async fn probe(&self) -> Result<ProbeReading, AppError> {
        Ok(*self.reading.lock().unwrap())
    }
}

/// Executor that records every payload it sees and answers from a script.
/// Once the script runs out it succeeds.
pub struct RecordingExecutor {
    calls: Mutex<Vec<Value>>,
    script: Mutex<VecDeque<Result<Value, ExecutionError>>>,
    delay: Option<Duration>,
}

impl RecordingExecutor {
    pub fn succeeding() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Result<Value, ExecutionError>>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
            delay: None,
        })
    }

    pub fn failing_forever() -> Arc<Self> {
        Self::scripted(
            (0..16)
                .map(|i| Err(ExecutionError::transient(format!("503 attempt {i}"))))
                .collect(),
        )
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ActionExecutor for RecordingExecutor {
    async fn execute(&self, payload: &ActionPayload) -> Result<Value, ExecutionError> {
        self.calls.lock().unwrap().push(payload.as_json().clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(json!({"ok": true})))
    }
}

pub fn payload(value: Value) -> ActionPayload {
    ActionPayload::new(value).expect("payload")
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.storage.database_url = "sqlite::memory:".to_string();
    config
}

pub async fn build_runtime(
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    probe: Arc<SwitchableProbe>,
    dispatcher: Arc<ActionDispatcher>,
) -> OfflineRuntime {
    pickup_sync::init_logging();
    OfflineRuntime::with_store(test_config(), store, clock, probe, dispatcher)
        .await
        .expect("runtime")
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        chrono::DateTime::parse_from_rfc3339("2026-03-01T08:00:00Z")
            .expect("timestamp")
            .with_timezone(&chrono::Utc),
    ))
}
