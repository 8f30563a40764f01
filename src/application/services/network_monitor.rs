use crate::application::ports::network_probe::NetworkProbe;
use crate::application::ports::sync_trigger::SyncTrigger;
use crate::domain::entities::{NetworkState, ProbeReading};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub type TransitionCallback = Arc<dyn Fn(NetworkState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

/// ネットワーク状態の監視
///
/// Starts out offline until the first reading arrives. Subscribers hear about
/// each state transition exactly once; repeated identical platform events are
/// swallowed.
pub struct NetworkMonitor {
    probe: Arc<dyn NetworkProbe>,
    state: RwLock<NetworkState>,
    watch_tx: watch::Sender<NetworkState>,
    subscribers: Mutex<Vec<(SubscriptionId, TransitionCallback)>>,
    sync_trigger: RwLock<Option<Weak<dyn SyncTrigger>>>,
    // keeps compare-and-store of readings in arrival order
    transition_gate: tokio::sync::Mutex<()>,
}

impl NetworkMonitor {
    pub fn new(probe: Arc<dyn NetworkProbe>) -> Self {
        let initial = NetworkState::offline();
        let (watch_tx, _) = watch::channel(initial);
        Self {
            probe,
            state: RwLock::new(initial),
            watch_tx,
            subscribers: Mutex::new(Vec::new()),
            sync_trigger: RwLock::new(None),
            transition_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn current(&self) -> NetworkState {
        *self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_online(&self) -> bool {
        self.current().online
    }

    pub fn watch(&self) -> watch::Receiver<NetworkState> {
        self.watch_tx.subscribe()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(NetworkState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Registers who gets told when the device comes back online.
    pub fn set_sync_trigger(&self, trigger: Weak<dyn SyncTrigger>) {
        *self
            .sync_trigger
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(trigger);
    }

    /// Asks the probe for a fresh reading. Never fails: a probe error keeps the
    /// last known link flag but treats the backend as unreachable.
    pub async fn refresh(&self) -> NetworkState {
        let reading = match self.probe.probe().await {
            Ok(reading) => reading,
            Err(err) => {
                let last = self.current();
                tracing::warn!(
                    target: "offline::network",
                    error = %err,
                    "network probe failed, assuming offline"
                );
                ProbeReading::new(last.connected, false)
            }
        };
        self.handle_reading(reading).await;
        self.current()
    }

    /// Applies one platform event. Returns whether the state changed.
    pub async fn handle_reading(&self, reading: ProbeReading) -> bool {
        let next = NetworkState::from_reading(reading);

        let previous = {
            let _gate = self.transition_gate.lock().await;
            let previous = {
                let mut state = self
                    .state
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                if *state == next {
                    return false;
                }
                std::mem::replace(&mut *state, next)
            };
            self.watch_tx.send_replace(next);
            self.notify_subscribers(next);
            previous
        };

        tracing::info!(
            target: "offline::network",
            connected = next.connected,
            reachable = next.reachable,
            online = next.online,
            "network state changed"
        );

        if !previous.online && next.online {
            self.trigger_sync().await;
        }
        true
    }

    /// Feeds platform events from `events` in order until the sender goes away.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<ProbeReading>,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(reading) = events.recv().await {
                monitor.handle_reading(reading).await;
            }
            tracing::debug!(target: "offline::network", "platform event channel closed");
        })
    }

    /// Periodically refreshes through the probe while the monitor is alive.
    pub fn spawn_probe_loop(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(monitor) = weak.upgrade() else {
                    break;
                };
                monitor.refresh().await;
            }
        })
    }

    fn notify_subscribers(&self, state: NetworkState) {
        let callbacks: Vec<TransitionCallback> = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback(state);
        }
    }

    async fn trigger_sync(&self) {
        let trigger = self
            .sync_trigger
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .and_then(Weak::upgrade);
        match trigger {
            Some(trigger) => trigger.on_online().await,
            None => tracing::debug!(
                target: "offline::network",
                "back online but no sync trigger is registered"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::AppError;
    use async_trait::async_trait;
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        pub Probe {}

        #[async_trait]
        impl NetworkProbe for Probe {
            async fn probe(&self) -> Result<ProbeReading, AppError>;
        }
    }

    #[derive(Default)]
    struct CountingTrigger {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SyncTrigger for CountingTrigger {
        async fn on_online(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn monitor_with(probe: MockProbe) -> NetworkMonitor {
        NetworkMonitor::new(Arc::new(probe))
    }

    #[tokio::test]
    async fn test_identical_events_notify_once() {
        let monitor = monitor_with(MockProbe::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.subscribe(move |state| sink.lock().unwrap().push(state.online));

        assert!(monitor.handle_reading(ProbeReading::online()).await);
        assert!(!monitor.handle_reading(ProbeReading::online()).await);
        assert!(!monitor.handle_reading(ProbeReading::online()).await);
        assert!(monitor.handle_reading(ProbeReading::offline()).await);
        assert!(!monitor.handle_reading(ProbeReading::offline()).await);

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn test_online_transition_triggers_sync_once() {
        let monitor = monitor_with(MockProbe::new());
        let trigger = Arc::new(CountingTrigger::default());
        let weak: Weak<dyn SyncTrigger> = Arc::downgrade(&trigger) as Weak<dyn SyncTrigger>;
        monitor.set_sync_trigger(weak);

        monitor.handle_reading(ProbeReading::offline()).await;
        monitor.handle_reading(ProbeReading::new(true, false)).await;
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 0);

        monitor.handle_reading(ProbeReading::online()).await;
        monitor.handle_reading(ProbeReading::online()).await;
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 1);

        monitor.handle_reading(ProbeReading::offline()).await;
        monitor.handle_reading(ProbeReading::online()).await;
        assert_eq!(trigger.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_probe_failure_degrades_to_offline() {
        let mut probe = MockProbe::new();
        let mut calls = 0;
        probe.expect_probe().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(ProbeReading::online())
            } else {
                Err(AppError::Network("dns failure".into()))
            }
        });
        let monitor = monitor_with(probe);

        assert!(monitor.refresh().await.online);

        let state = monitor.refresh().await;
        assert!(state.connected);
        assert!(!state.reachable);
        assert!(!state.online);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let monitor = monitor_with(MockProbe::new());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        monitor.handle_reading(ProbeReading::online()).await;
        assert!(monitor.unsubscribe(id));
        assert!(!monitor.unsubscribe(id));
        monitor.handle_reading(ProbeReading::offline()).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listener_and_watch_follow_platform_events() {
        let monitor = Arc::new(monitor_with(MockProbe::new()));
        let mut watcher = monitor.watch();
        let (tx, rx) = mpsc::channel(8);
        let handle = monitor.spawn_listener(rx);

        tx.send(ProbeReading::online()).await.unwrap();
        watcher.changed().await.unwrap();
        assert!(watcher.borrow().online);

        drop(tx);
        handle.await.unwrap();
        assert!(monitor.is_online());
    }
}
