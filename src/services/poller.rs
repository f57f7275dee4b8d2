use std::sync::mpsc::Sender;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::services::dispatch::{UpdateBus, UpdateKind, UpdateMessage};
use crate::services::inventory::{InventoryClient, InventoryError};

/// Out-of-band failure report; never travels on the update bus.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub source: String,
    pub message: String,
}

// Cancellation flag the sleeping poller can be woken through.
struct Gate {
    cancelled: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            cancelled: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn cancel(&self) {
        if let Ok(mut c) = self.cancelled.lock() {
            *c = true;
        }
        self.cond.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.lock().map(|c| *c).unwrap_or(true)
    }

    /// Sleeps up to `timeout`; returns true when cancelled meanwhile.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Ok(mut cancelled) = self.cancelled.lock() else {
            return true;
        };
        loop {
            if *cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.cond.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => cancelled = guard,
                Err(_) => return true,
            }
        }
    }
}

/// Owner side of one background poller. Cancelling (or dropping) the
/// handle stops the thread at its next suspension point; `join` reaps it.
pub struct PollerHandle {
    gate: Arc<Gate>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        self.gate.cancel();
    }

    pub fn join(mut self) {
        self.gate.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.gate.cancel();
    }
}

/// Spawns the background poller for one resource domain. Polls
/// immediately, then every `interval`. Failed ticks publish nothing; the
/// failure goes to the diagnostic channel and the log sink.
pub fn spawn_poller(
    kind: UpdateKind,
    client: Arc<dyn InventoryClient>,
    bus: Arc<UpdateBus>,
    diag: Sender<Diagnostic>,
    interval: Duration,
) -> PollerHandle {
    let gate = Arc::new(Gate::new());
    let thread_gate = Arc::clone(&gate);
    let join = thread::spawn(move || loop {
        if thread_gate.is_cancelled() {
            break;
        }
        match poll_once(kind, client.as_ref()) {
            Ok(msg) => bus.publish(msg),
            Err(e) => {
                log::warn!("poller {kind:?}: {e}");
                let _ = diag.send(Diagnostic {
                    source: format!("{kind:?}"),
                    message: e.to_string(),
                });
            }
        }
        if thread_gate.wait(interval) {
            break;
        }
    });
    PollerHandle {
        gate,
        join: Some(join),
    }
}

fn poll_once(
    kind: UpdateKind,
    client: &dyn InventoryClient,
) -> Result<UpdateMessage, InventoryError> {
    match kind {
        UpdateKind::Instances => client.list_instances(None).map(UpdateMessage::instances),
        UpdateKind::Health => client.describe_health(&[]).map(UpdateMessage::health),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstanceHealth, InstanceRecord};
    use crate::services::dispatch::UpdatePayload;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    struct FakeClient {
        script: Mutex<VecDeque<Result<Vec<InstanceRecord>, InventoryError>>>,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn scripted(
            script: Vec<Result<Vec<InstanceRecord>, InventoryError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl InventoryClient for FakeClient {
        fn list_instances(
            &self,
            _filter: Option<&str>,
        ) -> Result<Vec<InstanceRecord>, InventoryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn describe_health(
            &self,
            _ids: &[String],
        ) -> Result<Vec<InstanceHealth>, InventoryError> {
            Ok(Vec::new())
        }
    }

    fn recs(n: usize) -> Vec<InstanceRecord> {
        (0..n)
            .map(|i| InstanceRecord {
                id: format!("i-{i}"),
                ..Default::default()
            })
            .collect()
    }

    fn record_count(payload: UpdatePayload) -> usize {
        match payload {
            UpdatePayload::Instances(rs) => rs.len(),
            UpdatePayload::Health(hs) => hs.len(),
        }
    }

    #[test]
    fn delivers_then_skips_failed_tick_then_recovers() {
        let client = FakeClient::scripted(vec![
            Ok(recs(3)),
            Err(InventoryError::Command("boom".to_string())),
            Ok(recs(1)),
        ]);
        let bus = Arc::new(UpdateBus::new());
        let sub = bus.subscribe_with_capacity(UpdateKind::Instances, 16);
        let (diag_tx, diag_rx) = mpsc::channel();

        let handle = spawn_poller(
            UpdateKind::Instances,
            client.clone(),
            Arc::clone(&bus),
            diag_tx,
            Duration::from_millis(10),
        );

        let first = sub.recv_timeout(Duration::from_secs(2)).expect("first tick");
        assert_eq!(record_count(first.into_payload()), 3);

        let diag = diag_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("diagnostic for failed tick");
        assert_eq!(diag.source, "Instances");
        assert!(diag.message.contains("boom"));

        let second = sub.recv_timeout(Duration::from_secs(2)).expect("recovery tick");
        assert_eq!(record_count(second.into_payload()), 1);

        handle.join();
    }

    #[test]
    fn first_tick_fires_without_waiting_an_interval() {
        let client = FakeClient::scripted(vec![Ok(recs(2))]);
        let bus = Arc::new(UpdateBus::new());
        let sub = bus.subscribe(UpdateKind::Instances);
        let (diag_tx, _diag_rx) = mpsc::channel();

        let handle = spawn_poller(
            UpdateKind::Instances,
            client,
            Arc::clone(&bus),
            diag_tx,
            Duration::from_secs(3600),
        );
        let msg = sub
            .recv_timeout(Duration::from_secs(2))
            .expect("immediate first poll");
        assert_eq!(record_count(msg.into_payload()), 2);
        handle.join();
    }

    #[test]
    fn cancel_stops_ticking() {
        let client = FakeClient::scripted(Vec::new());
        let bus = Arc::new(UpdateBus::new());
        let (diag_tx, _diag_rx) = mpsc::channel();

        let handle = spawn_poller(
            UpdateKind::Instances,
            client.clone(),
            Arc::clone(&bus),
            diag_tx,
            Duration::from_millis(5),
        );
        thread::sleep(Duration::from_millis(30));
        handle.join();

        let after_join = client.calls();
        assert!(after_join > 0);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(client.calls(), after_join);
    }

    #[test]
    fn cancel_wakes_a_long_sleep() {
        let client = FakeClient::scripted(Vec::new());
        let bus = Arc::new(UpdateBus::new());
        let (diag_tx, _diag_rx) = mpsc::channel();

        let handle = spawn_poller(
            UpdateKind::Instances,
            client,
            Arc::clone(&bus),
            diag_tx,
            Duration::from_secs(3600),
        );
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        handle.join();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
