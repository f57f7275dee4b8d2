use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::model::{InstanceHealth, InstanceRecord};

/// Queue capacity handed to page-facing subscribers: one unread update,
/// superseded by anything newer.
pub const PAGE_CAPACITY: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Instances,
    Health,
}

#[derive(Debug, Clone)]
pub enum UpdatePayload {
    Instances(Vec<InstanceRecord>),
    Health(Vec<InstanceHealth>),
}

/// Tagged update delivered from a poller to its subscribers. The private
/// fields keep the kind/payload pairing intact: only the constructors
/// below can build one.
#[derive(Debug, Clone)]
pub struct UpdateMessage {
    kind: UpdateKind,
    payload: UpdatePayload,
}

impl UpdateMessage {
    pub fn instances(records: Vec<InstanceRecord>) -> Self {
        Self {
            kind: UpdateKind::Instances,
            payload: UpdatePayload::Instances(records),
        }
    }

    pub fn health(statuses: Vec<InstanceHealth>) -> Self {
        Self {
            kind: UpdateKind::Health,
            payload: UpdatePayload::Health(statuses),
        }
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    pub fn into_payload(self) -> UpdatePayload {
        self.payload
    }
}

struct SlotQueue {
    items: VecDeque<UpdateMessage>,
    cap: usize,
    dropped: u64,
}

struct Slot {
    queue: Mutex<SlotQueue>,
    cond: Condvar,
}

/// Receiving half of one subscription. Messages arrive in publish order;
/// when the bounded queue overflows the stale end is dropped, never the
/// publisher blocked.
pub struct Subscription {
    slot: Arc<Slot>,
}

impl Subscription {
    pub fn try_recv(&self) -> Option<UpdateMessage> {
        let mut q = self.slot.queue.lock().ok()?;
        q.items.pop_front()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<UpdateMessage> {
        let deadline = Instant::now() + timeout;
        let mut q = self.slot.queue.lock().ok()?;
        loop {
            if let Some(msg) = q.items.pop_front() {
                return Some(msg);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _res) = self.slot.cond.wait_timeout(q, deadline - now).ok()?;
            q = guard;
        }
    }

    /// Stale messages discarded on this subscription so far.
    #[allow(dead_code)]
    pub fn dropped(&self) -> u64 {
        self.slot.queue.lock().map(|q| q.dropped).unwrap_or(0)
    }
}

/// Publish/subscribe topic keyed by update kind. Each subscriber owns its
/// queue, so one slow page never affects another.
#[derive(Default)]
pub struct UpdateBus {
    topics: Mutex<HashMap<UpdateKind, Vec<Arc<Slot>>>>,
}

impl UpdateBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: UpdateKind) -> Subscription {
        self.subscribe_with_capacity(kind, PAGE_CAPACITY)
    }

    pub fn subscribe_with_capacity(&self, kind: UpdateKind, cap: usize) -> Subscription {
        let slot = Arc::new(Slot {
            queue: Mutex::new(SlotQueue {
                items: VecDeque::new(),
                cap: cap.max(1),
                dropped: 0,
            }),
            cond: Condvar::new(),
        });
        if let Ok(mut topics) = self.topics.lock() {
            topics.entry(kind).or_default().push(Arc::clone(&slot));
        }
        Subscription { slot }
    }

    /// Non-blocking delivery to every subscriber of the message's kind.
    pub fn publish(&self, msg: UpdateMessage) {
        let slots: Vec<Arc<Slot>> = match self.topics.lock() {
            Ok(topics) => topics.get(&msg.kind()).cloned().unwrap_or_default(),
            Err(_) => return,
        };
        for slot in slots {
            let Ok(mut q) = slot.queue.lock() else {
                continue;
            };
            q.items.push_back(msg.clone());
            while q.items.len() > q.cap {
                q.items.pop_front();
                q.dropped += 1;
                log::debug!("dispatch: dropped stale {:?} update", msg.kind());
            }
            drop(q);
            slot.cond.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn rec(id: impl Into<String>) -> InstanceRecord {
        InstanceRecord {
            id: id.into(),
            ..Default::default()
        }
    }

    fn ids(msg: UpdateMessage) -> Vec<String> {
        match msg.into_payload() {
            UpdatePayload::Instances(rs) => rs.into_iter().map(|r| r.id).collect(),
            UpdatePayload::Health(hs) => hs.into_iter().map(|h| h.id).collect(),
        }
    }

    #[test]
    fn fifo_order_preserved_across_1000_sends() {
        let bus = UpdateBus::new();
        let sub = bus.subscribe_with_capacity(UpdateKind::Instances, 1000);
        for i in 0..1000 {
            bus.publish(UpdateMessage::instances(vec![rec(format!("i-{i}"))]));
        }
        for i in 0..1000 {
            let msg = sub.try_recv().expect("message missing");
            assert_eq!(msg.kind(), UpdateKind::Instances);
            assert_eq!(ids(msg), vec![format!("i-{i}")]);
        }
        assert!(sub.try_recv().is_none());
        assert_eq!(sub.dropped(), 0);
    }

    #[test]
    fn newer_update_supersedes_unread_at_page_capacity() {
        let bus = UpdateBus::new();
        let sub = bus.subscribe(UpdateKind::Instances);
        bus.publish(UpdateMessage::instances(vec![rec("stale")]));
        bus.publish(UpdateMessage::instances(vec![rec("fresh")]));
        let msg = sub.try_recv().expect("fresh message missing");
        assert_eq!(ids(msg), vec!["fresh".to_string()]);
        assert!(sub.try_recv().is_none());
        assert_eq!(sub.dropped(), 1);
    }

    #[test]
    fn publish_routes_by_kind() {
        let bus = UpdateBus::new();
        let health_sub = bus.subscribe(UpdateKind::Health);
        bus.publish(UpdateMessage::instances(vec![rec("i-1")]));
        assert!(health_sub.try_recv().is_none());
        bus.publish(UpdateMessage::health(vec![InstanceHealth {
            id: "i-1".into(),
            ..Default::default()
        }]));
        let msg = health_sub.try_recv().expect("health message missing");
        assert_eq!(msg.kind(), UpdateKind::Health);
    }

    #[test]
    fn each_subscriber_owns_its_queue() {
        let bus = UpdateBus::new();
        let a = bus.subscribe(UpdateKind::Instances);
        let b = bus.subscribe(UpdateKind::Instances);
        bus.publish(UpdateMessage::instances(vec![rec("i-1")]));
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_some());
    }

    #[test]
    fn recv_timeout_expires_when_nothing_is_published() {
        let bus = UpdateBus::new();
        let sub = bus.subscribe(UpdateKind::Instances);
        assert!(sub.recv_timeout(Duration::from_millis(30)).is_none());
    }

    #[test]
    fn recv_timeout_wakes_on_publish_from_another_thread() {
        let bus = Arc::new(UpdateBus::new());
        let sub = bus.subscribe(UpdateKind::Instances);
        let publisher = {
            let bus = Arc::clone(&bus);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                bus.publish(UpdateMessage::instances(vec![rec("i-late")]));
            })
        };
        let msg = sub
            .recv_timeout(Duration::from_secs(2))
            .expect("publish should wake the receiver");
        assert_eq!(ids(msg), vec!["i-late".to_string()]);
        publisher.join().unwrap();
    }
}
