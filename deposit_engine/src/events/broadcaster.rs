use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        MutexGuard,
        Weak,
    },
    time::Duration,
};

use log::*;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::events::OrderEvent;

pub type SubscriberId = u64;

pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// What a subscriber's connection should write next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastFrame {
    Event(OrderEvent),
    /// Nothing happened for a whole heartbeat interval. Send something anyway so that proxies keep the
    /// connection open.
    Heartbeat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub evicted: usize,
}

/// The set of live subscribers, each with its own bounded queue.
pub struct EventBroadcaster {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<OrderEvent>>>,
    next_id: AtomicU64,
    queue_depth: usize,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

impl EventBroadcaster {
    pub fn new(queue_depth: usize) -> Self {
        Self { subscribers: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1), queue_depth: queue_depth.max(1) }
    }

    fn subscribers(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<OrderEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| {
            error!("📡️ The subscriber set lock was poisoned. Recovering the set as-is.");
            e.into_inner()
        })
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscriber {
        let (sender, queue) = mpsc::channel(self.queue_depth);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers();
        subscribers.insert(id, sender);
        debug!("📡️ Subscriber #{id} joined. {} subscriber(s) online", subscribers.len());
        Subscriber { id, queue, broadcaster: Arc::downgrade(self) }
    }

    /// Removes a subscriber. Returns `false` if it was not subscribed (any more).
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers().remove(&id).is_some();
        if removed {
            debug!("📡️ Subscriber #{id} left");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    /// Offers `event` to every subscriber without waiting for any of them.
    ///
    /// A subscriber whose queue is full, or whose receiving end is gone, is removed from the set. Dropping the
    /// removed sender closes the subscriber's queue, so its connection ends once it has drained what it already has.
    pub fn fan_out(&self, event: &OrderEvent) -> FanOutReport {
        let mut report = FanOutReport::default();
        let mut subscribers = self.subscribers();
        subscribers.retain(|id, queue| match queue.try_send(event.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            },
            Err(TrySendError::Full(_)) => {
                debug!("📡️ Subscriber #{id} is not keeping up. Evicting it.");
                report.evicted += 1;
                false
            },
            Err(TrySendError::Closed(_)) => {
                trace!("📡️ Subscriber #{id} has gone away");
                report.evicted += 1;
                false
            },
        });
        report
    }
}

/// One viewer's end of the broadcast. Dropping it unsubscribes.
pub struct Subscriber {
    id: SubscriberId,
    queue: mpsc::Receiver<OrderEvent>,
    broadcaster: Weak<EventBroadcaster>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The next event, or `None` once the subscriber has been evicted and its queue is drained.
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        self.queue.recv().await
    }

    /// Waits for the next event, but no longer than `heartbeat`. Returns `None` when the subscription has ended.
    pub async fn next_frame(&mut self, heartbeat: Duration) -> Option<BroadcastFrame> {
        match tokio::time::timeout(heartbeat, self.queue.recv()).await {
            Ok(Some(event)) => Some(BroadcastFrame::Event(event)),
            Ok(None) => None,
            Err(_) => Some(BroadcastFrame::Heartbeat),
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if let Some(broadcaster) = self.broadcaster.upgrade() {
            broadcaster.unsubscribe(self.id);
        }
    }
}
