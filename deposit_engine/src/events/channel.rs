//! The single dispatch path into the broadcaster.
//!
//! Any number of [`EventProducer`]s can publish events. They all feed one channel, and a single [`EventDispatcher`]
//! task hands the events to the [`EventBroadcaster`] one at a time, so every subscriber sees events in publish order.
use std::sync::Arc;

use log::*;
use tokio::sync::mpsc;

use crate::events::{EventBroadcaster, OrderEvent};

pub struct EventDispatcher {
    listener: mpsc::Receiver<OrderEvent>,
    sender: mpsc::Sender<OrderEvent>,
    broadcaster: Arc<EventBroadcaster>,
}

impl EventDispatcher {
    pub fn new(buffer_size: usize, broadcaster: Arc<EventBroadcaster>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size.max(1));
        Self { listener, sender, broadcaster }
    }

    pub fn producer(&self) -> EventProducer {
        EventProducer::new(self.sender.clone())
    }

    /// Runs the dispatch loop. It ends once every producer has been dropped and the backlog has been delivered.
    pub async fn start_dispatcher(mut self) {
        debug!("📡️ Starting order event dispatcher");
        // drop the internal sender so that the loop ends when the last producer is dropped
        drop(self.sender);
        while let Some(event) = self.listener.recv().await {
            let report = self.broadcaster.fan_out(&event);
            trace!(
                "📡️ Order #{} ({:?}) delivered to {} subscriber(s), {} evicted",
                event.order.id,
                event.kind,
                report.delivered,
                report.evicted
            );
        }
        debug!("📡️ Order event dispatcher has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer {
    sender: mpsc::Sender<OrderEvent>,
}

impl EventProducer {
    pub fn new(sender: mpsc::Sender<OrderEvent>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: OrderEvent) {
        if let Err(e) = self.sender.send(event).await {
            error!("📡️ Failed to publish order event: {e}");
        }
    }
}
