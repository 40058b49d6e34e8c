use super::types::BusMessage;
use crate::channels::Channel;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

struct Sink {
    channels: Vec<Channel>,
    tx: mpsc::Sender<BusMessage>,
}

/// Registry mapping subscription ids to their channel interest and queue.
pub(crate) struct FanOut {
    subscribers: DashMap<u64, Sink>,
    next_id: AtomicU64,
    buffer: usize,
}

impl FanOut {
    pub(crate) fn new(buffer: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        })
    }

    pub(crate) fn register(self: &Arc<Self>, channels: &[Channel]) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        self.subscribers.insert(
            id,
            Sink {
                channels: channels.to_vec(),
                tx,
            },
        );
        debug!(subscription_id = id, ?channels, "Subscription registered");

        Subscription {
            id,
            channels: channels.to_vec(),
            rx,
            fanout: Arc::downgrade(self),
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscription_id = id, "Subscription released");
        }
        removed
    }

    /// Hand `message` to every matching subscriber without waiting.
    ///
    /// Returns the number of queues that accepted it.
    pub(crate) fn deliver(&self, message: &BusMessage) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            if !entry.channels.contains(&message.channel) {
                continue;
            }
            match entry.tx.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscription_id = *entry.key(),
                        channel = %message.channel,
                        "Subscriber queue full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal must happen after the iterator releases its shard locks
        for id in closed {
            self.remove(id);
        }
        delivered
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}

/// Live handle for one subscriber.
///
/// Dropping the handle unsubscribes it.
pub struct Subscription {
    id: u64,
    channels: Vec<Channel>,
    rx: mpsc::Receiver<BusMessage>,
    fanout: Weak<FanOut>,
    active: AtomicBool,
}

impl Subscription {
    /// Registry id of this subscription
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Channels this subscription listens on
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once unsubscribed and drained, or when the bus is gone.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    /// Whether the subscription is still registered
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Release the subscription. Safe to call any number of times.
    ///
    /// Returns `true` only for the call that actually released it.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Some(fanout) = self.fanout.upgrade() {
            fanout.remove(self.id);
        }
        true
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channels", &self.channels)
            .field("active", &self.is_active())
            .finish()
    }
}
