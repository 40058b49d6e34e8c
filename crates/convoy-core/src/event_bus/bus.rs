use super::fanout::{FanOut, Subscription};
use super::redis_transport::RedisTransport;
use super::types::BusMessage;
use crate::channels::Channel;
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Where published messages go before they reach local subscribers.
#[async_trait]
pub trait BusTransport: Send + Sync {
    /// Send a message. Returns the number of local queues that accepted it,
    /// or `0` when delivery happens asynchronously.
    async fn publish(&self, message: &BusMessage) -> Result<usize>;

    /// Short name for logs and health output
    fn name(&self) -> &'static str;
}

/// Delivers straight into this process's subscription registry.
pub struct LocalTransport {
    fanout: Arc<FanOut>,
}

#[async_trait]
impl BusTransport for LocalTransport {
    async fn publish(&self, message: &BusMessage) -> Result<usize> {
        Ok(self.fanout.deliver(message))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Channel-addressed event bus.
///
/// Cloning is cheap; all clones share the same subscriptions and transport.
#[derive(Clone)]
pub struct EventBus {
    fanout: Arc<FanOut>,
    transport: Arc<dyn BusTransport>,
}

impl EventBus {
    /// In-process bus. `buffer` bounds each subscriber's queue.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let fanout = FanOut::new(buffer);
        let transport = Arc::new(LocalTransport {
            fanout: fanout.clone(),
        });
        Self { fanout, transport }
    }

    /// Bus backed by Redis pub/sub so several processes share events.
    ///
    /// Starts the pattern listener, which runs until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn redis(redis_url: &str, buffer: usize, shutdown: CancellationToken) -> Result<Self> {
        let fanout = FanOut::new(buffer);
        let transport = RedisTransport::new(redis_url)?;
        transport.spawn_listener(fanout.clone(), shutdown);
        Ok(Self {
            fanout,
            transport: Arc::new(transport),
        })
    }

    /// Register interest in `channels`.
    #[must_use]
    pub fn subscribe(&self, channels: &[Channel]) -> Subscription {
        self.fanout.register(channels)
    }

    /// Publish `payload` on `channel`.
    ///
    /// Never waits on subscribers. Returns how many local queues took the
    /// message (always `0` for the Redis transport, which delivers via its
    /// listener).
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be serialized or the transport fails
    pub async fn publish<T: Serialize + ?Sized>(&self, channel: Channel, payload: &T) -> Result<usize> {
        let message = BusMessage::new(channel, serde_json::to_value(payload)?);
        let delivered = self.transport.publish(&message).await?;
        debug!(%channel, delivered, "Event published");
        Ok(delivered)
    }

    /// Number of live subscriptions in this process
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.fanout.len()
    }

    /// Name of the active transport
    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("transport", &self.transport.name())
            .field("subscribers", &self.fanout.len())
            .finish()
    }
}
