//! EventBus - channel-addressed publish/subscribe for real-time updates.
//!
//! One transport per process (in-process or Redis) feeds an in-process
//! registry of subscriptions. Each subscription names the channels it
//! wants and owns a bounded queue; a subscriber that falls behind loses
//! events instead of stalling the publisher.

/// Core event bus implementation.
pub mod bus;
/// In-process subscription registry.
pub mod fanout;
/// Redis pub/sub transport.
pub mod redis_transport;
/// Message type definitions.
pub mod types;

pub use bus::{BusTransport, EventBus, LocalTransport};
pub use fanout::Subscription;
pub use redis_transport::RedisTransport;
pub use types::BusMessage;

#[cfg(test)]
mod tests;
