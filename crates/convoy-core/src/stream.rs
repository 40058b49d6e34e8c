//! SSE Fan-out - one frame stream per connected viewer.
//!
//! A viewer stream owns its bus subscription. Dropping the stream (the
//! HTTP layer does this on disconnect) releases the subscription and stops
//! the heartbeat in the same step.

use crate::channels::Channel;
use crate::event_bus::{BusMessage, EventBus, Subscription};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::{interval_at, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Default heartbeat period
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(25);

/// One frame on a viewer stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// First frame; confirms the subscription
    #[serde(rename_all = "camelCase")]
    Connected {
        /// Subscription id serving this viewer
        viewer_id: u64,
        /// Channels the viewer receives
        channels: Vec<Channel>,
        /// When the stream opened
        timestamp: DateTime<Utc>,
    },
    /// A bus event, wrapped for the client
    Event {
        /// Channel it was published on
        channel: Channel,
        /// Published payload
        data: serde_json::Value,
        /// Publish time
        timestamp: DateTime<Utc>,
    },
    /// Keep-alive; rendered as a comment line, never as data
    Heartbeat {
        /// Tick time
        timestamp: DateTime<Utc>,
    },
}

impl Frame {
    /// Whether this frame is a heartbeat
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat { .. })
    }
}

impl From<BusMessage> for Frame {
    fn from(message: BusMessage) -> Self {
        Self::Event {
            channel: message.channel,
            data: message.payload,
            timestamp: message.published_at,
        }
    }
}

struct ViewerState {
    subscription: Subscription,
    heartbeat: Interval,
    opened_at: Instant,
    delivered: u64,
}

impl Drop for ViewerState {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        info!(
            viewer_id = self.subscription.id(),
            delivered = self.delivered,
            connected_secs = self.opened_at.elapsed().as_secs(),
            "Viewer disconnected"
        );
    }
}

/// Frame stream for one viewer.
///
/// Yields a `Connected` frame, then one `Event` frame per matching bus
/// message and a `Heartbeat` every `heartbeat` of idle or busy time. The
/// stream ends only if the bus itself goes away.
pub fn viewer_stream(
    bus: &EventBus,
    channels: Vec<Channel>,
    heartbeat: Duration,
) -> impl Stream<Item = Frame> + Send + 'static {
    let subscription = bus.subscribe(&channels);
    let viewer_id = subscription.id();
    info!(viewer_id, ?channels, "Viewer connected");

    let connected = Frame::Connected {
        viewer_id,
        channels,
        timestamp: Utc::now(),
    };

    let period = heartbeat.max(Duration::from_millis(10));
    let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = ViewerState {
        subscription,
        heartbeat: ticker,
        opened_at: Instant::now(),
        delivered: 0,
    };

    let frames = stream::unfold(state, |mut state| async move {
        let frame = tokio::select! {
            message = state.subscription.recv() => {
                let Some(message) = message else {
                    debug!(viewer_id = state.subscription.id(), "Bus closed, ending viewer stream");
                    return None;
                };
                state.delivered += 1;
                Frame::from(message)
            }
            _ = state.heartbeat.tick() => Frame::Heartbeat { timestamp: Utc::now() },
        };
        Some((frame, state))
    });

    stream::once(async move { connected }).chain(frames)
}
