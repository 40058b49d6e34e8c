use crate::channels::Channel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message travelling over the bus. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    /// Topic the message was published on
    pub channel: Channel,
    /// Arbitrary structured payload
    pub payload: serde_json::Value,
    /// When the publisher sent it
    pub published_at: DateTime<Utc>,
}

impl BusMessage {
    /// Stamp a new message with the current time
    #[must_use]
    pub fn new(channel: Channel, payload: serde_json::Value) -> Self {
        Self {
            channel,
            payload,
            published_at: Utc::now(),
        }
    }
}
