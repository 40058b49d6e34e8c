//! Channel Registry - the fixed set of pub/sub topics.

use serde::{Deserialize, Serialize};

/// A named pub/sub topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    /// Run state changes
    RunStatus,
    /// Incident narration lines
    IncidentLog,
    /// Incident resolution
    IncidentStatus,
    /// Outbound email activity
    Email,
    /// Carrier / slot booking activity
    Booking,
    /// Cold-chain temperature alerts
    TemperatureAlert,
    /// Shipment state changes
    ShipmentUpdated,
    /// Order record changes
    OrderUpdated,
    /// Raw agent progress reports
    AgentProgress,
}

impl Channel {
    /// Every registered channel
    pub const ALL: [Channel; 9] = [
        Channel::RunStatus,
        Channel::IncidentLog,
        Channel::IncidentStatus,
        Channel::Email,
        Channel::Booking,
        Channel::TemperatureAlert,
        Channel::ShipmentUpdated,
        Channel::OrderUpdated,
        Channel::AgentProgress,
    ];

    /// Returns the wire name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStatus => "run-status",
            Self::IncidentLog => "incident-log",
            Self::IncidentStatus => "incident-status",
            Self::Email => "email",
            Self::Booking => "booking",
            Self::TemperatureAlert => "temperature-alert",
            Self::ShipmentUpdated => "shipment-updated",
            Self::OrderUpdated => "order-updated",
            Self::AgentProgress => "agent-progress",
        }
    }

    /// Parse a comma-separated channel list.
    ///
    /// `None`, a blank list or one holding only separators selects every
    /// channel. Unknown names are an error.
    pub fn parse_list(list: Option<&str>) -> Result<Vec<Channel>, String> {
        let Some(list) = list.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::ALL.to_vec());
        };

        let mut channels = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let channel: Channel = name.parse()?;
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
        if channels.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        Ok(channels)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown channel: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.as_str()));
        }
    }

    #[test]
    fn test_parse_list_defaults_to_all() {
        assert_eq!(Channel::parse_list(None).unwrap().len(), Channel::ALL.len());
        assert_eq!(Channel::parse_list(Some("  ")).unwrap().len(), Channel::ALL.len());
        assert_eq!(Channel::parse_list(Some(",")).unwrap(), Channel::ALL.to_vec());
        assert_eq!(Channel::parse_list(Some(" , ,")).unwrap(), Channel::ALL.to_vec());
    }

    #[test]
    fn test_parse_list_dedupes() {
        let channels = Channel::parse_list(Some("run-status, email,run-status")).unwrap();
        assert_eq!(channels, vec![Channel::RunStatus, Channel::Email]);
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        let err = Channel::parse_list(Some("run-status,weather")).unwrap_err();
        assert!(err.contains("weather"));
    }
}
