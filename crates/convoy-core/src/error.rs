//! Error types for convoy-core

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing input
    #[error("validation error: {0}")]
    Validation(String),

    /// Webhook key missing or wrong
    #[error("unauthorized")]
    Unauthorized,

    /// Unknown run id
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Unknown incident id
    #[error("incident not found: {0}")]
    IncidentNotFound(String),

    /// Unknown domain record
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Run id already registered
    #[error("run already exists: {0}")]
    DuplicateRun(String),

    /// External platform unreachable or erroring
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Durable store failure
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Pub/sub transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<convoy_store::Error> for Error {
    fn from(err: convoy_store::Error) -> Self {
        use convoy_store::Error as Store;
        match err {
            Store::RunNotFound(id) => Self::RunNotFound(id),
            Store::DuplicateRun(id) => Self::DuplicateRun(id),
            Store::IncidentNotFound(id) => Self::IncidentNotFound(id),
            Store::RecordNotFound { kind, id } => Self::RecordNotFound(format!("{kind}/{id}")),
            Store::Serialization(msg) => Self::Serialization(msg),
            other @ (Store::VersionConflict { .. } | Store::Database(_)) => {
                Self::Persistence(other.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Stable machine-readable code for API responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RunNotFound(_) => "RUN_NOT_FOUND",
            Self::IncidentNotFound(_) => "INCIDENT_NOT_FOUND",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::DuplicateRun(_) => "DUPLICATE_RUN",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let err: Error = convoy_store::Error::RunNotFound("r1".to_string()).into();
        assert!(matches!(err, Error::RunNotFound(id) if id == "r1"));

        let err: Error = convoy_store::Error::VersionConflict {
            run_id: "r1".to_string(),
            expected: 2,
        }
        .into();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");

        let err: Error = convoy_store::Error::RecordNotFound {
            kind: "order".to_string(),
            id: "o-1".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "record not found: order/o-1");
    }
}
