//! Error types for convoy-store

use thiserror::Error;

/// Store error type
#[derive(Debug, Error)]
pub enum Error {
    /// Run not found
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Run id already registered
    #[error("run already exists: {0}")]
    DuplicateRun(String),

    /// Incident not found
    #[error("incident not found: {0}")]
    IncidentNotFound(String),

    /// Domain record not found
    #[error("record not found: {kind}/{id}")]
    RecordNotFound {
        /// Record kind (order, shipment, ...)
        kind: String,
        /// Record identifier
        id: String,
    },

    /// Compare-and-swap lost against a concurrent writer
    #[error("version conflict on run {run_id} (expected {expected})")]
    VersionConflict {
        /// Run identifier
        run_id: String,
        /// Version the writer read
        expected: i64,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
