//! Convoy Store - durable records
//!
//! This crate provides the persistence layer for Convoy:
//! - Model: runs, incidents, incident log entries
//! - Store: SQLite-backed implementations of the store traits

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod model;
pub mod store;

pub use error::{Error, Result};
pub use model::{
    Incident, IncidentLogEntry, IncidentStatus, LogLevel, LogSource, NewIncident, NewRun, Run,
    RunLogRecord, RunMetadata, RunStatus,
};
pub use store::{IncidentStore, RecordStore, RunStore, SqliteStore};
