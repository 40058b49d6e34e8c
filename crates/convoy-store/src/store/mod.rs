//! Store - persistence using SQLite
//!
//! This module provides the storage layer for runs, incidents and domain
//! records. It uses sqlx for async SQLite access (embedded, no Docker required).

mod helpers;
mod incidents;
mod records;
mod runs;
mod sqlite_store;
mod traits;


pub use helpers::{default_data_dir, default_db_path};
pub use sqlite_store::SqliteStore;
pub use traits::{IncidentStore, RecordStore, RunStore};
