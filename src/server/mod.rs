//! Server module for Convoy
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `app`: Service wiring and router assembly
//! - `background_tasks`: Reconcile sweep startup
//! - `init`: Main server initialization and run loop

pub mod app;
mod background_tasks;
pub mod config;
mod init;
mod loader;

// Re-export public API
pub use init::{reset_runs, run};
pub use loader::load_config;
