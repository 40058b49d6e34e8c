//! Middleware module for the Convoy HTTP server
//!
//! Provides:
//! - Webhook key verification (`x-api-key`)

pub mod webhook_auth;

pub use webhook_auth::WebhookKey;
