//! Webhook Ingestion Gateway.
//!
//! Turns pushes from the platform (`event_type`) and from agent processes
//! (`stage`) into run merges, timeline narration and broadcasts.

mod auth;
mod gateway;
mod payload;
mod stages;

pub use auth::WebhookAuth;
pub use gateway::{WebhookGateway, WebhookOutcome};
pub use payload::{AgentEvent, PlatformEvent, PlatformEventKind, WebhookEvent};
pub use stages::{stage_effect, OrderMutation, StageEffect, STAGE_TABLE_VERSION};
