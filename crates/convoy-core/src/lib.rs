//! Convoy Core - run reconciliation and event fan-out
//!
//! This crate keeps a local view of externally executed runs consistent and
//! streams every change to connected viewers:
//! - Channel registry and channel-addressed event bus (in-process or Redis)
//! - Run registry with a terminal-sticky, compare-and-swap merge
//! - Webhook ingestion for platform and agent pushes
//! - Status reconciler polling the workflow platform
//! - Incident timeline narration
//! - Per-viewer SSE frame streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod broadcast;

pub mod channels;
pub mod error;
pub mod event_bus;
pub mod platform;
pub mod reconciler;
pub mod runs;
pub mod shutdown;
pub mod stream;
pub mod timeline;
pub mod trigger;
pub mod webhook;

pub use channels::Channel;
pub use error::{Error, Result};
pub use event_bus::{BusMessage, EventBus, Subscription};
pub use platform::{PlatformApi, PlatformClient, PlatformConfig};
pub use reconciler::Reconciler;
pub use runs::{normalize_status, MergeOutcome, MetadataPatch, RunRegistry};
pub use shutdown::{wait_for_shutdown_signal, ShutdownController};
pub use stream::{viewer_stream, Frame};
pub use timeline::IncidentTimeline;
pub use trigger::{TriggerCommand, TriggerService};
pub use webhook::{WebhookAuth, WebhookEvent, WebhookGateway, WebhookOutcome};
