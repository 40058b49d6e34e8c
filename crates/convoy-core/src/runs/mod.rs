//! Run Registry - the single choke point for run state.
//!
//! Both the webhook path and the reconciler funnel through
//! [`RunRegistry::merge`]. A finished run never changes status again; its
//! metadata may still grow.

mod merge;
mod registry;
mod status_map;

pub use merge::{MergeOutcome, MetadataPatch};
pub use registry::RunRegistry;
pub use status_map::normalize_status;

#[cfg(test)]
mod tests;
