//! # sf-pipeline
//!
//! Splitting a media file into parts.
//!
//! This crate provides:
//!
//! - **[`planner`]** -- pure boundary planning: turn a [`SplitSpec`] and the
//!   probed duration into contiguous [`Window`]s.
//! - **[`SegmentProcessor`]** -- one engine call per window, producing an
//!   [`OutputArtifact`].
//! - **[`Orchestrator`]** -- the probe / plan / process state machine, with
//!   progress published on an [`EventBus`](sf_core::events::EventBus).
//!
//! [`SplitSpec`]: sf_core::SplitSpec
//! [`Window`]: sf_core::Window
//! [`OutputArtifact`]: sf_core::OutputArtifact

pub mod orchestrator;
pub mod planner;
pub mod processor;

// Re-export key types at the crate root.
pub use orchestrator::{describe, Orchestrator};
pub use planner::{plan, plan_with, PlanOptions, TOLERANCE};
pub use processor::{artifact_name, SegmentProcessor};
