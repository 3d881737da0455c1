//! sf-core: shared types, errors, configuration, events, and the engine
//! capability traits.
//!
//! This crate is the foundational dependency for all other sf-* crates. It
//! defines the split-domain model ([`MediaFile`], [`SplitSpec`], [`Window`],
//! [`EncodingPolicy`], [`OutputArtifact`]), a unified error type, the
//! [`Engine`] / [`DurationProbe`] seams that media backends implement, and a
//! broadcast event bus for progress reporting.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use engine::{DurationProbe, Engine, SegmentCommand, SharedEngine};
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
