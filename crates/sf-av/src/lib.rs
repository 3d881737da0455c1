//! # sf-av
//!
//! Subprocess plumbing for splitforge: everything that actually runs
//! `ffmpeg` or `ffprobe`.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe, honouring configured overrides.
//! - **Command execution** ([`ToolCommand`]) -- async builder with optional
//!   timeout for running external processes.
//! - **Scratch storage** ([`Workspace`]) -- temporary directory the engine
//!   writes parts into before they are read back.
//! - **Engine** ([`FfmpegEngine`], [`shared_engine`]) -- implements
//!   [`sf_core::Engine`] and keeps one instance per process.
//! - **Duration probe** ([`probe::FfprobeProbe`]) -- implements
//!   [`sf_core::DurationProbe`].

pub mod command;
pub mod engine;
pub mod probe;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use engine::{release_shared_engine, segment_args, shared_engine, FfmpegEngine};
pub use probe::FfprobeProbe;
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
