//! Capability traits for the media backend.
//!
//! The planner and orchestrator never talk to ffmpeg directly. They hand a
//! [`SegmentCommand`] to an [`Engine`] and ask a [`DurationProbe`] for the
//! timeline length, so any native or subprocess-based backend can be swapped
//! in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::media::EncodingPolicy;

/// Everything the engine needs to produce one output part.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCommand {
    /// Source media file.
    pub input: PathBuf,
    /// Seek offset in seconds.
    pub start: f64,
    /// Length of the part in seconds.
    pub duration: f64,
    /// Stream copy or re-encode.
    pub policy: EncodingPolicy,
    /// File name of the produced part; its extension selects the container.
    pub output_name: String,
}

/// A media processing backend that turns one [`SegmentCommand`] into bytes.
///
/// Implementations are not required to support concurrent submissions; the
/// orchestrator serializes access through [`SharedEngine`].
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short name for logs (e.g. "ffmpeg").
    fn name(&self) -> &'static str;

    /// Produce the part described by `command`.
    async fn submit(&self, command: &SegmentCommand) -> crate::Result<Bytes>;

    /// Free any scratch resources. The engine is not used afterwards.
    fn release(&self) {}
}

/// Process-wide engine handle. Holding the lock grants exclusive use.
pub type SharedEngine = Arc<tokio::sync::Mutex<dyn Engine>>;

/// Reads the total duration of a media file.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Short name for logs (e.g. "ffprobe").
    fn name(&self) -> &'static str;

    /// Duration in seconds. `0.0` means the duration is unknown; callers must
    /// not plan against it.
    async fn probe(&self, path: &Path) -> crate::Result<f64>;
}
