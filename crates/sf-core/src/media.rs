//! Split-domain model: the source file, how to split it, the resulting
//! time windows, how each window is encoded, and the produced artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Bytes per megabyte as used by [`SplitSpec::BySize`].
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Smallest part count a user may request.
pub const MIN_PARTS: u32 = 2;

/// Smallest target size, in megabytes, a user may request.
pub const MIN_TARGET_MB: u64 = 1;

/// Smallest target duration, in seconds, a user may request.
pub const MIN_TARGET_SECONDS: f64 = 10.0;

/// Largest number of parts a single split may produce.
pub const MAX_PARTS: usize = 100_000;

// ---------------------------------------------------------------------------
// MediaFile
// ---------------------------------------------------------------------------

/// A loaded source file. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    /// File name including extension.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
    /// Size of the file in bytes.
    pub size_bytes: u64,
    /// MIME type derived from the extension.
    pub mime_type: String,
    /// Total duration in seconds; `0.0` means unknown.
    pub duration_seconds: f64,
}

impl MediaFile {
    /// Describe the file at `path` with the given size and probed duration.
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64, duration_seconds: f64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            mime_type: mime_type_for(&path).to_string(),
            name,
            path,
            size_bytes,
            duration_seconds,
        }
    }

    /// File name without its extension.
    pub fn base_name(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    /// Extension as written, if the name has one.
    pub fn extension(&self) -> Option<&str> {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Whether the probed duration is usable for planning.
    pub fn has_known_duration(&self) -> bool {
        self.duration_seconds.is_finite() && self.duration_seconds > 0.0
    }
}

/// Guess a MIME type from the file extension.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "ts" | "m2ts" => "video/mp2t",
        "mpg" | "mpeg" => "video/mpeg",
        "flv" => "video/x-flv",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// SplitSpec
// ---------------------------------------------------------------------------

/// How the timeline should be divided. Exactly one mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitSpec {
    /// Split into `count` equal parts.
    Parts { count: u32 },
    /// Derive a part count from the file size so each part is roughly
    /// `target_mb` megabytes.
    BySize { target_mb: u64 },
    /// Split into parts of `target_seconds` each; the last part takes the
    /// remainder.
    ByTime { target_seconds: f64 },
}

impl SplitSpec {
    /// Reject values below the policy minimums.
    pub fn validate(&self) -> Result<()> {
        match *self {
            SplitSpec::Parts { count } if count < MIN_PARTS => Err(Error::Validation(format!(
                "part count must be at least {MIN_PARTS}, got {count}"
            ))),
            SplitSpec::BySize { target_mb } if target_mb < MIN_TARGET_MB => {
                Err(Error::Validation(format!(
                    "target size must be at least {MIN_TARGET_MB} MB, got {target_mb}"
                )))
            }
            SplitSpec::ByTime { target_seconds }
                if !target_seconds.is_finite() || target_seconds < MIN_TARGET_SECONDS =>
            {
                Err(Error::Validation(format!(
                    "target duration must be at least {MIN_TARGET_SECONDS}s, got {target_seconds}s"
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for SplitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parts { count } => write!(f, "{count} equal parts"),
            Self::BySize { target_mb } => write!(f, "~{target_mb} MB parts"),
            Self::ByTime { target_seconds } => write!(f, "{target_seconds}s parts"),
        }
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// A contiguous `[start, start + duration)` slice of the source timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Zero-based position in the plan.
    pub index: usize,
    /// Start offset in seconds.
    pub start: f64,
    /// Length in seconds; always positive.
    pub duration: f64,
}

impl Window {
    /// End offset in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

// ---------------------------------------------------------------------------
// EncodingPolicy
// ---------------------------------------------------------------------------

/// Fixed re-encode parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReEncodeParams {
    pub video_codec: String,
    pub video_crf: u8,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for ReEncodeParams {
    fn default() -> Self {
        Self {
            video_codec: "libx264".into(),
            video_crf: 23,
            preset: "veryfast".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
        }
    }
}

/// Whether the engine copies streams verbatim or re-encodes each window.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodingPolicy {
    /// Repackage without re-encoding; cut points snap to keyframes.
    #[default]
    StreamCopy,
    /// Decode and re-encode; frame-accurate cuts.
    ReEncode(ReEncodeParams),
}

impl fmt::Display for EncodingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamCopy => write!(f, "stream copy"),
            Self::ReEncode(p) => write!(
                f,
                "re-encode ({} crf {}, {} {})",
                p.video_codec, p.video_crf, p.audio_codec, p.audio_bitrate
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputArtifact
// ---------------------------------------------------------------------------

/// One produced part, held in memory until saved or discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputArtifact {
    /// File name the part is offered under.
    pub name: String,
    /// Encoded media bytes.
    pub data: Bytes,
    /// Where the part was saved, once it has been.
    pub location: Option<PathBuf>,
}

impl OutputArtifact {
    pub fn new(name: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            data,
            location: None,
        }
    }

    /// Size of the blob in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
