//! Application configuration types.
//!
//! The top-level [`Config`] carries the tool, encoding, split, and output
//! sections. Every section defaults sensibly so a completely empty file is
//! valid. Reading the file is left to the caller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::media::{EncodingPolicy, ReEncodeParams};
use crate::Error;

/// Largest accepted overlap ratio (exclusive).
pub const MAX_OVERLAP_RATIO: f64 = 0.5;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub encoding: EncodingConfig,
    pub split: SplitConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Reject values that would make every split fail.
    pub fn check(&self) -> Result<()> {
        if self.encoding.video_crf > 51 {
            return Err(Error::Validation(format!(
                "encoding.video_crf must be between 0 and 51, got {}",
                self.encoding.video_crf
            )));
        }
        for (key, value) in [
            ("encoding.video_codec", &self.encoding.video_codec),
            ("encoding.audio_codec", &self.encoding.audio_codec),
            ("encoding.audio_bitrate", &self.encoding.audio_bitrate),
            ("encoding.preset", &self.encoding.preset),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("{key} must not be empty")));
            }
        }
        let overlap = self.split.overlap_ratio;
        if !(0.0..MAX_OVERLAP_RATIO).contains(&overlap) {
            return Err(Error::Validation(format!(
                "split.overlap_ratio must be in [0, {MAX_OVERLAP_RATIO}), got {overlap}"
            )));
        }
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{name} {} does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        if self.tools.timeout_secs == Some(0) {
            warnings.push("tools.timeout_secs is 0; every tool run will time out".into());
        }

        if self.split.overlap_ratio > 0.0 {
            warnings.push(format!(
                "split.overlap_ratio is {}; parts will overlap and not tile the timeline",
                self.split.overlap_ratio
            ));
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// External tool path overrides. When `None` the tool is searched on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Per-invocation limit. Unset means tools may run indefinitely.
    pub timeout_secs: Option<u64>,
}

impl ToolsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Parameters used when re-encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub video_codec: String,
    pub video_crf: u8,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        let p = ReEncodeParams::default();
        Self {
            video_codec: p.video_codec,
            video_crf: p.video_crf,
            preset: p.preset,
            audio_codec: p.audio_codec,
            audio_bitrate: p.audio_bitrate,
        }
    }
}

impl EncodingConfig {
    /// Build the policy for a run; `reencode == false` always yields stream copy.
    pub fn policy(&self, reencode: bool) -> EncodingPolicy {
        if !reencode {
            return EncodingPolicy::StreamCopy;
        }
        EncodingPolicy::ReEncode(ReEncodeParams {
            video_codec: self.video_codec.clone(),
            video_crf: self.video_crf,
            preset: self.preset.clone(),
            audio_codec: self.audio_codec.clone(),
            audio_bitrate: self.audio_bitrate.clone(),
        })
    }
}

/// Boundary planning options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of the nominal part length each window reaches back into its
    /// predecessor. `0.0` tiles the timeline exactly.
    pub overlap_ratio: f64,
}

/// Where produced parts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            overwrite: false,
        }
    }
}
