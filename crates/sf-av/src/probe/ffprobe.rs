//! FFprobe-based [`sf_core::DurationProbe`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format` and reads
//! `format.duration` from the JSON output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sf_core::DurationProbe;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// A duration probe backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
    timeout: Option<Duration>,
}

impl FfprobeProbe {
    /// Create a new probe using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: None,
        }
    }

    /// Create a probe from the registry's `ffprobe` entry.
    pub fn from_registry(tools: &ToolRegistry) -> sf_core::Result<Self> {
        let tool = tools.require("ffprobe")?;
        Ok(Self {
            ffprobe_path: tool.path.clone(),
            timeout: tool.timeout,
        })
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> sf_core::Result<f64> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format"]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await.map_err(|e| {
            sf_core::Error::UnsupportedFormat(format!("{}: {e}", path.display()))
        })?;

        let duration = parse_duration(&output.stdout)?;
        tracing::debug!("{}: duration {duration:.3}s", path.display());
        Ok(duration)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Read `format.duration` from ffprobe JSON. A missing, unparsable, negative,
/// or non-finite duration is reported as `0.0` (unknown).
fn parse_duration(json: &str) -> sf_core::Result<f64> {
    let output: FfprobeOutput = serde_json::from_str(json).map_err(|e| {
        sf_core::Error::UnsupportedFormat(format!("ffprobe JSON parse error: {e}"))
    })?;

    let duration = output
        .format
        .and_then(|f| f.duration)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    Ok(duration)
}
