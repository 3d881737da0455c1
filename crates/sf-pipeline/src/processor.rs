//! Segment processing: one engine call per planned window.

use sf_core::{EncodingPolicy, Engine, Error, MediaFile, OutputArtifact, Result, SegmentCommand, Window};

/// Name of the part produced for window `index`: `{n}_{base}_{n}.{ext}` with
/// `n = index + 1`.
pub fn artifact_name(base_name: &str, extension: Option<&str>, index: usize) -> String {
    let n = index + 1;
    match extension {
        Some(ext) => format!("{n}_{base_name}_{n}.{ext}"),
        None => format!("{n}_{base_name}_{n}"),
    }
}

/// Turns windows of one source file into [`OutputArtifact`]s.
///
/// Calls must not overlap: every window decodes the same source, so the
/// orchestrator drives them one at a time.
#[derive(Debug, Clone, Copy)]
pub struct SegmentProcessor<'a> {
    source: &'a MediaFile,
    policy: &'a EncodingPolicy,
}

impl<'a> SegmentProcessor<'a> {
    pub fn new(source: &'a MediaFile, policy: &'a EncodingPolicy) -> Self {
        Self { source, policy }
    }

    /// The engine command for `window`.
    pub fn command_for(&self, window: &Window) -> SegmentCommand {
        SegmentCommand {
            input: self.source.path.clone(),
            start: window.start,
            duration: window.duration,
            policy: self.policy.clone(),
            output_name: artifact_name(
                self.source.base_name(),
                self.source.extension(),
                window.index,
            ),
        }
    }

    /// Produce the part for `window`.
    ///
    /// # Errors
    ///
    /// Any engine failure becomes [`Error::SegmentFailure`] for this window.
    pub async fn process(&self, engine: &dyn Engine, window: &Window) -> Result<OutputArtifact> {
        let command = self.command_for(window);
        tracing::info!(
            "part {}: {:.3}s +{:.3}s -> {} ({})",
            window.index + 1,
            command.start,
            command.duration,
            command.output_name,
            self.policy
        );

        let data = engine
            .submit(&command)
            .await
            .map_err(|e| Error::segment(window.index, e.to_string()))?;

        Ok(OutputArtifact::new(command.output_name, data))
    }
}
