//! Split orchestration: probe, plan, then process every window in order.
//!
//! The [`Orchestrator`] owns the lifecycle of one split at a time and reports
//! each state change and progress step on an [`EventBus`]. Any failure aborts
//! the whole split, drops the parts produced so far, and leaves the
//! orchestrator `Errored` until [`Orchestrator::reset`] is called.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use sf_core::events::{EventBus, EventPayload, SplitState};
use sf_core::{
    DurationProbe, EncodingPolicy, Error, MediaFile, OutputArtifact, Result, SharedEngine,
    SplitId, SplitSpec, Window,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::planner::{self, PlanOptions};
use crate::processor::SegmentProcessor;

struct Inner {
    split_id: SplitId,
    state: SplitState,
    artifacts: Vec<OutputArtifact>,
    cancel: CancellationToken,
}

/// Drives the probe, planner and segment processor for one split at a time.
pub struct Orchestrator {
    probe: Arc<dyn DurationProbe>,
    engine: SharedEngine,
    events: Arc<EventBus>,
    options: PlanOptions,
    inner: Mutex<Inner>,
}

impl Orchestrator {
    pub fn new(probe: Arc<dyn DurationProbe>, engine: SharedEngine, events: Arc<EventBus>) -> Self {
        Self {
            probe,
            engine,
            events,
            options: PlanOptions::default(),
            inner: Mutex::new(Inner {
                split_id: SplitId::new(),
                state: SplitState::Idle,
                artifacts: Vec::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Use non-default planning options (window overlap).
    pub fn with_plan_options(mut self, options: PlanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> SplitState {
        self.inner.lock().state
    }

    /// Identifier of the current (or most recent) split.
    pub fn split_id(&self) -> SplitId {
        self.inner.lock().split_id
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Parts held from the last completed split.
    pub fn artifacts(&self) -> Vec<OutputArtifact> {
        self.inner.lock().artifacts.clone()
    }

    /// Hand the held parts to the caller, leaving none behind.
    pub fn take_artifacts(&self) -> Vec<OutputArtifact> {
        std::mem::take(&mut self.inner.lock().artifacts)
    }

    /// Token that cancels the current split. It is checked between windows;
    /// a window already submitted to the engine always runs to completion.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.lock().cancel.clone()
    }

    /// Return a finished split to `Idle`, dropping any held parts.
    ///
    /// # Errors
    ///
    /// [`Error::Conflict`] while a split is still running.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let from = inner.state;
        if from == SplitState::Idle {
            return Ok(());
        }
        if !from.is_terminal() {
            return Err(Error::Conflict(format!("cannot reset while {from}")));
        }

        inner.state = SplitState::Idle;
        inner.artifacts.clear();
        inner.cancel = CancellationToken::new();
        self.events.broadcast(EventPayload::StateChanged {
            split_id: inner.split_id,
            from,
            to: SplitState::Idle,
        });
        tracing::debug!("split {} reset", inner.split_id);
        Ok(())
    }

    /// Probe and plan `path` without producing any parts or changing state.
    pub async fn plan_only(&self, path: &Path, spec: &SplitSpec) -> Result<(MediaFile, Vec<Window>)> {
        let media = self.load(path).await?;
        let windows =
            planner::plan_with(media.duration_seconds, media.size_bytes, spec, &self.options)?;
        Ok((media, windows))
    }

    /// Split `path` according to `spec`, encoding each part under `policy`.
    ///
    /// On success the orchestrator is `Complete` and holds the parts, which
    /// are also returned. On failure it is `Errored` and holds nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::Conflict`] if the orchestrator is not `Idle`.
    /// - [`Error::UnsupportedFormat`] if the duration cannot be determined.
    /// - [`Error::Validation`] or [`Error::EmptyInput`] from planning.
    /// - [`Error::SegmentFailure`] if the engine fails on any window.
    /// - [`Error::Cancelled`] if the token fired between windows.
    pub async fn split(
        &self,
        path: &Path,
        spec: &SplitSpec,
        policy: &EncodingPolicy,
    ) -> Result<Vec<OutputArtifact>> {
        let (split_id, cancel) = self.begin()?;
        let span = tracing::info_span!("split", id = %split_id);

        match self.run(path, spec, policy, &cancel).instrument(span).await {
            Ok(artifacts) => {
                self.inner.lock().artifacts = artifacts.clone();
                Ok(artifacts)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn begin(&self) -> Result<(SplitId, CancellationToken)> {
        let mut inner = self.inner.lock();
        if inner.state != SplitState::Idle {
            return Err(Error::Conflict(format!(
                "a split is already {}; reset before starting another",
                inner.state
            )));
        }

        inner.split_id = SplitId::new();
        inner.state = SplitState::Probing;
        self.events.broadcast(EventPayload::StateChanged {
            split_id: inner.split_id,
            from: SplitState::Idle,
            to: SplitState::Probing,
        });
        Ok((inner.split_id, inner.cancel.clone()))
    }

    async fn run(
        &self,
        path: &Path,
        spec: &SplitSpec,
        policy: &EncodingPolicy,
        cancel: &CancellationToken,
    ) -> Result<Vec<OutputArtifact>> {
        let media = self.load(path).await?;
        tracing::info!(
            "{}: {:.3}s, {} bytes, {}",
            media.name,
            media.duration_seconds,
            media.size_bytes,
            media.mime_type
        );

        self.transition(SplitState::Planning)?;
        let windows =
            planner::plan_with(media.duration_seconds, media.size_bytes, spec, &self.options)?;
        let total = windows.len();
        tracing::info!("{spec}: {total} part(s), {policy}");

        let split_id = self.split_id();
        let processor = SegmentProcessor::new(&media, policy);
        let mut artifacts = Vec::with_capacity(total);

        let engine = self.engine.lock().await;
        tracing::debug!("acquired {} engine", engine.name());

        for window in &windows {
            if cancel.is_cancelled() {
                tracing::info!("cancelled before part {}", window.index + 1);
                return Err(Error::Cancelled);
            }

            self.transition(SplitState::Processing {
                index: window.index,
                total,
            })?;
            self.events.broadcast(EventPayload::Progress {
                split_id,
                percent: percent(window.index, total),
            });

            let artifact = processor.process(&*engine, window).await?;
            self.events.broadcast(EventPayload::SegmentCompleted {
                split_id,
                index: window.index,
                name: artifact.name.clone(),
                bytes: artifact.len() as u64,
            });
            artifacts.push(artifact);
        }
        drop(engine);

        self.transition(SplitState::Complete)?;
        self.events.broadcast(EventPayload::Progress {
            split_id,
            percent: 100,
        });
        tracing::info!("split complete: {} part(s)", artifacts.len());

        Ok(artifacts)
    }

    async fn load(&self, path: &Path) -> Result<MediaFile> {
        let media = describe(self.probe.as_ref(), path).await?;
        if !media.has_known_duration() {
            return Err(Error::UnsupportedFormat(format!(
                "{}: {} could not determine a duration",
                path.display(),
                self.probe.name()
            )));
        }
        Ok(media)
    }

    fn transition(&self, to: SplitState) -> Result<()> {
        let mut inner = self.inner.lock();
        let from = inner.state;
        if !from.can_transition_to(&to) {
            return Err(Error::Internal(format!("illegal transition {from} -> {to}")));
        }

        inner.state = to;
        self.events.broadcast(EventPayload::StateChanged {
            split_id: inner.split_id,
            from,
            to,
        });
        tracing::debug!("{from} -> {to}");
        Ok(())
    }

    fn fail(&self, error: &Error) {
        let mut inner = self.inner.lock();
        let from = inner.state;
        inner.artifacts.clear();
        if !from.can_transition_to(&SplitState::Errored) {
            return;
        }

        inner.state = SplitState::Errored;
        self.events.broadcast(EventPayload::StateChanged {
            split_id: inner.split_id,
            from,
            to: SplitState::Errored,
        });
        self.events.broadcast(EventPayload::Failed {
            split_id: inner.split_id,
            error: error.to_string(),
        });
        tracing::error!("split failed while {from}: {error}");
    }
}

/// Read the size of `path` and probe its duration.
///
/// The returned duration may be `0.0` (unknown); callers decide whether that
/// is acceptable.
pub async fn describe(probe: &dyn DurationProbe, path: &Path) -> Result<MediaFile> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(Error::UnsupportedFormat(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    let duration = probe.probe(path).await?;
    Ok(MediaFile::new(path, metadata.len(), duration))
}

/// `round(index / total * 100)`.
fn percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((index as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use bytes::Bytes;
    use sf_core::{Engine, SegmentCommand};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct FakeProbe(f64);

    #[async_trait]
    impl DurationProbe for FakeProbe {
        fn name(&self) -> &'static str {
            "fake-probe"
        }

        async fn probe(&self, _path: &Path) -> Result<f64> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        calls: Arc<parking_lot::Mutex<Vec<SegmentCommand>>>,
        fail_on: Option<usize>,
        cancel_after_first: Arc<parking_lot::Mutex<Option<CancellationToken>>>,
    }

    #[async_trait]
    impl Engine for FakeEngine {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn submit(&self, command: &SegmentCommand) -> Result<Bytes> {
            let call = {
                let mut calls = self.calls.lock();
                calls.push(command.clone());
                calls.len() - 1
            };
            if self.fail_on == Some(call) {
                return Err(Error::tool("fake", "decoder error"));
            }
            if let Some(token) = self.cancel_after_first.lock().as_ref() {
                token.cancel();
            }
            tokio::task::yield_now().await;
            Ok(Bytes::from(vec![0u8; 16]))
        }
    }

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        calls: Arc<parking_lot::Mutex<Vec<SegmentCommand>>>,
        orch: Orchestrator,
    }

    fn fixture(duration: f64, engine: FakeEngine) -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![1u8; 4096]).unwrap();

        let calls = engine.calls.clone();
        let shared: SharedEngine = Arc::new(tokio::sync::Mutex::new(engine));
        let orch = Orchestrator::new(
            Arc::new(FakeProbe(duration)),
            shared,
            Arc::new(EventBus::default()),
        );
        Fixture {
            _dir: dir,
            path,
            calls,
            orch,
        }
    }

    #[tokio::test]
    async fn two_parts_end_to_end() {
        let f = fixture(120.0, FakeEngine::default());
        let parts = f
            .orch
            .split(&f.path, &SplitSpec::Parts { count: 2 }, &EncodingPolicy::StreamCopy)
            .await
            .unwrap();

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "1_clip_1.mp4");
        assert_eq!(parts[1].name, "2_clip_2.mp4");
        assert_eq!(f.orch.state(), SplitState::Complete);
        assert_eq!(f.orch.artifacts().len(), 2);

        let id = f.orch.split_id();
        assert_eq!(
            f.orch.events().state_history(id),
            vec![
                SplitState::Probing,
                SplitState::Planning,
                SplitState::Processing { index: 0, total: 2 },
                SplitState::Processing { index: 1, total: 2 },
                SplitState::Complete,
            ]
        );
        assert_eq!(f.orch.events().progress_history(id), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn commands_follow_the_plan_in_order() {
        let f = fixture(95.0, FakeEngine::default());
        f.orch
            .split(
                &f.path,
                &SplitSpec::ByTime { target_seconds: 30.0 },
                &EncodingPolicy::StreamCopy,
            )
            .await
            .unwrap();

        let calls = f.calls.lock();
        let spans: Vec<(f64, f64)> = calls.iter().map(|c| (c.start, c.duration)).collect();
        assert_eq!(spans, vec![(0.0, 30.0), (30.0, 30.0), (60.0, 30.0), (90.0, 5.0)]);
        assert!(calls.iter().all(|c| c.input == f.path));
        assert_eq!(calls[3].output_name, "4_clip_4.mp4");
    }

    #[tokio::test]
    async fn segment_failure_discards_everything() {
        let engine = FakeEngine {
            fail_on: Some(1),
            ..FakeEngine::default()
        };
        let f = fixture(90.0, engine);
        let err = f
            .orch
            .split(&f.path, &SplitSpec::Parts { count: 3 }, &EncodingPolicy::StreamCopy)
            .await
            .unwrap_err();

        assert_matches!(err, Error::SegmentFailure { index: 1, .. });
        assert_eq!(f.orch.state(), SplitState::Errored);
        assert!(f.orch.artifacts().is_empty());
        assert_eq!(f.calls.lock().len(), 2);

        let id = f.orch.split_id();
        assert_eq!(f.orch.events().state_history(id).last(), Some(&SplitState::Errored));
        assert_eq!(f.orch.events().progress_history(id), vec![0, 33]);
    }

    #[tokio::test]
    async fn unknown_duration_is_unsupported() {
        let f = fixture(0.0, FakeEngine::default());
        let err = f
            .orch
            .split(&f.path, &SplitSpec::Parts { count: 2 }, &EncodingPolicy::StreamCopy)
            .await
            .unwrap_err();

        assert_matches!(err, Error::UnsupportedFormat(_));
        assert_eq!(f.orch.state(), SplitState::Errored);
        assert!(f.calls.lock().is_empty());
        assert_eq!(
            f.orch.events().state_history(f.orch.split_id()),
            vec![SplitState::Probing, SplitState::Errored]
        );
    }

    #[tokio::test]
    async fn invalid_spec_errors_from_planning() {
        let f = fixture(60.0, FakeEngine::default());
        let err = f
            .orch
            .split(&f.path, &SplitSpec::Parts { count: 1 }, &EncodingPolicy::StreamCopy)
            .await
            .unwrap_err();

        assert_matches!(err, Error::Validation(_));
        assert_eq!(
            f.orch.events().state_history(f.orch.split_id()),
            vec![SplitState::Probing, SplitState::Planning, SplitState::Errored]
        );
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let f = fixture(60.0, FakeEngine::default());
        let err = f
            .orch
            .split(
                &f.path.with_file_name("nope.mp4"),
                &SplitSpec::Parts { count: 2 },
                &EncodingPolicy::StreamCopy,
            )
            .await
            .unwrap_err();
        assert_matches!(err, Error::Io { .. });
        assert_eq!(f.orch.state(), SplitState::Errored);
    }

    #[tokio::test]
    async fn second_split_conflicts_until_reset() {
        let f = fixture(60.0, FakeEngine::default());
        let spec = SplitSpec::Parts { count: 2 };
        f.orch.split(&f.path, &spec, &EncodingPolicy::StreamCopy).await.unwrap();
        let first_id = f.orch.split_id();

        let err = f
            .orch
            .split(&f.path, &spec, &EncodingPolicy::StreamCopy)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Conflict(_));
        assert_eq!(f.orch.state(), SplitState::Complete);
        assert_eq!(f.orch.artifacts().len(), 2);

        f.orch.reset().unwrap();
        assert_eq!(f.orch.state(), SplitState::Idle);
        assert!(f.orch.artifacts().is_empty());

        f.orch.split(&f.path, &spec, &EncodingPolicy::StreamCopy).await.unwrap();
        assert_ne!(f.orch.split_id(), first_id);
        assert_eq!(f.calls.lock().len(), 4);
    }

    #[tokio::test]
    async fn concurrent_split_is_rejected() {
        let f = fixture(60.0, FakeEngine::default());
        let spec = SplitSpec::Parts { count: 2 };
        let (a, b) = tokio::join!(
            f.orch.split(&f.path, &spec, &EncodingPolicy::StreamCopy),
            f.orch.split(&f.path, &spec, &EncodingPolicy::StreamCopy),
        );
        assert!(a.is_ok());
        assert_matches!(b, Err(Error::Conflict(_)));
        assert_eq!(f.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn reset_is_a_noop_when_idle() {
        let f = fixture(60.0, FakeEngine::default());
        f.orch.reset().unwrap();
        assert_eq!(f.orch.state(), SplitState::Idle);
        assert!(f.orch.events().recent_events(10).is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_between_windows() {
        let slot = Arc::new(parking_lot::Mutex::new(None));
        let engine = FakeEngine {
            cancel_after_first: slot.clone(),
            ..FakeEngine::default()
        };
        let f = fixture(90.0, engine);
        *slot.lock() = Some(f.orch.cancellation_token());

        let err = f
            .orch
            .split(&f.path, &SplitSpec::Parts { count: 3 }, &EncodingPolicy::StreamCopy)
            .await
            .unwrap_err();

        assert_matches!(err, Error::Cancelled);
        assert_eq!(f.orch.state(), SplitState::Errored);
        assert!(f.orch.artifacts().is_empty());
        assert_eq!(f.calls.lock().len(), 1);

        f.orch.reset().unwrap();
        assert!(!f.orch.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn plan_only_leaves_state_alone() {
        let f = fixture(100.0, FakeEngine::default());
        let (media, windows) = f
            .orch
            .plan_only(&f.path, &SplitSpec::Parts { count: 4 })
            .await
            .unwrap();

        assert_eq!(media.name, "clip.mp4");
        assert_eq!(media.size_bytes, 4096);
        assert_eq!(windows.len(), 4);
        assert_eq!(f.orch.state(), SplitState::Idle);
        assert!(f.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn overlap_option_reaches_the_engine() {
        let Fixture {
            _dir,
            path,
            calls,
            orch,
        } = fixture(100.0, FakeEngine::default());
        let orch = orch.with_plan_options(PlanOptions { overlap_ratio: 0.1 });
        orch.split(&path, &SplitSpec::Parts { count: 2 }, &EncodingPolicy::StreamCopy)
            .await
            .unwrap();

        let calls = calls.lock();
        assert_eq!(calls[0].start, 0.0);
        assert!((calls[1].start - 45.0).abs() < planner::TOLERANCE);
        assert!((calls[1].duration - 55.0).abs() < planner::TOLERANCE);
    }

    #[test]
    fn percent_rounds() {
        assert_eq!(percent(0, 2), 0);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 100);
    }
}
