//! ffmpeg-backed [`Engine`] and the process-wide engine slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sf_core::config::ToolsConfig;
use sf_core::{EncodingPolicy, Engine, SegmentCommand, SharedEngine};
use tokio::sync::{Mutex, OnceCell};

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;

/// Containers that understand `-movflags +faststart`.
const FASTSTART_EXTENSIONS: &[&str] = &["mp4", "m4v", "m4a", "mov"];

static SHARED: OnceCell<SharedEngine> = OnceCell::const_new();

/// Runs each [`SegmentCommand`] as one `ffmpeg` invocation, writing into a
/// private scratch directory and reading the result back into memory.
#[derive(Debug)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
    timeout: Option<Duration>,
    version: String,
    workspace: Workspace,
}

impl FfmpegEngine {
    /// Locate ffmpeg, confirm it runs, and create the scratch directory.
    ///
    /// # Errors
    ///
    /// Every failure is reported as [`sf_core::Error::EngineLoadFailure`].
    pub async fn load(tools: &ToolRegistry) -> sf_core::Result<Self> {
        let load_err = |e: sf_core::Error| sf_core::Error::EngineLoadFailure(e.to_string());

        let tool = tools.require("ffmpeg").map_err(load_err)?;
        let output = ToolCommand::new(tool.path.clone())
            .arg("-version")
            .execute()
            .await
            .map_err(load_err)?;
        let version = output.stdout.lines().next().unwrap_or("ffmpeg").to_string();
        let workspace = Workspace::new().map_err(load_err)?;

        tracing::info!("engine ready: {version}");

        Ok(Self {
            ffmpeg_path: tool.path.clone(),
            timeout: tool.timeout,
            version,
            workspace,
        })
    }

    /// First line of `ffmpeg -version`.
    pub fn version(&self) -> &str {
        &self.version
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn submit(&self, command: &SegmentCommand) -> sf_core::Result<Bytes> {
        let output = self.workspace.temp_file(&command.output_name);

        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.timeout(self.timeout);
        cmd.args(segment_args(command, &output));

        if let Err(e) = cmd.execute().await {
            self.workspace.discard(&output).await;
            return Err(e);
        }

        self.workspace.take(&output).await
    }

    fn release(&self) {
        self.workspace.remove();
    }
}

/// Build the ffmpeg argument list for one part.
///
/// Start and end are rounded to whole milliseconds and `-t` is their
/// difference, so adjacent parts meet exactly.
pub fn segment_args(command: &SegmentCommand, output: &Path) -> Vec<String> {
    let start_ms = to_millis(command.start);
    let end_ms = to_millis(command.start + command.duration).max(start_ms);

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-y".into(),
        "-ss".into(),
        format_millis(start_ms),
        "-i".into(),
        command.input.to_string_lossy().to_string(),
        "-t".into(),
        format_millis(end_ms - start_ms),
    ];

    match &command.policy {
        EncodingPolicy::StreamCopy => {
            args.extend(
                ["-map", "0", "-c", "copy", "-avoid_negative_ts", "make_zero"].map(String::from),
            );
        }
        EncodingPolicy::ReEncode(p) => {
            args.extend([
                "-c:v".to_string(),
                p.video_codec.clone(),
                "-preset".to_string(),
                p.preset.clone(),
                "-crf".to_string(),
                p.video_crf.to_string(),
                "-c:a".to_string(),
                p.audio_codec.clone(),
                "-b:a".to_string(),
                p.audio_bitrate.clone(),
            ]);
        }
    }

    if supports_faststart(output) {
        args.extend(["-movflags", "+faststart"].map(String::from));
    }

    args.push(output.to_string_lossy().to_string());
    args
}

fn supports_faststart(output: &Path) -> bool {
    output
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| FASTSTART_EXTENSIONS.contains(&ext.as_str()))
}

fn to_millis(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

/// Milliseconds as `S.mmm`, the form ffmpeg accepts for `-ss` / `-t`.
fn format_millis(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

/// Remove the shared engine's scratch directory.
///
/// The engine lives in a static and is never dropped, so the binary calls
/// this once it has finished with the engine.
pub async fn release_shared_engine() {
    if let Some(engine) = SHARED.get() {
        engine.lock().await.release();
    }
}

/// The process-wide engine, loaded on first use and kept until exit.
///
/// Holding the returned mutex grants exclusive use of the engine. A failed
/// load is not cached, so the next call tries again.
pub async fn shared_engine(tools_config: &ToolsConfig) -> sf_core::Result<SharedEngine> {
    SHARED
        .get_or_try_init(|| async {
            let registry = ToolRegistry::discover(tools_config);
            let engine = FfmpegEngine::load(&registry).await?;
            let shared: SharedEngine = Arc::new(Mutex::new(engine));
            Ok::<_, sf_core::Error>(shared)
        })
        .await
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::ReEncodeParams;

    fn command(policy: EncodingPolicy, name: &str) -> SegmentCommand {
        SegmentCommand {
            input: PathBuf::from("/media/in/talk.mp4"),
            start: 25.0,
            duration: 12.3456,
            policy,
            output_name: name.to_string(),
        }
    }

    #[test]
    fn stream_copy_args() {
        let cmd = command(EncodingPolicy::StreamCopy, "2_talk_2.mp4");
        let args = segment_args(&cmd, Path::new("/tmp/w/2_talk_2.mp4"));
        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostdin", "-y",
                "-ss", "25.000",
                "-i", "/media/in/talk.mp4",
                "-t", "12.346",
                "-map", "0",
                "-c", "copy",
                "-avoid_negative_ts", "make_zero",
                "-movflags", "+faststart",
                "/tmp/w/2_talk_2.mp4",
            ]
        );
    }

    #[test]
    fn reencode_args() {
        let params = ReEncodeParams {
            video_crf: 28,
            ..ReEncodeParams::default()
        };
        let cmd = command(EncodingPolicy::ReEncode(params), "1_talk_1.mp4");
        let args = segment_args(&cmd, Path::new("/tmp/w/1_talk_1.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264 -preset veryfast -crf 28 -c:a aac -b:a 128k"));
        assert!(!joined.contains("-c copy"));
        assert!(!joined.contains("-map"));
        assert!(!joined.contains("avoid_negative_ts"));
        assert!(joined.ends_with("-movflags +faststart /tmp/w/1_talk_1.mp4"));
    }

    #[test]
    fn faststart_only_for_mp4_family() {
        let cmd = command(EncodingPolicy::StreamCopy, "1_talk_1.mkv");
        let args = segment_args(&cmd, Path::new("/tmp/w/1_talk_1.mkv"));
        assert!(!args.iter().any(|a| a == "-movflags"));

        assert!(supports_faststart(Path::new("a.MOV")));
        assert!(supports_faststart(Path::new("a.m4a")));
        assert!(!supports_faststart(Path::new("a.wav")));
        assert!(!supports_faststart(Path::new("noext")));
    }

    #[test]
    fn seconds_formatting() {
        assert_eq!(format_millis(to_millis(0.0)), "0.000");
        assert_eq!(format_millis(to_millis(89.99999)), "90.000");
        assert_eq!(format_millis(to_millis(-1e-12)), "0.000");
        assert_eq!(format_millis(to_millis(3723.5)), "3723.500");
    }

    fn flag_millis(args: &[String], flag: &str) -> u64 {
        let i = args.iter().position(|a| a == flag).unwrap();
        let (secs, millis) = args[i + 1].split_once('.').unwrap();
        secs.parse::<u64>().unwrap() * 1000 + millis.parse::<u64>().unwrap()
    }

    #[test]
    fn adjacent_parts_meet_exactly() {
        let total = 100.0;
        let step = total / 3.0;
        let mut expected_start = 0;
        for i in 0..3 {
            let start = i as f64 * step;
            let end = if i == 2 { total } else { (i + 1) as f64 * step };
            let cmd = SegmentCommand {
                start,
                duration: end - start,
                ..command(EncodingPolicy::StreamCopy, "part.mkv")
            };
            let args = segment_args(&cmd, Path::new("/tmp/w/part.mkv"));
            let ss = flag_millis(&args, "-ss");
            assert_eq!(ss, expected_start, "part {i} starts at {ss}ms");
            expected_start = ss + flag_millis(&args, "-t");
        }
        assert_eq!(expected_start, 100_000);
    }

    #[tokio::test]
    async fn load_without_ffmpeg_is_engine_failure() {
        let cfg = ToolsConfig {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ..ToolsConfig::default()
        };
        let registry = ToolRegistry::discover(&cfg);
        if registry.require("ffmpeg").is_ok() {
            // ffmpeg is installed on PATH; nothing to assert here.
            return;
        }
        let err = FfmpegEngine::load(&registry).await.unwrap_err();
        assert!(matches!(err, sf_core::Error::EngineLoadFailure(_)));
    }
}
