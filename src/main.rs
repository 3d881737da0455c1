mod cli;

use splitforge::{config, output, progress};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ModeArgs};
use sf_av::{FfprobeProbe, ToolRegistry};
use sf_core::events::EventBus;
use sf_core::{EncodingPolicy, SplitSpec};
use sf_pipeline::{describe, Orchestrator, PlanOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct SplitOptions {
    input: PathBuf,
    spec: SplitSpec,
    reencode: bool,
    crf: Option<u8>,
    audio_bitrate: Option<String>,
    output_dir: Option<PathBuf>,
    overwrite: bool,
    overlap: Option<f64>,
}

fn unknown_duration(path: &Path) -> sf_core::Error {
    sf_core::Error::UnsupportedFormat(format!(
        "could not determine the duration of {}",
        path.display()
    ))
}

async fn split_file(opts: SplitOptions, config_path: Option<&Path>) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if !opts.input.exists() {
        anyhow::bail!("Input file does not exist: {}", opts.input.display());
    }
    opts.spec.validate()?;

    // Command-line flags win over the config file.
    if let Some(crf) = opts.crf {
        config.encoding.video_crf = crf;
    }
    if let Some(bitrate) = opts.audio_bitrate {
        config.encoding.audio_bitrate = bitrate;
    }
    if let Some(overlap) = opts.overlap {
        config.split.overlap_ratio = overlap;
    }
    if let Some(dir) = opts.output_dir {
        config.output.dir = dir;
    }
    config.output.overwrite |= opts.overwrite;
    config.check()?;

    let policy: EncodingPolicy = config.encoding.policy(opts.reencode);
    let plan_options = PlanOptions {
        overlap_ratio: config.split.overlap_ratio,
    };
    let output_dir = config.output.dir.clone();
    let overwrite = config.output.overwrite;

    let registry = ToolRegistry::discover(&config.tools);
    let probe = FfprobeProbe::from_registry(&registry)?;

    // Part names are known once planned; refuse before any encoding happens.
    let media = describe(&probe, &opts.input).await?;
    if !media.has_known_duration() {
        return Err(unknown_duration(&opts.input).into());
    }
    let windows =
        sf_pipeline::plan_with(media.duration_seconds, media.size_bytes, &opts.spec, &plan_options)?;
    let names: Vec<String> = windows
        .iter()
        .map(|w| sf_pipeline::artifact_name(media.base_name(), media.extension(), w.index))
        .collect();
    output::check_targets(names.iter().map(String::as_str), &output_dir, overwrite).await?;

    let engine = sf_av::shared_engine(&config.tools).await?;

    let events = Arc::new(EventBus::default());
    let orchestrator =
        Orchestrator::new(Arc::new(probe), engine, events.clone()).with_plan_options(plan_options);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current part");
            cancel.cancel();
        }
    });

    tracing::info!("Splitting {} into {}", opts.input.display(), opts.spec);

    let stop = CancellationToken::new();
    let reporter = progress::spawn_reporter(&events, stop.clone());
    let result = orchestrator.split(&opts.input, &opts.spec, &policy).await;
    stop.cancel();
    let _ = reporter.await;
    sf_av::release_shared_engine().await;

    let mut artifacts =
        result.with_context(|| format!("Failed to split {}", opts.input.display()))?;
    let paths = output::save_artifacts(&mut artifacts, &output_dir, overwrite)
        .await
        .with_context(|| format!("Failed to save parts to {}", output_dir.display()))?;

    for path in &paths {
        println!("{}", path.display());
    }
    tracing::info!("Wrote {} part(s) to {}", paths.len(), output_dir.display());

    Ok(())
}

async fn plan_file(
    input: &Path,
    mode: &ModeArgs,
    overlap: Option<f64>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let spec = mode.spec();
    let registry = ToolRegistry::discover(&config.tools);
    let probe = FfprobeProbe::from_registry(&registry)?;

    let media = describe(&probe, input).await?;
    if !media.has_known_duration() {
        return Err(unknown_duration(input).into());
    }

    let options = PlanOptions {
        overlap_ratio: overlap.unwrap_or(config.split.overlap_ratio),
    };
    let windows =
        sf_pipeline::plan_with(media.duration_seconds, media.size_bytes, &spec, &options)?;

    if json {
        let value = serde_json::json!({
            "file": media,
            "spec": spec,
            "windows": windows,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {} ({:.3}s, {} bytes)", media.name, media.duration_seconds, media.size_bytes);
    println!("Split: {spec} -> {} part(s)\n", windows.len());
    println!("{:>4}  {:>12}  {:>12}  {:>12}  name", "#", "start", "duration", "end");
    for w in &windows {
        println!(
            "{:>4}  {:>12.3}  {:>12.3}  {:>12.3}  {}",
            w.index + 1,
            w.start,
            w.duration,
            w.end(),
            sf_pipeline::artifact_name(media.base_name(), media.extension(), w.index)
        );
    }

    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let registry = ToolRegistry::discover(&config.tools);
    let probe = FfprobeProbe::from_registry(&registry)?;
    let media = describe(&probe, file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&media)?);
    } else {
        println!("File: {}", media.path.display());
        println!("Size: {} bytes", media.size_bytes);
        println!("Type: {}", media.mime_type);
        if media.has_known_duration() {
            let millis = (media.duration_seconds * 1000.0).round() as u64;
            let secs = millis / 1000;
            println!(
                "Duration: {:02}:{:02}:{:02}.{:03}",
                secs / 3600,
                (secs / 60) % 60,
                secs % 60,
                millis % 1000
            );
        } else {
            println!("Duration: unknown");
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable splitting.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let (config, source) = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            (config::load_config(p)?, p.display().to_string())
        }
        None => {
            println!("No config file specified, using defaults");
            (config::Config::default(), "defaults".to_string())
        }
    };

    println!("✓ Configuration is valid ({source})");
    println!("  Encoding: {}", config.encoding.policy(true));
    println!("  Overlap: {}", config.split.overlap_ratio);
    println!("  Output: {} (overwrite: {})", config.output.dir.display(), config.output.overwrite);
    match config.tools.timeout_secs {
        Some(secs) => println!("  Tool timeout: {secs}s"),
        None => println!("  Tool timeout: none"),
    }

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Split {
            input,
            mode,
            reencode,
            crf,
            audio_bitrate,
            output_dir,
            overwrite,
            overlap,
        } => {
            let opts = SplitOptions {
                input,
                spec: mode.spec(),
                reencode,
                crf,
                audio_bitrate,
                output_dir,
                overwrite,
                overlap,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(split_file(opts, config_path))
        }
        Commands::Plan {
            input,
            mode,
            overlap,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(plan_file(&input, &mode, overlap, json, config_path))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, config_path))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => validate_config(validate_path.as_deref().or(config_path)),
        Commands::Version => {
            println!("splitforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "splitforge=trace,sf_pipeline=trace,sf_av=debug,sf_core=debug".to_string()
        } else {
            "splitforge=info,sf_pipeline=info,sf_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(splitforge::exit_code(&e))
        }
    }
}
