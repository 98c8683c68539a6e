//! Command-line interface for the video prompt generator
//!
//! Samples frames from a video file, analyses them and prints the generated
//! prompt. The classifier token is read from `HF_API_TOKEN` unless the config
//! file provides one.

use std::path::PathBuf;
use std::process;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn, debug};
use rust_videoprompt::{
    analyze_video_with_progress, get_video_info, init_tracing,
    PipelineConfig, ProgressEvent, PromptResult, Provenance, TOKEN_ENV_VAR,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Just the prompt
    Simple,
    /// Prompt plus the detail record
    Detailed,
    /// JSON for integration
    Json,
}

/// Generate a text-to-video prompt from a sample of a video's frames
#[derive(Parser, Debug)]
#[command(name = "rust-videoprompt")]
#[command(version)]
#[command(about = "Generate a generation prompt from sampled video frames")]
struct Args {
    /// Video file to analyse
    video_path: String,

    /// Number of frames to sample
    #[arg(long)]
    frames: Option<usize>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Remote classifier endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Remote classifier timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip the remote classifier and analyse every frame locally
    #[arg(long)]
    no_remote: bool,

    /// Analyse captured frames in parallel
    #[arg(long)]
    parallel: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Simple)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Show video information only
    #[arg(long)]
    info: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let log_level = if args.verbose { "debug" } else { "info" };
    init_tracing(log_level);

    info!("Video prompt generator CLI v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if args.info {
        return show_video_info(&args.video_path);
    }

    let config = build_config(&args)?;

    let start_time = Instant::now();
    let result = analyze_video_with_progress(&args.video_path, &config, &log_progress)
        .with_context(|| format!("prompt generation failed for {}", args.video_path))?;
    let elapsed = start_time.elapsed();

    output_result(&result, args.format, elapsed)
}

/// Merge config file, CLI flags and the token environment variable
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(frames) = args.frames {
        config.frame_count = frames;
    }
    if let Some(endpoint) = &args.endpoint {
        config.classifier.endpoint = endpoint.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.classifier.timeout_ms = timeout_ms;
    }
    if args.no_remote {
        config.classifier.enabled = false;
    }
    if args.parallel {
        config.parallel_analysis = true;
    }
    if config.classifier.api_token.is_none() {
        config.classifier.api_token = std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty());
    }

    if config.classifier.enabled && config.classifier.api_token.is_none() {
        warn!("{} is not set; the remote classifier will likely reject requests", TOKEN_ENV_VAR);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn log_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::FrameCaptured { index, timestamp } => {
            debug!("Captured frame {} at {:.2}s", index + 1, timestamp);
        }
        ProgressEvent::FrameAnalyzed { index, provenance } => {
            debug!("Analysed frame {} ({:?})", index + 1, provenance);
        }
    }
}

fn show_video_info(video_path: &str) -> Result<()> {
    info!("Inspecting video: {}", video_path);

    let video_info = get_video_info(video_path)
        .with_context(|| format!("failed to get video info for {}", video_path))?;

    println!("Video Information:");
    println!("  Path: {}", video_info.path);
    println!("  Dimensions: {}x{}", video_info.width, video_info.height);
    println!("  Frame Rate: {:.2} fps", video_info.fps);
    println!("  Frame Count: {}", video_info.frame_count);
    println!("  Duration: {:.2} seconds", video_info.duration_seconds);
    println!("  Description: {}", video_info.description());

    if !video_info.is_valid() {
        warn!("Video properties appear invalid - sampling may fail");
    }

    Ok(())
}

fn output_result(result: &PromptResult, format: OutputFormat, elapsed: Duration) -> Result<()> {
    let details = &result.details;

    match format {
        OutputFormat::Simple => {
            println!("{}", result.prompt);
        }
        OutputFormat::Detailed => {
            println!("Prompt:");
            println!("  {}", result.prompt);
            println!("Details:");
            println!("  Styles: {}", details.detected_styles.join(", "));
            println!("  Elements: {}", details.visual_elements.join(", "));
            println!("  Confidence: {}%", details.confidence);
            println!("  Provenance: {}", details.provenance);
            println!("  Model: {}", details.model);
            println!("  Method: {}", details.processing_method);
            println!("  Frames analysed: {}", details.frames_analyzed);
            let per_frame: Vec<&str> = details.frame_provenance.iter()
                .map(|p| match p {
                    Provenance::Remote => "remote",
                    Provenance::Fallback => "fallback",
                })
                .collect();
            println!("  Per-frame path: {}", per_frame.join(", "));
            if let Some(color) = &details.dominant_color {
                println!("  Dominant color: {}", color);
            }
            if let Some(technical) = &details.technical {
                println!("  Brightness: {:.1}", technical.colors.brightness);
                println!("  Saturation: {:.3}", technical.colors.saturation);
                println!("  Temperature: {}", technical.colors.temperature.as_str());
                println!("  Complexity: {}", technical.edges.complexity.as_str());
            }
            if !details.raw_labels.is_empty() {
                println!("  Raw labels: {}", details.raw_labels.join(", "));
            }
            println!("  Analysis time: {}ms", elapsed.as_millis());
        }
        OutputFormat::Json => {
            let json_output = serde_json::json!({
                "prompt": result.prompt,
                "details": details,
                "analysis_time_ms": elapsed.as_millis() as u64,
            });
            println!("{}", serde_json::to_string_pretty(&json_output)
                .context("JSON serialization failed")?);
        }
    }

    info!("Analysis completed in {}ms ({} prompt characters)",
          elapsed.as_millis(), result.prompt.len());

    Ok(())
}
