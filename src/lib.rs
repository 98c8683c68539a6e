//! Video-to-prompt generation
//!
//! This crate samples a handful of frames from a video, fingerprints each one
//! with a remote image classifier (falling back to local pixel statistics when
//! the classifier is unreachable), merges the fingerprints and renders a text
//! prompt suitable for an image or video generation model.
//!
//! # Quick Start
//!
//! With the default `opencv` feature, `analyze_video` handles a video file
//! end to end. Any decoder can drive the pipeline by implementing [`VideoSource`]:
//!
//! ```rust,no_run
//! use rust_videoprompt::{PipelineConfig, PromptPipeline, VideoSource};
//!
//! fn describe<S: VideoSource>(source: &mut S) -> rust_videoprompt::Result<String> {
//!     let pipeline = PromptPipeline::from_config(PipelineConfig::default())?;
//!     Ok(pipeline.run(source, "in-memory")?.prompt)
//! }
//! ```

mod common;
mod video_stream;
mod frame_sampler;
mod features;
mod vocabulary;
mod classifier;
mod heuristics;
mod analyzer;
mod consolidator;
mod prompt;
mod pipeline;
mod config;

// Re-export main types for public API
pub use common::{Frame, PixelBuffer, PromptGenError, Result};
pub use video_stream::VideoSource;
#[cfg(feature = "opencv")]
pub use video_stream::VideoStream;
pub use frame_sampler::{sample_timestamps, sampling_interval, FrameSampler, MIN_SAMPLING_INTERVAL};
pub use features::{
    extract, ColorStats, Complexity, CompositionStats, EdgeStats, FocusVerdict, TechnicalStats,
    Temperature, ThirdsVerdict,
};
pub use vocabulary::{match_keywords, ELEMENT_KEYWORDS, STYLE_KEYWORDS, VOCABULARY_VERSION};
pub use classifier::{
    encode_jpeg, interpret_labels, DisabledClassifier, HttpClassifier, LabelClassifier, LabelScore,
};
pub use heuristics::{interpret, Rule, TagKind, RULES};
pub use analyzer::{AnalysisOutcome, AnalyzerState, FrameAnalysis, FrameAnalyzer, Provenance};
pub use consolidator::{consolidate, ConsolidatedAnalysis};
pub use prompt::{synthesize, PromptDetails, PromptResult, PROMPT_SUFFIX};
pub use pipeline::{ProgressCallback, ProgressEvent, PromptPipeline};
pub use config::{ClassifierConfig, PipelineConfig, DEFAULT_ENDPOINT, TOKEN_ENV_VAR};

use tracing::info;
#[cfg(feature = "opencv")]
use tracing::instrument;

/// Generate a prompt for a video file
///
/// Opens the file with OpenCV, samples `config.frame_count` frames and runs
/// the full pipeline.
///
/// # Example
/// ```rust,no_run
/// use rust_videoprompt::{analyze_video, PipelineConfig};
///
/// let mut config = PipelineConfig::default();
/// config.classifier.api_token = std::env::var("HF_API_TOKEN").ok();
///
/// let result = analyze_video("video.mp4", &config)?;
/// println!("{}", result.prompt);
/// println!("provenance: {}", result.details.provenance);
/// # Ok::<(), rust_videoprompt::PromptGenError>(())
/// ```
///
/// # Errors
/// * `InvalidConfig` - If the configuration fails validation
/// * `SourceUnavailable` - If the video cannot be opened or decoded
/// * `SeekTimeout` - If a seek does not settle in time
/// * `MalformedBuffer` - If a captured frame cannot be analysed
#[cfg(feature = "opencv")]
#[instrument(skip(config))]
pub fn analyze_video(video_path: &str, config: &PipelineConfig) -> Result<PromptResult> {
    analyze_video_with_progress(video_path, config, &|_| {})
}

/// Like [`analyze_video`], reporting each captured and analysed frame
#[cfg(feature = "opencv")]
pub fn analyze_video_with_progress(
    video_path: &str,
    config: &PipelineConfig,
    progress: ProgressCallback<'_>,
) -> Result<PromptResult> {
    let pipeline = PromptPipeline::from_config(config.clone())?;
    let mut stream = VideoStream::open(video_path)?;

    info!("Video properties: {}x{} at {:.2}fps, {:.2}s",
          stream.width(), stream.height(), stream.fps(), stream.duration_seconds());

    let result = pipeline.run_with_progress(&mut stream, video_path, progress)?;
    info!("Prompt generation completed for {} ({})", video_path, result.details.provenance);
    Ok(result)
}

/// Get video information without analysing any frames
///
/// # Arguments
/// * `video_path` - Path to the video file to inspect
///
/// # Returns
/// * `Result<VideoInfo>` - Video metadata including FPS, frame count, and dimensions
#[cfg(feature = "opencv")]
#[instrument]
pub fn get_video_info(video_path: &str) -> Result<VideoInfo> {
    let video_stream = VideoStream::open(video_path)?;

    Ok(VideoInfo {
        path: video_path.to_string(),
        fps: video_stream.fps(),
        frame_count: video_stream.frame_count().max(0) as u32,
        width: video_stream.width().max(0) as u32,
        height: video_stream.height().max(0) as u32,
        duration_seconds: video_stream.duration_seconds(),
    })
}

/// Video metadata information
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VideoInfo {
    pub path: String,
    pub fps: f64,
    pub frame_count: u32,
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
}

impl VideoInfo {
    /// Get a human-readable description of the video
    pub fn description(&self) -> String {
        format!(
            "{}x{} at {:.2}fps, {} frames ({:.1}s duration)",
            self.width, self.height, self.fps, self.frame_count, self.duration_seconds
        )
    }

    /// Check if the video can be sampled
    pub fn is_valid(&self) -> bool {
        self.fps > 0.0
            && self.frame_count > 0
            && self.width > 0
            && self.height > 0
            && self.duration_seconds.is_finite()
            && self.duration_seconds > 0.0
    }

    /// Timestamps the pipeline would sample for `frame_count` frames
    pub fn sample_plan(&self, frame_count: usize) -> Vec<f64> {
        if frame_count == 0 || !self.is_valid() {
            return Vec::new();
        }
        sample_timestamps(self.duration_seconds, frame_count)
    }
}

/// Initialize tracing for the library
///
/// Call this once at the start of your application to enable log output.
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Arguments
/// * `level` - Tracing level filter (e.g., "debug", "info", "warn", "error")
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    info!("Video prompt generator initialized with tracing level: {}", level);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> VideoInfo {
        VideoInfo {
            path: "test.mp4".to_string(),
            fps: 30.0,
            frame_count: 300,
            width: 640,
            height: 480,
            duration_seconds: 10.0,
        }
    }

    #[test]
    fn test_video_info_description() {
        let info = sample_info();
        assert!(info.is_valid());
        assert!(info.description().contains("640x480"));
        assert!(info.description().contains("30.00fps"));
        assert!(info.description().contains("300 frames"));
    }

    #[test]
    fn test_video_info_validation() {
        let valid_info = sample_info();

        let invalid_fps = VideoInfo { fps: 0.0, ..valid_info.clone() };
        assert!(!invalid_fps.is_valid());

        let invalid_frames = VideoInfo { frame_count: 0, ..valid_info.clone() };
        assert!(!invalid_frames.is_valid());

        let invalid_width = VideoInfo { width: 0, ..valid_info.clone() };
        assert!(!invalid_width.is_valid());

        let invalid_duration = VideoInfo { duration_seconds: f64::INFINITY, ..valid_info };
        assert!(!invalid_duration.is_valid());
    }

    #[test]
    fn test_sample_plan() {
        let info = sample_info();
        let plan = info.sample_plan(6);
        assert_eq!(plan.len(), 6);
        assert!((plan[5] - 50.0 / 6.0).abs() < 1e-9);

        assert!(info.sample_plan(0).is_empty());
        assert!(VideoInfo { fps: 0.0, ..info }.sample_plan(6).is_empty());
    }

    #[test]
    fn test_public_api_surface() {
        // Pipeline pieces are usable without a video decoder
        let stats = extract(&PixelBuffer::solid(4, 4, (10, 10, 10))).unwrap();
        let outcome = AnalysisOutcome::Fallback(interpret(stats));
        let result = synthesize(&consolidate(&[outcome]).unwrap());
        assert!(result.prompt.ends_with(PROMPT_SUFFIX));
        assert_eq!(VOCABULARY_VERSION, 1);
        assert_eq!(TOKEN_ENV_VAR, "HF_API_TOKEN");
    }
}
