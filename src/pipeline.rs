//! End-to-end orchestration: sample, analyse, consolidate, synthesize
//!
//! Frames are captured strictly one after another because every capture
//! seeks the same source. Once all frames are in memory they are analysed
//! either sequentially or on the rayon pool; in both cases the outcomes stay
//! in frame order and exactly one outcome exists per frame.

use rayon::prelude::*;
use tracing::{instrument, info, debug};

use crate::{
    analyzer::{AnalysisOutcome, FrameAnalyzer, Provenance},
    classifier::{DisabledClassifier, HttpClassifier, LabelClassifier},
    common::{Frame, PromptGenError, Result},
    config::PipelineConfig,
    consolidator::consolidate,
    frame_sampler::FrameSampler,
    prompt::{synthesize, PromptResult},
    video_stream::VideoSource,
};

/// Per-frame progress notification
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    FrameCaptured { index: usize, timestamp: f64 },
    FrameAnalyzed { index: usize, provenance: Provenance },
}

/// Callback receiving progress events; may be called from rayon workers
pub type ProgressCallback<'a> = &'a (dyn Fn(&ProgressEvent) + Sync);

/// Configured pipeline turning a video source into a prompt
pub struct PromptPipeline<C: LabelClassifier = Box<dyn LabelClassifier>> {
    config: PipelineConfig,
    analyzer: FrameAnalyzer<C>,
}

impl PromptPipeline {
    /// Build a pipeline whose classifier follows the configuration
    ///
    /// # Errors
    /// * `InvalidConfig` - If the configuration fails validation
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let classifier: Box<dyn LabelClassifier> = if config.classifier.enabled {
            Box::new(HttpClassifier::new(&config.classifier)?)
        } else {
            info!("Remote classifier disabled; every frame will be analysed locally");
            Box::new(DisabledClassifier)
        };
        Self::with_classifier(config, classifier)
    }
}

impl<C: LabelClassifier> PromptPipeline<C> {
    /// Build a pipeline around a specific classifier
    ///
    /// # Errors
    /// * `InvalidConfig` - If the configuration fails validation
    pub fn with_classifier(config: PipelineConfig, classifier: C) -> Result<Self> {
        config.validate()?;
        let analyzer = FrameAnalyzer::new(classifier, config.classifier.jpeg_quality);
        Ok(Self { config, analyzer })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline without progress reporting
    pub fn run<S: VideoSource + ?Sized>(&self, source: &mut S, source_label: &str) -> Result<PromptResult> {
        self.run_with_progress(source, source_label, &|_| {})
    }

    /// Run the pipeline, reporting each captured and analysed frame
    ///
    /// # Errors
    /// * `SourceUnavailable` - If the source cannot be sampled
    /// * `SeekTimeout` - If a seek does not settle
    /// * `MalformedBuffer` - If a frame cannot be analysed locally
    #[instrument(skip(self, source, progress))]
    pub fn run_with_progress<S: VideoSource + ?Sized>(
        &self,
        source: &mut S,
        source_label: &str,
        progress: ProgressCallback<'_>,
    ) -> Result<PromptResult> {
        info!("Generating prompt for {} ({} frames)", source_label, self.config.frame_count);

        let frames = self.capture_frames(source, progress)
            .map_err(|e| relabel_source(e, source_label))?;

        let outcomes = self.analyze_frames(&frames, progress)?;
        if outcomes.len() != self.config.frame_count {
            return Err(PromptGenError::FrameCountMismatch {
                expected: self.config.frame_count,
                actual: outcomes.len(),
            });
        }

        let consolidated = consolidate(&outcomes)?;
        Ok(synthesize(&consolidated).with_source(source_label))
    }

    fn capture_frames<S: VideoSource + ?Sized>(
        &self,
        source: &mut S,
        progress: ProgressCallback<'_>,
    ) -> Result<Vec<Frame>> {
        let sampler = FrameSampler::new(source, self.config.frame_count, self.config.seek_timeout())?;
        let mut frames = Vec::with_capacity(self.config.frame_count);

        for frame in sampler {
            let frame = frame?;
            progress(&ProgressEvent::FrameCaptured {
                index: frame.index(),
                timestamp: frame.timestamp(),
            });
            frames.push(frame);
        }

        debug!("Captured {} frames", frames.len());
        Ok(frames)
    }

    fn analyze_frames(&self, frames: &[Frame], progress: ProgressCallback<'_>) -> Result<Vec<AnalysisOutcome>> {
        let analyze = |frame: &Frame| -> Result<AnalysisOutcome> {
            let outcome = self.analyzer.analyze_frame(frame)?;
            progress(&ProgressEvent::FrameAnalyzed {
                index: frame.index(),
                provenance: outcome.provenance(),
            });
            Ok(outcome)
        };

        if self.config.parallel_analysis {
            debug!("Analysing {} frames in parallel", frames.len());
            frames.par_iter().map(analyze).collect()
        } else {
            frames.iter().map(analyze).collect()
        }
    }
}

impl<C: LabelClassifier> std::fmt::Debug for PromptPipeline<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptPipeline")
            .field("config", &self.config)
            .field("analyzer", &self.analyzer)
            .finish()
    }
}

/// Attach the caller's name for the video to source errors raised by the sampler
fn relabel_source(err: PromptGenError, source_label: &str) -> PromptGenError {
    match err {
        PromptGenError::SourceUnavailable { reason, .. } => {
            PromptGenError::source_error(source_label, reason)
        }
        other => other,
    }
}
