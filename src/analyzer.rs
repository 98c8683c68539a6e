//! Per-frame analysis with remote-first, local-fallback policy
//!
//! Each frame starts in `AttemptingRemote`. A successful classifier reply
//! finishes the frame directly; a `RemoteUnavailable` failure moves it to
//! `FallingBack`, where pixel statistics and the heuristic rule table produce
//! the analysis instead. There is no retry and no third tier: if the local
//! path fails the error is fatal for that frame.

use serde::{Deserialize, Serialize};
use tracing::{instrument, debug, trace, warn};

use crate::{
    classifier::{classify_frame, LabelClassifier},
    common::{Frame, PromptGenError, Result},
    features::{self, TechnicalStats},
    heuristics,
};

/// Which path produced a frame's analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Remote,
    Fallback,
}

/// Visual fingerprint of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub styles: Vec<String>,
    pub elements: Vec<String>,
    /// Confidence in 0-100
    pub confidence: f64,
    /// Labels returned by the classifier; only set on the remote path
    pub raw_labels: Option<Vec<String>>,
    /// Pixel statistics; only set on the fallback path
    pub technical: Option<TechnicalStats>,
}

/// Result of analysing one frame, tagged with the path that produced it
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Remote(FrameAnalysis),
    Fallback(FrameAnalysis),
}

impl AnalysisOutcome {
    pub fn provenance(&self) -> Provenance {
        match self {
            AnalysisOutcome::Remote(_) => Provenance::Remote,
            AnalysisOutcome::Fallback(_) => Provenance::Fallback,
        }
    }

    pub fn analysis(&self) -> &FrameAnalysis {
        match self {
            AnalysisOutcome::Remote(analysis) | AnalysisOutcome::Fallback(analysis) => analysis,
        }
    }

    pub fn into_analysis(self) -> FrameAnalysis {
        match self {
            AnalysisOutcome::Remote(analysis) | AnalysisOutcome::Fallback(analysis) => analysis,
        }
    }
}

/// States a frame passes through while being analysed
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyzerState {
    AttemptingRemote,
    /// The remote path failed for `reason`; the local path runs next
    FallingBack { reason: String },
    Done(AnalysisOutcome),
}

impl AnalyzerState {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyzerState::AttemptingRemote => "attempting-remote",
            AnalyzerState::FallingBack { .. } => "falling-back",
            AnalyzerState::Done(_) => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, AnalyzerState::Done(_))
    }
}

/// Analyses frames, trying the remote classifier before the local heuristics
pub struct FrameAnalyzer<C: LabelClassifier> {
    classifier: C,
    jpeg_quality: u8,
}

impl<C: LabelClassifier> FrameAnalyzer<C> {
    /// Create an analyzer around a classifier
    ///
    /// # Panics
    /// Panics if `jpeg_quality` is outside 1-100 (fail-fast approach)
    pub fn new(classifier: C, jpeg_quality: u8) -> Self {
        assert!((1..=100).contains(&jpeg_quality),
                "JPEG quality must be between 1 and 100, got: {}", jpeg_quality);
        Self { classifier, jpeg_quality }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Perform one transition for `frame`
    ///
    /// `AttemptingRemote` moves to `Done` on success or to `FallingBack` on
    /// `RemoteUnavailable`; `FallingBack` always moves to `Done`; `Done` is final.
    ///
    /// # Errors
    /// * `MalformedBuffer` - If the frame's pixels cannot be read
    pub fn step(&self, state: AnalyzerState, frame: &Frame) -> Result<AnalyzerState> {
        match state {
            AnalyzerState::AttemptingRemote => {
                match classify_frame(&self.classifier, frame.buffer(), self.jpeg_quality) {
                    Ok(analysis) => {
                        debug!("Frame {} analysed remotely ({:.1}% confidence)",
                               frame.index(), analysis.confidence);
                        Ok(AnalyzerState::Done(AnalysisOutcome::Remote(analysis)))
                    }
                    Err(PromptGenError::RemoteUnavailable { reason }) => {
                        warn!("Remote classifier failed for frame {}: {}; using local analysis",
                              frame.index(), reason);
                        Ok(AnalyzerState::FallingBack { reason })
                    }
                    Err(other) => Err(other),
                }
            }
            AnalyzerState::FallingBack { .. } => {
                let stats = features::extract(frame.buffer())?;
                let analysis = heuristics::interpret(stats);
                debug!("Frame {} analysed locally ({:.1}% confidence)",
                       frame.index(), analysis.confidence);
                Ok(AnalyzerState::Done(AnalysisOutcome::Fallback(analysis)))
            }
            done @ AnalyzerState::Done(_) => Ok(done),
        }
    }

    /// Analyse one frame, running the state machine from `AttemptingRemote` to `Done`
    ///
    /// # Errors
    /// * `MalformedBuffer` - If the frame's pixels cannot be read by the local path
    #[instrument(skip(self, frame), fields(index = frame.index()))]
    pub fn analyze_frame(&self, frame: &Frame) -> Result<AnalysisOutcome> {
        let mut state = AnalyzerState::AttemptingRemote;
        loop {
            trace!("Frame {} state: {}", frame.index(), state.name());
            state = match self.step(state, frame)? {
                AnalyzerState::Done(outcome) => {
                    trace!("Frame {} state: done ({:?})", frame.index(), outcome.provenance());
                    return Ok(outcome);
                }
                next => next,
            };
        }
    }
}

impl<C: LabelClassifier> std::fmt::Debug for FrameAnalyzer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameAnalyzer")
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{DisabledClassifier, LabelScore};
    use crate::common::PixelBuffer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClassifier {
        reply: Vec<LabelScore>,
        calls: AtomicUsize,
    }

    impl LabelClassifier for FixedClassifier {
        fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>> {
            assert!(!image.is_empty());
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct CountingFailure {
        calls: AtomicUsize,
    }

    impl LabelClassifier for CountingFailure {
        fn classify(&self, _image: &[u8]) -> Result<Vec<LabelScore>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PromptGenError::remote_error("HTTP 503 Service Unavailable"))
        }
    }

    fn red_frame(index: usize) -> Frame {
        Frame::new(index, index as f64, PixelBuffer::solid(100, 100, (255, 0, 0)))
    }

    #[test]
    fn test_state_transitions_on_remote_failure() {
        let analyzer = FrameAnalyzer::new(CountingFailure { calls: AtomicUsize::new(0) }, 85);
        let frame = red_frame(0);

        let state = analyzer.step(AnalyzerState::AttemptingRemote, &frame).unwrap();
        match &state {
            AnalyzerState::FallingBack { reason } => assert!(reason.contains("503")),
            other => panic!("expected FallingBack, got {:?}", other),
        }

        let state = analyzer.step(state, &frame).unwrap();
        assert!(state.is_done());
        assert!(matches!(state, AnalyzerState::Done(AnalysisOutcome::Fallback(_))));

        // Done is final and does not call the classifier again
        let again = analyzer.step(state.clone(), &frame).unwrap();
        assert_eq!(again, state);
        assert_eq!(analyzer.classifier().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_transitions_on_remote_success() {
        let classifier = FixedClassifier { reply: Vec::new(), calls: AtomicUsize::new(0) };
        let analyzer = FrameAnalyzer::new(classifier, 85);

        let state = analyzer.step(AnalyzerState::AttemptingRemote, &red_frame(0)).unwrap();
        assert_eq!(state.name(), "done");
        assert!(matches!(state, AnalyzerState::Done(AnalysisOutcome::Remote(_))));
    }

    #[test]
    fn test_fallback_state_skips_classifier() {
        let analyzer = FrameAnalyzer::new(CountingFailure { calls: AtomicUsize::new(0) }, 85);
        let state = AnalyzerState::FallingBack { reason: "timeout".into() };

        let state = analyzer.step(state, &red_frame(0)).unwrap();
        assert!(matches!(state, AnalyzerState::Done(AnalysisOutcome::Fallback(_))));
        assert_eq!(analyzer.classifier().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remote_success_skips_fallback() {
        let classifier = FixedClassifier {
            reply: vec![
                LabelScore { label: "cinematic shot".into(), score: 0.8 },
                LabelScore { label: "city street".into(), score: 0.15 },
            ],
            calls: AtomicUsize::new(0),
        };
        let analyzer = FrameAnalyzer::new(classifier, 85);

        let outcome = analyzer.analyze_frame(&red_frame(0)).unwrap();
        assert_eq!(outcome.provenance(), Provenance::Remote);

        let analysis = outcome.analysis();
        assert_eq!(analysis.styles, vec!["cinematic shot"]);
        assert_eq!(analysis.elements, vec!["city street"]);
        assert!((analysis.confidence - 80.0).abs() < 1e-9);
        assert!(analysis.technical.is_none());
        assert_eq!(analyzer.classifier().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remote_failure_falls_back_to_heuristics() {
        let analyzer = FrameAnalyzer::new(CountingFailure { calls: AtomicUsize::new(0) }, 85);

        let outcome = analyzer.analyze_frame(&red_frame(0)).unwrap();
        assert_eq!(outcome.provenance(), Provenance::Fallback);

        let analysis = outcome.into_analysis();
        assert!(analysis.styles.contains(&"warm tones".to_string()));
        assert!(analysis.raw_labels.is_none());
        let technical = analysis.technical.expect("fallback carries technical stats");
        assert_eq!(technical.colors.temperature, crate::features::Temperature::Warm);
        assert_eq!(technical.edges.complexity, crate::features::Complexity::Low);
    }

    #[test]
    fn test_each_frame_retries_remote_independently() {
        let analyzer = FrameAnalyzer::new(CountingFailure { calls: AtomicUsize::new(0) }, 85);
        for i in 0..3 {
            analyzer.analyze_frame(&red_frame(i)).unwrap();
        }
        assert_eq!(analyzer.classifier().calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_disabled_classifier_always_falls_back() {
        let analyzer = FrameAnalyzer::new(DisabledClassifier, 85);
        let outcome = analyzer.analyze_frame(&red_frame(0)).unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Fallback(_)));
    }

    #[test]
    fn test_malformed_buffer_is_fatal() {
        let broken = PixelBuffer { width: 4, height: 4, data: vec![0; 10] };
        let frame = Frame::new(0, 0.0, broken);
        let analyzer = FrameAnalyzer::new(CountingFailure { calls: AtomicUsize::new(0) }, 85);

        let result = analyzer.analyze_frame(&frame);
        assert!(matches!(result, Err(PromptGenError::MalformedBuffer { .. })));
    }

    #[test]
    #[should_panic(expected = "JPEG quality must be between 1 and 100")]
    fn test_invalid_jpeg_quality() {
        FrameAnalyzer::new(DisabledClassifier, 0);
    }
}
