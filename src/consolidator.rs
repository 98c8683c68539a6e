//! Merges per-frame analyses into one video-level fingerprint

use serde::Serialize;
use tracing::{instrument, info};

use crate::{
    analyzer::{AnalysisOutcome, Provenance},
    common::{PromptGenError, Result},
    features::TechnicalStats,
};

/// Video-level union of all frame analyses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedAnalysis {
    pub styles: Vec<String>,
    pub elements: Vec<String>,
    /// Arithmetic mean of the per-frame confidences
    pub confidence: f64,
    /// Statistics of the first frame, when it was analysed locally
    pub technical: Option<TechnicalStats>,
    pub raw_labels: Vec<String>,
    /// Path taken by each contributing frame, in frame order
    pub provenance: Vec<Provenance>,
}

impl ConsolidatedAnalysis {
    pub fn frame_count(&self) -> usize {
        self.provenance.len()
    }

    /// True when at least one frame was classified remotely
    pub fn used_remote(&self) -> bool {
        self.provenance.contains(&Provenance::Remote)
    }
}

fn push_unique(target: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

/// Merge frame analyses in order
///
/// # Errors
/// * `EmptyInput` - If `outcomes` is empty
#[instrument(skip(outcomes), fields(frames = outcomes.len()))]
pub fn consolidate(outcomes: &[AnalysisOutcome]) -> Result<ConsolidatedAnalysis> {
    let first = outcomes.first().ok_or(PromptGenError::EmptyInput)?;

    let mut styles = Vec::new();
    let mut elements = Vec::new();
    let mut raw_labels = Vec::new();
    let mut confidence_sum = 0.0;

    for outcome in outcomes {
        let analysis = outcome.analysis();
        push_unique(&mut styles, &analysis.styles);
        push_unique(&mut elements, &analysis.elements);
        if let Some(labels) = &analysis.raw_labels {
            push_unique(&mut raw_labels, labels);
        }
        confidence_sum += analysis.confidence;
    }

    let consolidated = ConsolidatedAnalysis {
        styles,
        elements,
        confidence: confidence_sum / outcomes.len() as f64,
        technical: first.analysis().technical.clone(),
        raw_labels,
        provenance: outcomes.iter().map(AnalysisOutcome::provenance).collect(),
    };

    info!("Consolidated {} frames: {} styles, {} elements, {:.1}% confidence",
          outcomes.len(), consolidated.styles.len(), consolidated.elements.len(),
          consolidated.confidence);

    Ok(consolidated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FrameAnalysis;
    use crate::common::PixelBuffer;
    use crate::{features, heuristics};

    fn analysis(styles: &[&str], elements: &[&str], confidence: f64) -> FrameAnalysis {
        FrameAnalysis {
            styles: styles.iter().map(|s| s.to_string()).collect(),
            elements: elements.iter().map(|s| s.to_string()).collect(),
            confidence,
            raw_labels: None,
            technical: None,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(consolidate(&[]), Err(PromptGenError::EmptyInput)));
    }

    #[test]
    fn test_single_frame_confidence_is_identity() {
        let outcome = AnalysisOutcome::Remote(analysis(&["art"], &["sky"], 63.7));
        let merged = consolidate(&[outcome]).unwrap();
        assert_eq!(merged.confidence, 63.7);
        assert_eq!(merged.frame_count(), 1);
    }

    #[test]
    fn test_union_preserves_first_appearance() {
        let outcomes = vec![
            AnalysisOutcome::Fallback(analysis(&["moody", "warm tones"], &["clean"], 70.0)),
            AnalysisOutcome::Fallback(analysis(&["bright", "moody"], &["clean", "symmetrical"], 80.0)),
            AnalysisOutcome::Fallback(analysis(&["warm tones"], &[], 90.0)),
        ];

        let merged = consolidate(&outcomes).unwrap();
        assert_eq!(merged.styles, vec!["moody", "warm tones", "bright"]);
        assert_eq!(merged.elements, vec!["clean", "symmetrical"]);
        assert!((merged.confidence - 80.0).abs() < 1e-9);
        assert!(!merged.used_remote());
    }

    #[test]
    fn test_raw_labels_and_provenance() {
        let mut remote = analysis(&[], &["city"], 40.0);
        remote.raw_labels = Some(vec!["city".into(), "banana".into()]);
        let mut remote_again = analysis(&[], &[], 60.0);
        remote_again.raw_labels = Some(vec!["banana".into(), "spoon".into()]);

        let outcomes = vec![
            AnalysisOutcome::Remote(remote),
            AnalysisOutcome::Fallback(analysis(&["muted"], &[], 70.0)),
            AnalysisOutcome::Remote(remote_again),
        ];

        let merged = consolidate(&outcomes).unwrap();
        assert_eq!(merged.raw_labels, vec!["city", "banana", "spoon"]);
        assert_eq!(merged.provenance,
                   vec![Provenance::Remote, Provenance::Fallback, Provenance::Remote]);
        assert!(merged.used_remote());
    }

    #[test]
    fn test_technical_comes_from_first_frame_only() {
        let red = heuristics::interpret(features::extract(&PixelBuffer::solid(8, 8, (255, 0, 0))).unwrap());
        let blue = heuristics::interpret(features::extract(&PixelBuffer::solid(8, 8, (0, 0, 255))).unwrap());
        let expected = red.technical.clone();

        let merged = consolidate(&[AnalysisOutcome::Fallback(red), AnalysisOutcome::Fallback(blue)]).unwrap();
        assert_eq!(merged.technical, expected);

        let remote_first = consolidate(&[
            AnalysisOutcome::Remote(analysis(&[], &[], 50.0)),
            AnalysisOutcome::Fallback(heuristics::interpret(
                features::extract(&PixelBuffer::solid(8, 8, (0, 0, 255))).unwrap())),
        ]).unwrap();
        assert!(remote_first.technical.is_none());
    }
}
