//! Prompt synthesis from a consolidated analysis
//!
//! `synthesize` is a pure function: the same `ConsolidatedAnalysis` always
//! produces the same `PromptResult`.

use serde::Serialize;
use tracing::{instrument, info};

use crate::{analyzer::Provenance, consolidator::ConsolidatedAnalysis, features::TechnicalStats};

/// Appended to every prompt
pub const PROMPT_SUFFIX: &str = ", trending on ArtStation, masterpiece, 8K resolution";

const CINEMATIC_CLAUSE: &str = ", cinematic lighting, dramatic atmosphere";
const VIBRANT_CLAUSE: &str = ", vibrant colors, well-lit";
const SATURATED_CLAUSE: &str = ", highly saturated colors";

/// Saturation above which the prompt asks for highly saturated colors
pub const SATURATED_PROMPT_THRESHOLD: f64 = 0.6;

pub const PROVENANCE_MIXED: &str = "remote+fallback";
pub const PROVENANCE_LOCAL: &str = "fallback-only";

pub const MODEL_REMOTE: &str = "Hugging Face CLIP + Computer Vision";
pub const MODEL_LOCAL: &str = "Computer Vision Analysis";
pub const PROCESSING_METHOD: &str = "Frame-by-frame AI analysis";

/// Final artifact of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptResult {
    pub prompt: String,
    pub details: PromptDetails,
}

/// Detail record accompanying the prompt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptDetails {
    pub detected_styles: Vec<String>,
    pub visual_elements: Vec<String>,
    /// Mean confidence rounded to a whole percentage
    pub confidence: u32,
    /// `remote+fallback` if any frame was classified remotely, else `fallback-only`
    pub provenance: String,
    /// Path taken by each contributing frame, in frame order
    pub frame_provenance: Vec<Provenance>,
    pub model: String,
    pub processing_method: String,
    pub frames_analyzed: usize,
    pub dominant_color: Option<String>,
    pub technical: Option<TechnicalStats>,
    pub raw_labels: Vec<String>,
    /// Path or URL of the analysed video, when known
    pub source: Option<String>,
}

impl PromptResult {
    /// Record which video this prompt was generated from
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.details.source = Some(source.into());
        self
    }
}

fn has_any(tags: &[String], wanted: &[&str]) -> bool {
    tags.iter().any(|tag| wanted.contains(&tag.as_str()))
}

fn or_default(tags: &[String], default: &[&str]) -> Vec<String> {
    if tags.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        tags.to_vec()
    }
}

/// Build the prompt string
pub fn build_prompt(analysis: &ConsolidatedAnalysis) -> String {
    let styles = if analysis.styles.is_empty() {
        "professional".to_string()
    } else {
        analysis.styles.join(", ")
    };
    let elements = if analysis.elements.is_empty() {
        "well-composed".to_string()
    } else {
        analysis.elements.join(", ")
    };

    let mut prompt = format!(
        "A {} video featuring {}, professional quality, high detail",
        styles, elements
    );

    if has_any(&analysis.styles, &["cinematic", "dramatic"]) {
        prompt.push_str(CINEMATIC_CLAUSE);
    }
    if has_any(&analysis.styles, &["bright", "vibrant"]) {
        prompt.push_str(VIBRANT_CLAUSE);
    }
    if analysis.technical.as_ref()
        .is_some_and(|t| t.colors.saturation > SATURATED_PROMPT_THRESHOLD)
    {
        prompt.push_str(SATURATED_CLAUSE);
    }

    prompt.push_str(PROMPT_SUFFIX);
    prompt
}

/// Synthesize the prompt and its detail record
#[instrument(skip(analysis), fields(frames = analysis.frame_count()))]
pub fn synthesize(analysis: &ConsolidatedAnalysis) -> PromptResult {
    let prompt = build_prompt(analysis);
    let remote = analysis.used_remote();

    let details = PromptDetails {
        detected_styles: or_default(&analysis.styles, &["professional", "high-quality"]),
        visual_elements: or_default(&analysis.elements, &["well-composed", "detailed"]),
        confidence: analysis.confidence.clamp(0.0, 100.0).round() as u32,
        provenance: (if remote { PROVENANCE_MIXED } else { PROVENANCE_LOCAL }).to_string(),
        frame_provenance: analysis.provenance.clone(),
        model: (if remote { MODEL_REMOTE } else { MODEL_LOCAL }).to_string(),
        processing_method: PROCESSING_METHOD.to_string(),
        frames_analyzed: analysis.frame_count(),
        dominant_color: analysis.technical.as_ref().map(|t| t.colors.dominant_css()),
        technical: analysis.technical.clone(),
        raw_labels: analysis.raw_labels.clone(),
        source: None,
    };

    info!("Synthesized {}-character prompt ({}, {}% confidence)",
          prompt.len(), details.provenance, details.confidence);

    PromptResult { prompt, details }
}
