//! Rule table turning pixel statistics into style and element tags
//!
//! Each rule is a predicate over `TechnicalStats` plus the tags it adds. Rules
//! are evaluated in table order and tags are deduplicated per frame, so the
//! output is fully determined by the statistics.

use tracing::trace;

use crate::{
    analyzer::FrameAnalysis,
    features::{Complexity, FocusVerdict, Temperature, TechnicalStats, ThirdsVerdict},
};

/// Brightness (0-255) above which a frame reads as bright
pub const BRIGHT_THRESHOLD: f64 = 180.0;
/// Brightness (0-255) below which a frame reads as moody
pub const DIM_THRESHOLD: f64 = 100.0;
/// Mean saturation above which a frame reads as colorful
pub const SATURATED_THRESHOLD: f64 = 0.6;
/// Mean saturation below which a frame reads as muted
pub const DESATURATED_THRESHOLD: f64 = 0.3;
/// Symmetry score above which a frame reads as symmetrical
pub const SYMMETRY_THRESHOLD: f64 = 0.8;

/// Baseline confidence of a locally analysed frame
pub const BASE_CONFIDENCE: f64 = 70.0;
/// Upper bound on the confidence of a locally analysed frame
pub const MAX_CONFIDENCE: f64 = 90.0;

/// Which tag set a rule contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Style,
    Element,
}

/// One row of the heuristic table
pub struct Rule {
    pub name: &'static str,
    pub kind: TagKind,
    pub applies: fn(&TechnicalStats) -> bool,
    pub tags: &'static [&'static str],
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("tags", &self.tags)
            .finish()
    }
}

pub const RULES: &[Rule] = &[
    Rule {
        name: "bright",
        kind: TagKind::Style,
        applies: |s| s.colors.brightness > BRIGHT_THRESHOLD,
        tags: &["bright", "vibrant"],
    },
    Rule {
        name: "dim",
        kind: TagKind::Style,
        applies: |s| s.colors.brightness < DIM_THRESHOLD,
        tags: &["moody", "dramatic"],
    },
    Rule {
        name: "saturated",
        kind: TagKind::Style,
        applies: |s| s.colors.saturation > SATURATED_THRESHOLD,
        tags: &["colorful", "saturated"],
    },
    Rule {
        name: "desaturated",
        kind: TagKind::Style,
        applies: |s| s.colors.saturation < DESATURATED_THRESHOLD,
        tags: &["muted", "desaturated"],
    },
    Rule {
        name: "warm",
        kind: TagKind::Style,
        applies: |s| s.colors.temperature == Temperature::Warm,
        tags: &["warm tones"],
    },
    Rule {
        name: "cool",
        kind: TagKind::Style,
        applies: |s| s.colors.temperature == Temperature::Cool,
        tags: &["cool tones"],
    },
    Rule {
        name: "thirds",
        kind: TagKind::Element,
        applies: |s| s.composition.rule_of_thirds == ThirdsVerdict::Balanced,
        tags: &["professional composition"],
    },
    Rule {
        name: "symmetry",
        kind: TagKind::Element,
        applies: |s| s.composition.symmetry > SYMMETRY_THRESHOLD,
        tags: &["symmetrical"],
    },
    Rule {
        name: "complex",
        kind: TagKind::Element,
        applies: |s| s.edges.complexity == Complexity::High,
        tags: &["detailed", "complex"],
    },
    Rule {
        name: "simple",
        kind: TagKind::Element,
        applies: |s| s.edges.complexity == Complexity::Low,
        tags: &["minimalist", "clean"],
    },
    Rule {
        name: "centered",
        kind: TagKind::Element,
        applies: |s| s.composition.focus == FocusVerdict::Centered,
        tags: &["centered subject"],
    },
];

/// Confidence of a locally analysed frame: `min(70 + density * 100, 90)`
pub fn local_confidence(edge_density: f64) -> f64 {
    (BASE_CONFIDENCE + edge_density * 100.0).min(MAX_CONFIDENCE)
}

/// Apply the rule table to one frame's statistics
pub fn interpret(stats: TechnicalStats) -> FrameAnalysis {
    let mut styles: Vec<String> = Vec::new();
    let mut elements: Vec<String> = Vec::new();

    for rule in RULES.iter().filter(|rule| (rule.applies)(&stats)) {
        trace!("Heuristic rule '{}' matched", rule.name);
        let target = match rule.kind {
            TagKind::Style => &mut styles,
            TagKind::Element => &mut elements,
        };
        for tag in rule.tags {
            if !target.iter().any(|t| t == tag) {
                target.push(tag.to_string());
            }
        }
    }

    FrameAnalysis {
        styles,
        elements,
        confidence: local_confidence(stats.edges.edge_density),
        raw_labels: None,
        technical: Some(stats),
    }
}
