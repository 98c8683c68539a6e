//! Pixel statistics for the local fallback analysis
//!
//! This module derives color, edge, and composition statistics from a raw
//! RGBA buffer. All three sub-analyses read the same immutable buffer and
//! share no state, so they can run in any order.
//!
//! The thresholds below were chosen empirically and are kept for
//! compatibility with existing prompts, not because they are known to be
//! optimal. They are exposed as constants so they can be tuned in one place.

use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};
use crate::common::{PixelBuffer, Result};

/// Average channel lead (0-255) needed to call a frame warm or cool
pub const TEMPERATURE_MARGIN: i32 = 30;

/// Luma difference above which two neighbouring pixels form an edge
pub const EDGE_LUMA_THRESHOLD: f64 = 25.0;

/// Edge density above which complexity is `high`
pub const HIGH_COMPLEXITY_DENSITY: f64 = 0.10;

/// Edge density above which complexity is `medium`
pub const MEDIUM_COMPLEXITY_DENSITY: f64 = 0.05;

/// Largest per-axis band luma spread that still counts as `balanced`
pub const THIRDS_BALANCE_SPREAD: f64 = 40.0;

/// Share of all edges inside the center square needed for a `centered` focus
pub const CENTER_FOCUS_RATIO: f64 = 0.3;

/// Color temperature derived from the average color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    Warm,
    Cool,
    Neutral,
}

impl Temperature {
    /// Classify an average color; a channel must lead both others by more than the margin
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        if r > g + TEMPERATURE_MARGIN && r > b + TEMPERATURE_MARGIN {
            Temperature::Warm
        } else if b > r + TEMPERATURE_MARGIN && b > g + TEMPERATURE_MARGIN {
            Temperature::Cool
        } else {
            Temperature::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Temperature::Warm => "warm",
            Temperature::Cool => "cool",
            Temperature::Neutral => "neutral",
        }
    }
}

/// Edge complexity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn from_density(density: f64) -> Self {
        if density > HIGH_COMPLEXITY_DENSITY {
            Complexity::High
        } else if density > MEDIUM_COMPLEXITY_DENSITY {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

/// Rule-of-thirds verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThirdsVerdict {
    Balanced,
    Dynamic,
}

impl ThirdsVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThirdsVerdict::Balanced => "balanced",
            ThirdsVerdict::Dynamic => "dynamic",
        }
    }
}

/// Where the edges of the frame concentrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusVerdict {
    Centered,
    Distributed,
}

impl FocusVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusVerdict::Centered => "centered",
            FocusVerdict::Distributed => "distributed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStats {
    /// Average (r, g, b), unrounded
    pub average: [f64; 3],
    /// Average color rounded to whole channel values
    pub dominant: [u8; 3],
    /// Mean luma in 0-255
    pub brightness: f64,
    /// Mean normalized chroma range in 0-1
    pub saturation: f64,
    pub temperature: Temperature,
}

impl ColorStats {
    /// Render the dominant color as `rgb(r, g, b)`
    pub fn dominant_css(&self) -> String {
        format!("rgb({}, {}, {})", self.dominant[0], self.dominant[1], self.dominant[2])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeStats {
    pub transitions: u64,
    pub edge_density: f64,
    pub complexity: Complexity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionStats {
    pub rule_of_thirds: ThirdsVerdict,
    /// Mirror similarity about the vertical center line, in 0-1
    pub symmetry: f64,
    pub focus: FocusVerdict,
}

/// Everything the local path measures about one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalStats {
    pub colors: ColorStats,
    pub edges: EdgeStats,
    pub composition: CompositionStats,
}

/// Extract all pixel statistics from a buffer
///
/// # Errors
/// * `MalformedBuffer` - If the buffer dimensions and sample count disagree
#[instrument(skip(buffer), fields(width = buffer.width, height = buffer.height))]
pub fn extract(buffer: &PixelBuffer) -> Result<TechnicalStats> {
    buffer.validate()?;

    let colors = color_stats(buffer);
    let edges = edge_stats(buffer);
    let composition = composition_stats(buffer);

    trace!("brightness={:.1} saturation={:.3} density={:.4} symmetry={:.3}",
           colors.brightness, colors.saturation, edges.edge_density, composition.symmetry);

    Ok(TechnicalStats { colors, edges, composition })
}

/// Average color, brightness, saturation and temperature
pub fn color_stats(buffer: &PixelBuffer) -> ColorStats {
    let mut sums = [0u64; 3];
    let mut saturation = 0.0;

    for px in buffer.data.chunks_exact(4) {
        let (r, g, b) = (px[0], px[1], px[2]);
        sums[0] += r as u64;
        sums[1] += g as u64;
        sums[2] += b as u64;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        if max > 0 {
            saturation += (max - min) as f64 / max as f64;
        }
    }

    let total = buffer.pixel_count() as f64;
    let average = [
        sums[0] as f64 / total,
        sums[1] as f64 / total,
        sums[2] as f64 / total,
    ];
    let dominant = [
        average[0].round() as u8,
        average[1].round() as u8,
        average[2].round() as u8,
    ];

    ColorStats {
        average,
        dominant,
        brightness: (average[0] + average[1] + average[2]) / 3.0,
        saturation: saturation / total,
        temperature: Temperature::from_rgb(dominant[0], dominant[1], dominant[2]),
    }
}

/// Horizontal luma transitions over the whole frame
///
/// Pixels are compared with their right neighbour inside the same row only.
/// The last pixel of a row is never compared with the first pixel of the
/// next row, so frames made of uniform rows have zero density even when
/// consecutive rows differ. A flat scan over the RGBA array would count one
/// extra transition per differing row boundary.
pub fn edge_stats(buffer: &PixelBuffer) -> EdgeStats {
    let transitions = count_transitions(buffer, 0, buffer.width, 0, buffer.height);
    let edge_density = transitions as f64 / buffer.pixel_count() as f64;

    EdgeStats {
        transitions,
        edge_density,
        complexity: Complexity::from_density(edge_density),
    }
}

/// Rule of thirds, mirror symmetry and focus placement
pub fn composition_stats(buffer: &PixelBuffer) -> CompositionStats {
    let (w, h) = (buffer.width, buffer.height);

    let column_bands = [0, 1, 2].map(|i| region_luma(buffer, i * w / 3, (i + 1) * w / 3, 0, h));
    let row_bands = [0, 1, 2].map(|i| region_luma(buffer, 0, w, i * h / 3, (i + 1) * h / 3));

    let balanced = band_spread(&column_bands) < THIRDS_BALANCE_SPREAD
        && band_spread(&row_bands) < THIRDS_BALANCE_SPREAD;

    CompositionStats {
        rule_of_thirds: if balanced { ThirdsVerdict::Balanced } else { ThirdsVerdict::Dynamic },
        symmetry: symmetry(buffer),
        focus: focus(buffer),
    }
}

/// Average `1 - |luma(x) - luma(mirror(x))| / 255` over the left half
pub fn symmetry(buffer: &PixelBuffer) -> f64 {
    let half = buffer.width / 2;
    if half == 0 {
        return 1.0;
    }

    let mut score = 0.0;
    for y in 0..buffer.height {
        for x in 0..half {
            let mirrored = buffer.width - 1 - x;
            score += 1.0 - (buffer.luma(x, y) - buffer.luma(mirrored, y)).abs() / 255.0;
        }
    }

    score / (half as f64 * buffer.height as f64)
}

/// Compare edges in the centered square against edges in the whole frame
pub fn focus(buffer: &PixelBuffer) -> FocusVerdict {
    let (w, h) = (buffer.width, buffer.height);
    let side = w.min(h) / 4;
    let x0 = (w - side) / 2;
    let y0 = (h - side) / 2;

    let center = count_transitions(buffer, x0, x0 + side, y0, y0 + side);
    let total = count_transitions(buffer, 0, w, 0, h);

    if total > 0 && center as f64 / total as f64 > CENTER_FOCUS_RATIO {
        FocusVerdict::Centered
    } else {
        FocusVerdict::Distributed
    }
}

/// Count pixels in `[x0, x1) x [y0, y1)` whose luma differs from the right
/// neighbour by more than the edge threshold. The neighbour may lie outside
/// the region but never outside the row.
fn count_transitions(buffer: &PixelBuffer, x0: u32, x1: u32, y0: u32, y1: u32) -> u64 {
    let x_end = x1.min(buffer.width.saturating_sub(1));
    let mut transitions = 0;

    for y in y0..y1.min(buffer.height) {
        for x in x0..x_end {
            if (buffer.luma(x, y) - buffer.luma(x + 1, y)).abs() > EDGE_LUMA_THRESHOLD {
                transitions += 1;
            }
        }
    }

    transitions
}

/// Mean luma of a region, `None` when the region is empty
fn region_luma(buffer: &PixelBuffer, x0: u32, x1: u32, y0: u32, y1: u32) -> Option<f64> {
    let count = (x1 - x0) as u64 * (y1 - y0) as u64;
    if count == 0 {
        return None;
    }

    let mut total = 0.0;
    for y in y0..y1 {
        for x in x0..x1 {
            total += buffer.luma(x, y);
        }
    }
    Some(total / count as f64)
}

/// Max minus min over the non-empty bands
fn band_spread(bands: &[Option<f64>; 3]) -> f64 {
    let values = bands.iter().flatten();
    let max = values.clone().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let min = values.fold(f64::INFINITY, |a, &b| a.min(b));
    if max.is_finite() && min.is_finite() { max - min } else { 0.0 }
}
