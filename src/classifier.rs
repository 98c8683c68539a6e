//! Remote label classification
//!
//! Frames are encoded as JPEG, posted to an image-classification endpoint and
//! the ranked labels it returns are folded into a `FrameAnalysis` using the
//! keyword tables in `vocabulary`. Every network, status or decoding failure
//! surfaces as `RemoteUnavailable` so the analyzer can fall back locally.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use reqwest::{blocking::Client, header};
use serde::{Deserialize, Serialize};
use tracing::{instrument, debug, trace};

use crate::{
    analyzer::FrameAnalysis,
    common::{PixelBuffer, PromptGenError, Result},
    config::ClassifierConfig,
    vocabulary::{match_keywords, ELEMENT_KEYWORDS, STYLE_KEYWORDS},
};

/// Number of top-ranked labels considered per frame
pub const TOP_LABELS: usize = 5;
/// Maximum style tags taken from one reply
pub const MAX_STYLE_TAGS: usize = 3;
/// Maximum element tags taken from one reply
pub const MAX_ELEMENT_TAGS: usize = 4;
/// Confidence reported when the service returns no labels
pub const DEFAULT_REMOTE_CONFIDENCE: f64 = 70.0;

/// One ranked label as returned by the classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// An image classifier returning ranked labels for encoded image bytes
pub trait LabelClassifier: Send + Sync {
    /// Classify one encoded image
    ///
    /// # Errors
    /// * `RemoteUnavailable` - On any transport, status or reply failure
    fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>>;
}

impl<T: LabelClassifier + ?Sized> LabelClassifier for Box<T> {
    fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>> {
        (**self).classify(image)
    }
}

/// Classifier that is never reachable; every frame takes the local path
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClassifier;

impl LabelClassifier for DisabledClassifier {
    fn classify(&self, _image: &[u8]) -> Result<Vec<LabelScore>> {
        Err(PromptGenError::remote_error("remote classifier disabled"))
    }
}

/// Blocking HTTP client for a Hugging Face style inference endpoint
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl HttpClassifier {
    /// Build a client with the configured timeout
    ///
    /// # Errors
    /// * `InvalidConfig` - If the endpoint is empty or the HTTP client cannot be built
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(PromptGenError::config_error("classifier endpoint is empty"));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| PromptGenError::config_error(format!("failed to build HTTP client: {e}")))?;

        debug!("Remote classifier at {} (timeout {}ms, token {})",
               config.endpoint, config.timeout_ms,
               if config.api_token.is_some() { "set" } else { "unset" });

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LabelClassifier for HttpClassifier {
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    fn classify(&self, image: &[u8]) -> Result<Vec<LabelScore>> {
        let mut request = self.client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec());
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| PromptGenError::remote_error(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PromptGenError::remote_error(format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .map_err(|e| PromptGenError::remote_error(format!("failed to read reply: {e}")))?;
        let labels: Vec<LabelScore> = serde_json::from_slice(&body)
            .map_err(|e| PromptGenError::remote_error(format!("malformed reply: {e}")))?;

        if let Some(bad) = labels.iter().find(|l| !l.score.is_finite()) {
            return Err(PromptGenError::remote_error(format!(
                "non-finite score for label '{}'", bad.label
            )));
        }

        trace!("Classifier returned {} labels", labels.len());
        Ok(labels)
    }
}

impl std::fmt::Debug for HttpClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClassifier")
            .field("endpoint", &self.endpoint)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Encode an RGBA buffer as baseline JPEG
///
/// # Errors
/// * `MalformedBuffer` - If the buffer's dimensions do not match its samples
/// * `RemoteUnavailable` - If the encoder itself fails
pub fn encode_jpeg(buffer: &PixelBuffer, quality: u8) -> Result<Vec<u8>> {
    buffer.validate()?;

    let rgba = RgbaImage::from_raw(buffer.width, buffer.height, buffer.data.clone())
        .ok_or_else(|| PromptGenError::malformed_buffer("sample count does not match dimensions"))?;
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageOutputFormat::Jpeg(quality))
        .map_err(|e| PromptGenError::remote_error(format!("JPEG encoding failed: {e}")))?;
    Ok(out.into_inner())
}

/// Fold a ranked label list into a frame analysis
pub fn interpret_labels(labels: &[LabelScore]) -> FrameAnalysis {
    if labels.is_empty() {
        return FrameAnalysis {
            styles: vec!["professional".to_string(), "digital".to_string()],
            elements: vec!["well-composed".to_string(), "detailed".to_string()],
            confidence: DEFAULT_REMOTE_CONFIDENCE,
            raw_labels: Some(Vec::new()),
            technical: None,
        };
    }

    let top: Vec<String> = labels.iter()
        .take(TOP_LABELS)
        .map(|l| l.label.clone())
        .collect();
    let max_score = labels.iter()
        .take(TOP_LABELS)
        .map(|l| l.score)
        .fold(f64::NEG_INFINITY, f64::max);

    FrameAnalysis {
        styles: match_keywords(&top, STYLE_KEYWORDS, MAX_STYLE_TAGS),
        elements: match_keywords(&top, ELEMENT_KEYWORDS, MAX_ELEMENT_TAGS),
        confidence: (max_score * 100.0).clamp(0.0, 100.0),
        raw_labels: Some(top),
        technical: None,
    }
}

/// Encode a frame, classify it and interpret the reply
pub fn classify_frame<C: LabelClassifier + ?Sized>(
    classifier: &C,
    buffer: &PixelBuffer,
    jpeg_quality: u8,
) -> Result<FrameAnalysis> {
    let jpeg = encode_jpeg(buffer, jpeg_quality)?;
    let labels = classifier.classify(&jpeg)?;
    Ok(interpret_labels(&labels))
}
