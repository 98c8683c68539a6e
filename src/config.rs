//! Pipeline configuration
//!
//! Settings can be built in code, loaded from a TOML file, or overridden by
//! CLI flags. Every path goes through `validate()` before use.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{PromptGenError, Result};

/// Default CLIP endpoint on the Hugging Face inference API
pub const DEFAULT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/openai/clip-vit-base-patch32";

/// Environment variable the CLI reads the classifier token from
pub const TOKEN_ENV_VAR: &str = "HF_API_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// When false every frame is analysed locally
    pub enabled: bool,
    pub endpoint: String,
    pub api_token: Option<String>,
    pub timeout_ms: u64,
    pub jpeg_quality: u8,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_token: None,
            timeout_ms: 10_000,
            jpeg_quality: 85,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of frames to sample from each video
    pub frame_count: usize,
    /// Upper bound on waiting for one seek to settle
    pub seek_timeout_ms: u64,
    /// Analyse captured frames on a rayon pool instead of one by one
    pub parallel_analysis: bool,
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_count: 6,
            seek_timeout_ms: 5_000,
            parallel_analysis: false,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file; missing keys take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            PromptGenError::config_error(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        let config: Self = toml::from_str(&contents).map_err(|err| {
            PromptGenError::config_error(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })?;
        debug!("Loaded configuration from {}", path_ref.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_count == 0 {
            return Err(PromptGenError::config_error(
                "frame_count must be greater than zero",
            ));
        }
        if self.seek_timeout_ms == 0 {
            return Err(PromptGenError::config_error(
                "seek_timeout_ms must be greater than zero",
            ));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(PromptGenError::config_error(
                "classifier.timeout_ms must be greater than zero",
            ));
        }
        if !(1..=100).contains(&self.classifier.jpeg_quality) {
            return Err(PromptGenError::config_error(
                "classifier.jpeg_quality must be between 1 and 100",
            ));
        }
        if self.classifier.enabled && self.classifier.endpoint.trim().is_empty() {
            return Err(PromptGenError::config_error(
                "classifier.endpoint must be set when the classifier is enabled",
            ));
        }
        Ok(())
    }

    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }
}
