//! Common types, utilities, and error handling for the prompt pipeline.
//!
//! This module provides the foundational types used throughout the codebase,
//! including raw pixel buffers, sampled frames, and the error taxonomy.

use tracing::{instrument, debug};

/// Raw RGBA pixel buffer captured from a video
///
/// Samples are stored row-major, four bytes per pixel (R, G, B, A).
/// The alpha channel is carried but never inspected.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA samples, checking that the length matches the dimensions
    ///
    /// # Errors
    /// * `MalformedBuffer` - If either dimension is zero or the sample count is wrong
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let buffer = Self { width, height, data };
        buffer.validate()?;
        Ok(buffer)
    }

    /// Create a buffer where every pixel has the same color
    pub fn solid(width: u32, height: u32, rgb: (u8, u8, u8)) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&[rgb.0, rgb.1, rgb.2, 255]);
        }
        Self { width, height, data }
    }

    /// Get the number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Check that the buffer can be analysed
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PromptGenError::malformed_buffer(format!(
                "empty dimensions {}x{}", self.width, self.height
            )));
        }

        let expected = self.pixel_count() * 4;
        if self.data.len() != expected {
            return Err(PromptGenError::malformed_buffer(format!(
                "expected {} RGBA bytes for {}x{}, got {}",
                expected, self.width, self.height, self.data.len()
            )));
        }

        Ok(())
    }

    /// Get the (r, g, b) triple at a pixel coordinate
    ///
    /// Callers must have validated the buffer and stay in bounds.
    #[inline]
    pub fn rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }

    /// Get the luma (mean of R, G, B) at a pixel coordinate
    #[inline]
    pub fn luma(&self, x: u32, y: u32) -> f64 {
        let (r, g, b) = self.rgb(x, y);
        (r as f64 + g as f64 + b as f64) / 3.0
    }
}

/// A still image sampled from a video at a known position
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    index: usize,
    timestamp: f64,
    buffer: PixelBuffer,
}

impl Frame {
    /// Create a new Frame
    ///
    /// # Arguments
    /// * `index` - Position in the sampled sequence (0-indexed)
    /// * `timestamp` - Seconds since the start of the video
    /// * `buffer` - Captured pixels at native resolution
    ///
    /// # Panics
    /// Panics if the timestamp is negative or not finite (fail-fast approach)
    #[instrument(skip(buffer))]
    pub fn new(index: usize, timestamp: f64, buffer: PixelBuffer) -> Self {
        assert!(
            timestamp.is_finite() && timestamp >= 0.0,
            "Timestamp must be finite and non-negative, got: {}", timestamp
        );
        debug!("Created Frame: index={}, t={:.3}s, {}x{}",
               index, timestamp, buffer.width, buffer.height);

        Self { index, timestamp, buffer }
    }

    /// Get the position of this frame in the sampled sequence
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the timestamp in seconds
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Get the timestamp in milliseconds
    pub fn milliseconds(&self) -> f64 {
        self.timestamp * 1000.0
    }

    /// Get the captured pixels
    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }
}

/// All possible errors from the prompt pipeline
///
/// `RemoteUnavailable` is recovered inside the frame analyzer; every other
/// kind aborts the analysis of the current video.
#[derive(Debug, thiserror::Error)]
pub enum PromptGenError {
    #[error("Video source unavailable: {path}: {reason}")]
    SourceUnavailable { path: String, reason: String },

    #[error("Seek to {timestamp:.3}s did not settle within {waited_ms}ms")]
    SeekTimeout { timestamp: f64, waited_ms: u64 },

    #[error("Remote classifier unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    #[error("Malformed pixel buffer: {reason}")]
    MalformedBuffer { reason: String },

    #[error("No frame analyses to consolidate")]
    EmptyInput,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Expected {expected} frame analyses, got {actual}")]
    FrameCountMismatch { expected: usize, actual: usize },

    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCvError(#[from] opencv::Error),
}

impl PromptGenError {
    /// Create a configuration error with a descriptive message
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Create a remote classifier error
    pub fn remote_error(reason: impl Into<String>) -> Self {
        Self::RemoteUnavailable { reason: reason.into() }
    }

    /// Create a malformed buffer error
    pub fn malformed_buffer(reason: impl Into<String>) -> Self {
        Self::MalformedBuffer { reason: reason.into() }
    }

    /// Create a source error for the given path
    pub fn source_error(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable { path: path.into(), reason: reason.into() }
    }
}

/// Convenient Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PromptGenError>;
