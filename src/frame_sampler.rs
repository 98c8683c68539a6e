//! Evenly spaced frame sampling over a video source
//!
//! The sampler computes `N` timestamps `t_i = i * max(epsilon, D / N)` and, for
//! each one, seeks the source, waits for the seek to settle and captures the
//! displayed image. Frames are produced lazily and strictly in order.

use std::time::Duration;
use tracing::{instrument, debug, info};
use crate::common::{Frame, PromptGenError, Result};
use crate::video_stream::VideoSource;

/// Smallest sampling interval in seconds, used for very short videos
pub const MIN_SAMPLING_INTERVAL: f64 = 0.001;

/// Compute the sampling interval for a video of `duration` seconds
///
/// # Panics
/// Panics if `count` is zero (fail-fast approach)
pub fn sampling_interval(duration: f64, count: usize) -> f64 {
    assert!(count >= 1, "Frame count must be at least 1, got: {}", count);
    (duration / count as f64).max(MIN_SAMPLING_INTERVAL)
}

/// Compute the `count` sampling timestamps for a video of `duration` seconds
pub fn sample_timestamps(duration: f64, count: usize) -> Vec<f64> {
    let interval = sampling_interval(duration, count);
    (0..count).map(|i| i as f64 * interval).collect()
}

/// Lazy, ordered, finite sequence of frames sampled from one video source
///
/// The sampler holds the source mutably for its whole lifetime, so two
/// samplers can never interleave seeks on the same source. It is not
/// restartable; create a new sampler to walk the video again.
pub struct FrameSampler<'a, S: VideoSource + ?Sized> {
    source: &'a mut S,
    timestamps: Vec<f64>,
    next_index: usize,
    seek_timeout: Duration,
    failed: bool,
}

impl<'a, S: VideoSource + ?Sized> FrameSampler<'a, S> {
    /// Create a sampler producing `count` frames
    ///
    /// # Errors
    /// * `InvalidConfig` - If `count` is zero
    /// * `SourceUnavailable` - If the source reports an unusable duration or resolution
    #[instrument(skip(source))]
    pub fn new(source: &'a mut S, count: usize, seek_timeout: Duration) -> Result<Self> {
        if count == 0 {
            return Err(PromptGenError::config_error("frame count must be at least 1"));
        }

        let duration = source.duration_seconds();
        if !duration.is_finite() || duration <= 0.0 {
            return Err(PromptGenError::source_error(
                "<video source>", format!("unusable duration {}", duration)
            ));
        }

        let (width, height) = source.resolution();
        if width == 0 || height == 0 {
            return Err(PromptGenError::source_error(
                "<video source>", format!("unusable resolution {}x{}", width, height)
            ));
        }

        let timestamps = sample_timestamps(duration, count);
        info!("Sampling {} frames from {:.2}s video every {:.3}s",
              count, duration, sampling_interval(duration, count));

        Ok(Self {
            source,
            timestamps,
            next_index: 0,
            seek_timeout,
            failed: false,
        })
    }

    /// Get the timestamps this sampler will visit
    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    /// Get the number of frames still to be produced
    pub fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.timestamps.len() - self.next_index
        }
    }

    fn capture_at(&mut self, index: usize, timestamp: f64) -> Result<Frame> {
        self.source.seek(timestamp, self.seek_timeout)?;
        let buffer = self.source.capture()?;
        debug!("Captured frame {}/{} at {:.3}s", index + 1, self.timestamps.len(), timestamp);
        Ok(Frame::new(index, timestamp, buffer))
    }
}

impl<'a, S: VideoSource + ?Sized> Iterator for FrameSampler<'a, S> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_index >= self.timestamps.len() {
            return None;
        }

        let index = self.next_index;
        let timestamp = self.timestamps[index];
        self.next_index += 1;

        let result = self.capture_at(index, timestamp);
        // A failed capture ends the sequence
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}
