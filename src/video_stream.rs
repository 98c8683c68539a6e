//! Video source abstraction and the OpenCV-backed implementation
//!
//! The sampler only needs four things from a video: its duration, its native
//! resolution, a seek that reports when it has settled, and a capture of the
//! currently displayed image. `VideoSource` captures that contract so any
//! decoder can be plugged in; `VideoStream` wraps OpenCV's VideoCapture.

use std::time::Duration;
use crate::common::{PixelBuffer, Result};

/// Anything the frame sampler can seek through and capture from
///
/// Seeking mutates the position of a single shared resource, which is why
/// both `seek` and `capture` take `&mut self`.
pub trait VideoSource {
    /// Total duration in seconds
    fn duration_seconds(&self) -> f64;

    /// Native (width, height) in pixels
    fn resolution(&self) -> (u32, u32);

    /// Seek to `timestamp` seconds and block until the seek settles
    ///
    /// # Errors
    /// * `SeekTimeout` - If the position does not settle within `timeout`
    fn seek(&mut self, timestamp: f64, timeout: Duration) -> Result<()>;

    /// Capture the currently displayed image as RGBA at native resolution
    fn capture(&mut self) -> Result<PixelBuffer>;
}

/// Where a decoder landed relative to a requested seek target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(feature = "opencv"), allow(dead_code))]
pub(crate) enum SeekProgress {
    /// Within one frame interval of the target
    Settled,
    /// Landed before the target, usually on an earlier keyframe
    Behind,
    /// Landed past the target
    Overshot,
}

/// Classify a reported position against the target, tolerating one frame interval
#[cfg_attr(not(feature = "opencv"), allow(dead_code))]
pub(crate) fn seek_progress(position_ms: f64, target_ms: f64, fps: f64) -> SeekProgress {
    let tolerance_ms = if fps.is_finite() && fps > 0.0 { 1000.0 / fps } else { 0.0 };

    if !position_ms.is_finite() || position_ms > target_ms + tolerance_ms {
        SeekProgress::Overshot
    } else if position_ms < target_ms - tolerance_ms {
        SeekProgress::Behind
    } else {
        SeekProgress::Settled
    }
}

#[cfg(feature = "opencv")]
pub use self::opencv_backend::VideoStream;

#[cfg(feature = "opencv")]
mod opencv_backend {
    use std::path::Path;
    use std::thread;
    use std::time::{Duration, Instant};

    use opencv::{core::Mat, imgproc, videoio, prelude::*};
    use tracing::{instrument, debug, warn, info, trace};

    use super::{seek_progress, SeekProgress, VideoSource};
    use crate::common::{PixelBuffer, PromptGenError, Result};

    /// Delay between attempts while waiting for a seek to settle
    const SEEK_POLL_INTERVAL: Duration = Duration::from_millis(10);

    /// Wrapper around OpenCV VideoCapture for seek-and-capture sampling
    ///
    /// This struct provides a safe, instrumented interface to OpenCV's video
    /// reading capabilities, with proper error handling and logging.
    pub struct VideoStream {
        cap: videoio::VideoCapture,
        fps: f64,
        frame_count: i32,
        width: i32,
        height: i32,
        path: String,
        grabbed: bool,
    }

    impl VideoStream {
        /// Open a video file for sampling
        ///
        /// # Arguments
        /// * `path` - Path to the video file
        ///
        /// # Errors
        /// * `SourceUnavailable` - If the file is missing, cannot be opened,
        ///   or reports unusable properties
        #[instrument(skip(path))]
        pub fn open(path: &str) -> Result<Self> {
            info!("Opening video stream: {}", path);

            if !Path::new(path).exists() {
                return Err(PromptGenError::source_error(path, "file not found"));
            }

            let cap = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)
                .map_err(|e| {
                    warn!("Failed to create VideoCapture: {}", e);
                    PromptGenError::source_error(path, format!("cannot open: {}", e))
                })?;

            let is_opened = cap.is_opened().map_err(|e| {
                PromptGenError::source_error(path, format!("cannot query capture state: {}", e))
            })?;
            if !is_opened {
                return Err(PromptGenError::source_error(path, "decoder refused the file"));
            }

            let property = |id: i32, name: &str| -> Result<f64> {
                cap.get(id).map_err(|e| {
                    warn!("Failed to get video {}: {}", name, e);
                    PromptGenError::source_error(path, format!("cannot read {}: {}", name, e))
                })
            };

            let fps = property(videoio::CAP_PROP_FPS, "fps")?;
            let frame_count = property(videoio::CAP_PROP_FRAME_COUNT, "frame count")? as i32;
            let width = property(videoio::CAP_PROP_FRAME_WIDTH, "width")? as i32;
            let height = property(videoio::CAP_PROP_FRAME_HEIGHT, "height")? as i32;

            if fps <= 0.0 {
                return Err(PromptGenError::source_error(path, format!("invalid fps {}", fps)));
            }
            if frame_count <= 0 {
                return Err(PromptGenError::source_error(path, "no frames in video"));
            }
            if width <= 0 || height <= 0 {
                return Err(PromptGenError::source_error(
                    path, format!("invalid resolution {}x{}", width, height)
                ));
            }

            info!("Video opened successfully - FPS: {}, Frames: {}, Size: {}x{}",
                  fps, frame_count, width, height);

            Ok(Self {
                cap,
                fps,
                frame_count,
                width,
                height,
                path: path.to_string(),
                grabbed: false,
            })
        }

        /// Get the video framerate
        pub fn fps(&self) -> f64 {
            self.fps
        }

        /// Get the total number of frames in the video
        pub fn frame_count(&self) -> i32 {
            self.frame_count
        }

        /// Get the frame width in pixels
        pub fn width(&self) -> i32 {
            self.width
        }

        /// Get the frame height in pixels
        pub fn height(&self) -> i32 {
            self.height
        }

        /// Get the video file path
        pub fn path(&self) -> &str {
            &self.path
        }

        fn to_rgba(&self, bgr: &Mat) -> Result<PixelBuffer> {
            let mut rgba = Mat::default();
            imgproc::cvt_color_def(bgr, &mut rgba, imgproc::COLOR_BGR2RGBA)
                .map_err(|e| PromptGenError::malformed_buffer(format!("RGBA conversion failed: {}", e)))?;

            let rgba = if rgba.is_continuous() { rgba } else { rgba.try_clone()? };
            let (cols, rows) = (rgba.cols(), rgba.rows());
            if cols != self.width || rows != self.height {
                return Err(PromptGenError::malformed_buffer(format!(
                    "frame size mismatch: expected {}x{}, got {}x{}",
                    self.width, self.height, cols, rows
                )));
            }

            PixelBuffer::new(cols as u32, rows as u32, rgba.data_bytes()?.to_vec())
        }
    }

    impl VideoSource for VideoStream {
        fn duration_seconds(&self) -> f64 {
            self.frame_count as f64 / self.fps
        }

        fn resolution(&self) -> (u32, u32) {
            (self.width as u32, self.height as u32)
        }

        #[instrument(skip(self))]
        fn seek(&mut self, timestamp: f64, timeout: Duration) -> Result<()> {
            let started = Instant::now();
            let target_ms = timestamp * 1000.0;
            let mut reposition = true;

            // Settled once a grabbed frame reports a position within one frame of the target
            loop {
                if reposition {
                    reposition = !self.cap.set(videoio::CAP_PROP_POS_MSEC, target_ms)?;
                }

                if !reposition && self.cap.grab()? {
                    let position_ms = self.cap.get(videoio::CAP_PROP_POS_MSEC)?;
                    match seek_progress(position_ms, target_ms, self.fps) {
                        SeekProgress::Settled => {
                            self.grabbed = true;
                            trace!("Seek to {:.3}s settled at {:.1}ms after {:?}",
                                   timestamp, position_ms, started.elapsed());
                            return Ok(());
                        }
                        SeekProgress::Behind => {
                            trace!("Decoder at {:.1}ms, stepping towards {:.1}ms", position_ms, target_ms);
                        }
                        SeekProgress::Overshot => {
                            trace!("Decoder overshot to {:.1}ms, seeking {:.1}ms again", position_ms, target_ms);
                            reposition = true;
                        }
                    }
                } else {
                    reposition = true;
                }

                if started.elapsed() >= timeout {
                    warn!("Seek to {:.3}s timed out in {}", timestamp, self.path);
                    return Err(PromptGenError::SeekTimeout {
                        timestamp,
                        waited_ms: timeout.as_millis() as u64,
                    });
                }
                if reposition {
                    thread::sleep(SEEK_POLL_INTERVAL);
                }
            }
        }

        #[instrument(skip(self))]
        fn capture(&mut self) -> Result<PixelBuffer> {
            if !self.grabbed && !self.cap.grab()? {
                return Err(PromptGenError::source_error(&self.path, "no frame available to capture"));
            }
            self.grabbed = false;

            let mut frame = Mat::default();
            let retrieved = self.cap.retrieve(&mut frame, 0)?;
            if !retrieved || frame.empty() {
                return Err(PromptGenError::source_error(&self.path, "decoder returned an empty frame"));
            }

            let buffer = self.to_rgba(&frame)?;
            debug!("Captured {}x{} frame", buffer.width, buffer.height);
            Ok(buffer)
        }
    }

    // Implement Debug manually to avoid showing internal OpenCV state
    impl std::fmt::Debug for VideoStream {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("VideoStream")
                .field("path", &self.path)
                .field("fps", &self.fps)
                .field("frame_count", &self.frame_count)
                .field("width", &self.width)
                .field("height", &self.height)
                .finish()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::fs;

        #[test]
        fn test_video_stream_nonexistent_file() {
            let result = VideoStream::open("nonexistent_video.mp4");

            match result {
                Err(PromptGenError::SourceUnavailable { path, reason }) => {
                    assert_eq!(path, "nonexistent_video.mp4");
                    assert_eq!(reason, "file not found");
                }
                other => panic!("Expected SourceUnavailable, got: {:?}", other),
            }
        }

        #[test]
        fn test_video_stream_empty_path() {
            let result = VideoStream::open("");
            assert!(matches!(result, Err(PromptGenError::SourceUnavailable { .. })));
        }

        #[test]
        fn test_video_stream_not_a_video() {
            let temp_path = std::env::temp_dir().join("videoprompt_not_a_video.mp4");
            fs::write(&temp_path, b"definitely not a video").expect("write temp file");

            let result = VideoStream::open(temp_path.to_str().expect("utf-8 temp path"));
            fs::remove_file(&temp_path).ok();

            assert!(matches!(result, Err(PromptGenError::SourceUnavailable { .. })));
        }
    }
}
