//! End-to-end pipeline tests over a synthetic video source

use std::net::TcpListener;
use std::sync::Mutex;
use std::time::Duration;

use rust_videoprompt::{
    PipelineConfig, PixelBuffer, ProgressEvent, PromptGenError, PromptPipeline, Provenance,
    Result, VideoSource, PROMPT_SUFFIX,
};

/// Ten-second clip whose picture changes with the playhead
struct SyntheticVideo {
    duration: f64,
    width: u32,
    height: u32,
    position: f64,
    seek_log: Vec<f64>,
    stall_at: Option<f64>,
}

impl SyntheticVideo {
    fn new(duration: f64) -> Self {
        Self {
            duration,
            width: 64,
            height: 48,
            position: 0.0,
            seek_log: Vec::new(),
            stall_at: None,
        }
    }
}

impl VideoSource for SyntheticVideo {
    fn duration_seconds(&self) -> f64 {
        self.duration
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn seek(&mut self, timestamp: f64, timeout: Duration) -> Result<()> {
        if self.stall_at.is_some_and(|t| timestamp >= t) {
            return Err(PromptGenError::SeekTimeout {
                timestamp,
                waited_ms: timeout.as_millis() as u64,
            });
        }
        self.seek_log.push(timestamp);
        self.position = timestamp;
        Ok(())
    }

    fn capture(&mut self) -> Result<PixelBuffer> {
        // Left half dark, right half a shade that brightens over time
        let shade = (60.0 + self.position * 15.0).min(255.0) as u8;
        let mut data = Vec::with_capacity((self.width * self.height * 4) as usize);
        for _ in 0..self.height {
            for x in 0..self.width {
                if x < self.width / 2 {
                    data.extend_from_slice(&[20, 20, 30, 255]);
                } else {
                    data.extend_from_slice(&[shade, shade / 2, 40, 255]);
                }
            }
        }
        PixelBuffer::new(self.width, self.height, data)
    }
}

fn unreachable_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/models/clip", addr)
}

fn config_with_unreachable_remote(frames: usize) -> PipelineConfig {
    let mut config = PipelineConfig { frame_count: frames, ..Default::default() };
    config.classifier.endpoint = unreachable_endpoint();
    config.classifier.timeout_ms = 1_000;
    config.classifier.api_token = Some("test-token".into());
    config
}

#[test]
fn test_unreachable_remote_yields_fallback_only_prompt() {
    let pipeline = PromptPipeline::from_config(config_with_unreachable_remote(6)).unwrap();
    let mut video = SyntheticVideo::new(10.0);

    let result = pipeline.run(&mut video, "synthetic.mp4").unwrap();

    assert_eq!(result.details.provenance, "fallback-only");
    assert_eq!(result.details.model, "Computer Vision Analysis");
    assert!(result.prompt.contains("trending on ArtStation, masterpiece, 8K resolution"));
    assert!(result.prompt.ends_with(PROMPT_SUFFIX));
    assert_eq!(result.details.frames_analyzed, 6);
    assert_eq!(result.details.frame_provenance, vec![Provenance::Fallback; 6]);
    assert!(result.details.technical.is_some());
    assert!(result.details.raw_labels.is_empty());
    assert!((70..=90).contains(&result.details.confidence));

    assert_eq!(video.seek_log.len(), 6);
    assert!(video.seek_log.windows(2).all(|w| w[0] < w[1]));
    assert!(video.seek_log.iter().all(|&t| (0.0..10.0).contains(&t)));
}

#[test]
fn test_every_frame_attempts_remote_and_falls_back() {
    let pipeline = PromptPipeline::from_config(config_with_unreachable_remote(4)).unwrap();
    let mut video = SyntheticVideo::new(10.0);
    let analysed = Mutex::new(Vec::new());

    pipeline.run_with_progress(&mut video, "synthetic.mp4", &|event| {
        if let ProgressEvent::FrameAnalyzed { index, provenance } = event {
            analysed.lock().unwrap().push((*index, *provenance));
        }
    }).unwrap();

    let analysed = analysed.into_inner().unwrap();
    assert_eq!(analysed, vec![
        (0, Provenance::Fallback),
        (1, Provenance::Fallback),
        (2, Provenance::Fallback),
        (3, Provenance::Fallback),
    ]);
}

#[test]
fn test_parallel_analysis_preserves_result() {
    let sequential = PromptPipeline::from_config(config_with_unreachable_remote(6)).unwrap();
    let mut parallel_config = config_with_unreachable_remote(6);
    parallel_config.parallel_analysis = true;
    let parallel = PromptPipeline::from_config(parallel_config).unwrap();

    let a = sequential.run(&mut SyntheticVideo::new(10.0), "synthetic.mp4").unwrap();
    let b = parallel.run(&mut SyntheticVideo::new(10.0), "synthetic.mp4").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_seek_timeout_aborts_whole_run() {
    let mut config = config_with_unreachable_remote(6);
    config.classifier.enabled = false;
    config.seek_timeout_ms = 25;
    let pipeline = PromptPipeline::from_config(config).unwrap();

    let mut video = SyntheticVideo::new(10.0);
    video.stall_at = Some(5.0);

    match pipeline.run(&mut video, "synthetic.mp4") {
        Err(PromptGenError::SeekTimeout { waited_ms, .. }) => assert_eq!(waited_ms, 25),
        other => panic!("expected SeekTimeout, got {:?}", other),
    }
    // Frames at 0, 1.67 and 3.33s were captured before the stall
    assert_eq!(video.seek_log.len(), 3);
}

#[test]
fn test_very_short_video_uses_minimum_interval() {
    let mut config = config_with_unreachable_remote(8);
    config.classifier.enabled = false;
    let pipeline = PromptPipeline::from_config(config).unwrap();

    let mut video = SyntheticVideo::new(0.004);
    let result = pipeline.run(&mut video, "tiny.mp4").unwrap();

    assert_eq!(result.details.frames_analyzed, 8);
    assert!((video.seek_log[1] - 0.001).abs() < 1e-12);
}

#[test]
fn test_result_serializes_to_json() {
    let mut config = config_with_unreachable_remote(2);
    config.classifier.enabled = false;
    let pipeline = PromptPipeline::from_config(config).unwrap();

    let result = pipeline.run(&mut SyntheticVideo::new(4.0), "clip.mp4").unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["details"]["source"], "clip.mp4");
    assert_eq!(json["details"]["provenance"], "fallback-only");
    assert!(json["details"]["dominant_color"].as_str().unwrap().starts_with("rgb("));
}
