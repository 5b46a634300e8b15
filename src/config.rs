use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::DEFAULT_QUEUE_DEPTH;
use crate::preprocess::ResizePolicy;
use crate::rate::DEFAULT_RATE_WINDOW;

pub const CONFIG_ENV: &str = "LIVE_OVERLAY_CONFIG";

const DEFAULT_MODEL: &str = "stub";
const DEFAULT_CAMERA_ID: u32 = 0;
const DEFAULT_FRAME_WIDTH: u32 = 1280;
const DEFAULT_FRAME_HEIGHT: u32 = 720;
const DEFAULT_WINDOW_NAME: &str = "Object Detection";
const DEFAULT_WORKERS: usize = 1;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_WORKERS: usize = 16;

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    model: Option<String>,
    labels: Option<PathBuf>,
    capture: Option<CaptureConfigFile>,
    engine: Option<EngineConfigFile>,
    display: Option<DisplayConfigFile>,
    preprocess: Option<ResizePolicy>,
    rate_window: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    url: Option<String>,
    camera_id: Option<u32>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
    target_fps: Option<u32>,
    mirror: Option<bool>,
    max_consecutive_failures: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct EngineConfigFile {
    workers: Option<usize>,
    queue_depth: Option<usize>,
    score_threshold: Option<f32>,
    max_results: Option<usize>,
    simulated_latency_ms: Option<u64>,
    simulated_jitter_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    window_name: Option<String>,
    show_fps: Option<bool>,
    dump_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// `stub` or a path to an ONNX model.
    pub model: String,
    pub labels: Option<PathBuf>,
    pub capture: CaptureSettings,
    pub engine: EngineSettings,
    pub display: DisplaySettings,
    pub preprocess: ResizePolicy,
    pub rate_window: u32,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Overrides `camera_id` when set.
    pub url: Option<String>,
    pub camera_id: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Requested device frame rate; 0 leaves the device default.
    pub target_fps: u32,
    pub mirror: bool,
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub workers: usize,
    pub queue_depth: usize,
    pub score_threshold: f32,
    pub max_results: usize,
    /// Stub backend only: fixed delay per inference.
    pub simulated_latency: Duration,
    /// Stub backend only: random extra delay, up to this much.
    pub simulated_jitter: Duration,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub window_name: String,
    pub show_fps: bool,
    pub dump_dir: Option<PathBuf>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        // An empty file yields every default.
        Self::from_file(StreamConfigFile::default())
    }
}

impl StreamConfig {
    /// Defaults, then the JSON file named by `LIVE_OVERLAY_CONFIG`, then
    /// `LIVE_OVERLAY_*` overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Like `load`, with an explicit config file taking the place of
    /// `LIVE_OVERLAY_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: StreamConfigFile) -> Self {
        let capture = file.capture.unwrap_or_default();
        let engine = file.engine.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        Self {
            model: file.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            labels: file.labels,
            capture: CaptureSettings {
                url: capture.url,
                camera_id: capture.camera_id.unwrap_or(DEFAULT_CAMERA_ID),
                frame_width: capture.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH),
                frame_height: capture.frame_height.unwrap_or(DEFAULT_FRAME_HEIGHT),
                target_fps: capture.target_fps.unwrap_or(0),
                mirror: capture.mirror.unwrap_or(true),
                max_consecutive_failures: capture.max_consecutive_failures.unwrap_or(1),
            },
            engine: EngineSettings {
                workers: engine.workers.unwrap_or(DEFAULT_WORKERS),
                queue_depth: engine.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH),
                score_threshold: engine.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
                max_results: engine.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                simulated_latency: Duration::from_millis(engine.simulated_latency_ms.unwrap_or(0)),
                simulated_jitter: Duration::from_millis(engine.simulated_jitter_ms.unwrap_or(0)),
            },
            display: DisplaySettings {
                window_name: display
                    .window_name
                    .unwrap_or_else(|| DEFAULT_WINDOW_NAME.to_string()),
                show_fps: display.show_fps.unwrap_or(false),
                dump_dir: display.dump_dir,
            },
            preprocess: file.preprocess.unwrap_or_default(),
            rate_window: file.rate_window.unwrap_or(DEFAULT_RATE_WINDOW),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(model) = env_string("LIVE_OVERLAY_MODEL") {
            self.model = model;
        }
        if let Some(path) = env_string("LIVE_OVERLAY_LABELS") {
            self.labels = Some(PathBuf::from(path));
        }
        if let Some(url) = env_string("LIVE_OVERLAY_URL") {
            self.capture.url = Some(url);
        }
        if let Some(id) = env_parse::<u32>("LIVE_OVERLAY_CAMERA_ID", "an integer camera id")? {
            self.capture.camera_id = id;
        }
        if let Some(width) = env_parse::<u32>("LIVE_OVERLAY_FRAME_WIDTH", "an integer width")? {
            self.capture.frame_width = width;
        }
        if let Some(height) = env_parse::<u32>("LIVE_OVERLAY_FRAME_HEIGHT", "an integer height")? {
            self.capture.frame_height = height;
        }
        if let Some(fps) = env_parse::<u32>("LIVE_OVERLAY_TARGET_FPS", "an integer frame rate")? {
            self.capture.target_fps = fps;
        }
        if let Some(mirror) = env_bool("LIVE_OVERLAY_MIRROR")? {
            self.capture.mirror = mirror;
        }
        if let Some(limit) = env_parse::<u32>(
            "LIVE_OVERLAY_MAX_CONSECUTIVE_FAILURES",
            "an integer failure count",
        )? {
            self.capture.max_consecutive_failures = limit;
        }
        if let Some(workers) = env_parse::<usize>("LIVE_OVERLAY_WORKERS", "an integer")? {
            self.engine.workers = workers;
        }
        if let Some(threshold) = env_parse::<f32>("LIVE_OVERLAY_SCORE_THRESHOLD", "a number")? {
            self.engine.score_threshold = threshold;
        }
        if let Some(show_fps) = env_bool("LIVE_OVERLAY_SHOW_FPS")? {
            self.display.show_fps = show_fps;
        }
        if let Some(name) = env_string("LIVE_OVERLAY_WINDOW") {
            self.display.window_name = name;
        }
        if let Some(dir) = env_string("LIVE_OVERLAY_DUMP_DIR") {
            self.display.dump_dir = Some(PathBuf::from(dir));
        }
        Ok(())
    }

    pub fn validate(&mut self) -> Result<()> {
        self.model = self.model.trim().to_string();
        if self.model.is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        if self.capture.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            self.capture.url = None;
        }
        if self.capture.frame_width == 0 || self.capture.frame_height == 0 {
            return Err(anyhow!(
                "frame size must be non-zero, got {}x{}",
                self.capture.frame_width,
                self.capture.frame_height
            ));
        }
        if self.capture.max_consecutive_failures == 0 {
            return Err(anyhow!("max_consecutive_failures must be at least 1"));
        }
        if self.engine.workers == 0 || self.engine.workers > MAX_WORKERS {
            return Err(anyhow!("workers must be between 1 and {}", MAX_WORKERS));
        }
        if self.engine.queue_depth == 0 {
            return Err(anyhow!("queue_depth must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.engine.score_threshold) {
            return Err(anyhow!("score_threshold must be within [0, 1]"));
        }
        if self.engine.max_results == 0 {
            return Err(anyhow!("max_results must be greater than zero"));
        }
        if self.rate_window == 0 {
            return Err(anyhow!("rate_window must be greater than zero"));
        }
        if self.display.window_name.trim().is_empty() {
            return Err(anyhow!("window_name must not be empty"));
        }
        self.preprocess.validate()
    }

    /// Whether `model` names the built-in stub backend.
    pub fn uses_stub_model(&self) -> bool {
        self.model.eq_ignore_ascii_case(DEFAULT_MODEL)
    }
}

fn read_config_file(path: &Path) -> Result<StreamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, expected: &str) -> Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("{} must be {}", key, expected)),
        None => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    match env_string(key) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| anyhow!("{} must be a boolean (true/false, 1/0, yes/no)", key)),
        None => Ok(None),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_camera_cli() {
        let cfg = StreamConfig::default();
        assert_eq!(cfg.model, "stub");
        assert!(cfg.uses_stub_model());
        assert_eq!(cfg.capture.camera_id, 0);
        assert_eq!(
            (cfg.capture.frame_width, cfg.capture.frame_height),
            (1280, 720)
        );
        assert_eq!(cfg.capture.target_fps, 0);
        assert!(cfg.capture.mirror);
        assert_eq!(cfg.capture.max_consecutive_failures, 1);
        assert_eq!(cfg.rate_window, 10);
        assert_eq!(cfg.display.window_name, "Object Detection");
        assert!(!cfg.display.show_fps);
        assert_eq!(cfg.preprocess, ResizePolicy::Passthrough);
    }

    #[test]
    fn file_sections_are_parsed() -> Result<()> {
        let file: StreamConfigFile = serde_json::from_str(
            r#"{
                "model": "models/detector.onnx",
                "capture": { "url": "stub://desk?frames=5", "target_fps": 15, "mirror": false },
                "engine": { "workers": 2, "queue_depth": 3, "simulated_jitter_ms": 40 },
                "preprocess": { "policy": "center_crop", "width": 256, "height": 256 }
            }"#,
        )?;
        let mut cfg = StreamConfig::from_file(file);
        cfg.validate()?;

        assert_eq!(cfg.model, "models/detector.onnx");
        assert!(!cfg.uses_stub_model());
        assert_eq!(cfg.capture.url.as_deref(), Some("stub://desk?frames=5"));
        assert_eq!(cfg.capture.target_fps, 15);
        assert!(!cfg.capture.mirror);
        assert_eq!(cfg.engine.workers, 2);
        assert_eq!(cfg.engine.queue_depth, 3);
        assert_eq!(cfg.engine.simulated_jitter, Duration::from_millis(40));
        assert!(cfg.engine.simulated_latency.is_zero());
        assert_eq!(
            cfg.preprocess,
            ResizePolicy::CenterCrop {
                width: 256,
                height: 256
            }
        );
        Ok(())
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = StreamConfig::default();
        cfg.engine.score_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = StreamConfig::default();
        cfg.capture.max_consecutive_failures = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = StreamConfig::default();
        cfg.preprocess = ResizePolicy::FitWithin {
            width: 0,
            height: 10,
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn blank_url_means_camera() -> Result<()> {
        let mut cfg = StreamConfig::default();
        cfg.capture.url = Some("  ".to_string());
        cfg.validate()?;
        assert!(cfg.capture.url.is_none());
        Ok(())
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
