//! live_detect - Live camera object detection with overlay
//!
//! This binary:
//! 1. Loads configuration (file, environment, then command-line flags)
//! 2. Opens the capture device (`--url` or `--camera_id`)
//! 3. Loads the model onto a worker-thread inference engine
//! 4. Runs the capture/dispatch/render loop until the stream ends, `q` is
//!    entered on stdin, or Ctrl-C is pressed
//!
//! Rendered frames go to `--dump-dir` as PNG files when set; otherwise the
//! display is headless and only the logs show progress.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use live_overlay::config::StreamConfig;
use live_overlay::engine::{InferenceBackend, StubBackend, WorkerEngine};
use live_overlay::ingest::{open_device, DeviceSpec, FrameSource, SourceConfig};
use live_overlay::pipeline::{Pipeline, PipelineConfig};
use live_overlay::preprocess::Preprocessor;
use live_overlay::render::{DirectorySink, DisplaySink, HeadlessSink, Renderer, StdinKeys};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "live_detect",
    about = "Run an inference model on live camera frames and overlay the results"
)]
struct Args {
    /// Model to run: `stub` or a path to an ONNX file
    #[arg(long, value_name = "PATH")]
    model: Option<String>,

    /// Device URL or path, `stub://name?frames=N&fps=N` for a synthetic camera.
    /// Overrides --camera_id
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Local camera index
    #[arg(long = "camera_id", value_name = "ID")]
    camera_id: Option<u32>,

    /// Requested capture width
    #[arg(long = "frame_width", value_name = "PIXELS")]
    frame_width: Option<u32>,

    /// Requested capture height
    #[arg(long = "frame_height", value_name = "PIXELS")]
    frame_height: Option<u32>,

    /// Report frames per second (`--fps` alone means true)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    fps: Option<bool>,

    /// JSON config file
    #[arg(long, env = "LIVE_OVERLAY_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Display window name
    #[arg(long, value_name = "NAME")]
    window: Option<String>,

    /// Write rendered frames to this directory as PNG
    #[arg(long = "dump-dir", value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Stop after this many rendered frames
    #[arg(long = "max-frames", value_name = "N")]
    max_frames: Option<u64>,

    /// Inference worker threads (one model instance each)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Minimum score for reported results
    #[arg(long = "score-threshold", value_name = "SCORE")]
    score_threshold: Option<f32>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn apply(&self, cfg: &mut StreamConfig) -> Result<()> {
        if let Some(model) = &self.model {
            cfg.model = model.clone();
        }
        if let Some(url) = &self.url {
            cfg.capture.url = Some(url.clone());
        }
        if let Some(id) = self.camera_id {
            cfg.capture.camera_id = id;
        }
        if let Some(width) = self.frame_width {
            cfg.capture.frame_width = width;
        }
        if let Some(height) = self.frame_height {
            cfg.capture.frame_height = height;
        }
        if let Some(fps) = self.fps {
            cfg.display.show_fps = fps;
        }
        if let Some(window) = &self.window {
            cfg.display.window_name = window.clone();
        }
        if let Some(dir) = &self.dump_dir {
            cfg.display.dump_dir = Some(dir.clone());
        }
        if let Some(workers) = self.workers {
            cfg.engine.workers = workers;
        }
        if let Some(threshold) = self.score_threshold {
            cfg.engine.score_threshold = threshold;
        }
        cfg.validate()
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::from_args(
        &args.ui,
        std::io::stderr().is_terminal(),
        std::io::stdout().is_terminal(),
    )?;

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = StreamConfig::load_from(args.config.as_deref())?;
        args.apply(&mut cfg)?;
        cfg
    };

    let spec = DeviceSpec::from_parts(cfg.capture.url.as_deref(), cfg.capture.camera_id);
    let source = {
        let mut stage = ui.stage("Open capture device");
        let device = open_device(
            &spec,
            cfg.capture.frame_width,
            cfg.capture.frame_height,
            cfg.capture.target_fps,
        )?;
        stage.set_detail(spec.describe());
        FrameSource::new(
            device,
            SourceConfig {
                mirror: cfg.capture.mirror,
                max_consecutive_failures: cfg.capture.max_consecutive_failures,
            },
        )
    };

    let engine = {
        let mut stage = ui.stage("Load model");
        let engine = build_engine(&cfg)?;
        stage.set_detail(format!("{} x{}", cfg.model, cfg.engine.workers));
        engine
    };

    let sink: Box<dyn DisplaySink> = match &cfg.display.dump_dir {
        Some(dir) => Box::new(DirectorySink::create(dir)?.with_keys(StdinKeys::spawn()?)),
        None => Box::new(HeadlessSink::new().with_keys(StdinKeys::spawn()?)),
    };
    let renderer = Renderer::new(&cfg.display.window_name, sink).with_fps(cfg.display.show_fps);

    let pipeline = Pipeline::new(
        source,
        Preprocessor::new(cfg.preprocess)?,
        Box::new(engine),
        renderer,
        PipelineConfig {
            rate_window: cfg.rate_window,
            max_frames: args.max_frames,
        },
    )?;

    let stop = pipeline.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("failed to set Ctrl-C handler: {}", e))?;

    log::info!(
        "live_detect running on {} (enter q to quit, m to cycle overlay, f to toggle fps)",
        spec.describe()
    );
    let report = pipeline.run()?;

    log::info!(
        "live_detect stopped ({:?}): {} frames rendered, {} annotated",
        report.reason,
        report.frames_rendered,
        report.frames_annotated
    );
    log::info!(
        "dispatch: {} submitted, {} accepted, {} busy, {} rejected, {} completed, {} failed",
        report.dispatch.submitted,
        report.dispatch.accepted,
        report.dispatch.busy,
        report.dispatch.rejected,
        report.dispatch.completed,
        report.dispatch.failed
    );
    log::info!(
        "results: {} delivered, {} superseded, {} shown, {} discarded after shutdown",
        report.results.delivered,
        report.results.superseded,
        report.results.taken,
        report.results.discarded
    );
    if let Some(fps) = report.last_fps {
        log::info!("last measured rate: {:.1} fps", fps);
    }
    if report.source.failed_reads > 0 {
        log::warn!("{} capture reads failed", report.source.failed_reads);
    }
    Ok(())
}

fn build_engine(cfg: &StreamConfig) -> Result<WorkerEngine> {
    let mut backends: Vec<Box<dyn InferenceBackend>> = Vec::with_capacity(cfg.engine.workers);
    for _ in 0..cfg.engine.workers {
        backends.push(build_backend(cfg)?);
    }
    WorkerEngine::spawn_pool(backends, cfg.engine.queue_depth)
}

fn build_backend(cfg: &StreamConfig) -> Result<Box<dyn InferenceBackend>> {
    if cfg.uses_stub_model() {
        return Ok(Box::new(
            StubBackend::new()
                .with_threshold(cfg.engine.score_threshold)
                .with_latency(cfg.engine.simulated_latency, cfg.engine.simulated_jitter),
        ));
    }
    load_model(cfg)
}

#[cfg(feature = "backend-tract")]
fn load_model(cfg: &StreamConfig) -> Result<Box<dyn InferenceBackend>> {
    use live_overlay::engine::backends::TractBackend;
    use live_overlay::preprocess::ResizePolicy;

    // Input size for models fed full frames.
    const DEFAULT_MODEL_INPUT: u32 = 224;

    let (width, height) = match cfg.preprocess {
        ResizePolicy::CenterCrop { width, height } | ResizePolicy::FitWithin { width, height } => {
            (width, height)
        }
        ResizePolicy::Passthrough => (DEFAULT_MODEL_INPUT, DEFAULT_MODEL_INPUT),
    };
    let mut backend = TractBackend::new(&cfg.model, width, height)?
        .with_threshold(cfg.engine.score_threshold)
        .with_max_results(cfg.engine.max_results);
    if let Some(labels) = &cfg.labels {
        backend = backend.with_labels_file(labels)?;
    }
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model(cfg: &StreamConfig) -> Result<Box<dyn InferenceBackend>> {
    Err(anyhow!(
        "model {} requires the backend-tract feature (use --model stub for the built-in detector)",
        cfg.model
    ))
}
