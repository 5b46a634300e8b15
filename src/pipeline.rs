//! The live pipeline loop.
//!
//! One cooperative loop per tick:
//! 1. Capture the next frame (end-of-stream stops the loop)
//! 2. Preprocess it and submit it to the engine without waiting
//! 3. Update the rate estimate
//! 4. Take whatever result the correlator holds and render
//! 5. Poll for input
//!
//! The only state shared with other threads is the `ResultSlot` (written by
//! engine completions) and the stop flag (set by signal handlers).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::correlator::{ResultSlot, SlotStats};
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::engine::{InferenceEngine, InferenceResult};
use crate::ingest::{FrameSource, SourceStats};
use crate::preprocess::Preprocessor;
use crate::rate::{RateEstimator, DEFAULT_RATE_WINDOW};
use crate::render::{InputAction, RenderReport, Renderer};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Captures per FPS recomputation.
    pub rate_window: u32,
    /// Stop after this many rendered frames.
    pub max_frames: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_window: DEFAULT_RATE_WINDOW,
            max_frames: None,
        }
    }
}

/// Why the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Quit,
    Stopped,
    FrameLimit,
    /// The display refused a frame; the error was returned from that step.
    Failed,
}

/// Result of one `Pipeline::step`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Rendered(RenderReport),
    Finished(StopReason),
}

/// Summary returned by `Pipeline::run`.
#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub reason: StopReason,
    pub frames_rendered: u64,
    pub frames_annotated: u64,
    pub last_fps: Option<f64>,
    pub source: SourceStats,
    pub dispatch: DispatchStats,
    pub results: SlotStats,
}

pub struct Pipeline {
    source: FrameSource,
    preprocessor: Preprocessor,
    dispatcher: Dispatcher,
    slot: ResultSlot<InferenceResult>,
    renderer: Renderer,
    rate: RateEstimator,
    config: PipelineConfig,
    stop: Arc<AtomicBool>,
    frames_rendered: u64,
    frames_annotated: u64,
    finished: Option<StopReason>,
}

impl Pipeline {
    pub fn new(
        source: FrameSource,
        preprocessor: Preprocessor,
        engine: Box<dyn InferenceEngine>,
        renderer: Renderer,
        config: PipelineConfig,
    ) -> Result<Self> {
        let slot = ResultSlot::new();
        let dispatcher = Dispatcher::new(engine, slot.clone());
        let rate = RateEstimator::new(config.rate_window)?;
        Ok(Self {
            source,
            preprocessor,
            dispatcher,
            slot,
            renderer,
            rate,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            frames_rendered: 0,
            frames_annotated: 0,
            finished: None,
        })
    }

    /// Flag that stops the loop before its next capture when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Handle to the result slot the engine completions deliver into.
    pub fn correlator(&self) -> ResultSlot<InferenceResult> {
        self.slot.clone()
    }

    /// Run one tick.
    ///
    /// Once finished, the capture device, display and correlator are closed
    /// and every further call returns the same `Finished` reason.
    pub fn step(&mut self) -> Result<Step> {
        if let Some(reason) = self.finished {
            return Ok(Step::Finished(reason));
        }
        if self.stop.load(Ordering::SeqCst) {
            return self.finish(StopReason::Stopped);
        }
        if let Some(limit) = self.config.max_frames {
            if self.frames_rendered >= limit {
                return self.finish(StopReason::FrameLimit);
            }
        }

        let Some(frame) = self.source.next() else {
            return self.finish(StopReason::EndOfStream);
        };

        self.dispatcher.submit(self.preprocessor.prepare(&frame));
        self.rate.record_capture();

        let latest = self.slot.take_latest();
        let report = match self.renderer.render(&frame, latest.as_ref(), self.rate.fps()) {
            Ok(report) => report,
            Err(err) => {
                self.finished = Some(StopReason::Failed);
                self.shutdown();
                return Err(err);
            }
        };
        self.frames_rendered += 1;
        if report.annotated {
            self.frames_annotated += 1;
        }

        if self.renderer.poll_input() == InputAction::Quit {
            log::info!("quit requested");
            self.finish(StopReason::Quit)?;
        }
        Ok(Step::Rendered(report))
    }

    /// Run until the stream ends, the user quits, or the stop flag is set.
    pub fn run(mut self) -> Result<PipelineReport> {
        log::info!(
            "pipeline running: {} -> {}",
            self.source.device_name(),
            self.dispatcher.engine_name()
        );
        let reason = loop {
            if let Step::Finished(reason) = self.step()? {
                break reason;
            }
        };
        Ok(self.report(reason))
    }

    pub fn report(&self, reason: StopReason) -> PipelineReport {
        PipelineReport {
            reason,
            frames_rendered: self.frames_rendered,
            frames_annotated: self.frames_annotated,
            last_fps: self.rate.fps(),
            source: self.source.stats(),
            dispatch: self.dispatcher.stats(),
            results: self.slot.stats(),
        }
    }

    fn finish(&mut self, reason: StopReason) -> Result<Step> {
        self.finished = Some(reason);
        log::info!(
            "pipeline stopping ({:?}) after {} frames",
            reason,
            self.frames_rendered
        );
        self.shutdown();
        Ok(Step::Finished(reason))
    }

    /// In-flight requests are left to the engine; their completions land in
    /// the closed slot and are dropped.
    fn shutdown(&mut self) {
        self.source.close();
        self.slot.close();
        if let Err(err) = self.renderer.close() {
            log::warn!("failed to close display: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{StubBackend, WorkerEngine};
    use crate::ingest::{SourceConfig, SyntheticCamera, SyntheticConfig};
    use crate::render::{DisplaySink, HeadlessSink};

    fn synthetic_pipeline(frames: u64, config: PipelineConfig) -> Result<Pipeline> {
        let camera = SyntheticCamera::open(SyntheticConfig {
            width: 64,
            height: 48,
            frame_limit: Some(frames),
            ..SyntheticConfig::default()
        });
        Pipeline::new(
            FrameSource::new(Box::new(camera), SourceConfig::default()),
            Preprocessor::default(),
            Box::new(WorkerEngine::spawn(StubBackend::new(), 1)?),
            Renderer::new("test", Box::new(HeadlessSink::new())),
            config,
        )
    }

    #[test]
    fn runs_to_end_of_stream() -> Result<()> {
        let report = synthetic_pipeline(12, PipelineConfig::default())?.run()?;

        assert_eq!(report.reason, StopReason::EndOfStream);
        assert_eq!(report.frames_rendered, 12);
        assert_eq!(report.source.frames_captured, 12);
        assert_eq!(report.dispatch.submitted, 12);
        assert!(report.last_fps.is_some());
        Ok(())
    }

    #[test]
    fn frame_limit_stops_early() -> Result<()> {
        let config = PipelineConfig {
            max_frames: Some(3),
            ..PipelineConfig::default()
        };
        let report = synthetic_pipeline(100, config)?.run()?;

        assert_eq!(report.reason, StopReason::FrameLimit);
        assert_eq!(report.frames_rendered, 3);
        Ok(())
    }

    #[test]
    fn stop_flag_ends_loop_and_closes_slot() -> Result<()> {
        let mut pipeline = synthetic_pipeline(100, PipelineConfig::default())?;
        assert!(matches!(pipeline.step()?, Step::Rendered(_)));

        pipeline.stop_handle().store(true, Ordering::SeqCst);

        assert_eq!(pipeline.step()?, Step::Finished(StopReason::Stopped));
        assert_eq!(pipeline.step()?, Step::Finished(StopReason::Stopped));
        assert!(pipeline.correlator().is_closed());
        Ok(())
    }

    struct BrokenSink;

    impl DisplaySink for BrokenSink {
        fn show(&mut self, _window: &str, _image: &image::RgbImage) -> Result<()> {
            Err(anyhow::anyhow!("display went away"))
        }
    }

    #[test]
    fn display_failure_is_sticky() -> Result<()> {
        let camera = SyntheticCamera::open(SyntheticConfig {
            width: 64,
            height: 48,
            frame_limit: Some(10),
            ..SyntheticConfig::default()
        });
        let mut pipeline = Pipeline::new(
            FrameSource::new(Box::new(camera), SourceConfig::default()),
            Preprocessor::default(),
            Box::new(WorkerEngine::spawn(StubBackend::new(), 1)?),
            Renderer::new("test", Box::new(BrokenSink)),
            PipelineConfig::default(),
        )?;

        assert!(pipeline.step().is_err());
        assert_eq!(pipeline.step()?, Step::Finished(StopReason::Failed));
        assert!(pipeline.correlator().is_closed());
        Ok(())
    }
}
