//! Overlay rendering.
//!
//! The renderer runs once per tick on the pipeline loop. It never waits for a
//! result: when the correlator has nothing new, the frame is shown as captured.
//! Display state (overlay mode, FPS readout) lives on the `Renderer` instance.

mod draw;
mod sink;

use anyhow::Result;

use crate::engine::{InferenceResult, Payload};
use crate::frame::Frame;

pub use sink::{DirectorySink, DisplaySink, HeadlessSink, StdinKeys};

pub const KEY_QUIT: char = 'q';
pub const KEY_ESCAPE: char = '\u{1b}';
pub const KEY_CYCLE_MODE: char = 'm';
pub const KEY_TOGGLE_FPS: char = 'f';

/// What the overlay draws. Cycles in declaration order and wraps around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverlayMode {
    /// Everything the payload carries, including score bars.
    #[default]
    Full,
    /// Geometry only (boxes, points, masks).
    BoxesOnly,
    /// Raw frames.
    Hidden,
}

impl OverlayMode {
    pub fn next(self) -> Self {
        match self {
            OverlayMode::Full => OverlayMode::BoxesOnly,
            OverlayMode::BoxesOnly => OverlayMode::Hidden,
            OverlayMode::Hidden => OverlayMode::Full,
        }
    }
}

/// Effect of a key press on the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputAction {
    Continue,
    Quit,
}

/// Outcome of one render tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderReport {
    pub frame_sequence: u64,
    /// Sequence of the result consumed this tick, if any.
    pub result_sequence: Option<u64>,
    /// Whether an overlay was drawn.
    pub annotated: bool,
}

pub struct Renderer {
    window: String,
    sink: Box<dyn DisplaySink>,
    mode: OverlayMode,
    show_fps: bool,
    last_fps: Option<f64>,
}

impl Renderer {
    pub fn new(window: &str, sink: Box<dyn DisplaySink>) -> Self {
        Self {
            window: window.to_string(),
            sink,
            mode: OverlayMode::default(),
            show_fps: false,
            last_fps: None,
        }
    }

    pub fn with_fps(mut self, show_fps: bool) -> Self {
        self.show_fps = show_fps;
        self
    }

    pub fn mode(&self) -> OverlayMode {
        self.mode
    }

    pub fn shows_fps(&self) -> bool {
        self.show_fps
    }

    /// Draw `result` (if any) onto a copy of `frame` and present it.
    ///
    /// `fps` is the estimator's current value; it is reported whenever it
    /// changes and the readout is enabled.
    pub fn render(
        &mut self,
        frame: &Frame,
        result: Option<&InferenceResult>,
        fps: Option<f64>,
    ) -> Result<RenderReport> {
        let mut canvas = frame.annotated_copy();
        let mut annotated = false;

        if let Some(result) = result {
            if self.mode != OverlayMode::Hidden {
                annotated = self.draw_result(&mut canvas, result);
            }
            log::debug!(
                "{}: frame {} ({:?} old) shows result {} ({} {}, {} behind, {:?} inference)",
                self.window,
                frame.sequence(),
                frame.age(),
                result.sequence,
                result.payload.len(),
                result.payload.kind(),
                frame.sequence().saturating_sub(result.sequence),
                result.latency
            );
        }

        if self.show_fps && fps.is_some() && fps != self.last_fps {
            if let Some(fps) = fps {
                log::info!("{}: {:.1} fps", self.window, fps);
            }
        }
        self.last_fps = fps;

        self.sink.show(&self.window, &canvas)?;
        Ok(RenderReport {
            frame_sequence: frame.sequence(),
            result_sequence: result.map(|r| r.sequence),
            annotated,
        })
    }

    fn draw_result(&self, canvas: &mut image::RgbImage, result: &InferenceResult) -> bool {
        let full = self.mode == OverlayMode::Full;
        match &result.payload {
            Payload::Detections(detections) => {
                for detection in detections {
                    draw::draw_detection(canvas, &result.region, detection, full);
                }
                !detections.is_empty()
            }
            Payload::Landmarks(sets) => {
                for set in sets {
                    draw::draw_landmarks(canvas, &result.region, set);
                }
                !sets.is_empty()
            }
            Payload::Mask(mask) => {
                draw::draw_mask(canvas, &result.region, mask);
                true
            }
            Payload::Classifications(categories) => {
                if full {
                    draw::draw_classifications(canvas, categories);
                }
                full && !categories.is_empty()
            }
        }
    }

    /// Poll the sink for one key press and apply it.
    pub fn poll_input(&mut self) -> InputAction {
        match self.sink.poll_input() {
            Some(key) => self.handle_key(key),
            None => InputAction::Continue,
        }
    }

    pub fn handle_key(&mut self, key: char) -> InputAction {
        match key.to_ascii_lowercase() {
            KEY_QUIT | KEY_ESCAPE => InputAction::Quit,
            KEY_CYCLE_MODE => {
                self.mode = self.mode.next();
                log::info!("{}: overlay mode {:?}", self.window, self.mode);
                InputAction::Continue
            }
            KEY_TOGGLE_FPS => {
                self.show_fps = !self.show_fps;
                self.last_fps = None;
                InputAction::Continue
            }
            _ => InputAction::Continue,
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.sink.close()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
