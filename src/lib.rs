//! Live Overlay
//!
//! Captures live video frames, hands them to an inference engine without
//! waiting, and overlays whatever result is freshest onto the frames it shows.
//!
//! # Architecture
//!
//! The capture/render loop never blocks on inference:
//!
//! 1. **Capture**: a `FrameSource` reads the device, numbers frames from 1
//!    and mirrors them.
//! 2. **Preprocess**: a pure `Frame -> InferenceRequest` resize step.
//! 3. **Dispatch**: requests are submitted fire-and-forget; the engine answers
//!    each accepted request exactly once, on its own threads, in any order.
//! 4. **Correlate**: completions land in a single-slot `ResultSlot` where the
//!    most recent arrival wins and each result is read at most once.
//! 5. **Render**: every tick draws the slot's result (if any) onto a copy of
//!    the current frame, so annotations may trail the frame they are drawn on.
//!
//! # Module Structure
//!
//! - `frame`: captured frames (immutable pixels, sequence, timestamps)
//! - `ingest`: capture devices and the frame source (synthetic, V4L2)
//! - `preprocess`: resize policies
//! - `engine`: engine/backend traits, result payloads, worker engine, backends
//! - `dispatch`: non-blocking submission into the correlator
//! - `correlator`: the latest-wins result slot
//! - `render`: overlay drawing, display sinks, UI state
//! - `rate`: windowed FPS estimate
//! - `pipeline`: the loop tying it together
//! - `config`: file + environment configuration

pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod engine;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod preprocess;
pub mod rate;
pub mod render;

pub use config::StreamConfig;
pub use correlator::{DeliverOutcome, ResultSlot, SlotStats};
pub use dispatch::{DispatchStats, Dispatcher};
pub use engine::{
    Completion, CompletionHandler, InferenceBackend, InferenceEngine, InferenceRequest,
    InferenceResult, Payload, SubmitError, WorkerEngine,
};
pub use frame::Frame;
pub use ingest::{open_device, CaptureDevice, DeviceSpec, FrameSource, SourceConfig};
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, Step, StopReason};
pub use preprocess::{Preprocessor, ResizePolicy};
pub use rate::RateEstimator;
pub use render::{DisplaySink, OverlayMode, Renderer};
