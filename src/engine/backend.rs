use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;
use thiserror::Error;

use super::request::InferenceRequest;
use super::result::{InferenceResult, Payload};

/// Synchronous inference backend.
///
/// Backends run one image at a time and own whatever model state they need.
/// They are driven either directly (`infer`) or from an engine worker thread,
/// so they must be `Send`.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on an RGB image.
    ///
    /// Implementations must treat the image as read-only and must not keep it
    /// beyond the call.
    fn infer(&mut self, image: &RgbImage) -> Result<Payload>;

    /// Optional warm-up hook, run once before the first request.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Why an engine refused a request. Refused requests get no completion.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The engine's queue is full; the request was dropped.
    #[error("engine busy (queue depth {0})")]
    Busy(usize),
    /// The request is malformed or unsupported.
    #[error("request rejected: {0}")]
    Rejected(String),
    /// The engine is shutting down.
    #[error("engine shut down")]
    ShutDown,
}

/// Completion notification for an accepted request.
#[derive(Debug)]
pub struct Completion {
    /// Sequence of the request this completion answers.
    pub sequence: u64,
    pub outcome: Result<InferenceResult>,
}

/// Completion listener. Invoked from engine-managed threads.
pub type CompletionHandler = Arc<dyn Fn(Completion) + Send + Sync>;

/// Asynchronous inference engine.
///
/// # Contract
///
/// - `infer_async` returns without waiting for inference.
/// - Every accepted request (`Ok(())`) eventually produces exactly one call to
///   `on_complete` carrying the request's sequence. Completions may arrive in
///   any order and on any thread.
/// - Refused requests (`Err(_)`) produce no completion.
pub trait InferenceEngine: Send {
    fn name(&self) -> &str;

    fn infer_async(
        &self,
        request: InferenceRequest,
        on_complete: CompletionHandler,
    ) -> std::result::Result<(), SubmitError>;
}
