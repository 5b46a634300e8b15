mod backend;
pub mod backends;
mod request;
mod result;
mod worker;

pub use backend::{Completion, CompletionHandler, InferenceBackend, InferenceEngine, SubmitError};
pub use backends::StubBackend;
pub use request::{InferenceRequest, SourceRegion};
pub use result::{
    Category, Detection, InferenceResult, Landmark, LandmarkSet, Payload, SegmentationMask,
};
pub use worker::{WorkerEngine, DEFAULT_QUEUE_DEPTH};
