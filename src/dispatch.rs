//! Fire-and-forget inference dispatch.
//!
//! `Dispatcher::submit` hands a request to the engine and returns immediately.
//! The completion handler it registers delivers results straight into the
//! `ResultSlot`; the dispatcher itself never holds on to results.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::correlator::{DeliverOutcome, ResultSlot};
use crate::engine::{
    Completion, CompletionHandler, InferenceEngine, InferenceRequest, InferenceResult, SubmitError,
};

/// Dispatch counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub submitted: u64,
    pub accepted: u64,
    pub busy: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    accepted: AtomicU64,
    busy: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

pub struct Dispatcher {
    engine: Box<dyn InferenceEngine>,
    on_complete: CompletionHandler,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(engine: Box<dyn InferenceEngine>, slot: ResultSlot<InferenceResult>) -> Self {
        let counters = Arc::new(Counters::default());
        let on_complete = completion_handler(slot, counters.clone());
        Self {
            engine,
            on_complete,
            counters,
        }
    }

    /// Submit without waiting. Returns whether the engine accepted the request.
    ///
    /// Refused requests are logged and dropped.
    pub fn submit(&self, request: InferenceRequest) -> bool {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        let sequence = request.sequence;
        match self.engine.infer_async(request, self.on_complete.clone()) {
            Ok(()) => {
                self.counters.accepted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(SubmitError::Busy(depth)) => {
                self.counters.busy.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "dispatch: frame {} dropped, {} busy (queue depth {})",
                    sequence,
                    self.engine.name(),
                    depth
                );
                false
            }
            Err(err) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "dispatch: frame {} dropped by {}: {}",
                    sequence,
                    self.engine.name(),
                    err
                );
                false
            }
        }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            busy: self.counters.busy.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}

fn completion_handler(
    slot: ResultSlot<InferenceResult>,
    counters: Arc<Counters>,
) -> CompletionHandler {
    Arc::new(move |completion: Completion| match completion.outcome {
        Ok(result) => {
            counters.completed.fetch_add(1, Ordering::Relaxed);
            let sequence = result.sequence;
            match slot.deliver(result) {
                DeliverOutcome::Stored => {
                    log::trace!("dispatch: result for frame {} pending", sequence)
                }
                DeliverOutcome::Superseded(stale) => log::debug!(
                    "dispatch: result for frame {} superseded unread result for frame {}",
                    sequence,
                    stale.sequence
                ),
                DeliverOutcome::Discarded(_) => log::debug!(
                    "dispatch: late result for frame {} discarded after shutdown",
                    sequence
                ),
            }
        }
        Err(err) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "dispatch: inference failed for frame {}: {:#}",
                completion.sequence,
                err
            );
        }
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Payload, SourceRegion};
    use anyhow::anyhow;
    use image::RgbImage;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Mode {
        Complete,
        Fail,
        Busy,
        Reject,
    }

    /// Engine that completes inline on the submitting thread.
    struct InlineEngine(Mode);

    impl InferenceEngine for InlineEngine {
        fn name(&self) -> &str {
            "inline"
        }

        fn infer_async(
            &self,
            request: InferenceRequest,
            on_complete: CompletionHandler,
        ) -> Result<(), SubmitError> {
            let outcome = match self.0 {
                Mode::Busy => return Err(SubmitError::Busy(1)),
                Mode::Reject => return Err(SubmitError::Rejected("wrong shape".into())),
                Mode::Fail => Err(anyhow!("bad tensor")),
                Mode::Complete => Ok(InferenceResult {
                    sequence: request.sequence,
                    region: request.region,
                    latency: Duration::ZERO,
                    payload: Payload::Detections(vec![]),
                }),
            };
            on_complete(Completion {
                sequence: request.sequence,
                outcome,
            });
            Ok(())
        }
    }

    fn request(sequence: u64) -> InferenceRequest {
        InferenceRequest::new(sequence, RgbImage::new(2, 2), SourceRegion::full(2, 2))
    }

    #[test]
    fn completions_land_in_slot() {
        let slot = ResultSlot::new();
        let dispatcher = Dispatcher::new(Box::new(InlineEngine(Mode::Complete)), slot.clone());

        assert!(dispatcher.submit(request(1)));
        assert!(dispatcher.submit(request(2)));

        assert_eq!(slot.take_latest().map(|r| r.sequence), Some(2));
        let stats = dispatcher.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.completed, 2);
        assert_eq!(slot.stats().superseded, 1);
    }

    #[test]
    fn refused_requests_are_dropped() {
        let slot = ResultSlot::new();
        let busy = Dispatcher::new(Box::new(InlineEngine(Mode::Busy)), slot.clone());
        let rejecting = Dispatcher::new(Box::new(InlineEngine(Mode::Reject)), slot.clone());

        assert!(!busy.submit(request(1)));
        assert!(!rejecting.submit(request(2)));

        assert_eq!(busy.stats().busy, 1);
        assert_eq!(rejecting.stats().rejected, 1);
        assert!(slot.take_latest().is_none());
    }

    #[test]
    fn failed_inference_is_counted_not_delivered() {
        let slot = ResultSlot::new();
        let dispatcher = Dispatcher::new(Box::new(InlineEngine(Mode::Fail)), slot.clone());

        assert!(dispatcher.submit(request(1)));
        assert_eq!(dispatcher.stats().failed, 1);
        assert!(slot.take_latest().is_none());
    }

    #[test]
    fn late_completion_after_close_is_absorbed() {
        let slot = ResultSlot::new();
        let parked: Arc<Mutex<Option<CompletionHandler>>> = Arc::new(Mutex::new(None));

        struct ParkingEngine(Arc<Mutex<Option<CompletionHandler>>>);
        impl InferenceEngine for ParkingEngine {
            fn name(&self) -> &str {
                "parking"
            }
            fn infer_async(
                &self,
                _request: InferenceRequest,
                on_complete: CompletionHandler,
            ) -> Result<(), SubmitError> {
                *self.0.lock().unwrap() = Some(on_complete);
                Ok(())
            }
        }

        let dispatcher = Dispatcher::new(Box::new(ParkingEngine(parked.clone())), slot.clone());
        assert!(dispatcher.submit(request(4)));
        slot.close();
        drop(dispatcher);

        let handler = parked.lock().unwrap().take().expect("parked handler");
        handler(Completion {
            sequence: 4,
            outcome: Ok(InferenceResult {
                sequence: 4,
                region: SourceRegion::full(2, 2),
                latency: Duration::ZERO,
                payload: Payload::Detections(vec![]),
            }),
        });

        assert_eq!(slot.stats().discarded, 1);
        assert!(slot.take_latest().is_none());
    }
}
