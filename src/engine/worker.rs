//! Worker-thread engine.
//!
//! `WorkerEngine` turns synchronous backends into an `InferenceEngine`: requests
//! go into a bounded queue and one thread per backend instance drains it,
//! invoking the completion handler from that thread. With more than one worker,
//! completions can arrive out of submission order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use super::backend::{Completion, CompletionHandler, InferenceBackend, InferenceEngine, SubmitError};
use super::request::InferenceRequest;
use super::result::InferenceResult;

pub const DEFAULT_QUEUE_DEPTH: usize = 1;

struct Job {
    request: InferenceRequest,
    on_complete: CompletionHandler,
}

pub struct WorkerEngine {
    name: String,
    queue_depth: usize,
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerEngine {
    /// Run a single backend on one worker thread.
    pub fn spawn<B: InferenceBackend + 'static>(backend: B, queue_depth: usize) -> Result<Self> {
        Self::spawn_pool(vec![Box::new(backend)], queue_depth)
    }

    /// Run each backend instance on its own worker thread, sharing one queue.
    ///
    /// Backends are warmed up before any thread starts, so a model that fails
    /// to warm up fails here instead of on the first request.
    pub fn spawn_pool(
        mut backends: Vec<Box<dyn InferenceBackend>>,
        queue_depth: usize,
    ) -> Result<Self> {
        let name = backends
            .first()
            .map(|backend| backend.name().to_string())
            .ok_or_else(|| anyhow!("worker engine needs at least one backend"))?;
        for backend in backends.iter_mut() {
            backend
                .warm_up()
                .with_context(|| format!("warm up {} backend", backend.name()))?;
        }

        let (sender, receiver) = mpsc::sync_channel::<Job>(queue_depth);
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(backends.len());
        for (index, backend) in backends.into_iter().enumerate() {
            let receiver = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-worker-{}", name, index))
                .spawn(move || run_worker(backend, receiver))
                .context("spawn inference worker")?;
            workers.push(handle);
        }

        log::info!(
            "WorkerEngine: {} running on {} worker(s), queue depth {}",
            name,
            workers.len(),
            queue_depth
        );
        Ok(Self {
            name,
            queue_depth,
            sender: Some(sender),
            workers,
        })
    }

    /// Stop accepting requests, let queued jobs finish, and join the workers.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("WorkerEngine: {} worker thread panicked", self.name);
            }
        }
        log::info!("WorkerEngine: {} stopped", self.name);
    }
}

impl InferenceEngine for WorkerEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer_async(
        &self,
        request: InferenceRequest,
        on_complete: CompletionHandler,
    ) -> std::result::Result<(), SubmitError> {
        if !request.is_well_formed() {
            return Err(SubmitError::Rejected(format!(
                "frame {} has an empty {}x{} buffer",
                request.sequence,
                request.image.width(),
                request.image.height()
            )));
        }
        let sender = self.sender.as_ref().ok_or(SubmitError::ShutDown)?;
        match sender.try_send(Job {
            request,
            on_complete,
        }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SubmitError::Busy(self.queue_depth)),
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::ShutDown),
        }
    }
}

impl Drop for WorkerEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(mut backend: Box<dyn InferenceBackend>, receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let Ok(guard) = receiver.lock() else {
                log::error!("WorkerEngine: queue lock poisoned, worker exiting");
                return;
            };
            match guard.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        let sequence = job.request.sequence;
        let region = job.request.region;
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| backend.infer(&job.request.image)))
            .unwrap_or_else(|_| Err(anyhow!("{} backend panicked", backend.name())))
            .map(|payload| InferenceResult {
                sequence,
                region,
                latency: started.elapsed(),
                payload,
            });
        drop(job.request);

        (job.on_complete)(Completion { sequence, outcome });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
