//! Inference worker pool.
//!
//! Inference runs off the scheduler context on a fixed set of named worker
//! threads. Requests go through one bounded queue; results come back through a
//! completion channel that the scheduler drains at the start of each cycle,
//! so every state mutation stays on the scheduler's side.
//!
//! The pool itself does not know about lanes being busy. The scheduler only
//! submits for idle lanes, which is what keeps calls per lane at one.

use crate::backend::{InferenceOutput, InferenceParams, ResonatorBackend};
use crate::error::{Error, InferenceError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use resonator_core::LaneId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const WORKER_POLL: Duration = Duration::from_millis(20);

/// Identifies one submitted request. Completions carry it back so stale
/// results can be recognised and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub lane: LaneId,
    pub audio: Vec<f32>,
    pub prompt: String,
    pub params: InferenceParams,
}

#[derive(Debug)]
pub struct InferenceCompletion {
    pub ticket: Ticket,
    pub lane: LaneId,
    pub result: std::result::Result<InferenceOutput, InferenceError>,
    /// Wall time spent inside the backend.
    pub elapsed: Duration,
}

struct Job {
    ticket: Ticket,
    request: InferenceRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 64,
        }
    }
}

pub struct InferencePool {
    job_tx: Option<Sender<Job>>,
    completion_rx: Receiver<InferenceCompletion>,
    running: Arc<AtomicBool>,
    next_ticket: AtomicU64,
    workers: Vec<JoinHandle<()>>,
}

impl InferencePool {
    /// Spawn `config.workers` threads sharing `backend`.
    pub fn start(backend: Arc<dyn ResonatorBackend>, config: PoolConfig) -> Result<Self> {
        if config.workers == 0 || config.queue_capacity == 0 {
            return Err(Error::InvalidConfig(format!(
                "inference pool needs at least one worker and queue slot (got {} / {})",
                config.workers, config.queue_capacity
            )));
        }

        let (job_tx, job_rx) = crossbeam_channel::bounded::<Job>(config.queue_capacity);
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
        let running = Arc::new(AtomicBool::new(true));

        let mut workers = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let job_rx = job_rx.clone();
            let completion_tx = completion_tx.clone();
            let backend = Arc::clone(&backend);
            let running = Arc::clone(&running);

            let handle = std::thread::Builder::new()
                .name(format!("resonator-infer-{}", index))
                .spawn(move || worker_loop(backend, job_rx, completion_tx, &running))
                .map_err(|e| Error::WorkerSpawn(e.to_string()))?;
            workers.push(handle);
        }

        tracing::info!(
            "Inference pool started ({} workers, backend: {})",
            config.workers,
            backend.capabilities().name
        );

        Ok(Self {
            job_tx: Some(job_tx),
            completion_rx,
            running,
            next_ticket: AtomicU64::new(1),
            workers,
        })
    }

    /// Queue a request. Returns `None` if the queue is full or the pool is
    /// shut down; the request is dropped in that case.
    pub fn submit(&self, request: InferenceRequest) -> Option<Ticket> {
        let tx = self.job_tx.as_ref()?;
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let lane = request.lane;
        match tx.try_send(Job { ticket, request }) {
            Ok(()) => Some(ticket),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Inference queue full, dropping request for {}", lane);
                None
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::warn!("Inference pool disconnected");
                None
            }
        }
    }

    /// Block up to `timeout` for the next finished call.
    pub fn wait_completion(&self, timeout: Duration) -> Option<InferenceCompletion> {
        self.completion_rx.recv_timeout(timeout).ok()
    }

    /// All finished calls currently waiting.
    pub fn drain_completions(&self) -> Vec<InferenceCompletion> {
        self.completion_rx.try_iter().collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work and join the workers. Calls already inside the
    /// backend run to completion; queued jobs are discarded.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for InferencePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    backend: Arc<dyn ResonatorBackend>,
    job_rx: Receiver<Job>,
    completion_tx: Sender<InferenceCompletion>,
    running: &AtomicBool,
) {
    loop {
        let job = match job_rx.recv_timeout(WORKER_POLL) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => {
                if running.load(Ordering::Acquire) {
                    continue;
                }
                break;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if !running.load(Ordering::Acquire) {
            break;
        }

        let Job { ticket, request } = job;
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| {
            backend.infer(&request.audio, &request.prompt, &request.params)
        }))
        .unwrap_or_else(|_| Err(InferenceError::Failed("backend panicked".into())));

        if let Err(e) = &result {
            tracing::warn!("Inference failed for {}: {}", request.lane, e);
        }

        let completion = InferenceCompletion {
            ticket,
            lane: request.lane,
            result,
            elapsed: started.elapsed(),
        };
        if completion_tx.send(completion).is_err() {
            break;
        }
    }
    tracing::debug!("Inference worker exiting");
}
