//! Thread-safe handle that drives a `NeuralEngine` on a scheduler thread.

use crate::lane::LaneMonitor;
use crate::{Error, LaneId, NeuralEngine, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Scheduler {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

/// Shares one engine between a UI/control thread and the scheduler thread.
///
/// The scheduler ticks the engine every `tick_interval_ms`. Control calls go
/// through [`with`](Self::with) and take the same lock, so they never
/// interleave with a cycle. Monitors can be read without locking.
///
/// # Example
///
/// ```
/// use latent_resonator::prelude::*;
///
/// let handle = EngineHandle::new(NeuralEngine::builder().seed(1).build()?);
/// let lane = handle.with(|e| e.add_default_lane())?;
/// let monitor = handle.monitor(lane).unwrap();
///
/// handle.start_scheduler()?;
/// handle.with(|e| e.start_processing());
/// handle.stop_scheduler();
///
/// let applied = handle.with(|e| e.lane(lane).map(|l| l.iteration_count()));
/// assert_eq!(Some(monitor.iteration_count()), applied);
/// # Ok::<(), latent_resonator::Error>(())
/// ```
pub struct EngineHandle {
    engine: Arc<Mutex<NeuralEngine>>,
    scheduler: Mutex<Option<Scheduler>>,
}

impl EngineHandle {
    pub fn new(engine: NeuralEngine) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            scheduler: Mutex::new(None),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut NeuralEngine) -> R) -> R {
        f(&mut self.engine.lock())
    }

    /// Lock-free readouts for `lane`.
    pub fn monitor(&self, lane: LaneId) -> Option<Arc<LaneMonitor>> {
        self.engine.lock().lane_monitor(lane)
    }

    pub fn is_scheduling(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    /// Spawn the scheduler thread. Does nothing if it is already running.
    pub fn start_scheduler(&self) -> Result<()> {
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_some() {
            return Ok(());
        }

        let interval = self.engine.lock().config().tick_interval();
        let engine = Arc::clone(&self.engine);
        let (stop_tx, stop_rx) = bounded(1);

        let thread = thread::Builder::new()
            .name("resonator-scheduler".into())
            .spawn(move || scheduler_loop(engine, stop_rx, interval))
            .map_err(|e| Error::SchedulerSpawn(e.to_string()))?;

        tracing::info!("Scheduler started ({:?} per cycle)", interval);
        *scheduler = Some(Scheduler { stop_tx, thread });
        Ok(())
    }

    /// Stop and join the scheduler thread. Lane state is untouched; use
    /// `stop_processing` for a panic stop.
    pub fn stop_scheduler(&self) {
        let Some(scheduler) = self.scheduler.lock().take() else {
            return;
        };
        let _ = scheduler.stop_tx.send(());
        if scheduler.thread.join().is_err() {
            tracing::error!("Scheduler thread panicked");
        }
        tracing::info!("Scheduler stopped");
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop_scheduler();
    }
}

fn scheduler_loop(engine: Arc<Mutex<NeuralEngine>>, stop_rx: Receiver<()>, interval: Duration) {
    loop {
        engine.lock().tick();
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
