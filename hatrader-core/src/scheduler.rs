//! Cycle scheduler: runs the trading cycle on a background worker thread.
//!
//! The control surface talks to the worker through a cancellation token
//! (`Arc<AtomicBool>`) and receives [`WorkerEvent`]s over an `mpsc` channel.
//! Sleeps between cycles are split into `poll_interval` increments so a stop
//! request is observed within one increment. Cycles never overlap.
//!
//! When the worker exits it hands the cycle (and with it the position state)
//! back, so a later `start` resumes where the previous run left off.

use crate::executor::{CycleError, CycleOutcome};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// One unit of scheduled work.
pub trait Cycle: Send + 'static {
    fn run_cycle(&mut self) -> Result<CycleOutcome, CycleError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    /// Stop requested; the worker has not exited yet.
    Stopping,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker thread panicked outside a cycle; the cycle state was lost")]
    WorkerLost,
}

/// Cooperative cancellation flag shared with the worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Sleep for `total`, checking `token` every `poll`.
///
/// Returns `false` if cancelled before `total` elapsed.
pub fn interruptible_sleep(total: Duration, poll: Duration, token: &CancelToken) -> bool {
    let poll = poll.max(Duration::from_millis(1));
    let deadline = Instant::now() + total;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(poll.min(deadline - now));
    }
}

/// Wait lengths between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Regular wait: one timeframe.
    pub interval: Duration,
    /// Wait after a failed fetch or a cycle error.
    pub retry_backoff: Duration,
    /// Sleep increment between cancellation checks.
    pub poll_interval: Duration,
}

/// Messages from the worker to the control surface.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started,
    CycleCompleted { cycle: u64, outcome: CycleOutcome },
    CycleFailed { cycle: u64, error: String },
    Stopped { cycles: u64 },
}

enum Slot<C> {
    Idle(C),
    Running {
        token: CancelToken,
        handle: JoinHandle<C>,
    },
    Lost,
}

pub struct Scheduler<C: Cycle> {
    slot: Slot<C>,
    timing: Timing,
    events: Sender<WorkerEvent>,
}

impl<C: Cycle> Scheduler<C> {
    /// Idle scheduler owning `cycle`, plus the receiving end of its event channel.
    pub fn new(cycle: C, timing: Timing) -> (Self, Receiver<WorkerEvent>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                slot: Slot::Idle(cycle),
                timing,
                events: tx,
            },
            rx,
        )
    }

    pub fn state(&self) -> SchedulerState {
        match &self.slot {
            Slot::Idle(_) | Slot::Lost => SchedulerState::Idle,
            Slot::Running { token, handle } => {
                if token.is_cancelled() || handle.is_finished() {
                    SchedulerState::Stopping
                } else {
                    SchedulerState::Running
                }
            }
        }
    }

    /// The cycle, when no worker holds it.
    pub fn cycle(&self) -> Option<&C> {
        match &self.slot {
            Slot::Idle(cycle) => Some(cycle),
            _ => None,
        }
    }

    /// Idle -> Running. Returns `Ok(false)` if already running.
    pub fn start(&mut self) -> Result<bool, SchedulerError> {
        match self.state() {
            SchedulerState::Running => {
                tracing::warn!("strategy is already running");
                return Ok(false);
            }
            SchedulerState::Stopping => self.join()?,
            SchedulerState::Idle => {}
        }

        let cycle = match std::mem::replace(&mut self.slot, Slot::Lost) {
            Slot::Idle(cycle) => cycle,
            other => {
                self.slot = other;
                return Err(SchedulerError::WorkerLost);
            }
        };

        let token = CancelToken::new();
        let worker_token = token.clone();
        let events = self.events.clone();
        let timing = self.timing;
        let handle = thread::Builder::new()
            .name("hatrader-worker".into())
            .spawn(move || worker_loop(cycle, worker_token, timing, events))
            .map_err(SchedulerError::Spawn)?;

        self.slot = Slot::Running { token, handle };
        tracing::info!("strategy started");
        Ok(true)
    }

    /// Ask the worker to stop without waiting for it.
    pub fn request_stop(&self) {
        if let Slot::Running { token, .. } = &self.slot {
            token.cancel();
        }
    }

    /// Running -> Idle, waiting for the in-flight cycle to finish.
    /// Returns `Ok(false)` if nothing was running.
    pub fn stop(&mut self) -> Result<bool, SchedulerError> {
        if matches!(self.slot, Slot::Idle(_) | Slot::Lost) {
            tracing::info!("strategy is not running");
            return Ok(false);
        }
        self.request_stop();
        self.join()?;
        tracing::info!("strategy stopped");
        Ok(true)
    }

    /// Cancellation handle for the running worker, for stopping it from
    /// another thread.
    pub fn stop_handle(&self) -> Option<CancelToken> {
        match &self.slot {
            Slot::Running { token, .. } => Some(token.clone()),
            _ => None,
        }
    }

    /// Block until the worker exits on its own, i.e. until something cancels
    /// its token. Returns immediately when nothing is running.
    pub fn wait(&mut self) -> Result<(), SchedulerError> {
        self.join_worker(false)
    }

    /// Stop if running. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> Result<(), SchedulerError> {
        if matches!(self.slot, Slot::Running { .. }) {
            self.stop()?;
        }
        Ok(())
    }

    fn join(&mut self) -> Result<(), SchedulerError> {
        self.join_worker(true)
    }

    fn join_worker(&mut self, cancel: bool) -> Result<(), SchedulerError> {
        match std::mem::replace(&mut self.slot, Slot::Lost) {
            Slot::Running { token, handle } => {
                if cancel {
                    token.cancel();
                }
                match handle.join() {
                    Ok(cycle) => {
                        self.slot = Slot::Idle(cycle);
                        Ok(())
                    }
                    Err(_) => Err(SchedulerError::WorkerLost),
                }
            }
            other => {
                self.slot = other;
                Ok(())
            }
        }
    }
}

impl<C: Cycle> Drop for Scheduler<C> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "scheduler shutdown failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn worker_loop<C: Cycle>(
    mut cycle: C,
    token: CancelToken,
    timing: Timing,
    events: Sender<WorkerEvent>,
) -> C {
    let _ = events.send(WorkerEvent::Started);
    let mut cycles = 0u64;

    while !token.is_cancelled() {
        cycles += 1;
        let result = panic::catch_unwind(AssertUnwindSafe(|| cycle.run_cycle()))
            .unwrap_or_else(|payload| Err(CycleError::Panicked(panic_message(payload.as_ref()))));

        let wait = match result {
            Ok(outcome) => {
                let wait = if outcome.wants_retry() {
                    tracing::info!(
                        secs = timing.retry_backoff.as_secs(),
                        "retrying after backoff"
                    );
                    timing.retry_backoff
                } else {
                    timing.interval
                };
                let _ = events.send(WorkerEvent::CycleCompleted {
                    cycle: cycles,
                    outcome,
                });
                wait
            }
            Err(e) => {
                tracing::error!(cycle = cycles, error = %e, "cycle failed");
                let _ = events.send(WorkerEvent::CycleFailed {
                    cycle: cycles,
                    error: e.to_string(),
                });
                timing.retry_backoff
            }
        };

        if !interruptible_sleep(wait, timing.poll_interval, &token) {
            break;
        }
    }

    let _ = events.send(WorkerEvent::Stopped { cycles });
    cycle
}
