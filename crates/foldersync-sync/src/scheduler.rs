//! Sync scheduler - repeats sync cycles on a fixed interval
//!
//! The [`SyncScheduler`] drives a [`SyncEngine`] in a loop: run a cycle,
//! wait for the interval on the injected [`IClock`], repeat.
//!
//! ## States
//!
//! ```text
//!            cycle done             interval elapsed
//! Running ───────────────→ Waiting ─────────────────→ Running
//!    │                        │
//!    │ sink failure /         │ cancelled
//!    │ cycle limit            ▼
//!    └──────────────────→ Stopped
//! ```
//!
//! The first cycle starts immediately. The interval is measured from the
//! end of one cycle to the start of the next, so a slow cycle never
//! overlaps the following one. Cancellation is observed at cycle
//! boundaries and while waiting, never in the middle of an operation.

use std::sync::Arc;
use std::time::Duration;

use foldersync_core::ports::IClock;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::engine::SyncEngine;
use crate::SyncError;

// ============================================================================
// Scheduler state
// ============================================================================

/// Observable scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// A cycle is in progress
    Running,
    /// Sleeping until the next cycle
    Waiting,
    /// The loop has exited
    Stopped,
}

/// Why the scheduler stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token was triggered
    Cancelled,
    /// The configured number of cycles has run
    CycleLimitReached,
}

// ============================================================================
// SyncScheduler struct
// ============================================================================

/// Runs sync cycles until cancelled, a cycle limit is hit, or a fatal error
pub struct SyncScheduler {
    engine: SyncEngine,
    clock: Arc<dyn IClock>,
    interval: Duration,
    cancel: CancellationToken,
    max_cycles: Option<u64>,
    cycles_run: u64,
    state: watch::Sender<SchedulerState>,
}

impl SyncScheduler {
    /// Creates a new `SyncScheduler`
    ///
    /// # Arguments
    /// * `engine` - Engine that performs each cycle
    /// * `clock` - Clock used to wait between cycles
    /// * `interval` - Delay between the end of a cycle and the next start
    /// * `cancel` - Token that requests a graceful stop
    pub fn new(
        engine: SyncEngine,
        clock: Arc<dyn IClock>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        info!(
            interval_secs = interval.as_secs(),
            source = %engine.source_root().display(),
            replica = %engine.replica_root().display(),
            "Creating sync scheduler"
        );

        let (state, _) = watch::channel(SchedulerState::Waiting);
        Self {
            engine,
            clock,
            interval,
            cancel,
            max_cycles: None,
            cycles_run: 0,
            state,
        }
    }

    /// Stops after `cycles` cycles (used for single-shot runs)
    pub fn with_max_cycles(mut self, cycles: u64) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Number of cycles completed so far
    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Runs cycles until a stop condition is reached
    ///
    /// # Errors
    /// Returns [`SyncError`] if a cycle failed fatally (operation log
    /// unavailable). The scheduler is `Stopped` in every case.
    pub async fn run(&mut self) -> Result<StopReason, SyncError> {
        info!("Sync scheduler starting");

        let reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            self.set_state(SchedulerState::Running);
            let result = self.engine.run_cycle().await;
            self.cycles_run += 1;

            if let Err(err) = result {
                error!(error = %err, cycles = self.cycles_run, "Fatal error, stopping scheduler");
                self.set_state(SchedulerState::Stopped);
                return Err(err);
            }

            if self.max_cycles.is_some_and(|max| self.cycles_run >= max) {
                break StopReason::CycleLimitReached;
            }

            self.set_state(SchedulerState::Waiting);
            tokio::select! {
                _ = self.cancel.cancelled() => break StopReason::Cancelled,
                _ = self.clock.sleep(self.interval) => {}
            }
        };

        self.set_state(SchedulerState::Stopped);
        info!(?reason, cycles = self.cycles_run, "Sync scheduler stopped");
        Ok(reason)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
