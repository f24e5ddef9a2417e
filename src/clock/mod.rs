//! One-second phase clock
//!
//! Spawns a tokio task that calls back once per second. Every run carries
//! a generation number; `cancel` bumps it and aborts the task, so a tick
//! that was already in flight is recognised as stale and dropped by the
//! owner. Only one run is ever live.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Clock resolution
pub const TICK: Duration = Duration::from_secs(1);

/// Handle to the ticking task
#[derive(Debug, Default)]
pub struct PhaseClock {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl PhaseClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the current (or next) run
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a run is still ticking
    pub fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start ticking; a no-op if a run is already live.
    ///
    /// `on_tick` receives the run's generation and returns whether the
    /// clock should keep going. The first tick fires one full second
    /// after start. Must be called inside a tokio runtime.
    pub fn start<F>(&mut self, on_tick: F) -> bool
    where
        F: Fn(u64) -> bool + Send + 'static,
    {
        if self.is_live() {
            debug!(generation = self.generation, "clock already running");
            return false;
        }

        let generation = self.generation;
        debug!(generation, "clock started");

        self.handle = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                if !on_tick(generation) {
                    break;
                }
            }

            debug!(generation, "clock stopped");
        }));

        true
    }

    /// Invalidate the current run. Ticks already in flight are stale after this.
    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!(generation = self.generation, "clock cancelled");
        }
    }
}

impl Drop for PhaseClock {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
