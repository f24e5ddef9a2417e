//! Timer engine
//!
//! Owns the session and its clock behind one lock, routes commands into
//! the state machine, and publishes the resulting events. Cues and status
//! go out on a broadcast channel after the lock is released; settings
//! changes are handed to the background writer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::clock::PhaseClock;
use crate::events::SessionEvent;
use crate::settings::{Settings, SettingsWriter};
use crate::state::{Phase, Session, SettingsChange, SettingsError, TimerStatus, Transition};

/// Capacity of the event bus; slow subscribers lag rather than block
const EVENT_CAPACITY: usize = 256;

struct Inner {
    session: Session,
    clock: PhaseClock,
}

/// Shared handle to the running timer
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Mutex<Inner>>,
    event_tx: broadcast::Sender<SessionEvent>,
    writer: SettingsWriter,
}

impl Engine {
    pub fn new(settings: Settings, writer: SettingsWriter) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                session: Session::new(settings),
                clock: PhaseClock::new(),
            })),
            event_tx,
            writer,
        }
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn status(&self) -> TimerStatus {
        self.lock().session.status()
    }

    pub fn settings(&self) -> Settings {
        *self.lock().session.settings()
    }

    /// Start from Idle, or resume after a pause
    pub fn start(&self) -> TimerStatus {
        let (from, transition, status) = {
            let mut inner = self.lock();
            let from = inner.session.timer().phase;
            let transition = inner.session.start();

            if transition.state.is_running {
                let engine = self.clone();
                inner.clock.start(move |generation| engine.on_tick(generation));
            }

            (from, transition, inner.session.status())
        };

        info!(phase = %status.phase, set = status.current_set, "timer started");
        self.publish_transition(from, &transition, status.clone());
        status
    }

    /// Stop ticking, keeping phase and position
    pub fn pause(&self) -> TimerStatus {
        let (was_running, status) = {
            let mut inner = self.lock();
            inner.clock.cancel();
            let was_running = inner.session.pause();
            (was_running, inner.session.status())
        };

        if was_running {
            info!(phase = %status.phase, remaining = status.seconds_remaining, "timer paused");
        }
        self.send(SessionEvent::Status {
            status: status.clone(),
        });
        status
    }

    /// Return to Idle on set 1 from any phase
    pub fn reset(&self) -> TimerStatus {
        let (from, status) = {
            let mut inner = self.lock();
            inner.clock.cancel();
            let from = inner.session.timer().phase;
            inner.session.reset();
            (from, inner.session.status())
        };

        info!(from = %from, "timer reset");
        if from != Phase::Idle {
            self.send(SessionEvent::PhaseChanged {
                from,
                to: Phase::Idle,
                current_set: status.current_set,
            });
        }
        self.send(SessionEvent::Status {
            status: status.clone(),
        });
        status
    }

    pub fn set_work_seconds(&self, seconds: u32) -> Result<SettingsChange, SettingsError> {
        self.change_settings(|session| session.set_work_seconds(seconds))
    }

    pub fn set_rest_seconds(&self, seconds: u32) -> Result<SettingsChange, SettingsError> {
        self.change_settings(|session| session.set_rest_seconds(seconds))
    }

    pub fn set_total_sets(&self, sets: u32) -> Result<SettingsChange, SettingsError> {
        self.change_settings(|session| session.set_total_sets(sets))
    }

    pub fn set_prep_enabled(&self, enabled: bool) -> Result<SettingsChange, SettingsError> {
        self.change_settings(|session| session.set_prep_enabled(enabled))
    }

    /// Wait for queued settings saves to finish
    pub async fn flush_settings(&self) {
        self.writer.flush().await;
    }

    /// Stop the clock and flush pending saves
    pub async fn shutdown(&self) {
        {
            let mut inner = self.lock();
            inner.clock.cancel();
            inner.session.pause();
        }
        self.flush_settings().await;
        info!("timer engine stopped");
    }

    fn change_settings<F>(&self, apply: F) -> Result<SettingsChange, SettingsError>
    where
        F: FnOnce(&mut Session) -> Result<SettingsChange, SettingsError>,
    {
        let (change, status) = {
            let mut inner = self.lock();
            let change = apply(&mut inner.session)?;
            (change, inner.session.status())
        };

        info!(settings = ?change.settings, "settings changed");
        self.writer.persist(change.settings);

        self.send(SessionEvent::SettingsChanged {
            settings: change.settings,
            notice: change.notice(),
        });
        self.send(SessionEvent::Status { status });
        Ok(change)
    }

    /// Clock callback; returns whether the clock should keep running
    fn on_tick(&self, generation: u64) -> bool {
        let (from, transition, status) = {
            let mut inner = self.lock();
            if inner.clock.generation() != generation {
                debug!(generation, "dropping stale tick");
                return false;
            }

            let from = inner.session.timer().phase;
            let transition = inner.session.tick();
            if !transition.state.is_running {
                inner.clock.cancel();
            }
            (from, transition, inner.session.status())
        };

        let running = transition.state.is_running;
        if !running {
            info!(phase = %status.phase, "session complete");
        }
        self.publish_transition(from, &transition, status);
        running
    }

    fn publish_transition(&self, from: Phase, transition: &Transition, status: TimerStatus) {
        if transition.state.phase != from {
            self.send(SessionEvent::PhaseChanged {
                from,
                to: transition.state.phase,
                current_set: transition.state.current_set,
            });
        }
        for cue in &transition.cues {
            self.send(SessionEvent::Cue { cue: *cue });
        }
        self.send(SessionEvent::Status { status });
    }

    fn send(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
