//! Owned session: configuration plus timer state
//!
//! The single source of truth for the engine. All mutation goes through
//! the methods here so the lock rule and the session cap always hold.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::settings::{
    phase_seconds_in_range, SetClamp, Settings, MAX_PHASE_SECONDS, MIN_PHASE_SECONDS,
    SESSION_CAP_SECONDS,
};

use super::machine::{self, Phase, TimerState, Transition};

/// Why a settings change was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("stop and reset to change settings")]
    Locked,

    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl SettingsError {
    /// Stable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            SettingsError::Locked => "settings_locked",
            SettingsError::OutOfRange { .. } => "out_of_range",
        }
    }
}

/// An accepted settings change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsChange {
    pub settings: Settings,
    /// Set when `total_sets` had to be lowered to fit the cap
    pub clamped: Option<SetClamp>,
}

impl SettingsChange {
    /// User-visible advisory for a clamped set count
    pub fn notice(&self) -> Option<String> {
        self.clamped.map(|clamp| {
            format!(
                "total sets adjusted to {} to stay within {} hours",
                clamp.applied,
                SESSION_CAP_SECONDS / 3600
            )
        })
    }
}

/// Snapshot for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerStatus {
    pub phase: Phase,
    pub seconds_remaining: u32,
    pub current_set: u32,
    pub total_sets: u32,
    /// Remaining fraction of the current phase
    pub progress: f64,
    pub locked: bool,
    pub running: bool,
    pub estimated_minutes_remaining: u32,
    /// `seconds_remaining` as "MM:SS"
    pub clock: String,
    pub settings: Settings,
}

/// Configuration and timer state, owned together
#[derive(Debug, Clone)]
pub struct Session {
    settings: Settings,
    timer: TimerState,
}

impl Session {
    /// Create an idle session; settings are clamped to the cap first
    pub fn new(mut settings: Settings) -> Self {
        settings.clamp_to_cap();
        Self {
            timer: TimerState::idle(&settings),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    /// Settings may not change while a session is in progress or running
    pub fn is_locked(&self) -> bool {
        self.timer.phase.is_active() || self.timer.is_running
    }

    pub fn start(&mut self) -> Transition {
        self.apply(machine::start(self.timer, &self.settings))
    }

    pub fn tick(&mut self) -> Transition {
        self.apply(machine::tick(self.timer, &self.settings))
    }

    /// Returns whether the timer was running
    pub fn pause(&mut self) -> bool {
        let was_running = self.timer.is_running;
        self.timer = machine::pause(self.timer);
        was_running
    }

    pub fn reset(&mut self) {
        self.timer = machine::reset(&self.settings);
    }

    pub fn set_work_seconds(&mut self, seconds: u32) -> Result<SettingsChange, SettingsError> {
        self.ensure_unlocked()?;
        check_phase_seconds("work_seconds", seconds)?;
        Ok(self.commit(Settings {
            work_seconds: seconds,
            ..self.settings
        }))
    }

    pub fn set_rest_seconds(&mut self, seconds: u32) -> Result<SettingsChange, SettingsError> {
        self.ensure_unlocked()?;
        check_phase_seconds("rest_seconds", seconds)?;
        Ok(self.commit(Settings {
            rest_seconds: seconds,
            ..self.settings
        }))
    }

    pub fn set_total_sets(&mut self, sets: u32) -> Result<SettingsChange, SettingsError> {
        self.ensure_unlocked()?;
        if sets == 0 {
            return Err(SettingsError::OutOfRange {
                field: "total_sets",
                value: sets,
                min: 1,
                max: self.settings.max_sets(),
            });
        }
        Ok(self.commit(Settings {
            total_sets: sets,
            ..self.settings
        }))
    }

    pub fn set_prep_enabled(&mut self, enabled: bool) -> Result<SettingsChange, SettingsError> {
        self.ensure_unlocked()?;
        Ok(self.commit(Settings {
            prep_enabled: enabled,
            ..self.settings
        }))
    }

    /// `ceil((remaining_sets * set_seconds + seconds_remaining) / 60)`
    pub fn estimated_minutes_remaining(&self) -> u32 {
        let total = self.settings.total_sets;
        let remaining_sets = total.saturating_sub(self.timer.current_set).min(total);
        let seconds = remaining_sets
            .saturating_mul(self.settings.set_seconds())
            .saturating_add(self.timer.seconds_remaining);
        seconds.div_ceil(60)
    }

    pub fn status(&self) -> TimerStatus {
        TimerStatus {
            phase: self.timer.phase,
            seconds_remaining: self.timer.seconds_remaining,
            current_set: self.timer.current_set,
            total_sets: self.settings.total_sets,
            progress: machine::progress(&self.timer, &self.settings),
            locked: self.is_locked(),
            running: self.timer.is_running,
            estimated_minutes_remaining: self.estimated_minutes_remaining(),
            clock: format_clock(self.timer.seconds_remaining),
            settings: self.settings,
        }
    }

    fn apply(&mut self, transition: Transition) -> Transition {
        if transition.state.phase != self.timer.phase {
            info!(
                from = %self.timer.phase,
                to = %transition.state.phase,
                set = transition.state.current_set,
                "phase transition"
            );
        }
        self.timer = transition.state;
        transition
    }

    fn ensure_unlocked(&self) -> Result<(), SettingsError> {
        if self.is_locked() {
            debug!(phase = %self.timer.phase, "settings change rejected while locked");
            return Err(SettingsError::Locked);
        }
        Ok(())
    }

    fn commit(&mut self, mut settings: Settings) -> SettingsChange {
        let clamped = settings.clamp_to_cap();
        if let Some(clamp) = clamped {
            info!(
                requested = clamp.requested,
                applied = clamp.applied,
                "total sets clamped to session cap"
            );
        }
        self.settings = settings;
        self.timer = TimerState::idle(&settings);
        SettingsChange { settings, clamped }
    }
}

fn check_phase_seconds(field: &'static str, seconds: u32) -> Result<(), SettingsError> {
    if phase_seconds_in_range(seconds) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value: seconds,
            min: MIN_PHASE_SECONDS,
            max: MAX_PHASE_SECONDS,
        })
    }
}

/// Format seconds as "MM:SS"
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
