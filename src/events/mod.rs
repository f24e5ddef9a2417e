//! Events module for timer transitions
//!
//! Provides the cue names consumed by the audio player and the
//! structured events broadcast to subscribed clients.

use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::state::{Phase, TimerStatus};

/// Named audio cue requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cue {
    /// A WORK phase has begun
    WorkStart,
    /// A REST phase has begun (also closes a REST before PREP)
    RestStart,
    /// One second of the PREP countdown
    CountdownBeep,
    /// The session is complete
    Done,
}

impl Cue {
    /// Wire and file name of the cue
    pub fn name(&self) -> &'static str {
        match self {
            Cue::WorkStart => "work-start",
            Cue::RestStart => "rest-start",
            Cue::CountdownBeep => "countdown-beep",
            Cue::Done => "done",
        }
    }
}

impl std::fmt::Display for Cue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Events published by the engine after each command or tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A cue should be played
    Cue { cue: Cue },

    /// The governing phase changed
    PhaseChanged {
        from: Phase,
        to: Phase,
        current_set: u32,
    },

    /// Fresh snapshot for rendering
    Status { status: TimerStatus },

    /// Configuration was changed successfully
    SettingsChanged {
        settings: Settings,
        /// Clamp advisory, if the set count was adjusted
        notice: Option<String>,
    },
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Cue { cue } => write!(f, "CUE ({})", cue),
            SessionEvent::PhaseChanged { from, to, current_set } => {
                write!(f, "PHASE_CHANGED ({} -> {}, set {})", from, to, current_set)
            }
            SessionEvent::Status { status } => {
                write!(f, "STATUS ({} {})", status.phase, status.clock)
            }
            SessionEvent::SettingsChanged { .. } => write!(f, "SETTINGS_CHANGED"),
        }
    }
}
