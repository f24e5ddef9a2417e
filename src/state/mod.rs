//! State machine module for the interval timer
//!
//! Provides an explicit state machine with five phases:
//! - Idle: Not started, settings editable
//! - Prep: Fixed 3-second countdown before each work phase
//! - Work: Exercise interval
//! - Rest: Recovery interval
//! - Done: All sets complete, terminal until reset

mod machine;
mod session;

pub use machine::{Phase, Transition};
pub use session::{Session, SettingsChange, SettingsError, TimerStatus};
