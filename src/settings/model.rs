//! Session configuration and its validation rules
//!
//! Work and rest durations are bounded per field, and the set count is
//! bounded by the 3-hour session cap.

use serde::{Deserialize, Serialize};

/// Fixed length of the PREP countdown in seconds
pub const PREP_SECONDS: u32 = 3;

/// Shortest allowed work or rest phase
pub const MIN_PHASE_SECONDS: u32 = 1;

/// Longest allowed work or rest phase (5 minutes)
pub const MAX_PHASE_SECONDS: u32 = 300;

/// Upper bound on `total_sets * (work_seconds + rest_seconds)` (3 hours)
pub const SESSION_CAP_SECONDS: u32 = 10_800;

pub const DEFAULT_WORK_SECONDS: u32 = 30;
pub const DEFAULT_REST_SECONDS: u32 = 30;
pub const DEFAULT_TOTAL_SETS: u32 = 10;
pub const DEFAULT_PREP_ENABLED: bool = true;

/// User-tunable session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Length of each WORK phase
    pub work_seconds: u32,
    /// Length of each REST phase
    pub rest_seconds: u32,
    /// Number of WORK+REST cycles in a session
    pub total_sets: u32,
    /// Whether a PREP countdown precedes every WORK phase
    pub prep_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_seconds: DEFAULT_WORK_SECONDS,
            rest_seconds: DEFAULT_REST_SECONDS,
            total_sets: DEFAULT_TOTAL_SETS,
            prep_enabled: DEFAULT_PREP_ENABLED,
        }
    }
}

/// A set count that was lowered to fit the session cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetClamp {
    pub requested: u32,
    pub applied: u32,
}

impl Settings {
    /// Seconds in one WORK+REST cycle
    pub fn set_seconds(&self) -> u32 {
        self.work_seconds + self.rest_seconds
    }

    /// Largest set count that keeps the session within the cap
    pub fn max_sets(&self) -> u32 {
        max_sets_for(self.work_seconds, self.rest_seconds)
    }

    /// Total planned session length, excluding PREP phases
    pub fn session_seconds(&self) -> u32 {
        self.total_sets.saturating_mul(self.set_seconds())
    }

    /// Lower `total_sets` to the cap if needed, reporting the adjustment
    pub fn clamp_to_cap(&mut self) -> Option<SetClamp> {
        let max = self.max_sets();
        if self.total_sets > max {
            let clamp = SetClamp {
                requested: self.total_sets,
                applied: max,
            };
            self.total_sets = max;
            Some(clamp)
        } else {
            None
        }
    }
}

/// Largest set count for the given durations, never below 1
pub fn max_sets_for(work_seconds: u32, rest_seconds: u32) -> u32 {
    let per_set = work_seconds.saturating_add(rest_seconds);
    if per_set == 0 {
        return SESSION_CAP_SECONDS;
    }
    (SESSION_CAP_SECONDS / per_set).max(1)
}

/// Whether a work/rest duration is inside the allowed range
pub fn phase_seconds_in_range(seconds: u32) -> bool {
    (MIN_PHASE_SECONDS..=MAX_PHASE_SECONDS).contains(&seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.work_seconds, 30);
        assert_eq!(settings.rest_seconds, 30);
        assert_eq!(settings.total_sets, 10);
        assert!(settings.prep_enabled);
        assert!(settings.session_seconds() <= SESSION_CAP_SECONDS);
    }

    #[test]
    fn test_max_sets() {
        assert_eq!(max_sets_for(300, 300), 18);
        assert_eq!(max_sets_for(30, 30), 180);
        assert_eq!(max_sets_for(1, 1), 5400);
    }

    #[test]
    fn test_clamp_to_cap() {
        let mut settings = Settings {
            work_seconds: 300,
            rest_seconds: 300,
            total_sets: 20,
            prep_enabled: true,
        };
        let clamp = settings.clamp_to_cap();
        assert_eq!(clamp, Some(SetClamp { requested: 20, applied: 18 }));
        assert_eq!(settings.total_sets, 18);
        assert_eq!(settings.session_seconds(), SESSION_CAP_SECONDS);

        // Already within the cap
        assert_eq!(settings.clamp_to_cap(), None);
    }

    #[test]
    fn test_phase_range() {
        assert!(!phase_seconds_in_range(0));
        assert!(phase_seconds_in_range(1));
        assert!(phase_seconds_in_range(300));
        assert!(!phase_seconds_in_range(301));
    }
}
