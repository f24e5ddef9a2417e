//! Core phase state machine
//!
//! Pure transition functions over `TimerState`. Each transition returns
//! the next state plus the cues to play; nothing here performs I/O.

use serde::{Deserialize, Serialize};

use crate::events::Cue;
use crate::settings::{Settings, PREP_SECONDS};

/// The five phases of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not started, or reset
    Idle,
    /// Fixed countdown before WORK
    Prep,
    /// Exercise interval
    Work,
    /// Recovery interval
    Rest,
    /// All sets finished; terminal until reset
    Done,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

impl Phase {
    /// Whether a session is in progress (running or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, Phase::Prep | Phase::Work | Phase::Rest)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Prep => write!(f, "Prep"),
            Phase::Work => write!(f, "Work"),
            Phase::Rest => write!(f, "Rest"),
            Phase::Done => write!(f, "Done"),
        }
    }
}

/// Governing timer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub phase: Phase,
    pub seconds_remaining: u32,
    /// 1-indexed
    pub current_set: u32,
    pub is_running: bool,
}

impl TimerState {
    /// The reset state: idle on set 1, showing the work duration
    pub fn idle(settings: &Settings) -> Self {
        Self {
            phase: Phase::Idle,
            seconds_remaining: settings.work_seconds,
            current_set: 1,
            is_running: false,
        }
    }

    fn enter(self, phase: Phase, seconds_remaining: u32) -> Self {
        Self {
            phase,
            seconds_remaining,
            ..self
        }
    }
}

/// Result of applying one step to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: TimerState,
    pub cues: Vec<Cue>,
}

impl Transition {
    fn unchanged(state: TimerState) -> Self {
        Self {
            state,
            cues: Vec::new(),
        }
    }

    fn with_cues(state: TimerState, cues: &[Cue]) -> Self {
        Self {
            state,
            cues: cues.to_vec(),
        }
    }
}

/// Length of a phase, used for bounds and progress display
pub fn phase_total_seconds(phase: Phase, settings: &Settings) -> u32 {
    match phase {
        Phase::Prep => PREP_SECONDS,
        Phase::Work => settings.work_seconds,
        Phase::Rest => settings.rest_seconds,
        Phase::Idle | Phase::Done => settings.work_seconds,
    }
}

/// Fraction of the current phase still remaining, in `[0, 1]`
pub fn progress(state: &TimerState, settings: &Settings) -> f64 {
    let total = phase_total_seconds(state.phase, settings);
    if total == 0 {
        return 0.0;
    }
    f64::from(state.seconds_remaining.min(total)) / f64::from(total)
}

/// Begin a session from Idle, or resume a paused one
pub fn start(state: TimerState, settings: &Settings) -> Transition {
    if state.is_running {
        return Transition::unchanged(state);
    }

    match state.phase {
        Phase::Idle => {
            let state = TimerState {
                current_set: 1,
                is_running: true,
                ..state
            };
            if settings.prep_enabled {
                Transition::with_cues(state.enter(Phase::Prep, PREP_SECONDS), &[Cue::CountdownBeep])
            } else {
                Transition::with_cues(
                    state.enter(Phase::Work, settings.work_seconds),
                    &[Cue::WorkStart],
                )
            }
        }
        Phase::Prep | Phase::Work | Phase::Rest => Transition::unchanged(TimerState {
            is_running: true,
            ..state
        }),
        Phase::Done => Transition::unchanged(state),
    }
}

/// Advance one elapsed second
pub fn tick(state: TimerState, settings: &Settings) -> Transition {
    if !state.is_running || !state.phase.is_active() {
        return Transition::unchanged(state);
    }

    let remaining = state.seconds_remaining.saturating_sub(1);
    let state = TimerState {
        seconds_remaining: remaining,
        ..state
    };

    match state.phase {
        Phase::Prep if remaining == 0 => Transition::with_cues(
            state.enter(Phase::Work, settings.work_seconds),
            &[Cue::WorkStart],
        ),
        Phase::Prep if remaining <= 2 => Transition::with_cues(state, &[Cue::CountdownBeep]),
        Phase::Work if remaining == 0 => Transition::with_cues(
            state.enter(Phase::Rest, settings.rest_seconds),
            &[Cue::RestStart],
        ),
        Phase::Rest if remaining == 0 => finish_set(state, settings),
        _ => Transition::unchanged(state),
    }
}

/// Close out a REST phase: next set, or the end of the session
fn finish_set(state: TimerState, settings: &Settings) -> Transition {
    let next_set = state.current_set + 1;

    if next_set > settings.total_sets {
        let done = TimerState {
            phase: Phase::Done,
            seconds_remaining: 0,
            current_set: settings.total_sets,
            is_running: false,
        };
        return Transition::with_cues(done, &[Cue::Done]);
    }

    let state = TimerState {
        current_set: next_set,
        ..state
    };

    if settings.prep_enabled {
        Transition::with_cues(
            state.enter(Phase::Prep, PREP_SECONDS),
            &[Cue::RestStart, Cue::CountdownBeep],
        )
    } else {
        Transition::with_cues(
            state.enter(Phase::Work, settings.work_seconds),
            &[Cue::WorkStart],
        )
    }
}

/// Stop ticking without losing position
pub fn pause(state: TimerState) -> TimerState {
    TimerState {
        is_running: false,
        ..state
    }
}

/// Return to Idle from any phase
pub fn reset(settings: &Settings) -> TimerState {
    TimerState::idle(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(work: u32, rest: u32, sets: u32, prep: bool) -> Settings {
        Settings {
            work_seconds: work,
            rest_seconds: rest,
            total_sets: sets,
            prep_enabled: prep,
        }
    }

    /// Run ticks until the machine stops, recording (phase, duration) and cues
    fn run_to_end(settings: &Settings) -> (Vec<(Phase, u32)>, Vec<(u32, Cue)>) {
        let started = start(TimerState::idle(settings), settings);
        let mut state = started.state;
        let mut cues: Vec<(u32, Cue)> = started.cues.into_iter().map(|c| (0, c)).collect();
        let mut phases = vec![(state.phase, 0)];
        let mut elapsed = 0;

        while state.is_running {
            let t = tick(state, settings);
            elapsed += 1;
            cues.extend(t.cues.iter().map(|c| (elapsed, *c)));
            if let Some(last) = phases.last_mut() {
                last.1 += 1;
            }
            if t.state.phase != state.phase {
                phases.push((t.state.phase, 0));
            }
            state = t.state;
            assert!(state.seconds_remaining <= phase_total_seconds(state.phase, settings));
            assert!(state.current_set <= settings.total_sets);
        }

        (phases, cues)
    }

    #[test]
    fn test_initial_state() {
        let s = Settings::default();
        let state = TimerState::idle(&s);
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(state.seconds_remaining, 30);
        assert_eq!(state.current_set, 1);
        assert!(!state.is_running);
    }

    #[test]
    fn test_two_sets_with_prep() {
        let s = settings(30, 30, 2, true);
        let (phases, cues) = run_to_end(&s);

        assert_eq!(
            phases,
            vec![
                (Phase::Prep, 3),
                (Phase::Work, 30),
                (Phase::Rest, 30),
                (Phase::Prep, 3),
                (Phase::Work, 30),
                (Phase::Rest, 30),
                (Phase::Done, 0),
            ]
        );

        assert_eq!(
            cues,
            vec![
                (0, Cue::CountdownBeep),
                (1, Cue::CountdownBeep),
                (2, Cue::CountdownBeep),
                (3, Cue::WorkStart),
                (33, Cue::RestStart),
                (63, Cue::RestStart),
                (63, Cue::CountdownBeep),
                (64, Cue::CountdownBeep),
                (65, Cue::CountdownBeep),
                (66, Cue::WorkStart),
                (96, Cue::RestStart),
                (126, Cue::Done),
            ]
        );
    }

    #[test]
    fn test_two_sets_without_prep() {
        let s = settings(5, 2, 2, false);
        let (phases, cues) = run_to_end(&s);

        assert_eq!(
            phases,
            vec![
                (Phase::Work, 5),
                (Phase::Rest, 2),
                (Phase::Work, 5),
                (Phase::Rest, 2),
                (Phase::Done, 0),
            ]
        );
        let names: Vec<Cue> = cues.into_iter().map(|(_, c)| c).collect();
        assert_eq!(
            names,
            vec![
                Cue::WorkStart,
                Cue::RestStart,
                Cue::WorkStart,
                Cue::RestStart,
                Cue::Done,
            ]
        );
    }

    #[test]
    fn test_done_state() {
        let s = settings(1, 1, 1, false);
        let mut state = start(TimerState::idle(&s), &s).state;
        state = tick(state, &s).state; // work -> rest
        let t = tick(state, &s);

        assert_eq!(t.cues, vec![Cue::Done]);
        assert_eq!(t.state.phase, Phase::Done);
        assert_eq!(t.state.seconds_remaining, 0);
        assert_eq!(t.state.current_set, 1);
        assert!(!t.state.is_running);

        // Terminal: neither tick nor start moves it
        assert_eq!(tick(t.state, &s), Transition::unchanged(t.state));
        assert_eq!(start(t.state, &s), Transition::unchanged(t.state));
    }

    #[test]
    fn test_start_is_idempotent_while_running() {
        let s = Settings::default();
        let first = start(TimerState::idle(&s), &s);
        let second = start(first.state, &s);
        assert!(second.cues.is_empty());
        assert_eq!(second.state, first.state);
    }

    #[test]
    fn test_pause_and_resume() {
        let s = settings(10, 10, 3, false);
        let mut state = start(TimerState::idle(&s), &s).state;
        state = tick(state, &s).state;
        state = tick(state, &s).state;

        let paused = pause(state);
        assert!(!paused.is_running);
        assert_eq!(paused.phase, Phase::Work);
        assert_eq!(paused.seconds_remaining, 8);

        // Ticks while paused do nothing
        assert_eq!(tick(paused, &s).state, paused);

        let resumed = start(paused, &s);
        assert!(resumed.cues.is_empty());
        assert!(resumed.state.is_running);
        assert_eq!(resumed.state.seconds_remaining, 8);
    }

    #[test]
    fn test_reset_from_every_phase() {
        let s = settings(4, 2, 2, true);
        let mut state = start(TimerState::idle(&s), &s).state;
        let mut seen = vec![state.phase];

        while state.is_running {
            state = tick(state, &s).state;
            let r = reset(&s);
            assert_eq!(r, TimerState::idle(&s));
            seen.push(state.phase);
        }

        assert!(seen.contains(&Phase::Prep));
        assert!(seen.contains(&Phase::Work));
        assert!(seen.contains(&Phase::Rest));
        assert_eq!(state.phase, Phase::Done);
        assert_eq!(reset(&s), TimerState::idle(&s));
    }

    #[test]
    fn test_tick_in_idle_is_noop() {
        let s = Settings::default();
        let idle = TimerState::idle(&s);
        assert_eq!(tick(idle, &s), Transition::unchanged(idle));
    }

    #[test]
    fn test_progress_bounds() {
        let s = settings(10, 5, 1, false);
        let state = start(TimerState::idle(&s), &s).state;
        assert_eq!(progress(&state, &s), 1.0);

        let mut state = state;
        for _ in 0..9 {
            state = tick(state, &s).state;
        }
        assert_eq!(state.seconds_remaining, 1);
        assert!((progress(&state, &s) - 0.1).abs() < 1e-9);

        // Out-of-range remaining is clamped for display
        let oversized = TimerState {
            seconds_remaining: 99,
            ..state
        };
        assert_eq!(progress(&oversized, &s), 1.0);
    }

    #[test]
    fn test_progress_zero_total() {
        let s = settings(0, 0, 1, false);
        assert_eq!(progress(&TimerState::idle(&s), &s), 0.0);
    }

    #[test]
    fn test_phase_totals() {
        let s = settings(40, 20, 3, true);
        assert_eq!(phase_total_seconds(Phase::Prep, &s), 3);
        assert_eq!(phase_total_seconds(Phase::Work, &s), 40);
        assert_eq!(phase_total_seconds(Phase::Rest, &s), 20);
        assert_eq!(phase_total_seconds(Phase::Idle, &s), 40);
        assert_eq!(phase_total_seconds(Phase::Done, &s), 40);
    }
}
