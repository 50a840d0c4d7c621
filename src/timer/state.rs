use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::SessionConfiguration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionState {
    #[default]
    Idle,
    Running {
        remaining_secs: u64,
    },
    Paused {
        remaining_secs: u64,
    },
    Completed,
}

impl SessionState {
    pub fn remaining_secs(&self) -> u64 {
        match self {
            SessionState::Running { remaining_secs } | SessionState::Paused { remaining_secs } => {
                *remaining_secs
            }
            SessionState::Idle | SessionState::Completed => 0,
        }
    }

    /// Running or paused: a session record is open.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Running { .. } | SessionState::Paused { .. })
    }

    pub fn status_text(&self) -> &'static str {
        match self {
            SessionState::Idle => "Ready to focus",
            SessionState::Running { .. } => "Focus session in progress",
            SessionState::Paused { .. } => "Session paused",
            SessionState::Completed => "Session complete!",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(SessionConfiguration),
    Tick,
    Pause,
    Resume,
    TogglePause,
    End,
    Dismiss,
}

/// Work the controller performs for a transition, in the listed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ClearSession,
    BeginRecord,
    RunStartActions,
    StartTicking,
    StopTicking,
    FinalizeRecord,
    NotifyCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: SessionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn stay(state: SessionState) -> Self {
        Self::to(state, Vec::new())
    }

    pub fn is_effect_free(&self) -> bool {
        self.effects.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("session duration must be greater than zero")]
    InvalidDuration,
    #[error("a focus session is already active")]
    AlreadyActive,
}

/// Decides the next state and the ordered side effects for `command`.
///
/// Only malformed input is an error, and an error never changes state.
pub fn transition(state: SessionState, command: &Command) -> Result<Transition, TransitionError> {
    use SessionState::*;

    let transition = match (state, command) {
        (Running { .. } | Paused { .. }, Command::Start(_)) => {
            return Err(TransitionError::AlreadyActive)
        }
        (Idle | Completed, Command::Start(config)) => {
            if config.duration_secs == 0 {
                return Err(TransitionError::InvalidDuration);
            }
            let mut effects = Vec::with_capacity(4);
            if state == Completed {
                effects.push(Effect::ClearSession);
            }
            effects.extend([Effect::BeginRecord, Effect::RunStartActions, Effect::StartTicking]);
            Transition::to(
                Running {
                    remaining_secs: config.duration_secs,
                },
                effects,
            )
        }

        (Running { remaining_secs }, Command::Tick) => match remaining_secs.saturating_sub(1) {
            0 => Transition::to(
                Completed,
                vec![
                    Effect::StopTicking,
                    Effect::FinalizeRecord,
                    Effect::NotifyCompletion,
                ],
            ),
            left => Transition::to(
                Running {
                    remaining_secs: left,
                },
                Vec::new(),
            ),
        },

        (Running { remaining_secs }, Command::Pause | Command::TogglePause) => {
            Transition::to(Paused { remaining_secs }, vec![Effect::StopTicking])
        }
        (Paused { remaining_secs }, Command::Resume | Command::TogglePause) => {
            Transition::to(Running { remaining_secs }, vec![Effect::StartTicking])
        }

        (Running { .. } | Paused { .. }, Command::End) => {
            Transition::to(Idle, vec![Effect::StopTicking, Effect::FinalizeRecord])
        }

        (Completed, Command::Dismiss) => Transition::to(Idle, vec![Effect::ClearSession]),

        (current, _) => Transition::stay(current),
    };

    Ok(transition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    fn start(secs: u64) -> Command {
        Command::Start(SessionConfiguration::countdown(secs))
    }

    fn run(mut state: SessionState, commands: &[Command]) -> SessionState {
        for command in commands {
            state = transition(state, command).unwrap().next;
        }
        state
    }

    #[test]
    fn start_from_idle_runs_full_duration() {
        let t = transition(Idle, &start(1500)).unwrap();
        assert_eq!(t.next, Running { remaining_secs: 1500 });
        assert_eq!(
            t.effects,
            vec![Effect::BeginRecord, Effect::RunStartActions, Effect::StartTicking]
        );
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert_eq!(transition(Idle, &start(0)), Err(TransitionError::InvalidDuration));
    }

    #[test]
    fn start_while_active_is_rejected() {
        for state in [Running { remaining_secs: 5 }, Paused { remaining_secs: 5 }] {
            assert_eq!(transition(state, &start(10)), Err(TransitionError::AlreadyActive));
        }
    }

    #[test]
    fn start_from_completed_clears_first() {
        let t = transition(Completed, &start(60)).unwrap();
        assert_eq!(t.next, Running { remaining_secs: 60 });
        assert_eq!(t.effects.first(), Some(&Effect::ClearSession));
    }

    #[test]
    fn ticks_count_down_without_effects() {
        for d in [2u64, 3, 10, 600] {
            for k in 0..d {
                let ticks = vec![Command::Tick; k as usize];
                let state = run(Idle, &[vec![start(d)], ticks].concat());
                assert_eq!(state, Running { remaining_secs: d - k });
            }
        }
    }

    #[test]
    fn completes_after_exactly_duration_ticks() {
        let d = 7;
        let mut state = transition(Idle, &start(d)).unwrap().next;
        for _ in 0..d - 1 {
            let t = transition(state, &Command::Tick).unwrap();
            assert!(t.is_effect_free());
            state = t.next;
        }
        let last = transition(state, &Command::Tick).unwrap();
        assert_eq!(last.next, Completed);
        assert_eq!(
            last.effects,
            vec![
                Effect::StopTicking,
                Effect::FinalizeRecord,
                Effect::NotifyCompletion
            ]
        );

        let after = transition(Completed, &Command::Tick).unwrap();
        assert_eq!(after.next, Completed);
        assert!(after.is_effect_free());
    }

    #[test]
    fn pause_resume_is_lossless() {
        for r in [1u64, 2, 59, 1500] {
            let paused = transition(Running { remaining_secs: r }, &Command::Pause).unwrap();
            assert_eq!(paused.next, Paused { remaining_secs: r });
            assert_eq!(paused.effects, vec![Effect::StopTicking]);

            let resumed = transition(paused.next, &Command::Resume).unwrap();
            assert_eq!(resumed.next, Running { remaining_secs: r });
            assert_eq!(resumed.effects, vec![Effect::StartTicking]);
        }
    }

    #[test]
    fn ticks_are_ignored_while_paused() {
        let t = transition(Paused { remaining_secs: 4 }, &Command::Tick).unwrap();
        assert_eq!(t.next, Paused { remaining_secs: 4 });
        assert!(t.is_effect_free());
    }

    #[test]
    fn toggle_flips_between_running_and_paused() {
        let state = run(Running { remaining_secs: 9 }, &[Command::TogglePause]);
        assert_eq!(state, Paused { remaining_secs: 9 });
        let state = run(state, &[Command::TogglePause]);
        assert_eq!(state, Running { remaining_secs: 9 });
        assert_eq!(run(Idle, &[Command::TogglePause]), Idle);
    }

    #[test]
    fn out_of_place_commands_are_noops() {
        let cases = [
            (Idle, Command::Pause),
            (Idle, Command::Resume),
            (Idle, Command::End),
            (Idle, Command::Dismiss),
            (Paused { remaining_secs: 3 }, Command::Pause),
            (Running { remaining_secs: 3 }, Command::Resume),
            (Running { remaining_secs: 3 }, Command::Dismiss),
            (Completed, Command::Pause),
            (Completed, Command::Resume),
            (Completed, Command::End),
        ];
        for (state, command) in cases {
            let t = transition(state, &command).unwrap();
            assert_eq!(t.next, state, "{command:?} from {state:?}");
            assert!(t.is_effect_free(), "{command:?} from {state:?}");
        }
    }

    #[test]
    fn end_finalizes_from_running_and_paused() {
        for state in [Running { remaining_secs: 8 }, Paused { remaining_secs: 8 }] {
            let t = transition(state, &Command::End).unwrap();
            assert_eq!(t.next, Idle);
            assert_eq!(t.effects, vec![Effect::StopTicking, Effect::FinalizeRecord]);
        }
    }

    #[test]
    fn dismiss_returns_completed_to_idle() {
        let t = transition(Completed, &Command::Dismiss).unwrap();
        assert_eq!(t.next, Idle);
        assert_eq!(t.effects, vec![Effect::ClearSession]);
    }

    #[test]
    fn snapshot_serializes_with_status_tag() {
        let json = serde_json::to_value(Paused { remaining_secs: 42 }).unwrap();
        assert_eq!(json["status"], "paused");
        assert_eq!(json["remainingSecs"], 42);
    }
}
