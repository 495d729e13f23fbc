use codeflow_core::state_machine::{allowed_transitions, validate_transition};
use codeflow_core::{Phase, RunState};
use proptest::prelude::*;

fn any_state() -> impl Strategy<Value = RunState> {
    prop_oneof![
        Just(RunState::Pending),
        Just(RunState::Specify),
        Just(RunState::Plan),
        Just(RunState::Implement),
        Just(RunState::Completed),
        Just(RunState::Error),
    ]
}

#[test]
fn test_error_reachable_from_every_non_terminal_state() {
    for state in [RunState::Pending, RunState::Specify, RunState::Plan, RunState::Implement] {
        assert!(validate_transition(state, RunState::Error).is_ok(), "{state}");
    }
}

#[test]
fn test_phase_states_follow_phase_order() {
    let mut state = RunState::Pending;
    for phase in Phase::ORDER {
        assert!(validate_transition(state, RunState::from(phase)).is_ok());
        state = RunState::from(phase);
    }
    assert!(validate_transition(state, RunState::Completed).is_ok());
}

proptest! {
    #[test]
    fn prop_validation_matches_allowed_set(from in any_state(), to in any_state()) {
        let allowed = allowed_transitions(from);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed.contains(&to));
    }

    #[test]
    fn prop_terminal_states_have_no_exits(from in any_state(), to in any_state()) {
        if from.is_terminal() {
            prop_assert!(validate_transition(from, to).is_err());
        }
    }

    #[test]
    fn prop_no_transition_goes_backwards(from in any_state(), to in any_state()) {
        if validate_transition(from, to).is_ok() && to != RunState::Error {
            let rank = |s: RunState| match s {
                RunState::Pending => 0,
                RunState::Specify => 1,
                RunState::Plan => 2,
                RunState::Implement => 3,
                RunState::Completed => 4,
                RunState::Error => 5,
            };
            prop_assert_eq!(rank(to), rank(from) + 1);
        }
    }
}
