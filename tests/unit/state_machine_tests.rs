//! Unit tests for the lifecycle state machine.
//!
//! Validates the transition table exhaustively: every permitted move
//! succeeds, every other move fails without changing state.

use wpdaemon::supervisor::state_machine::{LifecycleState, StateMachine};

use LifecycleState::{Idle, Running, Starting, Stopping};

const ALL_STATES: [LifecycleState; 4] = [Idle, Starting, Running, Stopping];

/// Walk a machine into the given state through valid transitions.
fn machine_in(state: LifecycleState) -> StateMachine {
    let machine = StateMachine::new();
    let path: &[LifecycleState] = match state {
        Idle => &[],
        Starting => &[Starting],
        Running => &[Starting, Running],
        Stopping => &[Starting, Running, Stopping],
    };
    for step in path {
        assert!(machine.transition_to(*step), "setup transition to {step:?}");
    }
    machine
}

#[test]
fn starts_idle() {
    assert_eq!(StateMachine::new().state(), Idle);
}

#[test]
fn permitted_moves_succeed() {
    let table = [
        (Idle, Starting),
        (Starting, Running),
        (Starting, Idle),
        (Running, Stopping),
        (Running, Idle),
        (Stopping, Idle),
    ];
    for (from, to) in table {
        let machine = machine_in(from);
        assert!(machine.transition_to(to), "{from:?} -> {to:?} must succeed");
        assert_eq!(machine.state(), to);
    }
}

#[test]
fn forbidden_moves_fail_without_state_change() {
    let permitted = |from, to| {
        matches!(
            (from, to),
            (Idle, Starting)
                | (Starting, Running | Idle)
                | (Running, Stopping | Idle)
                | (Stopping, Idle)
        )
    };

    for from in ALL_STATES {
        for to in ALL_STATES {
            if permitted(from, to) {
                continue;
            }
            let machine = machine_in(from);
            assert!(
                !machine.transition_to(to),
                "{from:?} -> {to:?} must be rejected"
            );
            assert_eq!(machine.state(), from, "state must not change on rejection");
        }
    }
}

#[test]
fn validation_helper_matches_table() {
    assert!(StateMachine::is_valid_transition(Idle, Starting));
    assert!(StateMachine::is_valid_transition(Starting, Running));
    assert!(StateMachine::is_valid_transition(Starting, Idle));
    assert!(StateMachine::is_valid_transition(Running, Stopping));
    assert!(StateMachine::is_valid_transition(Running, Idle));
    assert!(StateMachine::is_valid_transition(Stopping, Idle));

    assert!(!StateMachine::is_valid_transition(Idle, Running));
    assert!(!StateMachine::is_valid_transition(Idle, Stopping));
    assert!(!StateMachine::is_valid_transition(Stopping, Running));
    assert!(!StateMachine::is_valid_transition(Stopping, Starting));
    assert!(!StateMachine::is_valid_transition(Idle, Idle));
}

#[test]
fn concurrent_starters_admit_exactly_one() {
    use std::sync::Arc;

    let machine = Arc::new(StateMachine::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let machine = Arc::clone(&machine);
        handles.push(std::thread::spawn(move || {
            machine.transition_to(Starting)
        }));
    }

    let winners = handles
        .into_iter()
        .map(|h| h.join().expect("thread join"))
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1, "only one concurrent transition may win");
    assert_eq!(machine.state(), Starting);
}
