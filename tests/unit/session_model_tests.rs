//! Unit tests for worker lifecycle states.

use farm_autopilot::models::session::{AccountSession, WorkerState};

#[test]
fn happy_path_transitions() {
    let mut session = AccountSession::new("qq".into());
    assert_eq!(session.state, WorkerState::Idle);

    for next in [
        WorkerState::Starting,
        WorkerState::Connecting,
        WorkerState::LoginPending,
        WorkerState::Running,
        WorkerState::Stopping,
        WorkerState::Stopped,
    ] {
        assert!(session.transition(next), "transition to {next:?}");
        assert_eq!(session.state, next);
    }
}

#[test]
fn idle_may_stop_directly() {
    assert!(WorkerState::Idle.can_transition_to(WorkerState::Stopped));
    assert!(!WorkerState::Idle.can_transition_to(WorkerState::Stopping));
}

#[test]
fn every_active_state_may_begin_stopping() {
    for state in [
        WorkerState::Starting,
        WorkerState::Connecting,
        WorkerState::LoginPending,
        WorkerState::Running,
    ] {
        assert!(state.can_transition_to(WorkerState::Stopping));
        assert!(state.is_running());
    }
}

#[test]
fn stopped_is_terminal() {
    for next in [
        WorkerState::Idle,
        WorkerState::Starting,
        WorkerState::Running,
        WorkerState::Stopping,
    ] {
        assert!(!WorkerState::Stopped.can_transition_to(next));
    }
    assert!(!WorkerState::Stopped.is_running());
}

#[test]
fn second_start_is_rejected() {
    let mut session = AccountSession::new("qq".into());
    assert!(session.transition(WorkerState::Starting));
    assert!(!session.transition(WorkerState::Starting));
    assert_eq!(session.state, WorkerState::Starting);
}

#[test]
fn login_cannot_skip_connecting() {
    assert!(!WorkerState::Starting.can_transition_to(WorkerState::LoginPending));
    assert!(!WorkerState::Idle.can_transition_to(WorkerState::Running));
}

#[test]
fn states_serialise_snake_case() {
    assert_eq!(
        serde_json::to_value(WorkerState::LoginPending).unwrap(),
        "login_pending"
    );
}
