//! Session lifecycle: `Created -> Active -> {Completed, Errored}`.

use thiserror::Error;

use crate::models::SessionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Completed,
    Errored,
}

/// Something the supervisor observed about the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Spawned,
    SpawnFailed,
    /// Child exited; `None` when terminated by a signal.
    Exited(Option<i32>),
    /// Waiting on the child failed.
    ProcessError,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session transition from {from:?} on {event:?}")]
pub struct LifecycleError {
    pub from: SessionState,
    pub event: LifecycleEvent,
}

impl SessionState {
    /// Apply `event`, rejecting anything a terminal state or an unstarted
    /// child cannot accept.
    pub const fn on(self, event: LifecycleEvent) -> Result<Self, LifecycleError> {
        match (self, event) {
            (Self::Created, LifecycleEvent::Spawned) => Ok(Self::Active),
            (Self::Created, LifecycleEvent::SpawnFailed)
            | (Self::Active, LifecycleEvent::ProcessError) => Ok(Self::Errored),
            (Self::Active, LifecycleEvent::Exited(Some(0))) => Ok(Self::Completed),
            (Self::Active, LifecycleEvent::Exited(_)) => Ok(Self::Errored),
            (from, event) => Err(LifecycleError { from, event }),
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    /// Status persisted for this state.
    pub const fn status(self) -> SessionStatus {
        match self {
            Self::Created | Self::Active => SessionStatus::Active,
            Self::Completed => SessionStatus::Completed,
            Self::Errored => SessionStatus::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exit_completes() {
        let state = SessionState::Created
            .on(LifecycleEvent::Spawned)
            .and_then(|s| s.on(LifecycleEvent::Exited(Some(0))))
            .unwrap();
        assert_eq!(state, SessionState::Completed);
        assert_eq!(state.status(), SessionStatus::Completed);
        assert!(state.is_terminal());
    }

    #[test]
    fn failures_error_out() {
        let active = SessionState::Created.on(LifecycleEvent::Spawned).unwrap();
        assert_eq!(active.status(), SessionStatus::Active);
        assert!(!active.is_terminal());

        for event in [
            LifecycleEvent::Exited(Some(1)),
            LifecycleEvent::Exited(Some(-1)),
            LifecycleEvent::Exited(None),
            LifecycleEvent::ProcessError,
        ] {
            assert_eq!(active.on(event), Ok(SessionState::Errored));
        }

        assert_eq!(
            SessionState::Created.on(LifecycleEvent::SpawnFailed),
            Ok(SessionState::Errored)
        );
    }

    #[test]
    fn terminal_states_reject_further_events() {
        for state in [SessionState::Completed, SessionState::Errored] {
            let err = state.on(LifecycleEvent::Exited(Some(0))).unwrap_err();
            assert_eq!(err.from, state);
        }
        assert!(SessionState::Created
            .on(LifecycleEvent::Exited(Some(0)))
            .is_err());
        assert!(SessionState::Active.on(LifecycleEvent::Spawned).is_err());
    }
}
