use super::states::PsState;
use thiserror::Error;

/// Failed precondition checks on a pit stop transition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Expecting one of these states: {} but was: {actual}", format_states(.expected))]
    UnexpectedState {
        expected: Vec<PsState>,
        actual: PsState,
    },

    #[error("Expecting none of these states: {} but was: {actual}", format_states(.forbidden))]
    ForbiddenState {
        forbidden: Vec<PsState>,
        actual: PsState,
    },
}

impl StateMachineError {
    /// The state the pit stop was in when the check failed
    pub fn actual(&self) -> PsState {
        match self {
            Self::UnexpectedState { actual, .. } | Self::ForbiddenState { actual, .. } => *actual,
        }
    }
}

/// Result type for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;

/// Helper for an unexpected state failure
pub fn unexpected_state(expected: &[PsState], actual: PsState) -> StateMachineError {
    StateMachineError::UnexpectedState {
        expected: expected.to_vec(),
        actual,
    }
}

/// Helper for a forbidden state failure
pub fn forbidden_state(forbidden: &[PsState], actual: PsState) -> StateMachineError {
    StateMachineError::ForbiddenState {
        forbidden: forbidden.to_vec(),
        actual,
    }
}

fn format_states(states: &[PsState]) -> String {
    let names: Vec<&str> = states.iter().map(PsState::as_wire_str).collect();
    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_state_message() {
        let err = unexpected_state(&[PsState::LiftOff, PsState::ClearingCylinder], PsState::Landed);
        assert_eq!(
            err.to_string(),
            "Expecting one of these states: [LIFT_OFF, CLEARING_CYLINDER] but was: LANDED"
        );
        assert_eq!(err.actual(), PsState::Landed);
    }

    #[test]
    fn test_forbidden_state_message() {
        let err = forbidden_state(&[PsState::FailedPs, PsState::ClearingCylinder], PsState::FailedPs);
        assert_eq!(
            err.to_string(),
            "Expecting none of these states: [FAILED_PS, CLEARING_CYLINDER] but was: FAILED_PS"
        );
    }
}
