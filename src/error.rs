use crate::config::ConfigurationError;
use crate::messaging::{AgentCategory, RemoteError};
use crate::models::{BayId, PendingKind, PlatformId, PsId};
use crate::state_machine::StateMachineError;
use thiserror::Error;

/// Errors surfaced by the tower to remote callers and to its own handlers
#[derive(Debug, Error)]
pub enum TowerError {
    #[error(transparent)]
    UnexpectedState(#[from] StateMachineError),

    #[error("No platforms with payload type: {payload_type}")]
    NoAvailability { payload_type: String },

    #[error("PS: {ps_id} not present")]
    UnknownPitStop { ps_id: PsId },

    #[error("Platform: {plt_id} not present")]
    UnknownPlatform { plt_id: PlatformId },

    #[error("Indication contains one or more unknown bay ids")]
    UnknownBayIds { plt_id: PlatformId, bay_ids: Vec<BayId> },

    #[error("There is another pending {kind} reply for PS: {ps_id}")]
    ReplyAlreadyPending { ps_id: PsId, kind: PendingKind },

    #[error("Bay {plt_id}/{bay_id} already booked by PS: {holder}")]
    BayConflict {
        plt_id: PlatformId,
        bay_id: BayId,
        holder: PsId,
    },

    #[error("PS not in time on arrival")]
    NotInTime,

    #[error("Platform is not ready")]
    PlatformNotReady,

    #[error("PS: {ps_id} aborted")]
    Aborted { ps_id: PsId },

    #[error("{party} timed out")]
    Timeout { party: AgentCategory },

    #[error("Remote error from {agent}: {source}")]
    Remote {
        agent: String,
        #[source]
        source: RemoteError,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Tower event loop is not running")]
    ChannelClosed,
}

impl TowerError {
    pub fn unknown_pit_stop(ps_id: PsId) -> Self {
        Self::UnknownPitStop { ps_id }
    }

    pub fn no_availability(payload_type: impl Into<String>) -> Self {
        Self::NoAvailability {
            payload_type: payload_type.into(),
        }
    }

    pub fn remote(agent: impl Into<String>, source: RemoteError) -> Self {
        Self::Remote {
            agent: agent.into(),
            source,
        }
    }

    /// True for precondition failures raised by the state machine
    pub fn is_unexpected_state(&self) -> bool {
        matches!(self, Self::UnexpectedState(_))
    }
}

pub type Result<T> = std::result::Result<T, TowerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{unexpected_state, PsState};

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TowerError::no_availability("PT3").to_string(),
            "No platforms with payload type: PT3"
        );
        assert_eq!(TowerError::unknown_pit_stop(9).to_string(), "PS: 9 not present");
        assert_eq!(
            TowerError::Timeout {
                party: AgentCategory::Platform
            }
            .to_string(),
            "Platform timed out"
        );
        assert_eq!(
            TowerError::Timeout {
                party: AgentCategory::Mc
            }
            .to_string(),
            "MC timed out"
        );
    }

    #[test]
    fn test_state_machine_error_is_transparent() {
        let err: TowerError = unexpected_state(&[PsState::LiftOff], PsState::Landed).into();
        assert!(err.is_unexpected_state());
        assert_eq!(
            err.to_string(),
            "Expecting one of these states: [LIFT_OFF] but was: LANDED"
        );
    }

    #[test]
    fn test_pending_conflict_message() {
        let err = TowerError::ReplyAlreadyPending {
            ps_id: 3,
            kind: PendingKind::CylinderEnter,
        };
        assert_eq!(err.to_string(), "There is another pending cylinder enter reply for PS: 3");
    }
}
