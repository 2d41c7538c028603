use serde::{Deserialize, Serialize};
use std::fmt;

/// Pit stop protocol states, from the demand request to burial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsState {
    /// Entity created, request not yet registered
    Init,
    /// Demand accepted, waiting for the MC's reachability estimates
    Requested,
    /// Reachabilities known, waiting for a planning round
    ReadyToSchedule,
    /// Bay assigned, assignment indication sent to the MC
    Assigned,
    /// MC confirmed the assignment and is travelling to it
    InTransitToAssigned,
    /// Reassigned while already travelling to a previous assignment
    InTransitToOldAssigned,
    /// Ready request sent to the platform
    PlatformEngaged,
    /// Drone at the cylinder, platform still staging the payload
    WaitingLandingPermission,
    /// Drone cleared to land
    LandingAuthorized,
    /// Drone landed, platform notified
    Landed,
    /// Payload exchange running on the platform
    InProgress,
    /// Platform done, completion relayed to the MC
    ReadyToLiftOff,
    /// MC confirmed completion, drone leaving
    LiftOff,
    /// Failed pit stop waiting for the drone to leave the cylinder
    ClearingCylinder,
    /// Landing was never reported; the cylinder may be occupied
    FailedPs,
    /// Abort indication in flight toward the MC
    Aborting,
    /// Aborted
    Aborted,
    /// Completed
    Ended,
}

impl PsState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted | Self::Ended)
    }

    /// Terminal, or on the way to it through the abort path
    pub fn is_finishing(&self) -> bool {
        matches!(self, Self::Aborting | Self::Aborted | Self::Ended)
    }

    /// A drone may physically occupy the cylinder in these states
    pub fn is_cylinder_busy(&self) -> bool {
        matches!(
            self,
            Self::Landed
                | Self::InProgress
                | Self::ReadyToLiftOff
                | Self::LiftOff
                | Self::FailedPs
                | Self::ClearingCylinder
        )
    }

    /// States the planner may (re)assign
    pub fn is_plannable(&self) -> bool {
        matches!(
            self,
            Self::ReadyToSchedule
                | Self::Assigned
                | Self::InTransitToAssigned
                | Self::InTransitToOldAssigned
        )
    }

    /// States whose assignation is frozen and must be honored by planning
    pub fn is_planned(&self) -> bool {
        !matches!(self, Self::Init | Self::Requested) && !self.is_plannable()
    }

    /// Upper-case protocol name, as exchanged on the wire
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Requested => "REQUESTED",
            Self::ReadyToSchedule => "READY_TO_SCHEDULE",
            Self::Assigned => "ASSIGNED",
            Self::InTransitToAssigned => "IN_TRANSIT_TO_ASSIGNED",
            Self::InTransitToOldAssigned => "IN_TRANSIT_TO_OLD_ASSIGNED",
            Self::PlatformEngaged => "PLATFORM_ENGAGED",
            Self::WaitingLandingPermission => "WAITING_LANDING_PERMISSION",
            Self::LandingAuthorized => "LANDING_AUTHORIZED",
            Self::Landed => "LANDED",
            Self::InProgress => "IN_PROGRESS",
            Self::ReadyToLiftOff => "READY_TO_LIFT_OFF",
            Self::LiftOff => "LIFT_OFF",
            Self::ClearingCylinder => "CLEARING_CYLINDER",
            Self::FailedPs => "FAILED_PS",
            Self::Aborting => "ABORTING",
            Self::Aborted => "ABORTED",
            Self::Ended => "ENDED",
        }
    }

    pub const ALL: [PsState; 18] = [
        Self::Init,
        Self::Requested,
        Self::ReadyToSchedule,
        Self::Assigned,
        Self::InTransitToAssigned,
        Self::InTransitToOldAssigned,
        Self::PlatformEngaged,
        Self::WaitingLandingPermission,
        Self::LandingAuthorized,
        Self::Landed,
        Self::InProgress,
        Self::ReadyToLiftOff,
        Self::LiftOff,
        Self::ClearingCylinder,
        Self::FailedPs,
        Self::Aborting,
        Self::Aborted,
        Self::Ended,
    ];
}

impl fmt::Display for PsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl std::str::FromStr for PsState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|state| state.as_wire_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Invalid pit stop state: {s}"))
    }
}

/// Default state for new pit stops
impl Default for PsState {
    fn default() -> Self {
        Self::Init
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ps_state_terminal_check() {
        assert!(PsState::Aborted.is_terminal());
        assert!(PsState::Ended.is_terminal());
        assert!(!PsState::Aborting.is_terminal());
        assert!(PsState::Aborting.is_finishing());
        assert!(!PsState::FailedPs.is_finishing());
    }

    #[test]
    fn test_cylinder_busy_states() {
        let busy: Vec<_> = PsState::ALL
            .iter()
            .filter(|s| s.is_cylinder_busy())
            .collect();
        assert_eq!(busy.len(), 6);
        assert!(!PsState::LandingAuthorized.is_cylinder_busy());
        assert!(PsState::ClearingCylinder.is_cylinder_busy());
    }

    #[test]
    fn test_plannable_and_planned_are_disjoint() {
        for state in PsState::ALL {
            assert!(!(state.is_plannable() && state.is_planned()), "{state}");
        }
        assert!(!PsState::Requested.is_planned());
        assert!(PsState::PlatformEngaged.is_planned());
        assert!(PsState::Aborted.is_planned());
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in PsState::ALL {
            let parsed: PsState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert_eq!(
            "in_transit_to_assigned".parse::<PsState>().unwrap(),
            PsState::InTransitToAssigned
        );
        assert!("bogus".parse::<PsState>().is_err());
    }

    #[test]
    fn test_state_serde_uses_snake_case() {
        let json = serde_json::to_string(&PsState::WaitingLandingPermission).unwrap();
        assert_eq!(json, "\"waiting_landing_permission\"");
    }

    #[test]
    fn test_default_state() {
        assert_eq!(PsState::default(), PsState::Init);
    }
}
