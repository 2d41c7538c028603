use super::states::PsState;
use serde::{Deserialize, Serialize};

use PsState::*;

/// States from which a fresh abort may start
const ABORTABLE: &[PsState] = &[
    Init,
    Requested,
    ReadyToSchedule,
    Assigned,
    InTransitToAssigned,
    InTransitToOldAssigned,
    PlatformEngaged,
    WaitingLandingPermission,
    LandingAuthorized,
    Landed,
    InProgress,
    ReadyToLiftOff,
    LiftOff,
];

/// States an abort confirmation (or its timeout) may settle
const SETTLEABLE: &[PsState] = &[
    Init,
    Requested,
    ReadyToSchedule,
    Assigned,
    InTransitToAssigned,
    InTransitToOldAssigned,
    PlatformEngaged,
    WaitingLandingPermission,
    LandingAuthorized,
    Landed,
    InProgress,
    ReadyToLiftOff,
    LiftOff,
    FailedPs,
    Aborting,
];

/// Events that can trigger pit stop state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsEvent {
    /// Demand registered
    Request,
    /// Non-empty reachability list received
    ReachabilitiesReceived,
    /// Planner chose a bay
    Assign,
    /// MC accepted the assignment
    AssignmentConfirmed,
    /// Ready request dispatched to the platform
    EngagePlatform,
    /// Drone at the cylinder before the platform staged the payload
    AwaitPlatform,
    /// Drone cleared to land
    AuthorizeLanding,
    /// MC reported touchdown
    DroneLanded,
    /// Platform acknowledged touchdown
    LandingConfirmed,
    /// Platform finished the exchange
    ServiceCompleted,
    /// MC acknowledged the completion
    CompletionConfirmed,
    /// Drone left the cylinder
    CylinderLeft,
    /// MC asked to abort
    McAbort,
    /// Tower-initiated abort, MC notification pending
    BeginAbort,
    /// Landing indication never arrived
    FailLanding,
    /// MC acknowledged (or failed to acknowledge) the abort
    AbortConfirmed,
}

impl PsEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::ReachabilitiesReceived => "reachabilities_received",
            Self::Assign => "assign",
            Self::AssignmentConfirmed => "assignment_confirmed",
            Self::EngagePlatform => "engage_platform",
            Self::AwaitPlatform => "await_platform",
            Self::AuthorizeLanding => "authorize_landing",
            Self::DroneLanded => "drone_landed",
            Self::LandingConfirmed => "landing_confirmed",
            Self::ServiceCompleted => "service_completed",
            Self::CompletionConfirmed => "completion_confirmed",
            Self::CylinderLeft => "cylinder_left",
            Self::McAbort => "mc_abort",
            Self::BeginAbort => "begin_abort",
            Self::FailLanding => "fail_landing",
            Self::AbortConfirmed => "abort_confirmed",
        }
    }

    /// Precondition states for this event
    pub fn allowed_states(&self) -> &'static [PsState] {
        match self {
            Self::Request => &[Init],
            Self::ReachabilitiesReceived => &[Requested, InTransitToAssigned],
            Self::Assign => &[
                ReadyToSchedule,
                Assigned,
                InTransitToAssigned,
                InTransitToOldAssigned,
            ],
            Self::AssignmentConfirmed => &[Assigned, InTransitToOldAssigned],
            Self::EngagePlatform => &[InTransitToAssigned],
            Self::AwaitPlatform => &[PlatformEngaged],
            Self::AuthorizeLanding => &[PlatformEngaged, WaitingLandingPermission],
            Self::DroneLanded => &[LandingAuthorized],
            Self::LandingConfirmed => &[Landed],
            Self::ServiceCompleted => &[InProgress],
            Self::CompletionConfirmed => &[ReadyToLiftOff],
            Self::CylinderLeft => &[LiftOff, ClearingCylinder],
            Self::McAbort => &[
                Requested,
                ReadyToSchedule,
                Assigned,
                InTransitToAssigned,
                InTransitToOldAssigned,
                WaitingLandingPermission,
            ],
            Self::BeginAbort | Self::FailLanding => ABORTABLE,
            Self::AbortConfirmed => SETTLEABLE,
        }
    }

    /// Check if this event belongs to the abort path
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Self::McAbort | Self::BeginAbort | Self::FailLanding | Self::AbortConfirmed
        )
    }
}
