use super::errors::{unexpected_state, StateMachineResult};
use super::events::PsEvent;
use super::states::PsState;

/// Resolve the state reached by applying `event` in `current`.
///
/// Fails with `UnexpectedState` (carrying the event's precondition set) when
/// `current` is not one of the states the event accepts.
pub fn determine_target_state(current: PsState, event: PsEvent) -> StateMachineResult<PsState> {
    let allowed = event.allowed_states();
    if !allowed.contains(&current) {
        return Err(unexpected_state(allowed, current));
    }

    let target = match (current, event) {
        (_, PsEvent::Request) => PsState::Requested,

        (PsState::Requested, PsEvent::ReachabilitiesReceived) => PsState::ReadyToSchedule,
        (state, PsEvent::ReachabilitiesReceived) => state,

        (PsState::ReadyToSchedule | PsState::Assigned, PsEvent::Assign) => PsState::Assigned,
        (_, PsEvent::Assign) => PsState::InTransitToOldAssigned,

        (_, PsEvent::AssignmentConfirmed) => PsState::InTransitToAssigned,
        (_, PsEvent::EngagePlatform) => PsState::PlatformEngaged,
        (_, PsEvent::AwaitPlatform) => PsState::WaitingLandingPermission,
        (_, PsEvent::AuthorizeLanding) => PsState::LandingAuthorized,
        (_, PsEvent::DroneLanded) => PsState::Landed,
        (_, PsEvent::LandingConfirmed) => PsState::InProgress,
        (_, PsEvent::ServiceCompleted) => PsState::ReadyToLiftOff,
        (_, PsEvent::CompletionConfirmed) => PsState::LiftOff,

        (PsState::LiftOff, PsEvent::CylinderLeft) => PsState::Ended,
        (_, PsEvent::CylinderLeft) => PsState::Aborted,

        (_, PsEvent::McAbort) => PsState::Aborted,
        (_, PsEvent::BeginAbort) => PsState::Aborting,
        (_, PsEvent::FailLanding) => PsState::FailedPs,

        (PsState::FailedPs, PsEvent::AbortConfirmed) => PsState::ClearingCylinder,
        (_, PsEvent::AbortConfirmed) => PsState::Aborted,
    };

    Ok(target)
}
