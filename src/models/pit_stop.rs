//! # Pit Stop
//!
//! One docking episode of a drone. The entity keeps its own protocol state,
//! the replies it still owes to remote parties, the timers armed on its
//! behalf and an append-only audit log.
//!
//! State only moves through [`PitStop::apply`], which checks the event's
//! precondition set and records a `StateUpdate` log entry. Mutators that
//! change what the rest of the system can observe return the log entry they
//! appended so the world model can publish it.

use super::assignation::{Assignation, Reachability};
use super::ps_log::{PsLogEntry, PsLogEvent};
use super::{McId, PsId};
use crate::error::{Result, TowerError};
use crate::orchestration::scheduler::{TimerHandle, TimerId};
use crate::state_machine::{
    determine_target_state, forbidden_state, unexpected_state, PsEvent, PsState,
    StateMachineResult,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// Reply channel held for a remote caller until the tower can answer
pub type Responder<T> = oneshot::Sender<Result<T>>;

/// Original PS demand as sent by the MC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsRequest {
    pub request_id: u64,
    pub payload_type: String,
    /// Instant the drone runs out of autonomy
    pub end_of_drone_life: DateTime<Utc>,
}

/// Replies a pit stop can owe, at most one of each kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    /// Owed to the MC asking to enter the cylinder
    CylinderEnter,
    /// Owed to the MC until the platform confirms the landing
    DroneLanded,
    /// Owed to the platform until the MC confirms the completion
    PsCompleted,
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CylinderEnter => write!(f, "cylinder enter"),
            Self::DroneLanded => write!(f, "drone landed"),
            Self::PsCompleted => write!(f, "PS completed"),
        }
    }
}

/// Timers armed on behalf of a pit stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsTimer {
    LateArrival,
    WaitForReady,
    LandingWait,
    PrepareDispatch,
}

impl PsTimer {
    pub const ALL: [PsTimer; 4] = [
        Self::LateArrival,
        Self::WaitForReady,
        Self::LandingWait,
        Self::PrepareDispatch,
    ];
}

impl fmt::Display for PsTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LateArrival => write!(f, "late_arrival"),
            Self::WaitForReady => write!(f, "wait_for_ready"),
            Self::LandingWait => write!(f, "landing_wait"),
            Self::PrepareDispatch => write!(f, "prepare_dispatch"),
        }
    }
}

#[derive(Debug, Default)]
struct PendingReplies {
    cylinder_enter: Option<Responder<()>>,
    drone_landed: Option<Responder<()>>,
    ps_completed: Option<Responder<()>>,
}

impl PendingReplies {
    fn slot(&mut self, kind: PendingKind) -> &mut Option<Responder<()>> {
        match kind {
            PendingKind::CylinderEnter => &mut self.cylinder_enter,
            PendingKind::DroneLanded => &mut self.drone_landed,
            PendingKind::PsCompleted => &mut self.ps_completed,
        }
    }

    fn kinds(&self) -> Vec<PendingKind> {
        let mut kinds = Vec::new();
        if self.cylinder_enter.is_some() {
            kinds.push(PendingKind::CylinderEnter);
        }
        if self.drone_landed.is_some() {
            kinds.push(PendingKind::DroneLanded);
        }
        if self.ps_completed.is_some() {
            kinds.push(PendingKind::PsCompleted);
        }
        kinds
    }
}

#[derive(Debug, Default)]
struct PsTimers {
    late_arrival: Option<TimerHandle>,
    wait_for_ready: Option<TimerHandle>,
    landing_wait: Option<TimerHandle>,
    prepare_dispatch: Option<TimerHandle>,
}

impl PsTimers {
    fn slot(&mut self, timer: PsTimer) -> &mut Option<TimerHandle> {
        match timer {
            PsTimer::LateArrival => &mut self.late_arrival,
            PsTimer::WaitForReady => &mut self.wait_for_ready,
            PsTimer::LandingWait => &mut self.landing_wait,
            PsTimer::PrepareDispatch => &mut self.prepare_dispatch,
        }
    }

    fn is_armed(&self, timer: PsTimer) -> bool {
        match timer {
            PsTimer::LateArrival => self.late_arrival.is_some(),
            PsTimer::WaitForReady => self.wait_for_ready.is_some(),
            PsTimer::LandingWait => self.landing_wait.is_some(),
            PsTimer::PrepareDispatch => self.prepare_dispatch.is_some(),
        }
    }
}

/// One docking episode
#[derive(Debug)]
pub struct PitStop {
    id: PsId,
    mc_id: McId,
    request: PsRequest,
    requested_at: DateTime<Utc>,
    state: PsState,
    reachabilities: Vec<Reachability>,
    reachabilities_updated_at: Option<DateTime<Utc>>,
    assignation: Option<Assignation>,
    engaged: bool,
    landing_indication_timed_out: bool,
    pending: PendingReplies,
    timers: PsTimers,
    log: Vec<PsLogEntry>,
}

impl PitStop {
    pub fn new(id: PsId, mc_id: impl Into<McId>, request: PsRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            mc_id: mc_id.into(),
            request,
            requested_at: now,
            state: PsState::Init,
            reachabilities: Vec::new(),
            reachabilities_updated_at: None,
            assignation: None,
            engaged: false,
            landing_indication_timed_out: false,
            pending: PendingReplies::default(),
            timers: PsTimers::default(),
            log: Vec::new(),
        }
    }

    /// Builder for restoring or seeding a pit stop in an arbitrary state
    pub fn builder(id: PsId, mc_id: impl Into<McId>, request: PsRequest) -> PitStopBuilder {
        PitStopBuilder {
            inner: Self::new(id, mc_id, request, DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    pub fn id(&self) -> PsId {
        self.id
    }

    pub fn mc_id(&self) -> &str {
        &self.mc_id
    }

    pub fn request(&self) -> &PsRequest {
        &self.request
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn state(&self) -> PsState {
        self.state
    }

    pub fn reachabilities(&self) -> &[Reachability] {
        &self.reachabilities
    }

    pub fn reachabilities_updated_at(&self) -> Option<DateTime<Utc>> {
        self.reachabilities_updated_at
    }

    pub fn assignation(&self) -> Option<&Assignation> {
        self.assignation.as_ref()
    }

    /// Platform of the current assignation
    pub fn plt_id(&self) -> Option<&str> {
        self.assignation.as_ref().map(|a| a.plt_id.as_str())
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn landing_indication_timed_out(&self) -> bool {
        self.landing_indication_timed_out
    }

    pub fn log(&self) -> &[PsLogEntry] {
        &self.log
    }

    /// Earliest and latest acceptable arrival at the assigned platform
    pub fn arrival_window(&self, half_margin: Duration) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.assignation
            .as_ref()
            .map(|a| (a.at - half_margin, a.at + half_margin))
    }

    pub fn check_state(&self, expected: &[PsState]) -> StateMachineResult<()> {
        if expected.contains(&self.state) {
            Ok(())
        } else {
            Err(unexpected_state(expected, self.state))
        }
    }

    pub fn check_not_state(&self, forbidden: &[PsState]) -> StateMachineResult<()> {
        if forbidden.contains(&self.state) {
            Err(forbidden_state(forbidden, self.state))
        } else {
            Ok(())
        }
    }

    /// Apply a protocol event. Returns the `StateUpdate` entry when the state
    /// actually changed, `None` when the event keeps the current state.
    pub fn apply(
        &mut self,
        event: PsEvent,
        now: DateTime<Utc>,
    ) -> StateMachineResult<Option<PsLogEntry>> {
        let target = determine_target_state(self.state, event)?;
        if target == self.state {
            return Ok(None);
        }
        let from = self.state;
        self.state = target;
        Ok(Some(self.append(
            now,
            PsLogEvent::StateUpdate { from, to: target },
        )))
    }

    /// Replace the whole reachability list
    pub fn set_reachabilities(
        &mut self,
        reachabilities: Vec<Reachability>,
        now: DateTime<Utc>,
    ) -> PsLogEntry {
        self.reachabilities = reachabilities.clone();
        self.reachabilities_updated_at = Some(now);
        self.append(now, PsLogEvent::ReachabilitiesUpdate(reachabilities))
    }

    pub fn assign(&mut self, assignation: Assignation, now: DateTime<Utc>) -> PsLogEntry {
        self.assignation = Some(assignation.clone());
        self.append(now, PsLogEvent::Assigned(assignation))
    }

    pub fn mark_buried(&mut self, now: DateTime<Utc>) -> PsLogEntry {
        self.append(now, PsLogEvent::Buried)
    }

    pub fn mark_landing_timed_out(&mut self, now: DateTime<Utc>) -> PsLogEntry {
        self.landing_indication_timed_out = true;
        self.append(now, PsLogEvent::DroneLandedIndicationTimedOut)
    }

    /// A ready request went out; irreversible
    pub fn engage(&mut self) {
        self.engaged = true;
    }

    /// Hold a reply until the tower can answer. Hands the responder back if
    /// another reply of the same kind is already pending.
    pub fn register_pending(
        &mut self,
        kind: PendingKind,
        responder: Responder<()>,
    ) -> std::result::Result<(), Responder<()>> {
        let slot = self.pending.slot(kind);
        if slot.is_some() {
            return Err(responder);
        }
        *slot = Some(responder);
        Ok(())
    }

    pub fn has_pending(&self, kind: PendingKind) -> bool {
        self.pending_kinds().contains(&kind)
    }

    pub fn pending_kinds(&self) -> Vec<PendingKind> {
        self.pending.kinds()
    }

    /// Answer a pending reply with success. False if nothing was pending.
    pub fn complete_pending(&mut self, kind: PendingKind) -> bool {
        match self.pending.slot(kind).take() {
            Some(responder) => {
                // The caller may have given up waiting
                let _ = responder.send(Ok(()));
                true
            }
            None => false,
        }
    }

    /// Answer a pending reply with an error. False if nothing was pending.
    pub fn fail_pending(&mut self, kind: PendingKind, error: TowerError) -> bool {
        match self.pending.slot(kind).take() {
            Some(responder) => {
                let _ = responder.send(Err(error));
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_timer(&mut self, timer: PsTimer, handle: TimerHandle) -> Option<TimerHandle> {
        self.timers.slot(timer).replace(handle)
    }

    pub(crate) fn take_timer(&mut self, timer: PsTimer) -> Option<TimerHandle> {
        self.timers.slot(timer).take()
    }

    /// Forget a timer handle only if it is the one that just fired
    pub(crate) fn clear_fired_timer(&mut self, timer: PsTimer, timer_id: TimerId) -> bool {
        let slot = self.timers.slot(timer);
        if slot.as_ref().is_some_and(|h| h.id() == timer_id) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn has_timer(&self, timer: PsTimer) -> bool {
        self.timers.is_armed(timer)
    }

    pub fn view(&self, buried: bool) -> PitStopView {
        PitStopView {
            id: self.id,
            mc_id: self.mc_id.clone(),
            request: self.request.clone(),
            requested_at: self.requested_at,
            state: self.state,
            reachabilities: self.reachabilities.clone(),
            assignation: self.assignation.clone(),
            engaged: self.engaged,
            landing_indication_timed_out: self.landing_indication_timed_out,
            pending: self.pending.kinds(),
            log: self.log.clone(),
            buried,
        }
    }

    fn append(&mut self, at: DateTime<Utc>, event: PsLogEvent) -> PsLogEntry {
        let entry = PsLogEntry::new(at, event);
        self.log.push(entry.clone());
        entry
    }
}

/// Builder for pit stops restored from outside the protocol flow
#[derive(Debug)]
pub struct PitStopBuilder {
    inner: PitStop,
}

impl PitStopBuilder {
    pub fn requested_at(mut self, at: DateTime<Utc>) -> Self {
        self.inner.requested_at = at;
        self
    }

    pub fn state(mut self, state: PsState) -> Self {
        self.inner.state = state;
        self
    }

    pub fn reachabilities(mut self, reachabilities: Vec<Reachability>, at: DateTime<Utc>) -> Self {
        self.inner.reachabilities = reachabilities;
        self.inner.reachabilities_updated_at = Some(at);
        self
    }

    pub fn assignation(mut self, assignation: Assignation) -> Self {
        self.inner.assignation = Some(assignation);
        self
    }

    pub fn engaged(mut self, engaged: bool) -> Self {
        self.inner.engaged = engaged;
        self
    }

    pub fn build(self) -> PitStop {
        self.inner
    }
}

/// Read-only copy of a pit stop for inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitStopView {
    pub id: PsId,
    pub mc_id: McId,
    pub request: PsRequest,
    pub requested_at: DateTime<Utc>,
    pub state: PsState,
    pub reachabilities: Vec<Reachability>,
    pub assignation: Option<Assignation>,
    pub engaged: bool,
    pub landing_indication_timed_out: bool,
    pub pending: Vec<PendingKind>,
    pub log: Vec<PsLogEntry>,
    pub buried: bool,
}

impl PitStopView {
    /// States the pit stop went through, in order
    pub fn state_history(&self) -> Vec<PsState> {
        self.log.iter().filter_map(PsLogEntry::new_state).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::StateMachineError;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    fn request() -> PsRequest {
        PsRequest {
            request_id: 12,
            payload_type: "PT1".to_string(),
            end_of_drone_life: t0() + Duration::minutes(20),
        }
    }

    #[test]
    fn test_apply_logs_state_updates() {
        let mut ps = PitStop::new(1, "MC1", request(), t0());
        let entry = ps.apply(PsEvent::Request, t0()).unwrap().unwrap();

        assert_eq!(ps.state(), PsState::Requested);
        assert_eq!(
            entry.event,
            PsLogEvent::StateUpdate {
                from: PsState::Init,
                to: PsState::Requested
            }
        );
        assert_eq!(ps.log().len(), 1);
    }

    #[test]
    fn test_apply_rejects_unexpected_state() {
        let mut ps = PitStop::new(1, "MC1", request(), t0());
        let err = ps.apply(PsEvent::DroneLanded, t0()).unwrap_err();
        assert!(matches!(err, StateMachineError::UnexpectedState { actual: PsState::Init, .. }));
        assert_eq!(ps.state(), PsState::Init);
        assert!(ps.log().is_empty());
    }

    #[test]
    fn test_same_state_transition_is_not_logged() {
        let mut ps = PitStop::builder(1, "MC1", request())
            .state(PsState::InTransitToAssigned)
            .build();
        assert!(ps
            .apply(PsEvent::ReachabilitiesReceived, t0())
            .unwrap()
            .is_none());
        assert!(ps.log().is_empty());
    }

    #[test]
    fn test_only_one_pending_reply_per_kind() {
        let mut ps = PitStop::new(1, "MC1", request(), t0());
        let (first, mut first_rx) = oneshot::channel();
        let (second, _second_rx) = oneshot::channel();

        assert!(ps.register_pending(PendingKind::DroneLanded, first).is_ok());
        assert!(ps.register_pending(PendingKind::DroneLanded, second).is_err());
        assert!(ps.has_pending(PendingKind::DroneLanded));
        assert!(!ps.has_pending(PendingKind::CylinderEnter));

        assert!(ps.complete_pending(PendingKind::DroneLanded));
        assert!(!ps.complete_pending(PendingKind::DroneLanded));
        assert!(matches!(first_rx.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn test_fail_pending_delivers_error() {
        let mut ps = PitStop::new(1, "MC1", request(), t0());
        let (tx, mut rx) = oneshot::channel();
        ps.register_pending(PendingKind::CylinderEnter, tx).unwrap();

        assert!(ps.fail_pending(PendingKind::CylinderEnter, TowerError::PlatformNotReady));
        assert!(matches!(rx.try_recv(), Ok(Err(TowerError::PlatformNotReady))));
        assert!(!ps.fail_pending(PendingKind::CylinderEnter, TowerError::PlatformNotReady));
    }

    #[test]
    fn test_reachabilities_replace_previous() {
        let mut ps = PitStop::new(1, "MC1", request(), t0());
        let first = Reachability::new("PLT1", t0(), t0() + Duration::minutes(5));
        let second = Reachability::new("PLT2", t0(), t0() + Duration::minutes(8));

        ps.set_reachabilities(vec![first], t0());
        ps.set_reachabilities(vec![second.clone()], t0() + Duration::seconds(1));

        assert_eq!(ps.reachabilities(), &[second]);
        assert_eq!(ps.reachabilities_updated_at(), Some(t0() + Duration::seconds(1)));
    }

    #[test]
    fn test_arrival_window() {
        let at = t0() + Duration::minutes(4);
        let ps = PitStop::builder(1, "MC1", request())
            .assignation(Assignation::new("PLT1", 1, at, at, at))
            .build();
        let (min, max) = ps.arrival_window(Duration::seconds(30)).unwrap();
        assert_eq!(min, at - Duration::seconds(30));
        assert_eq!(max, at + Duration::seconds(30));
    }

    #[test]
    fn test_view_tracks_history() {
        let mut ps = PitStop::new(3, "MC1", request(), t0());
        ps.apply(PsEvent::Request, t0()).unwrap();
        ps.set_reachabilities(
            vec![Reachability::new("PLT1", t0(), t0())],
            t0(),
        );
        ps.apply(PsEvent::ReachabilitiesReceived, t0()).unwrap();

        let view = ps.view(false);
        assert_eq!(
            view.state_history(),
            vec![PsState::Requested, PsState::ReadyToSchedule]
        );
        assert_eq!(view.log.len(), 3);
    }
}
