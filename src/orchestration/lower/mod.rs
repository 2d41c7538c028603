//! # Lower Layer
//!
//! Executes the landing protocol for every pit stop: answers MC and platform
//! messages, drives the per pit stop state machine, arms and cancels timers,
//! and runs the abort and burial flows. It also carries out the plans
//! produced by the upper layer through [`PlanActions`].
//!
//! Handlers are split by counterpart:
//! - `mc_handlers`: requests and indications coming from mission controllers
//! - `platform_handlers`: platform indications, liveness and status reconciliation
//! - `replies`: outcomes of the calls this layer sent out

mod mc_handlers;
mod platform_handlers;
mod replies;

use super::dispatcher::{Call, Dispatcher};
use super::scheduler::{Scheduler, TimerId};
use super::types::{Inbound, Inspection, TimerAction};
use crate::config::TimingConfig;
use crate::constants::FIRST_PS_ID;
use crate::error::TowerError;
use crate::events::WorldEvent;
use crate::messaging::{
    Anomaly, AnomalyIndication, OutboundMessage, PlatformAssignmentIndication, PsAbortIndication,
    ReadyPsRequest,
};
use crate::models::{Assignation, PendingKind, PsId, PsTimer, Responder};
use crate::planning::{Plan, PlanActions, PlanUpdateSummary, PlanUpdater};
use crate::state_machine::{PsEvent, PsState};
use crate::utils::time::{from_millis, to_std};
use crate::world::WorldModel;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub struct Lower {
    world: WorldModel,
    scheduler: Scheduler,
    dispatcher: Dispatcher,
    timing: TimingConfig,
    next_ps_id: PsId,
}

impl Lower {
    pub fn new(
        world: WorldModel,
        scheduler: Scheduler,
        dispatcher: Dispatcher,
        timing: TimingConfig,
    ) -> Self {
        let next_ps_id = world
            .pit_stops()
            .map(|ps| ps.id() + 1)
            .max()
            .unwrap_or(FIRST_PS_ID)
            .max(FIRST_PS_ID);
        Self {
            world,
            scheduler,
            dispatcher,
            timing,
            next_ps_id,
        }
    }

    pub fn world(&self) -> &WorldModel {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldModel {
        &mut self.world
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.scheduler.now()
    }

    pub fn begin_turn(&mut self) {
        self.scheduler.begin_turn();
    }

    // ---- entry points ----

    pub fn on_inbound(&mut self, inbound: Inbound) {
        debug!(message = inbound.name(), "<<-");
        match inbound {
            Inbound::PsDemand {
                mc_id,
                request,
                reply,
            } => self.on_ps_demand(mc_id, request, reply),
            Inbound::PlatformReachability { indication, reply } => {
                self.on_reachability(indication, reply)
            }
            Inbound::CylinderEnter { request, reply } => self.on_cylinder_enter(request, reply),
            Inbound::DroneLanded { indication, reply } => self.on_drone_landed(indication, reply),
            Inbound::CylinderLeft { indication, reply } => self.on_cylinder_left(indication, reply),
            Inbound::McAbort { indication, reply } => self.on_mc_abort(indication, reply),
            Inbound::PsCompleted {
                plt_id,
                indication,
                reply,
            } => self.on_ps_completed(plt_id, indication, reply),
            Inbound::PlatformStatus {
                plt_id,
                indication,
                reply,
            } => self.on_platform_status_indication(plt_id, indication, reply),
        }
    }

    /// Returns false for stale fires of cancelled timers
    pub fn on_timer_fired(&mut self, timer_id: TimerId, action: TimerAction) -> bool {
        if !self.scheduler.take_fired(timer_id) {
            debug!(timer_id, ?action, "Dropping stale timer");
            return false;
        }

        match action {
            TimerAction::Bury { ps_id } => self.bury(ps_id),
            TimerAction::Ps { ps_id, timer } => {
                let current = self
                    .world
                    .pit_stop_mut(ps_id)
                    .map(|ps| ps.clear_fired_timer(timer, timer_id));
                if current != Some(true) {
                    debug!(ps_id, %timer, "Timer no longer owned by the PS");
                    return false;
                }
                match timer {
                    PsTimer::LateArrival => self.on_late_arrival(ps_id),
                    PsTimer::WaitForReady => self.on_wait_for_ready_timeout(ps_id),
                    PsTimer::LandingWait => self.on_landing_wait_timeout(ps_id),
                    PsTimer::PrepareDispatch => self.prepare_on_platform(ps_id),
                }
            }
        }
        true
    }

    /// Reconcile pit stops with a world change
    pub fn on_world_event(&mut self, event: &WorldEvent) {
        if let WorldEvent::PlatformStatusUpdated { current, .. } = event {
            self.on_platform_status_updated(current);
        }
    }

    pub fn inspect(&self, inspection: Inspection) {
        match inspection {
            Inspection::PitStop { ps_id, reply } => {
                let _ = reply.send(self.world.view(ps_id));
            }
            Inspection::PitStops { reply } => {
                let _ = reply.send(self.world.views());
            }
            Inspection::Platforms { reply } => {
                let _ = reply.send(self.world.platforms().cloned().collect());
            }
        }
    }

    pub fn apply_plan(&mut self, plan: &Plan) -> PlanUpdateSummary {
        info!(plan = %plan, "Applying plan");
        PlanUpdater::execute(plan, self)
    }

    // ---- assignment ----

    fn assign_ps(&mut self, ps_id: PsId, assignation: Assignation) {
        let Some(ps) = self.world.pit_stop(ps_id) else {
            warn!(ps_id, "Cannot assign unknown PS");
            return;
        };
        let state = ps.state();
        let engaged = ps.is_engaged();
        let mc_id = ps.mc_id().to_owned();

        if let Err(e) = ps.check_state(PsEvent::Assign.allowed_states()) {
            error!(ps_id, error = %e, "Cannot assign");
            if engaged {
                warn!(ps_id, "PS already engaged on its platform, leaving it alone");
            } else {
                self.abort_ps(ps_id, "cannot assign");
            }
            return;
        }

        if let Some(holder) = self.world.bay_holder(ps_id, &assignation) {
            let conflict = TowerError::BayConflict {
                plt_id: assignation.plt_id.clone(),
                bay_id: assignation.bay_id,
                holder,
            };
            error!(ps_id, error = %conflict, "Refusing assignation");
            return;
        }

        info!(ps_id, %assignation, "Assign");
        if state == PsState::InTransitToAssigned {
            self.cancel_ps_timers(ps_id, &[PsTimer::PrepareDispatch, PsTimer::LateArrival]);
        }

        let now = self.now();
        let indication = PlatformAssignmentIndication {
            ps_id,
            plt_id: assignation.plt_id.clone(),
            at: assignation.at,
        };
        if let Err(e) = self
            .world
            .assign(ps_id, assignation, now)
            .and_then(|_| self.world.apply(ps_id, PsEvent::Assign, now))
        {
            error!(ps_id, error = %e, "Assign failed");
            return;
        }
        self.dispatcher.send(
            mc_id,
            OutboundMessage::PlatformAssignment(indication),
            Call::PlatformAssignment { ps_id },
        );
    }

    /// MC accepted the assignation: arm the arrival timers
    fn confirm_assignment(&mut self, ps_id: PsId) {
        let Some(ps) = self.world.pit_stop(ps_id) else {
            warn!(ps_id, "Assignment confirm for unknown PS");
            return;
        };
        if let Err(e) = ps.check_state(PsEvent::AssignmentConfirmed.allowed_states()) {
            error!(ps_id, error = %e, "Unexpected assignment confirm");
            self.abort_ps(ps_id, "unexpected assignment confirm");
            return;
        }
        let Some(assignation) = ps.assignation().cloned() else {
            error!(ps_id, "Confirmed PS has no assignation");
            self.abort_ps(ps_id, "missing assignation");
            return;
        };

        let now = self.now();
        let half_margin = self.timing.half_margin();
        let max_arrival = assignation.at + half_margin;
        if max_arrival <= now {
            warn!(ps_id, at = %assignation.at, "Arrival time is in the past");
            self.abort_ps(ps_id, "arrival time is in the past");
            return;
        }

        let Some(prepare_millis) = self
            .world
            .platform(&assignation.plt_id)
            .and_then(|plt| plt.bay(assignation.bay_id))
            .map(|bay| bay.prepare_millis)
        else {
            warn!(ps_id, %assignation, "Assigned bay is gone");
            self.abort_ps(ps_id, "assigned bay is gone");
            return;
        };
        let send_at = assignation.at - half_margin - from_millis(prepare_millis);
        if send_at < now {
            warn!(ps_id, send_at = %send_at, "Too late to prepare the platform");
            self.abort_ps(ps_id, "too late to prepare the platform");
            return;
        }

        info!(ps_id, send_at = %send_at, "Scheduling ready request");
        self.cancel_ps_timers(ps_id, &[PsTimer::LateArrival, PsTimer::PrepareDispatch]);
        self.arm_ps_timer(ps_id, PsTimer::LateArrival, to_std(max_arrival - now));
        self.arm_ps_timer(ps_id, PsTimer::PrepareDispatch, to_std(send_at - now));
        self.transition(ps_id, PsEvent::AssignmentConfirmed);
    }

    /// Prepare time reached: engage the platform
    fn prepare_on_platform(&mut self, ps_id: PsId) {
        let Some(ps) = self.world.pit_stop_mut(ps_id) else {
            return;
        };
        if let Err(e) = ps.check_state(&[PsState::InTransitToAssigned]) {
            error!(ps_id, error = %e, "Cannot prepare platform");
            self.abort_ps(ps_id, "cannot prepare platform");
            return;
        }
        let Some(assignation) = ps.assignation().cloned() else {
            self.abort_ps(ps_id, "missing assignation");
            return;
        };
        ps.engage();
        info!(ps_id, plt_id = %assignation.plt_id, bay_id = assignation.bay_id, "Engaging platform");
        self.dispatcher.send(
            assignation.plt_id,
            OutboundMessage::ReadyPs(ReadyPsRequest {
                ps_id,
                bay_id: assignation.bay_id,
            }),
            Call::ReadyPs { ps_id },
        );
        self.transition(ps_id, PsEvent::EngagePlatform);
    }

    fn on_late_arrival(&mut self, ps_id: PsId) {
        warn!(ps_id, "PS late on arrival");
        self.abort_ps(ps_id, "late on arrival");
    }

    // ---- landing ----

    fn authorize_landing(&mut self, ps_id: PsId) {
        self.cancel_ps_timer(ps_id, PsTimer::WaitForReady);
        if !self.transition(ps_id, PsEvent::AuthorizeLanding) {
            return;
        }
        info!(ps_id, "Landing authorized");
        self.complete_pending(ps_id, PendingKind::CylinderEnter);
        self.arm_ps_timer(ps_id, PsTimer::LandingWait, self.timing.landing_wait());
    }

    fn on_wait_for_ready_timeout(&mut self, ps_id: PsId) {
        warn!(ps_id, "Platform not ready in time");
        self.fail_pending(ps_id, PendingKind::CylinderEnter, TowerError::PlatformNotReady);
        self.abort_ps(ps_id, "platform not ready");
    }

    fn on_landing_wait_timeout(&mut self, ps_id: PsId) {
        let now = self.now();
        if let Err(e) = self.world.mark_landing_timed_out(ps_id, now) {
            warn!(ps_id, error = %e, "Landing wait expired");
            return;
        }
        warn!(ps_id, "Drone landed indication timed out");
        self.begin_abort(ps_id, PsEvent::FailLanding, "landing not reported");
    }

    // ---- abort flows ----

    /// Abort toward both parties; the MC confirm settles the final state
    pub(crate) fn abort_ps(&mut self, ps_id: PsId, reason: &str) {
        self.begin_abort(ps_id, PsEvent::BeginAbort, reason);
    }

    fn begin_abort(&mut self, ps_id: PsId, event: PsEvent, reason: &str) {
        let Some(ps) = self.world.pit_stop(ps_id) else {
            warn!(ps_id, reason, "Cannot abort unknown PS");
            return;
        };
        if let Err(e) = ps.check_state(event.allowed_states()) {
            error!(ps_id, reason, error = %e, "Not aborting");
            return;
        }
        let state = ps.state();
        let mc_id = ps.mc_id().to_owned();
        warn!(ps_id, state = %state, reason, event = event.event_type(), "Aborting PS");

        self.cancel_ps_timers(ps_id, &PsTimer::ALL);
        self.fail_all_pending(ps_id);
        self.abort_platform_if_engaged(ps_id);
        self.signal_cylinder_busy(ps_id, state);

        if self.transition(ps_id, event) {
            self.dispatcher.send(
                mc_id,
                OutboundMessage::PsAbort(PsAbortIndication { ps_id }),
                Call::PsAbortToMc { ps_id },
            );
        }
    }

    /// Abort without telling the MC, used when the MC is the one failing
    fn abort_without_confirm(&mut self, ps_id: PsId, reason: &str) {
        let Some(ps) = self.world.pit_stop(ps_id) else {
            return;
        };
        let state = ps.state();
        if let Err(e) = ps.check_state(PsEvent::BeginAbort.allowed_states()) {
            debug!(ps_id, reason, error = %e, "Abort already under way or PS finished");
            return;
        }
        warn!(ps_id, state = %state, reason, "Aborting PS without confirm");

        self.cancel_ps_timers(ps_id, &PsTimer::ALL);
        self.fail_all_pending(ps_id);
        self.abort_platform_if_engaged(ps_id);
        self.signal_cylinder_busy(ps_id, state);
        self.settle_abort(ps_id);
    }

    /// Final step of an abort once the MC side is done
    fn settle_abort(&mut self, ps_id: PsId) {
        if self.transition(ps_id, PsEvent::AbortConfirmed)
            && self.world.pit_stop(ps_id).map(|ps| ps.state()) == Some(PsState::Aborted)
        {
            self.schedule_burying(ps_id);
        }
    }

    fn abort_platform_if_engaged(&mut self, ps_id: PsId) {
        let Some(plt_id) = self
            .world
            .pit_stop(ps_id)
            .filter(|ps| ps.is_engaged())
            .and_then(|ps| ps.plt_id().map(str::to_owned))
        else {
            return;
        };
        info!(ps_id, plt_id = %plt_id, "Aborting on platform");
        self.dispatcher.send(
            plt_id,
            OutboundMessage::PsAbort(PsAbortIndication { ps_id }),
            Call::PsAbortToPlatform { ps_id },
        );
    }

    fn signal_cylinder_busy(&mut self, ps_id: PsId, state: PsState) {
        if !state.is_cylinder_busy() {
            return;
        }
        let Some(plt_id) = self
            .world
            .pit_stop(ps_id)
            .and_then(|ps| ps.plt_id().map(str::to_owned))
        else {
            return;
        };
        warn!(ps_id, plt_id = %plt_id, "Cylinder busy");
        self.dispatcher.send(
            plt_id,
            OutboundMessage::Anomaly(AnomalyIndication {
                ps_id,
                anomalies: vec![Anomaly::CylinderBusy],
            }),
            Call::Anomaly { ps_id },
        );
    }

    // ---- burial ----

    /// Bury now, or once the bay occupation is over if the platform was engaged
    fn schedule_burying(&mut self, ps_id: PsId) {
        let Some(ps) = self.world.pit_stop(ps_id) else {
            return;
        };
        let now = self.now();
        let occupied_to = ps
            .assignation()
            .filter(|_| ps.is_engaged())
            .map(|a| a.occupied_to)
            .filter(|to| *to > now);

        match occupied_to {
            Some(to) => {
                debug!(ps_id, at = %to, "Burying once the bay is free");
                // Burying twice is harmless, so the handle is not kept
                self.scheduler
                    .set_timeout(to_std(to - now), TimerAction::Bury { ps_id });
            }
            None => self.bury(ps_id),
        }
    }

    fn bury(&mut self, ps_id: PsId) {
        self.cancel_ps_timers(ps_id, &PsTimer::ALL);
        let now = self.now();
        if !self.world.bury(ps_id, now) {
            debug!(ps_id, "PS already buried");
        }
    }

    // ---- helpers ----

    /// Apply an event; logs and returns false when it is refused
    fn transition(&mut self, ps_id: PsId, event: PsEvent) -> bool {
        let now = self.now();
        match self.world.apply(ps_id, event, now) {
            Ok(_) => true,
            Err(e) => {
                error!(ps_id, event = event.event_type(), error = %e, "Transition refused");
                false
            }
        }
    }

    fn arm_ps_timer(&mut self, ps_id: PsId, timer: PsTimer, delay: std::time::Duration) {
        let handle = self
            .scheduler
            .set_timeout(delay, TimerAction::Ps { ps_id, timer });
        match self.world.pit_stop_mut(ps_id) {
            Some(ps) => {
                if let Some(previous) = ps.set_timer(timer, handle) {
                    self.scheduler.cancel(previous);
                }
            }
            None => self.scheduler.cancel(handle),
        }
    }

    fn cancel_ps_timer(&mut self, ps_id: PsId, timer: PsTimer) {
        if let Some(handle) = self
            .world
            .pit_stop_mut(ps_id)
            .and_then(|ps| ps.take_timer(timer))
        {
            debug!(ps_id, %timer, "Cancelling timer");
            self.scheduler.cancel(handle);
        }
    }

    fn cancel_ps_timers(&mut self, ps_id: PsId, timers: &[PsTimer]) {
        for timer in timers {
            self.cancel_ps_timer(ps_id, *timer);
        }
    }

    /// Hold `reply` on the PS. On failure the caller has already been answered.
    fn register_pending(&mut self, ps_id: PsId, kind: PendingKind, reply: Responder<()>) -> bool {
        let Some(ps) = self.world.pit_stop_mut(ps_id) else {
            let _ = reply.send(Err(TowerError::unknown_pit_stop(ps_id)));
            return false;
        };
        match ps.register_pending(kind, reply) {
            Ok(()) => true,
            Err(reply) => {
                error!(ps_id, %kind, "Reply already pending");
                let _ = reply.send(Err(TowerError::ReplyAlreadyPending { ps_id, kind }));
                false
            }
        }
    }

    fn complete_pending(&mut self, ps_id: PsId, kind: PendingKind) -> bool {
        self.world
            .pit_stop_mut(ps_id)
            .is_some_and(|ps| ps.complete_pending(kind))
    }

    fn fail_pending(&mut self, ps_id: PsId, kind: PendingKind, error: TowerError) -> bool {
        self.world
            .pit_stop_mut(ps_id)
            .is_some_and(|ps| ps.fail_pending(kind, error))
    }

    fn fail_all_pending(&mut self, ps_id: PsId) {
        let Some(ps) = self.world.pit_stop_mut(ps_id) else {
            return;
        };
        for kind in ps.pending_kinds() {
            ps.fail_pending(kind, TowerError::Aborted { ps_id });
        }
    }
}

impl PlanActions for Lower {
    fn current_assignation(&self, ps_id: PsId) -> Option<Assignation> {
        self.world
            .pit_stop(ps_id)
            .and_then(|ps| ps.assignation().cloned())
    }

    fn is_live(&self, ps_id: PsId) -> bool {
        self.world.pit_stop(ps_id).is_some()
    }

    fn assign(&mut self, ps_id: PsId, assignation: Assignation) {
        self.assign_ps(ps_id, assignation);
    }

    fn abort(&mut self, ps_id: PsId) {
        self.abort_ps(ps_id, "not in plan");
    }
}
