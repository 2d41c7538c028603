use super::Lower;
use crate::error::TowerError;
use crate::messaging::{
    DroneLandedIndication, OutboundMessage, PlatformAvailability, PlatformCylinderEnterRequest,
    PlatformCylinderLeftIndication, PlatformReachabilityIndication, PsAbortIndication,
    PsDemandRequest, PsDemandResponse,
};
use crate::models::{Liveness, McId, PendingKind, PitStop, PsRequest, PsTimer, Responder};
use crate::orchestration::dispatcher::Call;
use crate::state_machine::{PsEvent, PsState};
use crate::utils::time::to_std;
use tracing::{error, info, warn};

impl Lower {
    pub(super) fn on_ps_demand(
        &mut self,
        mc_id: McId,
        request: PsDemandRequest,
        reply: Responder<PsDemandResponse>,
    ) {
        let platforms: Vec<PlatformAvailability> = self
            .world
            .platforms()
            .filter(|plt| plt.liveness == Liveness::Online && plt.offers(&request.payload_type))
            .map(|plt| PlatformAvailability {
                plt_id: plt.plt_id.clone(),
                geo: plt.geo,
            })
            .collect();

        if platforms.is_empty() {
            warn!(mc_id = %mc_id, payload_type = %request.payload_type, "No availability");
            let _ = reply.send(Err(TowerError::no_availability(request.payload_type)));
            return;
        }

        let ps_id = self.next_ps_id;
        self.next_ps_id += 1;
        let now = self.now();
        let ps = PitStop::new(
            ps_id,
            mc_id.clone(),
            PsRequest {
                request_id: request.request_id,
                payload_type: request.payload_type.clone(),
                end_of_drone_life: request.end_of_drone_life,
            },
            now,
        );
        self.world.insert_pit_stop(ps);
        self.transition(ps_id, PsEvent::Request);

        info!(
            ps_id,
            mc_id = %mc_id,
            payload_type = %request.payload_type,
            platforms = platforms.len(),
            "PS requested"
        );
        let _ = reply.send(Ok(PsDemandResponse {
            request_id: request.request_id,
            ps_id,
            platforms,
        }));
    }

    pub(super) fn on_reachability(
        &mut self,
        indication: PlatformReachabilityIndication,
        reply: Responder<()>,
    ) {
        let ps_id = indication.ps_id;
        let Some(ps) = self.world.pit_stop(ps_id) else {
            let _ = reply.send(Err(TowerError::unknown_pit_stop(ps_id)));
            return;
        };

        if indication.reachabilities.is_empty() {
            warn!(ps_id, "No reachable platform");
            let _ = reply.send(Ok(()));
            self.abort_ps(ps_id, "no reachable platform");
            return;
        }

        if let Err(e) = ps.check_state(PsEvent::ReachabilitiesReceived.allowed_states()) {
            error!(ps_id, error = %e, "Unexpected reachability indication");
            let _ = reply.send(Err(e.into()));
            self.abort_ps(ps_id, "unexpected reachability indication");
            return;
        }

        let now = self.now();
        if let Err(e) = self
            .world
            .set_reachabilities(ps_id, indication.reachabilities, now)
        {
            let _ = reply.send(Err(e));
            return;
        }
        self.transition(ps_id, PsEvent::ReachabilitiesReceived);
        let _ = reply.send(Ok(()));
    }

    pub(super) fn on_cylinder_enter(
        &mut self,
        request: PlatformCylinderEnterRequest,
        reply: Responder<()>,
    ) {
        let ps_id = request.ps_id;
        if !self.register_pending(ps_id, PendingKind::CylinderEnter, reply) {
            return;
        }
        self.cancel_ps_timer(ps_id, PsTimer::LateArrival);

        let Some(ps) = self.world.pit_stop(ps_id) else {
            return;
        };
        if let Err(e) = ps.check_state(&[PsState::PlatformEngaged]) {
            warn!(ps_id, error = %e, "Unexpected cylinder enter");
            self.fail_pending(ps_id, PendingKind::CylinderEnter, e.into());
            self.abort_ps(ps_id, "unexpected cylinder enter");
            return;
        }

        let now = self.now();
        let in_time = ps
            .arrival_window(self.timing.half_margin())
            .is_some_and(|(min, max)| min <= now && now <= max);
        if !in_time {
            warn!(ps_id, now = %now, "PS not in time on arrival");
            self.fail_pending(ps_id, PendingKind::CylinderEnter, TowerError::NotInTime);
            self.abort_ps(ps_id, "not in time on arrival");
            return;
        }

        let platform_ready = ps
            .plt_id()
            .and_then(|plt_id| self.world.platform(plt_id))
            .is_some_and(|plt| plt.ready_ps_id == Some(ps_id));
        let engaged = ps.is_engaged();
        let max_arrival = ps
            .arrival_window(self.timing.half_margin())
            .map(|(_, max)| max)
            .unwrap_or(now);

        if platform_ready {
            self.authorize_landing(ps_id);
        } else if engaged {
            info!(ps_id, until = %max_arrival, "Waiting for platform ready");
            self.arm_ps_timer(ps_id, PsTimer::WaitForReady, to_std(max_arrival - now));
            self.transition(ps_id, PsEvent::AwaitPlatform);
        } else {
            self.fail_pending(ps_id, PendingKind::CylinderEnter, TowerError::PlatformNotReady);
            self.abort_ps(ps_id, "platform not ready");
        }
    }

    pub(super) fn on_drone_landed(&mut self, indication: DroneLandedIndication, reply: Responder<()>) {
        let ps_id = indication.ps_id;
        if !self.register_pending(ps_id, PendingKind::DroneLanded, reply) {
            return;
        }
        let Some(ps) = self.world.pit_stop(ps_id) else {
            return;
        };

        if let Err(e) = ps.check_not_state(&[PsState::FailedPs, PsState::ClearingCylinder]) {
            warn!(ps_id, error = %e, "Drone landed after the landing wait expired");
            self.fail_pending(ps_id, PendingKind::DroneLanded, e.into());
            return;
        }
        if let Err(e) = ps.check_state(PsEvent::DroneLanded.allowed_states()) {
            error!(ps_id, error = %e, "Unexpected drone landed indication");
            self.fail_pending(ps_id, PendingKind::DroneLanded, e.into());
            self.abort_ps(ps_id, "unexpected drone landed indication");
            return;
        }

        let Some(plt_id) = ps.plt_id().map(str::to_owned) else {
            self.fail_pending(ps_id, PendingKind::DroneLanded, TowerError::PlatformNotReady);
            self.abort_ps(ps_id, "landed PS has no platform");
            return;
        };
        self.cancel_ps_timer(ps_id, PsTimer::LandingWait);
        self.transition(ps_id, PsEvent::DroneLanded);
        info!(ps_id, plt_id = %plt_id, drone_id = %indication.drone_id, "Drone landed");
        self.dispatcher.send(
            plt_id.clone(),
            OutboundMessage::DroneLanded(DroneLandedIndication {
                ps_id,
                plt_id,
                drone_id: indication.drone_id,
            }),
            Call::DroneLanded { ps_id },
        );
    }

    pub(super) fn on_cylinder_left(
        &mut self,
        indication: PlatformCylinderLeftIndication,
        reply: Responder<()>,
    ) {
        let ps_id = indication.ps_id;
        let Some(ps) = self.world.pit_stop(ps_id) else {
            let _ = reply.send(Err(TowerError::unknown_pit_stop(ps_id)));
            return;
        };

        if let Err(e) = ps.check_state(PsEvent::CylinderLeft.allowed_states()) {
            error!(ps_id, error = %e, "Unexpected cylinder left indication");
            let _ = reply.send(Err(e.into()));
            self.abort_ps(ps_id, "unexpected cylinder left indication");
            return;
        }

        self.cancel_ps_timers(ps_id, &PsTimer::ALL);
        self.transition(ps_id, PsEvent::CylinderLeft);
        self.schedule_burying(ps_id);
        let _ = reply.send(Ok(()));
    }

    /// MC gave up on the pit stop; no abort is echoed back to it
    pub(super) fn on_mc_abort(&mut self, indication: PsAbortIndication, reply: Responder<()>) {
        let ps_id = indication.ps_id;
        let Some(ps) = self.world.pit_stop(ps_id) else {
            let _ = reply.send(Err(TowerError::unknown_pit_stop(ps_id)));
            return;
        };
        if let Err(e) = ps.check_state(PsEvent::McAbort.allowed_states()) {
            warn!(ps_id, error = %e, "MC abort refused");
            let _ = reply.send(Err(e.into()));
            return;
        }

        warn!(ps_id, state = %ps.state(), "Aborted by MC");
        self.cancel_ps_timers(ps_id, &PsTimer::ALL);
        self.fail_all_pending(ps_id);
        self.abort_platform_if_engaged(ps_id);
        self.transition(ps_id, PsEvent::McAbort);
        self.schedule_burying(ps_id);
        let _ = reply.send(Ok(()));
    }
}
