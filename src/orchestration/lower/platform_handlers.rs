use super::Lower;
use crate::error::TowerError;
use crate::messaging::{
    AgentCategory, OutboundMessage, PlatformStatusIndication, PlatformStatusResponse,
    PsCompletedIndication,
};
use crate::models::{Liveness, PendingKind, PlatformId, PlatformStatus, PsId, Responder};
use crate::orchestration::dispatcher::Call;
use crate::orchestration::types::LivenessChange;
use crate::state_machine::{PsEvent, PsState};
use tracing::{debug, error, info, warn};

impl Lower {
    pub(super) fn on_ps_completed(
        &mut self,
        plt_id: PlatformId,
        indication: PsCompletedIndication,
        reply: Responder<()>,
    ) {
        let ps_id = indication.ps_id;
        if !self.register_pending(ps_id, PendingKind::PsCompleted, reply) {
            return;
        }
        let Some(ps) = self.world.pit_stop(ps_id) else {
            return;
        };
        if let Err(e) = ps.check_state(PsEvent::ServiceCompleted.allowed_states()) {
            error!(ps_id, plt_id = %plt_id, error = %e, "Unexpected PS completed indication");
            self.fail_pending(ps_id, PendingKind::PsCompleted, e.into());
            self.abort_ps(ps_id, "unexpected PS completed indication");
            return;
        }

        let mc_id = ps.mc_id().to_owned();
        let assigned_plt = ps.plt_id().map(str::to_owned).unwrap_or(plt_id);
        self.transition(ps_id, PsEvent::ServiceCompleted);
        info!(ps_id, plt_id = %assigned_plt, "Service completed");
        self.dispatcher.send(
            mc_id,
            OutboundMessage::PsCompleted(PsCompletedIndication {
                ps_id,
                plt_id: assigned_plt,
            }),
            Call::PsCompleted { ps_id },
        );
    }

    pub(super) fn on_platform_status_indication(
        &mut self,
        plt_id: PlatformId,
        indication: PlatformStatusIndication,
        reply: Responder<()>,
    ) {
        let Some(current) = self.world.platform(&plt_id) else {
            warn!(plt_id = %plt_id, "Status from unknown platform");
            let _ = reply.send(Err(TowerError::UnknownPlatform { plt_id }));
            return;
        };

        let bays = indication.bays.unwrap_or_default();
        let unknown = current.unknown_bay_ids(&bays);
        if !unknown.is_empty() {
            warn!(plt_id = %plt_id, bay_ids = ?unknown, "Status with unknown bays");
            let _ = reply.send(Err(TowerError::UnknownBayIds {
                plt_id,
                bay_ids: unknown,
            }));
            return;
        }

        let merged = current.merged(&bays, indication.ready_ps_id, indication.alarms);
        self.world.update_platform(merged);
        let _ = reply.send(Ok(()));
    }

    pub fn on_liveness(&mut self, agent_id: String, category: AgentCategory, change: LivenessChange) {
        match (category, change) {
            (AgentCategory::Platform, LivenessChange::Discovered | LivenessChange::Returned) => {
                info!(plt_id = %agent_id, %change, "Platform up, requesting status");
                self.dispatcher.send(
                    agent_id.clone(),
                    OutboundMessage::PlatformStatusRequest,
                    Call::PlatformStatus { plt_id: agent_id },
                );
            }
            (AgentCategory::Platform, LivenessChange::Lost) => {
                warn!(plt_id = %agent_id, "Platform lost");
                let lost = match self.world.platform(&agent_id) {
                    Some(status) => status.lost(),
                    None => PlatformStatus::offline(agent_id).lost(),
                };
                self.world.update_platform(lost);
            }
            (AgentCategory::Mc, change) => info!(mc_id = %agent_id, %change, "MC lifecycle"),
        }
    }

    /// Full status returned by a platform we asked
    pub(super) fn on_platform_status_response(
        &mut self,
        plt_id: PlatformId,
        response: PlatformStatusResponse,
    ) {
        info!(plt_id = %plt_id, "Platform online");
        self.world.update_platform(PlatformStatus {
            plt_id,
            liveness: Liveness::Online,
            alarms: response.alarms,
            ready_ps_id: response.ready_ps_id,
            geo: response.geo,
            service_millis: response.service_millis,
            bays: response.bays.unwrap_or_default(),
        });
    }

    /// Abort pit stops the platform can no longer serve, then act on its ready PS.
    ///
    /// A cylinder-enter reply is only ever held while its PS is
    /// `WAITING_LANDING_PERMISSION`; every other state answers it on the spot.
    /// A `ready_ps_id` naming a PS in any other state is therefore only logged.
    /// It is still recorded on the platform, so a later cylinder enter from
    /// that PS is authorized immediately.
    pub(super) fn on_platform_status_updated(&mut self, current: &PlatformStatus) {
        if !current.is_available() {
            let assigned: Vec<PsId> = self
                .world
                .pit_stops()
                .filter(|ps| ps.plt_id() == Some(current.plt_id.as_str()) && !ps.is_engaged())
                .filter(|ps| PsEvent::BeginAbort.allowed_states().contains(&ps.state()))
                .map(|ps| ps.id())
                .collect();
            for ps_id in assigned {
                self.abort_ps(ps_id, "platform unavailable");
            }
            return;
        }

        self.abort_for_missing_bays(current);

        if let Some(ready_ps_id) = current.ready_ps_id {
            let waiting = self
                .world
                .pit_stop(ready_ps_id)
                .is_some_and(|ps| ps.state() == PsState::WaitingLandingPermission);
            if waiting {
                self.authorize_landing(ready_ps_id);
            } else {
                debug!(plt_id = %current.plt_id, ready_ps_id, "Ready PS not waiting for permission");
            }
        }
    }

    /// Assigned bays that lost their payload cannot serve their pit stop
    fn abort_for_missing_bays(&mut self, current: &PlatformStatus) {
        let empty_bays: Vec<_> = current
            .bays
            .iter()
            .filter(|bay| bay.payload.is_none())
            .map(|bay| bay.bay_id)
            .collect();
        if empty_bays.is_empty() {
            return;
        }

        let victims: Vec<PsId> = self
            .world
            .pit_stops()
            .filter(|ps| {
                matches!(
                    ps.state(),
                    PsState::Assigned | PsState::InTransitToAssigned
                )
            })
            .filter(|ps| {
                ps.assignation().is_some_and(|a| {
                    a.plt_id == current.plt_id && empty_bays.contains(&a.bay_id)
                })
            })
            .map(|ps| ps.id())
            .collect();
        for ps_id in victims {
            self.abort_ps(ps_id, "assigned bay has no payload");
        }
    }
}
