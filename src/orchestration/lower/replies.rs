use super::Lower;
use crate::error::TowerError;
use crate::messaging::Reply;
use crate::models::{PendingKind, PsId};
use crate::orchestration::dispatcher::{Call, CallCompletion, CallOutcome};
use crate::state_machine::{PsEvent, PsState};
use tracing::{debug, error, info, warn};

impl Lower {
    pub fn on_call_completed(&mut self, completion: CallCompletion) {
        let CallCompletion {
            target,
            call,
            outcome,
        } = completion;
        debug!(target = %target, ?call, ?outcome, "<<- reply");

        match call {
            Call::PlatformAssignment { ps_id } => match outcome {
                CallOutcome::Replied(_) => self.confirm_assignment(ps_id),
                other => {
                    error!(ps_id, mc_id = %target, outcome = ?other, "Assignment not confirmed");
                    self.abort_without_confirm(ps_id, "assignment not confirmed");
                }
            },
            Call::ReadyPs { ps_id } => match outcome {
                CallOutcome::Replied(_) => info!(ps_id, plt_id = %target, "Platform preparing"),
                other => {
                    error!(ps_id, plt_id = %target, outcome = ?other, "Ready request failed");
                    self.abort_ps(ps_id, "ready request failed");
                }
            },
            Call::DroneLanded { ps_id } => self.on_landing_confirm(ps_id, target, outcome),
            Call::PsCompleted { ps_id } => self.on_completion_confirm(ps_id, target, outcome),
            Call::PsAbortToMc { ps_id } => self.on_mc_abort_confirm(ps_id, outcome),
            Call::PsAbortToPlatform { ps_id } => match outcome {
                CallOutcome::Replied(_) => info!(ps_id, plt_id = %target, "Platform confirmed abort"),
                other => warn!(ps_id, plt_id = %target, outcome = ?other, "Platform abort not confirmed"),
            },
            Call::Anomaly { ps_id } => {
                if !matches!(outcome, CallOutcome::Replied(_)) {
                    debug!(ps_id, plt_id = %target, outcome = ?outcome, "Anomaly indication not acknowledged");
                }
            }
            Call::PlatformStatus { plt_id } => match outcome {
                CallOutcome::Replied(Reply::PlatformStatus(response)) => {
                    self.on_platform_status_response(plt_id, response)
                }
                CallOutcome::Replied(other) => {
                    warn!(plt_id = %plt_id, reply = ?other, "Unexpected reply to status request")
                }
                other => warn!(plt_id = %plt_id, outcome = ?other, "Status request failed"),
            },
        }
    }

    /// Platform answered the relayed touchdown
    fn on_landing_confirm(&mut self, ps_id: PsId, plt_id: String, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Replied(_) => {
                let state = self.world.pit_stop(ps_id).map(|ps| ps.state());
                if state != Some(PsState::Landed) {
                    warn!(ps_id, ?state, "Landing confirm in unexpected state");
                    if let Some(state) = state {
                        let e = crate::state_machine::unexpected_state(&[PsState::Landed], state);
                        self.fail_pending(ps_id, PendingKind::DroneLanded, e.into());
                    }
                    self.abort_ps(ps_id, "landing confirm in unexpected state");
                    return;
                }
                self.transition(ps_id, PsEvent::LandingConfirmed);
                if !self.complete_pending(ps_id, PendingKind::DroneLanded) {
                    error!(ps_id, "No pending drone landed reply");
                    self.abort_ps(ps_id, "no pending drone landed reply");
                }
            }
            CallOutcome::Failed(e) => {
                let failure = TowerError::remote(plt_id, e);
                self.relay_failed(ps_id, PendingKind::DroneLanded, failure);
            }
            CallOutcome::TimedOut => {
                let failure = TowerError::Timeout {
                    party: Call::DroneLanded { ps_id }.party(),
                };
                self.relay_failed(ps_id, PendingKind::DroneLanded, failure);
            }
        }
    }

    fn relay_failed(&mut self, ps_id: PsId, kind: PendingKind, failure: TowerError) {
        error!(ps_id, %kind, error = %failure, "Relay failed");
        if self.fail_pending(ps_id, kind, failure) {
            self.abort_ps(ps_id, "relay failed");
        }
    }

    /// MC answered the relayed service completion
    fn on_completion_confirm(&mut self, ps_id: PsId, mc_id: String, outcome: CallOutcome) {
        match outcome {
            CallOutcome::Replied(_) => {
                let state = self.world.pit_stop(ps_id).map(|ps| ps.state());
                if state != Some(PsState::ReadyToLiftOff) {
                    warn!(ps_id, ?state, "Completion confirm in unexpected state");
                    if let Some(state) = state {
                        let e =
                            crate::state_machine::unexpected_state(&[PsState::ReadyToLiftOff], state);
                        self.fail_pending(ps_id, PendingKind::PsCompleted, e.into());
                    }
                    self.abort_ps(ps_id, "completion confirm in unexpected state");
                    return;
                }
                self.transition(ps_id, PsEvent::CompletionConfirmed);
                if !self.complete_pending(ps_id, PendingKind::PsCompleted) {
                    warn!(ps_id, "No pending PS completed reply");
                }
            }
            other => {
                let failure = match other {
                    CallOutcome::Failed(e) => TowerError::remote(mc_id, e),
                    _ => TowerError::Timeout {
                        party: Call::PsCompleted { ps_id }.party(),
                    },
                };
                error!(ps_id, error = %failure, "Completion not confirmed by MC");
                self.fail_pending(ps_id, PendingKind::PsCompleted, failure);
                self.abort_without_confirm(ps_id, "completion not confirmed");
            }
        }
    }

    /// Any answer of the MC to our abort, including silence, settles it
    fn on_mc_abort_confirm(&mut self, ps_id: PsId, outcome: CallOutcome) {
        match &outcome {
            CallOutcome::Replied(_) => info!(ps_id, "MC confirmed abort"),
            other => warn!(ps_id, outcome = ?other, "MC did not confirm abort, settling anyway"),
        }
        let settleable = self
            .world
            .pit_stop(ps_id)
            .is_some_and(|ps| matches!(ps.state(), PsState::Aborting | PsState::FailedPs));
        if settleable {
            self.settle_abort(ps_id);
        } else {
            debug!(ps_id, "Abort already settled");
        }
    }
}
