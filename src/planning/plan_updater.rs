use super::Plan;
use crate::models::{Assignation, PsId};
use tracing::debug;

/// Commands the plan updater issues against the live world
pub trait PlanActions {
    /// Current assignation of a live pit stop; `None` if unassigned or unknown
    fn current_assignation(&self, ps_id: PsId) -> Option<Assignation>;

    /// Whether the pit stop is still live
    fn is_live(&self, ps_id: PsId) -> bool;

    fn assign(&mut self, ps_id: PsId, assignation: Assignation);

    fn abort(&mut self, ps_id: PsId);
}

/// What one plan application changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanUpdateSummary {
    pub assigned: Vec<PsId>,
    pub unchanged: Vec<PsId>,
    pub aborted: Vec<PsId>,
}

/// Applies a plan by difference with the current assignments
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanUpdater;

impl PlanUpdater {
    pub fn execute<A: PlanActions + ?Sized>(plan: &Plan, actions: &mut A) -> PlanUpdateSummary {
        let mut summary = PlanUpdateSummary::default();

        for (ps_id, assignation) in plan.assignations() {
            if actions.current_assignation(ps_id).as_ref() == Some(assignation) {
                summary.unchanged.push(ps_id);
                continue;
            }
            actions.assign(ps_id, assignation.clone());
            summary.assigned.push(ps_id);
        }

        for ps_id in plan.plannables().iter().copied() {
            if !plan.contains(ps_id) && actions.is_live(ps_id) {
                actions.abort(ps_id);
                summary.aborted.push(ps_id);
            }
        }

        debug!(
            assigned = summary.assigned.len(),
            unchanged = summary.unchanged.len(),
            aborted = summary.aborted.len(),
            "Plan applied"
        );
        summary
    }
}
