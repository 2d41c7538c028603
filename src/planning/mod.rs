//! # Planning
//!
//! Assignment of plannable pit stops to platform bays.
//!
//! ## Architecture
//!
//! - [`Planner`]: pure computation from owned snapshots to a [`Plan`]. It runs
//!   off the scheduling thread, so it never sees live pit stops.
//! - [`DummyPlanner`]: the bundled policy, most urgent first and as soon as
//!   possible.
//! - [`PlanUpdater`]: diffs a plan against the live assignments and issues
//!   assign/abort commands through [`PlanActions`].

pub mod dummy_planner;
pub mod interval;
pub mod plan_updater;

pub use dummy_planner::DummyPlanner;
pub use interval::{subtract, Interval};
pub use plan_updater::{PlanActions, PlanUpdateSummary, PlanUpdater};

use crate::models::{Assignation, PitStop, PlatformStatus, PsId, Reachability};
use crate::state_machine::PsState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Owned copy of the pit stop fields the planner reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsSnapshot {
    pub id: PsId,
    pub state: PsState,
    pub payload_type: String,
    pub end_of_drone_life: DateTime<Utc>,
    pub reachabilities: Vec<Reachability>,
    pub assignation: Option<Assignation>,
}

impl From<&PitStop> for PsSnapshot {
    fn from(ps: &PitStop) -> Self {
        Self {
            id: ps.id(),
            state: ps.state(),
            payload_type: ps.request().payload_type.clone(),
            end_of_drone_life: ps.request().end_of_drone_life,
            reachabilities: ps.reachabilities().to_vec(),
            assignation: ps.assignation().cloned(),
        }
    }
}

/// Everything one planning round works from
#[derive(Debug, Clone)]
pub struct PlanningInput {
    /// Earliest instant any new occupation may start
    pub t0: DateTime<Utc>,
    pub plannables: Vec<PsSnapshot>,
    /// Pit stops whose assignation is frozen
    pub planned: Vec<PsSnapshot>,
    pub platforms: Vec<PlatformStatus>,
}

/// Result of one planning round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    plannables: Vec<PsId>,
    assignations: BTreeMap<PsId, Assignation>,
}

impl Plan {
    /// Empty plan over the pit stops that were plannable when the round started
    pub fn new(plannables: Vec<PsId>) -> Self {
        Self {
            plannables,
            assignations: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, ps_id: PsId, assignation: Assignation) {
        self.assignations.insert(ps_id, assignation);
    }

    pub fn with(mut self, ps_id: PsId, assignation: Assignation) -> Self {
        self.add(ps_id, assignation);
        self
    }

    pub fn get(&self, ps_id: PsId) -> Option<&Assignation> {
        self.assignations.get(&ps_id)
    }

    pub fn contains(&self, ps_id: PsId) -> bool {
        self.assignations.contains_key(&ps_id)
    }

    pub fn plannables(&self) -> &[PsId] {
        &self.plannables
    }

    pub fn assignations(&self) -> impl Iterator<Item = (PsId, &Assignation)> {
        self.assignations.iter().map(|(id, a)| (*id, a))
    }

    pub fn len(&self) -> usize {
        self.assignations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignations.is_empty()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plan(")?;
        for (i, (ps_id, a)) in self.assignations.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "PS {ps_id} -> {a}")?;
        }
        write!(f, ")")
    }
}

/// Assignment policy. Implementations are pure and run on a blocking thread.
pub trait Planner: Send + Sync {
    fn plan(&self, input: &PlanningInput) -> Plan;

    /// Get a description of this planner for logging
    fn name(&self) -> &'static str;
}

/// Planner that never assigns anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlanner;

impl Planner for NullPlanner {
    fn plan(&self, input: &PlanningInput) -> Plan {
        Plan::new(input.plannables.iter().map(|p| p.id).collect())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}
