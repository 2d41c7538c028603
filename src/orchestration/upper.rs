//! # Upper Layer
//!
//! Decides when to replan. World changes that can alter the best assignment
//! mark the round dirty; at the end of the turn one planning round is started
//! on a blocking thread from an owned snapshot of the world. A newer round
//! supersedes any round still in flight: its result is discarded when it
//! comes back, so only the latest plan is ever applied.

use super::types::TowerEvent;
use crate::events::WorldEvent;
use crate::models::{PsId, PsLogEvent};
use crate::planning::{Plan, Planner, PlanningInput, PsSnapshot};
use crate::state_machine::PsState;
use crate::world::WorldModel;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, error, info};

/// Why a planning round was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplanReason {
    ReadyToSchedule(PsId),
    ReachabilitiesChanged(PsId),
    PlatformStatus(String),
}

impl fmt::Display for ReplanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadyToSchedule(ps_id) => write!(f, "PS {ps_id} ready to schedule"),
            Self::ReachabilitiesChanged(ps_id) => write!(f, "PS {ps_id} reachabilities changed"),
            Self::PlatformStatus(plt_id) => write!(f, "platform {plt_id} status"),
        }
    }
}

pub struct Upper {
    planner: Arc<dyn Planner>,
    mailbox: mpsc::UnboundedSender<TowerEvent>,
    planning_lead: chrono::Duration,
    generation: u64,
    in_flight: Option<(u64, AbortHandle)>,
    reasons: Vec<ReplanReason>,
}

impl fmt::Debug for Upper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upper")
            .field("planner", &self.planner.name())
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight.as_ref().map(|(g, _)| *g))
            .finish()
    }
}

impl Upper {
    pub fn new(
        planner: Arc<dyn Planner>,
        mailbox: mpsc::UnboundedSender<TowerEvent>,
        planning_lead: chrono::Duration,
    ) -> Self {
        Self {
            planner,
            mailbox,
            planning_lead,
            generation: 0,
            in_flight: None,
            reasons: Vec::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_planning(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn on_world_event(&mut self, event: &WorldEvent) {
        let reason = match event {
            WorldEvent::PitStopUpdated {
                ps_id,
                state: PsState::ReadyToSchedule,
            } => ReplanReason::ReadyToSchedule(*ps_id),
            WorldEvent::PitStopLogged {
                ps_id,
                state: PsState::InTransitToAssigned,
                entry,
            } if matches!(entry.event, PsLogEvent::ReachabilitiesUpdate(_)) => {
                ReplanReason::ReachabilitiesChanged(*ps_id)
            }
            WorldEvent::PlatformStatusUpdated { current, .. } => {
                ReplanReason::PlatformStatus(current.plt_id.clone())
            }
            _ => return,
        };
        debug!(%reason, "Replan requested");
        self.reasons.push(reason);
    }

    /// Start one round for all changes seen this turn. Returns its generation.
    pub fn flush(&mut self, world: &WorldModel, now: DateTime<Utc>) -> Option<u64> {
        if self.reasons.is_empty() {
            return None;
        }
        let reasons = std::mem::take(&mut self.reasons);

        let input = planning_input(world, now + self.planning_lead);
        if input.plannables.is_empty() {
            debug!(reasons = reasons.len(), "Nothing to plan");
            if let Some((previous, task)) = self.in_flight.take() {
                debug!(previous, "Dropping planning round");
                task.abort();
            }
            return None;
        }

        self.generation += 1;
        let generation = self.generation;
        if let Some((previous, task)) = self.in_flight.take() {
            debug!(previous, generation, "Superseding planning round");
            task.abort();
        }

        info!(
            generation,
            planner = self.planner.name(),
            plannables = input.plannables.len(),
            planned = input.planned.len(),
            first_reason = %reasons[0],
            "Planning"
        );

        let planner = Arc::clone(&self.planner);
        let mailbox = self.mailbox.clone();
        let task = tokio::spawn(async move {
            match tokio::task::spawn_blocking(move || planner.plan(&input)).await {
                Ok(plan) => {
                    let _ = mailbox.send(TowerEvent::PlanReady { generation, plan });
                }
                Err(e) => error!(generation, error = %e, "Planner failed"),
            }
        });
        self.in_flight = Some((generation, task.abort_handle()));
        Some(generation)
    }

    /// Accept a finished round unless a newer one superseded it
    pub fn accept(&mut self, generation: u64, plan: Plan) -> Option<Plan> {
        match &self.in_flight {
            Some((current, _)) if *current == generation => {
                self.in_flight = None;
                debug!(generation, assignations = plan.len(), "Plan ready");
                Some(plan)
            }
            _ => {
                debug!(generation, latest = self.generation, "Discarding superseded plan");
                None
            }
        }
    }
}

/// Owned snapshot of the world for a round starting at `t0`
pub fn planning_input(world: &WorldModel, t0: DateTime<Utc>) -> PlanningInput {
    let plannables = world
        .pit_stops()
        .filter(|ps| ps.state().is_plannable())
        .map(PsSnapshot::from)
        .collect();
    let planned = world
        .pit_stops()
        .filter(|ps| ps.state().is_planned() && ps.assignation().is_some())
        .map(PsSnapshot::from)
        .collect();
    PlanningInput {
        t0,
        plannables,
        planned,
        platforms: world.platforms().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PitStop, PlatformStatus, PsLogEntry, PsRequest, Reachability};
    use crate::planning::NullPlanner;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    fn request() -> PsRequest {
        PsRequest {
            request_id: 1,
            payload_type: "PT1".to_string(),
            end_of_drone_life: t0() + Duration::hours(1),
        }
    }

    fn upper() -> (Upper, mpsc::UnboundedReceiver<TowerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Upper::new(Arc::new(NullPlanner), tx, Duration::seconds(10)), rx)
    }

    #[test]
    fn test_triggers() {
        let (mut upper, _rx) = upper();
        upper.on_world_event(&WorldEvent::PitStopUpdated {
            ps_id: 1,
            state: PsState::Requested,
        });
        assert!(upper.reasons.is_empty());

        upper.on_world_event(&WorldEvent::PitStopUpdated {
            ps_id: 1,
            state: PsState::ReadyToSchedule,
        });
        upper.on_world_event(&WorldEvent::PitStopLogged {
            ps_id: 2,
            state: PsState::InTransitToAssigned,
            entry: PsLogEntry::new(
                t0(),
                PsLogEvent::ReachabilitiesUpdate(vec![Reachability::new("PLT1", t0(), t0())]),
            ),
        });
        upper.on_world_event(&WorldEvent::PitStopLogged {
            ps_id: 3,
            state: PsState::Requested,
            entry: PsLogEntry::new(t0(), PsLogEvent::ReachabilitiesUpdate(vec![])),
        });
        upper.on_world_event(&WorldEvent::PlatformStatusUpdated {
            old: PlatformStatus::offline("PLT1"),
            current: PlatformStatus::offline("PLT1"),
        });

        assert_eq!(
            upper.reasons,
            vec![
                ReplanReason::ReadyToSchedule(1),
                ReplanReason::ReachabilitiesChanged(2),
                ReplanReason::PlatformStatus("PLT1".to_string()),
            ]
        );
    }

    #[test]
    fn test_planning_input_partitions_pit_stops() {
        let mut world = WorldModel::new();
        world.insert_pit_stop(PitStop::builder(1, "MC1", request()).state(PsState::Requested).build());
        world.insert_pit_stop(
            PitStop::builder(2, "MC1", request())
                .state(PsState::ReadyToSchedule)
                .build(),
        );
        world.insert_pit_stop(
            PitStop::builder(3, "MC1", request())
                .state(PsState::Landed)
                .assignation(crate::models::Assignation::new("PLT1", 1, t0(), t0(), t0()))
                .build(),
        );
        world.insert_pit_stop(PitStop::builder(4, "MC1", request()).state(PsState::Aborting).build());

        let input = planning_input(&world, t0());
        let plannable: Vec<_> = input.plannables.iter().map(|s| s.id).collect();
        let planned: Vec<_> = input.planned.iter().map(|s| s.id).collect();
        assert_eq!(plannable, vec![2]);
        assert_eq!(planned, vec![3]);
    }

    #[tokio::test]
    async fn test_flush_without_plannables_starts_nothing() {
        let (mut upper, _rx) = upper();
        upper.on_world_event(&WorldEvent::PlatformStatusUpdated {
            old: PlatformStatus::offline("PLT1"),
            current: PlatformStatus::offline("PLT1"),
        });
        assert_eq!(upper.flush(&WorldModel::new(), t0()), None);
        assert!(!upper.is_planning());
    }

    #[tokio::test]
    async fn test_superseded_round_is_discarded() {
        let (mut upper, mut rx) = upper();
        let mut world = WorldModel::new();
        world.insert_pit_stop(
            PitStop::builder(2, "MC1", request())
                .state(PsState::ReadyToSchedule)
                .build(),
        );

        upper.on_world_event(&WorldEvent::PitStopUpdated {
            ps_id: 2,
            state: PsState::ReadyToSchedule,
        });
        let first = upper.flush(&world, t0()).unwrap();
        upper.on_world_event(&WorldEvent::PitStopUpdated {
            ps_id: 2,
            state: PsState::ReadyToSchedule,
        });
        let second = upper.flush(&world, t0()).unwrap();
        assert!(second > first);

        assert!(upper.accept(first, Plan::new(vec![2])).is_none());

        loop {
            match rx.recv().await {
                Some(TowerEvent::PlanReady { generation, plan }) if generation == second => {
                    assert!(upper.accept(generation, plan).is_some());
                    break;
                }
                Some(_) => continue,
                None => panic!("mailbox closed"),
            }
        }
        assert!(!upper.is_planning());
    }

    #[tokio::test]
    async fn test_round_dropped_once_nothing_is_plannable() {
        let (mut upper, _rx) = upper();
        let mut world = WorldModel::new();
        world.insert_pit_stop(
            PitStop::builder(2, "MC1", request())
                .state(PsState::ReadyToSchedule)
                .build(),
        );
        upper.on_world_event(&WorldEvent::PitStopUpdated {
            ps_id: 2,
            state: PsState::ReadyToSchedule,
        });
        let generation = upper.flush(&world, t0()).unwrap();
        assert!(upper.is_planning());

        upper.on_world_event(&WorldEvent::PlatformStatusUpdated {
            old: PlatformStatus::offline("PLT1"),
            current: PlatformStatus::offline("PLT1"),
        });
        assert_eq!(upper.flush(&WorldModel::new(), t0()), None);
        assert!(!upper.is_planning());
        assert!(upper.accept(generation, Plan::new(vec![2])).is_none());
    }
}
