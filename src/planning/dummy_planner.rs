//! # Dummy Planner
//!
//! Greedy "most urgent first, as soon as possible" assignment policy.
//!
//! Plannable pit stops are visited by ascending drone end of life. For each
//! one, every (reachability, available bay) pair yields candidate slots; the
//! pit stop takes the candidate with the earliest arrival and reserves it
//! before the next pit stop is considered.
//!
//! Occupation is tracked per platform: a platform has one cylinder, so two
//! occupations on the same platform never overlap, whatever the bay.

use super::interval::{subtract, Interval};
use super::{Plan, Planner, PlanningInput, PsSnapshot};
use crate::models::{Assignation, BayId, PayloadBay, PlatformStatus, Reachability};
use crate::utils::from_millis;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Greedy deadline-ordered planner
#[derive(Debug, Clone, Copy)]
pub struct DummyPlanner {
    half_margin: Duration,
}

impl DummyPlanner {
    pub fn new(half_margin: Duration) -> Self {
        Self { half_margin }
    }

    pub fn with_half_margin_millis(half_margin_ms: u64) -> Self {
        Self::new(from_millis(half_margin_ms))
    }

    pub fn half_margin(&self) -> Duration {
        self.half_margin
    }

    /// Candidate assignations of `ps` to `bay` on `platform` through `reachability`
    fn solutions(
        &self,
        t0: DateTime<Utc>,
        ps: &PsSnapshot,
        reachability: &Reachability,
        platform: &PlatformStatus,
        bay: &PayloadBay,
        occupied: &[Interval<DateTime<Utc>>],
    ) -> Vec<Assignation> {
        if !bay.holds(&ps.payload_type) {
            return Vec::new();
        }
        let Some(payload) = bay.payload.as_ref() else {
            return Vec::new();
        };

        let service = from_millis(platform.service_millis);
        let prepare = from_millis(bay.prepare_millis);
        let lead = self.half_margin + prepare;
        let min_length = service + self.half_margin * 2 + prepare * 2;
        let available_at = payload.available_at();

        let window = Interval::new(
            reachability.eta_min - lead,
            reachability.eta_max + service + lead,
        );

        subtract(&[window], occupied)
            .into_iter()
            .map(|slot| slot.clip_start(t0))
            .filter(|slot| !slot.is_empty())
            .filter(|slot| slot.duration() >= min_length && available_at < slot.end - min_length)
            .map(|slot| {
                let at = (slot.start + lead)
                    .max(available_at + prepare)
                    .max(reachability.eta_min);
                Assignation::new(
                    platform.plt_id.clone(),
                    bay.bay_id,
                    at,
                    at - lead,
                    at + service + lead,
                )
            })
            .collect()
    }
}

impl Planner for DummyPlanner {
    fn plan(&self, input: &PlanningInput) -> Plan {
        let mut plan = Plan::new(input.plannables.iter().map(|p| p.id).collect());

        let platforms: HashMap<&str, &PlatformStatus> = input
            .platforms
            .iter()
            .filter(|p| p.is_available())
            .map(|p| (p.plt_id.as_str(), p))
            .collect();

        let booked: HashSet<(&str, BayId)> = input
            .planned
            .iter()
            .filter_map(|p| p.assignation.as_ref())
            .map(|a| (a.plt_id.as_str(), a.bay_id))
            .collect();

        let mut availables: HashMap<&str, Vec<&PayloadBay>> = platforms
            .values()
            .map(|p| {
                let bays = p
                    .bays
                    .iter()
                    .filter(|b| b.payload.is_some())
                    .filter(|b| !booked.contains(&(p.plt_id.as_str(), b.bay_id)))
                    .collect();
                (p.plt_id.as_str(), bays)
            })
            .collect();

        let mut occupations: HashMap<String, Vec<Interval<DateTime<Utc>>>> = HashMap::new();
        for assignation in input.planned.iter().filter_map(|p| p.assignation.as_ref()) {
            occupations
                .entry(assignation.plt_id.clone())
                .or_default()
                .push(assignation.occupation());
        }

        let mut ordered: Vec<&PsSnapshot> = input.plannables.iter().collect();
        ordered.sort_by_key(|p| p.end_of_drone_life);

        for ps in ordered {
            let best = ps
                .reachabilities
                .iter()
                .flat_map(|reachability| {
                    let plt_id = reachability.plt_id.as_str();
                    let occupied = occupations.get(plt_id).map(Vec::as_slice).unwrap_or(&[]);
                    match (platforms.get(plt_id), availables.get(plt_id)) {
                        (Some(platform), Some(bays)) => bays
                            .iter()
                            .flat_map(|bay| {
                                self.solutions(input.t0, ps, reachability, platform, bay, occupied)
                            })
                            .collect::<Vec<_>>(),
                        _ => Vec::new(),
                    }
                })
                .min_by_key(|a| a.at);

            match best {
                Some(assignation) => {
                    debug!(ps_id = ps.id, assignation = %assignation, "Pit stop placed");
                    if let Some(bays) = availables.get_mut(assignation.plt_id.as_str()) {
                        bays.retain(|b| b.bay_id != assignation.bay_id);
                    }
                    occupations
                        .entry(assignation.plt_id.clone())
                        .or_default()
                        .push(assignation.occupation());
                    plan.add(ps.id, assignation);
                }
                None => debug!(ps_id = ps.id, "No feasible slot for pit stop"),
            }
        }

        plan
    }

    fn name(&self) -> &'static str {
        "dummy"
    }
}
