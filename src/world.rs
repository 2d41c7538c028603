//! # World Model
//!
//! Authoritative store of platform statuses and pit stops. Every observable
//! change is queued as a [`WorldEvent`]; the event loop drains the queue in
//! order once the current message has been handled, so observers always see
//! changes in the order they happened.
//!
//! Terminal pit stops are moved to a separate buried map once their bay time
//! has elapsed; they remain inspectable but never take part in planning or
//! conflict checks again.

use crate::error::{Result, TowerError};
use crate::events::WorldEvent;
use crate::models::{
    Assignation, PitStop, PitStopView, PlatformStatus, PsId, PsLogEntry, Reachability,
};
use crate::state_machine::{PsEvent, PsState};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

#[derive(Debug, Default)]
pub struct WorldModel {
    platforms: BTreeMap<String, PlatformStatus>,
    pit_stops: BTreeMap<PsId, PitStop>,
    buried: BTreeMap<PsId, PitStop>,
    events: VecDeque<WorldEvent>,
}

impl WorldModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- platforms ----

    pub fn platform(&self, plt_id: &str) -> Option<&PlatformStatus> {
        self.platforms.get(plt_id)
    }

    pub fn platforms(&self) -> impl Iterator<Item = &PlatformStatus> {
        self.platforms.values()
    }

    /// Store a platform status and announce the change. A platform seen for
    /// the first time is reported as coming from OFFLINE.
    pub fn update_platform(&mut self, current: PlatformStatus) {
        let old = self
            .platforms
            .insert(current.plt_id.clone(), current.clone())
            .unwrap_or_else(|| PlatformStatus::offline(current.plt_id.clone()));
        self.events
            .push_back(WorldEvent::PlatformStatusUpdated { old, current });
    }

    // ---- pit stops ----

    pub fn pit_stop(&self, ps_id: PsId) -> Option<&PitStop> {
        self.pit_stops.get(&ps_id)
    }

    pub fn pit_stop_mut(&mut self, ps_id: PsId) -> Option<&mut PitStop> {
        self.pit_stops.get_mut(&ps_id)
    }

    /// Live pit stops in id order
    pub fn pit_stops(&self) -> impl Iterator<Item = &PitStop> {
        self.pit_stops.values()
    }

    pub fn is_buried(&self, ps_id: PsId) -> bool {
        self.buried.contains_key(&ps_id)
    }

    /// Snapshot of a live or buried pit stop
    pub fn view(&self, ps_id: PsId) -> Option<PitStopView> {
        self.pit_stops
            .get(&ps_id)
            .map(|ps| ps.view(false))
            .or_else(|| self.buried.get(&ps_id).map(|ps| ps.view(true)))
    }

    /// Snapshots of all pit stops, live first
    pub fn views(&self) -> Vec<PitStopView> {
        self.pit_stops
            .values()
            .map(|ps| ps.view(false))
            .chain(self.buried.values().map(|ps| ps.view(true)))
            .collect()
    }

    /// Add a pit stop. Its existing log is not replayed.
    pub fn insert_pit_stop(&mut self, ps: PitStop) {
        let ps_id = ps.id();
        let state = ps.state();
        self.pit_stops.insert(ps_id, ps);
        self.events
            .push_back(WorldEvent::PitStopUpdated { ps_id, state });
    }

    /// Apply a protocol event to a live pit stop. Returns the resulting state.
    pub fn apply(&mut self, ps_id: PsId, event: PsEvent, now: DateTime<Utc>) -> Result<PsState> {
        let ps = self
            .pit_stops
            .get_mut(&ps_id)
            .ok_or_else(|| TowerError::unknown_pit_stop(ps_id))?;
        let entry = ps.apply(event, now)?;
        let state = ps.state();
        if let Some(entry) = entry {
            self.logged(ps_id, state, entry);
        }
        Ok(state)
    }

    pub fn set_reachabilities(
        &mut self,
        ps_id: PsId,
        reachabilities: Vec<Reachability>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ps = self
            .pit_stops
            .get_mut(&ps_id)
            .ok_or_else(|| TowerError::unknown_pit_stop(ps_id))?;
        let entry = ps.set_reachabilities(reachabilities, now);
        let state = ps.state();
        self.logged(ps_id, state, entry);
        Ok(())
    }

    pub fn assign(&mut self, ps_id: PsId, assignation: Assignation, now: DateTime<Utc>) -> Result<()> {
        let ps = self
            .pit_stops
            .get_mut(&ps_id)
            .ok_or_else(|| TowerError::unknown_pit_stop(ps_id))?;
        let entry = ps.assign(assignation, now);
        let state = ps.state();
        self.logged(ps_id, state, entry);
        Ok(())
    }

    pub fn mark_landing_timed_out(&mut self, ps_id: PsId, now: DateTime<Utc>) -> Result<()> {
        let ps = self
            .pit_stops
            .get_mut(&ps_id)
            .ok_or_else(|| TowerError::unknown_pit_stop(ps_id))?;
        let entry = ps.mark_landing_timed_out(now);
        let state = ps.state();
        self.logged(ps_id, state, entry);
        Ok(())
    }

    /// Pit stop with a frozen assignation holding the same bay over an
    /// overlapping interval. Plannable holders are ignored: the plan being
    /// applied moves them as well.
    pub fn bay_holder(&self, ps_id: PsId, assignation: &Assignation) -> Option<PsId> {
        let wanted = assignation.occupation();
        self.pit_stops
            .values()
            .filter(|other| other.id() != ps_id)
            .filter(|other| other.state().is_planned() && !other.state().is_terminal())
            .find(|other| {
                other.assignation().is_some_and(|held| {
                    held.same_bay(assignation) && held.occupation().overlaps(&wanted)
                })
            })
            .map(PitStop::id)
    }

    /// Move a pit stop out of the live set. Returns false if it was not live.
    pub fn bury(&mut self, ps_id: PsId, now: DateTime<Utc>) -> bool {
        let Some(mut ps) = self.pit_stops.remove(&ps_id) else {
            return false;
        };
        let entry = ps.mark_buried(now);
        let state = ps.state();
        self.buried.insert(ps_id, ps);
        self.logged(ps_id, state, entry);
        debug!(ps_id = ps_id, state = %state, "PS buried");
        true
    }

    // ---- change notifications ----

    pub fn pop_event(&mut self) -> Option<WorldEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.events.drain(..).collect()
    }

    fn logged(&mut self, ps_id: PsId, state: PsState, entry: PsLogEntry) {
        let state_changed = entry.new_state().is_some();
        self.events
            .push_back(WorldEvent::PitStopLogged { ps_id, state, entry });
        if state_changed {
            self.events
                .push_back(WorldEvent::PitStopUpdated { ps_id, state });
        }
    }
}
