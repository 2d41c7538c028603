use super::{BayId, PlatformId};
use crate::planning::interval::Interval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binding of a pit stop to a platform bay for a time window
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignation {
    pub plt_id: PlatformId,
    pub bay_id: BayId,
    /// Planned arrival of the drone at the platform
    pub at: DateTime<Utc>,
    pub occupied_from: DateTime<Utc>,
    pub occupied_to: DateTime<Utc>,
}

impl Assignation {
    pub fn new(
        plt_id: impl Into<PlatformId>,
        bay_id: BayId,
        at: DateTime<Utc>,
        occupied_from: DateTime<Utc>,
        occupied_to: DateTime<Utc>,
    ) -> Self {
        Self {
            plt_id: plt_id.into(),
            bay_id,
            at,
            occupied_from,
            occupied_to,
        }
    }

    /// Reserved interval on the platform
    pub fn occupation(&self) -> Interval<DateTime<Utc>> {
        Interval::new(self.occupied_from, self.occupied_to)
    }

    pub fn same_bay(&self, other: &Assignation) -> bool {
        self.plt_id == other.plt_id && self.bay_id == other.bay_id
    }
}

impl fmt::Display for Assignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} at {} occupying [{}, {}]",
            self.plt_id,
            self.bay_id,
            self.at.to_rfc3339(),
            self.occupied_from.to_rfc3339(),
            self.occupied_to.to_rfc3339()
        )
    }
}

/// ETA window of a drone toward one platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reachability {
    pub plt_id: PlatformId,
    pub eta_min: DateTime<Utc>,
    pub eta_max: DateTime<Utc>,
}

impl Reachability {
    pub fn new(plt_id: impl Into<PlatformId>, eta_min: DateTime<Utc>, eta_max: DateTime<Utc>) -> Self {
        Self {
            plt_id: plt_id.into(),
            eta_min,
            eta_max,
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}, {}]",
            self.plt_id,
            self.eta_min.to_rfc3339(),
            self.eta_max.to_rfc3339()
        )
    }
}
