//! # Platform Status
//!
//! Last known state of one docking platform: liveness reported by the
//! heartbeat collaborator, alarm flags, the pit stop currently staged on the
//! flange and the payload bays.
//!
//! Platforms report either a full status (answer to a status request) or a
//! partial indication. Partial indications are merged bay by bay; bays the
//! indication does not mention are left as they were.

use super::{BayId, PlatformId, PsId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic position of a platform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lon: f64,
    pub lat: f64,
}

impl GeoCoord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Platform liveness as reported by the heartbeat collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Online,
    #[default]
    Offline,
    Lost,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Lost => write!(f, "lost"),
        }
    }
}

/// Alarm flags raised by a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformAlarms {
    pub flange_unavailable: bool,
    pub cylinder_busy: bool,
}

impl PlatformAlarms {
    /// Any raised alarm makes the platform unusable for new pit stops
    pub fn is_unavailable(&self) -> bool {
        self.flange_unavailable || self.cylinder_busy
    }
}

/// Payload held in a bay, possibly still charging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoringPayload {
    pub id: String,
    pub payload_type: String,
    /// Charge fraction, 0.0 to 1.0
    pub charge: f64,
    /// Instant the payload is fully restored; `None` when already usable
    pub restore_at: Option<DateTime<Utc>>,
}

impl RestoringPayload {
    /// Instant from which the payload can be handed over
    pub fn available_at(&self) -> DateTime<Utc> {
        self.restore_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// One payload slot of a platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadBay {
    pub bay_id: BayId,
    pub payload: Option<RestoringPayload>,
    /// Time needed to move the payload from the bay to the flange
    pub prepare_millis: u64,
}

impl PayloadBay {
    pub fn holds(&self, payload_type: &str) -> bool {
        self.payload
            .as_ref()
            .is_some_and(|p| p.payload_type == payload_type)
    }
}

/// Last known state of one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub plt_id: PlatformId,
    pub liveness: Liveness,
    pub alarms: PlatformAlarms,
    /// Pit stop whose payload is staged on the flange
    pub ready_ps_id: Option<PsId>,
    pub geo: Option<GeoCoord>,
    /// Duration of one payload exchange
    pub service_millis: u64,
    pub bays: Vec<PayloadBay>,
}

impl PlatformStatus {
    /// Status of a platform nothing is known about yet
    pub fn offline(plt_id: impl Into<PlatformId>) -> Self {
        Self {
            plt_id: plt_id.into(),
            liveness: Liveness::Offline,
            alarms: PlatformAlarms::default(),
            ready_ps_id: None,
            geo: None,
            service_millis: 0,
            bays: Vec::new(),
        }
    }

    /// Same platform after the heartbeat collaborator lost it
    pub fn lost(&self) -> Self {
        Self {
            plt_id: self.plt_id.clone(),
            liveness: Liveness::Lost,
            alarms: PlatformAlarms::default(),
            ready_ps_id: None,
            geo: self.geo,
            service_millis: self.service_millis,
            bays: Vec::new(),
        }
    }

    /// Online and without alarms
    pub fn is_available(&self) -> bool {
        self.liveness == Liveness::Online && !self.alarms.is_unavailable()
    }

    pub fn bay(&self, bay_id: BayId) -> Option<&PayloadBay> {
        self.bays.iter().find(|b| b.bay_id == bay_id)
    }

    /// True if any bay holds a payload of the given type
    pub fn offers(&self, payload_type: &str) -> bool {
        self.bays.iter().any(|b| b.holds(payload_type))
    }

    /// Bay ids in `update` that this platform does not know
    pub fn unknown_bay_ids(&self, update: &[PayloadBay]) -> Vec<BayId> {
        update
            .iter()
            .map(|b| b.bay_id)
            .filter(|id| self.bay(*id).is_none())
            .collect()
    }

    /// Apply a partial indication: bays merged by id, alarms and staged
    /// pit stop replaced, platform considered online.
    ///
    /// Callers validate the bay ids first with [`Self::unknown_bay_ids`];
    /// unknown bays are ignored here.
    pub fn merged(
        &self,
        bays: &[PayloadBay],
        ready_ps_id: Option<PsId>,
        alarms: PlatformAlarms,
    ) -> Self {
        let mut merged = self.clone();
        for update in bays {
            if let Some(slot) = merged.bays.iter_mut().find(|b| b.bay_id == update.bay_id) {
                *slot = update.clone();
            }
        }
        merged.ready_ps_id = ready_ps_id;
        merged.alarms = alarms;
        merged.liveness = Liveness::Online;
        merged
    }
}
