//! Protocol payloads exchanged with mission controllers and platforms.
//!
//! Inbound requests reach the tower through [`crate::orchestration::TowerHandle`];
//! outbound messages leave through [`super::TowerMessaging::invoke`].

use crate::models::{
    BayId, GeoCoord, PayloadBay, PlatformAlarms, PlatformId, PsId, Reachability,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// MC asks for a pit stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsDemandRequest {
    pub request_id: u64,
    pub payload_type: String,
    pub end_of_drone_life: DateTime<Utc>,
}

/// Platform able to serve a demand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAvailability {
    pub plt_id: PlatformId,
    pub geo: Option<GeoCoord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsDemandResponse {
    pub request_id: u64,
    pub ps_id: PsId,
    pub platforms: Vec<PlatformAvailability>,
}

/// MC's ETA windows toward candidate platforms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformReachabilityIndication {
    pub ps_id: PsId,
    pub reachabilities: Vec<Reachability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCylinderEnterRequest {
    pub ps_id: PsId,
}

/// Touchdown reported by the MC, relayed as-is to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroneLandedIndication {
    pub ps_id: PsId,
    pub plt_id: PlatformId,
    pub drone_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCylinderLeftIndication {
    pub ps_id: PsId,
}

/// Abort in either direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsAbortIndication {
    pub ps_id: PsId,
}

/// Exchange done, reported by the platform and relayed to the MC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsCompletedIndication {
    pub ps_id: PsId,
    pub plt_id: PlatformId,
}

/// Partial status pushed by a platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStatusIndication {
    pub bays: Option<Vec<PayloadBay>>,
    pub ready_ps_id: Option<PsId>,
    pub alarms: PlatformAlarms,
}

/// Full status returned to a status request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStatusResponse {
    pub geo: Option<GeoCoord>,
    pub service_millis: u64,
    pub alarms: PlatformAlarms,
    pub ready_ps_id: Option<PsId>,
    pub bays: Option<Vec<PayloadBay>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAssignmentIndication {
    pub ps_id: PsId,
    pub plt_id: PlatformId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyPsRequest {
    pub ps_id: PsId,
    pub bay_id: BayId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anomaly {
    CylinderBusy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyIndication {
    pub ps_id: PsId,
    pub anomalies: Vec<Anomaly>,
}

/// Messages the tower sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    PlatformAssignment(PlatformAssignmentIndication),
    ReadyPs(ReadyPsRequest),
    DroneLanded(DroneLandedIndication),
    PsCompleted(PsCompletedIndication),
    PsAbort(PsAbortIndication),
    Anomaly(AnomalyIndication),
    PlatformStatusRequest,
}

impl OutboundMessage {
    /// Message name on the bus
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::PlatformAssignment(_) => "PlatformAssignmentIndication",
            Self::ReadyPs(_) => "ReadyPsRequest",
            Self::DroneLanded(_) => "DroneLandedIndication",
            Self::PsCompleted(_) => "PsCompletedIndication",
            Self::PsAbort(_) => "PsAbortIndication",
            Self::Anomaly(_) => "AnomalyIndication",
            Self::PlatformStatusRequest => "PlatformStatusRequest",
        }
    }

    /// Pit stop the message is about, if any
    pub fn ps_id(&self) -> Option<PsId> {
        match self {
            Self::PlatformAssignment(m) => Some(m.ps_id),
            Self::ReadyPs(m) => Some(m.ps_id),
            Self::DroneLanded(m) => Some(m.ps_id),
            Self::PsCompleted(m) => Some(m.ps_id),
            Self::PsAbort(m) => Some(m.ps_id),
            Self::Anomaly(m) => Some(m.ps_id),
            Self::PlatformStatusRequest => None,
        }
    }
}

/// Answer to an outbound message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Reply {
    Ack,
    PlatformStatus(PlatformStatusResponse),
}
