//! # Orchestration Types
//!
//! Messages travelling through the tower mailbox.

use super::dispatcher::CallCompletion;
use crate::messaging::{
    AgentCategory, DroneLandedIndication, PlatformCylinderEnterRequest,
    PlatformCylinderLeftIndication, PlatformReachabilityIndication, PlatformStatusIndication,
    PsAbortIndication, PsCompletedIndication, PsDemandRequest, PsDemandResponse,
};
use crate::models::{McId, PitStopView, PlatformId, PlatformStatus, PsId, PsTimer, Responder};
use crate::planning::Plan;
use std::fmt;
use tokio::sync::oneshot;

/// Everything the event loop reacts to
#[derive(Debug)]
pub enum TowerEvent {
    Inbound(Inbound),
    Liveness {
        agent_id: String,
        category: AgentCategory,
        change: LivenessChange,
    },
    TimerFired {
        timer_id: super::scheduler::TimerId,
        action: TimerAction,
    },
    CallCompleted(CallCompletion),
    PlanReady {
        generation: u64,
        plan: Plan,
    },
    /// Apply a plan computed outside the tower
    ApplyPlan(Plan),
    Inspect(Inspection),
    Shutdown,
}

/// Requests and indications from MCs and platforms
#[derive(Debug)]
pub enum Inbound {
    PsDemand {
        mc_id: McId,
        request: PsDemandRequest,
        reply: Responder<PsDemandResponse>,
    },
    PlatformReachability {
        indication: PlatformReachabilityIndication,
        reply: Responder<()>,
    },
    CylinderEnter {
        request: PlatformCylinderEnterRequest,
        reply: Responder<()>,
    },
    DroneLanded {
        indication: DroneLandedIndication,
        reply: Responder<()>,
    },
    CylinderLeft {
        indication: PlatformCylinderLeftIndication,
        reply: Responder<()>,
    },
    McAbort {
        indication: PsAbortIndication,
        reply: Responder<()>,
    },
    PsCompleted {
        plt_id: PlatformId,
        indication: PsCompletedIndication,
        reply: Responder<()>,
    },
    PlatformStatus {
        plt_id: PlatformId,
        indication: PlatformStatusIndication,
        reply: Responder<()>,
    },
}

impl Inbound {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PsDemand { .. } => "PsDemandRequest",
            Self::PlatformReachability { .. } => "PlatformReachabilityIndication",
            Self::CylinderEnter { .. } => "PlatformCylinderEnterRequest",
            Self::DroneLanded { .. } => "DroneLandedIndication",
            Self::CylinderLeft { .. } => "PlatformCylinderLeftIndication",
            Self::McAbort { .. } => "PsAbortIndication",
            Self::PsCompleted { .. } => "PsCompletedIndication",
            Self::PlatformStatus { .. } => "PlatformStatusIndication",
        }
    }
}

/// Agent lifecycle notification from the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessChange {
    Discovered,
    Lost,
    Returned,
}

impl fmt::Display for LivenessChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovered => write!(f, "discovered"),
            Self::Lost => write!(f, "lost"),
            Self::Returned => write!(f, "returned"),
        }
    }
}

/// What an expired timer asks the tower to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Ps { ps_id: PsId, timer: PsTimer },
    Bury { ps_id: PsId },
}

/// Read-only queries answered by the event loop
#[derive(Debug)]
pub enum Inspection {
    PitStop {
        ps_id: PsId,
        reply: oneshot::Sender<Option<PitStopView>>,
    },
    PitStops {
        reply: oneshot::Sender<Vec<PitStopView>>,
    },
    Platforms {
        reply: oneshot::Sender<Vec<PlatformStatus>>,
    },
}
