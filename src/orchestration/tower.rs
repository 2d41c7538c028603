//! # Tower
//!
//! The event loop. One task owns the world model and both layers and
//! consumes the mailbox one event at a time. After each event, world
//! notifications are delivered in order to the lower layer, the upper layer
//! and the registered listeners; a planning round is then started if the
//! turn asked for one.
//!
//! Everything else talks to the loop through a [`TowerHandle`].

use super::dispatcher::Dispatcher;
use super::lower::Lower;
use super::scheduler::Scheduler;
use super::types::{Inbound, Inspection, LivenessChange, TowerEvent};
use super::upper::Upper;
use crate::config::TowerConfig;
use crate::error::{Result, TowerError};
use crate::events::WorldListener;
use crate::messaging::{
    AgentCategory, DroneLandedIndication, PlatformCylinderEnterRequest,
    PlatformCylinderLeftIndication, PlatformReachabilityIndication, PlatformStatusIndication,
    PsAbortIndication, PsCompletedIndication, PsDemandRequest, PsDemandResponse, TowerMessaging,
};
use crate::models::{PitStopView, PlatformStatus, PsId, Responder};
use crate::planning::{DummyPlanner, Plan, Planner};
use crate::world::WorldModel;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct Tower {
    lower: Lower,
    upper: Option<Upper>,
    listeners: Vec<Box<dyn WorldListener>>,
    mailbox: mpsc::UnboundedReceiver<TowerEvent>,
}

impl Tower {
    pub fn builder(config: TowerConfig) -> TowerBuilder {
        TowerBuilder::new(config)
    }

    /// Consume the mailbox until shutdown
    pub async fn run(mut self) {
        info!(
            planning = self.upper.is_some(),
            listeners = self.listeners.len(),
            "Tower started"
        );
        while let Some(event) = self.mailbox.recv().await {
            if matches!(event, TowerEvent::Shutdown) {
                break;
            }
            self.lower.begin_turn();
            self.handle(event);
            self.settle();
        }
        info!("Tower stopped");
    }

    fn handle(&mut self, event: TowerEvent) {
        match event {
            TowerEvent::Inbound(inbound) => self.lower.on_inbound(inbound),
            TowerEvent::Liveness {
                agent_id,
                category,
                change,
            } => self.lower.on_liveness(agent_id, category, change),
            TowerEvent::TimerFired { timer_id, action } => {
                self.lower.on_timer_fired(timer_id, action);
            }
            TowerEvent::CallCompleted(completion) => self.lower.on_call_completed(completion),
            TowerEvent::PlanReady { generation, plan } => {
                let accepted = self
                    .upper
                    .as_mut()
                    .and_then(|upper| upper.accept(generation, plan));
                if let Some(plan) = accepted {
                    self.lower.apply_plan(&plan);
                }
            }
            TowerEvent::ApplyPlan(plan) => {
                self.lower.apply_plan(&plan);
            }
            TowerEvent::Inspect(inspection) => self.lower.inspect(inspection),
            TowerEvent::Shutdown => {}
        }
    }

    /// Deliver queued world events, then start planning if needed
    fn settle(&mut self) {
        while let Some(event) = self.lower.world_mut().pop_event() {
            self.lower.on_world_event(&event);
            if let Some(upper) = self.upper.as_mut() {
                upper.on_world_event(&event);
            }
            for listener in &mut self.listeners {
                listener.on_world_event(&event);
            }
        }
        if let Some(upper) = self.upper.as_mut() {
            upper.flush(self.lower.world(), self.lower.now());
        }
    }
}

/// Assembles a tower
pub struct TowerBuilder {
    config: TowerConfig,
    epoch: Option<DateTime<Utc>>,
    world: WorldModel,
    planner: Option<Arc<dyn Planner>>,
    planning: bool,
    listeners: Vec<Box<dyn WorldListener>>,
}

impl TowerBuilder {
    pub fn new(config: TowerConfig) -> Self {
        Self {
            config,
            epoch: None,
            world: WorldModel::new(),
            planner: None,
            planning: true,
            listeners: Vec::new(),
        }
    }

    /// Wall-clock time at startup; defaults to the system clock
    pub fn epoch(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = Some(epoch);
        self
    }

    /// Start from a pre-populated world. Its pending notifications are dropped.
    pub fn world(mut self, mut world: WorldModel) -> Self {
        world.drain_events();
        self.world = world;
        self
    }

    pub fn planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Run the protocol only; plans arrive through [`TowerHandle::apply_plan`]
    pub fn without_planning(mut self) -> Self {
        self.planning = false;
        self
    }

    pub fn listener(mut self, listener: impl WorldListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn build(self, messaging: Arc<dyn TowerMessaging>) -> (Tower, TowerHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let timing = self.config.timing;
        let epoch = self.epoch.unwrap_or_else(Utc::now);

        let scheduler = Scheduler::new(sender.clone(), epoch);
        let dispatcher = Dispatcher::new(messaging, timing.comms_timeout(), sender.clone());
        let lower = Lower::new(self.world, scheduler, dispatcher, timing);

        let upper = self.planning.then(|| {
            let planner = self
                .planner
                .unwrap_or_else(|| Arc::new(DummyPlanner::new(timing.half_margin())));
            Upper::new(planner, sender.clone(), timing.planning_lead())
        });

        let tower = Tower {
            lower,
            upper,
            listeners: self.listeners,
            mailbox: receiver,
        };
        (tower, TowerHandle { sender })
    }

    /// Build and run the loop on the current runtime
    pub fn spawn(self, messaging: Arc<dyn TowerMessaging>) -> (TowerHandle, JoinHandle<()>) {
        let (tower, handle) = self.build(messaging);
        (handle, tokio::spawn(tower.run()))
    }
}

/// Cloneable entry point into a running tower
#[derive(Debug, Clone)]
pub struct TowerHandle {
    sender: mpsc::UnboundedSender<TowerEvent>,
}

impl TowerHandle {
    fn post(&self, event: TowerEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| TowerError::ChannelClosed)
    }

    async fn request<T>(&self, make: impl FnOnce(Responder<T>) -> Inbound) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.post(TowerEvent::Inbound(make(reply)))?;
        response.await.map_err(|_| TowerError::ChannelClosed)?
    }

    async fn inspect<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Inspection) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.post(TowerEvent::Inspect(make(reply)))?;
        response.await.map_err(|_| TowerError::ChannelClosed)
    }

    // ---- MC side ----

    pub async fn ps_demand(
        &self,
        mc_id: impl Into<String>,
        request: PsDemandRequest,
    ) -> Result<PsDemandResponse> {
        let mc_id = mc_id.into();
        self.request(|reply| Inbound::PsDemand {
            mc_id,
            request,
            reply,
        })
        .await
    }

    pub async fn platform_reachability(&self, indication: PlatformReachabilityIndication) -> Result<()> {
        self.request(|reply| Inbound::PlatformReachability { indication, reply })
            .await
    }

    /// Resolves once landing is authorized, or with the reason it never will be
    pub async fn cylinder_enter(&self, request: PlatformCylinderEnterRequest) -> Result<()> {
        self.request(|reply| Inbound::CylinderEnter { request, reply })
            .await
    }

    /// Resolves once the platform confirmed the touchdown
    pub async fn drone_landed(&self, indication: DroneLandedIndication) -> Result<()> {
        self.request(|reply| Inbound::DroneLanded { indication, reply })
            .await
    }

    pub async fn cylinder_left(&self, indication: PlatformCylinderLeftIndication) -> Result<()> {
        self.request(|reply| Inbound::CylinderLeft { indication, reply })
            .await
    }

    pub async fn ps_abort(&self, indication: PsAbortIndication) -> Result<()> {
        self.request(|reply| Inbound::McAbort { indication, reply })
            .await
    }

    // ---- platform side ----

    /// Resolves once the MC acknowledged the completion
    pub async fn ps_completed(
        &self,
        plt_id: impl Into<String>,
        indication: PsCompletedIndication,
    ) -> Result<()> {
        let plt_id = plt_id.into();
        self.request(|reply| Inbound::PsCompleted {
            plt_id,
            indication,
            reply,
        })
        .await
    }

    pub async fn platform_status(
        &self,
        plt_id: impl Into<String>,
        indication: PlatformStatusIndication,
    ) -> Result<()> {
        let plt_id = plt_id.into();
        self.request(|reply| Inbound::PlatformStatus {
            plt_id,
            indication,
            reply,
        })
        .await
    }

    // ---- bus lifecycle ----

    pub fn agent_discovered(&self, agent_id: impl Into<String>, category: AgentCategory) -> Result<()> {
        self.liveness(agent_id.into(), category, LivenessChange::Discovered)
    }

    pub fn agent_lost(&self, agent_id: impl Into<String>, category: AgentCategory) -> Result<()> {
        self.liveness(agent_id.into(), category, LivenessChange::Lost)
    }

    pub fn agent_returned(&self, agent_id: impl Into<String>, category: AgentCategory) -> Result<()> {
        self.liveness(agent_id.into(), category, LivenessChange::Returned)
    }

    fn liveness(&self, agent_id: String, category: AgentCategory, change: LivenessChange) -> Result<()> {
        debug!(agent_id = %agent_id, %category, %change, "Liveness");
        self.post(TowerEvent::Liveness {
            agent_id,
            category,
            change,
        })
    }

    // ---- plans and inspection ----

    pub fn apply_plan(&self, plan: Plan) -> Result<()> {
        self.post(TowerEvent::ApplyPlan(plan))
    }

    pub async fn pit_stop(&self, ps_id: PsId) -> Result<Option<PitStopView>> {
        self.inspect(|reply| Inspection::PitStop { ps_id, reply })
            .await
    }

    pub async fn pit_stops(&self) -> Result<Vec<PitStopView>> {
        self.inspect(|reply| Inspection::PitStops { reply }).await
    }

    pub async fn platforms(&self) -> Result<Vec<PlatformStatus>> {
        self.inspect(|reply| Inspection::Platforms { reply }).await
    }

    pub fn shutdown(&self) -> Result<()> {
        self.post(TowerEvent::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
