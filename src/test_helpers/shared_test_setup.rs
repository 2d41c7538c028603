//! World fixtures and a running tower wired to a scripted bus.

use super::scripted_messaging::ScriptedMessaging;
use crate::config::TowerConfig;
use crate::events::WorldListener;
use crate::models::{
    Assignation, GeoCoord, Liveness, PayloadBay, PitStopView, PlatformAlarms, PlatformStatus,
    PsId, PsRequest, RestoringPayload,
};
use crate::orchestration::{Tower, TowerHandle};
use crate::state_machine::PsState;
use crate::world::WorldModel;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Wall-clock instant the test towers start at
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Bay holding a ready payload of `payload_type`, or empty when `None`
pub fn bay(bay_id: u32, payload_type: Option<&str>, prepare_millis: u64) -> PayloadBay {
    PayloadBay {
        bay_id,
        payload: payload_type.map(|t| RestoringPayload {
            id: format!("BAT-{bay_id}"),
            payload_type: t.to_string(),
            charge: 1.0,
            restore_at: None,
        }),
        prepare_millis,
    }
}

/// Online platform without alarms and a one minute service time
pub fn online_platform(plt_id: &str, bays: Vec<PayloadBay>) -> PlatformStatus {
    PlatformStatus {
        plt_id: plt_id.to_string(),
        liveness: Liveness::Online,
        alarms: PlatformAlarms::default(),
        ready_ps_id: None,
        geo: Some(GeoCoord::new(11.25, 43.77)),
        service_millis: 60_000,
        bays,
    }
}

pub fn ps_request(payload_type: &str) -> PsRequest {
    PsRequest {
        request_id: 1,
        payload_type: payload_type.to_string(),
        end_of_drone_life: epoch() + Duration::hours(1),
    }
}

/// Assignation at `at` with the default 15s half margin and a one minute service
pub fn assignation(plt_id: &str, bay_id: u32, at: DateTime<Utc>) -> Assignation {
    let lead = Duration::seconds(15);
    Assignation::new(plt_id, bay_id, at, at - lead, at + Duration::seconds(60) + lead)
}

/// Let every ready task run, including outbound calls and their replies
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// A running tower on a scripted bus
pub struct SharedTestSetup {
    pub tower: TowerHandle,
    pub bus: ScriptedMessaging,
    pub config: TowerConfig,
    join: JoinHandle<()>,
}

impl SharedTestSetup {
    /// Protocol only: planning is off, plans are applied by hand
    pub fn start(world: WorldModel) -> Self {
        Self::start_with(world, TowerConfig::default(), false, Vec::new())
    }

    /// With the bundled planner
    pub fn start_with_planning(world: WorldModel) -> Self {
        Self::start_with(world, TowerConfig::default(), true, Vec::new())
    }

    pub fn start_with(
        world: WorldModel,
        config: TowerConfig,
        planning: bool,
        listeners: Vec<Box<dyn WorldListener>>,
    ) -> Self {
        let bus = ScriptedMessaging::new();
        let mut builder = Tower::builder(config.clone()).epoch(epoch()).world(world);
        if !planning {
            builder = builder.without_planning();
        }
        for listener in listeners {
            builder = builder.listener(BoxedListener(listener));
        }
        let (tower, join) = builder.spawn(Arc::new(bus.clone()));
        Self {
            tower,
            bus,
            config,
            join,
        }
    }

    pub async fn view(&self, ps_id: PsId) -> Option<PitStopView> {
        self.tower.pit_stop(ps_id).await.ok().flatten()
    }

    pub async fn state(&self, ps_id: PsId) -> Option<PsState> {
        self.view(ps_id).await.map(|v| v.state)
    }

    /// Move the paused clock forward and let the tower react
    pub async fn advance(&self, by: std::time::Duration) {
        tokio::time::advance(by).await;
        settle().await;
    }

    pub async fn shutdown(self) {
        let _ = self.tower.shutdown();
        let _ = self.join.await;
    }
}

struct BoxedListener(Box<dyn WorldListener>);

impl WorldListener for BoxedListener {
    fn on_world_event(&mut self, event: &crate::events::WorldEvent) {
        self.0.on_world_event(event);
    }
}
