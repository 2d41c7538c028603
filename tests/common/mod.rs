//! Fixtures shared by the integration tests.
//!
//! The protocol scenarios run on a paused clock. Every tower starts at
//! [`epoch`]; the single test platform `PLT1` serves `PT1` payloads from two
//! bays and the default assignation lands at `epoch + 5min`, so:
//!
//! - the ready request goes out at `at - 15s - 30s` = `epoch + 4min15s`
//! - the arrival window is `[epoch + 4min45s, epoch + 5min15s]`

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use pitstop_tower::messaging::{
    PlatformReachabilityIndication, PlatformStatusIndication, PsDemandRequest,
};
use pitstop_tower::models::{PlatformAlarms, PsId, Reachability};
use pitstop_tower::planning::Plan;
use pitstop_tower::test_helpers::{assignation, bay, epoch, online_platform, settle, SharedTestSetup};
use pitstop_tower::{PsState, WorldModel};

pub const MC: &str = "MC1";
pub const PLT: &str = "PLT1";
pub const PT: &str = "PT1";
pub const PREPARE_MS: u64 = 30_000;

/// From start to the ready request, plus a little
pub const TO_ENGAGED: std::time::Duration = std::time::Duration::from_secs(4 * 60 + 16);
/// From the ready request to the middle of the arrival window
pub const TO_CYLINDER: std::time::Duration = std::time::Duration::from_secs(34);

pub fn one_platform_world() -> WorldModel {
    let mut world = WorldModel::new();
    world.update_platform(online_platform(
        PLT,
        vec![bay(1, Some(PT), PREPARE_MS), bay(2, Some(PT), PREPARE_MS)],
    ));
    world
}

pub fn arrival() -> DateTime<Utc> {
    epoch() + Duration::minutes(5)
}

pub fn demand(payload_type: &str) -> PsDemandRequest {
    PsDemandRequest {
        request_id: 7,
        payload_type: payload_type.to_string(),
        end_of_drone_life: epoch() + Duration::hours(1),
    }
}

pub fn reachable(ps_id: PsId) -> PlatformReachabilityIndication {
    PlatformReachabilityIndication {
        ps_id,
        reachabilities: vec![Reachability::new(
            PLT,
            arrival(),
            arrival() + Duration::minutes(1),
        )],
    }
}

pub fn ready_status(ready_ps_id: Option<PsId>) -> PlatformStatusIndication {
    PlatformStatusIndication {
        bays: None,
        ready_ps_id,
        alarms: PlatformAlarms::default(),
    }
}

pub async fn requested(setup: &SharedTestSetup) -> PsId {
    let response = setup
        .tower
        .ps_demand(MC, demand(PT))
        .await
        .expect("demand accepted");
    response.ps_id
}

pub async fn ready_to_schedule(setup: &SharedTestSetup) -> PsId {
    let ps_id = requested(setup).await;
    setup
        .tower
        .platform_reachability(reachable(ps_id))
        .await
        .expect("reachability accepted");
    assert_eq!(setup.state(ps_id).await, Some(PsState::ReadyToSchedule));
    ps_id
}

/// Assigned to bay 1 at [`arrival`] and confirmed by the MC
pub async fn in_transit(setup: &SharedTestSetup) -> PsId {
    let ps_id = ready_to_schedule(setup).await;
    setup
        .tower
        .apply_plan(Plan::new(vec![ps_id]).with(ps_id, assignation(PLT, 1, arrival())))
        .expect("tower running");
    settle().await;
    assert_eq!(setup.state(ps_id).await, Some(PsState::InTransitToAssigned));
    ps_id
}

/// Ready request sent to the platform
pub async fn engaged(setup: &SharedTestSetup) -> PsId {
    let ps_id = in_transit(setup).await;
    setup.advance(TO_ENGAGED).await;
    assert_eq!(setup.state(ps_id).await, Some(PsState::PlatformEngaged));
    ps_id
}

/// Landing authorized inside the arrival window
pub async fn landing_authorized(setup: &SharedTestSetup) -> PsId {
    let ps_id = engaged(setup).await;
    setup
        .tower
        .platform_status(PLT, ready_status(Some(ps_id)))
        .await
        .expect("status accepted");
    setup.advance(TO_CYLINDER).await;
    setup
        .tower
        .cylinder_enter(pitstop_tower::messaging::PlatformCylinderEnterRequest { ps_id })
        .await
        .expect("landing authorized");
    assert_eq!(setup.state(ps_id).await, Some(PsState::LandingAuthorized));
    ps_id
}

/// Targets that received an abort for `ps_id`
pub fn abort_targets(setup: &SharedTestSetup, ps_id: PsId) -> Vec<String> {
    setup
        .bus
        .sent("PsAbortIndication")
        .into_iter()
        .filter(|call| call.message.ps_id() == Some(ps_id))
        .map(|call| call.target)
        .collect()
}
