use chrono::{DateTime, Duration, TimeZone, Utc};
use pitstop_tower::models::{
    Assignation, GeoCoord, Liveness, PayloadBay, PlatformAlarms, PlatformStatus, Reachability,
    RestoringPayload,
};
use pitstop_tower::planning::{DummyPlanner, Planner, PlanningInput, PsSnapshot};
use pitstop_tower::PsState;
use proptest::prelude::*;

const PAYLOAD_TYPES: [&str; 2] = ["PT1", "PT2"];
const PLATFORMS: [&str; 2] = ["PLT1", "PLT2"];

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
}

fn after(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

fn bay_strategy(bay_id: u32) -> impl Strategy<Value = PayloadBay> {
    (prop::option::of(0usize..2), 0u64..60, prop::option::of(0i64..600)).prop_map(
        move |(payload_type, prepare_secs, restore_in)| PayloadBay {
            bay_id,
            payload: payload_type.map(|t| RestoringPayload {
                id: format!("P{bay_id}"),
                payload_type: PAYLOAD_TYPES[t].to_string(),
                charge: 1.0,
                restore_at: restore_in.map(after),
            }),
            prepare_millis: prepare_secs * 1_000,
        },
    )
}

fn platform_strategy(index: usize) -> impl Strategy<Value = PlatformStatus> {
    (
        (1u32..4).prop_flat_map(|count| (0..count).map(bay_strategy).collect::<Vec<_>>()),
        30u64..120,
        prop::bool::weighted(0.85),
    )
        .prop_map(move |(bays, service_secs, online)| PlatformStatus {
            plt_id: PLATFORMS[index].to_string(),
            liveness: if online { Liveness::Online } else { Liveness::Offline },
            alarms: PlatformAlarms::default(),
            ready_ps_id: None,
            geo: Some(GeoCoord::new(10.0, 45.0)),
            service_millis: service_secs * 1_000,
            bays,
        })
}

fn reachability_strategy() -> impl Strategy<Value = Reachability> {
    (0usize..2, 0i64..1_800, 0i64..900).prop_map(|(plt, eta_min, spread)| {
        Reachability::new(PLATFORMS[plt], after(eta_min), after(eta_min + spread))
    })
}

fn plannable_strategy() -> impl Strategy<Value = (usize, i64, Vec<Reachability>)> {
    (
        0usize..2,
        10i64..240,
        prop::collection::vec(reachability_strategy(), 0..3),
    )
}

fn planned_strategy() -> impl Strategy<Value = Assignation> {
    (0usize..2, 0u32..3, 0i64..1_800, 60i64..300).prop_map(|(plt, bay_id, from, length)| {
        Assignation::new(
            PLATFORMS[plt],
            bay_id,
            after(from + 30),
            after(from),
            after(from + length),
        )
    })
}

fn input_strategy() -> impl Strategy<Value = PlanningInput> {
    (
        platform_strategy(0),
        platform_strategy(1),
        prop::collection::vec(plannable_strategy(), 0..6),
        prop::collection::vec(planned_strategy(), 0..3),
    )
        .prop_map(|(plt1, plt2, plannables, planned)| PlanningInput {
            t0: t0(),
            plannables: plannables
                .into_iter()
                .enumerate()
                .map(|(i, (payload_type, life, reachabilities))| PsSnapshot {
                    id: i as u32 + 1,
                    state: PsState::ReadyToSchedule,
                    payload_type: PAYLOAD_TYPES[payload_type].to_string(),
                    end_of_drone_life: t0() + Duration::minutes(life),
                    reachabilities,
                    assignation: None,
                })
                .collect(),
            planned: planned
                .into_iter()
                .enumerate()
                .map(|(i, assignation)| PsSnapshot {
                    id: i as u32 + 100,
                    state: PsState::PlatformEngaged,
                    payload_type: PAYLOAD_TYPES[0].to_string(),
                    end_of_drone_life: t0() + Duration::hours(1),
                    reachabilities: vec![],
                    assignation: Some(assignation),
                })
                .collect(),
            platforms: vec![plt1, plt2],
        })
}

proptest! {
    /// Property: a plan never double-books a cylinder, neither against itself
    /// nor against the frozen assignations it was given
    #[test]
    fn plans_never_overlap_on_a_platform(input in input_strategy()) {
        let plan = DummyPlanner::with_half_margin_millis(15_000).plan(&input);
        let assigned: Vec<&Assignation> = plan.assignations().map(|(_, a)| a).collect();

        for (i, a) in assigned.iter().enumerate() {
            for b in assigned.iter().skip(i + 1) {
                if a.plt_id == b.plt_id {
                    prop_assert!(!a.occupation().overlaps(&b.occupation()), "{} overlaps {}", a, b);
                }
                prop_assert!(!a.same_bay(b), "bay {}/{} used twice", a.plt_id, a.bay_id);
            }
            for frozen in input.planned.iter().filter_map(|p| p.assignation.as_ref()) {
                if a.plt_id == frozen.plt_id {
                    prop_assert!(!a.occupation().overlaps(&frozen.occupation()));
                    prop_assert!(!a.same_bay(frozen));
                }
            }
        }
    }

    /// Property: every assignation is feasible for its pit stop
    #[test]
    fn assignations_are_feasible(input in input_strategy()) {
        let plan = DummyPlanner::with_half_margin_millis(15_000).plan(&input);

        for (ps_id, assignation) in plan.assignations() {
            let ps = input.plannables.iter().find(|p| p.id == ps_id);
            prop_assert!(ps.is_some(), "PS {} was not plannable", ps_id);
            let ps = ps.unwrap();

            let platform = input.platforms.iter().find(|p| p.plt_id == assignation.plt_id).unwrap();
            prop_assert!(platform.is_available());
            prop_assert!(platform.bay(assignation.bay_id).is_some_and(|b| b.holds(&ps.payload_type)));

            let reachable = ps.reachabilities.iter().any(|r| {
                r.plt_id == assignation.plt_id && r.eta_min <= assignation.at
            });
            prop_assert!(reachable);
            prop_assert!(assignation.occupied_from >= input.t0);
            prop_assert!(assignation.occupied_from < assignation.at);
            prop_assert!(assignation.at < assignation.occupied_to);
        }
    }
}
