//! Integration tests across the engine, annealer and recovery protocol.

use approx::assert_relative_eq;
use basin_core::{
    AnnealOptions, AnnealingExplorer, Coord, CoordinateIndexer, EnergyModel, LastAction,
    LatticeEngine, RecoveryConfig, RecoveryExperiment, RecoverySummary, ScheduleConfig,
    TemperatureSchedule, WeightedEnergy,
};
use proptest::prelude::*;

fn engine(n: u32, seed: u64) -> LatticeEngine {
    let mut e = LatticeEngine::new(n).unwrap();
    e.randomize(seed);
    e
}

/// Identity rotation leaves the grid alone; any other rotation followed by
/// its inverse restores it exactly.
#[test]
fn global_identity_and_inverse() {
    let mut e = LatticeEngine::new(3).unwrap();
    let original = e.grid().to_vec();

    e.apply(e.identity_op()).unwrap();
    assert_eq!(e.grid(), &original[..]);

    let identity = e.identity_op();
    for op in (0..24).filter(|&op| op != identity) {
        e.apply(op).unwrap();
        assert_ne!(e.grid(), &original[..], "op {op} should move something");
        e.apply(e.inverse_op(op).unwrap()).unwrap();
        assert_eq!(e.grid(), &original[..]);
        e.audit().unwrap();
    }
}

/// A radius-1 local rotation in N=5 only touches the 27 sites of the ball.
#[test]
fn local_rotation_touches_only_ball() {
    let mut e = LatticeEngine::new(5).unwrap();
    let indexer = CoordinateIndexer::new(5).unwrap();
    let op = (0..24).find(|&op| op != e.identity_op()).unwrap();
    let before = e.grid().to_vec();

    e.apply_local(op, Coord::ORIGIN, 1).unwrap();
    e.audit().unwrap();

    let mut unchanged_outside = 0;
    for (i, (&a, &b)) in before.iter().zip(e.grid()).enumerate() {
        let c = indexer.index_to_coord(i).unwrap();
        if c.chebyshev(Coord::ORIGIN) > 1 {
            assert_eq!(a, b, "site {c} outside the ball changed");
            unchanged_outside += 1;
        }
    }
    assert_eq!(unchanged_outside, 98);
}

#[test]
fn anneal_zero_steps() {
    let mut e = engine(5, 2);
    let energy = WeightedEnergy::default();
    let trace = AnnealingExplorer::run(
        &mut e,
        &energy,
        &TemperatureSchedule::canonical(),
        &AnnealOptions::new(0, 0),
    )
    .unwrap();
    assert!(trace.steps.is_empty());
    assert_eq!(trace.best_energy, trace.initial_energy);
    assert_eq!(trace.final_hash, trace.initial_hash);
}

#[test]
fn anneal_lowers_energy_from_random_start() {
    let mut e = engine(5, 8);
    let energy = WeightedEnergy::default();
    let start = energy.evaluate(&e);
    let trace = AnnealingExplorer::run(
        &mut e,
        &energy,
        &TemperatureSchedule::exponential(3.0, 0.05, 2000).unwrap(),
        &AnnealOptions::new(2000, 1),
    )
    .unwrap();
    assert_relative_eq!(trace.initial_energy, start);
    assert!(trace.best_energy <= start);
    assert_eq!(trace.final_hash, e.hash());
    assert_eq!(trace.final_energy, energy.evaluate(&e));
}

/// Separate engines fed the same inputs agree step for step.
#[test]
fn runs_are_reproducible_across_engines() {
    let energy = WeightedEnergy::default();
    let schedule = TemperatureSchedule::canonical();
    let options = AnnealOptions {
        init_grid: Some(engine(5, 77).grid().to_vec()),
        ..AnnealOptions::new(400, 5)
    };
    let mut a = LatticeEngine::new(5).unwrap();
    let mut b = LatticeEngine::new(5).unwrap();
    let ta = AnnealingExplorer::run(&mut a, &energy, &schedule, &options).unwrap();
    let tb = AnnealingExplorer::run(&mut b, &energy, &schedule, &options).unwrap();
    assert_eq!(ta, tb);
    assert_eq!(a.canonical_bytes(), b.canonical_bytes());
}

#[test]
fn recovery_with_zero_perturbation() {
    let config = RecoveryConfig {
        n: 3,
        trials: 5,
        perturb_steps: 0,
        seed: 0,
        ..RecoveryConfig::default()
    };
    let records = RecoveryExperiment::run(&config).unwrap();
    assert_eq!(records.len(), 5);
    assert!(
        records
            .iter()
            .all(|r| r.recovered && r.recovery_time == Some(0))
    );

    let summary = RecoverySummary::from_records(&records);
    assert_eq!(summary.recovery_rate, 1.0);
    assert_eq!(summary.recovery_time.map(|s| s.max), Some(0.0));
}

#[test]
fn recovery_reports_are_consistent() {
    let config = RecoveryConfig {
        n: 5,
        trials: 3,
        perturb_steps: 4,
        seed: 11,
        init_seed: Some(100),
        schedule: ScheduleConfig {
            anneal_steps: 300,
            ..ScheduleConfig::default()
        },
        ..RecoveryConfig::default()
    };
    let records = RecoveryExperiment::run(&config).unwrap();
    for r in &records {
        if r.recovered {
            assert!(r.recovery_time.is_some_and(|t| t <= 300));
            assert!(!r.landed_elsewhere);
        } else {
            assert_eq!(r.recovery_time, None);
            assert_ne!(r.final_hash, r.basin_hash);
        }
        assert!(r.energy_overshoot >= r.perturbed_energy - r.basin_energy);
    }
}

/// Config and records survive the JSON the command line emits and reads.
#[test]
fn config_and_records_through_json() {
    let config: RecoveryConfig =
        serde_json::from_str(r#"{"n": 3, "trials": 2, "schedule": {"anneal_steps": 50}}"#)
            .unwrap();
    assert_eq!(config.n, 3);
    assert_eq!(config.schedule.t0, 3.0);
    assert_eq!(config.energy, WeightedEnergy::default());
    assert_eq!(config.max_radius, 2);

    let records = RecoveryExperiment::run(&config).unwrap();
    let json = serde_json::to_string(&records).unwrap();
    let back: Vec<basin_core::RecoveryRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, records);

    let report = LatticeEngine::new(3).unwrap().audit().unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["scope"], "None");
    assert!(
        value["checks"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c == "hash_stable")
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn coordinate_bijection(n in prop::sample::select(vec![3u32, 5, 7]), raw in 0usize..343) {
        let indexer = CoordinateIndexer::new(n).unwrap();
        let i = raw % indexer.len();
        let c = indexer.index_to_coord(i).unwrap();
        prop_assert_eq!(indexer.coord_to_index(c), Some(i));
    }

    #[test]
    fn local_inverse_restores_state(
        seed in any::<u64>(),
        op in 0usize..24,
        cx in -1i32..=1, cy in -1i32..=1, cz in -1i32..=1,
        radius in 0i32..=1,
    ) {
        let mut e = engine(5, seed);
        let before = e.grid().to_vec();
        let center = Coord::new(cx, cy, cz);
        let indexer = e.lattice().indexer().clone();

        e.apply_local(op, center, radius).unwrap();
        let report = e.audit().unwrap();
        prop_assert_eq!(report.scope, LastAction::Local(basin_core::LocalOp { op_id: op, center, radius }));
        for (i, (&a, &b)) in before.iter().zip(e.grid()).enumerate() {
            let c = indexer.index_to_coord(i).unwrap();
            if c.chebyshev(center) > radius {
                prop_assert_eq!(a, b);
            }
        }

        let inv = e.inverse_local(op, center, radius).unwrap();
        e.apply_local_op(inv).unwrap();
        prop_assert_eq!(e.grid(), &before[..]);
    }

    #[test]
    fn audit_does_not_mutate(seed in any::<u64>(), steps in 0usize..6) {
        let mut e = engine(5, seed);
        e.perturb(steps, seed ^ 0x5a5a).unwrap();
        let bytes = e.canonical_bytes();
        let last = e.last_action();
        e.audit().unwrap();
        e.audit().unwrap();
        prop_assert_eq!(e.canonical_bytes(), bytes);
        prop_assert_eq!(e.last_action(), last);
    }
}
