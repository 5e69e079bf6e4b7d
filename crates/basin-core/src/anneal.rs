//! Metropolis-guided local search over a `LatticeEngine`.
//!
//! Each step proposes one uniformly random valid local rotation, applies it,
//! and keeps it if the energy does not rise or, when it does, with
//! probability exp(-ΔE / T). Rejected proposals are undone with the exact
//! inverse rotation. The engine is audited after every apply and every
//! revert; an invariant violation ends the run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::constants::MAX_PROPOSAL_RADIUS;
use crate::energy::EnergyModel;
use crate::engine::LatticeEngine;
use crate::error::Result;
use crate::moves::LocalMoveSampler;
use crate::schedule::TemperatureSchedule;
use crate::visits::VisitLog;

#[derive(Clone, Debug)]
pub struct AnnealOptions {
    pub steps: usize,
    pub seed: u64,
    /// Starting grid. `None` starts from the engine's current state.
    pub init_grid: Option<Vec<u32>>,
    /// Stop as soon as the state hash equals this value.
    pub stop_hash: Option<String>,
    pub max_radius: i32,
}

impl Default for AnnealOptions {
    fn default() -> Self {
        Self {
            steps: 0,
            seed: 0,
            init_grid: None,
            stop_hash: None,
            max_radius: MAX_PROPOSAL_RADIUS,
        }
    }
}

impl AnnealOptions {
    pub fn new(steps: usize, seed: u64) -> Self {
        Self {
            steps,
            seed,
            ..Self::default()
        }
    }
}

/// One proposed step, recorded after the accept/reject decision.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnealStep {
    pub energy: f64,
    pub accepted: bool,
    /// Temperature the accept/reject decision was made at.
    pub temperature: f64,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnealTrace {
    pub steps: Vec<AnnealStep>,
    pub steps_requested: usize,
    pub steps_run: usize,
    pub initial_hash: String,
    pub initial_energy: f64,
    pub final_hash: String,
    pub final_energy: f64,
    pub final_grid: Vec<u32>,
    pub best_energy: f64,
    pub best_step: usize,
    pub last_improve_step: usize,
    /// Last step at which the recorded energy differed from the previous one.
    pub last_change_step: usize,
    pub accepted: usize,
    pub proposed: usize,
    pub acceptance_rate: f64,
    /// Distinct hashes seen, including the initial state.
    pub unique_state_count: usize,
    pub first_repeat_step: Option<usize>,
    pub repeat_visits: usize,
    /// Set when `stop_hash` was hit; 0 if the initial state already matched.
    pub stopped_step: Option<usize>,
}

impl AnnealTrace {
    /// Initial energy followed by the energy after each step.
    pub fn energies(&self) -> impl Iterator<Item = f64> + '_ {
        std::iter::once(self.initial_energy).chain(self.steps.iter().map(|s| s.energy))
    }

    pub fn max_energy(&self) -> f64 {
        self.energies().fold(f64::NEG_INFINITY, f64::max)
    }
}

pub struct AnnealingExplorer;

impl AnnealingExplorer {
    /// Run the annealer on `engine`, leaving it in the state reached after
    /// the last accepted move. Identical inputs reproduce the trace exactly.
    pub fn run<E: EnergyModel + ?Sized>(
        engine: &mut LatticeEngine,
        energy: &E,
        schedule: &TemperatureSchedule,
        options: &AnnealOptions,
    ) -> Result<AnnealTrace> {
        schedule.validate()?;
        match &options.init_grid {
            Some(grid) => {
                engine.load_grid(grid)?;
            }
            None => {
                engine.audit()?;
            }
        }

        let sampler = LocalMoveSampler::new(engine.lattice(), options.max_radius)?;
        let mut rng = StdRng::seed_from_u64(options.seed);

        let initial_hash = engine.hash();
        let initial_energy = energy.evaluate(engine);
        let mut visits = VisitLog::new(&initial_hash);

        let mut run = RunState {
            current: initial_energy,
            best: initial_energy,
            best_step: 0,
            last_improve_step: 0,
            last_change_step: 0,
            accepted: 0,
            steps: Vec::with_capacity(options.steps),
            stopped_step: None,
        };

        if options.stop_hash.as_deref() == Some(initial_hash.as_str()) {
            run.stopped_step = Some(0);
        } else {
            for step in 1..=options.steps {
                let t = schedule.temperature(step);

                let accepted = Self::step(engine, energy, &sampler, &mut rng, t, &mut run.current)?;
                let previous = run.steps.last().map_or(initial_energy, |s| s.energy);
                if accepted {
                    run.accepted += 1;
                    if run.current < run.best {
                        run.best = run.current;
                        run.best_step = step;
                        run.last_improve_step = step;
                    }
                }
                if run.current != previous {
                    run.last_change_step = step;
                }

                let hash = engine.hash();
                visits.record(&hash, step);
                let stop = options.stop_hash.as_deref() == Some(hash.as_str());
                tracing::trace!(step, t, energy = run.current, accepted, "anneal step");
                run.steps.push(AnnealStep {
                    energy: run.current,
                    accepted,
                    temperature: t,
                    hash,
                });
                if stop {
                    run.stopped_step = Some(step);
                    break;
                }
            }
        }

        let proposed = run.steps.len();
        let trace = AnnealTrace {
            steps_requested: options.steps,
            steps_run: proposed,
            initial_hash,
            initial_energy,
            final_hash: engine.hash(),
            final_energy: run.current,
            final_grid: engine.grid().to_vec(),
            best_energy: run.best,
            best_step: run.best_step,
            last_improve_step: run.last_improve_step,
            last_change_step: run.last_change_step,
            accepted: run.accepted,
            proposed,
            acceptance_rate: if proposed == 0 {
                0.0
            } else {
                run.accepted as f64 / proposed as f64
            },
            unique_state_count: visits.unique(),
            first_repeat_step: visits.first_repeat_step(),
            repeat_visits: visits.repeats(),
            stopped_step: run.stopped_step,
            steps: run.steps,
        };

        tracing::debug!(
            n = engine.n(),
            seed = options.seed,
            steps_run = trace.steps_run,
            best = trace.best_energy,
            final_energy = trace.final_energy,
            acceptance = trace.acceptance_rate,
            stopped = ?trace.stopped_step,
            "anneal finished"
        );
        Ok(trace)
    }

    /// Propose, evaluate, decide, and revert on rejection, all in one step.
    /// Updates `current` to the energy after the decision.
    fn step<E: EnergyModel + ?Sized>(
        engine: &mut LatticeEngine,
        energy: &E,
        sampler: &LocalMoveSampler,
        rng: &mut StdRng,
        t: f64,
        current: &mut f64,
    ) -> Result<bool> {
        let mv = sampler.sample(rng);
        let before = *current;

        engine.apply_local_op(mv)?;
        engine.audit()?;

        let after = energy.evaluate(engine);
        let delta = after - before;
        let accept = if delta <= 0.0 {
            true
        } else if t == 0.0 {
            false
        } else {
            rng.random::<f64>() < (-delta / t).exp()
        };

        if accept {
            *current = after;
        } else {
            let inverse = engine.inverse_local(mv.op_id, mv.center, mv.radius)?;
            engine.apply_local_op(inverse)?;
            engine.audit()?;
        }
        Ok(accept)
    }
}

struct RunState {
    current: f64,
    best: f64,
    best_step: usize,
    last_improve_step: usize,
    last_change_step: usize,
    accepted: usize,
    steps: Vec<AnnealStep>,
    stopped_step: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::WeightedEnergy;
    use crate::error::LatticeError;

    fn schedule() -> TemperatureSchedule {
        TemperatureSchedule::exponential(3.0, 0.05, 200).unwrap()
    }

    #[test]
    fn test_zero_steps() {
        let mut e = LatticeEngine::new(5).unwrap();
        e.randomize(3);
        let h = e.hash();
        let energy = WeightedEnergy::default();
        let e0 = energy.evaluate(&e);

        let trace =
            AnnealingExplorer::run(&mut e, &energy, &schedule(), &AnnealOptions::new(0, 1)).unwrap();
        assert!(trace.steps.is_empty());
        assert_eq!(trace.best_energy, e0);
        assert_eq!(trace.best_step, 0);
        assert_eq!(trace.final_hash, h);
        assert_eq!(trace.initial_hash, h);
        assert_eq!(trace.acceptance_rate, 0.0);
        assert_eq!(trace.unique_state_count, 1);
        assert_eq!(trace.stopped_step, None);
    }

    #[test]
    fn test_trace_consistency() {
        let mut e = LatticeEngine::new(5).unwrap();
        e.randomize(21);
        let energy = WeightedEnergy::default();
        let trace =
            AnnealingExplorer::run(&mut e, &energy, &schedule(), &AnnealOptions::new(200, 4)).unwrap();

        assert_eq!(trace.steps.len(), 200);
        assert_eq!(trace.proposed, 200);
        assert_eq!(trace.accepted, trace.steps.iter().filter(|s| s.accepted).count());
        assert_eq!(trace.final_hash, e.hash());
        assert_eq!(trace.final_hash, trace.steps.last().unwrap().hash);
        assert_eq!(trace.final_grid, e.grid());
        assert_eq!(trace.final_energy, energy.evaluate(&e));
        assert!(trace.best_energy <= trace.initial_energy);
        assert!(trace.energies().all(|x| x >= trace.best_energy));
        assert!(trace.unique_state_count >= 1 && trace.unique_state_count <= 201);
        for (i, step) in trace.steps.iter().enumerate() {
            assert_eq!(step.temperature, schedule().temperature(i + 1));
        }
        assert_eq!(trace.steps[199].temperature, 0.05);
    }

    #[test]
    fn test_rejected_steps_keep_state() {
        let mut e = LatticeEngine::new(5).unwrap();
        e.randomize(8);
        let energy = WeightedEnergy::default();
        let trace =
            AnnealingExplorer::run(&mut e, &energy, &schedule(), &AnnealOptions::new(150, 2)).unwrap();
        let mut prev_hash = trace.initial_hash.clone();
        let mut prev_energy = trace.initial_energy;
        for s in &trace.steps {
            if !s.accepted {
                assert_eq!(s.hash, prev_hash);
                assert_eq!(s.energy, prev_energy);
            }
            prev_hash = s.hash.clone();
            prev_energy = s.energy;
        }
    }

    #[test]
    fn test_zero_temperature_never_climbs() {
        let mut e = LatticeEngine::new(5).unwrap();
        e.randomize(5);
        let energy = WeightedEnergy::default();
        let cold = TemperatureSchedule::constant(0.0).unwrap();
        let trace =
            AnnealingExplorer::run(&mut e, &energy, &cold, &AnnealOptions::new(100, 6)).unwrap();
        let energies: Vec<f64> = trace.energies().collect();
        assert!(energies.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_deterministic() {
        let energy = WeightedEnergy::default();
        let run = || {
            let mut e = LatticeEngine::new(5).unwrap();
            e.randomize(99);
            AnnealingExplorer::run(&mut e, &energy, &schedule(), &AnnealOptions::new(120, 17))
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_init_grid_overrides_state() {
        let energy = WeightedEnergy::default();
        let mut seeded = LatticeEngine::new(3).unwrap();
        seeded.randomize(12);
        let grid = seeded.grid().to_vec();

        let mut e = LatticeEngine::new(3).unwrap();
        let options = AnnealOptions {
            init_grid: Some(grid.clone()),
            ..AnnealOptions::new(0, 0)
        };
        let trace = AnnealingExplorer::run(&mut e, &energy, &schedule(), &options).unwrap();
        assert_eq!(trace.initial_hash, seeded.hash());
        assert_eq!(e.grid(), grid.as_slice());
    }

    #[test]
    fn test_stop_hash_at_start() {
        let mut e = LatticeEngine::new(3).unwrap();
        let h = e.hash();
        let options = AnnealOptions {
            stop_hash: Some(h.clone()),
            ..AnnealOptions::new(500, 1)
        };
        let trace =
            AnnealingExplorer::run(&mut e, &WeightedEnergy::default(), &schedule(), &options)
                .unwrap();
        assert_eq!(trace.stopped_step, Some(0));
        assert_eq!(trace.steps_run, 0);
        assert_eq!(trace.final_hash, h);
    }

    #[test]
    fn test_stop_hash_mid_run() {
        let energy = WeightedEnergy::default();
        let mut probe = LatticeEngine::new(3).unwrap();
        probe.randomize(4);
        let start = probe.grid().to_vec();
        let full = AnnealingExplorer::run(
            &mut probe,
            &energy,
            &schedule(),
            &AnnealOptions::new(100, 9),
        )
        .unwrap();
        // pick a state first reached at some step > 0
        let (target_step, target) = full
            .steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.hash != full.initial_hash)
            .map(|(i, s)| (i + 1, s.hash.clone()))
            .unwrap();

        let mut e = LatticeEngine::new(3).unwrap();
        let options = AnnealOptions {
            init_grid: Some(start),
            stop_hash: Some(target.clone()),
            ..AnnealOptions::new(100, 9)
        };
        let stopped = AnnealingExplorer::run(&mut e, &energy, &schedule(), &options).unwrap();
        assert_eq!(stopped.stopped_step, Some(target_step));
        assert_eq!(stopped.steps_run, target_step);
        assert_eq!(stopped.final_hash, target);
        assert_eq!(stopped.steps[..], full.steps[..target_step]);
    }

    #[test]
    fn test_negative_temperature_is_config_error() {
        let mut e = LatticeEngine::new(3).unwrap();
        let bad = TemperatureSchedule::Constant { t: -1.0 };
        let before = e.hash();
        let err = AnnealingExplorer::run(
            &mut e,
            &WeightedEnergy::default(),
            &bad,
            &AnnealOptions::new(10, 0),
        )
        .unwrap_err();
        assert!(matches!(err, LatticeError::Config(_)));
        assert_eq!(e.hash(), before);
    }

    #[test]
    fn test_bad_schedule_rejected_before_init_grid_loads() {
        let mut e = LatticeEngine::new(3).unwrap();
        let before = e.hash();
        let mut shuffled = LatticeEngine::new(3).unwrap();
        shuffled.randomize(4);
        let options = AnnealOptions {
            init_grid: Some(shuffled.grid().to_vec()),
            ..AnnealOptions::new(10, 0)
        };
        let err = AnnealingExplorer::run(
            &mut e,
            &WeightedEnergy::default(),
            &TemperatureSchedule::Constant { t: -1.0 },
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, LatticeError::Config(_)));
        assert_eq!(e.hash(), before);
        assert_ne!(shuffled.hash(), before);
    }

    #[test]
    fn test_bad_init_grid_rejected() {
        let mut e = LatticeEngine::new(3).unwrap();
        let options = AnnealOptions {
            init_grid: Some(vec![0; 27]),
            ..AnnealOptions::new(10, 0)
        };
        let err = AnnealingExplorer::run(&mut e, &WeightedEnergy::default(), &schedule(), &options)
            .unwrap_err();
        assert!(matches!(err, LatticeError::Config(_)));
    }
}
