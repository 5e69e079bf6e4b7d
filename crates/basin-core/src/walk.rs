//! Unguided random walks over the reachable state space, used to gauge how
//! quickly the rotation moves revisit states.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_PROPOSAL_RADIUS;
use crate::engine::LatticeEngine;
use crate::error::Result;
use crate::moves::LocalMoveSampler;
use crate::visits::VisitLog;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkMode {
    /// Whole-lattice rotations only.
    #[default]
    Global,
    /// Fair coin between a global rotation and a random local one.
    Mixed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WalkSummary {
    pub mode: WalkMode,
    pub steps: usize,
    pub seed: u64,
    pub initial_hash: String,
    pub final_hash: String,
    pub global_moves: usize,
    pub local_moves: usize,
    pub unique_states: usize,
    pub repeat_visits: usize,
    pub first_repeat_step: Option<usize>,
    pub cycle_length: Option<usize>,
    pub visit_entropy_bits: f64,
}

pub struct RandomWalk;

impl RandomWalk {
    /// Walk `steps` moves from the engine's current state, auditing after each.
    pub fn run(
        engine: &mut LatticeEngine,
        mode: WalkMode,
        steps: usize,
        seed: u64,
    ) -> Result<WalkSummary> {
        let initial_hash = engine.audit()?.hash;
        let sampler = LocalMoveSampler::new(engine.lattice(), MAX_PROPOSAL_RADIUS)?;
        let op_count = engine.lattice().rotations().len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut visits = VisitLog::new(&initial_hash);
        let (mut global_moves, mut local_moves) = (0, 0);

        for step in 1..=steps {
            let local = match mode {
                WalkMode::Global => false,
                WalkMode::Mixed => rng.random::<f64>() >= 0.5,
            };
            if local {
                engine.apply_local_op(sampler.sample(&mut rng))?;
                local_moves += 1;
            } else {
                engine.apply(rng.random_range(0..op_count))?;
                global_moves += 1;
            }
            let report = engine.audit()?;
            visits.record(&report.hash, step);
        }

        let summary = WalkSummary {
            mode,
            steps,
            seed,
            initial_hash,
            final_hash: engine.hash(),
            global_moves,
            local_moves,
            unique_states: visits.unique(),
            repeat_visits: visits.repeats(),
            first_repeat_step: visits.first_repeat_step(),
            cycle_length: visits.cycle_length(),
            visit_entropy_bits: visits.entropy_bits(),
        };
        tracing::debug!(
            ?mode,
            steps,
            unique = summary.unique_states,
            first_repeat = ?summary.first_repeat_step,
            "random walk finished"
        );
        Ok(summary)
    }
}
