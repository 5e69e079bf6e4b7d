//! Basin recovery protocol: anneal into a basin, knock the state out with
//! unguided local moves, re-anneal and check whether the same basin hash
//! comes back within the annealing window.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::anneal::{AnnealOptions, AnnealingExplorer};
use crate::constants::{
    BASIN_SEED_OFFSET, DEFAULT_RECOVERY_THRESHOLD, MAX_PROPOSAL_RADIUS, PERTURB_SEED_OFFSET,
    REANNEAL_SEED_OFFSET, SHORT_HASH_LEN,
};
use crate::energy::{EnergyModel, WeightedEnergy};
use crate::engine::LatticeEngine;
use crate::error::{LatticeError, Result};
use crate::hash::short_hash;
use crate::lattice::Lattice;
use crate::schedule::ScheduleConfig;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub n: u32,
    pub trials: usize,
    pub perturb_steps: usize,
    pub seed: u64,
    /// When set, trial `t` starts from a grid shuffled with `init_seed + t`;
    /// otherwise from the identity.
    pub init_seed: Option<u64>,
    pub schedule: ScheduleConfig,
    pub energy: WeightedEnergy,
    /// Largest local-move radius, for both annealing proposals and perturbation.
    pub max_radius: i32,
    /// Minimum recovery rate for the stability radius.
    pub threshold: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            n: 5,
            trials: 10,
            perturb_steps: 0,
            seed: 0,
            init_seed: None,
            schedule: ScheduleConfig::default(),
            energy: WeightedEnergy::default(),
            max_radius: MAX_PROPOSAL_RADIUS,
            threshold: DEFAULT_RECOVERY_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub trial: usize,
    pub basin_hash: String,
    pub basin_energy: f64,
    pub perturb_steps: usize,
    pub perturbed_energy: f64,
    pub recovered: bool,
    /// Steps until the basin hash was re-hit; only set when recovered.
    pub recovery_time: Option<usize>,
    pub stopped_step: Option<usize>,
    /// Highest energy seen during the re-anneal minus the basin energy.
    pub energy_overshoot: f64,
    pub final_hash: String,
    pub final_energy: f64,
    /// Not recovered and ended in a different state.
    pub landed_elsewhere: bool,
}

pub struct RecoveryExperiment;

impl RecoveryExperiment {
    pub fn run(config: &RecoveryConfig) -> Result<Vec<RecoveryRecord>> {
        if config.trials == 0 {
            return Err(LatticeError::Config("trials must be >= 1".into()));
        }
        let lattice = Lattice::shared(config.n)?;
        let schedule = config.schedule.build()?;

        (0..config.trials)
            .map(|trial| -> Result<RecoveryRecord> {
                let t = trial as u64;
                let mut engine = LatticeEngine::with_lattice(lattice.clone());
                if let Some(init_seed) = config.init_seed {
                    engine.randomize(init_seed.wrapping_add(t));
                }

                let basin = AnnealingExplorer::run(
                    &mut engine,
                    &config.energy,
                    &schedule,
                    &AnnealOptions {
                        max_radius: config.max_radius,
                        ..AnnealOptions::new(
                            config.schedule.anneal_steps,
                            config.seed.wrapping_add(BASIN_SEED_OFFSET + t),
                        )
                    },
                )?;

                engine.perturb_with_radius(
                    config.perturb_steps,
                    config.seed.wrapping_add(PERTURB_SEED_OFFSET + t),
                    config.max_radius,
                )?;
                let perturbed_energy = config.energy.evaluate(&engine);

                let reanneal = AnnealingExplorer::run(
                    &mut engine,
                    &config.energy,
                    &schedule,
                    &AnnealOptions {
                        stop_hash: Some(basin.final_hash.clone()),
                        max_radius: config.max_radius,
                        ..AnnealOptions::new(
                            config.schedule.anneal_steps,
                            config.seed.wrapping_add(REANNEAL_SEED_OFFSET + t),
                        )
                    },
                )?;

                let recovered =
                    reanneal.stopped_step.is_some() || reanneal.final_hash == basin.final_hash;
                let record = RecoveryRecord {
                    trial,
                    basin_energy: basin.final_energy,
                    perturb_steps: config.perturb_steps,
                    perturbed_energy,
                    recovered,
                    recovery_time: if recovered { reanneal.stopped_step } else { None },
                    stopped_step: reanneal.stopped_step,
                    energy_overshoot: reanneal.max_energy() - basin.final_energy,
                    landed_elsewhere: !recovered && reanneal.final_hash != basin.final_hash,
                    final_energy: reanneal.final_energy,
                    final_hash: reanneal.final_hash,
                    basin_hash: basin.final_hash,
                };
                tracing::debug!(
                    trial,
                    basin = short_hash(&record.basin_hash, SHORT_HASH_LEN),
                    recovered,
                    recovery_time = ?record.recovery_time,
                    overshoot = record.energy_overshoot,
                    "recovery trial finished"
                );
                Ok(record)
            })
            .collect()
    }

    /// Run the protocol once per perturbation size.
    pub fn sweep(config: &RecoveryConfig, perturb_values: &[usize]) -> Result<Vec<SweepPoint>> {
        perturb_values
            .iter()
            .map(|&perturb_steps| -> Result<SweepPoint> {
                let records = Self::run(&RecoveryConfig {
                    perturb_steps,
                    ..config.clone()
                })?;
                Ok(SweepPoint {
                    perturb_steps,
                    recovery_rate: recovery_rate(&records),
                    records,
                })
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepPoint {
    pub perturb_steps: usize,
    pub recovery_rate: f64,
    pub records: Vec<RecoveryRecord>,
}

/// Fraction of trials that recovered. 0 for no trials.
pub fn recovery_rate(records: &[RecoveryRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().filter(|r| r.recovered).count() as f64 / records.len() as f64
}

/// Largest perturbation size whose recovery rate is at least `threshold`.
pub fn stability_radius(points: &[SweepPoint], threshold: f64) -> Option<usize> {
    points
        .iter()
        .filter(|p| p.recovery_rate >= threshold)
        .map(|p| p.perturb_steps)
        .max()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Stats {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            n: sorted.len(),
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median: median_sorted(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Aggregate view of one recovery run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecoverySummary {
    pub trials: usize,
    pub recovered: usize,
    pub recovery_rate: f64,
    pub recovery_time: Option<Stats>,
    pub final_minus_basin: Option<Stats>,
    pub perturbed_minus_basin: Option<Stats>,
    pub overshoot: Option<Stats>,
    /// "basin->final" short-hash pairs and how often each occurred.
    pub basin_changes: BTreeMap<String, usize>,
}

impl RecoverySummary {
    pub fn from_records(records: &[RecoveryRecord]) -> Self {
        let collect = |f: fn(&RecoveryRecord) -> f64| -> Vec<f64> { records.iter().map(f).collect() };
        let times: Vec<f64> = records
            .iter()
            .filter_map(|r| r.recovery_time.map(|t| t as f64))
            .collect();

        let mut basin_changes: BTreeMap<String, usize> = BTreeMap::new();
        for r in records {
            let key = format!(
                "{}->{}",
                short_hash(&r.basin_hash, SHORT_HASH_LEN),
                short_hash(&r.final_hash, SHORT_HASH_LEN)
            );
            *basin_changes.entry(key).or_default() += 1;
        }

        Self {
            trials: records.len(),
            recovered: records.iter().filter(|r| r.recovered).count(),
            recovery_rate: recovery_rate(records),
            recovery_time: Stats::from_values(&times),
            final_minus_basin: Stats::from_values(&collect(|r| r.final_energy - r.basin_energy)),
            perturbed_minus_basin: Stats::from_values(&collect(|r| {
                r.perturbed_energy - r.basin_energy
            })),
            overshoot: Stats::from_values(&collect(|r| r.energy_overshoot)),
            basin_changes,
        }
    }
}
