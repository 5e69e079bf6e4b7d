//! Optional TOML settings file. Every table and key is optional; missing
//! values fall back to the core defaults.
//!
//! ```toml
//! [schedule]
//! t0 = 3.0
//! tmin = 0.05
//! anneal_steps = 3000
//!
//! [energy]
//! neighbor = 1.0
//! home = 0.2
//!
//! [recovery]
//! n = 5
//! trials = 20
//! sweep = [0, 1, 2, 4, 8]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use basin_core::{
    DEFAULT_RECOVERY_THRESHOLD, MAX_PROPOSAL_RADIUS, RecoveryConfig, ScheduleConfig, WeightedEnergy,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub schedule: ScheduleConfig,
    pub energy: WeightedEnergy,
    pub recovery: RecoverySettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoverySettings {
    pub n: u32,
    pub trials: usize,
    pub perturb_steps: usize,
    pub seed: u64,
    pub init_seed: Option<u64>,
    pub max_radius: i32,
    pub threshold: f64,
    /// Perturbation sizes for `basin sweep`.
    pub sweep: Vec<usize>,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        let base = RecoveryConfig::default();
        Self {
            n: base.n,
            trials: base.trials,
            perturb_steps: base.perturb_steps,
            seed: base.seed,
            init_seed: base.init_seed,
            max_radius: MAX_PROPOSAL_RADIUS,
            threshold: DEFAULT_RECOVERY_THRESHOLD,
            sweep: vec![0, 1, 2, 4, 8, 16],
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let settings: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            n: self.recovery.n,
            trials: self.recovery.trials,
            perturb_steps: self.recovery.perturb_steps,
            seed: self.recovery.seed,
            init_seed: self.recovery.init_seed,
            schedule: self.schedule,
            energy: self.energy,
            max_radius: self.recovery.max_radius,
            threshold: self.recovery.threshold,
        }
    }
}
