use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ANNEAL_STEPS, DEFAULT_T0, DEFAULT_TMIN};
use crate::error::{LatticeError, Result};

/// Exponential cooling parameters, as read from configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub t0: f64,
    pub tmin: f64,
    pub anneal_steps: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            t0: DEFAULT_T0,
            tmin: DEFAULT_TMIN,
            anneal_steps: DEFAULT_ANNEAL_STEPS,
        }
    }
}

impl ScheduleConfig {
    pub fn build(&self) -> Result<TemperatureSchedule> {
        TemperatureSchedule::exponential(self.t0, self.tmin, self.anneal_steps)
    }
}

/// Temperature as a function of the 1-based step number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TemperatureSchedule {
    Constant { t: f64 },
    /// Entry `i` is the temperature at step `i`; steps past the end use the last entry.
    Table { temps: Vec<f64> },
    /// `T(t) = t0 * ratio^t`, pinned to `t0` at t <= 0 and `tmin` at t >= steps.
    Exponential {
        t0: f64,
        tmin: f64,
        steps: usize,
        ratio: f64,
    },
}

impl TemperatureSchedule {
    pub fn constant(t: f64) -> Result<Self> {
        if !(t >= 0.0) {
            return Err(LatticeError::Config(format!("temperature must be >= 0, got {t}")));
        }
        Ok(Self::Constant { t })
    }

    pub fn table(temps: Vec<f64>) -> Result<Self> {
        if temps.is_empty() {
            return Err(LatticeError::Config("temperature table is empty".into()));
        }
        if let Some(t) = temps.iter().find(|t| !(**t >= 0.0)) {
            return Err(LatticeError::Config(format!("temperature must be >= 0, got {t}")));
        }
        Ok(Self::Table { temps })
    }

    /// Exponential cooling from `t0` to `tmin` over `steps` steps.
    pub fn exponential(t0: f64, tmin: f64, steps: usize) -> Result<Self> {
        if steps == 0 {
            return Err(LatticeError::Config("schedule steps must be > 0".into()));
        }
        if !(t0 >= 0.0 && tmin >= 0.0) {
            return Err(LatticeError::Config(format!(
                "temperatures must be >= 0, got t0={t0} tmin={tmin}"
            )));
        }
        if tmin > t0 {
            return Err(LatticeError::Config(format!(
                "tmin ({tmin}) must be <= t0 ({t0})"
            )));
        }
        let ratio = if tmin == 0.0 || t0 == 0.0 {
            0.0
        } else {
            (tmin / t0).powf(1.0 / steps as f64)
        };
        Ok(Self::Exponential {
            t0,
            tmin,
            steps,
            ratio,
        })
    }

    /// The canonical schedule: 3.0 → 0.05 over 3000 steps.
    pub fn canonical() -> Self {
        Self::Exponential {
            t0: DEFAULT_T0,
            tmin: DEFAULT_TMIN,
            steps: DEFAULT_ANNEAL_STEPS,
            ratio: (DEFAULT_TMIN / DEFAULT_T0).powf(1.0 / DEFAULT_ANNEAL_STEPS as f64),
        }
    }

    /// Re-check the invariants the constructors enforce, for schedules that
    /// were built literally or deserialized.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Constant { t } => Self::constant(*t).map(|_| ()),
            Self::Table { temps } => {
                if temps.is_empty() {
                    return Err(LatticeError::Config("temperature table is empty".into()));
                }
                match temps.iter().find(|t| !(**t >= 0.0)) {
                    Some(t) => Err(LatticeError::Config(format!(
                        "temperature must be >= 0, got {t}"
                    ))),
                    None => Ok(()),
                }
            }
            Self::Exponential {
                t0,
                tmin,
                steps,
                ratio,
            } => {
                Self::exponential(*t0, *tmin, *steps)?;
                if !(*ratio >= 0.0 && ratio.is_finite()) {
                    return Err(LatticeError::Config(format!(
                        "cooling ratio must be finite and >= 0, got {ratio}"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn temperature(&self, step: usize) -> f64 {
        match self {
            Self::Constant { t } => *t,
            Self::Table { temps } => temps
                .get(step)
                .or(temps.last())
                .copied()
                .unwrap_or(0.0),
            Self::Exponential {
                t0,
                tmin,
                steps,
                ratio,
            } => {
                if step == 0 {
                    *t0
                } else if step >= *steps {
                    *tmin
                } else {
                    t0 * ratio.powi(step as i32)
                }
            }
        }
    }
}

impl Default for TemperatureSchedule {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exponential_endpoints() {
        let s = TemperatureSchedule::exponential(3.0, 0.05, 3000).unwrap();
        assert_relative_eq!(s.temperature(0), 3.0);
        assert_relative_eq!(s.temperature(3000), 0.05);
        assert_relative_eq!(s.temperature(5000), 0.05);
        assert_relative_eq!(s.temperature(1500), (3.0f64 * 0.05).sqrt(), max_relative = 1e-9);
    }

    #[test]
    fn test_exponential_is_non_increasing() {
        let s = TemperatureSchedule::canonical();
        let temps: Vec<f64> = (0..=3001).map(|t| s.temperature(t)).collect();
        assert!(temps.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(s, ScheduleConfig::default().build().unwrap());
    }

    #[test]
    fn test_exponential_to_zero() {
        let s = TemperatureSchedule::exponential(2.0, 0.0, 10).unwrap();
        assert_eq!(s.temperature(0), 2.0);
        assert_eq!(s.temperature(1), 0.0);
        assert_eq!(s.temperature(10), 0.0);
    }

    #[test]
    fn test_exponential_validation() {
        assert!(TemperatureSchedule::exponential(3.0, 0.05, 0).is_err());
        assert!(TemperatureSchedule::exponential(-1.0, 0.05, 10).is_err());
        assert!(TemperatureSchedule::exponential(1.0, 2.0, 10).is_err());
        assert!(TemperatureSchedule::exponential(f64::NAN, 0.0, 10).is_err());
    }

    #[test]
    fn test_table_clamps_to_last() {
        let s = TemperatureSchedule::table(vec![5.0, 4.0, 1.0]).unwrap();
        assert_eq!(s.temperature(1), 4.0);
        assert_eq!(s.temperature(100), 1.0);
        assert!(TemperatureSchedule::table(vec![]).is_err());
        assert!(TemperatureSchedule::table(vec![1.0, -0.5]).is_err());
    }

    #[test]
    fn test_validate_literal_schedules() {
        assert!(TemperatureSchedule::canonical().validate().is_ok());
        assert!(TemperatureSchedule::Constant { t: -1.0 }.validate().is_err());
        assert!(TemperatureSchedule::Table { temps: vec![] }.validate().is_err());
        assert!(TemperatureSchedule::Table { temps: vec![1.0, f64::NAN] }.validate().is_err());
        let bad_ratio = TemperatureSchedule::Exponential {
            t0: 3.0,
            tmin: 0.05,
            steps: 10,
            ratio: -0.5,
        };
        assert!(bad_ratio.validate().is_err());
    }

    #[test]
    fn test_constant() {
        assert_eq!(TemperatureSchedule::constant(0.7).unwrap().temperature(42), 0.7);
        assert!(TemperatureSchedule::constant(-0.1).is_err());
    }
}
