//! Numerical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - absolute start and end time,
//! - initial trial step,
//! - error tolerances for the adaptive integrator

use crate::configuration::config::ParametersConfig;
use crate::simulation::error::ConfigError;
use crate::simulation::integrator::Tolerances;

#[derive(Debug, Clone)]
pub struct Parameters {
    pub t_start: f64, // absolute start time [s]
    pub t_end: f64, // absolute end time [s]
    pub dt_initial: f64, // first trial step [s]
    pub tolerances: Tolerances, // absolute / relative error tolerance
}

impl Parameters {
    pub fn from_config(cfg: &ParametersConfig) -> Result<Self, ConfigError> {
        if !cfg.t_start.is_finite() || !cfg.t_end.is_finite() || cfg.t_end < cfg.t_start {
            return Err(ConfigError::Invalid(format!(
                "time span [{}, {}] is not a valid interval",
                cfg.t_start, cfg.t_end
            )));
        }
        ConfigError::ensure_positive("dt_initial", cfg.dt_initial)?;
        let tolerances = Tolerances {
            absolute: cfg.absolute_error,
            relative: cfg.relative_error,
        };
        tolerances
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            t_start: cfg.t_start,
            t_end: cfg.t_end,
            dt_initial: cfg.dt_initial,
            tolerances,
        })
    }

    pub fn duration(&self) -> f64 {
        self.t_end - self.t_start
    }
}
