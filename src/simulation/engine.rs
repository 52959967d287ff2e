//! High-level runtime engine settings
//!
//! Selects the embedded Runge-Kutta pair, whether the run is split into
//! checkpoint intervals, and the step budget used when building and
//! running a `Scenario`

use crate::configuration::config::{EngineConfig, IntegratorConfig};
use crate::simulation::error::ConfigError;
use crate::simulation::integrator::{IntegrationMethod, DEFAULT_MAX_STEPS};

/// Shortest checkpoint interval accepted [s]
pub const MIN_CHECKPOINT_INTERVAL: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct Engine {
    pub method: IntegrationMethod, // dopri5 or rkf78
    pub checkpoint_interval: Option<f64>, // None = one continuous integration
    pub max_steps: u64, // step attempts per integration call
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            method: IntegrationMethod::DormandPrince54,
            checkpoint_interval: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl Engine {
    pub fn from_config(cfg: &EngineConfig) -> Result<Self, ConfigError> {
        let method = match (cfg.higher_order, cfg.integrator) {
            (true, _) | (false, IntegratorConfig::Fehlberg78) => IntegrationMethod::Fehlberg78,
            (false, IntegratorConfig::DormandPrince54) => IntegrationMethod::DormandPrince54,
        };
        if let Some(interval) = cfg.checkpoint_interval {
            ConfigError::ensure_range("checkpoint interval", interval, MIN_CHECKPOINT_INTERVAL, f64::MAX)?;
        }
        let max_steps = cfg.max_steps.unwrap_or(DEFAULT_MAX_STEPS);
        if max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be at least 1".into()));
        }
        Ok(Self {
            method,
            checkpoint_interval: cfg.checkpoint_interval,
            max_steps,
        })
    }
}
