//! Error types for the simulation core
//!
//! Configuration problems are detected eagerly when runtime objects are
//! built; integration failures are reported by the adaptive driver and are
//! fatal to the run that produced them.

use thiserror::Error;

/// Invalid physical or numerical parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    /// A quantity fell outside its closed admissible range.
    #[error("{name} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64, // inclusive
        max: f64, // inclusive
    },

    /// A direction vector was (numerically) zero.
    #[error("{name} orientation vector must be non-zero")]
    ZeroOrientation { name: &'static str },

    #[error("inertia tensor must be symmetric positive definite: {0}")]
    InvalidInertia(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Check that `value` is strictly positive and finite.
    pub fn ensure_positive(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(Self::NonPositive { name, value })
        }
    }

    /// Check that `value` lies in `[min, max]`.
    pub fn ensure_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<f64, Self> {
        if value.is_finite() && (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(Self::OutOfRange { name, value, min, max })
        }
    }
}

/// Failures of the adaptive integration driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// The controlled step size dropped below the resolution of the time axis.
    #[error("step size underflow at t = {t} s (h = {h:e} s)")]
    StepSizeUnderflow {
        t: f64, // [s] where the driver gave up
        h: f64, // [s] last rejected step
    },

    /// Attempts (accepted + rejected) exhausted within one call.
    #[error("maximum number of steps ({max_steps}) exceeded at t = {t} s")]
    MaxStepsExceeded { t: f64, max_steps: u64 },

    #[error("state became non-finite at t = {t} s")]
    NonFiniteState { t: f64 },

    /// Bad arguments passed to the driver (tolerances, time span, step).
    #[error("invalid integration input: {0}")]
    InvalidInput(String),
}

/// Top-level error of a simulation run.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error("output i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv output failed: {0}")]
    Csv(#[from] csv::Error),
}
