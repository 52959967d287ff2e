//! Configuration types for loading simulation scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! simulation scenario. A scenario consists of:
//!
//! - [`EngineConfig`]      – integrator choice, checkpointing, step budget
//! - [`ParametersConfig`]  – time span, initial step and error tolerances
//! - [`SpacecraftConfig`]  – mass/shape, permanent magnet, hysteresis rods
//! - [`OrbitConfig`]       – initial Keplerian elements
//! - [`EnvironmentConfig`] – field/gravity model
//! - [`InitialConfig`]     – initial attitude, spin and rod magnetizations
//! - [`ObserverConfig`]    – CSV column groups
//! - [`ScenarioConfig`]    – top-level wrapper used to load a scenario from YAML
//!
//! Every section and field is optional; missing values fall back to the
//! default 1U-class scenario.
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   integrator: "dopri5"        # or "rkf78"
//!   checkpoint_interval: 600.0  # optional, seconds (>= 1)
//!
//! parameters:
//!   t_end: 86400.0
//!   dt_initial: 0.1
//!   absolute_error: 1.0e-6
//!   relative_error: 1.0e-6
//!
//! spacecraft:
//!   mass_kg: 1.3
//!   dimensions_m: [0.1, 0.1, 0.1]
//!   magnet:
//!     grade: "N35"
//!     length_m: 0.05
//!     diameter_m: 0.01
//!     orientation: [0.0, 0.0, 1.0]
//!   rods:
//!     volume_m3: 7.85e-6
//!     orientations: [[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0]]
//!     hysteresis:
//!       material: "hymu80"
//!
//! orbit:
//!   altitude_km: 650.0
//!   inclination_deg: 51.0
//!
//! environment:
//!   model: "dipole"
//!   start_year: 2025.0
//!
//! initial:
//!   angular_velocity: [0.1, -0.05, 0.08]
//! ```
//!
//! The engine then maps this configuration into its internal runtime scenario
//! representation (see `simulation::scenario`).

use serde::Deserialize;
use tracing::info;

use crate::simulation::constants::{EARTH_EQUATORIAL_RADIUS_M, KM_TO_M};
use crate::simulation::hysteresis::JaParameters;

/// Which embedded Runge-Kutta pair is used by the engine
/// `integrator: "dopri5"` or `integrator: "rkf78"`
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegratorConfig {
    #[default]
    #[serde(rename = "dopri5")] // Dormand-Prince 5(4), 7 stages, the everyday choice
    DormandPrince54,

    #[serde(rename = "rkf78")] // Runge-Kutta-Fehlberg 7(8), 13 stages, for tight tolerances
    Fehlberg78,
}

/// High-level engine configuration
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub integrator: IntegratorConfig,     // Embedded RK pair
    pub higher_order: bool,               // `true` forces rkf78 regardless of `integrator`
    pub checkpoint_interval: Option<f64>, // Advance in fixed intervals, renormalizing and clamping between them [s]
    pub max_steps: Option<u64>,           // Step attempt budget per integration call
}

/// Numerical parameters for a scenario
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ParametersConfig {
    pub t_start: f64,        // absolute start time [s] after the field epoch
    pub t_end: f64,          // absolute end time [s]
    pub dt_initial: f64,     // first trial step [s]
    pub absolute_error: f64, // absolute error tolerance
    pub relative_error: f64, // relative error tolerance
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            t_start: 0.0,
            t_end: 2.0 * 7.0 * 24.0 * 3600.0, // two weeks
            dt_initial: 0.1,
            absolute_error: 1e-6,
            relative_error: 1e-6,
        }
    }
}

/// Commercial NdFeB grades and their nominal remanence.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnetGrade {
    N35,
    N42,
    N52,
    N35SH,
}

impl MagnetGrade {
    /// Nominal remanence [T]
    pub fn remanence(&self) -> f64 {
        match self {
            Self::N35 => 1.21,
            Self::N42 => 1.32,
            Self::N52 => 1.45,
            Self::N35SH => 1.19,
        }
    }
}

/// Cylindrical permanent magnet
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MagnetConfig {
    pub grade: Option<MagnetGrade>,   // overrides `remanence_t` when given
    pub remanence_t: f64,             // [T]
    pub length_m: f64,                // [m]
    pub diameter_m: f64,              // [m]
    pub orientation: [f64; 3],        // body frame, normalized on use
    pub temperature_c: Option<f64>,   // operating temperature, scales remanence
}

impl Default for MagnetConfig {
    fn default() -> Self {
        Self {
            grade: None,
            remanence_t: MagnetGrade::N35.remanence(),
            length_m: 0.05,
            diameter_m: 0.01,
            orientation: [0.0, 0.0, 1.0],
            temperature_c: None,
        }
    }
}

impl MagnetConfig {
    pub fn remanence(&self) -> f64 {
        self.grade.map_or(self.remanence_t, |g| g.remanence())
    }
}

/// Named soft magnetic materials with preset J-A parameters
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HysteresisMaterial {
    #[default]
    #[serde(rename = "hymu80")]
    HyMu80,
}

impl HysteresisMaterial {
    pub fn parameters(&self) -> JaParameters {
        match self {
            Self::HyMu80 => JaParameters::hymu80(),
        }
    }
}

/// Jiles-Atherton parameters: a material preset with optional overrides
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct HysteresisConfig {
    pub material: HysteresisMaterial,
    pub ms: Option<f64>,    // saturation magnetization [A/m]
    pub a: Option<f64>,     // anhysteretic shape [A/m]
    pub k: Option<f64>,     // pinning [A/m]
    pub c: Option<f64>,     // reversibility [0, 1]
    pub alpha: Option<f64>, // inter-domain coupling
}

impl HysteresisConfig {
    pub fn parameters(&self) -> JaParameters {
        let base = self.material.parameters();
        JaParameters {
            ms: self.ms.unwrap_or(base.ms),
            a: self.a.unwrap_or(base.a),
            k: self.k.unwrap_or(base.k),
            c: self.c.unwrap_or(base.c),
            alpha: self.alpha.unwrap_or(base.alpha),
        }
    }
}

/// Identical hysteresis rods sharing volume and material
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RodsConfig {
    pub volume_m3: f64,              // per rod [m^3]
    pub orientations: Vec<[f64; 3]>, // one rod per entry, body frame
    pub hysteresis: HysteresisConfig,
}

impl Default for RodsConfig {
    fn default() -> Self {
        Self {
            // 0.5 cm radius, 10 cm long
            volume_m3: 0.005 * 0.005 * std::f64::consts::PI * 0.1,
            orientations: vec![[1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -1.0, 0.0]],
            hysteresis: HysteresisConfig::default(),
        }
    }
}

/// Spacecraft body
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SpacecraftConfig {
    pub mass_kg: f64,                      // [kg]
    pub dimensions_m: [f64; 3],            // box edges x, y, z [m]
    pub inertia: Option<[[f64; 3]; 3]>,    // explicit tensor [kg m^2], row-major; replaces the box model
    pub magnet: MagnetConfig,
    pub rods: RodsConfig,
}

impl Default for SpacecraftConfig {
    fn default() -> Self {
        Self {
            mass_kg: 1.3,
            dimensions_m: [0.1, 0.1, 0.1],
            inertia: None,
            magnet: MagnetConfig::default(),
            rods: RodsConfig::default(),
        }
    }
}

/// Initial orbit, angles in degrees
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OrbitConfig {
    pub semi_major_axis_m: Option<f64>, // takes precedence over `altitude_km`
    pub altitude_km: f64,               // above the equatorial radius
    pub eccentricity: f64,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub arg_of_periapsis_deg: f64,
    pub mean_anomaly_deg: f64,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            semi_major_axis_m: None,
            altitude_km: 650.0,
            eccentricity: 0.0,
            inclination_deg: 51.0,
            raan_deg: 0.0,
            arg_of_periapsis_deg: 0.0,
            mean_anomaly_deg: 0.0,
        }
    }
}

impl OrbitConfig {
    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis_m
            .unwrap_or(EARTH_EQUATORIAL_RADIUS_M + self.altitude_km * KM_TO_M)
    }
}

fn default_start_year() -> f64 {
    crate::simulation::constants::SIMULATION_START_YEAR
}

fn default_true() -> bool {
    true
}

/// Field and gravity model
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum EnvironmentConfig {
    /// Tilted dipole rotating with the Earth, J2 gravity disturbance
    Dipole {
        #[serde(default = "default_start_year")]
        start_year: f64, // decimal year at t = 0
        #[serde(default = "default_true")]
        j2: bool,
    },
    /// Uniform inertial field [T], no disturbance
    Constant { field_t: [f64; 3] },
    /// No field, no disturbance
    Zero,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::Dipole {
            start_year: default_start_year(),
            j2: true,
        }
    }
}

/// Initial attitude state
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct InitialConfig {
    pub angular_velocity: [f64; 3],             // body frame [rad/s]
    pub attitude: [f64; 4],                     // body -> ECI quaternion (w, x, y, z)
    pub rod_magnetizations: Option<Vec<f64>>,   // [A/m], zeros when absent
}

impl Default for InitialConfig {
    fn default() -> Self {
        Self {
            angular_velocity: [0.1, -0.05, 0.08],
            attitude: [1.0, 0.0, 0.0, 0.0],
            rod_magnetizations: None,
        }
    }
}

/// CSV column groups of the state observer
#[derive(Deserialize, Debug, Clone, Copy, Default)]
#[serde(default)]
pub struct ObserverConfig {
    pub exclude_elements: bool,   // drop per-component columns
    pub exclude_magnitudes: bool, // drop |w|, |r|, |v| columns
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub engine: EngineConfig,         // Integrator and driver options
    pub parameters: ParametersConfig, // Time span and tolerances
    pub spacecraft: SpacecraftConfig, // Body, magnet and rods
    pub orbit: OrbitConfig,           // Initial orbit
    pub environment: EnvironmentConfig,
    pub initial: InitialConfig,       // Initial attitude state
    pub observer: ObserverConfig,     // Output columns
}

impl ScenarioConfig {
    /// Log the effective configuration.
    pub fn debug_summary(&self) {
        let sc = &self.spacecraft;
        info!(
            mass_kg = sc.mass_kg,
            dimensions_m = ?sc.dimensions_m,
            explicit_inertia = sc.inertia.is_some(),
            "spacecraft"
        );
        info!(
            remanence_t = sc.magnet.remanence(),
            length_m = sc.magnet.length_m,
            diameter_m = sc.magnet.diameter_m,
            orientation = ?sc.magnet.orientation,
            temperature_c = ?sc.magnet.temperature_c,
            "permanent magnet"
        );
        let p = sc.rods.hysteresis.parameters();
        info!(
            count = sc.rods.orientations.len(),
            volume_m3 = sc.rods.volume_m3,
            ms = p.ms,
            a = p.a,
            k = p.k,
            c = p.c,
            alpha = p.alpha,
            "hysteresis rods"
        );
        let o = &self.orbit;
        info!(
            semi_major_axis_m = o.semi_major_axis(),
            eccentricity = o.eccentricity,
            inclination_deg = o.inclination_deg,
            raan_deg = o.raan_deg,
            arg_of_periapsis_deg = o.arg_of_periapsis_deg,
            mean_anomaly_deg = o.mean_anomaly_deg,
            "orbit"
        );
        info!(environment = ?self.environment, "environment");
        let pr = &self.parameters;
        info!(
            t_start = pr.t_start,
            t_end = pr.t_end,
            dt_initial = pr.dt_initial,
            absolute_error = pr.absolute_error,
            relative_error = pr.relative_error,
            integrator = ?self.engine.integrator,
            higher_order = self.engine.higher_order,
            checkpoint_interval = ?self.engine.checkpoint_interval,
            angular_velocity = ?self.initial.angular_velocity,
            "simulation"
        );
    }
}
