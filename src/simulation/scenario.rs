//! Build fully-initialized simulation scenarios from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces the runtime bundle
//! `Scenario` containing:
//! - engine settings (`Engine`)
//! - numerical parameters (`Parameters`)
//! - the validated `Spacecraft`
//! - the environment model behind `dyn Environment`
//! - the initial `SystemState` at `t_start`
//!
//! `Scenario::run` drives the integrator over the configured span, either in
//! one continuous call or in checkpoint intervals.

use tracing::{debug, info, warn};

use crate::configuration::config::{EnvironmentConfig, ObserverConfig, ScenarioConfig};
use crate::simulation::constants::DEG_TO_RAD;
use crate::simulation::dynamics::SpacecraftDynamics;
use crate::simulation::engine::Engine;
use crate::simulation::environment::{ConstantField, DipoleEnvironment, Environment, ZeroField};
use crate::simulation::error::{ConfigError, IntegrationError, SimulationError};
use crate::simulation::hysteresis::HysteresisRod;
use crate::simulation::integrator::{AdaptiveIntegrator, IntegrationStats, Observer};
use crate::simulation::magnet::{PermanentMagnet, NDFEB_TEMPERATURE_COEFFICIENT, REFERENCE_TEMPERATURE_C};
use crate::simulation::observers::StateColumns;
use crate::simulation::orbit::KeplerianElements;
use crate::simulation::params::Parameters;
use crate::simulation::spacecraft::Spacecraft;
use crate::simulation::states::{NMat3, NQuat, NVec3, NVecX, SystemState};

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub final_state: SystemState,
    pub t_end: f64,
    pub stats: IntegrationStats,
    pub checkpoints: usize,      // interval boundaries crossed
    pub clamped_rods: usize,     // magnetizations pulled back into [-Ms, Ms]
}

/// Fully-initialized simulation scenario
///
/// This is the main "runtime bundle" constructed from a [`ScenarioConfig`]:
/// it owns the engine settings, parameters, spacecraft, environment and
/// initial state. Dynamics functors borrow from it.
pub struct Scenario {
    pub engine: Engine,
    pub parameters: Parameters,
    pub spacecraft: Spacecraft,
    pub environment: Box<dyn Environment + Send + Sync>,
    pub orbit: KeplerianElements,
    pub initial_state: SystemState,
    pub columns: StateColumns,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self, ConfigError> {
        let engine = Engine::from_config(&cfg.engine)?;
        let parameters = Parameters::from_config(&cfg.parameters)?;

        // Spacecraft: magnet, rods, inertia
        let sc_cfg = &cfg.spacecraft;
        let m_cfg = &sc_cfg.magnet;
        let mut magnet = PermanentMagnet::cylindrical(
            m_cfg.remanence(),
            m_cfg.length_m,
            m_cfg.diameter_m,
            NVec3::from(m_cfg.orientation),
        )?;
        if let Some(temperature) = m_cfg.temperature_c {
            magnet = magnet.with_temperature(temperature, NDFEB_TEMPERATURE_COEFFICIENT, REFERENCE_TEMPERATURE_C)?;
        }

        let hysteresis = sc_cfg.rods.hysteresis.parameters();
        let rods = sc_cfg
            .rods
            .orientations
            .iter()
            .map(|o| HysteresisRod::new(sc_cfg.rods.volume_m3, NVec3::from(*o), hysteresis))
            .collect::<Result<Vec<_>, _>>()?;

        let spacecraft = match sc_cfg.inertia {
            Some(rows) => {
                let inertia = NMat3::from_fn(|i, j| rows[i][j]);
                Spacecraft::new(inertia, magnet, rods)?
            }
            None => Spacecraft::from_box(sc_cfg.mass_kg, sc_cfg.dimensions_m, magnet, rods)?,
        };

        // Environment
        let environment: Box<dyn Environment + Send + Sync> = match &cfg.environment {
            EnvironmentConfig::Dipole { start_year, j2 } => {
                ConfigError::ensure_range("start year", *start_year, 1900.0, 2100.0)?;
                Box::new(DipoleEnvironment::new(*start_year).with_j2(*j2))
            }
            EnvironmentConfig::Constant { field_t } => Box::new(ConstantField::new(NVec3::from(*field_t))),
            EnvironmentConfig::Zero => Box::new(ZeroField::default()),
        };

        // Orbit (angles in degrees in the config)
        let o_cfg = &cfg.orbit;
        let orbit = KeplerianElements {
            semi_major_axis: o_cfg.semi_major_axis(),
            eccentricity: o_cfg.eccentricity,
            inclination: o_cfg.inclination_deg * DEG_TO_RAD,
            raan: o_cfg.raan_deg * DEG_TO_RAD,
            arg_of_periapsis: o_cfg.arg_of_periapsis_deg * DEG_TO_RAD,
            mean_anomaly: o_cfg.mean_anomaly_deg * DEG_TO_RAD,
        };
        orbit.validate()?;

        // Initial state at t_start
        let (position, velocity) = orbit.to_cartesian(environment.gravitational_parameter());
        let [w, x, y, z] = cfg.initial.attitude;
        let attitude = NQuat::new(w, x, y, z);
        if !(attitude.norm() > 1e-12) {
            return Err(ConfigError::Invalid("initial attitude quaternion must be non-zero".into()));
        }
        let num_rods = spacecraft.num_rods();
        let rod_magnetizations = match &cfg.initial.rod_magnetizations {
            Some(values) if values.len() == num_rods => NVecX::from_column_slice(values),
            Some(values) => {
                return Err(ConfigError::Invalid(format!(
                    "{} initial rod magnetizations given for {} rods",
                    values.len(),
                    num_rods
                )))
            }
            None => NVecX::zeros(num_rods),
        };
        let mut initial_state = SystemState {
            position,
            velocity,
            attitude,
            angular_velocity: NVec3::from(cfg.initial.angular_velocity),
            rod_magnetizations,
        };
        initial_state.normalize_attitude();
        spacecraft.clamp_magnetizations(&mut initial_state.rod_magnetizations);

        Ok(Self {
            engine,
            parameters,
            spacecraft,
            environment,
            orbit,
            initial_state,
            columns: columns_from(&cfg.observer),
        })
    }

    /// Dynamics functor for integrator time measured from `offset`.
    pub fn dynamics(&self, offset: f64) -> SpacecraftDynamics<'_> {
        SpacecraftDynamics::new(&self.spacecraft, self.environment.as_ref()).with_time_offset(offset)
    }

    pub fn integrator(&self) -> Result<AdaptiveIntegrator, IntegrationError> {
        Ok(AdaptiveIntegrator::new(self.engine.method, self.parameters.tolerances)?
            .with_max_steps(self.engine.max_steps))
    }

    /// Integrate the full scenario, observing the initial state and every
    /// accepted step (plus corrected checkpoint states).
    pub fn run<O>(&self, observer: &mut O) -> Result<RunSummary, SimulationError>
    where
        O: Observer<SystemState> + ?Sized,
    {
        let p = &self.parameters;
        info!(
            method = self.engine.method.tableau().name,
            t_start = p.t_start,
            t_end = p.t_end,
            duration = p.duration(),
            rods = self.spacecraft.num_rods(),
            checkpoint_interval = ?self.engine.checkpoint_interval,
            "starting simulation"
        );
        let summary = match self.engine.checkpoint_interval {
            Some(interval) => self.run_checkpointed(self.initial_state.clone(), interval, observer)?,
            None => self.run_continuous(self.initial_state.clone(), observer)?,
        };
        info!(
            fn_evals = summary.stats.fn_evals,
            accepted = summary.stats.accepted_steps,
            rejected = summary.stats.rejected_steps,
            checkpoints = summary.checkpoints,
            "simulation finished"
        );
        Ok(summary)
    }

    /// One integration call over [t_start, t_end] in absolute time.
    pub fn run_continuous<O>(&self, initial: SystemState, observer: &mut O) -> Result<RunSummary, SimulationError>
    where
        O: Observer<SystemState> + ?Sized,
    {
        let p = &self.parameters;
        let dynamics = self.dynamics(0.0);
        let mut integrator = self.integrator()?;
        let final_state = integrator.integrate(&dynamics, initial, p.t_start, p.t_end, p.dt_initial, observer)?;
        Ok(RunSummary {
            final_state,
            t_end: p.t_end,
            stats: integrator.stats(),
            checkpoints: 0,
            clamped_rods: 0,
        })
    }

    /// Advance in intervals of `interval` seconds.
    ///
    /// Each interval is integrated in local time with the dynamics offset to
    /// the interval start. At every boundary the attitude is renormalized,
    /// rod magnetizations are clamped into [-Ms, Ms], and the corrected state
    /// is observed in place of the uncorrected one.
    pub fn run_checkpointed<O>(
        &self,
        initial: SystemState,
        interval: f64,
        observer: &mut O,
    ) -> Result<RunSummary, SimulationError>
    where
        O: Observer<SystemState> + ?Sized,
    {
        let p = &self.parameters;
        ConfigError::ensure_range(
            "checkpoint interval",
            interval,
            crate::simulation::engine::MIN_CHECKPOINT_INTERVAL,
            f64::MAX,
        )?;

        let mut integrator = self.integrator()?;
        let mut state = initial;
        observer.observe(&state, p.t_start);

        let mut h = p.dt_initial;
        let mut t = p.t_start;
        let mut checkpoints = 0;
        let mut clamped_rods = 0;

        while t < p.t_end {
            let t_next = (t + interval).min(p.t_end);
            let span = t_next - t;
            let dynamics = self.dynamics(t);

            let mut shifted = OffsetObserver { inner: &mut *observer, offset: t };
            let h_next = integrator.advance(&dynamics, &mut state, 0.0, span, h.min(span), &mut shifted, false)?;
            h = h_next.min(interval);

            state.normalize_attitude();
            let clamped = self.spacecraft.clamp_magnetizations(&mut state.rod_magnetizations);
            if clamped > 0 {
                warn!(t = t_next, clamped, "rod magnetization overshoot clamped at checkpoint");
            }
            clamped_rods += clamped;
            checkpoints += 1;
            t = t_next;

            observer.observe(&state, t);
            debug!(t, checkpoint = checkpoints, h_next = h, "checkpoint");
        }

        Ok(RunSummary {
            final_state: state,
            t_end: p.t_end,
            stats: integrator.stats(),
            checkpoints,
            clamped_rods,
        })
    }
}

/// Reports interval-local times as absolute times.
struct OffsetObserver<'a, O: ?Sized> {
    inner: &'a mut O,
    offset: f64,
}

impl<O> Observer<SystemState> for OffsetObserver<'_, O>
where
    O: Observer<SystemState> + ?Sized,
{
    fn observe(&mut self, state: &SystemState, t: f64) {
        self.inner.observe(state, self.offset + t);
    }
}

fn columns_from(cfg: &ObserverConfig) -> StateColumns {
    StateColumns {
        elements: !cfg.exclude_elements,
        magnitudes: !cfg.exclude_magnitudes,
    }
}
