//! Verification harnesses
//!
//! Small stand-alone runs that exercise one part of the model in isolation:
//! - `trace_bh_loop`: a single rod driven by `H = H_max sin(2 pi f t)`,
//!   integrated as a scalar ODE with the same adaptive driver
//! - `propagate_orbit`: translational motion only (central term plus the
//!   environment's disturbance)
//! - `propagate_attitude`: the full dynamics without rods, starting from the
//!   identity attitude at rest

use tracing::info;

use crate::simulation::constants::TWO_PI;
use crate::simulation::dynamics::{central_gravity, SpacecraftDynamics};
use crate::simulation::error::SimulationError;
use crate::simulation::hysteresis::{HysteresisRod, JaParameters};
use crate::simulation::integrator::{
    AdaptiveIntegrator, IntegrationMethod, IntegrationStats, Observer, OdeSystem, Tolerances,
};
use crate::simulation::scenario::{RunSummary, Scenario};
use crate::simulation::spacecraft::Spacecraft;
use crate::simulation::states::{NQuat, NVec3, NVecX, SystemState};

/// Sinusoidal applied field `H(t) = h_max sin(2 pi frequency t)` [A/m].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedField {
    pub h_max: f64,     // amplitude [A/m]
    pub frequency: f64, // [Hz]
}

impl Default for AppliedField {
    fn default() -> Self {
        Self {
            h_max: 100.0,
            frequency: 1.0,
        }
    }
}

impl AppliedField {
    pub fn field(&self, t: f64) -> f64 {
        self.h_max * (TWO_PI * self.frequency * t).sin()
    }

    pub fn rate(&self, t: f64) -> f64 {
        let w = TWO_PI * self.frequency;
        self.h_max * w * (w * t).cos()
    }
}

/// Scalar magnetization ODE of one rod in an applied axial field.
pub struct HysteresisLoop<'a> {
    pub rod: &'a HysteresisRod,
    pub field: AppliedField,
}

impl OdeSystem<f64> for HysteresisLoop<'_> {
    fn rhs(&self, t: f64, m: &f64) -> f64 {
        self.rod
            .magnetization_derivative_from_h(*m, self.field.field(t), self.field.rate(t))
    }

    fn post_step(&self, m: &mut f64) {
        *m = self.rod.clamp_magnetization(*m);
    }
}

/// Settings of a B-H loop trace.
#[derive(Debug, Clone, Copy)]
pub struct BhLoop {
    pub field: AppliedField,
    pub t_end: f64,          // [s], two periods at the default frequency
    pub dt_initial: f64,     // [s]
    pub tolerances: Tolerances,
    pub initial_magnetization: f64,
}

impl Default for BhLoop {
    fn default() -> Self {
        Self {
            field: AppliedField::default(),
            t_end: 2.0,
            dt_initial: 1e-3,
            tolerances: Tolerances::default(),
            initial_magnetization: 0.0,
        }
    }
}

/// Trace the B-H loop of a unit-volume rod along +X with material `params`.
///
/// Returns the final magnetization and the integration statistics.
pub fn trace_bh_loop<O>(
    params: JaParameters,
    settings: &BhLoop,
    observer: &mut O,
) -> Result<(f64, IntegrationStats), SimulationError>
where
    O: Observer<f64> + ?Sized,
{
    let rod = HysteresisRod::new(1.0, NVec3::x(), params)?;
    let system = HysteresisLoop {
        rod: &rod,
        field: settings.field,
    };
    let mut integrator = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, settings.tolerances)?;
    let m_end = integrator.integrate(
        &system,
        settings.initial_magnetization,
        0.0,
        settings.t_end,
        settings.dt_initial,
        observer,
    )?;
    let stats = integrator.stats();
    info!(
        h_max = settings.field.h_max,
        frequency = settings.field.frequency,
        m_end,
        accepted = stats.accepted_steps,
        rejected = stats.rejected_steps,
        "B-H loop traced"
    );
    Ok((m_end, stats))
}

/// Translational motion of the scenario's orbit, attitude frozen.
pub fn propagate_orbit<O>(scenario: &Scenario, observer: &mut O) -> Result<RunSummary, SimulationError>
where
    O: Observer<SystemState> + ?Sized,
{
    let env = scenario.environment.as_ref();
    let mu = env.gravitational_parameter();
    let translation = |t: f64, y: &SystemState| {
        let mut dy = SystemState::zeros(0);
        dy.position = y.velocity;
        dy.velocity = central_gravity(&y.position, mu) + env.evaluate(t, &y.position).gravity;
        dy
    };

    let mut initial = SystemState::new(0);
    initial.position = scenario.initial_state.position;
    initial.velocity = scenario.initial_state.velocity;

    let p = &scenario.parameters;
    let mut integrator = scenario.integrator()?;
    let final_state = integrator.integrate(&translation, initial, p.t_start, p.t_end, p.dt_initial, observer)?;
    let stats = integrator.stats();
    info!(
        r_end = final_state.position.norm(),
        accepted = stats.accepted_steps,
        "orbit propagated"
    );
    Ok(RunSummary {
        final_state,
        t_end: p.t_end,
        stats,
        checkpoints: 0,
        clamped_rods: 0,
    })
}

/// Full dynamics of the scenario spacecraft with its rods removed, from the
/// identity attitude and zero body rate.
pub fn propagate_attitude<O>(scenario: &Scenario, observer: &mut O) -> Result<RunSummary, SimulationError>
where
    O: Observer<SystemState> + ?Sized,
{
    let spacecraft = Spacecraft::new(
        *scenario.spacecraft.inertia(),
        scenario.spacecraft.magnet().clone(),
        Vec::new(),
    )?;
    let dynamics = SpacecraftDynamics::new(&spacecraft, scenario.environment.as_ref());

    let initial = SystemState {
        position: scenario.initial_state.position,
        velocity: scenario.initial_state.velocity,
        attitude: NQuat::identity(),
        angular_velocity: NVec3::zeros(),
        rod_magnetizations: NVecX::zeros(0),
    };

    let p = &scenario.parameters;
    let mut integrator = scenario.integrator()?;
    let final_state = integrator.integrate(&dynamics, initial, p.t_start, p.t_end, p.dt_initial, observer)?;
    let stats = integrator.stats();
    info!(
        omega_end = final_state.angular_velocity.norm(),
        accepted = stats.accepted_steps,
        "attitude propagated"
    );
    Ok(RunSummary {
        final_state,
        t_end: p.t_end,
        stats,
        checkpoints: 0,
        clamped_rods: 0,
    })
}
