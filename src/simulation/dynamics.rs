//! Rigid-body attitude and orbit dynamics of the spacecraft
//!
//! `SpacecraftDynamics` is the right-hand side handed to the integrator:
//! - translational motion under central gravity plus the environment's
//!   disturbance acceleration
//! - body-frame field and field rate (orbital motion + body rotation)
//! - per-rod Jiles-Atherton magnetization rates
//! - magnet, rod, gyroscopic and gravity-gradient torques
//! - quaternion kinematics `q' = 0.5 q (0, w)`
//!
//! The functor only borrows the spacecraft and environment; nothing is
//! mutated while evaluating derivatives.

use nalgebra::Matrix3;

use super::environment::Environment;
use super::integrator::OdeSystem;
use super::spacecraft::Spacecraft;
use super::states::{NQuat, NVec3, NVecX, SystemState};

/// Below this distance [m] central gravity and gravity gradient are skipped.
pub const MIN_GRAVITY_RADIUS_M: f64 = 1.0;

/// Field quantities expressed in the body frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyField {
    pub field: NVec3,      // [T]
    pub field_rate: NVec3, // [T/s]
}

#[derive(Clone, Copy)]
pub struct SpacecraftDynamics<'a> {
    spacecraft: &'a Spacecraft,
    environment: &'a dyn Environment,
    global_time_offset: f64,
}

impl<'a> SpacecraftDynamics<'a> {
    pub fn new(spacecraft: &'a Spacecraft, environment: &'a dyn Environment) -> Self {
        Self {
            spacecraft,
            environment,
            global_time_offset: 0.0,
        }
    }

    /// Absolute time = `offset` + integrator time.
    pub fn with_time_offset(mut self, offset: f64) -> Self {
        self.global_time_offset = offset;
        self
    }

    pub fn time_offset(&self) -> f64 {
        self.global_time_offset
    }

    /// Rotation taking ECI vectors into the body frame for a body -> ECI
    /// attitude quaternion.
    pub fn eci_to_body(attitude: &NQuat) -> Matrix3<f64> {
        let q = if attitude.norm() > 0.0 {
            attitude.normalize()
        } else {
            NQuat::identity()
        };
        nalgebra::UnitQuaternion::new_unchecked(q)
            .to_rotation_matrix()
            .into_inner()
            .transpose()
    }

    /// Full state derivative at integrator time `t`.
    pub fn derivative(&self, state: &SystemState, t: f64) -> SystemState {
        let t_global = self.global_time_offset + t;
        let r_eci = &state.position;
        let v_eci = &state.velocity;
        let q = state.unit_attitude().into_inner();
        let omega = &state.angular_velocity;

        let sample = self.environment.evaluate_along(t_global, r_eci, v_eci);
        let mu = self.environment.gravitational_parameter();

        let r_eci_to_body = Self::eci_to_body(&q);
        let b_body = r_eci_to_body * sample.magnetic_field;
        let b_dot_orbital = sample
            .magnetic_field_rate
            .map(|rate| r_eci_to_body * rate)
            .unwrap_or_else(NVec3::zeros);
        let body_field = BodyField {
            field: b_body,
            field_rate: b_dot_orbital - omega.cross(&b_body),
        };

        let mut rod_rates = NVecX::zeros(state.num_rods());
        let rod_torque = self.rod_effects(&state.rod_magnetizations, &body_field, &mut rod_rates);
        let r_body = r_eci_to_body * r_eci;
        let torque = self.net_torque(omega, &b_body, &rod_torque, &r_body, mu);

        SystemState {
            position: *v_eci,
            velocity: central_gravity(r_eci, mu) + sample.gravity,
            attitude: attitude_derivative(&q, omega),
            angular_velocity: self.spacecraft.inertia_inverse() * torque,
            rod_magnetizations: rod_rates,
        }
    }

    /// Writes each rod's dM/dt into `rates` and returns the summed rod torque.
    ///
    /// Rods beyond the shorter of the two sequences are ignored.
    pub fn rod_effects(&self, magnetizations: &NVecX, field: &BodyField, rates: &mut NVecX) -> NVec3 {
        let rods = self.spacecraft.rods();
        let n = rods.len().min(magnetizations.len());
        if rates.len() != magnetizations.len() {
            *rates = NVecX::zeros(magnetizations.len());
        }

        let mut torque = NVec3::zeros();
        for (i, rod) in rods.iter().enumerate().take(n) {
            let m = magnetizations[i];
            rates[i] = rod.magnetization_derivative_from_field_rate(m, &field.field, &field.field_rate);
            torque += rod.magnetic_moment_in_field(m, &field.field).cross(&field.field);
        }
        torque
    }

    /// Magnet + rods + gyroscopic + gravity gradient, body frame.
    pub fn net_torque(&self, omega: &NVec3, b_body: &NVec3, rod_torque: &NVec3, r_body: &NVec3, mu: f64) -> NVec3 {
        let inertia = self.spacecraft.inertia();
        let magnet = self.spacecraft.magnet().magnetic_moment().cross(b_body);
        let gyroscopic = -omega.cross(&(inertia * omega));
        magnet + rod_torque + gyroscopic + gravity_gradient_torque(inertia, r_body, mu)
    }
}

/// `-mu r / r^3`, zero inside [`MIN_GRAVITY_RADIUS_M`].
pub fn central_gravity(r: &NVec3, mu: f64) -> NVec3 {
    let r_norm = r.norm();
    if r_norm < MIN_GRAVITY_RADIUS_M {
        return NVec3::zeros();
    }
    -r * (mu / (r_norm * r_norm * r_norm))
}

/// `(3 mu / r^5) r_body x (I r_body)`, zero inside [`MIN_GRAVITY_RADIUS_M`].
pub fn gravity_gradient_torque(inertia: &Matrix3<f64>, r_body: &NVec3, mu: f64) -> NVec3 {
    let r2 = r_body.norm_squared();
    let r_norm = r2.sqrt();
    if r_norm < MIN_GRAVITY_RADIUS_M {
        return NVec3::zeros();
    }
    let coef = 3.0 * mu / (r2 * r2 * r_norm);
    r_body.cross(&(inertia * r_body)) * coef
}

/// `0.5 q (0, w)`
pub fn attitude_derivative(q: &NQuat, omega: &NVec3) -> NQuat {
    let omega_q = NQuat::new(0.0, omega.x, omega.y, omega.z);
    (q * omega_q) * 0.5
}

impl OdeSystem<SystemState> for SpacecraftDynamics<'_> {
    fn rhs(&self, t: f64, y: &SystemState) -> SystemState {
        self.derivative(y, t)
    }

    fn post_step(&self, y: &mut SystemState) {
        y.normalize_attitude();
    }
}
