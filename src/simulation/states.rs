//! Core state types for the attitude/orbit simulation.
//!
//! Defines the ODE state of the spacecraft and the algebra the adaptive
//! integrator needs on it:
//! - `SystemState` holds position/velocity (inertial), the attitude
//!   quaternion, the body angular velocity and one magnetization per rod
//! - `OdeState` is the vector-space protocol the integrator is generic over
//!
//! The rod magnetizations are the only variable-length part of the state;
//! their length is fixed by the spacecraft's rod count.

use nalgebra::{DVector, Matrix3, Quaternion, UnitQuaternion, Vector3};
use std::ops::{Add, AddAssign, Mul, MulAssign, Sub, SubAssign};

pub type NVec3 = Vector3<f64>;
pub type NMat3 = Matrix3<f64>;
pub type NQuat = Quaternion<f64>;
pub type NVecX = DVector<f64>;

/// Below this norm a quaternion is treated as degenerate.
const QUATERNION_EPSILON: f64 = 1e-12;

/// Vector-space operations required by the adaptive integrator.
///
/// The integrator never looks inside a state; it only combines stages,
/// measures the embedded error and checks sizes. Implementations exist for
/// [`SystemState`] and for scalar `f64` (B-H loop tracing).
pub trait OdeState: Clone {
    /// A state of the same shape with every component zero.
    fn zeros_like(&self) -> Self;

    /// Whether both states have the same variable-length layout.
    fn same_size(&self, other: &Self) -> bool;

    /// Resize the variable-length part to match `other`.
    fn resize_like(&mut self, other: &Self);

    /// `self += factor * other`
    fn add_scaled(&mut self, factor: f64, other: &Self);

    /// Component-wise absolute value.
    fn abs(&self) -> Self;

    /// Maximum absolute component.
    fn norm_inf(&self) -> f64;

    /// Whether every component is finite.
    fn is_finite(&self) -> bool;

    /// Fold over `(self_i, a_i, b_i)` for every component.
    fn fold_components<F>(&self, a: &Self, b: &Self, init: f64, f: F) -> f64
    where
        F: FnMut(f64, f64, f64, f64) -> f64;

    /// Scaled infinity norm of an error estimate:
    /// `max_i |e_i| / (atol + rtol * max(|y0_i|, |y1_i|))`
    fn error_norm(&self, y0: &Self, y1: &Self, atol: f64, rtol: f64) -> f64 {
        self.fold_components(y0, y1, 0.0, |acc, e, a, b| {
            let scale = atol + rtol * a.abs().max(b.abs());
            acc.max(e.abs() / scale)
        })
    }
}

impl OdeState for f64 {
    fn zeros_like(&self) -> Self {
        0.0
    }

    fn same_size(&self, _other: &Self) -> bool {
        true
    }

    fn resize_like(&mut self, _other: &Self) {}

    fn add_scaled(&mut self, factor: f64, other: &Self) {
        *self += factor * other;
    }

    fn abs(&self) -> Self {
        f64::abs(*self)
    }

    fn norm_inf(&self) -> f64 {
        f64::abs(*self)
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }

    fn fold_components<F>(&self, a: &Self, b: &Self, init: f64, mut f: F) -> f64
    where
        F: FnMut(f64, f64, f64, f64) -> f64,
    {
        f(init, *self, *a, *b)
    }
}

/// Full ODE state of the spacecraft.
///
/// The attitude quaternion rotates body-frame vectors into the inertial
/// frame (body -> ECI). It is stored unnormalized because the integrator
/// treats it as four independent coefficients; callers renormalize at
/// accepted steps and checkpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemState {
    pub position: NVec3,         // ECI position [m]
    pub velocity: NVec3,         // ECI velocity [m/s]
    pub attitude: NQuat,         // body -> ECI
    pub angular_velocity: NVec3, // body frame [rad/s]
    pub rod_magnetizations: NVecX, // one irreversible magnetization per rod [A/m]
}

impl SystemState {
    /// Identity attitude, at rest at the origin, demagnetized rods.
    pub fn new(num_rods: usize) -> Self {
        Self {
            position: NVec3::zeros(),
            velocity: NVec3::zeros(),
            attitude: NQuat::identity(),
            angular_velocity: NVec3::zeros(),
            rod_magnetizations: NVecX::zeros(num_rods),
        }
    }

    /// An all-zero state (used as a derivative accumulator).
    pub fn zeros(num_rods: usize) -> Self {
        Self {
            position: NVec3::zeros(),
            velocity: NVec3::zeros(),
            attitude: NQuat::new(0.0, 0.0, 0.0, 0.0),
            angular_velocity: NVec3::zeros(),
            rod_magnetizations: NVecX::zeros(num_rods),
        }
    }

    pub fn num_rods(&self) -> usize {
        self.rod_magnetizations.len()
    }

    /// Normalized copy of the attitude; identity if the stored quaternion
    /// has collapsed to zero.
    pub fn unit_attitude(&self) -> UnitQuaternion<f64> {
        if self.attitude.norm() < QUATERNION_EPSILON {
            UnitQuaternion::identity()
        } else {
            UnitQuaternion::from_quaternion(self.attitude)
        }
    }

    /// Renormalize the attitude quaternion in place.
    pub fn normalize_attitude(&mut self) {
        self.attitude = self.unit_attitude().into_inner();
    }

    /// Add `scalar` to every component.
    pub fn add_scalar(&self, scalar: f64) -> Self {
        let mut out = self.clone();
        out.position.add_scalar_mut(scalar);
        out.velocity.add_scalar_mut(scalar);
        out.attitude.coords.add_scalar_mut(scalar);
        out.angular_velocity.add_scalar_mut(scalar);
        out.rod_magnetizations.add_scalar_mut(scalar);
        out
    }

    fn assert_rods_match(&self, other: &Self) {
        debug_assert_eq!(
            self.rod_magnetizations.len(),
            other.rod_magnetizations.len(),
            "rod magnetization sequences differ in length"
        );
    }
}

impl OdeState for SystemState {
    fn zeros_like(&self) -> Self {
        Self::zeros(self.num_rods())
    }

    fn same_size(&self, other: &Self) -> bool {
        self.rod_magnetizations.len() == other.rod_magnetizations.len()
    }

    fn resize_like(&mut self, other: &Self) {
        let n = other.rod_magnetizations.len();
        if self.rod_magnetizations.len() != n {
            let old = std::mem::replace(&mut self.rod_magnetizations, NVecX::zeros(0));
            self.rod_magnetizations = old.resize_vertically(n, 0.0);
        }
    }

    fn add_scaled(&mut self, factor: f64, other: &Self) {
        self.assert_rods_match(other);
        self.position.axpy(factor, &other.position, 1.0);
        self.velocity.axpy(factor, &other.velocity, 1.0);
        self.attitude.coords.axpy(factor, &other.attitude.coords, 1.0);
        self.angular_velocity.axpy(factor, &other.angular_velocity, 1.0);
        self.rod_magnetizations.axpy(factor, &other.rod_magnetizations, 1.0);
    }

    fn abs(&self) -> Self {
        Self {
            position: self.position.abs(),
            velocity: self.velocity.abs(),
            attitude: NQuat::from(self.attitude.coords.abs()),
            angular_velocity: self.angular_velocity.abs(),
            rod_magnetizations: self.rod_magnetizations.abs(),
        }
    }

    fn norm_inf(&self) -> f64 {
        self.position
            .amax()
            .max(self.velocity.amax())
            .max(self.attitude.coords.amax())
            .max(self.angular_velocity.amax())
            .max(if self.rod_magnetizations.is_empty() {
                0.0
            } else {
                self.rod_magnetizations.amax()
            })
    }

    fn is_finite(&self) -> bool {
        self.position.iter().all(|v| v.is_finite())
            && self.velocity.iter().all(|v| v.is_finite())
            && self.attitude.coords.iter().all(|v| v.is_finite())
            && self.angular_velocity.iter().all(|v| v.is_finite())
            && self.rod_magnetizations.iter().all(|v| v.is_finite())
    }

    fn fold_components<F>(&self, a: &Self, b: &Self, init: f64, mut f: F) -> f64
    where
        F: FnMut(f64, f64, f64, f64) -> f64,
    {
        let mut acc = init;
        let pairs = [
            (self.position.as_slice(), a.position.as_slice(), b.position.as_slice()),
            (self.velocity.as_slice(), a.velocity.as_slice(), b.velocity.as_slice()),
            (
                self.attitude.coords.as_slice(),
                a.attitude.coords.as_slice(),
                b.attitude.coords.as_slice(),
            ),
            (
                self.angular_velocity.as_slice(),
                a.angular_velocity.as_slice(),
                b.angular_velocity.as_slice(),
            ),
            (
                self.rod_magnetizations.as_slice(),
                a.rod_magnetizations.as_slice(),
                b.rod_magnetizations.as_slice(),
            ),
        ];
        for (s, x, y) in pairs {
            for ((&si, &xi), &yi) in s.iter().zip(x.iter()).zip(y.iter()) {
                acc = f(acc, si, xi, yi);
            }
        }
        acc
    }
}

impl AddAssign<&SystemState> for SystemState {
    fn add_assign(&mut self, rhs: &SystemState) {
        self.add_scaled(1.0, rhs);
    }
}

impl SubAssign<&SystemState> for SystemState {
    fn sub_assign(&mut self, rhs: &SystemState) {
        self.add_scaled(-1.0, rhs);
    }
}

impl MulAssign<f64> for SystemState {
    fn mul_assign(&mut self, rhs: f64) {
        self.position *= rhs;
        self.velocity *= rhs;
        self.attitude.coords *= rhs;
        self.angular_velocity *= rhs;
        self.rod_magnetizations *= rhs;
    }
}

impl Add for SystemState {
    type Output = SystemState;

    fn add(mut self, rhs: SystemState) -> SystemState {
        self += &rhs;
        self
    }
}

impl Add<&SystemState> for &SystemState {
    type Output = SystemState;

    fn add(self, rhs: &SystemState) -> SystemState {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub for SystemState {
    type Output = SystemState;

    fn sub(mut self, rhs: SystemState) -> SystemState {
        self -= &rhs;
        self
    }
}

impl Mul<f64> for SystemState {
    type Output = SystemState;

    fn mul(mut self, rhs: f64) -> SystemState {
        self *= rhs;
        self
    }
}

impl Mul<SystemState> for f64 {
    type Output = SystemState;

    fn mul(self, rhs: SystemState) -> SystemState {
        rhs * self
    }
}

impl Mul<&SystemState> for f64 {
    type Output = SystemState;

    fn mul(self, rhs: &SystemState) -> SystemState {
        rhs.clone() * self
    }
}
