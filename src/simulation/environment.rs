//! Environment models: geomagnetic field and gravity seen by the spacecraft.
//!
//! The dynamics only talks to the [`Environment`] trait. Concrete models:
//! - `ZeroField` and `ConstantField`: deterministic test doubles
//! - `DipoleEnvironment`: tilted centred dipole rotating with the Earth,
//!   secular drift of the dipole coefficients, and a J2 gravity disturbance
//!
//! All vectors are in the inertial (ECI) frame. The `gravity` member of a
//! sample is a disturbance exclusive of the central `-mu r / r^3` term,
//! which the dynamics adds itself.

use nalgebra::Rotation3;

use super::constants::{
    EARTH_EQUATORIAL_RADIUS_M, EARTH_J2, EARTH_MU, EARTH_ROTATION_RATE, GEOMAGNETIC_REFERENCE_RADIUS_M, NT_TO_T,
    SECONDS_PER_YEAR, SIMULATION_START_YEAR,
};
use super::states::NVec3;

/// Positions closer to the origin than this [m] get zero field and gravity.
pub const MIN_FIELD_RADIUS_M: f64 = 1.0;

/// Result of one environment query at (t, position).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSample {
    pub magnetic_field: NVec3,                // [T]
    pub magnetic_field_rate: Option<NVec3>,   // [T/s]
    pub gravity: NVec3,                       // disturbance acceleration [m/s^2]
}

impl FieldSample {
    pub fn zero() -> Self {
        Self {
            magnetic_field: NVec3::zeros(),
            magnetic_field_rate: None,
            gravity: NVec3::zeros(),
        }
    }
}

/// Field and gravity provider queried by the dynamics at every RK stage.
///
/// Implementations must be deterministic in their arguments.
pub trait Environment {
    /// Field and gravity disturbance at absolute time `t` [s] and ECI
    /// `position` [m].
    fn evaluate(&self, t: f64, position: &NVec3) -> FieldSample;

    /// Same as [`evaluate`](Self::evaluate), but the field rate may include
    /// the change seen by an observer moving with `velocity`.
    fn evaluate_along(&self, t: f64, position: &NVec3, _velocity: &NVec3) -> FieldSample {
        self.evaluate(t, position)
    }

    /// Gravitational parameter of the central body [m^3/s^2].
    fn gravitational_parameter(&self) -> f64;
}

/// No field, no disturbance.
#[derive(Debug, Clone, Copy)]
pub struct ZeroField {
    pub mu: f64,
}

impl Default for ZeroField {
    fn default() -> Self {
        Self { mu: EARTH_MU }
    }
}

impl Environment for ZeroField {
    fn evaluate(&self, _t: f64, _position: &NVec3) -> FieldSample {
        FieldSample::zero()
    }

    fn gravitational_parameter(&self) -> f64 {
        self.mu
    }
}

/// Uniform, static inertial field.
#[derive(Debug, Clone, Copy)]
pub struct ConstantField {
    pub field: NVec3, // [T]
    pub mu: f64,
}

impl ConstantField {
    pub fn new(field: NVec3) -> Self {
        Self { field, mu: EARTH_MU }
    }
}

impl Environment for ConstantField {
    fn evaluate(&self, _t: f64, _position: &NVec3) -> FieldSample {
        FieldSample {
            magnetic_field: self.field,
            magnetic_field_rate: Some(NVec3::zeros()),
            gravity: NVec3::zeros(),
        }
    }

    fn gravitational_parameter(&self) -> f64 {
        self.mu
    }
}

/// Dipole Gauss coefficients (g10, g11, h11) [nT] and their secular
/// variation [nT/yr], IGRF epoch 2025.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DipoleCoefficients {
    pub g10: f64,
    pub g11: f64,
    pub h11: f64,
    pub g10_rate: f64,
    pub g11_rate: f64,
    pub h11_rate: f64,
    pub epoch: f64,
}

impl DipoleCoefficients {
    pub fn igrf2025() -> Self {
        Self {
            g10: -29_350.0,
            g11: -1_410.3,
            h11: 4_545.5,
            g10_rate: 12.6,
            g11_rate: 10.0,
            h11_rate: -21.5,
            epoch: 2025.0,
        }
    }

    /// Earth-fixed dipole vector (g11, h11, g10) at decimal `year` [nT].
    fn moment_ecef(&self, year: f64) -> NVec3 {
        let dy = year - self.epoch;
        NVec3::new(
            self.g11 + self.g11_rate * dy,
            self.h11 + self.h11_rate * dy,
            self.g10 + self.g10_rate * dy,
        )
    }

    /// Secular drift of [`moment_ecef`](Self::moment_ecef) [nT/yr].
    fn moment_rate_ecef(&self) -> NVec3 {
        NVec3::new(self.g11_rate, self.h11_rate, self.g10_rate)
    }
}

impl Default for DipoleCoefficients {
    fn default() -> Self {
        Self::igrf2025()
    }
}

/// Centred tilted dipole plus J2 gravity.
///
/// The ECI and ECEF frames coincide at t = 0 and the Earth spins about +Z at
/// [`EARTH_ROTATION_RATE`].
#[derive(Debug, Clone)]
pub struct DipoleEnvironment {
    coefficients: DipoleCoefficients,
    start_year: f64,
    include_j2: bool,
    mu: f64,
}

impl Default for DipoleEnvironment {
    fn default() -> Self {
        Self::new(SIMULATION_START_YEAR)
    }
}

impl DipoleEnvironment {
    pub fn new(start_year: f64) -> Self {
        Self {
            coefficients: DipoleCoefficients::igrf2025(),
            start_year,
            include_j2: true,
            mu: EARTH_MU,
        }
    }

    pub fn with_coefficients(mut self, coefficients: DipoleCoefficients) -> Self {
        self.coefficients = coefficients;
        self
    }

    pub fn with_j2(mut self, include_j2: bool) -> Self {
        self.include_j2 = include_j2;
        self
    }

    fn earth_rotation(t: f64) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&NVec3::z_axis(), EARTH_ROTATION_RATE * t)
    }

    /// Inertial dipole vector scaled by a^3 [nT m^3] and its time derivative.
    fn dipole(&self, t: f64) -> (NVec3, NVec3) {
        let a3 = GEOMAGNETIC_REFERENCE_RADIUS_M.powi(3);
        let year = self.start_year + t / SECONDS_PER_YEAR;
        let rot = Self::earth_rotation(t);

        let m = rot * self.coefficients.moment_ecef(year) * a3;
        let drift = rot * self.coefficients.moment_rate_ecef() * (a3 / SECONDS_PER_YEAR);
        let m_dot = NVec3::z().cross(&m) * EARTH_ROTATION_RATE + drift;
        (m, m_dot)
    }

    /// `3 (m.r) r / r^5 - m / r^3`
    fn dipole_field(m: &NVec3, r: &NVec3) -> NVec3 {
        let r2 = r.norm_squared();
        let r_norm = r2.sqrt();
        let r3 = r2 * r_norm;
        let r5 = r3 * r2;
        r * (3.0 * m.dot(r) / r5) - m / r3
    }

    /// Time derivative of [`dipole_field`](Self::dipole_field) for a point
    /// moving with velocity `v` through a static dipole.
    fn convective_rate(m: &NVec3, r: &NVec3, v: &NVec3) -> NVec3 {
        let r2 = r.norm_squared();
        let r5 = r2 * r2 * r2.sqrt();
        let r7 = r5 * r2;
        let m_r = m.dot(r);
        let r_v = r.dot(v);
        (r * m.dot(v) + v * m_r) * (3.0 / r5) - r * (15.0 * m_r * r_v / r7) + m * (3.0 * r_v / r5)
    }

    /// J2 perturbing acceleration [m/s^2].
    fn j2_acceleration(&self, r: &NVec3) -> NVec3 {
        let r2 = r.norm_squared();
        let r_norm = r2.sqrt();
        let z2_r2 = r.z * r.z / r2;
        let factor = -1.5 * EARTH_J2 * self.mu * EARTH_EQUATORIAL_RADIUS_M.powi(2) / (r2 * r2 * r_norm);
        NVec3::new(
            factor * r.x * (1.0 - 5.0 * z2_r2),
            factor * r.y * (1.0 - 5.0 * z2_r2),
            factor * r.z * (3.0 - 5.0 * z2_r2),
        )
    }

    fn sample(&self, t: f64, position: &NVec3, velocity: Option<&NVec3>) -> FieldSample {
        if position.norm() < MIN_FIELD_RADIUS_M {
            return FieldSample::zero();
        }
        let (m, m_dot) = self.dipole(t);
        let field = Self::dipole_field(&m, position) * NT_TO_T;
        let mut rate = Self::dipole_field(&m_dot, position);
        if let Some(v) = velocity {
            rate += Self::convective_rate(&m, position, v);
        }
        let gravity = if self.include_j2 {
            self.j2_acceleration(position)
        } else {
            NVec3::zeros()
        };
        FieldSample {
            magnetic_field: field,
            magnetic_field_rate: Some(rate * NT_TO_T),
            gravity,
        }
    }
}

impl Environment for DipoleEnvironment {
    fn evaluate(&self, t: f64, position: &NVec3) -> FieldSample {
        self.sample(t, position, None)
    }

    fn evaluate_along(&self, t: f64, position: &NVec3, velocity: &NVec3) -> FieldSample {
        self.sample(t, position, Some(velocity))
    }

    fn gravitational_parameter(&self) -> f64 {
        self.mu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    const LEO_RADIUS: f64 = EARTH_EQUATORIAL_RADIUS_M + 650e3;

    #[test]
    fn leo_field_magnitude() {
        let env = DipoleEnvironment::default();
        let points = [
            NVec3::new(LEO_RADIUS, 0.0, 0.0),
            NVec3::new(0.0, LEO_RADIUS, 0.0),
            NVec3::new(0.0, 0.0, LEO_RADIUS),
            NVec3::new(1.0, -1.0, 1.0).normalize() * LEO_RADIUS,
        ];
        for p in points {
            let b = env.evaluate(0.0, &p).magnetic_field.norm();
            assert!((20e-6..=60e-6).contains(&b), "|B| = {} T at {:?}", b, p);
        }
    }

    #[test]
    fn axial_coefficients_give_pole_to_equator_ratio_of_two() {
        let axial = DipoleCoefficients {
            g10: -30_000.0,
            g11: 0.0,
            h11: 0.0,
            g10_rate: 0.0,
            g11_rate: 0.0,
            h11_rate: 0.0,
            epoch: 2025.0,
        };
        let env = DipoleEnvironment::new(2025.0).with_coefficients(axial).with_j2(false);
        let pole = env.evaluate(0.0, &NVec3::new(0.0, 0.0, LEO_RADIUS));
        let equator = env.evaluate(0.0, &NVec3::new(LEO_RADIUS, 0.0, 0.0));

        assert_abs_diff_eq!(pole.magnetic_field.x, 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(pole.magnetic_field.y, 0.0, epsilon = 1e-15);
        assert!(pole.magnetic_field.z < 0.0);
        assert_relative_eq!(
            pole.magnetic_field.norm(),
            2.0 * equator.magnetic_field.norm(),
            max_relative = 1e-9
        );
        assert_eq!(pole.gravity, NVec3::zeros());
    }

    #[test]
    fn field_points_down_in_the_north() {
        let env = DipoleEnvironment::default();
        let p = NVec3::new(0.0, 0.0, LEO_RADIUS);
        assert!(env.evaluate(0.0, &p).magnetic_field.z < 0.0);
    }

    #[test]
    fn field_rate_matches_finite_difference() {
        let env = DipoleEnvironment::default();
        let r = NVec3::new(LEO_RADIUS * 0.6, -LEO_RADIUS * 0.48, LEO_RADIUS * 0.64);
        let v = NVec3::new(-3000.0, 4500.0, 5000.0);
        let t = 1234.0;
        let dt = 1e-2;

        let rate = env.evaluate_along(t, &r, &v).magnetic_field_rate.unwrap();
        let b_plus = env.evaluate(t + dt, &(r + v * dt)).magnetic_field;
        let b_minus = env.evaluate(t - dt, &(r - v * dt)).magnetic_field;
        let fd = (b_plus - b_minus) / (2.0 * dt);
        assert_abs_diff_eq!(rate, fd, epsilon = 1e-11);
    }

    #[test]
    fn static_point_only_sees_earth_rotation() {
        let env = DipoleEnvironment::default();
        let r = NVec3::new(LEO_RADIUS, 0.0, 0.0);
        let still = env.evaluate(0.0, &r).magnetic_field_rate.unwrap();
        let moving = env.evaluate_along(0.0, &r, &NVec3::zeros()).magnetic_field_rate.unwrap();
        assert_abs_diff_eq!(still, moving, epsilon = 1e-18);
        assert!(still.norm() < 1e-8);
    }

    #[test]
    fn j2_is_small_disturbance() {
        let env = DipoleEnvironment::default();
        let r = NVec3::new(LEO_RADIUS, 0.0, 0.0);
        let g = env.evaluate(0.0, &r).gravity;
        let central = EARTH_MU / (LEO_RADIUS * LEO_RADIUS);
        // equatorial J2 pulls inward at about 1.5 J2 (R/r)^2 of the central term
        assert!(g.x < 0.0);
        let expected = 1.5 * EARTH_J2 * (EARTH_EQUATORIAL_RADIUS_M / LEO_RADIUS).powi(2) * central;
        assert_relative_eq!(-g.x, expected, max_relative = 1e-9);

        let none = env.clone().with_j2(false).evaluate(0.0, &r).gravity;
        assert_eq!(none, NVec3::zeros());
    }

    #[test]
    fn origin_is_guarded() {
        let env = DipoleEnvironment::default();
        let s = env.evaluate(0.0, &NVec3::zeros());
        assert_eq!(s, FieldSample::zero());
    }

    #[test]
    fn test_doubles() {
        let c = ConstantField::new(NVec3::new(0.0, 3e-5, 0.0));
        let s = c.evaluate(10.0, &NVec3::x());
        assert_eq!(s.magnetic_field.y, 3e-5);
        assert_eq!(s.gravity, NVec3::zeros());
        assert_eq!(ZeroField::default().evaluate(0.0, &NVec3::x()), FieldSample::zero());
        assert_eq!(ZeroField::default().gravitational_parameter(), EARTH_MU);
    }
}
