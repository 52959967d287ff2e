//! Keplerian elements and their conversion to ECI position/velocity.

use nalgebra::Rotation3;
use tracing::warn;

use super::constants::{EARTH_EQUATORIAL_RADIUS_M, KM_TO_M, TWO_PI};
use super::error::ConfigError;
use super::states::NVec3;

/// Convergence threshold of the Kepler equation solver [rad].
pub const KEPLER_TOLERANCE: f64 = 1e-9;
pub const KEPLER_MAX_ITERATIONS: usize = 100;

/// Classical orbital elements. Angles in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerianElements {
    pub semi_major_axis: f64,  // a [m]
    pub eccentricity: f64,     // e
    pub inclination: f64,      // i
    pub raan: f64,             // Omega
    pub arg_of_periapsis: f64, // omega
    pub mean_anomaly: f64,     // M at t = 0
}

impl KeplerianElements {
    /// Circular orbit at `altitude_km` above the equatorial radius.
    pub fn circular(altitude_km: f64, inclination: f64) -> Self {
        Self {
            semi_major_axis: EARTH_EQUATORIAL_RADIUS_M + altitude_km * KM_TO_M,
            eccentricity: 0.0,
            inclination,
            raan: 0.0,
            arg_of_periapsis: 0.0,
            mean_anomaly: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("semi-major axis", self.semi_major_axis)?;
        if !(0.0..1.0).contains(&self.eccentricity) {
            return Err(ConfigError::OutOfRange {
                name: "eccentricity",
                value: self.eccentricity,
                min: 0.0,
                max: 1.0,
            });
        }
        for (name, v) in [
            ("inclination", self.inclination),
            ("raan", self.raan),
            ("argument of periapsis", self.arg_of_periapsis),
            ("mean anomaly", self.mean_anomaly),
        ] {
            if !v.is_finite() {
                return Err(ConfigError::Invalid(format!("{} is not finite", name)));
            }
        }
        Ok(())
    }

    /// Orbital period [s].
    pub fn period(&self, mu: f64) -> f64 {
        TWO_PI * (self.semi_major_axis.powi(3) / mu).sqrt()
    }

    /// Solve M = E - e sin E by Newton-Raphson.
    pub fn eccentric_anomaly(&self) -> f64 {
        let e = self.eccentricity;
        let m = self.mean_anomaly;
        let mut ea = m;
        for _ in 0..KEPLER_MAX_ITERATIONS {
            let delta = ea - e * ea.sin() - m;
            if delta.abs() < KEPLER_TOLERANCE {
                return ea;
            }
            ea -= delta / (1.0 - e * ea.cos());
        }
        warn!(eccentricity = e, mean_anomaly = m, "Kepler solver did not converge");
        ea
    }

    pub fn true_anomaly(&self) -> f64 {
        let e = self.eccentricity;
        let ea = self.eccentric_anomaly();
        2.0 * (((1.0 + e) / (1.0 - e)).sqrt() * (0.5 * ea).tan()).atan()
    }

    /// ECI (position [m], velocity [m/s]).
    pub fn to_cartesian(&self, mu: f64) -> (NVec3, NVec3) {
        let e = self.eccentricity;
        let nu = self.true_anomaly();
        let p = self.semi_major_axis * (1.0 - e * e);
        let r = p / (1.0 + e * nu.cos());
        let h = (mu / p).sqrt();

        let r_pqw = NVec3::new(r * nu.cos(), r * nu.sin(), 0.0);
        let v_pqw = NVec3::new(-h * nu.sin(), h * (e + nu.cos()), 0.0);

        // 3-1-3: R3(Omega) R1(i) R3(omega)
        let pqw_to_eci = Rotation3::from_axis_angle(&NVec3::z_axis(), self.raan)
            * Rotation3::from_axis_angle(&NVec3::x_axis(), self.inclination)
            * Rotation3::from_axis_angle(&NVec3::z_axis(), self.arg_of_periapsis);

        (pqw_to_eci * r_pqw, pqw_to_eci * v_pqw)
    }
}
