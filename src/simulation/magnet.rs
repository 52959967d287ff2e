//! Permanent bar magnet
//!
//! The magnet contributes a constant body-frame dipole moment
//! `m = Br / mu_0 * V * unit(orientation)`.

use std::f64::consts::PI;

use super::constants::VACUUM_PERMEABILITY;
use super::error::ConfigError;
use super::states::NVec3;

/// Reversible temperature coefficient of remanence for NdFeB [1/degC].
pub const NDFEB_TEMPERATURE_COEFFICIENT: f64 = -0.0002;
/// Temperature at which remanence grades are specified [degC].
pub const REFERENCE_TEMPERATURE_C: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PermanentMagnet {
    remanence: f64,    // [T]
    volume: f64,       // [m^3]
    orientation: NVec3, // unit, body frame
}

impl PermanentMagnet {
    pub fn new(remanence: f64, volume: f64, orientation: NVec3) -> Result<Self, ConfigError> {
        ConfigError::ensure_positive("magnet remanence", remanence)?;
        ConfigError::ensure_positive("magnet volume", volume)?;
        let norm = orientation.norm();
        if !norm.is_finite() || norm < 1e-12 {
            return Err(ConfigError::ZeroOrientation { name: "magnet" });
        }
        Ok(Self {
            remanence,
            volume,
            orientation: orientation / norm,
        })
    }

    /// Cylinder of the given length and diameter [m].
    pub fn cylindrical(remanence: f64, length: f64, diameter: f64, orientation: NVec3) -> Result<Self, ConfigError> {
        ConfigError::ensure_positive("magnet length", length)?;
        ConfigError::ensure_positive("magnet diameter", diameter)?;
        let radius = 0.5 * diameter;
        Self::new(remanence, PI * radius * radius * length, orientation)
    }

    /// Rectangular block `width x height x length` [m].
    pub fn rectangular(
        remanence: f64,
        width: f64,
        height: f64,
        length: f64,
        orientation: NVec3,
    ) -> Result<Self, ConfigError> {
        ConfigError::ensure_positive("magnet width", width)?;
        ConfigError::ensure_positive("magnet height", height)?;
        ConfigError::ensure_positive("magnet length", length)?;
        Self::new(remanence, width * height * length, orientation)
    }

    /// Same magnet at `temperature_c`, remanence scaled by
    /// `1 + coefficient * (T - T_ref)`.
    pub fn with_temperature(
        &self,
        temperature_c: f64,
        coefficient: f64,
        reference_c: f64,
    ) -> Result<Self, ConfigError> {
        let factor = 1.0 + coefficient * (temperature_c - reference_c);
        Self::new(self.remanence * factor, self.volume, self.orientation)
    }

    pub fn remanence(&self) -> f64 {
        self.remanence
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn orientation(&self) -> &NVec3 {
        &self.orientation
    }

    /// Body-frame dipole moment [A m^2].
    pub fn magnetic_moment(&self) -> NVec3 {
        self.orientation * (self.remanence / VACUUM_PERMEABILITY * self.volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn moment_follows_orientation() {
        let magnet = PermanentMagnet::cylindrical(1.0, 0.1, 0.02, NVec3::new(1.0, 0.0, 2.0)).unwrap();
        let dir = NVec3::new(1.0, 0.0, 2.0).normalize();
        assert_abs_diff_eq!(magnet.magnetic_moment().normalize().dot(&dir), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn cylinder_moment_magnitude() {
        let magnet = PermanentMagnet::cylindrical(1.0, 0.1, 0.02, NVec3::z()).unwrap();
        let volume = PI * 0.01 * 0.01 * 0.1;
        assert_relative_eq!(magnet.magnetic_moment().norm(), volume / VACUUM_PERMEABILITY, max_relative = 1e-12);
    }

    #[test]
    fn n52_bar_magnet() {
        let magnet = PermanentMagnet::cylindrical(1.45, 0.05, 0.01, NVec3::z()).unwrap();
        assert_relative_eq!(magnet.magnetic_moment().z, 4.53, max_relative = 1e-3);
    }

    #[test]
    fn rectangular_volume() {
        let magnet = PermanentMagnet::rectangular(1.2, 0.01, 0.02, 0.03, NVec3::x()).unwrap();
        assert_relative_eq!(magnet.volume(), 6.0e-6, max_relative = 1e-12);
    }

    #[test]
    fn heating_reduces_remanence() {
        let magnet = PermanentMagnet::cylindrical(1.21, 0.05, 0.01, NVec3::z()).unwrap();
        let hot = magnet
            .with_temperature(70.0, NDFEB_TEMPERATURE_COEFFICIENT, REFERENCE_TEMPERATURE_C)
            .unwrap();
        assert_relative_eq!(hot.remanence(), 1.21 * 0.99, max_relative = 1e-12);
        assert!(hot.magnetic_moment().norm() < magnet.magnetic_moment().norm());
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(PermanentMagnet::new(0.0, 1e-6, NVec3::z()).is_err());
        assert!(PermanentMagnet::new(1.0, -1e-6, NVec3::z()).is_err());
        assert!(PermanentMagnet::new(1.0, 1e-6, NVec3::zeros()).is_err());
        assert!(PermanentMagnet::cylindrical(1.0, 0.0, 0.01, NVec3::z()).is_err());
    }
}
