//! Physical constants and unit conversions shared by the simulation models

use std::f64::consts::PI;

/// Vacuum permeability mu_0 [T*m/A]
pub const VACUUM_PERMEABILITY: f64 = 1.256_637_062_12e-6;

/// Earth's gravitational parameter GM [m^3/s^2]
pub const EARTH_MU: f64 = 3.986_004_418e14;

/// WGS84 equatorial radius [m]
pub const EARTH_EQUATORIAL_RADIUS_M: f64 = 6_378_137.0;

/// Geomagnetic reference radius used by the IGRF/WMM coefficients [m]
pub const GEOMAGNETIC_REFERENCE_RADIUS_M: f64 = 6_371_200.0;

/// Earth's rotation rate [rad/s]
pub const EARTH_ROTATION_RATE: f64 = 7.292_115_0e-5;

/// Second zonal harmonic of the Earth's gravity field (WGS84)
pub const EARTH_J2: f64 = 1.082_63e-3;

pub const KM_TO_M: f64 = 1000.0;
pub const NT_TO_T: f64 = 1e-9;
pub const DEG_TO_RAD: f64 = PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / PI;
pub const TWO_PI: f64 = 2.0 * PI;

/// Julian year in seconds
pub const SECONDS_PER_YEAR: f64 = 365.25 * 24.0 * 3600.0;

/// Epoch of the geomagnetic dipole coefficients (decimal year)
pub const SIMULATION_START_YEAR: f64 = 2025.0;
