//! Jiles-Atherton hysteresis rods.
//!
//! A rod is an immutable parameter holder: volume, a unit axis in the body
//! frame and the five J-A material parameters. The irreversible
//! magnetization itself lives in [`SystemState`](super::states::SystemState)
//! and is passed in on every query.
//!
//! Two derivative entry points are exposed:
//! - [`HysteresisRod::jiles_atherton_rate`] is the bare constitutive law
//! - [`HysteresisRod::magnetization_derivative_from_h`] wraps it with the
//!   static-field, saturation and causality guards used by the dynamics

use super::constants::VACUUM_PERMEABILITY;
use super::error::ConfigError;
use super::states::NVec3;

/// Below this |H_eff / a| the Langevin function switches to its Taylor series.
pub const LANGEVIN_EPSILON: f64 = 1e-4;
/// Minimum magnitude of the irreversible-slope denominator.
pub const DENOMINATOR_EPSILON: f64 = 1e-9;
/// |dH/dt| below this is treated as a static field.
pub const STATIC_FIELD_EPSILON: f64 = 1e-12;
/// Noise floor for the causality guard [A/m/s].
pub const CAUSALITY_TOLERANCE: f64 = 1e-9;
/// Lower bound on k in the irreversible slope ceiling Ms / max(k, floor).
pub const PINNING_FLOOR: f64 = 1.0;
const ORIENTATION_EPSILON: f64 = 1e-12;

/// Jiles-Atherton material parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JaParameters {
    pub ms: f64,    // saturation magnetization [A/m]
    pub a: f64,     // anhysteretic shape [A/m]
    pub k: f64,     // pinning / coercivity [A/m]
    pub c: f64,     // reversibility [0, 1]
    pub alpha: f64, // inter-domain coupling
}

impl JaParameters {
    /// HyMu-80 soft permalloy.
    pub fn hymu80() -> Self {
        Self {
            ms: 6.0e5,
            a: 6.5,
            k: 4.0,
            c: 0.05,
            alpha: 1.0e-5,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::ensure_positive("ms", self.ms)?;
        ConfigError::ensure_positive("a", self.a)?;
        ConfigError::ensure_positive("k", self.k)?;
        ConfigError::ensure_range("c", self.c, 0.0, 1.0)?;
        ConfigError::ensure_range("alpha", self.alpha, 0.0, f64::INFINITY)?;
        Ok(())
    }
}

impl Default for JaParameters {
    fn default() -> Self {
        Self::hymu80()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HysteresisRod {
    volume: f64,
    orientation: NVec3,
    params: JaParameters,
}

impl HysteresisRod {
    /// Build a rod, normalizing `orientation`.
    pub fn new(volume: f64, orientation: NVec3, params: JaParameters) -> Result<Self, ConfigError> {
        ConfigError::ensure_positive("rod volume", volume)?;
        params.validate()?;
        let norm = orientation.norm();
        if !norm.is_finite() || norm < ORIENTATION_EPSILON {
            return Err(ConfigError::ZeroOrientation {
                name: "rod orientation",
            });
        }
        Ok(Self {
            volume,
            orientation: orientation / norm,
            params,
        })
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn orientation(&self) -> &NVec3 {
        &self.orientation
    }

    pub fn params(&self) -> &JaParameters {
        &self.params
    }

    pub fn saturation(&self) -> f64 {
        self.params.ms
    }

    pub fn clamp_magnetization(&self, m: f64) -> f64 {
        m.clamp(-self.params.ms, self.params.ms)
    }

    /// H along the rod axis [A/m] for a body-frame flux density [T].
    pub fn field_along_axis(&self, b_body: &NVec3) -> f64 {
        b_body.dot(&self.orientation) / VACUUM_PERMEABILITY
    }

    /// dH/dt along the rod axis [A/m/s] for a body-frame dB/dt [T/s].
    pub fn field_rate_along_axis(&self, b_dot_body: &NVec3) -> f64 {
        b_dot_body.dot(&self.orientation) / VACUUM_PERMEABILITY
    }

    /// Langevin anhysteretic magnetization and its slope at `h_eff`.
    pub fn anhysteretic(&self, h_eff: f64) -> (f64, f64) {
        let JaParameters { ms, a, .. } = self.params;
        let x = h_eff / a;
        if x.abs() < LANGEVIN_EPSILON {
            // closed form cancels catastrophically down here
            let x2 = x * x;
            let man = ms * x * (1.0 / 3.0 - x2 / 45.0 + 2.0 * x2 * x2 / 945.0);
            let dman = ms / a * (1.0 / 3.0 - x2 / 15.0 + 2.0 * x2 * x2 / 189.0);
            (man, dman)
        } else {
            let t = x.tanh();
            let man = ms * (1.0 / t - 1.0 / x);
            let dman = ms / a * (1.0 - 1.0 / (t * t) + 1.0 / (x * x));
            (man, dman)
        }
    }

    /// Irreversible slope dMirr/dH with the signed-epsilon denominator and
    /// the Ms / max(k, floor) ceiling.
    fn irreversible_slope(&self, man: f64, m: f64, delta: f64) -> f64 {
        let JaParameters { ms, k, alpha, .. } = self.params;
        let numerator = man - m;
        let mut denominator = k * delta - alpha * numerator;
        if denominator.abs() < DENOMINATOR_EPSILON {
            if numerator.abs() < DENOMINATOR_EPSILON {
                return 0.0;
            }
            denominator = DENOMINATOR_EPSILON.copysign(denominator);
        }
        let ceiling = ms / k.max(PINNING_FLOOR);
        (numerator / denominator).clamp(-ceiling, ceiling)
    }

    /// Unguarded J-A rate dM/dt for magnetization `m`, axial field `h` and
    /// its rate `dh_dt`.
    pub fn jiles_atherton_rate(&self, m: f64, h: f64, dh_dt: f64) -> f64 {
        let c = self.params.c;
        let m_clamped = self.clamp_magnetization(m);
        let h_eff = h + self.params.alpha * m_clamped;
        let (man, dman) = self.anhysteretic(h_eff);

        // direction of the field sweep, not of the field
        let delta = if dh_dt >= 0.0 { 1.0 } else { -1.0 };
        let dmirr = self.irreversible_slope(man, m_clamped, delta);

        let dm_dh = (1.0 - c) * dmirr + c * dman;
        dm_dh * dh_dt
    }

    /// Rod magnetization rate used by the dynamics.
    ///
    /// Returns exactly 0 for a static field or when already saturated in the
    /// driving direction, and clamps to 0 any rate that opposes the sweep
    /// direction by more than [`CAUSALITY_TOLERANCE`].
    pub fn magnetization_derivative_from_h(&self, m: f64, h: f64, dh_dt: f64) -> f64 {
        if dh_dt.abs() < STATIC_FIELD_EPSILON {
            return 0.0;
        }
        let ms = self.params.ms;
        if (m >= ms && dh_dt > 0.0) || (m <= -ms && dh_dt < 0.0) {
            return 0.0;
        }

        let rate = self.jiles_atherton_rate(m, h, dh_dt);
        if !rate.is_finite() {
            return 0.0;
        }
        if (dh_dt > 0.0 && rate < -CAUSALITY_TOLERANCE) || (dh_dt < 0.0 && rate > CAUSALITY_TOLERANCE) {
            return 0.0;
        }
        rate
    }

    /// Rate for a body-frame field `b_body` and body-frame field rate
    /// `b_dot_body`.
    pub fn magnetization_derivative_from_field_rate(&self, m: f64, b_body: &NVec3, b_dot_body: &NVec3) -> f64 {
        let h = self.field_along_axis(b_body);
        let dh_dt = self.field_rate_along_axis(b_dot_body);
        self.magnetization_derivative_from_h(m, h, dh_dt)
    }

    /// Rate for a body-frame field seen by a body spinning at `omega`.
    ///
    /// Only the rotational part of the field rate, -omega x B, is included.
    pub fn magnetization_derivative(&self, m: f64, b_body: &NVec3, omega: &NVec3) -> f64 {
        let b_dot_body = -omega.cross(b_body);
        self.magnetization_derivative_from_field_rate(m, b_body, &b_dot_body)
    }

    /// Total magnetization (1 - c) M + c Man in the field `b_body`.
    pub fn total_magnetization(&self, m: f64, b_body: &NVec3) -> f64 {
        let c = self.params.c;
        let m_clamped = self.clamp_magnetization(m);
        let h_eff = self.field_along_axis(b_body) + self.params.alpha * m_clamped;
        let (man, _) = self.anhysteretic(h_eff);
        (1.0 - c) * m_clamped + c * man
    }

    /// Moment [A m^2] of a rod carrying total magnetization `m_total`.
    pub fn magnetic_moment(&self, m_total: f64) -> NVec3 {
        self.orientation * (m_total * self.volume)
    }

    /// Moment of a rod with irreversible magnetization `m` in field `b_body`.
    pub fn magnetic_moment_in_field(&self, m: f64, b_body: &NVec3) -> NVec3 {
        self.magnetic_moment(self.total_magnetization(m, b_body))
    }
}
