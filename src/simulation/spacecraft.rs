//! Spacecraft aggregate: inertia, permanent magnet and hysteresis rods.
//!
//! Built once from configuration and only borrowed by the dynamics.

use nalgebra::Cholesky;

use super::error::ConfigError;
use super::hysteresis::HysteresisRod;
use super::magnet::PermanentMagnet;
use super::states::{NMat3, NVecX};

/// Relative asymmetry tolerated in a supplied inertia tensor.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Spacecraft {
    inertia: NMat3,
    inertia_inverse: NMat3,
    magnet: PermanentMagnet,
    rods: Vec<HysteresisRod>,
}

/// Principal inertia of a homogeneous box of mass `m` [kg] and edges
/// `a x b x c` [m].
pub fn box_inertia(m: f64, a: f64, b: f64, c: f64) -> NMat3 {
    NMat3::from_diagonal(&nalgebra::Vector3::new(
        m * (b * b + c * c) / 12.0,
        m * (a * a + c * c) / 12.0,
        m * (a * a + b * b) / 12.0,
    ))
}

impl Spacecraft {
    /// Validates that `inertia` is symmetric positive definite and
    /// precomputes its inverse.
    pub fn new(inertia: NMat3, magnet: PermanentMagnet, rods: Vec<HysteresisRod>) -> Result<Self, ConfigError> {
        if inertia.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidInertia("non-finite entries".into()));
        }
        let scale = inertia.amax().max(f64::MIN_POSITIVE);
        if (inertia - inertia.transpose()).amax() > SYMMETRY_TOLERANCE * scale {
            return Err(ConfigError::InvalidInertia("tensor is not symmetric".into()));
        }
        let inertia_inverse = Cholesky::new(inertia)
            .map(|chol| chol.inverse())
            .ok_or_else(|| ConfigError::InvalidInertia("tensor is not positive definite".into()))?;

        Ok(Self {
            inertia,
            inertia_inverse,
            magnet,
            rods,
        })
    }

    /// Box-shaped spacecraft of mass `mass` [kg] and edge lengths `dims` [m].
    pub fn from_box(
        mass: f64,
        dims: [f64; 3],
        magnet: PermanentMagnet,
        rods: Vec<HysteresisRod>,
    ) -> Result<Self, ConfigError> {
        ConfigError::ensure_positive("spacecraft mass", mass)?;
        for d in dims {
            ConfigError::ensure_positive("spacecraft dimension", d)?;
        }
        Self::new(box_inertia(mass, dims[0], dims[1], dims[2]), magnet, rods)
    }

    pub fn inertia(&self) -> &NMat3 {
        &self.inertia
    }

    pub fn inertia_inverse(&self) -> &NMat3 {
        &self.inertia_inverse
    }

    pub fn magnet(&self) -> &PermanentMagnet {
        &self.magnet
    }

    pub fn rods(&self) -> &[HysteresisRod] {
        &self.rods
    }

    pub fn num_rods(&self) -> usize {
        self.rods.len()
    }

    /// Clamp each rod magnetization into [-Ms, Ms]. Returns how many entries
    /// were changed.
    pub fn clamp_magnetizations(&self, magnetizations: &mut NVecX) -> usize {
        let mut clamped = 0;
        for (m, rod) in magnetizations.iter_mut().zip(&self.rods) {
            let c = rod.clamp_magnetization(*m);
            if c != *m {
                *m = c;
                clamped += 1;
            }
        }
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::hysteresis::JaParameters;
    use crate::simulation::states::NVec3;
    use approx::assert_abs_diff_eq;

    fn magnet() -> PermanentMagnet {
        PermanentMagnet::cylindrical(1.21, 0.05, 0.01, NVec3::z()).unwrap()
    }

    #[test]
    fn cube_inertia() {
        let i = box_inertia(12.0, 2.0, 2.0, 2.0);
        assert_abs_diff_eq!(i[(0, 0)], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(i[(1, 1)], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(i[(2, 2)], 8.0, epsilon = 1e-12);
        assert_abs_diff_eq!(i[(0, 1)], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn inverse_is_precomputed() {
        let sc = Spacecraft::from_box(1.3, [0.1, 0.1, 0.1], magnet(), Vec::new()).unwrap();
        let product = sc.inertia() * sc.inertia_inverse();
        assert_abs_diff_eq!(product, NMat3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn rejects_non_positive_definite_inertia() {
        let bad = NMat3::from_diagonal(&NVec3::new(1.0, -1.0, 1.0));
        assert!(Spacecraft::new(bad, magnet(), Vec::new()).is_err());

        let mut asym = NMat3::identity();
        asym[(0, 1)] = 0.5;
        assert!(Spacecraft::new(asym, magnet(), Vec::new()).is_err());
    }

    #[test]
    fn clamps_overshooting_rods() {
        let rod = HysteresisRod::new(1e-6, NVec3::x(), JaParameters::hymu80()).unwrap();
        let sc = Spacecraft::new(NMat3::identity(), magnet(), vec![rod.clone(), rod]).unwrap();
        let mut m = NVecX::from_vec(vec![7.0e5, -1.0e3]);
        assert_eq!(sc.clamp_magnetizations(&mut m), 1);
        assert_abs_diff_eq!(m[0], 6.0e5, epsilon = 1e-9);
        assert_abs_diff_eq!(m[1], -1.0e3, epsilon = 1e-9);
    }
}
