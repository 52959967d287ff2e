//! Adaptive-step embedded Runge-Kutta integrators
//!
//! Provides a Dormand-Prince 5(4) and a Fehlberg 7(8) pair behind one
//! driver, generic over any [`OdeState`]:
//! - `try_step` takes one trial step and reports the scaled error norm
//! - `advance` runs the accept/reject loop between two times
//! - `integrate` additionally observes the initial condition
//!
//! Both pairs propagate the higher-order solution. The observer sees the
//! initial state and then every accepted step, in increasing time order.

use tracing::{debug, trace};

use super::error::IntegrationError;
use super::states::OdeState;

/// Right-hand side of an ODE `y' = f(t, y)`.
pub trait OdeSystem<S> {
    fn rhs(&self, t: f64, y: &S) -> S;

    /// Hook applied to every accepted state (e.g. quaternion renormalization).
    fn post_step(&self, _y: &mut S) {}
}

impl<S, F> OdeSystem<S> for F
where
    F: Fn(f64, &S) -> S,
{
    fn rhs(&self, t: f64, y: &S) -> S {
        self(t, y)
    }
}

/// Receives the initial state and every accepted state.
pub trait Observer<S> {
    fn observe(&mut self, state: &S, t: f64);
}

impl<S, F> Observer<S> for F
where
    F: FnMut(&S, f64),
{
    fn observe(&mut self, state: &S, t: f64) {
        self(state, t)
    }
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl<S> Observer<S> for NullObserver {
    fn observe(&mut self, _state: &S, _t: f64) {}
}

/// Coefficients of an embedded explicit Runge-Kutta pair.
#[derive(Debug)]
pub struct ButcherTableau {
    pub name: &'static str,
    pub c: &'static [f64],
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],     // propagated (higher order) weights
    pub b_low: &'static [f64], // embedded (lower order) weights
    pub low_order: u32,
}

impl ButcherTableau {
    pub fn stages(&self) -> usize {
        self.c.len()
    }

    /// Exponent 1 / (q + 1) of the step-size law, q the embedded order.
    pub fn error_exponent(&self) -> f64 {
        1.0 / f64::from(self.low_order + 1)
    }
}

pub const DORMAND_PRINCE_54: ButcherTableau = ButcherTableau {
    name: "dopri5",
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
        &[9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
        &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
    ],
    b: &[35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0, 0.0],
    b_low: &[
        5179.0 / 57600.0,
        0.0,
        7571.0 / 16695.0,
        393.0 / 640.0,
        -92097.0 / 339200.0,
        187.0 / 2100.0,
        1.0 / 40.0,
    ],
    low_order: 4,
};

pub const FEHLBERG_78: ButcherTableau = ButcherTableau {
    name: "rkf78",
    c: &[
        0.0,
        2.0 / 27.0,
        1.0 / 9.0,
        1.0 / 6.0,
        5.0 / 12.0,
        1.0 / 2.0,
        5.0 / 6.0,
        1.0 / 6.0,
        2.0 / 3.0,
        1.0 / 3.0,
        1.0,
        0.0,
        1.0,
    ],
    a: &[
        &[],
        &[2.0 / 27.0],
        &[1.0 / 36.0, 1.0 / 12.0],
        &[1.0 / 24.0, 0.0, 1.0 / 8.0],
        &[5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0],
        &[1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0],
        &[-25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0],
        &[31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0],
        &[2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0],
        &[
            -91.0 / 108.0,
            0.0,
            0.0,
            23.0 / 108.0,
            -976.0 / 135.0,
            311.0 / 54.0,
            -19.0 / 60.0,
            17.0 / 6.0,
            -1.0 / 12.0,
        ],
        &[
            2383.0 / 4100.0,
            0.0,
            0.0,
            -341.0 / 164.0,
            4496.0 / 1025.0,
            -301.0 / 82.0,
            2133.0 / 4100.0,
            45.0 / 82.0,
            45.0 / 164.0,
            18.0 / 41.0,
        ],
        &[3.0 / 205.0, 0.0, 0.0, 0.0, 0.0, -6.0 / 41.0, -3.0 / 205.0, -3.0 / 41.0, 3.0 / 41.0, 6.0 / 41.0, 0.0],
        &[
            -1777.0 / 4100.0,
            0.0,
            0.0,
            -341.0 / 164.0,
            4496.0 / 1025.0,
            -289.0 / 82.0,
            2193.0 / 4100.0,
            51.0 / 82.0,
            33.0 / 164.0,
            12.0 / 41.0,
            0.0,
            1.0,
        ],
    ],
    b: &[
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        34.0 / 105.0,
        9.0 / 35.0,
        9.0 / 35.0,
        9.0 / 280.0,
        9.0 / 280.0,
        0.0,
        41.0 / 840.0,
        41.0 / 840.0,
    ],
    b_low: &[
        41.0 / 840.0,
        0.0,
        0.0,
        0.0,
        0.0,
        34.0 / 105.0,
        9.0 / 35.0,
        9.0 / 35.0,
        9.0 / 280.0,
        9.0 / 280.0,
        41.0 / 840.0,
        0.0,
        0.0,
    ],
    low_order: 7,
};

/// Which embedded pair drives the integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMethod {
    #[default]
    DormandPrince54,
    Fehlberg78,
}

impl IntegrationMethod {
    pub fn from_higher_order(higher_order: bool) -> Self {
        if higher_order {
            Self::Fehlberg78
        } else {
            Self::DormandPrince54
        }
    }

    pub fn tableau(&self) -> &'static ButcherTableau {
        match self {
            Self::DormandPrince54 => &DORMAND_PRINCE_54,
            Self::Fehlberg78 => &FEHLBERG_78,
        }
    }
}

/// Mixed absolute/relative error tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub absolute: f64,
    pub relative: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            absolute: 1e-6,
            relative: 1e-6,
        }
    }
}

impl Tolerances {
    pub fn validate(&self) -> Result<(), IntegrationError> {
        let ok = |v: f64| v.is_finite() && v >= 0.0;
        if !ok(self.absolute) || !ok(self.relative) || (self.absolute == 0.0 && self.relative == 0.0) {
            return Err(IntegrationError::InvalidInput(format!(
                "tolerances must be non-negative and not both zero (atol = {}, rtol = {})",
                self.absolute, self.relative
            )));
        }
        Ok(())
    }
}

/// Step-size law `h_new = h * clamp(safety * err^-exponent, min_shrink, max_growth)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepController {
    pub safety: f64,
    pub max_growth: f64,
    pub min_shrink: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_growth: 5.0,
            min_shrink: 0.1,
        }
    }
}

impl StepController {
    /// Step-size factor for a scaled error norm.
    pub fn factor(&self, error: f64, exponent: f64) -> f64 {
        if !error.is_finite() {
            return self.min_shrink;
        }
        if error == 0.0 {
            return self.max_growth;
        }
        let raw = self.safety * error.powf(-exponent);
        let factor = raw.clamp(self.min_shrink, self.max_growth);
        if error > 1.0 {
            // a rejected step must always shrink
            factor.min(self.safety)
        } else {
            factor
        }
    }
}

/// Counters accumulated across integration calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntegrationStats {
    pub fn_evals: u64,
    pub accepted_steps: u64,
    pub rejected_steps: u64,
}

impl std::ops::AddAssign for IntegrationStats {
    fn add_assign(&mut self, rhs: Self) {
        self.fn_evals += rhs.fn_evals;
        self.accepted_steps += rhs.accepted_steps;
        self.rejected_steps += rhs.rejected_steps;
    }
}

/// Outcome of one trial step.
#[derive(Debug, Clone)]
pub struct StepResult<S> {
    pub state: S,      // candidate solution at t + h_used
    pub t: f64,        // t + h_used
    pub error: f64,    // scaled error norm, accepted iff <= 1
    pub h_used: f64,
    pub h_next: f64,
    pub accepted: bool,
}

/// Embedded Runge-Kutta driver with adaptive step-size control.
#[derive(Debug, Clone)]
pub struct AdaptiveIntegrator {
    tableau: &'static ButcherTableau,
    tolerances: Tolerances,
    controller: StepController,
    max_steps: u64,
    stats: IntegrationStats,
}

pub const DEFAULT_MAX_STEPS: u64 = 50_000_000;

impl AdaptiveIntegrator {
    pub fn new(method: IntegrationMethod, tolerances: Tolerances) -> Result<Self, IntegrationError> {
        tolerances.validate()?;
        Ok(Self {
            tableau: method.tableau(),
            tolerances,
            controller: StepController::default(),
            max_steps: DEFAULT_MAX_STEPS,
            stats: IntegrationStats::default(),
        })
    }

    /// Maximum number of step attempts (accepted + rejected) per call.
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_controller(mut self, controller: StepController) -> Self {
        self.controller = controller;
        self
    }

    pub fn tableau(&self) -> &'static ButcherTableau {
        self.tableau
    }

    pub fn tolerances(&self) -> &Tolerances {
        &self.tolerances
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = IntegrationStats::default();
    }

    /// One trial step of size `h` from `(t, y)`. Does not advance anything;
    /// the caller decides what to do with a rejected step.
    pub fn try_step<S, F>(&mut self, system: &F, y: &S, t: f64, h: f64) -> StepResult<S>
    where
        S: OdeState,
        F: OdeSystem<S> + ?Sized,
    {
        let tab = self.tableau;
        let mut k: Vec<S> = Vec::with_capacity(tab.stages());
        k.push(system.rhs(t, y));

        for (i, row) in tab.a.iter().enumerate().skip(1) {
            let mut yi = y.clone();
            for (aij, kj) in row.iter().zip(&k) {
                if *aij != 0.0 {
                    yi.add_scaled(h * aij, kj);
                }
            }
            k.push(system.rhs(t + tab.c[i] * h, &yi));
        }
        self.stats.fn_evals += tab.stages() as u64;

        let mut y_new = y.clone();
        let mut err = y.zeros_like();
        for ((bi, bli), ki) in tab.b.iter().zip(tab.b_low).zip(&k) {
            if *bi != 0.0 {
                y_new.add_scaled(h * bi, ki);
            }
            let e = bi - bli;
            if e != 0.0 {
                err.add_scaled(h * e, ki);
            }
        }

        let error = if y_new.is_finite() {
            err.error_norm(y, &y_new, self.tolerances.absolute, self.tolerances.relative)
        } else {
            f64::INFINITY
        };
        let accepted = error <= 1.0;
        let h_next = h * self.controller.factor(error, tab.error_exponent());

        StepResult {
            state: y_new,
            t: t + h,
            error,
            h_used: h,
            h_next,
            accepted,
        }
    }

    /// Integrate from `t0` to `t1`, observing `y0` and every accepted step.
    pub fn integrate<S, F, O>(
        &mut self,
        system: &F,
        y0: S,
        t0: f64,
        t1: f64,
        h0: f64,
        observer: &mut O,
    ) -> Result<S, IntegrationError>
    where
        S: OdeState,
        F: OdeSystem<S> + ?Sized,
        O: Observer<S> + ?Sized,
    {
        let mut y = y0;
        observer.observe(&y, t0);
        self.advance(system, &mut y, t0, t1, h0, observer, true)?;
        Ok(y)
    }

    /// Advance `y` in place from `t0` to `t1`, starting with step `h0`.
    ///
    /// Every accepted step is passed through `system.post_step` and then
    /// observed, except the one landing on `t1` when `observe_last` is
    /// false. Returns the proposed size of the next step.
    #[allow(clippy::too_many_arguments)]
    pub fn advance<S, F, O>(
        &mut self,
        system: &F,
        y: &mut S,
        t0: f64,
        t1: f64,
        h0: f64,
        observer: &mut O,
        observe_last: bool,
    ) -> Result<f64, IntegrationError>
    where
        S: OdeState,
        F: OdeSystem<S> + ?Sized,
        O: Observer<S> + ?Sized,
    {
        if !(t0.is_finite() && t1.is_finite()) || t1 < t0 {
            return Err(IntegrationError::InvalidInput(format!(
                "invalid time span [{}, {}]",
                t0, t1
            )));
        }
        if !(h0.is_finite() && h0 > 0.0) {
            return Err(IntegrationError::InvalidInput(format!("initial step must be positive, got {}", h0)));
        }
        if !y.is_finite() {
            return Err(IntegrationError::NonFiniteState { t: t0 });
        }

        let mut t = t0;
        let mut h = h0;
        let mut attempts: u64 = 0;
        let span_eps = 100.0 * f64::EPSILON * t1.abs().max(1.0);

        while t < t1 {
            let remaining = t1 - t;
            let last = h >= remaining || remaining - h <= span_eps;
            let step = if last { remaining } else { h };

            if step < f64::EPSILON * t.abs().max(1.0) {
                return Err(IntegrationError::StepSizeUnderflow { t, h: step });
            }
            attempts += 1;
            if attempts > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded {
                    t,
                    max_steps: self.max_steps,
                });
            }

            let result = self.try_step(system, y, t, step);
            if result.accepted {
                self.stats.accepted_steps += 1;
                *y = result.state;
                system.post_step(y);
                if !y.is_finite() {
                    return Err(IntegrationError::NonFiniteState { t: result.t });
                }
                t = if last { t1 } else { result.t };
                if t < t1 || observe_last {
                    observer.observe(y, t);
                }
                // a truncated final step says nothing about the natural step size
                h = if last { h.max(result.h_next) } else { result.h_next };
            } else {
                self.stats.rejected_steps += 1;
                trace!(t, h = step, error = result.error, "step rejected");
                h = result.h_next;
            }
        }

        debug!(
            method = self.tableau.name,
            t0,
            t1,
            attempts,
            "integration interval complete"
        );
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn decay(_t: f64, y: &f64) -> f64 {
        -y
    }

    #[test]
    fn tableau_rows_sum_to_nodes() {
        for tab in [&DORMAND_PRINCE_54, &FEHLBERG_78] {
            assert_eq!(tab.a.len(), tab.stages());
            assert_eq!(tab.b.len(), tab.stages());
            assert_eq!(tab.b_low.len(), tab.stages());
            for (row, c) in tab.a.iter().zip(tab.c) {
                let sum: f64 = row.iter().sum();
                assert!((sum - c).abs() < 1e-14, "{}: row sum {} != {}", tab.name, sum, c);
            }
            let b: f64 = tab.b.iter().sum();
            let bl: f64 = tab.b_low.iter().sum();
            assert!((b - 1.0).abs() < 1e-14 && (bl - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn exponential_decay_both_methods() {
        for method in [IntegrationMethod::DormandPrince54, IntegrationMethod::Fehlberg78] {
            let mut integ = AdaptiveIntegrator::new(
                method,
                Tolerances {
                    absolute: 1e-10,
                    relative: 1e-10,
                },
            )
            .unwrap();
            let y = integ.integrate(&decay, 1.0, 0.0, 5.0, 0.1, &mut NullObserver).unwrap();
            assert_relative_eq!(y, (-5.0f64).exp(), max_relative = 1e-7);
            let stats = integ.stats();
            assert!(stats.accepted_steps > 0);
            assert_eq!(
                stats.fn_evals,
                (stats.accepted_steps + stats.rejected_steps) * integ.tableau().stages() as u64
            );
        }
    }

    #[test]
    fn observer_sees_initial_and_increasing_times() {
        let mut integ = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, Tolerances::default()).unwrap();
        let mut times = Vec::new();
        let mut obs = |_: &f64, t: f64| times.push(t);
        integ.integrate(&decay, 1.0, 0.0, 3.0, 0.01, &mut obs).unwrap();
        assert_eq!(times[0], 0.0);
        assert_eq!(*times.last().unwrap(), 3.0);
        assert!(times.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(times.len() as u64, integ.stats().accepted_steps + 1);
    }

    #[test]
    fn accepted_steps_within_tolerance_rejections_shrink() {
        // stiff-ish forcing to provoke rejections from a too-large first step
        let f = |t: f64, y: &f64| -50.0 * (y - t.sin());
        let mut integ = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, Tolerances::default()).unwrap();
        let mut t = 0.0;
        let mut y = 0.0;
        let mut h: f64 = 1.0;
        let mut saw_rejection = false;
        while t < 2.0 {
            let step = h.min(2.0 - t);
            let r = integ.try_step(&f, &y, t, step);
            if r.accepted {
                assert!(r.error <= 1.0);
                y = r.state;
                t = r.t;
            } else {
                saw_rejection = true;
                assert!(r.h_next < step, "retry {} not smaller than {}", r.h_next, step);
            }
            h = r.h_next;
        }
        assert!(saw_rejection);
    }

    #[test]
    fn controller_bounds() {
        let c = StepController::default();
        assert_eq!(c.factor(0.0, 0.2), 5.0);
        assert_eq!(c.factor(1e12, 0.2), 0.1);
        assert_eq!(c.factor(f64::NAN, 0.2), 0.1);
        assert!(c.factor(1.0000001, 0.2) < 1.0);
    }

    #[test]
    fn tighter_controller_takes_more_steps() {
        let tol = Tolerances::default();
        let mut loose = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, tol).unwrap();
        let mut cautious = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, tol)
            .unwrap()
            .with_controller(StepController {
                safety: 0.5,
                max_growth: 1.5,
                min_shrink: 0.1,
            });
        let y_loose = loose.integrate(&decay, 1.0, 0.0, 2.0, 1e-3, &mut NullObserver).unwrap();
        let y_cautious = cautious.integrate(&decay, 1.0, 0.0, 2.0, 1e-3, &mut NullObserver).unwrap();
        assert_relative_eq!(y_loose, (-2.0f64).exp(), max_relative = 1e-4);
        assert_relative_eq!(y_cautious, (-2.0f64).exp(), max_relative = 1e-4);
        assert!(cautious.stats().accepted_steps > loose.stats().accepted_steps);
    }

    #[test]
    fn stats_accumulate_until_reset() {
        let mut integ = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, Tolerances::default()).unwrap();
        integ.integrate(&decay, 1.0, 0.0, 1.0, 1e-3, &mut NullObserver).unwrap();
        let first = integ.stats();
        integ.integrate(&decay, 1.0, 0.0, 1.0, 1e-3, &mut NullObserver).unwrap();
        assert_eq!(integ.stats().accepted_steps, 2 * first.accepted_steps);
        assert_eq!(integ.stats().fn_evals, 2 * first.fn_evals);

        integ.reset_stats();
        assert_eq!(integ.stats(), IntegrationStats::default());
    }

    #[test]
    fn max_steps_is_reported() {
        let mut integ = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, Tolerances::default())
            .unwrap()
            .with_max_steps(3);
        let err = integ.integrate(&decay, 1.0, 0.0, 100.0, 1e-3, &mut NullObserver).unwrap_err();
        assert!(matches!(err, IntegrationError::MaxStepsExceeded { max_steps: 3, .. }));
    }

    #[test]
    fn blow_up_is_reported() {
        // y' = y^2 reaches infinity at t = 1
        let f = |_t: f64, y: &f64| y * y;
        let mut integ = AdaptiveIntegrator::new(IntegrationMethod::DormandPrince54, Tolerances::default()).unwrap();
        let err = integ.integrate(&f, 1.0, 0.0, 2.0, 0.1, &mut NullObserver).unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::StepSizeUnderflow { .. }
                | IntegrationError::MaxStepsExceeded { .. }
                | IntegrationError::NonFiniteState { .. }
        ));
    }

    #[test]
    fn invalid_inputs() {
        assert!(AdaptiveIntegrator::new(
            IntegrationMethod::Fehlberg78,
            Tolerances {
                absolute: 0.0,
                relative: 0.0
            }
        )
        .is_err());
        let mut integ = AdaptiveIntegrator::new(IntegrationMethod::Fehlberg78, Tolerances::default()).unwrap();
        assert!(integ.integrate(&decay, 1.0, 1.0, 0.0, 0.1, &mut NullObserver).is_err());
        assert!(integ.integrate(&decay, 1.0, 0.0, 1.0, 0.0, &mut NullObserver).is_err());
        assert!(integ.integrate(&decay, f64::NAN, 0.0, 1.0, 0.1, &mut NullObserver).is_err());
    }
}
