use std::hint::black_box;
use std::time::Instant;

use crate::simulation::dynamics::SpacecraftDynamics;
use crate::simulation::environment::DipoleEnvironment;
use crate::simulation::error::SimulationError;
use crate::simulation::hysteresis::{HysteresisRod, JaParameters};
use crate::simulation::integrator::{AdaptiveIntegrator, IntegrationMethod, NullObserver, Tolerances};
use crate::simulation::magnet::PermanentMagnet;
use crate::simulation::orbit::KeplerianElements;
use crate::simulation::spacecraft::Spacecraft;
use crate::simulation::constants::{EARTH_MU, VACUUM_PERMEABILITY};
use crate::simulation::states::{NVec3, NVecX, SystemState};

/// Default 1.3 kg, 10 cm cube with an N35 magnet along +Z and `num_rods`
/// HyMu-80 rods alternating between the X and Y axes.
fn bench_spacecraft(num_rods: usize) -> Result<Spacecraft, SimulationError> {
    let magnet = PermanentMagnet::cylindrical(1.21, 0.05, 0.01, NVec3::z())?;
    let axes = [NVec3::x(), -NVec3::x(), NVec3::y(), -NVec3::y()];
    let rods = (0..num_rods)
        .map(|i| HysteresisRod::new(7.85e-6, axes[i % axes.len()], JaParameters::hymu80()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Spacecraft::from_box(1.3, [0.1, 0.1, 0.1], magnet, rods)?)
}

fn bench_state(num_rods: usize) -> SystemState {
    let (position, velocity) = KeplerianElements::circular(650.0, 51f64.to_radians()).to_cartesian(EARTH_MU);
    let mut state = SystemState::new(num_rods);
    state.position = position;
    state.velocity = velocity;
    state.angular_velocity = NVec3::new(0.1, -0.05, 0.08);
    state.rod_magnetizations = NVecX::from_fn(num_rods, |i, _| 1.0e3 * (i as f64 + 1.0));
    state
}

pub fn bench_rod_derivative() -> Result<(), SimulationError> {
    let rod = HysteresisRod::new(1.0, NVec3::x(), JaParameters::hymu80())?;
    let calls = [10_000usize, 100_000, 1_000_000];

    for n in calls {
        let b = NVec3::new(2.5e-5, -1.0e-5, 3.0e-5);
        let omega = NVec3::new(0.1, -0.05, 0.08);

        // Warm up
        black_box(rod.magnetization_derivative(1.0e4, &b, &omega));

        let t0 = Instant::now();
        let mut acc = 0.0;
        for i in 0..n {
            let m = (i % 1000) as f64 * 100.0 - 5.0e4;
            acc += rod.magnetization_derivative(black_box(m), &b, &omega);
        }
        let dt_vector = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        for i in 0..n {
            let m = (i % 1000) as f64 * 100.0 - 5.0e4;
            let h = b.x / VACUUM_PERMEABILITY;
            acc += rod.magnetization_derivative_from_h(black_box(m), h, 50.0);
        }
        let dt_scalar = t1.elapsed().as_secs_f64();
        black_box(acc);

        println!(
            "calls = {n:8}, vector = {:8.3} ns/call, scalar = {:8.3} ns/call",
            dt_vector / n as f64 * 1e9,
            dt_scalar / n as f64 * 1e9
        );
    }
    Ok(())
}

pub fn bench_dynamics() -> Result<(), SimulationError> {
    let environment = DipoleEnvironment::default();
    let rod_counts = [0usize, 2, 4, 8, 16, 32];
    let calls = 100_000;

    for n in rod_counts {
        let spacecraft = bench_spacecraft(n)?;
        let dynamics = SpacecraftDynamics::new(&spacecraft, &environment);
        let state = bench_state(n);

        // Warm up
        black_box(dynamics.derivative(&state, 0.0));

        let t0 = Instant::now();
        for i in 0..calls {
            black_box(dynamics.derivative(black_box(&state), i as f64 * 0.1));
        }
        let dt = t0.elapsed().as_secs_f64();

        println!("rods = {n:3}, derivative = {:9.3} us/call", dt / calls as f64 * 1e6);
    }
    Ok(())
}

/// Simulated seconds per wall-clock second for both RK pairs over one
/// simulated hour of the default spacecraft.
pub fn bench_integration() -> Result<(), SimulationError> {
    let environment = DipoleEnvironment::default();
    let spacecraft = bench_spacecraft(4)?;
    let dynamics = SpacecraftDynamics::new(&spacecraft, &environment);
    let t_end = 3600.0;

    for tol in [1e-6, 1e-8, 1e-10] {
        for method in [IntegrationMethod::DormandPrince54, IntegrationMethod::Fehlberg78] {
            let mut integrator = AdaptiveIntegrator::new(
                method,
                Tolerances {
                    absolute: tol,
                    relative: tol,
                },
            )?;

            let t0 = Instant::now();
            let final_state = integrator.integrate(&dynamics, bench_state(4), 0.0, t_end, 0.1, &mut NullObserver)?;
            let dt = t0.elapsed().as_secs_f64();
            black_box(final_state);

            let stats = integrator.stats();
            println!(
                "{:>22}, tol = {tol:7.1e}, wall = {dt:8.4} s, speedup = {:10.1}x, steps = {:8}, rejected = {:6}, evals = {:9}",
                method.tableau().name,
                t_end / dt,
                stats.accepted_steps,
                stats.rejected_steps,
                stats.fn_evals
            );
        }
    }
    Ok(())
}
