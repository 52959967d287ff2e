use aosim::configuration::config::{EnvironmentConfig, ScenarioConfig};
use aosim::simulation::error::{ConfigError, IntegrationError, SimulationError};
use aosim::simulation::observers::{BhObserver, OrbitObserver, Recorder, StateCsvObserver};
use aosim::simulation::scenario::Scenario;
use aosim::simulation::states::SystemState;
use aosim::simulation::verify::{propagate_attitude, propagate_orbit, trace_bh_loop, BhLoop};
use aosim::simulation::integrator::NullObserver;
use aosim::{JaParameters, NVec3};

use approx::assert_relative_eq;

/// Short scenario in the given environment, default spacecraft and orbit
pub fn short_config(environment: EnvironmentConfig, t_end: f64) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::default();
    cfg.environment = environment;
    cfg.parameters.t_end = t_end;
    cfg
}

/// Uniform 30 uT field, tilted out of every body plane
pub fn constant_field() -> EnvironmentConfig {
    EnvironmentConfig::Constant {
        field_t: [2.0e-5, -1.0e-5, 2.0e-5],
    }
}

pub fn build(cfg: ScenarioConfig) -> Scenario {
    Scenario::build_scenario(cfg).expect("scenario should build")
}

// ==================================================================================
// Scenario construction
// ==================================================================================

#[test]
fn default_scenario_builds() {
    let scenario = build(ScenarioConfig::default());

    assert_eq!(scenario.spacecraft.num_rods(), 4);
    assert_eq!(scenario.initial_state.num_rods(), 4);
    assert!(scenario.initial_state.rod_magnetizations.iter().all(|m| *m == 0.0));
    assert_relative_eq!(scenario.initial_state.attitude.norm(), 1.0, epsilon = 1e-12);
    assert_relative_eq!(
        scenario.initial_state.position.norm(),
        6_378_137.0 + 650_000.0,
        max_relative = 1e-9
    );
    // circular orbit speed
    let v = (scenario.environment.gravitational_parameter() / scenario.initial_state.position.norm()).sqrt();
    assert_relative_eq!(scenario.initial_state.velocity.norm(), v, max_relative = 1e-9);
    assert!(scenario.engine.checkpoint_interval.is_none());
    assert_eq!(scenario.parameters.duration(), 14.0 * 24.0 * 3600.0);
}

#[test]
fn scenario_from_yaml() {
    let yaml = r#"
engine:
  integrator: "rkf78"
  checkpoint_interval: 30.0
parameters:
  t_end: 120.0
spacecraft:
  inertia: [[0.002, 0.0, 0.0], [0.0, 0.003, 0.0], [0.0, 0.0, 0.004]]
  rods:
    orientations: [[1, 0, 0], [0, 1, 0]]
environment:
  model: "constant"
  field_t: [0.0, 0.0, 3.0e-5]
initial:
  attitude: [2.0, 0.0, 0.0, 0.0]
  rod_magnetizations: [100.0, -100.0]
"#;
    let cfg: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
    let scenario = build(cfg);

    assert_eq!(scenario.engine.method.tableau().stages(), 13);
    assert_eq!(scenario.engine.checkpoint_interval, Some(30.0));
    assert_eq!(scenario.spacecraft.num_rods(), 2);
    assert_relative_eq!(scenario.spacecraft.inertia()[(2, 2)], 0.004);
    // attitude normalized on build
    assert_relative_eq!(scenario.initial_state.attitude.w, 1.0, epsilon = 1e-12);
    assert_eq!(scenario.initial_state.rod_magnetizations[1], -100.0);
    let sample = scenario.environment.evaluate(0.0, &scenario.initial_state.position);
    assert_relative_eq!(sample.magnetic_field, NVec3::new(0.0, 0.0, 3.0e-5));
}

#[test]
fn invalid_rod_volume_is_rejected() {
    let mut cfg = ScenarioConfig::default();
    cfg.spacecraft.rods.volume_m3 = -1.0;
    let err = Scenario::build_scenario(cfg).err().unwrap();
    assert!(matches!(err, ConfigError::NonPositive { .. }), "{err}");
}

#[test]
fn rod_magnetization_count_must_match() {
    let mut cfg = ScenarioConfig::default();
    cfg.initial.rod_magnetizations = Some(vec![0.0; 3]);
    let err = Scenario::build_scenario(cfg).err().unwrap();
    assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
}

#[test]
fn short_checkpoint_interval_is_rejected() {
    let mut cfg = ScenarioConfig::default();
    cfg.engine.checkpoint_interval = Some(0.5);
    let err = Scenario::build_scenario(cfg).err().unwrap();
    assert!(matches!(err, ConfigError::OutOfRange { .. }), "{err}");
}

#[test]
fn hyperbolic_orbit_is_rejected() {
    let mut cfg = ScenarioConfig::default();
    cfg.orbit.eccentricity = 1.0;
    assert!(Scenario::build_scenario(cfg).is_err());
}

#[test]
fn asymmetric_inertia_is_rejected() {
    let mut cfg = ScenarioConfig::default();
    cfg.spacecraft.inertia = Some([[1.0, 0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    let err = Scenario::build_scenario(cfg).err().unwrap();
    assert!(matches!(err, ConfigError::InvalidInertia(_)), "{err}");
}

#[test]
fn zero_attitude_is_rejected() {
    let mut cfg = ScenarioConfig::default();
    cfg.initial.attitude = [0.0; 4];
    assert!(Scenario::build_scenario(cfg).is_err());
}

// ==================================================================================
// Runs
// ==================================================================================

#[test]
fn torque_free_cube_conserves_spin_and_orbit() {
    // a cube has no gravity-gradient torque; without field nothing else acts
    let scenario = build(short_config(EnvironmentConfig::Zero, 600.0));
    let mut rec = Recorder::<SystemState>::default();
    let summary = scenario.run(&mut rec).unwrap();

    let s0 = &scenario.initial_state;
    let s1 = &summary.final_state;
    assert_relative_eq!(s1.angular_velocity.norm(), s0.angular_velocity.norm(), max_relative = 1e-6);
    assert_relative_eq!(s1.position.norm(), s0.position.norm(), max_relative = 1e-3);
    assert_relative_eq!(s1.attitude.norm(), 1.0, epsilon = 1e-9);
    // static field: rods never move
    assert!(s1.rod_magnetizations.iter().all(|m| *m == 0.0));

    let times: Vec<f64> = rec.times().collect();
    assert_eq!(times[0], 0.0);
    assert_eq!(*times.last().unwrap(), 600.0);
    assert!(times.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(times.len() as u64, summary.stats.accepted_steps + 1);
}

#[test]
fn checkpointed_run_observes_boundaries_in_order() {
    let mut cfg = short_config(constant_field(), 300.0);
    cfg.engine.checkpoint_interval = Some(60.0);
    let scenario = build(cfg);
    let mut rec = Recorder::<SystemState>::default();
    let summary = scenario.run(&mut rec).unwrap();

    assert_eq!(summary.checkpoints, 5);
    let times: Vec<f64> = rec.times().collect();
    assert_eq!(times[0], 0.0);
    assert!(times.windows(2).all(|w| w[1] > w[0]), "observation times must increase");
    for boundary in [60.0, 120.0, 180.0, 240.0, 300.0] {
        assert!(times.iter().any(|t| (t - boundary).abs() < 1e-9), "missing checkpoint {boundary}");
    }
    assert_eq!(*times.last().unwrap(), 300.0);

    let ms = JaParameters::hymu80().ms;
    for (_, state) in &rec.samples {
        assert_relative_eq!(state.attitude.norm(), 1.0, epsilon = 1e-9);
    }
    assert!(summary.final_state.rod_magnetizations.iter().all(|m| m.abs() <= ms));
    // field rate from rotation drives the rods
    assert!(summary.final_state.rod_magnetizations.iter().any(|m| *m != 0.0));
}

#[test]
fn checkpointing_tracks_continuous_run() {
    // time-varying field: offsets must line up with absolute time
    let env = EnvironmentConfig::Dipole {
        start_year: 2025.0,
        j2: true,
    };
    let mut cfg = short_config(env, 120.0);
    cfg.parameters.absolute_error = 1e-10;
    cfg.parameters.relative_error = 1e-10;

    let continuous = build(cfg.clone()).run(&mut NullObserver).unwrap();
    cfg.engine.checkpoint_interval = Some(30.0);
    let checkpointed = build(cfg).run(&mut NullObserver).unwrap();

    let a = &continuous.final_state;
    let b = &checkpointed.final_state;
    assert!((a.position - b.position).norm() < 1.0);
    assert!((a.angular_velocity - b.angular_velocity).norm() < 1e-5);
    assert!((&a.rod_magnetizations - &b.rod_magnetizations).amax() < 10.0);
}

#[test]
fn step_budget_is_enforced() {
    let mut cfg = short_config(EnvironmentConfig::Zero, 10.0);
    cfg.engine.max_steps = Some(1);
    let err = build(cfg).run(&mut Recorder::<SystemState>::default()).err().unwrap();
    assert!(matches!(
        err,
        SimulationError::Integration(IntegrationError::MaxStepsExceeded { max_steps: 1, .. })
    ));
}

#[test]
fn state_csv_has_one_row_per_observation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("state.csv");
    let mut cfg = short_config(constant_field(), 20.0);
    cfg.engine.checkpoint_interval = Some(10.0);
    let scenario = build(cfg);

    let mut csv_obs = StateCsvObserver::create(&path, scenario.spacecraft.num_rods(), scenario.columns).unwrap();
    let mut rec = Recorder::<SystemState>::default();
    scenario
        .run(&mut |s: &SystemState, t: f64| {
            aosim::Observer::observe(&mut csv_obs, s, t);
            aosim::Observer::observe(&mut rec, s, t);
        })
        .unwrap();
    let rows = csv_obs.finish().unwrap();

    assert_eq!(rows as usize, rec.samples.len());
    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("time,q_w,q_x,q_y,q_z,w_x,w_y,w_z"));
    assert!(header.ends_with("M_1,M_2,M_3,M_4,w_mag,r_mag,v_mag"));
    assert_eq!(lines.count(), rec.samples.len());
}

// ==================================================================================
// Verification harnesses
// ==================================================================================

#[test]
fn bh_loop_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bh.csv");
    let settings = BhLoop::default();

    let mut obs = BhObserver::create(&path, settings.field).unwrap();
    let (_, stats) = trace_bh_loop(JaParameters::hymu80(), &settings, &mut obs).unwrap();
    let rows = obs.finish().unwrap();
    assert_eq!(rows, stats.accepted_steps + 1);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(reader.headers().unwrap(), vec!["time", "H_Am", "M_Am", "B_T"]);
    let mut max_b: f64 = 0.0;
    for record in reader.records() {
        let record = record.unwrap();
        let b: f64 = record[3].parse().unwrap();
        max_b = max_b.max(b);
    }
    // permalloy near saturation: B ~ mu0 * Ms ~ 0.75 T
    assert!(max_b > 0.3 && max_b < 0.8, "peak B = {max_b}");
}

#[test]
fn orbit_returns_after_one_period() {
    let mut cfg = short_config(EnvironmentConfig::Zero, 0.0);
    cfg.parameters.absolute_error = 1e-9;
    cfg.parameters.relative_error = 1e-9;
    let period = {
        let scenario = build(cfg.clone());
        scenario.orbit.period(scenario.environment.gravitational_parameter())
    };
    cfg.parameters.t_end = period;
    let scenario = build(cfg);

    let dir = tempfile::tempdir().unwrap();
    let mut obs = OrbitObserver::create(dir.path().join("orbit.csv")).unwrap();
    let summary = propagate_orbit(&scenario, &mut obs).unwrap();
    obs.finish().unwrap();

    let r0 = scenario.initial_state.position;
    let r1 = summary.final_state.position;
    assert!((r1 - r0).norm() < 1e-3 * r0.norm(), "drift = {} m", (r1 - r0).norm());
    assert_eq!(summary.final_state.num_rods(), 0);
}

#[test]
fn attitude_at_rest_stays_at_rest_without_field() {
    let scenario = build(short_config(EnvironmentConfig::Zero, 100.0));
    let mut rec = Recorder::<SystemState>::default();
    let summary = propagate_attitude(&scenario, &mut rec).unwrap();

    let s = &summary.final_state;
    assert_eq!(s.num_rods(), 0);
    assert!(s.angular_velocity.norm() < 1e-12);
    assert_relative_eq!(s.attitude.w, 1.0, epsilon = 1e-12);
}

#[test]
fn magnet_starts_turning_in_field() {
    let scenario = build(short_config(constant_field(), 10.0));
    let mut rec = Recorder::<SystemState>::default();
    let summary = propagate_attitude(&scenario, &mut rec).unwrap();

    let (t0, first) = &rec.samples[0];
    assert_eq!(*t0, 0.0);
    assert_eq!(first.angular_velocity, NVec3::zeros());
    assert!(summary.final_state.angular_velocity.norm() > 0.0);
}
