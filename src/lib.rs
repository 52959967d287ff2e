pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use simulation::states::{NVec3, NMat3, NQuat, NVecX, OdeState, SystemState};
pub use simulation::error::{ConfigError, IntegrationError, SimulationError};
pub use simulation::hysteresis::{HysteresisRod, JaParameters};
pub use simulation::magnet::PermanentMagnet;
pub use simulation::spacecraft::{box_inertia, Spacecraft};
pub use simulation::environment::{ConstantField, DipoleEnvironment, Environment, FieldSample, ZeroField};
pub use simulation::orbit::KeplerianElements;
pub use simulation::dynamics::SpacecraftDynamics;
pub use simulation::integrator::{AdaptiveIntegrator, IntegrationMethod, Observer, OdeSystem, Tolerances};
pub use simulation::scenario::{RunSummary, Scenario};
pub use simulation::observers::{AttitudeObserver, BhObserver, OrbitObserver, Recorder, StateColumns, StateCsvObserver};
pub use simulation::verify::{propagate_attitude, propagate_orbit, trace_bh_loop, AppliedField, BhLoop};

pub use configuration::config::{EngineConfig, EnvironmentConfig, IntegratorConfig, ParametersConfig, ScenarioConfig};

pub use benchmark::benchmark::{bench_dynamics, bench_integration, bench_rod_derivative};
