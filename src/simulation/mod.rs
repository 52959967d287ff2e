pub mod constants;
pub mod error;
pub mod states;
pub mod hysteresis;
pub mod magnet;
pub mod spacecraft;
pub mod environment;
pub mod orbit;
pub mod dynamics;
pub mod integrator;
pub mod params;
pub mod engine;
pub mod scenario;
pub mod observers;
pub mod verify;
