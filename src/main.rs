use aosim::{ScenarioConfig, Scenario};
use aosim::{AttitudeObserver, BhObserver, BhLoop, OrbitObserver, StateCsvObserver};
use aosim::{propagate_attitude, propagate_orbit, trace_bh_loop};
use aosim::{bench_dynamics, bench_integration, bench_rod_derivative};

use clap::{Parser, ValueEnum};
use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Simulate,
    VerifyHysteresis,
    VerifyAttitude,
    VerifyOrbit,
    Bench,
}

#[derive(Parser, Debug)]
#[command(about = "Attitude and orbit simulation of a passively magnetically stabilized spacecraft")]
struct Args {
    /// Scenario YAML; a bare name is looked up in `scenarios/`
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    #[arg(short, long, default_value = "output.csv")]
    output: PathBuf,

    #[arg(short, long, value_enum, default_value_t = Mode::Simulate)]
    mode: Mode,

    /// End time [s]
    #[arg(long)]
    t_end: Option<f64>,

    /// Initial step [s]
    #[arg(long)]
    dt: Option<f64>,

    /// Split the run into intervals of this length [s], at least 1
    #[arg(long)]
    checkpoint_interval: Option<f64>,

    /// Use the Fehlberg 7(8) pair
    #[arg(long)]
    higher_order: bool,

    /// Initial body rate x,y,z [rad/s]
    #[arg(long, value_delimiter = ',', num_args = 3, allow_hyphen_values = true)]
    angular_velocity: Option<Vec<f64>>,

    /// Fly without hysteresis rods
    #[arg(long)]
    no_rods: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn resolve_scenario_path(path: &Path) -> PathBuf {
    if path.exists() {
        return path.to_path_buf();
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(path)
}

// load here to keep main clean
fn load_scenario_config(args: &Args) -> Result<ScenarioConfig> {
    let mut cfg = match &args.scenario {
        Some(path) => {
            let config_path = resolve_scenario_path(path);
            let file = File::open(&config_path)
                .with_context(|| format!("failed to open scenario {}", config_path.display()))?;
            let reader = BufReader::new(file);
            serde_yaml::from_reader(reader)
                .with_context(|| format!("failed to parse scenario {}", config_path.display()))?
        }
        None => ScenarioConfig::default(),
    };

    if let Some(t_end) = args.t_end {
        cfg.parameters.t_end = t_end;
    }
    if let Some(dt) = args.dt {
        cfg.parameters.dt_initial = dt;
    }
    if let Some(interval) = args.checkpoint_interval {
        cfg.engine.checkpoint_interval = Some(interval);
    }
    if args.higher_order {
        cfg.engine.higher_order = true;
    }
    if let Some(w) = &args.angular_velocity {
        if let [x, y, z] = w[..] {
            cfg.initial.angular_velocity = [x, y, z];
        }
    }
    if args.no_rods {
        cfg.spacecraft.rods.orientations.clear();
        cfg.initial.rod_magnetizations = None;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let scenario_cfg = load_scenario_config(&args)?;

    match args.mode {
        Mode::Bench => {
            bench_rod_derivative()?;
            bench_dynamics()?;
            bench_integration()?;
        }
        Mode::VerifyHysteresis => {
            scenario_cfg.debug_summary();
            let settings = BhLoop::default();
            let mut observer = BhObserver::create(&args.output, settings.field)?;
            trace_bh_loop(scenario_cfg.spacecraft.rods.hysteresis.parameters(), &settings, &mut observer)?;
            let rows = observer.finish()?;
            info!(rows, output = %args.output.display(), "B-H loop written");
        }
        Mode::VerifyOrbit => {
            scenario_cfg.debug_summary();
            let scenario = Scenario::build_scenario(scenario_cfg).context("invalid scenario")?;
            let mut observer = OrbitObserver::create(&args.output)?;
            propagate_orbit(&scenario, &mut observer)?;
            let rows = observer.finish()?;
            info!(rows, output = %args.output.display(), "orbit written");
        }
        Mode::VerifyAttitude => {
            scenario_cfg.debug_summary();
            let scenario = Scenario::build_scenario(scenario_cfg).context("invalid scenario")?;
            let mut observer = AttitudeObserver::create(&args.output)?;
            propagate_attitude(&scenario, &mut observer)?;
            let rows = observer.finish()?;
            info!(rows, output = %args.output.display(), "attitude written");
        }
        Mode::Simulate => {
            scenario_cfg.debug_summary();
            let scenario = Scenario::build_scenario(scenario_cfg).context("invalid scenario")?;
            let mut observer =
                StateCsvObserver::create(&args.output, scenario.spacecraft.num_rods(), scenario.columns)?;
            let summary = scenario.run(&mut observer)?;
            let rows = observer.finish()?;
            info!(
                rows,
                output = %args.output.display(),
                omega_end = summary.final_state.angular_velocity.norm(),
                clamped_rods = summary.clamped_rods,
                "simulation written"
            );
        }
    }

    Ok(())
}
