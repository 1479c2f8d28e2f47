use discwind::{ScenarioConfig, Scenario, EnsembleReport};
use discwind::{bench_ensemble, bench_force_field};

use clap::Parser;
use anyhow::{Context, Result};
use log::info;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(about = "Integrate radiation-driven disc wind streamlines")]
struct Args {
    /// Scenario file under scenarios/
    #[arg(short, default_value = "disc_wind.yaml")]
    file_name: String,

    /// Step ceiling per streamline, overriding the scenario's max_steps
    #[arg(long)]
    max_steps: Option<usize>,

    /// Advance streamlines one after another
    #[arg(long)]
    serial: bool,

    /// Run the benchmarks instead of a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let file = File::open(&config_path)
        .with_context(|| format!("failed to open {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.bench {
        bench_force_field();
        bench_ensemble();
        return Ok(());
    }

    let mut scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    if args.serial {
        scenario_cfg.integrator.parallel = false;
    }

    let mut scenario = Scenario::build_scenario(scenario_cfg.with_max_steps(args.max_steps))?;
    let max_steps = scenario.ensemble.params().max_steps;
    scenario.ensemble.run_all(max_steps);

    let report = EnsembleReport::from(&scenario.ensemble);
    for trajectory in &report.trajectories {
        let last = trajectory.points.last();
        info!(
            "R0 = {:8.1}: {:9} after {:6} steps, final (R, Z) = ({:.1}, {:.1}){}",
            trajectory.r0,
            trajectory.status,
            trajectory.points.len() - 1,
            last.map_or(f64::NAN, |p| p.r),
            last.map_or(f64::NAN, |p| p.z),
            trajectory
                .stall_reason
                .as_ref()
                .map(|reason| format!(" [{reason}]"))
                .unwrap_or_default()
        );
    }
    info!("{}", report.summary());
    match (report.mass_loss_rate, report.mass_loss_rate_eddington) {
        (Some(rate), Some(eddington)) => {
            info!("mass-loss rate: {rate:.4e} g/s ({eddington:.4e} Mdot_Edd)")
        }
        _ => info!("mass-loss rate not available"),
    }

    Ok(())
}
