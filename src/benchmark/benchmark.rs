use std::time::Instant;

use crate::configuration::config::{
    DensityProfileConfig, GridConfig, IntegratorConfig, RadialGridConfig, VelocityProfileConfig,
};
use crate::simulation::engine::Engine;
use crate::simulation::ensemble::StreamlineEnsemble;
use crate::simulation::forces::{ForceContext, ForceField};
use crate::simulation::params::Parameters;
use crate::simulation::radiation::{DiscFlux, PointSourceFlux, StevensKallman};
use crate::simulation::states::{LaunchConditions, NVec2};

/// Time one force evaluation for point-source and disc fluxes
/// at increasing disc quadrature resolution
pub fn bench_force_field() {
    let params = make_params();
    let launch = LaunchConditions::keplerian(400.0, 1.0, 2.0e8, 1.0e-3, params.thermal_velocity());
    let ctx = ForceContext {
        launch: &launch,
        x: NVec2::new(420.0, 30.0),
        v: NVec2::new(1.0e-3, 5.0e-3),
        rho: 1.0e8,
        velocity_gradient: 1.0e-6,
    };
    let evals = 200;

    let point = ForceField::gravito_radiative(PointSourceFlux, StevensKallman::default());
    // warm up
    let _ = point.evaluate(&ctx, &params);
    let t0 = Instant::now();
    for _ in 0..evals {
        let _ = point.evaluate(&ctx, &params);
    }
    let us_point = t0.elapsed().as_secs_f64() * 1.0e6 / evals as f64;
    println!("point source: {us_point:10.3} us / evaluation");

    for panels in [4, 8, 12, 16, 24, 32] {
        let disc = ForceField::gravito_radiative(
            DiscFlux {
                radial_panels: panels,
                angular_panels: panels,
            },
            StevensKallman::default(),
        );
        let _ = disc.evaluate(&ctx, &params);

        let t1 = Instant::now();
        for _ in 0..evals {
            let _ = disc.evaluate(&ctx, &params);
        }
        let us_disc = t1.elapsed().as_secs_f64() * 1.0e6 / evals as f64;
        println!("disc, {panels:3} panels: {us_disc:10.3} us / evaluation");
    }
}

/// Serial vs parallel ensemble runs for growing grids
/// Paste output directly into a spreadsheet to graph
pub fn bench_ensemble() {
    println!("n,serial_ms,parallel_ms");

    for n in [2, 4, 8, 16, 32, 64] {
        let ms_serial = time_run(n, false);
        let ms_parallel = time_run(n, true);
        println!("{n},{ms_serial:.3},{ms_parallel:.3}");
    }
}

fn time_run(n: usize, parallel: bool) -> f64 {
    let params = make_params();
    let engine = Engine {
        parallel,
        ..Engine::fixed(IntegratorConfig::Rk4, 1.0)
    };
    let field = ForceField::gravito_radiative(PointSourceFlux, StevensKallman::default());
    let grid = GridConfig {
        radii: RadialGridConfig::Linear {
            r_min: 200.0,
            r_max: 1200.0,
            count: n,
        },
        density: DensityProfileConfig::Constant { rho: 2.0e8 },
        velocity: VelocityProfileConfig::EscapeFraction { fraction: 0.5 },
    };

    let Ok(mut ensemble) = StreamlineEnsemble::new(params, field, engine) else {
        return f64::NAN;
    };
    if ensemble.launch_grid(&grid).is_err() {
        return f64::NAN;
    }

    let t0 = Instant::now();
    ensemble.run_all(2_000);
    t0.elapsed().as_secs_f64() * 1000.0
}

/// Helper to build benchmark parameters
fn make_params() -> Parameters {
    Parameters {
        max_steps: 2_000,
        ..Parameters::default()
    }
}
