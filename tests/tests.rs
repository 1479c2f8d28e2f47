use approx::assert_relative_eq;

use discwind::simulation::radiation::{sobolev_optical_depth, uv_optical_depth};
use discwind::simulation::states::local_escape_velocity;
use discwind::simulation::streamline::continuity_density;
use discwind::{
    dormand_prince_step, rk4_step, verlet_step, ConstantForceMultiplier, DensityProfileConfig,
    DiscFlux, Engine, EnsembleReport, ForceContext, ForceField, GridConfig, IntegratorConfig,
    LaunchConditions, LocalRadiation, NVec2, NVec4, Parameters, PointSourceFlux, RadialGridConfig,
    RadiationFlux, Scenario, ScenarioConfig, StallReason, Status, StepControl, StevensKallman,
    Streamline, StreamlineEnsemble, VelocityProfileConfig, WindError,
};

/// Default physics parameters for tests, with a nearby escape boundary
pub fn test_params() -> Parameters {
    Parameters {
        escape_radius: 2000.0,
        max_steps: 60_000,
        ..Parameters::default()
    }
}

/// Fixed-step RK4, one streamline after another
pub fn rk4_engine(h0: f64) -> Engine {
    Engine {
        parallel: false,
        ..Engine::fixed(IntegratorConfig::Rk4, h0)
    }
}

/// Radiation switched off through a zero force multiplier
pub fn zero_radiation_field() -> ForceField {
    ForceField::gravito_radiative(PointSourceFlux, ConstantForceMultiplier(0.0))
}

/// Poloidal escape speed at the launch point of a Keplerian streamline
pub fn launch_escape_velocity(r0: f64, p: &Parameters) -> f64 {
    local_escape_velocity(r0, p.launch_height, r0.sqrt())
}

/// Launch conditions without rotation, for checking gravity alone
pub fn radial_launch(r0: f64) -> LaunchConditions {
    LaunchConditions {
        angular_momentum: 0.0,
        ..LaunchConditions::keplerian(r0, 1.0, 2.0e8, 0.0, 1.0e-4)
    }
}

pub fn context(launch: &LaunchConditions, x: NVec2) -> ForceContext<'_> {
    ForceContext {
        launch,
        x,
        v: NVec2::zeros(),
        rho: launch.rho0,
        velocity_gradient: 0.0,
    }
}

// ==================================================================================
// Force field tests
// ==================================================================================

#[test]
fn gravity_balances_rotation_in_the_midplane() {
    let p = test_params();
    let launch = LaunchConditions::keplerian(100.0, 0.0, 2.0e8, 0.0, p.thermal_velocity());
    let field = ForceField::gravity_only();

    let eval = field.evaluate(&context(&launch, NVec2::new(100.0, 0.0)), &p).unwrap();

    assert!(eval.a.norm() < 1e-15, "Keplerian parcel feels a net force: {:?}", eval.a);
}

#[test]
fn force_field_collects_terms() {
    assert!(ForceField::new().is_empty());
    assert_eq!(ForceField::gravity_only().len(), 1);
    assert_eq!(zero_radiation_field().len(), 2);
}

#[test]
fn gravity_pulls_toward_the_disc_plane() {
    let p = test_params();
    let launch = LaunchConditions::keplerian(100.0, 1.0, 2.0e8, 0.0, p.thermal_velocity());
    let field = ForceField::gravity_only();

    let eval = field.evaluate(&context(&launch, NVec2::new(100.0, 10.0)), &p).unwrap();

    assert!(eval.a.y < 0.0, "vertical acceleration is not toward the plane");
}

#[test]
fn gravity_points_toward_origin() {
    let p = test_params();
    let launch = radial_launch(50.0);
    let field = ForceField::gravity_only();
    let x = NVec2::new(30.0, 40.0);

    let eval = field.evaluate(&context(&launch, x), &p).unwrap();

    assert!(eval.a.dot(&x) < 0.0);
    assert_relative_eq!(eval.a.normalize(), -x.normalize(), epsilon = 1e-12);
}

#[test]
fn gravity_inverse_square_law() {
    let p = test_params();
    let launch = radial_launch(50.0);
    let field = ForceField::gravity_only();

    let a_r = field.evaluate(&context(&launch, NVec2::new(10.0, 0.0)), &p).unwrap().a;
    let a_2r = field.evaluate(&context(&launch, NVec2::new(20.0, 0.0)), &p).unwrap().a;

    assert_relative_eq!(a_r.norm() / a_2r.norm(), 4.0, epsilon = 1e-12);
}

#[test]
fn degenerate_distance_is_an_invalid_state() {
    let p = test_params();
    let launch = radial_launch(50.0);
    let field = ForceField::gravity_only();

    let near_centre = field.evaluate(&context(&launch, NVec2::new(0.5, 0.1)), &p);
    let on_axis = field.evaluate(&context(&launch, NVec2::new(0.0, 10.0)), &p);

    assert!(matches!(near_centre, Err(WindError::InvalidState(_))));
    assert!(matches!(on_axis, Err(WindError::InvalidState(_))));
}

#[test]
fn negative_density_is_an_invalid_state() {
    let p = test_params();
    let launch = radial_launch(50.0);
    let field = ForceField::gravity_only();
    let ctx = ForceContext {
        rho: -1.0,
        ..context(&launch, NVec2::new(50.0, 5.0))
    };

    assert!(matches!(field.evaluate(&ctx, &p), Err(WindError::InvalidState(_))));
}

#[test]
fn zero_force_multiplier_leaves_gravity_only() {
    let p = test_params();
    let launch = LaunchConditions::keplerian(300.0, 1.0, 2.0e8, 0.0, p.thermal_velocity());
    let x = NVec2::new(320.0, 40.0);

    let gravity = ForceField::gravity_only().evaluate(&context(&launch, x), &p).unwrap();
    let zero_rad = zero_radiation_field().evaluate(&context(&launch, x), &p).unwrap();

    assert_eq!(gravity.a, zero_rad.a);
    assert_eq!(zero_rad.radiation.force_multiplier, 0.0);
}

#[test]
fn point_source_radiation_pushes_outward() {
    let p = test_params();
    // launched at the shielding radius and still above it: no UV attenuation
    let launch = LaunchConditions::keplerian(p.shielding_radius, 1.0, 2.0e8, 0.0, p.thermal_velocity());
    let x = NVec2::new(p.shielding_radius, 50.0);

    let gravity = ForceField::gravity_only().evaluate(&context(&launch, x), &p).unwrap();
    let thomson = ForceField::gravito_radiative(PointSourceFlux, ConstantForceMultiplier(1.0))
        .evaluate(&context(&launch, x), &p)
        .unwrap();

    let gamma = p.eddington_ratio * (1.0 - p.xray_fraction);
    let d = x.norm();
    let expected = gamma * x / (d * d * d);
    assert_eq!(thomson.radiation.tau_uv, 0.0);
    assert_relative_eq!(thomson.a - gravity.a, expected, epsilon = 1e-15);
}

#[test]
fn non_finite_multiplier_is_a_numerical_failure() {
    let p = test_params();
    let launch = LaunchConditions::keplerian(300.0, 1.0, 2.0e8, 0.0, p.thermal_velocity());
    let field = ForceField::gravito_radiative(PointSourceFlux, |_: &LocalRadiation| f64::NAN);

    let result = field.evaluate(&context(&launch, NVec2::new(300.0, 1.0)), &p);

    assert!(matches!(result, Err(WindError::NumericalFailure(_))));
}

#[test]
fn disc_flux_lifts_parcels_above_the_disc() {
    let p = test_params();
    let flux = DiscFlux::default().flux(500.0, 50.0, &p);

    assert!(flux.x.is_finite() && flux.y.is_finite());
    assert!(flux.y > 0.0, "disc flux does not point away from the disc: {:?}", flux);
}

#[test]
fn disc_flux_converges_with_resolution() {
    let p = test_params();
    let coarse = DiscFlux { radial_panels: 12, angular_panels: 12 }.flux(500.0, 50.0, &p);
    let fine = DiscFlux { radial_panels: 24, angular_panels: 24 }.flux(500.0, 50.0, &p);

    assert_relative_eq!(coarse.y, fine.y, max_relative = 2e-2);
}

#[test]
fn disc_flux_scales_with_eddington_ratio() {
    let p = test_params();
    let bright = Parameters { eddington_ratio: 2.0 * p.eddington_ratio, ..p.clone() };
    let flux = DiscFlux::default();

    let ratio = flux.flux(400.0, 20.0, &bright).y / flux.flux(400.0, 20.0, &p).y;

    assert_relative_eq!(ratio, 2.0, epsilon = 1e-12);
}

// ==================================================================================
// Radiation helper tests
// ==================================================================================

#[test]
fn force_multiplier_falls_with_optical_depth() {
    let thin = StevensKallman::line_multiplier(1e-6, 1.0);
    let mid = StevensKallman::line_multiplier(1e-2, 1.0);
    let thick = StevensKallman::line_multiplier(1.0, 1.0);

    assert!(thin > mid && mid > thick && thick > 0.0);
}

#[test]
fn force_multiplier_optically_thin_limit_is_finite() {
    let at_zero = StevensKallman::line_multiplier(0.0, 1.0);
    let tiny = StevensKallman::line_multiplier(1e-12, 1.0);

    assert!(at_zero.is_finite());
    assert_relative_eq!(at_zero, tiny, max_relative = 1e-9);
}

#[test]
fn ionisation_suppresses_line_driving() {
    let cold = StevensKallman::line_multiplier(1e-4, 1.0);
    let ionised = StevensKallman::line_multiplier(1e-4, 1e6);

    assert!(ionised < cold);
}

#[test]
fn stevens_kallman_includes_electron_scattering() {
    let local = LocalRadiation { tau_eff: 1.0, xi: 1e8, ..LocalRadiation::default() };
    let with = discwind::ForceMultiplier::force_multiplier(&StevensKallman::default(), &local);
    let without = discwind::ForceMultiplier::force_multiplier(
        &StevensKallman { include_electron_scattering: false },
        &local,
    );

    assert_relative_eq!(with - without, 1.0, epsilon = 1e-12);
}

#[test]
fn sobolev_depth_without_gradient_is_unity() {
    assert_eq!(sobolev_optical_depth(3.0, 0.0, 1e-4), 1.0);
    assert_relative_eq!(sobolev_optical_depth(3.0, 1e-3, 1e-4), 0.3, epsilon = 1e-12);
}

#[test]
fn uv_depth_vanishes_at_the_shielding_edge() {
    let p = test_params();
    let r = p.shielding_radius;

    assert_eq!(uv_optical_depth(r, 0.0, r, 2.0, &p), 0.0);
    assert!(uv_optical_depth(r + 100.0, 0.0, r + 100.0, 2.0, &p) > 0.0);
}

#[test]
fn ionisation_radius_lies_on_the_disc() {
    let p = test_params();
    let r_x = p.ionization_radius();

    assert!(p.within_disc(r_x));
}

// ==================================================================================
// Integrator tests
// ==================================================================================

fn oscillator(_t: f64, y: &NVec4) -> Result<NVec4, WindError> {
    Ok(NVec4::new(y[2], y[3], -y[0], -y[1]))
}

fn kepler(_t: f64, y: &NVec4) -> Result<NVec4, WindError> {
    let x = NVec2::new(y[0], y[1]);
    let a = -x / x.norm().powi(3);
    Ok(NVec4::new(y[2], y[3], a.x, a.y))
}

fn oscillator_error(h: f64, verlet: bool) -> f64 {
    let mut y = NVec4::new(1.0, 0.0, 0.0, 1.0);
    let n = (2.0 * std::f64::consts::PI / h).round() as usize;
    let mut t = 0.0;
    for _ in 0..n {
        y = if verlet {
            verlet_step(t, &y, h, &mut oscillator).unwrap()
        } else {
            rk4_step(t, &y, h, &mut oscillator).unwrap()
        };
        t += h;
    }
    (y - NVec4::new(t.cos(), t.sin(), -t.sin(), t.cos())).norm()
}

#[test]
fn rk4_tracks_harmonic_oscillator() {
    assert!(oscillator_error(1e-2, false) < 1e-8);
}

#[test]
fn rk4_is_fourth_order() {
    let ratio = oscillator_error(0.02, false) / oscillator_error(0.01, false);
    assert!((12.0..20.0).contains(&ratio), "error ratio {ratio}");
}

#[test]
fn verlet_is_second_order() {
    let ratio = oscillator_error(0.02, true) / oscillator_error(0.01, true);
    assert!((3.0..5.0).contains(&ratio), "error ratio {ratio}");
}

fn damped(_t: f64, y: &NVec4) -> Result<NVec4, WindError> {
    Ok(NVec4::new(y[2], y[3], -y[0] - y[2], -y[1] - y[3]))
}

/// Verlet error at t = 2 for x'' = -x - x', x(0) = 1, x'(0) = 0
fn damped_verlet_error(h: f64) -> f64 {
    let mut y = NVec4::new(1.0, 0.0, 0.0, 0.0);
    let n = (2.0 / h).round() as usize;
    let mut t = 0.0;
    for _ in 0..n {
        y = verlet_step(t, &y, h, &mut damped).unwrap();
        t += h;
    }
    let w = 3f64.sqrt() / 2.0;
    let decay = (-0.5 * t).exp();
    let x = decay * ((w * t).cos() + (w * t).sin() / 3f64.sqrt());
    let v = -2.0 / 3f64.sqrt() * decay * (w * t).sin();
    (NVec2::new(y[0], y[2]) - NVec2::new(x, v)).norm()
}

#[test]
fn verlet_is_second_order_with_velocity_dependent_force() {
    let ratio = damped_verlet_error(0.02) / damped_verlet_error(0.01);
    assert!((3.0..5.0).contains(&ratio), "error ratio {ratio}");

    let finer = damped_verlet_error(0.01) / damped_verlet_error(0.005);
    assert!((3.0..5.0).contains(&finer), "error ratio {finer}");
}

#[test]
fn dormand_prince_error_estimate_is_small() {
    let y = NVec4::new(1.0, 0.0, 0.0, 1.0);
    let (y_new, err) = dormand_prince_step(0.0, &y, 0.1, &mut oscillator).unwrap();

    let exact = NVec4::new(0.1f64.cos(), 0.1f64.sin(), -0.1f64.sin(), 0.1f64.cos());
    assert!((y_new - exact).norm() < 1e-7);
    assert!(err.norm() < 1e-6);
}

#[test]
fn adaptive_control_conserves_orbital_energy() {
    let engine = Engine { rtol: 1e-10, atol: 1e-12, ..Engine::default() };
    let mut control = StepControl::new(&engine);
    let energy = |y: &NVec4| 0.5 * (y[2] * y[2] + y[3] * y[3]) - 1.0 / (y[0] * y[0] + y[1] * y[1]).sqrt();

    let mut y = NVec4::new(1.0, 0.0, 0.0, 1.0);
    let e0 = energy(&y);
    let mut t = 0.0;
    let mut steps = 0;
    while t < 2.0 * std::f64::consts::PI {
        let (dt, y_new) = control.advance(t, &y, kepler).unwrap();
        t += dt;
        y = y_new;
        steps += 1;
    }

    assert!(steps > 10, "controller never shrank the first step");
    assert_relative_eq!(energy(&y), e0, max_relative = 1e-7);
}

#[test]
fn adaptive_control_gives_up_on_persistent_failure() {
    let mut control = StepControl::new(&Engine::default());
    let failing = |_t: f64, _y: &NVec4| -> Result<NVec4, WindError> {
        Err(WindError::numerical("forced"))
    };

    let result = control.advance(0.0, &NVec4::new(1.0, 0.0, 0.0, 1.0), failing);

    assert!(matches!(result, Err(WindError::NumericalFailure(_))));
}

// ==================================================================================
// Streamline tests
// ==================================================================================

#[test]
fn initialize_records_launch_state() {
    let p = test_params();
    let s = Streamline::initialize(300.0, 2.0e8, 1.0e-3, &zero_radiation_field(), &p, &rk4_engine(2.0)).unwrap();

    assert_eq!(s.status(), Status::Running);
    assert_eq!(s.steps(), 0);
    assert_eq!(s.history().len(), 1);
    assert_eq!(s.current().x, NVec2::new(300.0, p.launch_height));
    assert_eq!(s.current().v, NVec2::new(0.0, 1.0e-3));
    assert_eq!(s.current().rho, 2.0e8);
}

#[test]
fn invalid_launch_is_a_configuration_error() {
    let p = test_params();
    let field = zero_radiation_field();
    let engine = rk4_engine(2.0);

    for (r0, rho0, v_z0) in [(0.0, 2.0e8, 0.0), (100.0, -1.0, 0.0), (100.0, 2.0e8, -0.1), (f64::NAN, 2.0e8, 0.0)] {
        let result = Streamline::initialize(r0, rho0, v_z0, &field, &p, &engine);
        assert!(matches!(result, Err(WindError::Configuration(_))), "accepted ({r0}, {rho0}, {v_z0})");
    }
}

#[test]
fn sub_escape_launch_falls_back_without_radiation() {
    let p = test_params();
    let field = zero_radiation_field();
    let engine = rk4_engine(4.0);

    for r0 in [100.0, 200.0, 400.0] {
        for fraction in [0.0, 0.3, 0.6] {
            let v_z0 = fraction * launch_escape_velocity(r0, &p);
            let mut s = Streamline::initialize(r0, 2.0e8, v_z0, &field, &p, &engine).unwrap();

            let status = s.iterate(&field, &p, p.max_steps);

            assert_eq!(status, Status::FellBack, "R0 = {r0}, v_z0 = {v_z0}");
            assert!(s.current().z() <= p.fallback_height);
        }
    }
}

#[test]
fn super_escape_launch_escapes() {
    let p = test_params();
    let field = zero_radiation_field();
    let v_z0 = 3.0 * launch_escape_velocity(100.0, &p);
    let mut s = Streamline::initialize(100.0, 2.0e8, v_z0, &field, &p, &rk4_engine(5.0)).unwrap();

    let status = s.iterate(&field, &p, p.max_steps);

    let last = s.current();
    assert_eq!(status, Status::Escaped);
    assert!(last.specific_energy(s.launch()) > 0.0);
    assert!(last.r() >= p.escape_radius || last.z() >= p.escape_radius);
}

#[test]
fn bound_parcel_landing_beyond_the_disc_falls_back() {
    let p = test_params();
    let field = zero_radiation_field();
    let v_z0 = 0.5 * launch_escape_velocity(1500.0, &p);
    let mut s = Streamline::initialize(1500.0, 2.0e8, v_z0, &field, &p, &rk4_engine(20.0)).unwrap();

    let status = s.iterate(&field, &p, p.max_steps);

    assert_eq!(status, Status::FellBack);
    assert!(s.current().r() > p.disc_outer_radius);
    assert!(s.current().specific_energy(s.launch()) < 0.0);
}

#[test]
fn strong_radiation_drives_a_bound_launch_out() {
    let p = test_params();
    let v_z0 = 0.5 * launch_escape_velocity(100.0, &p);
    let ballistic = zero_radiation_field();
    // 10 x the electron-scattering push, above Eddington
    let driven = ForceField::gravito_radiative(PointSourceFlux, ConstantForceMultiplier(10.0));
    let mut bound = Streamline::initialize(100.0, 2.0e8, v_z0, &ballistic, &p, &rk4_engine(4.0)).unwrap();
    let mut lifted = Streamline::initialize(100.0, 2.0e8, v_z0, &driven, &p, &rk4_engine(4.0)).unwrap();

    assert_eq!(bound.iterate(&ballistic, &p, p.max_steps), Status::FellBack);
    assert_eq!(lifted.iterate(&driven, &p, p.max_steps), Status::Escaped);

    let last = lifted.current();
    assert!(last.specific_energy(lifted.launch()) > 0.0);
    assert_eq!(last.radiation.force_multiplier, 10.0);
    for state in &lifted.history()[1..] {
        let rad = &state.radiation;
        assert!(rad.tau_uv > 0.0 && rad.tau_uv.is_finite());
        assert!(rad.tau_eff > 0.0 && rad.tau_eff.is_finite());
        assert!(rad.xi.is_finite() && rad.xi > 0.0);
    }
}

#[test]
fn history_grows_one_entry_per_step() {
    let p = test_params();
    let field = zero_radiation_field();
    let v_z0 = 0.5 * launch_escape_velocity(150.0, &p);
    let mut s = Streamline::initialize(150.0, 2.0e8, v_z0, &field, &p, &rk4_engine(4.0)).unwrap();

    s.iterate(&field, &p, p.max_steps);

    let history = s.history();
    assert_eq!(history.len(), s.steps() + 1);
    assert!(history.windows(2).all(|w| w[1].t > w[0].t), "time is not strictly increasing");
    assert!(history.windows(2).all(|w| w[1].path_length >= w[0].path_length));
}

#[test]
fn iterate_is_idempotent_once_terminal() {
    let p = test_params();
    let field = zero_radiation_field();
    let mut s = Streamline::initialize(120.0, 2.0e8, 0.0, &field, &p, &rk4_engine(4.0)).unwrap();

    let first = s.iterate(&field, &p, p.max_steps);
    let len = s.history().len();
    let steps = s.steps();
    let second = s.iterate(&field, &p, p.max_steps);
    let stepped = s.step(&field, &p);

    assert!(first.is_terminal());
    assert_eq!(first, second);
    assert_eq!(first, stepped);
    assert_eq!(s.history().len(), len);
    assert_eq!(s.steps(), steps);
}

#[test]
fn exhausted_iterate_budget_stalls() {
    let p = test_params();
    let field = zero_radiation_field();
    let mut s = Streamline::initialize(300.0, 2.0e8, 1.0e-3, &field, &p, &rk4_engine(1.0)).unwrap();

    let status = s.iterate(&field, &p, 10);

    assert_eq!(status, Status::Stalled);
    assert_eq!(s.steps(), 10);
    assert_eq!(s.history().len(), 11);
    assert_eq!(s.stall_reason(), Some(&StallReason::StepLimit { steps: 10 }));
}

#[test]
fn global_step_ceiling_stalls() {
    let p = Parameters { max_steps: 5, ..test_params() };
    let field = zero_radiation_field();
    let mut s = Streamline::initialize(300.0, 2.0e8, 1.0e-3, &field, &p, &rk4_engine(1.0)).unwrap();

    let status = s.iterate(&field, &p, 1_000);

    assert_eq!(status, Status::Stalled);
    assert_eq!(s.steps(), 5);
    assert_eq!(s.history().len(), 6);
}

#[test]
fn force_failure_mid_run_stalls_the_streamline() {
    let p = test_params();
    // fails once the parcel climbs above Z = 20
    let field = ForceField::gravito_radiative(PointSourceFlux, |local: &LocalRadiation| {
        if local.z > 20.0 { f64::NAN } else { 0.0 }
    });
    let v_z0 = 0.6 * launch_escape_velocity(100.0, &p);
    let mut s = Streamline::initialize(100.0, 2.0e8, v_z0, &field, &p, &rk4_engine(2.0)).unwrap();

    let status = s.iterate(&field, &p, p.max_steps);

    assert_eq!(status, Status::Stalled);
    assert!(matches!(s.stall_reason(), Some(StallReason::Failure(WindError::NumericalFailure(_)))));
    assert_eq!(s.history().len(), s.steps() + 1);
    assert!(s.max_height() <= 20.0);
}

#[test]
fn outcome_is_stable_under_step_refinement() {
    let p = test_params();
    let field = zero_radiation_field();
    let bound = 0.8 * launch_escape_velocity(100.0, &p);
    let unbound = 1.5 * launch_escape_velocity(100.0, &p);

    for (v_z0, expected) in [(bound, Status::FellBack), (unbound, Status::Escaped)] {
        for h in [8.0, 4.0, 2.0] {
            let mut s = Streamline::initialize(100.0, 2.0e8, v_z0, &field, &p, &rk4_engine(h)).unwrap();
            assert_eq!(s.iterate(&field, &p, p.max_steps), expected, "h = {h}");
        }
    }
}

#[test]
fn every_integrator_reaches_the_same_outcome() {
    let p = test_params();
    let field = zero_radiation_field();
    let v_z0 = 0.5 * launch_escape_velocity(100.0, &p);
    let engines = [
        Engine::fixed(IntegratorConfig::Verlet, 2.0),
        Engine::fixed(IntegratorConfig::Rk4, 2.0),
        Engine::default(),
    ];

    for engine in engines {
        let mut s = Streamline::initialize(100.0, 2.0e8, v_z0, &field, &p, &engine).unwrap();
        assert_eq!(s.iterate(&field, &p, p.max_steps), Status::FellBack, "{:?}", engine.integrator);
    }
}

#[test]
fn density_drops_as_the_wind_expands() {
    let p = test_params();
    let field = zero_radiation_field();
    let v_z0 = 3.0 * launch_escape_velocity(100.0, &p);
    let mut s = Streamline::initialize(100.0, 2.0e8, v_z0, &field, &p, &rk4_engine(5.0)).unwrap();

    s.iterate(&field, &p, p.max_steps);

    assert_eq!(s.history()[0].rho, 2.0e8);
    assert!(s.current().rho < 1.0e-2 * 2.0e8);
    let launch = s.launch();
    assert_relative_eq!(
        continuity_density(launch, &s.current().x, &s.current().v, p.thermal_velocity()),
        s.current().rho
    );
}

// ==================================================================================
// Ensemble tests
// ==================================================================================

pub fn ensemble(field: ForceField) -> StreamlineEnsemble {
    StreamlineEnsemble::new(test_params(), field, rk4_engine(4.0)).unwrap()
}

pub fn explicit_grid(radii: Vec<f64>, velocity: VelocityProfileConfig) -> GridConfig {
    GridConfig {
        radii: RadialGridConfig::Explicit { radii },
        density: DensityProfileConfig::Constant { rho: 2.0e8 },
        velocity,
    }
}

#[test]
fn inverted_disc_is_a_configuration_error() {
    let p = Parameters { disc_inner_radius: 2000.0, disc_outer_radius: 1000.0, ..test_params() };

    let result = StreamlineEnsemble::new(p, zero_radiation_field(), rk4_engine(1.0));

    assert!(matches!(result, Err(WindError::Configuration(_))));
}

#[test]
fn bad_step_size_is_a_configuration_error() {
    let result = StreamlineEnsemble::new(test_params(), zero_radiation_field(), rk4_engine(-1.0));

    assert!(matches!(result, Err(WindError::Configuration(_))));
}

#[test]
fn initial_step_outside_bounds_is_a_configuration_error() {
    let too_large = Engine { h0: 1.0e5, ..Engine::default() };
    let too_small = Engine { h0: 1.0e-9, ..Engine::default() };

    assert!(matches!(too_large.validate(), Err(WindError::Configuration(_))));
    assert!(matches!(too_small.validate(), Err(WindError::Configuration(_))));
    assert!(Engine::default().validate().is_ok());
}

#[test]
fn off_disc_single_launch_is_a_configuration_error() {
    let p = test_params();
    let mut ens = ensemble(zero_radiation_field());

    for r0 in [3.0, 2000.0] {
        let v_z0 = 0.5 * launch_escape_velocity(r0, &p);
        let result = ens.launch_single(r0, 2.0e8, v_z0);
        assert!(matches!(result, Err(WindError::Configuration(_))), "accepted R0 = {r0}");
    }
    assert!(ens.is_empty());
}

#[test]
fn grid_launches_in_ascending_radius() {
    let mut ens = ensemble(zero_radiation_field());
    let grid = explicit_grid(vec![100.0, 200.0, 300.0], VelocityProfileConfig::Thermal);

    let launched = ens.launch_grid(&grid).unwrap();
    let radii: Vec<f64> = launched.iter().map(|s| s.launch().r0).collect();

    assert_eq!(radii, vec![100.0, 200.0, 300.0]);
    assert!(launched.iter().all(|s| s.status() == Status::Running));
}

#[test]
fn unsorted_explicit_grid_is_sorted() {
    let mut ens = ensemble(zero_radiation_field());
    let grid = explicit_grid(vec![300.0, 100.0, 200.0], VelocityProfileConfig::Thermal);

    ens.launch_grid(&grid).unwrap();
    let radii: Vec<f64> = ens.streamlines().iter().map(|s| s.launch().r0).collect();

    assert_eq!(radii, vec![100.0, 200.0, 300.0]);
}

#[test]
fn invalid_grids_register_nothing() {
    let mut ens = ensemble(zero_radiation_field());
    let outside = explicit_grid(vec![100.0, 5000.0], VelocityProfileConfig::Thermal);
    let duplicated = explicit_grid(vec![100.0, 100.0], VelocityProfileConfig::Thermal);
    let empty = GridConfig {
        radii: RadialGridConfig::Linear { r_min: 100.0, r_max: 200.0, count: 0 },
        ..explicit_grid(vec![], VelocityProfileConfig::Thermal)
    };

    for grid in [outside, duplicated, empty] {
        assert!(matches!(ens.launch_grid(&grid), Err(WindError::Configuration(_))));
    }
    assert!(ens.is_empty());
}

#[test]
fn linear_and_log_grids_span_the_range() {
    let linear = RadialGridConfig::Linear { r_min: 100.0, r_max: 500.0, count: 5 };
    let log = RadialGridConfig::Log { r_min: 10.0, r_max: 1000.0, count: 3 };

    assert_eq!(linear.radii().unwrap(), vec![100.0, 200.0, 300.0, 400.0, 500.0]);
    let log_radii = log.radii().unwrap();
    assert_relative_eq!(log_radii[0], 10.0, epsilon = 1e-9);
    assert_relative_eq!(log_radii[1], 100.0, epsilon = 1e-9);
    assert_relative_eq!(log_radii[2], 1000.0, epsilon = 1e-9);
}

#[test]
fn density_profile_follows_power_law() {
    let profile = DensityProfileConfig::PowerLaw { rho_ref: 1.0e8, r_ref: 100.0, exponent: -1.0 };

    assert_relative_eq!(profile.density_at(200.0), 5.0e7);
}

#[test]
fn annuli_split_at_neighbour_midpoints() {
    let mut ens = ensemble(zero_radiation_field());
    ens.launch_grid(&explicit_grid(vec![100.0, 200.0, 300.0], VelocityProfileConfig::Thermal)).unwrap();

    assert_eq!(ens.annuli(), vec![(50.0, 150.0), (150.0, 250.0), (250.0, 350.0)]);
}

#[test]
fn lone_streamline_represents_the_whole_disc() {
    let mut ens = ensemble(zero_radiation_field());
    ens.launch_single(300.0, 2.0e8, 0.0).unwrap();

    let p = test_params();
    assert_eq!(ens.annuli(), vec![(p.disc_inner_radius, p.disc_outer_radius)]);
}

#[test]
fn mass_loss_unavailable_before_run() {
    let mut ens = ensemble(zero_radiation_field());
    assert_eq!(ens.mass_loss_rate(), None);

    ens.launch_grid(&explicit_grid(vec![100.0, 200.0], VelocityProfileConfig::Thermal)).unwrap();

    assert_eq!(ens.mass_loss_rate(), None);
    assert!(ens.mass_loss_contributions().is_none());
}

#[test]
fn failed_wind_loses_no_mass() {
    let mut ens = ensemble(zero_radiation_field());
    ens.launch_grid(&explicit_grid(
        vec![100.0, 200.0, 300.0],
        VelocityProfileConfig::EscapeFraction { fraction: 0.5 },
    ))
    .unwrap();

    let summary = ens.run_all(test_params().max_steps);

    assert_eq!(summary.fell_back, 3);
    assert_eq!(ens.mass_loss_rate(), Some(0.0));
}

#[test]
fn escaping_streamline_carries_mass_in_radius_order() {
    let mut ens = ensemble(zero_radiation_field());
    ens.launch_grid(&explicit_grid(
        vec![100.0, 200.0, 300.0],
        VelocityProfileConfig::EscapeFraction { fraction: 3.0 },
    ))
    .unwrap();

    let summary = ens.run_all(test_params().max_steps);
    let contributions = ens.mass_loss_contributions().unwrap();
    let rate = ens.mass_loss_rate().unwrap();

    assert_eq!(summary.escaped, 3);
    let visited: Vec<f64> = contributions.iter().map(|c| c.r0).collect();
    assert_eq!(visited, vec![100.0, 200.0, 300.0]);
    assert!(contributions.iter().all(|c| c.rate > 0.0));
    assert!(rate.is_finite() && rate > 0.0);
    assert!(ens.mass_loss_rate_eddington().unwrap() > 0.0);
}

#[test]
fn numerical_failure_is_isolated_to_one_streamline() {
    // the force multiplier breaks only around R = 200
    let field = ForceField::gravito_radiative(PointSourceFlux, |local: &LocalRadiation| {
        if (190.0..210.0).contains(&local.r) { f64::NAN } else { 0.0 }
    });
    let p = test_params();
    let mut ens = StreamlineEnsemble::new(p.clone(), field, Engine { parallel: true, ..rk4_engine(4.0) }).unwrap();
    ens.launch_single(100.0, 2.0e8, 0.5 * launch_escape_velocity(100.0, &p)).unwrap();
    ens.launch_single(200.0, 2.0e8, 0.5 * launch_escape_velocity(200.0, &p)).unwrap();
    ens.launch_single(300.0, 2.0e8, 3.0 * launch_escape_velocity(300.0, &p)).unwrap();

    let summary = ens.run_all(p.max_steps);
    let statuses: Vec<Status> = ens.streamlines().iter().map(|s| s.status()).collect();

    assert_eq!(statuses, vec![Status::FellBack, Status::Stalled, Status::Escaped]);
    assert_eq!(summary.total(), 3);
    for status in [Status::FellBack, Status::Stalled, Status::Escaped] {
        assert_eq!(summary.count(status), 1);
    }
    let contributions = ens.mass_loss_contributions().unwrap();
    assert_eq!(contributions[1].status, Status::Stalled);
    assert_eq!(contributions[1].rate, 0.0);
    assert!(contributions[2].rate > 0.0);
    assert_eq!(ens.mass_loss_rate(), Some(contributions[2].rate));
}

#[test]
fn parallel_and_serial_runs_agree() {
    let run = |parallel: bool| {
        let mut ens = StreamlineEnsemble::new(
            test_params(),
            zero_radiation_field(),
            Engine { parallel, ..rk4_engine(4.0) },
        )
        .unwrap();
        ens.launch_grid(&GridConfig {
            radii: RadialGridConfig::Linear { r_min: 100.0, r_max: 400.0, count: 4 },
            density: DensityProfileConfig::Constant { rho: 2.0e8 },
            velocity: VelocityProfileConfig::EscapeFraction { fraction: 0.9 },
        })
        .unwrap();
        ens.run_all(test_params().max_steps);
        ens
    };

    let serial = run(false);
    let parallel = run(true);

    for (a, b) in serial.streamlines().iter().zip(parallel.streamlines()) {
        assert_eq!(a.status(), b.status());
        assert_eq!(a.history(), b.history());
    }
}

#[test]
fn report_exports_every_trajectory() {
    let mut ens = ensemble(zero_radiation_field());
    ens.launch_grid(&explicit_grid(vec![100.0, 200.0], VelocityProfileConfig::Thermal)).unwrap();
    ens.run_all(test_params().max_steps);

    let report = EnsembleReport::from(&ens);

    assert_eq!(report.trajectories.len(), 2);
    for (trajectory, streamline) in report.trajectories.iter().zip(ens.streamlines()) {
        assert_eq!(trajectory.r0, streamline.launch().r0);
        assert_eq!(trajectory.points.len(), streamline.history().len());
        assert!(trajectory.is_status(streamline.status()));
        assert_eq!(trajectory.status, streamline.status());
        assert_eq!(trajectory.points[0].t, 0.0);
    }
    assert_eq!(report.summary(), ens.summary());
    assert_eq!(report.mass_loss_rate, Some(0.0));
}

#[test]
fn status_exports_as_a_tag() {
    assert_eq!(serde_yaml::to_string(&Status::FellBack).unwrap().trim(), "fell_back");
    assert_eq!(serde_yaml::to_string(&Status::Escaped).unwrap().trim(), "escaped");
    assert_eq!(format!("{:9}|", Status::Escaped), "escaped  |");
}

// ==================================================================================
// Scenario tests
// ==================================================================================

const SCENARIO: &str = r#"
parameters:
  escape_radius: 2000.0
integrator:
  method: "rk4"
  h0: 4.0
  parallel: false
radiation:
  flux: "point_source"
  force_multiplier: {kind: constant, value: 0.0}
grid:
  radii: {kind: linear, r_min: 100.0, r_max: 300.0, count: 3}
  density: {kind: power_law, rho_ref: 2.0e8, r_ref: 100.0, exponent: -1.0}
  velocity: {kind: escape_fraction, fraction: 0.5}
"#;

#[test]
fn scenario_yaml_builds_a_launched_ensemble() {
    let cfg: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();
    let scenario = Scenario::build_scenario(cfg).unwrap();
    let ens = &scenario.ensemble;

    assert_eq!(ens.len(), 3);
    assert_eq!(ens.params().escape_radius, 2000.0);
    assert_eq!(ens.params().black_hole_mass, Parameters::default().black_hole_mass);
    assert_eq!(ens.engine().integrator, IntegratorConfig::Rk4);
    assert_relative_eq!(ens.streamlines()[2].launch().rho0, 2.0e8 / 3.0);
}

#[test]
fn scenario_with_inverted_disc_fails_fast() {
    let yaml = SCENARIO.replace(
        "escape_radius: 2000.0",
        "escape_radius: 2000.0\n  disc_inner_radius: 1800.0",
    );
    let cfg: ScenarioConfig = serde_yaml::from_str(&yaml).unwrap();

    let result = Scenario::build_scenario(cfg);

    assert!(matches!(result, Err(WindError::Configuration(_))));
}

#[test]
fn bundled_gravity_only_scenario_falls_back() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/gravity_only.yaml");
    let file = std::fs::File::open(path).unwrap();
    let cfg: ScenarioConfig = serde_yaml::from_reader(file).unwrap();
    let mut scenario = Scenario::build_scenario(cfg).unwrap();

    let max_steps = scenario.ensemble.params().max_steps;
    let summary = scenario.ensemble.run_all(max_steps);

    assert_eq!(summary.fell_back, 3);
    assert_eq!(scenario.ensemble.mass_loss_rate(), Some(0.0));
}

#[test]
fn step_ceiling_override_reaches_the_streamlines() {
    let cfg: ScenarioConfig = serde_yaml::from_str(SCENARIO).unwrap();

    let kept = cfg.clone().with_max_steps(None).parameters.to_parameters();
    let raised = Scenario::build_scenario(cfg.clone().with_max_steps(Some(123_456))).unwrap();
    let mut capped = Scenario::build_scenario(cfg.with_max_steps(Some(3))).unwrap();

    assert_eq!(kept.max_steps, Parameters::default().max_steps);
    assert_eq!(raised.ensemble.params().max_steps, 123_456);

    let summary = capped.ensemble.run_all(1_000);
    assert_eq!(summary.stalled, 3);
    assert!(capped.ensemble.streamlines().iter().all(|s| s.steps() == 3));
}

#[test]
fn line_driven_disc_scenario_terminates() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/disc_wind.yaml");
    let file = std::fs::File::open(path).unwrap();
    let mut cfg: ScenarioConfig = serde_yaml::from_reader(file).unwrap();
    // same physics on a coarser quadrature and a three-line grid
    cfg.grid.radii = RadialGridConfig::Explicit { radii: vec![300.0, 800.0, 1300.0] };
    cfg.radiation.disc_radial_panels = Some(4);
    cfg.radiation.disc_angular_panels = Some(4);
    let mut scenario = Scenario::build_scenario(cfg.with_max_steps(Some(5_000))).unwrap();

    let summary = scenario.ensemble.run_all(5_000);
    let rate = scenario.ensemble.mass_loss_rate().unwrap();

    assert_eq!(summary.running, 0);
    assert_eq!(summary.escaped + summary.fell_back + summary.stalled, 3);
    assert!(rate.is_finite() && rate >= 0.0);
    assert_eq!(rate > 0.0, summary.escaped > 0);
    for s in scenario.ensemble.streamlines() {
        assert!(s.status().is_terminal());
        for state in &s.history()[1..] {
            let rad = &state.radiation;
            assert!(rad.force_multiplier >= 1.0, "line driving lost its Thomson baseline");
            assert!(rad.tau_uv.is_finite() && rad.xi.is_finite() && rad.tau_eff.is_finite());
        }
    }
}
