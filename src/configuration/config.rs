//! Configuration types for loading wind scenarios from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! wind run. A scenario consists of:
//!
//! - [`ParametersConfig`] – black hole, disc and termination parameters
//! - [`IntegratorSettingsConfig`] – integrator choice and step controls
//! - [`RadiationConfig`] – radiation flux model and force multiplier
//! - [`GridConfig`]       – launch radii, density and velocity profiles
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! # YAML format
//! Every `parameters` field is optional and falls back to its default:
//!
//! ```yaml
//! parameters:
//!   black_hole_mass: 1.0e8     # solar masses
//!   eddington_ratio: 0.5
//!   disc_inner_radius: 6.0     # Rg
//!   disc_outer_radius: 1600.0  # Rg
//!   escape_radius: 5000.0      # Rg
//!   max_steps: 50000
//!
//! integrator:
//!   method: "rk45"             # or "rk4" / "verlet"
//!   h0: 0.1                    # first (or fixed) step in Rg/c
//!   atol: 1.0e-9
//!   rtol: 1.0e-6
//!
//! radiation:
//!   flux: "disc"               # or "point_source"
//!   force_multiplier:
//!     kind: stevens_kallman    # or {kind: constant, value: 0.0}
//!
//! grid:
//!   radii: {kind: linear, r_min: 200.0, r_max: 1500.0, count: 14}
//!   density: {kind: constant, rho: 2.0e8}
//!   velocity: {kind: thermal}
//! ```
//!
//! The scenario builder maps this configuration into the runtime
//! ensemble, which validates it before any streamline is launched.

use serde::{Deserialize, Serialize};

use crate::simulation::params::Parameters;

/// Which integrator method used by the engine
/// method: "verlet"`, `"rk4"` or `"rk45"`
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegratorConfig {
    #[serde(rename = "verlet")] // Velocity Verlet, 2nd order, fixed step size
    Verlet,

    #[serde(rename = "rk4")] // Classical 4th-order Runge–Kutta, fixed step size
    Rk4,

    #[serde(rename = "rk45")] // Dormand–Prince 5(4) with adaptive step size
    Rk45,
}

/// Integrator choice and step-size controls
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IntegratorSettingsConfig {
    pub method: IntegratorConfig,
    pub h0: f64, // fixed step, or first trial step for rk45
    #[serde(default)]
    pub atol: Option<f64>,
    #[serde(default)]
    pub rtol: Option<f64>,
    #[serde(default)]
    pub h_min: Option<f64>,
    #[serde(default)]
    pub h_max: Option<f64>,
    #[serde(default = "default_parallel")]
    pub parallel: bool, // advance streamlines on the rayon pool
}

fn default_parallel() -> bool {
    true
}

/// Global physical parameters; missing fields take the defaults of [`Parameters`]
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ParametersConfig {
    pub black_hole_mass: Option<f64>,
    pub eddington_ratio: Option<f64>,
    pub xray_fraction: Option<f64>,
    pub disc_inner_radius: Option<f64>,
    pub disc_outer_radius: Option<f64>,
    pub shielding_radius: Option<f64>,
    pub shielding_density: Option<f64>,
    pub temperature: Option<f64>,
    pub launch_height: Option<f64>,
    pub escape_radius: Option<f64>,
    pub fallback_height: Option<f64>,
    pub max_steps: Option<usize>,
}

impl ParametersConfig {
    /// Fill unset fields from the defaults
    pub fn to_parameters(&self) -> Parameters {
        let d = Parameters::default();
        Parameters {
            black_hole_mass: self.black_hole_mass.unwrap_or(d.black_hole_mass),
            eddington_ratio: self.eddington_ratio.unwrap_or(d.eddington_ratio),
            xray_fraction: self.xray_fraction.unwrap_or(d.xray_fraction),
            disc_inner_radius: self.disc_inner_radius.unwrap_or(d.disc_inner_radius),
            disc_outer_radius: self.disc_outer_radius.unwrap_or(d.disc_outer_radius),
            shielding_radius: self.shielding_radius.unwrap_or(d.shielding_radius),
            shielding_density: self.shielding_density.unwrap_or(d.shielding_density),
            temperature: self.temperature.unwrap_or(d.temperature),
            launch_height: self.launch_height.unwrap_or(d.launch_height),
            escape_radius: self.escape_radius.unwrap_or(d.escape_radius),
            fallback_height: self.fallback_height.unwrap_or(d.fallback_height),
            max_steps: self.max_steps.unwrap_or(d.max_steps),
        }
    }
}

/// Source of the electron-scattering radiation flux
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FluxConfig {
    #[serde(rename = "none")] // gravity only
    None,

    #[serde(rename = "point_source")] // isotropic central source
    PointSource,

    #[serde(rename = "disc")] // thin-disc integral
    Disc,
}

/// Radiation-force boost relative to electron scattering
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForceMultiplierConfig {
    Constant { value: f64 },
    StevensKallman {
        #[serde(default = "default_electron_scattering")]
        include_electron_scattering: bool,
    },
}

fn default_electron_scattering() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RadiationConfig {
    pub flux: FluxConfig,
    pub force_multiplier: ForceMultiplierConfig,
    #[serde(default)]
    pub disc_radial_panels: Option<usize>, // quadrature panels per side of the footprint
    #[serde(default)]
    pub disc_angular_panels: Option<usize>,
}

/// Launch radii across the disc
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RadialGridConfig {
    Explicit { radii: Vec<f64> },
    Linear { r_min: f64, r_max: f64, count: usize },
    Log { r_min: f64, r_max: f64, count: usize },
}

/// Launch density as a function of launch radius (cm^-3)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DensityProfileConfig {
    Constant { rho: f64 },
    PowerLaw { rho_ref: f64, r_ref: f64, exponent: f64 },
}

/// Launch vertical velocity as a function of launch radius (units of c)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VelocityProfileConfig {
    Constant { v_z: f64 },
    Thermal, // isothermal sound speed of the wind gas
    EscapeFraction { fraction: f64 }, // fraction of the local escape speed
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub radii: RadialGridConfig,
    pub density: DensityProfileConfig,
    pub velocity: VelocityProfileConfig,
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub parameters: ParametersConfig, // Global physical parameters
    pub integrator: IntegratorSettingsConfig, // Integrator and step controls
    pub radiation: RadiationConfig, // Radiation flux and force multiplier
    pub grid: GridConfig, // Launch grid
}

impl ScenarioConfig {
    /// Replace the per-streamline step ceiling when one is given
    pub fn with_max_steps(mut self, max_steps: Option<usize>) -> Self {
        if max_steps.is_some() {
            self.parameters.max_steps = max_steps;
        }
        self
    }
}
