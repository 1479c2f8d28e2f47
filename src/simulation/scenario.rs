//! Build fully-initialized wind runs from configuration
//!
//! Takes a `ScenarioConfig` (YAML-facing) and produces a `Scenario`
//! holding a validated [`StreamlineEnsemble`] with its launch grid
//! registered:
//! - physical parameters (`Parameters`)
//! - engine settings (`Engine`)
//! - the force field (gravity plus the configured radiation pressure)
//!
//! Configuration errors surface here, before any streamline is stepped.

use crate::configuration::config::{
    FluxConfig, ForceMultiplierConfig, IntegratorSettingsConfig, RadiationConfig, ScenarioConfig,
};
use super::engine::Engine;
use super::ensemble::StreamlineEnsemble;
use super::error::Result;
use super::forces::ForceField;
use super::radiation::{
    ConstantForceMultiplier, DiscFlux, PointSourceFlux, RadiationFlux, StevensKallman,
};

/// A wind run ready to be driven
pub struct Scenario {
    pub ensemble: StreamlineEnsemble,
}

impl Scenario {
    pub fn build_scenario(cfg: ScenarioConfig) -> Result<Self> {
        // Parameters (runtime) from ParametersConfig, defaults for unset fields
        let parameters = cfg.parameters.to_parameters();

        // Engine (runtime) from IntegratorSettingsConfig
        let engine = build_engine(&cfg.integrator);

        // Forces: gravity plus the configured radiation pressure
        let forces = build_force_field(&cfg.radiation);

        let mut ensemble = StreamlineEnsemble::new(parameters, forces, engine)?;
        ensemble.launch_grid(&cfg.grid)?;

        Ok(Self { ensemble })
    }
}

pub fn build_engine(cfg: &IntegratorSettingsConfig) -> Engine {
    let defaults = Engine::default();
    Engine {
        integrator: cfg.method,
        h0: cfg.h0,
        atol: cfg.atol.unwrap_or(defaults.atol),
        rtol: cfg.rtol.unwrap_or(defaults.rtol),
        h_min: cfg.h_min.unwrap_or(defaults.h_min),
        h_max: cfg.h_max.unwrap_or(defaults.h_max),
        parallel: cfg.parallel,
    }
}

pub fn build_force_field(cfg: &RadiationConfig) -> ForceField {
    match cfg.flux {
        FluxConfig::None => ForceField::gravity_only(),
        FluxConfig::PointSource => with_multiplier(PointSourceFlux, &cfg.force_multiplier),
        FluxConfig::Disc => {
            let defaults = DiscFlux::default();
            let flux = DiscFlux {
                radial_panels: cfg.disc_radial_panels.unwrap_or(defaults.radial_panels),
                angular_panels: cfg.disc_angular_panels.unwrap_or(defaults.angular_panels),
            };
            with_multiplier(flux, &cfg.force_multiplier)
        }
    }
}

fn with_multiplier<F>(flux: F, multiplier: &ForceMultiplierConfig) -> ForceField
where
    F: RadiationFlux + 'static,
{
    match *multiplier {
        ForceMultiplierConfig::Constant { value } => {
            ForceField::gravito_radiative(flux, ConstantForceMultiplier(value))
        }
        ForceMultiplierConfig::StevensKallman {
            include_electron_scattering,
        } => ForceField::gravito_radiative(
            flux,
            StevensKallman {
                include_electron_scattering,
            },
        ),
    }
}
