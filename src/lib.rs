pub mod simulation;
pub mod configuration;
pub mod visualization;
pub mod benchmark;

pub use simulation::error::WindError;
pub use simulation::states::{NVec2, NVec4, LaunchConditions, LocalRadiation, PhysicalState, StallReason, Status};
pub use simulation::params::Parameters;
pub use simulation::engine::Engine;
pub use simulation::forces::{Acceleration, ForceContext, ForceEvaluation, ForceField, Gravity, RadiationPressure};
pub use simulation::radiation::{ConstantForceMultiplier, DiscFlux, ForceMultiplier, PointSourceFlux, RadiationFlux, StevensKallman};
pub use simulation::integrator::{dormand_prince_step, rk4_step, verlet_step, StepControl};
pub use simulation::streamline::Streamline;
pub use simulation::ensemble::{EnsembleSummary, MassLossContribution, StreamlineEnsemble};
pub use simulation::scenario::Scenario;

pub use configuration::config::{
    DensityProfileConfig, FluxConfig, ForceMultiplierConfig, GridConfig, IntegratorConfig,
    IntegratorSettingsConfig, ParametersConfig, RadialGridConfig, RadiationConfig, ScenarioConfig,
    VelocityProfileConfig,
};

pub use visualization::trajectory::{EnsembleReport, Trajectory, TrajectoryPoint};

pub use benchmark::benchmark::{bench_ensemble, bench_force_field};
