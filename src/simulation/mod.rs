pub mod constants;
pub mod error;
pub mod states;
pub mod params;
pub mod engine;
pub mod radiation;
pub mod forces;
pub mod integrator;
pub mod streamline;
pub mod ensemble;
pub mod scenario;
