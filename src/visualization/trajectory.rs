//! Trajectory export for plotting and reporting tools
//!
//! Flattens streamline histories into plain serializable records:
//! one (R, Z, v_R, v_Z, rho, t) point per accepted step, the terminal
//! status, and for a whole ensemble the ordered trajectories plus the
//! mass-loss rate. Persisting them is left to the caller.

use serde::Serialize;

use crate::simulation::ensemble::{EnsembleSummary, StreamlineEnsemble};
use crate::simulation::states::{PhysicalState, StallReason, Status};
use crate::simulation::streamline::Streamline;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub r: f64,
    pub z: f64,
    pub v_r: f64,
    pub v_z: f64,
    pub rho: f64,
    pub t: f64,
}

impl From<&PhysicalState> for TrajectoryPoint {
    fn from(s: &PhysicalState) -> Self {
        Self {
            r: s.x.x,
            z: s.x.y,
            v_r: s.v.x,
            v_z: s.v.y,
            rho: s.rho,
            t: s.t,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    pub r0: f64,
    pub rho0: f64,
    pub v_z0: f64,
    pub status: Status,
    pub stall_reason: Option<String>,
    pub points: Vec<TrajectoryPoint>,
}

impl Trajectory {
    pub fn is_status(&self, status: Status) -> bool {
        self.status == status
    }
}

impl From<&Streamline> for Trajectory {
    fn from(s: &Streamline) -> Self {
        let launch = s.launch();
        Self {
            r0: launch.r0,
            rho0: launch.rho0,
            v_z0: launch.v_z0,
            status: s.status(),
            stall_reason: s.stall_reason().map(|reason| match reason {
                StallReason::Failure(e) => e.to_string(),
                StallReason::StepLimit { steps } => format!("step limit reached at {steps} steps"),
            }),
            points: s.history().iter().map(TrajectoryPoint::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsembleReport {
    pub trajectories: Vec<Trajectory>, // launch order
    pub escaped: usize,
    pub fell_back: usize,
    pub stalled: usize,
    pub running: usize,
    pub mass_loss_rate: Option<f64>, // g/s
    pub mass_loss_rate_eddington: Option<f64>,
}

impl EnsembleReport {
    pub fn summary(&self) -> EnsembleSummary {
        EnsembleSummary {
            running: self.running,
            escaped: self.escaped,
            fell_back: self.fell_back,
            stalled: self.stalled,
        }
    }
}

impl From<&StreamlineEnsemble> for EnsembleReport {
    fn from(ensemble: &StreamlineEnsemble) -> Self {
        let summary = ensemble.summary();
        Self {
            trajectories: ensemble.streamlines().iter().map(Trajectory::from).collect(),
            escaped: summary.escaped,
            fell_back: summary.fell_back,
            stalled: summary.stalled,
            running: summary.running,
            mass_loss_rate: ensemble.mass_loss_rate(),
            mass_loss_rate_eddington: ensemble.mass_loss_rate_eddington(),
        }
    }
}
