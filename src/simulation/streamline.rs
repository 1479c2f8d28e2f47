//! A single wind streamline: one fluid parcel integrated from the disc
//! surface until it escapes, falls back, or stalls
//!
//! The streamline owns its state, its append-only history and its
//! step-size controller. Force-field and integrator errors are caught at
//! the step boundary and turned into the `Stalled` status, so a failing
//! streamline never affects its siblings.

use log::{debug, warn};

use super::engine::Engine;
use super::error::{Result, WindError};
use super::forces::{ForceContext, ForceField};
use super::integrator::StepControl;
use super::params::Parameters;
use super::states::{LaunchConditions, NVec2, NVec4, PhysicalState, StallReason, Status};

#[derive(Debug, Clone)]
pub struct Streamline {
    launch: LaunchConditions,
    history: Vec<PhysicalState>, // history[0] is the launch state
    status: Status,
    stall_reason: Option<StallReason>,
    steps: usize, // accepted steps
    control: StepControl,
}

/// Density from mass-flux conservation along the streamline
///
/// rho v A is constant with the cross-section A growing as d^2; speeds
/// are floored at the thermal speed so turning points stay finite.
pub fn continuity_density(launch: &LaunchConditions, x: &NVec2, v: &NVec2, v_thermal: f64) -> f64 {
    let d0 = launch.launch_distance();
    let d = x.norm();
    let expansion = (d0 / d).powi(2);
    launch.rho0 * expansion * launch.v_launch / v.norm().max(v_thermal)
}

impl Streamline {
    /// Launch a parcel from (r0, launch_height) in Keplerian rotation
    ///
    /// Fails with a configuration error for non-physical launch values.
    /// A force field that cannot be evaluated at the launch point leaves
    /// the streamline stalled before its first step.
    pub fn initialize(
        r0: f64,
        rho0: f64,
        v_z0: f64,
        field: &ForceField,
        params: &Parameters,
        engine: &Engine,
    ) -> Result<Self> {
        if !(r0.is_finite() && r0 > 0.0) {
            return Err(WindError::config(format!("launch radius must be positive, got {r0}")));
        }
        if !(rho0.is_finite() && rho0 > 0.0) {
            return Err(WindError::config(format!("launch density must be positive, got {rho0}")));
        }
        if !(v_z0.is_finite() && v_z0 >= 0.0) {
            return Err(WindError::config(format!(
                "launch velocity must be non-negative, got {v_z0}"
            )));
        }

        let v_thermal = params.thermal_velocity();
        let launch = LaunchConditions::keplerian(r0, params.launch_height, rho0, v_z0, v_thermal);
        let x = NVec2::new(r0, launch.z0);
        let v = NVec2::new(0.0, v_z0);

        let mut initial = PhysicalState {
            t: 0.0,
            x,
            v,
            a: NVec2::zeros(),
            rho: rho0,
            path_length: 0.0,
            radiation: Default::default(),
        };

        let ctx = ForceContext {
            launch: &launch,
            x,
            v,
            rho: rho0,
            velocity_gradient: 0.0,
        };
        let evaluation = field.evaluate(&ctx, params);
        if let Ok(eval) = &evaluation {
            initial.a = eval.a;
            initial.radiation = eval.radiation;
        }

        let mut streamline = Self {
            launch,
            history: vec![initial],
            status: Status::Running,
            stall_reason: None,
            steps: 0,
            control: StepControl::new(engine),
        };
        if let Err(e) = evaluation {
            streamline.stall(StallReason::Failure(e));
        }
        Ok(streamline)
    }

    pub fn launch(&self) -> &LaunchConditions {
        &self.launch
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn stall_reason(&self) -> Option<&StallReason> {
        self.stall_reason.as_ref()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn history(&self) -> &[PhysicalState] {
        &self.history
    }

    pub fn current(&self) -> &PhysicalState {
        // history always holds the launch state
        &self.history[self.history.len() - 1]
    }

    /// Largest height reached so far
    pub fn max_height(&self) -> f64 {
        self.history.iter().map(|s| s.z()).fold(f64::MIN, f64::max)
    }

    /// Advance by one accepted step and evaluate the termination policy
    /// A terminal streamline is left untouched
    pub fn step(&mut self, field: &ForceField, params: &Parameters) -> Status {
        if self.status.is_terminal() {
            return self.status;
        }
        if self.steps >= params.max_steps {
            self.stall(StallReason::StepLimit { steps: self.steps });
            return self.status;
        }

        match self.advance(field, params) {
            Ok(next) => {
                self.history.push(next);
                self.steps += 1;
                if let Some(outcome) = self.classify(params) {
                    self.finish(outcome);
                } else if self.steps >= params.max_steps {
                    self.stall(StallReason::StepLimit { steps: self.steps });
                }
            }
            Err(e) => self.stall(StallReason::Failure(e)),
        }
        self.status
    }

    /// Step until terminal or until `max_steps` more steps have been taken
    ///
    /// Running out of budget stalls the streamline, so the returned status
    /// is always terminal. Calling it again on a terminal streamline
    /// changes nothing.
    pub fn iterate(&mut self, field: &ForceField, params: &Parameters, max_steps: usize) -> Status {
        if self.status.is_terminal() {
            return self.status;
        }
        for _ in 0..max_steps {
            if self.step(field, params).is_terminal() {
                return self.status;
            }
        }
        self.stall(StallReason::StepLimit { steps: self.steps });
        self.status
    }

    /// Integrate one step from the current state
    fn advance(&mut self, field: &ForceField, params: &Parameters) -> Result<PhysicalState> {
        let launch = self.launch;
        let current = self.current().clone();
        let v_thermal = params.thermal_velocity();

        // |dv/dl| ~ |a| / v from the last accepted state, held fixed over the step
        let velocity_gradient = current.a.norm() / current.speed().max(v_thermal);

        let deriv = |_t: f64, y: &NVec4| -> Result<NVec4> {
            let x = NVec2::new(y[0], y[1]);
            let v = NVec2::new(y[2], y[3]);
            let ctx = ForceContext {
                launch: &launch,
                x,
                v,
                rho: continuity_density(&launch, &x, &v, v_thermal),
                velocity_gradient,
            };
            let eval = field.evaluate(&ctx, params)?;
            Ok(NVec4::new(v.x, v.y, eval.a.x, eval.a.y))
        };

        let (dt, y) = self.control.advance(current.t, &current.to_ode(), deriv)?;
        if !y.iter().all(|c| c.is_finite()) {
            return Err(WindError::numerical(format!(
                "non-finite state after step at t = {}",
                current.t
            )));
        }

        let x = NVec2::new(y[0], y[1]);
        let v = NVec2::new(y[2], y[3]);
        let rho = continuity_density(&launch, &x, &v, v_thermal);
        let eval = field.evaluate(
            &ForceContext {
                launch: &launch,
                x,
                v,
                rho,
                velocity_gradient,
            },
            params,
        )?;

        Ok(PhysicalState {
            t: current.t + dt,
            x,
            v,
            a: eval.a,
            rho,
            path_length: current.path_length + (x - current.x).norm(),
            radiation: eval.radiation,
        })
    }

    /// Escaped: unbound and past the escape boundary
    /// FellBack: moving down through the disc plane, on the disc or beyond
    /// its edges
    fn classify(&self, params: &Parameters) -> Option<Status> {
        let state = self.current();
        let (r, z) = (state.r(), state.z());

        let unbound = state.specific_energy(&self.launch) > 0.0;
        if unbound && (r >= params.escape_radius || z >= params.escape_radius) {
            return Some(Status::Escaped);
        }
        if z <= params.fallback_height && state.v.y < 0.0 {
            return Some(Status::FellBack);
        }
        None
    }

    fn finish(&mut self, status: Status) {
        self.status = status;
        debug!(
            "streamline R0 = {:.1} {} after {} steps (t = {:.3e})",
            self.launch.r0,
            status,
            self.steps,
            self.current().t
        );
    }

    fn stall(&mut self, reason: StallReason) {
        match &reason {
            StallReason::Failure(e) => warn!(
                "streamline R0 = {:.1} stalled after {} steps: {e}",
                self.launch.r0, self.steps
            ),
            StallReason::StepLimit { steps } => warn!(
                "streamline R0 = {:.1} stalled: step limit reached at {steps} steps",
                self.launch.r0
            ),
        }
        self.stall_reason = Some(reason);
        self.finish(Status::Stalled);
    }
}
