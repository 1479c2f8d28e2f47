//! Time integrators for a single streamline
//!
//! The state is the ODE vector y = (R, Z, v_R, v_Z); `deriv(t, y)` returns
//! dy/dt = (v_R, v_Z, a_R, a_Z) or the error the force field raised.
//! Provides velocity-Verlet and RK4 with a fixed step, and a
//! Dormand–Prince 5(4) pair with adaptive step control.

use super::engine::Engine;
use super::error::{Result, WindError};
use super::states::{NVec2, NVec4};
use crate::configuration::config::IntegratorConfig;

/// Rejected trial steps tolerated inside one accepted step
const MAX_REJECTIONS: usize = 50;

fn accel(dy: &NVec4) -> NVec2 {
    NVec2::new(dy[2], dy[3])
}

fn join(x: NVec2, v: NVec2) -> NVec4 {
    NVec4::new(x.x, x.y, v.x, v.y)
}

/// Advance y by one step using velocity–Verlet (kick-drift-kick)
/// Uses two force evaluations per step
///
/// The second kick sees the predicted end-of-step velocity, so the step
/// stays second order when the force depends on velocity.
pub fn verlet_step<F>(t: f64, y: &NVec4, dt: f64, deriv: &mut F) -> Result<NVec4>
where
    F: FnMut(f64, &NVec4) -> Result<NVec4>,
{
    let half_dt = 0.5 * dt;
    let x = NVec2::new(y[0], y[1]);
    let v = NVec2::new(y[2], y[3]);

    // Kick: v_n+1/2 = v_n + (1/2 * dt) * a_n
    let a_old = accel(&deriv(t, y)?);
    let v_half = v + half_dt * a_old;

    // Drift: x_n+1 = x_n + dt v_n+1/2
    let x_new = x + dt * v_half;

    // Second kick with a_n+1 evaluated at the drifted position and
    // the predicted velocity v_n + dt a_n
    let v_pred = v_half + half_dt * a_old;
    let a_new = accel(&deriv(t + dt, &join(x_new, v_pred))?);
    let v_new = v_half + half_dt * a_new;

    Ok(join(x_new, v_new))
}

/// Advance y by one step using classical 4th-order Runge–Kutta
pub fn rk4_step<F>(t: f64, y: &NVec4, dt: f64, deriv: &mut F) -> Result<NVec4>
where
    F: FnMut(f64, &NVec4) -> Result<NVec4>,
{
    let half_dt = 0.5 * dt;
    let k1 = deriv(t, y)?;
    let k2 = deriv(t + half_dt, &(y + half_dt * k1))?;
    let k3 = deriv(t + half_dt, &(y + half_dt * k2))?;
    let k4 = deriv(t + dt, &(y + dt * k3))?;
    Ok(y + dt / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4))
}

// Dormand–Prince tableau
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;
// 5th minus embedded 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// One Dormand–Prince 5(4) trial step
/// Returns the 5th-order solution and the local error estimate
pub fn dormand_prince_step<F>(t: f64, y: &NVec4, dt: f64, deriv: &mut F) -> Result<(NVec4, NVec4)>
where
    F: FnMut(f64, &NVec4) -> Result<NVec4>,
{
    let k1 = deriv(t, y)?;
    let k2 = deriv(t + dt / 5.0, &(y + dt * A21 * k1))?;
    let k3 = deriv(t + 3.0 * dt / 10.0, &(y + dt * (A31 * k1 + A32 * k2)))?;
    let k4 = deriv(t + 4.0 * dt / 5.0, &(y + dt * (A41 * k1 + A42 * k2 + A43 * k3)))?;
    let k5 = deriv(
        t + 8.0 * dt / 9.0,
        &(y + dt * (A51 * k1 + A52 * k2 + A53 * k3 + A54 * k4)),
    )?;
    let k6 = deriv(
        t + dt,
        &(y + dt * (A61 * k1 + A62 * k2 + A63 * k3 + A64 * k4 + A65 * k5)),
    )?;
    let y_new = y + dt * (B1 * k1 + B3 * k3 + B4 * k4 + B5 * k5 + B6 * k6);
    let k7 = deriv(t + dt, &y_new)?;
    let err = dt * (E1 * k1 + E3 * k3 + E4 * k4 + E5 * k5 + E6 * k6 + E7 * k7);
    Ok((y_new, err))
}

/// RMS of the error scaled by atol + rtol * |y|
fn error_norm(y: &NVec4, y_new: &NVec4, err: &NVec4, atol: f64, rtol: f64) -> f64 {
    let sum: f64 = (0..4)
        .map(|i| {
            let scale = atol + rtol * y[i].abs().max(y_new[i].abs());
            (err[i] / scale).powi(2)
        })
        .sum();
    (sum / 4.0).sqrt()
}

/// Per-streamline step-size state
///
/// Fixed-step methods always take `h`; rk45 adapts `h` after every
/// trial so each streamline carries its own controller.
#[derive(Debug, Clone)]
pub struct StepControl {
    pub method: IntegratorConfig,
    pub h: f64, // current (next trial) step size
    atol: f64,
    rtol: f64,
    h_min: f64,
    h_max: f64,
}

impl StepControl {
    pub fn new(engine: &Engine) -> Self {
        Self {
            method: engine.integrator,
            h: engine.h0,
            atol: engine.atol,
            rtol: engine.rtol,
            h_min: engine.h_min,
            h_max: engine.h_max,
        }
    }

    /// Take one accepted step from (t, y)
    /// Returns the step actually taken and the new state
    pub fn advance<F>(&mut self, t: f64, y: &NVec4, mut deriv: F) -> Result<(f64, NVec4)>
    where
        F: FnMut(f64, &NVec4) -> Result<NVec4>,
    {
        match self.method {
            IntegratorConfig::Verlet => {
                let y_new = verlet_step(t, y, self.h, &mut deriv)?;
                Ok((self.h, y_new))
            }
            IntegratorConfig::Rk4 => {
                let y_new = rk4_step(t, y, self.h, &mut deriv)?;
                Ok((self.h, y_new))
            }
            IntegratorConfig::Rk45 => self.adaptive(t, y, &mut deriv),
        }
    }

    fn adaptive<F>(&mut self, t: f64, y: &NVec4, deriv: &mut F) -> Result<(f64, NVec4)>
    where
        F: FnMut(f64, &NVec4) -> Result<NVec4>,
    {
        let mut last_error = None;

        for _ in 0..MAX_REJECTIONS {
            let h = self.h;
            match dormand_prince_step(t, y, h, deriv) {
                Ok((y_new, err)) => {
                    let norm = error_norm(y, &y_new, &err, self.atol, self.rtol);
                    if !norm.is_finite() {
                        last_error = Some(WindError::numerical(format!(
                            "non-finite error estimate with step {h:.3e}"
                        )));
                        self.shrink(0.25)?;
                        continue;
                    }
                    if norm <= 1.0 {
                        let factor = if norm == 0.0 {
                            5.0
                        } else {
                            (0.9 * norm.powf(-0.2)).clamp(0.2, 5.0)
                        };
                        self.h = (h * factor).clamp(self.h_min, self.h_max);
                        return Ok((h, y_new));
                    }
                    self.shrink((0.9 * norm.powf(-0.2)).max(0.2))?;
                }
                // A trial stage may wander into an invalid region; retry smaller
                Err(e) => {
                    if self.shrink(0.25).is_err() {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            WindError::numerical(format!("step rejected {MAX_REJECTIONS} times"))
        }))
    }

    fn shrink(&mut self, factor: f64) -> Result<()> {
        let h = self.h * factor;
        if h < self.h_min {
            return Err(WindError::numerical(format!(
                "step size {h:.3e} fell below h_min {:.3e}",
                self.h_min
            )));
        }
        self.h = h;
        Ok(())
    }
}
