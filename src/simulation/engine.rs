//! High-level runtime engine settings
//!
//! Selects the integrator, its step-size controls, and whether the
//! ensemble advances streamlines in parallel

use crate::configuration::config::IntegratorConfig;
use super::error::{Result, WindError};

#[derive(Debug, Clone)]
pub struct Engine {
    pub integrator: IntegratorConfig, // verlet, rk4 or rk45
    pub h0: f64, // fixed step, or first trial step for rk45 (Rg/c)
    pub atol: f64, // absolute error tolerance (rk45)
    pub rtol: f64, // relative error tolerance (rk45)
    pub h_min: f64, // smallest step rk45 may shrink to
    pub h_max: f64, // largest step rk45 may grow to
    pub parallel: bool, // false = one streamline after another
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            integrator: IntegratorConfig::Rk45,
            h0: 0.1,
            atol: 1.0e-9,
            rtol: 1.0e-6,
            h_min: 1.0e-8,
            h_max: 1.0e4,
            parallel: true,
        }
    }
}

impl Engine {
    pub fn fixed(integrator: IntegratorConfig, h0: f64) -> Self {
        Self {
            integrator,
            h0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let steps = [self.h0, self.h_min, self.h_max];
        if steps.iter().any(|h| !h.is_finite() || *h <= 0.0) {
            return Err(WindError::config("step sizes must be positive and finite"));
        }
        if self.h_min > self.h_max {
            return Err(WindError::config(format!(
                "h_min {} exceeds h_max {}",
                self.h_min, self.h_max
            )));
        }
        if !(self.h_min..=self.h_max).contains(&self.h0) {
            return Err(WindError::config(format!(
                "h0 {} lies outside [h_min, h_max] = [{}, {}]",
                self.h0, self.h_min, self.h_max
            )));
        }
        if matches!(self.integrator, IntegratorConfig::Rk45)
            && !(self.atol > 0.0 && self.rtol >= 0.0)
        {
            return Err(WindError::config("rk45 needs atol > 0 and rtol >= 0"));
        }
        Ok(())
    }
}
