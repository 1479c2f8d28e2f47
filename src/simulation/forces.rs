//! Acceleration contributors for a wind parcel
//!
//! The [`ForceField`] sums a list of [`Acceleration`] terms (gravity,
//! radiation pressure, ...) into one acceleration vector in c^2 / Rg.
//! Evaluation is a pure read of its inputs, so one field is shared by
//! every streamline, across threads.

use log::trace;

use super::constants::MIN_DISTANCE;
use super::error::{Result, WindError};
use super::params::Parameters;
use super::radiation::{local_radiation, ForceMultiplier, RadiationFlux};
use super::states::{LaunchConditions, LocalRadiation, NVec2};

/// Local streamline state handed to the force terms
#[derive(Debug, Clone, Copy)]
pub struct ForceContext<'a> {
    pub launch: &'a LaunchConditions,
    pub x: NVec2, // (R, Z)
    pub v: NVec2, // (v_R, v_Z)
    pub rho: f64,
    pub velocity_gradient: f64, // |dv/dl| along the streamline, c per Rg
}

impl ForceContext<'_> {
    /// Reject positions and densities the field cannot be evaluated at
    pub fn check(&self) -> Result<()> {
        if !(self.x.iter().all(|c| c.is_finite()) && self.v.iter().all(|c| c.is_finite())) {
            return Err(WindError::invalid_state(format!(
                "non-finite kinematics at x = ({}, {}), v = ({}, {})",
                self.x.x, self.x.y, self.v.x, self.v.y
            )));
        }
        if self.x.x <= 0.0 {
            return Err(WindError::invalid_state(format!(
                "cylindrical radius {} is not positive",
                self.x.x
            )));
        }
        let d = self.x.norm();
        if d < MIN_DISTANCE {
            return Err(WindError::invalid_state(format!(
                "distance {d} to the compact object is degenerate"
            )));
        }
        if !self.rho.is_finite() || self.rho < 0.0 {
            return Err(WindError::invalid_state(format!("density {} is unphysical", self.rho)));
        }
        Ok(())
    }
}

/// Net acceleration plus the radiation diagnostics it was computed with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceEvaluation {
    pub a: NVec2,
    pub radiation: LocalRadiation,
}

/// Trait for acceleration sources acting on a single parcel
/// Implementations add their contribution into `out.a`
pub trait Acceleration {
    fn acceleration(
        &self,
        ctx: &ForceContext<'_>,
        params: &Parameters,
        out: &mut ForceEvaluation,
    ) -> Result<()>;
}

/// Collection of acceleration terms
/// Their contributions are summed into a single acceleration vector
pub struct ForceField {
    terms: Vec<Box<dyn Acceleration + Send + Sync>>,
}

impl Default for ForceField {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceField {
    /// Create an empty force field
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Add an acceleration term
    pub fn with<T>(mut self, term: T) -> Self
    where
        T: Acceleration + Send + Sync + 'static,
    {
        self.terms.push(Box::new(term));
        self
    }

    /// Gravity and rotation only
    pub fn gravity_only() -> Self {
        Self::new().with(Gravity)
    }

    /// Gravity plus radiation pressure from `flux` boosted by `multiplier`
    pub fn gravito_radiative<F, M>(flux: F, multiplier: M) -> Self
    where
        F: RadiationFlux + 'static,
        M: ForceMultiplier + 'static,
    {
        Self::new()
            .with(Gravity)
            .with(RadiationPressure::new(flux, multiplier))
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Total acceleration at the state described by `ctx`
    pub fn evaluate(&self, ctx: &ForceContext<'_>, params: &Parameters) -> Result<ForceEvaluation> {
        ctx.check()?;

        let mut out = ForceEvaluation {
            a: NVec2::zeros(),
            radiation: LocalRadiation {
                r: ctx.x.x,
                z: ctx.x.y,
                rho: ctx.rho,
                ..LocalRadiation::default()
            },
        };
        for term in &self.terms {
            term.acceleration(ctx, params, &mut out)?;
        }

        if !(out.a.x.is_finite() && out.a.y.is_finite()) {
            return Err(WindError::numerical(format!(
                "non-finite acceleration ({}, {}) at R = {}, Z = {}",
                out.a.x, out.a.y, ctx.x.x, ctx.x.y
            )));
        }
        Ok(out)
    }
}

/// Point-mass gravity plus the centrifugal term of the conserved
/// angular momentum
#[derive(Debug, Clone, Copy, Default)]
pub struct Gravity;

impl Acceleration for Gravity {
    fn acceleration(
        &self,
        ctx: &ForceContext<'_>,
        _params: &Parameters,
        out: &mut ForceEvaluation,
    ) -> Result<()> {
        let d = ctx.x.norm();
        // a = -x / |x|^3 with G M = 1
        out.a -= ctx.x / (d * d * d);

        let r = ctx.x.x;
        let l = ctx.launch.angular_momentum;
        out.a.x += l * l / (r * r * r);
        Ok(())
    }
}

/// Radiation pressure: multiplier * exp(-tau_uv) * electron-scattering flux
pub struct RadiationPressure {
    flux: Box<dyn RadiationFlux>,
    multiplier: Box<dyn ForceMultiplier>,
}

impl RadiationPressure {
    pub fn new<F, M>(flux: F, multiplier: M) -> Self
    where
        F: RadiationFlux + 'static,
        M: ForceMultiplier + 'static,
    {
        Self {
            flux: Box::new(flux),
            multiplier: Box::new(multiplier),
        }
    }
}

impl Acceleration for RadiationPressure {
    fn acceleration(
        &self,
        ctx: &ForceContext<'_>,
        params: &Parameters,
        out: &mut ForceEvaluation,
    ) -> Result<()> {
        let (r, z) = (ctx.x.x, ctx.x.y);
        let mut local = local_radiation(r, z, ctx.launch.r0, ctx.rho, ctx.velocity_gradient, params);

        let fm = self.multiplier.force_multiplier(&local);
        if !fm.is_finite() {
            return Err(WindError::numerical(format!(
                "force multiplier is {fm} at R = {r}, Z = {z}"
            )));
        }
        local.force_multiplier = fm;
        out.radiation = local;

        // No radiation, no need to evaluate the flux
        if fm == 0.0 {
            return Ok(());
        }

        let attenuation = (-local.tau_uv).exp();
        if attenuation == 0.0 {
            return Ok(());
        }
        let flux = self.flux.flux(r, z, params);
        trace!("radiation at ({r:.3}, {z:.3}): fm = {fm:.3e}, tau_uv = {:.3e}", local.tau_uv);
        out.a += fm * attenuation * flux;
        Ok(())
    }
}
