//! A run of many streamlines launched across the disc
//!
//! The ensemble owns its streamlines (in launch order), the read-only
//! physical parameters and the shared force field. Streamlines share no
//! mutable state, so `run_all` advances them in parallel with rayon; the
//! end of the parallel iterator is the barrier before aggregation.
//!
//! The mass-loss rate is computed on demand from the terminal states.
//! Each streamline stands for the disc annulus between the midpoints to
//! its radial neighbours.

use std::f64::consts::PI;

use log::info;
use rayon::prelude::*;

use super::constants::{C, M_P};
use super::engine::Engine;
use super::error::{Result, WindError};
use super::forces::ForceField;
use super::params::Parameters;
use super::states::{local_escape_velocity, Status};
use super::streamline::Streamline;
use crate::configuration::config::{
    DensityProfileConfig, GridConfig, RadialGridConfig, VelocityProfileConfig,
};

pub struct StreamlineEnsemble {
    params: Parameters,
    field: ForceField,
    engine: Engine,
    streamlines: Vec<Streamline>,
}

/// Number of streamlines in each status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnsembleSummary {
    pub running: usize,
    pub escaped: usize,
    pub fell_back: usize,
    pub stalled: usize,
}

impl EnsembleSummary {
    pub fn total(&self) -> usize {
        self.running + self.escaped + self.fell_back + self.stalled
    }

    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Running => self.running,
            Status::Escaped => self.escaped,
            Status::FellBack => self.fell_back,
            Status::Stalled => self.stalled,
        }
    }
}

impl std::fmt::Display for EnsembleSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} streamlines: {} escaped, {} fell back, {} stalled, {} running",
            self.total(),
            self.escaped,
            self.fell_back,
            self.stalled,
            self.running
        )
    }
}

/// Mass-loss share of one streamline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassLossContribution {
    pub index: usize, // position in launch order
    pub r0: f64,
    pub annulus: (f64, f64), // inner and outer edge (Rg)
    pub status: Status,
    pub rate: f64, // g/s, zero unless escaped
}

// =========================================================================================
// Launch grid evaluation
// =========================================================================================

impl RadialGridConfig {
    /// Launch radii in ascending order
    pub fn radii(&self) -> Result<Vec<f64>> {
        let radii = match self {
            RadialGridConfig::Explicit { radii } => {
                let mut radii = radii.clone();
                if radii.iter().any(|r| !r.is_finite()) {
                    return Err(WindError::config("launch radii must be finite"));
                }
                radii.sort_by(f64::total_cmp);
                if radii.windows(2).any(|w| w[0] == w[1]) {
                    return Err(WindError::config("launch radii must be distinct"));
                }
                radii
            }
            RadialGridConfig::Linear { r_min, r_max, count } => {
                check_range(*r_min, *r_max, *count)?;
                spaced(*count, |f| r_min + f * (r_max - r_min))
            }
            RadialGridConfig::Log { r_min, r_max, count } => {
                check_range(*r_min, *r_max, *count)?;
                let (lo, hi) = (r_min.ln(), r_max.ln());
                spaced(*count, |f| (lo + f * (hi - lo)).exp())
            }
        };
        if radii.is_empty() {
            return Err(WindError::config("launch grid is empty"));
        }
        Ok(radii)
    }
}

fn check_range(r_min: f64, r_max: f64, count: usize) -> Result<()> {
    if count == 0 {
        return Err(WindError::config("launch grid needs at least one radius"));
    }
    if !(r_min.is_finite() && r_max.is_finite() && r_min > 0.0) {
        return Err(WindError::config(format!("invalid launch range [{r_min}, {r_max}]")));
    }
    if count > 1 && r_min >= r_max {
        return Err(WindError::config(format!(
            "launch range needs r_min < r_max, got [{r_min}, {r_max}]"
        )));
    }
    Ok(())
}

/// `count` points at fractions 0..=1 mapped through `at`
fn spaced(count: usize, at: impl Fn(f64) -> f64) -> Vec<f64> {
    if count == 1 {
        return vec![at(0.0)];
    }
    (0..count)
        .map(|i| at(i as f64 / (count - 1) as f64))
        .collect()
}

impl DensityProfileConfig {
    pub fn density_at(&self, r0: f64) -> f64 {
        match *self {
            DensityProfileConfig::Constant { rho } => rho,
            DensityProfileConfig::PowerLaw { rho_ref, r_ref, exponent } => {
                rho_ref * (r0 / r_ref).powf(exponent)
            }
        }
    }
}

impl VelocityProfileConfig {
    pub fn velocity_at(&self, r0: f64, params: &Parameters) -> f64 {
        match *self {
            VelocityProfileConfig::Constant { v_z } => v_z,
            VelocityProfileConfig::Thermal => params.thermal_velocity(),
            VelocityProfileConfig::EscapeFraction { fraction } => {
                fraction * local_escape_velocity(r0, params.launch_height, r0.sqrt())
            }
        }
    }
}

// =========================================================================================
// Ensemble
// =========================================================================================

impl StreamlineEnsemble {
    /// Validate the configuration before any streamline work starts
    pub fn new(params: Parameters, field: ForceField, engine: Engine) -> Result<Self> {
        params.validate()?;
        engine.validate()?;
        Ok(Self {
            params,
            field,
            engine,
            streamlines: Vec::new(),
        })
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn field(&self) -> &ForceField {
        &self.field
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn streamlines(&self) -> &[Streamline] {
        &self.streamlines
    }

    pub fn len(&self) -> usize {
        self.streamlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streamlines.is_empty()
    }

    /// Create and register one streamline without advancing it
    pub fn launch_single(&mut self, r0: f64, rho0: f64, v_z0: f64) -> Result<&Streamline> {
        self.check_on_disc(r0)?;
        let streamline =
            Streamline::initialize(r0, rho0, v_z0, &self.field, &self.params, &self.engine)?;
        self.streamlines.push(streamline);
        Ok(&self.streamlines[self.streamlines.len() - 1])
    }

    /// Register one streamline per grid radius, in ascending radius
    ///
    /// The whole grid is checked before anything is registered.
    pub fn launch_grid(&mut self, grid: &GridConfig) -> Result<&[Streamline]> {
        let radii = grid.radii.radii()?;
        for &r in &radii {
            self.check_on_disc(r)?;
        }

        let launched = radii
            .iter()
            .map(|&r0| {
                let rho0 = grid.density.density_at(r0);
                let v_z0 = grid.velocity.velocity_at(r0, &self.params);
                Streamline::initialize(r0, rho0, v_z0, &self.field, &self.params, &self.engine)
            })
            .collect::<Result<Vec<_>>>()?;

        let first = self.streamlines.len();
        self.streamlines.extend(launched);
        info!(
            "launched {} streamlines between R = {:.1} and R = {:.1}",
            radii.len(),
            radii[0],
            radii[radii.len() - 1]
        );
        Ok(&self.streamlines[first..])
    }

    fn check_on_disc(&self, r0: f64) -> Result<()> {
        if self.params.within_disc(r0) {
            Ok(())
        } else {
            Err(WindError::config(format!(
                "launch radius {r0} lies outside the disc [{}, {}]",
                self.params.disc_inner_radius, self.params.disc_outer_radius
            )))
        }
    }

    /// Drive every running streamline to a terminal status
    pub fn run_all(&mut self, max_steps: usize) -> EnsembleSummary {
        let params = &self.params;
        let field = &self.field;
        let streamlines = &mut self.streamlines;

        let drive = |s: &mut Streamline| {
            s.iterate(field, params, max_steps);
        };
        if self.engine.parallel {
            streamlines.par_iter_mut().for_each(drive);
        } else {
            streamlines.iter_mut().for_each(drive);
        }

        let summary = self.summary();
        info!("run finished: {summary}");
        summary
    }

    pub fn summary(&self) -> EnsembleSummary {
        let mut summary = EnsembleSummary::default();
        for s in &self.streamlines {
            match s.status() {
                Status::Running => summary.running += 1,
                Status::Escaped => summary.escaped += 1,
                Status::FellBack => summary.fell_back += 1,
                Status::Stalled => summary.stalled += 1,
            }
        }
        summary
    }

    /// Indices of the streamlines sorted by launch radius
    fn radius_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.streamlines.len()).collect();
        order.sort_by(|&a, &b| {
            self.streamlines[a]
                .launch()
                .r0
                .total_cmp(&self.streamlines[b].launch().r0)
        });
        order
    }

    /// Disc annulus represented by each streamline, in launch order
    ///
    /// Edges sit halfway to the neighbouring launch radii; the outermost
    /// edges mirror the neighbour spacing and are clamped to the disc. A
    /// lone streamline represents the whole disc. Streamlines sharing a
    /// launch radius split its annulus evenly.
    pub fn annuli(&self) -> Vec<(f64, f64)> {
        let mut annuli = vec![(0.0, 0.0); self.streamlines.len()];
        let order = self.radius_order();
        let (disc_in, disc_out) = (self.params.disc_inner_radius, self.params.disc_outer_radius);

        // group equal radii
        let mut groups: Vec<(f64, Vec<usize>)> = Vec::new();
        for i in order {
            let r = self.streamlines[i].launch().r0;
            match groups.last() {
                Some((gr, _)) if *gr == r => {
                    let last = groups.len() - 1;
                    groups[last].1.push(i);
                }
                _ => groups.push((r, vec![i])),
            }
        }

        let n = groups.len();
        for (k, (r, members)) in groups.iter().enumerate() {
            let r = *r;
            let (lower, upper) = if n == 1 {
                (disc_in.min(r), disc_out.max(r))
            } else {
                let lower = if k == 0 {
                    r - 0.5 * (groups[1].0 - r)
                } else {
                    0.5 * (groups[k - 1].0 + r)
                };
                let upper = if k == n - 1 {
                    r + 0.5 * (r - groups[k - 1].0)
                } else {
                    0.5 * (r + groups[k + 1].0)
                };
                (lower.max(disc_in).min(r).max(0.0), upper.min(disc_out).max(r))
            };

            // split the annulus area evenly between coincident streamlines
            let share = (upper * upper - lower * lower) / members.len() as f64;
            for (j, &i) in members.iter().enumerate() {
                let inner = (lower * lower + j as f64 * share).sqrt();
                let outer = (lower * lower + (j + 1) as f64 * share).sqrt();
                annuli[i] = (inner, outer);
            }
        }
        annuli
    }

    /// Per-streamline mass-loss rates in ascending launch radius
    ///
    /// `None` until every registered streamline has terminated.
    pub fn mass_loss_contributions(&self) -> Option<Vec<MassLossContribution>> {
        if self.streamlines.is_empty() || self.streamlines.iter().any(|s| !s.status().is_terminal()) {
            return None;
        }

        let annuli = self.annuli();
        let rg = self.params.rg_cm();
        let contributions = self
            .radius_order()
            .into_iter()
            .map(|i| {
                let s = &self.streamlines[i];
                let launch = s.launch();
                let (inner, outer) = annuli[i];
                let rate = if s.status() == Status::Escaped {
                    let area = PI * (outer * outer - inner * inner) * rg * rg;
                    area * launch.rho0 * M_P * launch.v_launch * C
                } else {
                    0.0
                };
                MassLossContribution {
                    index: i,
                    r0: launch.r0,
                    annulus: (inner, outer),
                    status: s.status(),
                    rate,
                }
            })
            .collect();
        Some(contributions)
    }

    /// Total mass-loss rate of the escaped streamlines (g/s)
    pub fn mass_loss_rate(&self) -> Option<f64> {
        self.mass_loss_contributions()
            .map(|contributions| contributions.iter().map(|c| c.rate).sum())
    }

    /// Mass-loss rate in units of the Eddington accretion rate
    pub fn mass_loss_rate_eddington(&self) -> Option<f64> {
        self.mass_loss_rate()
            .map(|rate| rate / self.params.eddington_accretion_rate())
    }
}
