//! Radiation field seen by a wind parcel
//!
//! Two plug-in seams feed the radiation-pressure term:
//! - [`RadiationFlux`]: electron-scattering radiation acceleration at (R, Z)
//!   from the luminous source (central point source or thin disc integral)
//! - [`ForceMultiplier`]: boost of that acceleration relative to electron
//!   scattering, from any external table or model
//!
//! The free functions compute the local optical depths and ionisation
//! state the multiplier is evaluated at.

use std::f64::consts::PI;

use super::constants::{SIGMA_T, XI_TO_PRESSURE_IONIZATION, XRAY_OPACITY_BOOST};
use super::params::Parameters;
use super::states::{LocalRadiation, NVec2};

// =========================================================================================
// Optical depths and ionisation
// =========================================================================================

/// Thomson optical depth across one gravitational radius at density `rho`
pub fn characteristic_optical_depth(rho: f64, params: &Parameters) -> f64 {
    SIGMA_T * rho * params.rg_cm()
}

/// UV optical depth between the disc centre and (r, z)
///
/// Shielding gas fills the disc atmosphere from `shielding_radius` out to
/// the launch radius `r0`; beyond it the streamline's own gas attenuates.
pub fn uv_optical_depth(r: f64, z: f64, r0: f64, tau_dr: f64, params: &Parameters) -> f64 {
    let tau_dr_0 = characteristic_optical_depth(params.shielding_density, params);
    let tau_uv_0 = (r0 - params.shielding_radius).max(0.0);
    let sec_theta = (r * r + z * z).sqrt() / r;
    let tau = sec_theta * (tau_dr_0 * tau_uv_0 + (r - r0) * tau_dr);
    tau.max(0.0)
}

/// X-ray opacity relative to Thomson at disc radius `r`
pub fn xray_opacity(r: f64, r_x: f64) -> f64 {
    if r < r_x {
        1.0
    } else {
        XRAY_OPACITY_BOOST
    }
}

/// X-ray optical depth between the centre and (r, z)
pub fn xray_optical_depth(r: f64, z: f64, r0: f64, tau_dr: f64, params: &Parameters) -> f64 {
    let r_x = params.ionization_radius();
    let tau_dr_0 = characteristic_optical_depth(params.shielding_density, params);
    let mut tau_x_0 = (r_x - params.shielding_radius).max(0.0);
    if r_x < r0 {
        tau_x_0 += XRAY_OPACITY_BOOST * (r0 - r_x);
    }
    let sec_theta = (r * r + z * z).sqrt() / r;
    let tau = sec_theta * (tau_dr_0 * tau_x_0 + tau_dr * xray_opacity(r, r_x) * (r - r0));
    tau.max(0.0)
}

/// Ionisation parameter xi = L_x exp(-tau_x) / (n d^2)
pub fn ionization_parameter(r: f64, z: f64, tau_x: f64, rho: f64, params: &Parameters) -> f64 {
    let rg = params.rg_cm();
    let d2 = (r * r + z * z) * rg * rg;
    params.xray_luminosity() * (-tau_x).exp() / (rho * d2)
}

/// Sobolev optical depth for velocity gradient `dv_dl` (c per Rg)
///
/// A vanishing gradient gives an unbounded Sobolev length; that case is
/// pinned to unit optical depth.
pub fn sobolev_optical_depth(tau_dr: f64, dv_dl: f64, v_thermal: f64) -> f64 {
    let tau = tau_dr * v_thermal / dv_dl.abs();
    if tau.is_finite() {
        tau
    } else {
        1.0
    }
}

/// Everything except the force multiplier at a point of a streamline
pub fn local_radiation(
    r: f64,
    z: f64,
    r0: f64,
    rho: f64,
    dv_dl: f64,
    params: &Parameters,
) -> LocalRadiation {
    let tau_dr = characteristic_optical_depth(rho, params);
    let tau_uv = uv_optical_depth(r, z, r0, tau_dr, params);
    let tau_x = xray_optical_depth(r, z, r0, tau_dr, params);
    LocalRadiation {
        r,
        z,
        rho,
        tau_dr,
        tau_uv,
        tau_x,
        tau_eff: sobolev_optical_depth(tau_dr, dv_dl, params.thermal_velocity()),
        xi: ionization_parameter(r, z, tau_x, rho, params),
        force_multiplier: 0.0,
    }
}

// =========================================================================================
// Force multipliers
// =========================================================================================

/// Radiation-force boost relative to electron scattering
///
/// The returned value multiplies the electron-scattering acceleration
/// directly, so 0 switches radiation pressure off and 1 is pure Thomson
/// scattering. Closures work as multipliers too.
pub trait ForceMultiplier: Send + Sync {
    fn force_multiplier(&self, local: &LocalRadiation) -> f64;
}

impl<F> ForceMultiplier for F
where
    F: Fn(&LocalRadiation) -> f64 + Send + Sync,
{
    fn force_multiplier(&self, local: &LocalRadiation) -> f64 {
        self(local)
    }
}

/// Fixed multiplier, independent of the local state
#[derive(Debug, Clone, Copy)]
pub struct ConstantForceMultiplier(pub f64);

impl ForceMultiplier for ConstantForceMultiplier {
    fn force_multiplier(&self, _local: &LocalRadiation) -> f64 {
        self.0
    }
}

/// Line-driving force multiplier fit of Stevens & Kallman (1990)
#[derive(Debug, Clone, Copy)]
pub struct StevensKallman {
    /// Add the electron-scattering baseline (1) to the line contribution
    pub include_electron_scattering: bool,
}

impl Default for StevensKallman {
    fn default() -> Self {
        Self {
            include_electron_scattering: true,
        }
    }
}

impl StevensKallman {
    const ALPHA: f64 = 0.6;

    fn k(xi: f64) -> f64 {
        0.03 + 0.385 * (-1.4 * xi.powf(0.6)).exp()
    }

    fn eta_max(xi: f64) -> f64 {
        let exponent = if xi.log10() < 0.5 {
            6.9 * (0.16 * xi.powf(0.4)).exp()
        } else {
            9.1 * (-7.96e-3 * xi).exp()
        };
        10f64.powf(exponent)
    }

    /// Line force multiplier for Sobolev depth `t` and ionisation parameter `xi`
    pub fn line_multiplier(t: f64, xi: f64) -> f64 {
        let xi = (xi / XI_TO_PRESSURE_IONIZATION).max(0.0);
        let k = Self::k(xi);
        let eta_max = Self::eta_max(xi);
        let alpha = Self::ALPHA;
        if t <= 0.0 {
            // optically thin limit of the expression below
            return k * (1.0 - alpha) * eta_max.powf(alpha);
        }
        let tau_max = t * eta_max;
        let aux = if tau_max < 1e-3 {
            (1.0 - alpha) * tau_max.powf(alpha)
        } else {
            ((1.0 + tau_max).powf(1.0 - alpha) - 1.0) / tau_max.powf(1.0 - alpha)
        };
        k * t.powf(-alpha) * aux
    }
}

impl ForceMultiplier for StevensKallman {
    fn force_multiplier(&self, local: &LocalRadiation) -> f64 {
        let baseline = if self.include_electron_scattering { 1.0 } else { 0.0 };
        baseline + Self::line_multiplier(local.tau_eff, local.xi)
    }
}

// =========================================================================================
// Radiation flux
// =========================================================================================

/// Electron-scattering radiation acceleration (c^2 / Rg) at (r, z)
pub trait RadiationFlux: Send + Sync {
    fn flux(&self, r: f64, z: f64, params: &Parameters) -> NVec2;
}

/// Isotropic central source radiating the UV luminosity
#[derive(Debug, Clone, Copy, Default)]
pub struct PointSourceFlux;

impl RadiationFlux for PointSourceFlux {
    fn flux(&self, r: f64, z: f64, params: &Parameters) -> NVec2 {
        let x = NVec2::new(r, z);
        let d = x.norm();
        let gamma = params.eddington_ratio * (1.0 - params.xray_fraction);
        gamma * x / (d * d * d)
    }
}

/// Thin Schwarzschild disc, integrated over its face
///
/// The kernel peaks sharply under the parcel when z is small, so the
/// Gauss-Legendre panels are spaced geometrically away from (r_d = r,
/// phi = 0) with the smallest panel of order z.
#[derive(Debug, Clone, Copy)]
pub struct DiscFlux {
    pub radial_panels: usize, // per side of the parcel's footprint
    pub angular_panels: usize,
}

impl Default for DiscFlux {
    fn default() -> Self {
        Self {
            radial_panels: 12,
            angular_panels: 12,
        }
    }
}

// 5-point Gauss-Legendre on [-1, 1]
const GL_NODES: [f64; 5] = [
    -0.906_179_845_938_664,
    -0.538_469_310_105_683,
    0.0,
    0.538_469_310_105_683,
    0.906_179_845_938_664,
];
const GL_WEIGHTS: [f64; 5] = [
    0.236_926_885_056_189,
    0.478_628_670_499_366,
    0.568_888_888_888_889,
    0.478_628_670_499_366,
    0.236_926_885_056_189,
];

/// `n + 1` panel edges from `start` to `end`, widths growing geometrically
/// from roughly `h` at `start`
fn clustered_edges(start: f64, end: f64, h: f64, n: usize) -> Vec<f64> {
    let span = (end - start).abs();
    let sign = (end - start).signum();
    let n = n.max(1);
    let q = (1.0 + span / h).powf(1.0 / n as f64);
    let mut edges: Vec<f64> = (0..=n)
        .map(|k| start + sign * h * (q.powi(k as i32) - 1.0))
        .collect();
    edges[n] = end;
    edges
}

/// Quadrature nodes and weights over consecutive panels
fn panel_rule(edges: &[f64]) -> Vec<(f64, f64)> {
    edges
        .windows(2)
        .flat_map(|w| {
            let (a, b) = (w[0].min(w[1]), w[0].max(w[1]));
            let half = 0.5 * (b - a);
            let mid = 0.5 * (a + b);
            GL_NODES
                .iter()
                .zip(GL_WEIGHTS.iter())
                .map(move |(x, w)| (mid + half * x, half * w))
        })
        .collect()
}

impl DiscFlux {
    fn radial_rule(&self, r: f64, z: f64, r_in: f64, r_out: f64) -> Vec<(f64, f64)> {
        let h = z.max(1e-3);
        let mut rule = Vec::new();
        if r > r_in && r < r_out {
            rule.extend(panel_rule(&clustered_edges(r, r_in, h, self.radial_panels)));
            rule.extend(panel_rule(&clustered_edges(r, r_out, h, self.radial_panels)));
        } else if r <= r_in {
            rule.extend(panel_rule(&clustered_edges(r_in, r_out, h, 2 * self.radial_panels)));
        } else {
            rule.extend(panel_rule(&clustered_edges(r_out, r_in, h, 2 * self.radial_panels)));
        }
        rule
    }

    /// Raw (r, z) integrals of the disc kernel
    pub fn integrals(&self, r: f64, z: f64, r_in: f64, r_out: f64) -> (f64, f64) {
        let radial = self.radial_rule(r, z, r_in, r_out);
        let h_phi = (z / r).clamp(1e-6, PI);
        let angular = panel_rule(&clustered_edges(0.0, PI, h_phi, self.angular_panels));

        let mut int_r = 0.0;
        let mut int_z = 0.0;
        for &(r_d, w_r) in &radial {
            let ff0 = (1.0 - (6.0 / r_d).sqrt()).max(0.0) / (r_d * r_d);
            if ff0 == 0.0 {
                continue;
            }
            for &(phi, w_phi) in &angular {
                let cos_phi = phi.cos();
                let delta = r * r + r_d * r_d + z * z - 2.0 * r * r_d * cos_phi;
                let inv_delta2 = 1.0 / (delta * delta);
                let w = w_r * w_phi * ff0 * inv_delta2;
                int_r += w * (r - r_d * cos_phi);
                int_z += w;
            }
        }
        (2.0 * z * int_r, 2.0 * z * z * int_z)
    }
}

impl RadiationFlux for DiscFlux {
    fn flux(&self, r: f64, z: f64, params: &Parameters) -> NVec2 {
        let (int_r, int_z) =
            self.integrals(r, z, params.disc_inner_radius, params.disc_outer_radius);
        params.disc_force_constant() * NVec2::new(int_r, int_z)
    }
}
