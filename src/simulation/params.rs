//! Global physical parameters shared by every streamline in a run
//!
//! `Parameters` holds the black hole and disc properties plus the
//! termination thresholds:
//! - central mass and Eddington ratio (`black_hole_mass`, `eddington_ratio`),
//! - disc extent and shielding atmosphere,
//! - launch height, escape boundary, fallback height and step ceiling
//!
//! Lengths are in gravitational radii, velocities in units of c.
//! Values are read-only for a run; `validate` runs once before any
//! streamline is launched.

use super::constants::{
    C, EDDINGTON_LUMINOSITY_PER_SOLAR_MASS, IONIZATION_PARAMETER_CRITICAL, ISCO_SCHWARZSCHILD,
    K_B, M_P, RG_PER_SOLAR_MASS,
};
use super::error::{Result, WindError};

#[derive(Debug, Clone)]
pub struct Parameters {
    pub black_hole_mass: f64, // solar masses
    pub eddington_ratio: f64, // L_bol / L_edd
    pub xray_fraction: f64, // fraction of L_bol emitted in X-rays
    pub disc_inner_radius: f64, // Rg
    pub disc_outer_radius: f64, // Rg
    pub shielding_radius: f64, // Rg, inner edge of the shielding atmosphere
    pub shielding_density: f64, // cm^-3
    pub temperature: f64, // K
    pub launch_height: f64, // Rg
    pub escape_radius: f64, // Rg
    pub fallback_height: f64, // Rg
    pub max_steps: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            black_hole_mass: 1.0e8,
            eddington_ratio: 0.5,
            xray_fraction: 0.15,
            disc_inner_radius: ISCO_SCHWARZSCHILD,
            disc_outer_radius: 1600.0,
            shielding_radius: 200.0,
            shielding_density: 2.0e8,
            temperature: 2.0e6,
            launch_height: 1.0,
            escape_radius: 5000.0,
            fallback_height: 0.0,
            max_steps: 50_000,
        }
    }
}

fn require(cond: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(WindError::Configuration(msg()))
    }
}

impl Parameters {
    /// Reject any parameter set that cannot give meaningful results
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.black_hole_mass,
            self.eddington_ratio,
            self.xray_fraction,
            self.disc_inner_radius,
            self.disc_outer_radius,
            self.shielding_radius,
            self.shielding_density,
            self.temperature,
            self.launch_height,
            self.escape_radius,
            self.fallback_height,
        ];
        require(finite.iter().all(|v| v.is_finite()), || {
            "all parameters must be finite".to_string()
        })?;
        require(self.black_hole_mass > 0.0, || {
            format!("black hole mass must be positive, got {}", self.black_hole_mass)
        })?;
        require(self.eddington_ratio >= 0.0, || {
            format!("Eddington ratio must be non-negative, got {}", self.eddington_ratio)
        })?;
        require((0.0..1.0).contains(&self.xray_fraction), || {
            format!("X-ray fraction must lie in [0, 1), got {}", self.xray_fraction)
        })?;
        require(self.disc_inner_radius > 0.0, || {
            format!("inner disc radius must be positive, got {}", self.disc_inner_radius)
        })?;
        require(self.disc_inner_radius < self.disc_outer_radius, || {
            format!(
                "inner disc radius {} must be below outer disc radius {}",
                self.disc_inner_radius, self.disc_outer_radius
            )
        })?;
        require(
            (self.disc_inner_radius..=self.disc_outer_radius).contains(&self.shielding_radius),
            || format!("shielding radius {} lies outside the disc", self.shielding_radius),
        )?;
        require(self.shielding_density > 0.0, || {
            format!("shielding density must be positive, got {}", self.shielding_density)
        })?;
        require(self.temperature > 0.0, || {
            format!("temperature must be positive, got {}", self.temperature)
        })?;
        require(self.fallback_height >= 0.0, || {
            format!("fallback height must be non-negative, got {}", self.fallback_height)
        })?;
        require(self.launch_height > self.fallback_height, || {
            format!(
                "launch height {} must be above the fallback height {}",
                self.launch_height, self.fallback_height
            )
        })?;
        require(self.escape_radius > self.disc_outer_radius, || {
            format!(
                "escape radius {} must exceed the outer disc radius {}",
                self.escape_radius, self.disc_outer_radius
            )
        })?;
        require(self.max_steps > 0, || "max_steps must be positive".to_string())
    }

    /// Gravitational radius in cm
    pub fn rg_cm(&self) -> f64 {
        RG_PER_SOLAR_MASS * self.black_hole_mass
    }

    /// Eddington luminosity in erg/s
    pub fn eddington_luminosity(&self) -> f64 {
        EDDINGTON_LUMINOSITY_PER_SOLAR_MASS * self.black_hole_mass
    }

    pub fn bolometric_luminosity(&self) -> f64 {
        self.eddington_ratio * self.eddington_luminosity()
    }

    pub fn xray_luminosity(&self) -> f64 {
        self.xray_fraction * self.bolometric_luminosity()
    }

    /// Accretion efficiency for a Schwarzschild ISCO
    pub fn efficiency(&self) -> f64 {
        1.0 - (1.0 - 2.0 / (3.0 * ISCO_SCHWARZSCHILD)).sqrt()
    }

    /// Eddington mass accretion rate in g/s
    pub fn eddington_accretion_rate(&self) -> f64 {
        self.eddington_luminosity() / (self.efficiency() * C * C)
    }

    /// Isothermal sound speed of the wind gas in units of c
    pub fn thermal_velocity(&self) -> f64 {
        (K_B * self.temperature / M_P).sqrt() / C
    }

    /// Prefactor of the disc radiation-force integral (UV part only)
    pub fn disc_force_constant(&self) -> f64 {
        3.0 * self.eddington_ratio / (8.0 * std::f64::consts::PI * self.efficiency())
            * (1.0 - self.xray_fraction)
    }

    /// Disc radius where the unattenuated ionisation parameter at the disc
    /// surface drops to the critical value, clamped to the disc extent
    pub fn ionization_radius(&self) -> f64 {
        let rg = self.rg_cm();
        let denom = self.shielding_density * rg * rg * IONIZATION_PARAMETER_CRITICAL;
        let r_x = (self.xray_luminosity() / denom).sqrt();
        r_x.clamp(self.disc_inner_radius, self.disc_outer_radius)
    }

    /// Whether `r` lies on the disc
    pub fn within_disc(&self, r: f64) -> bool {
        (self.disc_inner_radius..=self.disc_outer_radius).contains(&r)
    }
}
