//! Core state types for a wind streamline
//!
//! - `LaunchConditions` identifies a streamline (R0, rho0, vZ0, ...)
//! - `PhysicalState` is one accepted snapshot: position (R, Z),
//!   velocity (v_R, v_Z), density and the radiation diagnostics
//! - `Status` / `StallReason` track termination
//!
//! Positions are in Rg, velocities in c, time in Rg/c.

use nalgebra::{Vector2, Vector4};
use serde::Serialize;

use super::error::WindError;

pub type NVec2 = Vector2<f64>;
pub type NVec4 = Vector4<f64>;

/// Immutable identity of a streamline, fixed at launch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchConditions {
    pub r0: f64, // launch radius
    pub z0: f64, // launch height
    pub rho0: f64, // launch number density (cm^-3)
    pub v_z0: f64, // launch vertical velocity
    pub v_launch: f64, // launch speed floored at the thermal speed
    pub angular_momentum: f64, // specific angular momentum, conserved
}

impl LaunchConditions {
    /// Keplerian launch from (r0, z0) with vertical velocity `v_z0`
    pub fn keplerian(r0: f64, z0: f64, rho0: f64, v_z0: f64, v_thermal: f64) -> Self {
        Self {
            r0,
            z0,
            rho0,
            v_z0,
            v_launch: v_z0.max(v_thermal),
            angular_momentum: r0.sqrt(),
        }
    }

    pub fn launch_distance(&self) -> f64 {
        (self.r0 * self.r0 + self.z0 * self.z0).sqrt()
    }

    /// Azimuthal velocity at cylindrical radius `r`
    pub fn v_phi(&self, r: f64) -> f64 {
        self.angular_momentum / r
    }
}

/// Radiation-coupling quantities at one point of a streamline
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocalRadiation {
    pub r: f64,
    pub z: f64,
    pub rho: f64,
    pub tau_dr: f64, // characteristic optical depth over 1 Rg
    pub tau_uv: f64, // UV optical depth to the disc
    pub tau_x: f64, // X-ray optical depth to the centre
    pub tau_eff: f64, // Sobolev optical depth
    pub xi: f64, // ionisation parameter
    pub force_multiplier: f64,
}

/// One accepted integration step
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalState {
    pub t: f64, // time
    pub x: NVec2, // (R, Z)
    pub v: NVec2, // (v_R, v_Z)
    pub a: NVec2, // net acceleration at this point
    pub rho: f64, // number density
    pub path_length: f64, // distance travelled since launch
    pub radiation: LocalRadiation,
}

impl PhysicalState {
    pub fn r(&self) -> f64 {
        self.x.x
    }

    pub fn z(&self) -> f64 {
        self.x.y
    }

    pub fn distance(&self) -> f64 {
        self.x.norm()
    }

    /// Poloidal speed
    pub fn speed(&self) -> f64 {
        self.v.norm()
    }

    /// ODE vector (R, Z, v_R, v_Z)
    pub fn to_ode(&self) -> NVec4 {
        NVec4::new(self.x.x, self.x.y, self.v.x, self.v.y)
    }

    /// Specific energy including the rotational kinetic term
    pub fn specific_energy(&self, launch: &LaunchConditions) -> f64 {
        let v_phi = launch.v_phi(self.r());
        0.5 * (self.v.norm_squared() + v_phi * v_phi) - 1.0 / self.distance()
    }

    /// Poloidal speed needed for zero specific energy at this point
    pub fn escape_velocity(&self, launch: &LaunchConditions) -> f64 {
        local_escape_velocity(self.r(), self.z(), launch.angular_momentum)
    }
}

/// Poloidal escape speed at (r, z) for a parcel with angular momentum `l`
pub fn local_escape_velocity(r: f64, z: f64, l: f64) -> f64 {
    let d = (r * r + z * z).sqrt();
    let v_phi = l / r;
    (2.0 / d - v_phi * v_phi).max(0.0).sqrt()
}

/// Why a streamline stopped without a physical outcome
#[derive(Debug, Clone, PartialEq)]
pub enum StallReason {
    Failure(WindError),
    StepLimit { steps: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    Escaped,
    FellBack,
    Stalled,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Running)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Running => "running",
            Status::Escaped => "escaped",
            Status::FellBack => "fell back",
            Status::Stalled => "stalled",
        };
        f.pad(name)
    }
}
