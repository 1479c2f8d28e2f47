//! Physical constants in cgs units

/// Speed of light (cm/s)
pub const C: f64 = 2.99792458e10;

/// Proton mass (g)
pub const M_P: f64 = 1.67262192e-24;

/// Boltzmann constant (erg/K)
pub const K_B: f64 = 1.380649e-16;

/// Thomson cross-section (cm^2)
pub const SIGMA_T: f64 = 6.6524587e-25;

/// Gravitational radius per solar mass, G M_sun / c^2 (cm)
pub const RG_PER_SOLAR_MASS: f64 = 1.476625e5;

/// Eddington luminosity per solar mass, 4 pi G M_sun m_p c / sigma_T (erg/s)
pub const EDDINGTON_LUMINOSITY_PER_SOLAR_MASS: f64 = 1.25709e38;

/// Innermost stable circular orbit of a non-spinning black hole (Rg)
pub const ISCO_SCHWARZSCHILD: f64 = 6.0;

/// Ionisation parameter above which the gas is fully ionised to X-rays
pub const IONIZATION_PARAMETER_CRITICAL: f64 = 1.0e5;

/// Converts xi (erg cm/s) to the pressure ionisation parameter Xi used by the
/// force-multiplier fit, 4 pi Ryd c
pub const XI_TO_PRESSURE_IONIZATION: f64 = 8.2125;

/// X-ray opacity boost relative to Thomson beyond the ionisation radius
pub const XRAY_OPACITY_BOOST: f64 = 100.0;

/// Distances below this (Rg) are inside the compact object
pub const MIN_DISTANCE: f64 = 1.0;
