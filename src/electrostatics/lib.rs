/* ************************************************************************ **
** This file is part of mpole, and is licensed under EITHER the MIT license **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of mpole is provided under this permissive license,**
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! Polarizable multipole electrostatics.
//!
//! The entry point is [`Context`], which owns every buffer used by one force
//! evaluation: the padded particle table, the lab-frame cache, the exclusion
//! flags, the PME grid, and (for mutual polarization) the DIIS history.
//!
//! Units are nm, e, kJ/mol throughout.  Quadrupoles are traceless, and use the
//! convention where the potential is `q/R + mu.R/R^3 + 3 R.Q.R/R^5`.

#![allow(non_snake_case)]

#[macro_use] extern crate failure;
#[macro_use] extern crate log;
#[cfg(test)] #[macro_use] extern crate mpole_assert_close;

// FIXME copied from failure 1.0 prerelease; remove once actually released
macro_rules! throw {
    ($e:expr) => {{
        return Err(::std::convert::Into::into($e));
    }}
}

// Trace output for the pair kernels.  Set at compile time.
macro_rules! dbg {
    ($($t:tt)*) => {
        if option_env!("MPOLE_DIRECT_TRACE") == Some("1".as_ref()) {
            println!($($t)*);
        }
    };
}

pub type FailResult<T> = Result<T, failure::Error>;

/// Floating point type used by all kernels.
pub type Real = f64;

pub mod consts {
    /// Coulomb constant in kJ nm / (mol e^2).
    pub const ENERGY_SCALE: f64 = 138.9354558456;
    pub const TILE_SIZE: usize = 32;
    pub const PME_ORDER: usize = 5;
    /// Capacity of the DIIS history ring.
    pub const MAX_PREV_DIIS_DIPOLES: usize = 20;
    /// Converts an RMS induced dipole residual from e nm to Debye.
    pub const DEBYE_PER_E_NM_CONVERGENCE: f64 = 48.033324;
    pub const DIPOLE_TO_DEBYE: f64 = 48.0321;
    pub const QUADRUPOLE_TO_DEBYE_ANGSTROM: f64 = 480.321;
}

mod errors;
mod params;
mod tiles;
mod flags;
mod frame;
mod tensors;
mod damping;
mod direct;
mod pme;
mod diis;
mod torque;
mod accumulate;
mod moments;
mod context;

#[cfg(test)]
mod scenarios;

pub use crate::errors::{ConfigError, TopologyChangedError, UnsupportedToggleError};
pub use crate::params::{
    AxisType, MultipoleParticle, ForceParameters,
    Options, Method, PolarizationType, ScaleFactors,
};
pub use crate::tiles::TileLayout;
pub use crate::accumulate::Accumulator;
pub use crate::diis::{DiisHistory, SolveReport};
pub use crate::pme::find_fft_dimension;
pub use crate::context::Context;

pub use mpole_structure::{PeriodicBox, CovalentMaps};
