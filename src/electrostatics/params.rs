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

use mpole_array_types::{V3, M33, M3};
use mpole_structure::CovalentMaps;

use crate::FailResult;
use crate::errors::{ConfigError, UnsupportedToggleError};
use crate::tiles::TileLayout;

/// How the local frame of a multipole is built from its axis atoms.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AxisType {
    ZThenX,
    Bisector,
    ZBisect,
    ThreeFold,
    ZOnly,
    NoAxisType,
}

impl AxisType {
    /// Which of the (z, x, y) axis atoms must be present.
    pub fn required_atoms(self) -> [bool; 3] {
        match self {
            AxisType::ZThenX => [true, true, false],
            AxisType::Bisector => [true, true, false],
            AxisType::ZBisect => [true, true, true],
            AxisType::ThreeFold => [true, true, true],
            AxisType::ZOnly => [true, false, false],
            AxisType::NoAxisType => [false, false, false],
        }
    }
}

/// A permanent multipole and its polarization parameters, in caller order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipoleParticle {
    pub charge: f64,
    /// Dipole in the local frame.
    pub dipole: V3,
    /// Traceless quadrupole in the local frame.  Only the symmetric part is used.
    pub quadrupole: M33,
    pub axis_type: AxisType,
    pub axis_z: Option<usize>,
    pub axis_x: Option<usize>,
    pub axis_y: Option<usize>,
    pub thole: f64,
    pub damping_factor: f64,
    pub polarizability: f64,
}

impl MultipoleParticle {
    /// A bare point charge.
    pub fn charge(charge: f64) -> Self {
        MultipoleParticle {
            charge,
            dipole: V3::zero(),
            quadrupole: M33::zero(),
            axis_type: AxisType::NoAxisType,
            axis_z: None,
            axis_x: None,
            axis_y: None,
            thole: 0.0,
            damping_factor: 0.0,
            polarizability: 0.0,
        }
    }

    fn axis_atoms(&self) -> [Option<usize>; 3]
    { [self.axis_z, self.axis_x, self.axis_y] }
}

/// Everything that describes the force, independent of positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceParameters {
    pub particles: Vec<MultipoleParticle>,
    pub covalent: CovalentMaps,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Method {
    /// Every pair interacts, with no periodicity.
    NoCutoff,
    /// Pairs beyond the cutoff are skipped, with no periodicity.
    CutoffNonPeriodic,
    /// Minimum image pairs within the cutoff.  No long-range correction.
    CutoffPeriodic,
    /// Ewald real space within the cutoff plus a particle-mesh reciprocal sum.
    Pme,
}

impl Method {
    pub fn is_periodic(self) -> bool {
        match self {
            Method::CutoffPeriodic | Method::Pme => true,
            Method::NoCutoff | Method::CutoffNonPeriodic => false,
        }
    }

    pub fn uses_cutoff(self) -> bool
    { self != Method::NoCutoff }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PolarizationType {
    /// Permanent multipoles only.
    None,
    /// Induced dipoles respond to the permanent field only.
    Direct,
    /// Induced dipoles are solved self-consistently.
    Mutual,
}

/// Scale factors for 1-4 and 1-5 pairs.
///
/// Excluded (1-2, 1-3) pairs always use zero and unrelated pairs always use one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScaleFactors {
    pub m14: f64,
    pub m15: f64,
    pub p14: f64,
    pub p15: f64,
}

impl Default for ScaleFactors {
    fn default() -> Self {
        ScaleFactors { m14: 0.4, m15: 0.8, p14: 1.0, p15: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub method: Method,
    pub cutoff: f64,
    pub ewald_error_tolerance: f64,
    /// Overrides the Ewald splitting parameter chosen from the tolerance.
    pub pme_alpha: Option<f64>,
    /// Overrides the grid dimensions chosen from the tolerance.
    pub pme_grid: Option<[usize; 3]>,
    pub polarization: PolarizationType,
    /// Convergence threshold for the RMS induced dipole residual, in Debye.
    pub mutual_epsilon: f64,
    pub max_iterations: usize,
    pub dielectric: f64,
    pub scale_factors: ScaleFactors,
    pub use_rayon: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            method: Method::NoCutoff,
            cutoff: 1.0,
            ewald_error_tolerance: 1e-4,
            pme_alpha: None,
            pme_grid: None,
            polarization: PolarizationType::Mutual,
            mutual_epsilon: 1e-5,
            max_iterations: 60,
            dielectric: 1.0,
            scale_factors: ScaleFactors::default(),
            use_rayon: true,
        }
    }
}

impl Options {
    pub(crate) fn validate(&self) -> FailResult<()> {
        if self.method.uses_cutoff() && !(self.cutoff > 0.0) {
            throw!(ConfigError::new(format!("cutoff must be positive, got {}", self.cutoff)));
        }
        if self.method == Method::Pme {
            let tol = self.ewald_error_tolerance;
            if !(tol > 0.0 && tol < 0.5) {
                throw!(ConfigError::new(format!("ewald error tolerance must be in (0, 0.5), got {}", tol)));
            }
            if let Some(alpha) = self.pme_alpha {
                if !(alpha > 0.0) {
                    throw!(ConfigError::new(format!("PME alpha must be positive, got {}", alpha)));
                }
            }
            if let Some(grid) = self.pme_grid {
                if grid.iter().any(|&n| n == 0) {
                    throw!(ConfigError::new(format!("PME grid dimensions must be nonzero, got {:?}", grid)));
                }
            }
        }
        if !(self.dielectric > 0.0) {
            throw!(ConfigError::new(format!("dielectric must be positive, got {}", self.dielectric)));
        }
        if self.polarization == PolarizationType::Mutual && self.max_iterations == 0 {
            throw!(ConfigError::new("mutual polarization needs at least one iteration"));
        }
        Ok(())
    }

    pub(crate) fn energy_scale(&self) -> f64
    { crate::consts::ENERGY_SCALE / self.dielectric }
}

//------------------------------------------------------------------------------

/// One row of the padded particle table, in slot order.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct ParticleRecord {
    pub charge: f64,
    pub dipole: V3,
    /// xx, xy, xz, yy, yz.  zz is implied by tracelessness.
    pub quadrupole: [f64; 5],
    pub axis_type: AxisType,
    /// Slots of the z, x, y axis atoms.
    pub axis: [Option<usize>; 3],
    pub thole: f64,
    pub damping_factor: f64,
    pub polarizability: f64,
}

impl ParticleRecord {
    fn padding() -> Self {
        ParticleRecord {
            charge: 0.0,
            dipole: V3::zero(),
            quadrupole: [0.0; 5],
            axis_type: AxisType::NoAxisType,
            axis: [None; 3],
            thole: 0.0,
            damping_factor: 0.0,
            polarizability: 0.0,
        }
    }

    pub fn local_quadrupole(&self) -> M33 {
        let [xx, xy, xz, yy, yz] = self.quadrupole;
        M3([
            V3([xx, xy, xz]),
            V3([xy, yy, yz]),
            V3([xz, yz, -(xx + yy)]),
        ])
    }
}

fn pack_quadrupole(q: &M33) -> [f64; 5] {
    let sym = |a: usize, b: usize| 0.5 * (q[a][b] + q[b][a]);
    [sym(0, 0), sym(0, 1), sym(0, 2), sym(1, 1), sym(1, 2)]
}

/// Particle parameters in slot order, zero-filled up to a whole number of tiles.
#[derive(Debug, Clone)]
pub(crate) struct ParticleTable {
    pub records: Vec<ParticleRecord>,
    pub num_real: usize,
    pub has_quadrupoles: bool,
}

impl ParticleTable {
    pub fn build(params: &ForceParameters, layout: &TileLayout) -> FailResult<Self> {
        let num_real = params.particles.len();
        if num_real != layout.num_particles() {
            throw!(ConfigError::new(format!(
                "tile layout is for {} particles, but there are {} multipoles",
                layout.num_particles(), num_real,
            )));
        }
        if params.covalent.num_particles() != num_real {
            throw!(ConfigError::new(format!(
                "covalent maps describe {} particles, but there are {} multipoles",
                params.covalent.num_particles(), num_real,
            )));
        }
        params.covalent.validate()?;

        let mut records = vec![ParticleRecord::padding(); layout.padded_len()];
        for (atom, particle) in params.particles.iter().enumerate() {
            let required = particle.axis_type.required_atoms();
            let mut axis = [None; 3];
            for (k, (&atom_k, &needed)) in particle.axis_atoms().iter().zip(&required).enumerate() {
                match atom_k {
                    None if needed => throw!(ConfigError::new(format!(
                        "particle {} with axis type {:?} is missing its {} axis atom",
                        atom, particle.axis_type, ["z", "x", "y"][k],
                    ))),
                    Some(other) if other >= num_real || other == atom => throw!(ConfigError::new(format!(
                        "particle {} has an invalid {} axis atom {}",
                        atom, ["z", "x", "y"][k], other,
                    ))),
                    // an unneeded y atom on ZThenX still selects chirality
                    Some(other) => axis[k] = Some(layout.slot_of(other)),
                    None => {},
                }
            }
            for &value in &[particle.thole, particle.damping_factor, particle.polarizability] {
                if !(value >= 0.0) {
                    throw!(ConfigError::new(format!("particle {} has a negative or NaN polarization parameter", atom)));
                }
            }

            records[layout.slot_of(atom)] = ParticleRecord {
                charge: particle.charge,
                dipole: particle.dipole,
                quadrupole: pack_quadrupole(&particle.quadrupole),
                axis_type: particle.axis_type,
                axis,
                thole: particle.thole,
                damping_factor: particle.damping_factor,
                polarizability: particle.polarizability,
            };
        }

        let has_quadrupoles = records.iter().any(|r| r.quadrupole.iter().any(|&x| x != 0.0));
        Ok(ParticleTable { records, num_real, has_quadrupoles })
    }

    /// Rebuild with new values, keeping the specializations made at construction.
    pub fn rebuild(&self, params: &ForceParameters, layout: &TileLayout) -> FailResult<Self> {
        if params.particles.len() != self.num_real {
            throw!(ConfigError::new("The number of multipoles has changed"));
        }
        let mut table = ParticleTable::build(params, layout)?;
        if table.has_quadrupoles && !self.has_quadrupoles {
            throw!(UnsupportedToggleError);
        }
        table.has_quadrupoles = self.has_quadrupoles;
        Ok(table)
    }

    pub fn padded_len(&self) -> usize
    { self.records.len() }
}
