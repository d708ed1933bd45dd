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


//! Total charge, dipole and quadrupole of the whole system.

use mpole_array_types::{V3, M33, outer};

use crate::FailResult;
use crate::consts::{DIPOLE_TO_DEBYE, QUADRUPOLE_TO_DEBYE_ANGSTROM};
use crate::tensors::Multipole;

/// Moments about the center of mass, as
/// `[charge, dipole (3), quadrupole (9, row major)]`.
///
/// The dipole is in Debye and the traceless quadrupole in Debye Angstroms.
/// Particles with non-positive mass carry no weight.  When no particle has
/// mass, moments are taken about the origin.
pub(crate) fn system_moments(
    positions: &[V3],
    masses: &[f64],
    lab: &[Multipole],
    induced: &[V3],
) -> FailResult<[f64; 13]> {
    if masses.len() != positions.len() {
        bail!("expected {} masses, got {}", positions.len(), masses.len());
    }

    let mut total_mass = 0.0;
    let mut weighted = V3::zero();
    for (&r, &mass) in positions.iter().zip(masses) {
        let mass = if mass > 0.0 { mass } else { 0.0 };
        total_mass += mass;
        weighted += r * mass;
    }
    let center = if total_mass > 0.0 { weighted / total_mass } else { V3::zero() };

    let mut charge = 0.0;
    let mut dipole = V3::zero();
    let mut second = M33::zero();
    let mut atomic = M33::zero();
    for ((&r, m), &mu_ind) in positions.iter().zip(lab).zip(induced) {
        let r = r - center;
        let mu = m.mu + mu_ind;
        charge += m.q;
        dipole += r * m.q + mu;
        second += outer(&r, &r) * m.q + outer(&r, &mu) + outer(&mu, &r);
        atomic += m.quad;
    }

    let traceless = (second - M33::eye() * (second.trace() / 3.0)) * 1.5;
    let quadrupole = (traceless + atomic * 3.0) * QUADRUPOLE_TO_DEBYE_ANGSTROM;
    let dipole = dipole * DIPOLE_TO_DEBYE;

    let mut out = [0.0; 13];
    out[0] = charge;
    out[1..4].copy_from_slice(&dipole.0);
    for row in 0..3 {
        out[4 + 3 * row..7 + 3 * row].copy_from_slice(&quadrupole[row].0);
    }
    Ok(out)
}
