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

//! Rotation of local multipoles into the lab frame.

use mpole_array_types::{V3, M33};
use rayon_cond::CondIterator;

use crate::params::{AxisType, ParticleRecord, ParticleTable};
use crate::tensors::Multipole;

/// The local axes of one particle, plus what is needed to differentiate them.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Frame {
    pub x: V3,
    pub y: V3,
    pub z: V3,
    /// Unnormalized z direction.
    pub zraw: V3,
    /// Unnormalized x direction, before orthogonalization against z.
    pub xraw: V3,
    /// `xraw` is a lab axis and does not depend on positions.
    pub xraw_is_fixed: bool,
    /// Whether the local y components change sign.
    pub flip_chirality: bool,
}

impl Frame {
    fn from_raw(zraw: V3, xraw: V3) -> (V3, V3, V3) {
        let z = zraw.unit();
        let x = xraw.perp_unit(&z).unit();
        let y = z.cross(&x);
        (x, y, z)
    }

    /// Columns are the local axes.
    pub fn rotation(&self) -> M33
    { M33::from_cols(&[self.x, self.y, self.z]) }

    /// `xraw` with its component along `z` removed.
    pub fn w(&self) -> V3
    { self.xraw.perp_unit(&self.z) }
}

/// Unit vector from the particle to an axis atom.
#[inline]
fn unit_to(positions: &[V3], slot: usize, other: usize) -> V3
{ (positions[other] - positions[slot]).unit() }

/// Build the local frame of the particle in `slot`.
///
/// Returns `None` when the moments are already given in the lab frame.
pub(crate) fn build_frame(record: &ParticleRecord, slot: usize, positions: &[V3]) -> Option<Frame> {
    let [az, ax, ay] = record.axis;
    let delta = |other: usize| positions[other] - positions[slot];
    let unit = |other: usize| unit_to(positions, slot, other);

    let (zraw, xraw, xraw_is_fixed) = match (record.axis_type, az, ax, ay) {
        (AxisType::NoAxisType, _, _, _) => return None,
        (AxisType::ZThenX, Some(z), Some(x), _) => (delta(z), delta(x), false),
        (AxisType::Bisector, Some(z), Some(x), _) => {
            let (uz, ux) = (unit(z), unit(x));
            (uz + ux, ux, false)
        },
        (AxisType::ZBisect, Some(z), Some(x), Some(y)) => (unit(z), unit(x) + unit(y), false),
        (AxisType::ThreeFold, Some(z), Some(x), Some(y)) => {
            let ux = unit(x);
            (unit(z) + ux + unit(y), ux, false)
        },
        (AxisType::ZOnly, Some(z), _, _) => {
            let zraw = delta(z);
            let zhat = zraw.unit();
            let lab = if zhat[0].abs() > 0.866 { V3::axis_unit(1) } else { V3::axis_unit(0) };
            (zraw, lab, true)
        },
        // the particle table guarantees the required atoms
        _ => return None,
    };

    let (x, y, z) = Frame::from_raw(zraw, xraw);
    let flip_chirality = match (record.axis_type, az, ax, ay) {
        (AxisType::ZThenX, Some(z_atom), Some(x_atom), Some(y_atom)) => {
            let ad = positions[slot] - positions[y_atom];
            let bd = positions[z_atom] - positions[y_atom];
            let cd = positions[x_atom] - positions[y_atom];
            ad.dot(&bd.cross(&cd)) < 0.0
        },
        _ => false,
    };

    Some(Frame { x, y, z, zraw, xraw, xraw_is_fixed, flip_chirality })
}

/// Lab-frame moments of a particle.
pub(crate) fn lab_multipole(record: &ParticleRecord, frame: Option<&Frame>) -> Multipole {
    let mut mu = record.dipole;
    let mut quad = record.local_quadrupole();
    let frame = match frame {
        None => return Multipole { q: record.charge, mu, quad },
        Some(frame) => frame,
    };

    if frame.flip_chirality {
        mu[1] = -mu[1];
        for &(a, b) in &[(0, 1), (1, 0), (1, 2), (2, 1)] {
            quad[a][b] = -quad[a][b];
        }
    }
    let rot = frame.rotation();
    Multipole {
        q: record.charge,
        mu: rot * mu,
        quad: rot * quad * rot.t(),
    }
}

/// Lab frame moments for every slot.  Padding slots get zero moments.
pub(crate) fn lab_multipoles(table: &ParticleTable, positions: &[V3], use_rayon: bool) -> Vec<Multipole> {
    CondIterator::new(0..table.padded_len(), use_rayon).map(|slot| {
        if slot >= table.num_real {
            return Multipole::zero();
        }
        let record = &table.records[slot];
        let frame = build_frame(record, slot, positions);
        lab_multipole(record, frame.as_ref())
    }).collect()
}

/// The cartesian-to-fractional matrix `F[b][a] = K_b recip_b[a]`.
pub(crate) fn fractional_matrix(reciprocal: &[V3; 3], grid: [usize; 3]) -> M33
{ M33::from_fn(|b, a| grid[b] as f64 * reciprocal[b][a]) }

/// Moments expressed in grid units, for spreading onto the PME grid.
pub(crate) fn to_fractional(m: &Multipole, frac: &M33) -> Multipole {
    Multipole {
        q: m.q,
        mu: *frac * m.mu,
        quad: *frac * m.quad * frac.t(),
    }
}
