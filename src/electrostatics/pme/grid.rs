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


//! Spreading multipoles onto the charge grid, and gathering potentials back.

use mpole_array_types::{V3, M33};
use mpole_structure::PeriodicBox;
use rustfft::num_complex::Complex;

use crate::consts::PME_ORDER;
use crate::tensors::{Multipole, Potential};
use super::bspline::{self, NUM_DERIVS};

/// Spline weights of one point along each axis.
#[derive(Debug, Clone)]
pub(crate) struct Stencil {
    /// Grid index of `floor(u)`.  The stencil covers `base - j` for `j < PME_ORDER`.
    base: [usize; 3],
    // theta[axis][j][deriv]
    theta: [[[f64; NUM_DERIVS]; PME_ORDER]; 3],
}

impl Stencil {
    pub fn new(pbox: &PeriodicBox, dims: [usize; 3], point: &V3) -> Self {
        let frac = pbox.wrapped_fracs(point);
        let mut base = [0; 3];
        let mut theta = [[[0.0; NUM_DERIVS]; PME_ORDER]; 3];
        for axis in 0..3 {
            let u = frac[axis] * dims[axis] as f64;
            let floor = u.floor();
            base[axis] = floor as usize % dims[axis];
            theta[axis] = bspline::weights(u - floor);
        }
        Stencil { base, theta }
    }

    #[inline]
    fn index(&self, axis: usize, j: usize, dims: &[usize; 3]) -> usize
    { (self.base[axis] + dims[axis] - j) % dims[axis] }

    fn cell(&self, dims: &[usize; 3]) -> usize
    { (self.base[0] * dims[1] + self.base[1]) * dims[2] + self.base[2] }

    #[inline]
    fn weight(&self, n: &[usize; 3], j: [usize; 3]) -> f64 {
        self.theta[0][j[0]][n[0]]
            * self.theta[1][j[1]][n[1]]
            * self.theta[2][j[2]][n[2]]
    }

    /// Visit the stencil's grid points as `(flat index, [jx, jy, jz])`.
    fn for_each_point(&self, dims: &[usize; 3], mut f: impl FnMut(usize, [usize; 3])) {
        for jx in 0..PME_ORDER {
            let ix = self.index(0, jx, dims);
            for jy in 0..PME_ORDER {
                let iy = self.index(1, jy, dims);
                for jz in 0..PME_ORDER {
                    let iz = self.index(2, jz, dims);
                    f((ix * dims[1] + iy) * dims[2] + iz, [jx, jy, jz]);
                }
            }
        }
    }
}

/// Derivative orders `(nx, ny, nz)` with total at most `max_deriv`.
pub(crate) fn multi_indices(max_deriv: usize) -> Vec<[usize; 3]> {
    let mut out = vec![];
    for total in 0..=max_deriv {
        for nx in (0..=total).rev() {
            for ny in (0..=total - nx).rev() {
                out.push([nx, ny, total - nx - ny]);
            }
        }
    }
    out
}

#[inline]
fn key(n: &[usize; 3]) -> usize
{ (n[0] * NUM_DERIVS + n[1]) * NUM_DERIVS + n[2] }

fn key_of(axes: &[usize]) -> usize {
    let mut n = [0; 3];
    for &a in axes {
        n[a] += 1;
    }
    key(&n)
}

const NUM_KEYS: usize = NUM_DERIVS * NUM_DERIVS * NUM_DERIVS;

// Charge, dipole, and quadrupole each become derivatives of the spline weights
// with respect to the source position.
fn spread_terms(m: &Multipole) -> Vec<([usize; 3], f64)> {
    let mut out = vec![];
    if m.q != 0.0 {
        out.push(([0, 0, 0], m.q));
    }
    for b in 0..3 {
        if m.mu[b] != 0.0 {
            let mut n = [0; 3];
            n[b] += 1;
            out.push((n, m.mu[b]));
        }
    }
    for b in 0..3 {
        for c in 0..3 {
            if m.quad[b][c] != 0.0 {
                let mut n = [0; 3];
                n[b] += 1;
                n[c] += 1;
                out.push((n, m.quad[b][c]));
            }
        }
    }
    out
}

/// Add fractional multipoles onto the grid.
///
/// Particles are visited in order of grid cell.
pub(crate) fn spread(
    dims: [usize; 3],
    stencils: &[Stencil],
    fractional: &[Multipole],
    grid: &mut [Complex<f64>],
) {
    let mut order: Vec<usize> = (0..stencils.len()).collect();
    order.sort_by_key(|&i| stencils[i].cell(&dims));

    for i in order {
        let terms = spread_terms(&fractional[i]);
        if terms.is_empty() {
            continue;
        }
        let stencil = &stencils[i];
        stencil.for_each_point(&dims, |index, j| {
            let value: f64 = terms.iter().map(|(n, c)| c * stencil.weight(n, j)).sum();
            grid[index].re += value;
        });
    }
}

/// Interpolate the potential and its cartesian derivatives at a point.
///
/// `frac` is the cartesian-to-fractional matrix and `indices` comes from
/// `multi_indices(max_deriv)`.
pub(crate) fn gather(
    dims: [usize; 3],
    stencil: &Stencil,
    grid: &[f64],
    indices: &[[usize; 3]],
    frac: &M33,
    max_deriv: usize,
) -> Potential {
    let mut acc = [0.0; NUM_KEYS];
    stencil.for_each_point(&dims, |index, j| {
        let value = grid[index];
        if value == 0.0 {
            return;
        }
        for n in indices {
            acc[key(n)] += value * stencil.weight(n, j);
        }
    });

    let mut pot = Potential::zero();
    pot.phi = acc[key(&[0, 0, 0])];
    if max_deriv >= 1 {
        let grad_u = V3::from_fn(|b| acc[key_of(&[b])]);
        pot.grad = grad_u * *frac;
    }
    if max_deriv >= 2 {
        let hess_u = M33::from_fn(|b, c| acc[key_of(&[b, c])]);
        pot.hess = frac.t() * hess_u * *frac;
    }
    if max_deriv >= 3 {
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    let mut sum = 0.0;
                    for d in 0..3 {
                        for e in 0..3 {
                            for f in 0..3 {
                                sum += frac[d][a] * frac[e][b] * frac[f][c] * acc[key_of(&[d, e, f])];
                            }
                        }
                    }
                    pot.third[9 * a + 3 * b + c] = sum;
                }
            }
        }
    }
    pot
}
