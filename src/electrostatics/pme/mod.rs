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


//! Smooth particle mesh Ewald for point multipoles.
//!
//! Sources are spread onto a grid of B-spline weights in fractional
//! coordinates, convolved with the reciprocal space Ewald kernel, and the
//! resulting potential is interpolated back with the same splines.

use std::cell::RefCell;
use std::f64::consts::PI;

use mpole_array_types::V3;
use mpole_structure::PeriodicBox;
use rayon_cond::CondIterator;
use rustfft::num_complex::Complex;

use crate::FailResult;
use crate::consts::PME_ORDER;
use crate::errors::ConfigError;
use crate::frame::{fractional_matrix, to_fractional};
use crate::params::Options;
use crate::tensors::{Multipole, Potential};

mod bspline;
mod fft;
mod grid;

use self::fft::Fft3;
use self::grid::Stencil;

/// Smallest integer `>= minimum` whose only prime factors are 2, 3, 5 and 7.
///
/// Zero is treated as one.
pub fn find_fft_dimension(minimum: usize) -> usize {
    let mut n = usize::max(minimum, 1);
    loop {
        let mut unfactored = n;
        for factor in 2..8 {
            while unfactored > 1 && unfactored % factor == 0 {
                unfactored /= factor;
            }
        }
        if unfactored == 1 {
            return n;
        }
        n += 1;
    }
}

/// Ewald splitting parameter and grid size for the given options.
fn choose_parameters(options: &Options, pbox: &PeriodicBox) -> (f64, [usize; 3]) {
    let tol = options.ewald_error_tolerance;
    let alpha = match options.pme_alpha {
        Some(alpha) => alpha,
        None => (-(2.0 * tol).ln()).sqrt() / options.cutoff,
    };
    let dims = match options.pme_grid {
        Some(dims) => dims,
        None => {
            let vectors = pbox.vectors();
            let mut dims = [0; 3];
            for axis in 0..3 {
                let size = (2.0 * alpha * vectors[axis][axis] / (3.0 * tol.powf(0.2))).ceil();
                dims[axis] = find_fft_dimension(usize::max(size as usize, PME_ORDER));
            }
            dims
        },
    };
    (alpha, dims)
}

#[derive(Debug)]
pub(crate) struct Pme {
    alpha: f64,
    dims: [usize; 3],
    moduli: [Vec<f64>; 3],
    fft: Fft3,
    // allocated once, cleared on every use
    scratch: RefCell<Scratch>,
}

#[derive(Debug)]
struct Scratch {
    grid: Vec<Complex<f64>>,
    real: Vec<f64>,
}

impl Pme {
    pub fn new(options: &Options, pbox: &PeriodicBox) -> FailResult<Self> {
        check_cutoff(options.cutoff, pbox)?;
        let (alpha, dims) = choose_parameters(options, pbox);
        if dims.iter().any(|&n| n < PME_ORDER) {
            throw!(ConfigError::new(format!(
                "PME grid {:?} is smaller than the interpolation order {}", dims, PME_ORDER,
            )));
        }
        info!("PME: alpha = {:.6} nm^-1, grid = {}x{}x{}", alpha, dims[0], dims[1], dims[2]);

        let fft = Fft3::new(dims);
        let scratch = RefCell::new(Scratch {
            grid: vec![Complex::new(0.0, 0.0); fft.len()],
            real: vec![0.0; fft.len()],
        });
        Ok(Pme {
            alpha,
            dims,
            moduli: [bspline::moduli(dims[0]), bspline::moduli(dims[1]), bspline::moduli(dims[2])],
            fft,
            scratch,
        })
    }

    pub fn alpha(&self) -> f64
    { self.alpha }

    pub fn dims(&self) -> [usize; 3]
    { self.dims }

    /// Field of a particle's own dipole, per unit dipole.
    pub fn self_field_factor(&self) -> f64
    { 4.0 * self.alpha.powi(3) / (3.0 * PI.sqrt()) }

    /// Removes each multipole's interaction with its own screening charge.
    pub fn self_energy(&self, lab: &[Multipole]) -> f64 {
        let a2 = self.alpha * self.alpha;
        let sum: f64 = lab.iter().map(|m| {
            m.q * m.q
                + 2.0 * a2 / 3.0 * m.mu.sqnorm()
                + 8.0 * a2 * a2 / 5.0 * m.quad.ddot(&m.quad)
        }).sum();
        -self.alpha / PI.sqrt() * sum
    }

    /// Reciprocal space potential of `sources` at each of `points`.
    ///
    /// `sources` pairs with `source_positions`.  Derivatives are computed up to
    /// `max_deriv <= 3`.
    pub fn potentials(
        &self,
        pbox: &PeriodicBox,
        source_positions: &[V3],
        sources: &[Multipole],
        points: &[V3],
        max_deriv: usize,
        use_rayon: bool,
    ) -> Vec<Potential> {
        assert!(max_deriv <= 3);
        assert_eq!(source_positions.len(), sources.len());
        let dims = self.dims;
        let frac = fractional_matrix(pbox.reciprocal(), dims);

        let stencils: Vec<Stencil> = {
            CondIterator::new(source_positions, use_rayon)
                .map(|p| Stencil::new(pbox, dims, p))
                .collect()
        };
        let fractional: Vec<Multipole> = sources.iter().map(|m| to_fractional(m, &frac)).collect();

        let mut scratch = self.scratch.borrow_mut();
        let Scratch { grid: data, real } = &mut *scratch;
        for c in data.iter_mut() {
            *c = Complex::new(0.0, 0.0);
        }
        grid::spread(dims, &stencils, &fractional, data);
        self.convolve(pbox, data);
        for (r, c) in real.iter_mut().zip(data.iter()) {
            *r = c.re;
        }

        let real = &real[..];
        let indices = grid::multi_indices(max_deriv);
        CondIterator::new(points, use_rayon).map(|p| {
            let stencil = Stencil::new(pbox, dims, p);
            grid::gather(dims, &stencil, real, &indices, &frac, max_deriv)
        }).collect()
    }

    fn convolve(&self, pbox: &PeriodicBox, data: &mut [Complex<f64>]) {
        self.fft.forward(data);

        let [nx, ny, nz] = self.dims;
        let recip = pbox.reciprocal();
        let volume = pbox.volume();
        let exp_factor = PI * PI / (self.alpha * self.alpha);
        let signed = |k: usize, n: usize| match k < (n + 1) / 2 {
            true => k as f64,
            false => k as f64 - n as f64,
        };

        for kx in 0..nx {
            let mx = signed(kx, nx);
            for ky in 0..ny {
                let my = signed(ky, ny);
                for kz in 0..nz {
                    let mz = signed(kz, nz);
                    let index = (kx * ny + ky) * nz + kz;
                    if kx == 0 && ky == 0 && kz == 0 {
                        data[index] = Complex::new(0.0, 0.0);
                        continue;
                    }
                    let m = recip[0] * mx + recip[1] * my + recip[2] * mz;
                    let m2 = m.sqnorm();
                    let denom = PI * volume * m2 * self.moduli[0][kx] * self.moduli[1][ky] * self.moduli[2][kz];
                    data[index] *= (-exp_factor * m2).exp() / denom;
                }
            }
        }

        self.fft.inverse(data);
    }
}

/// The minimum image convention must hold for the real space sum.
pub(crate) fn check_cutoff(cutoff: f64, pbox: &PeriodicBox) -> FailResult<()> {
    if cutoff > pbox.max_cutoff() {
        throw!(ConfigError::new(format!(
            "The cutoff distance ({}) cannot be greater than half the periodic box size ({})",
            cutoff, pbox.max_cutoff(),
        )));
    }
    Ok(())
}
