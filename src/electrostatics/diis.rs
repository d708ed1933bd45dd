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

//! Self-consistent induced dipoles, accelerated by DIIS extrapolation.

use mpole_array_types::V3;
use nalgebra::DMatrix;

use crate::FailResult;
use crate::consts::DEBYE_PER_E_NM_CONVERGENCE;

/// Outcome of the most recent induced dipole solve.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SolveReport {
    /// Number of induced field evaluations.
    pub iterations: usize,
    /// RMS residual of the last recorded iteration, in Debye.
    pub residual: f64,
    /// Hitting the iteration cap is not an error, so check this.
    pub converged: bool,
}

/// Ring buffer of previous implied dipoles and their residuals.
///
/// Each implied entry holds both dipole sets ("d" then "p") back to back.
/// Only the d residuals are kept, and they alone determine the coefficients.
#[derive(Debug, Clone)]
pub struct DiisHistory {
    capacity: usize,
    implied: Vec<Vec<V3>>,
    errors: Vec<Vec<V3>>,
    // capacity x capacity, row major
    matrix: Vec<f64>,
    // scratch for the solved coefficients
    coefficients: Vec<f64>,
    // scratch for the per-set residual sums read after each record
    residual_sums: [f64; 2],
}

impl DiisHistory {
    /// `len` is the number of dipoles in each of the two sets.
    pub fn new(len: usize, capacity: usize) -> Self {
        assert!(capacity > 0);
        DiisHistory {
            capacity,
            implied: vec![vec![V3::zero(); 2 * len]; capacity],
            errors: vec![vec![V3::zero(); len]; capacity],
            matrix: vec![0.0; capacity * capacity],
            coefficients: vec![0.0; capacity],
            residual_sums: [0.0; 2],
        }
    }

    pub fn capacity(&self) -> usize
    { self.capacity }

    /// Number of history slots in use after recording `iteration`.
    pub fn num_prev(&self, iteration: usize) -> usize
    { usize::min(iteration + 1, self.capacity) }

    /// Store the implied dipoles of one iteration and their residuals against `current`.
    ///
    /// Returns the summed squared residual of the d set and of the p set.
    pub fn record(&mut self, iteration: usize, implied: &[V3], current: &[V3]) -> [f64; 2] {
        let slot = iteration % self.capacity;
        let half = implied.len() / 2;
        assert_eq!(implied.len(), self.implied[slot].len());
        assert_eq!(current.len(), implied.len());

        self.residual_sums = [0.0; 2];
        for (k, (&g, &mu)) in implied.iter().zip(current).enumerate() {
            let e = g - mu;
            self.implied[slot][k] = g;
            if k < half {
                self.errors[slot][k] = e;
                self.residual_sums[0] += e.sqnorm();
            } else {
                self.residual_sums[1] += e.sqnorm();
            }
        }

        let cap = self.capacity;
        for other in 0..self.num_prev(iteration) {
            let dot: f64 = {
                self.errors[slot].iter().zip(&self.errors[other])
                    .map(|(a, b)| a.dot(b))
                    .sum()
            };
            self.matrix[slot * cap + other] = dot;
            self.matrix[other * cap + slot] = dot;
        }
        self.residual_sums
    }

    /// Solve for the extrapolation coefficients over the slots in use.
    pub fn solve_coefficients(&mut self, iteration: usize) -> FailResult<&[f64]> {
        let num_prev = self.num_prev(iteration);
        if iteration == 0 {
            self.coefficients[0] = 1.0;
            return Ok(&self.coefficients[..1]);
        }

        // [ 0  -1^T ] [lambda]   [-1]
        // [-1   B   ] [  c   ] = [ 0]
        let cap = self.capacity;
        let rank = num_prev + 1;
        let bordered = DMatrix::from_fn(rank, rank, |i, j| match (i, j) {
            (0, 0) => 0.0,
            (0, _) | (_, 0) => -1.0,
            (i, j) => self.matrix[(i - 1) * cap + (j - 1)],
        });

        let svd = bordered.svd(true, true);
        let u = svd.u.ok_or_else(|| format_err!("SVD did not produce U"))?;
        let v_t = svd.v_t.ok_or_else(|| format_err!("SVD did not produce V"))?;
        let s = svd.singular_values;

        // the right hand side is (-1, 0, ...), so only the first row of U matters
        let s_max = s.iter().cloned().fold(0.0, f64::max);
        let threshold = rank as f64 * s_max * std::f64::EPSILON;
        for i in 1..rank {
            let mut c = 0.0;
            for j in 0..rank {
                if s[j] > threshold {
                    c -= u[(0, j)] * v_t[(j, i)] / s[j];
                }
            }
            self.coefficients[i - 1] = c;
        }
        Ok(&self.coefficients[..num_prev])
    }

    /// `out = sum_i c_i implied_i` over the slots in use.
    pub fn extrapolate(&self, iteration: usize, out: &mut [V3]) {
        let num_prev = self.num_prev(iteration);
        for x in out.iter_mut() {
            *x = V3::zero();
        }
        for (slot, &c) in self.coefficients[..num_prev].iter().enumerate() {
            for (x, g) in out.iter_mut().zip(&self.implied[slot]) {
                *x += *g * c;
            }
        }
    }
}

/// Inputs of the induced dipole iteration, all in slot order.
pub(crate) struct MutualProblem<'a> {
    pub polarizability: &'a [f64],
    pub fixed_field_d: &'a [V3],
    pub fixed_field_p: &'a [V3],
    pub num_real: usize,
    pub epsilon: f64,
    pub max_iterations: usize,
}

/// Iterate `mu = alpha (E_fixed + E_induced[mu])` to self-consistency.
///
/// `mu_d` and `mu_p` hold the initial guess and receive the result.
/// `induced_field` computes the field of a pair of dipole sets.
pub(crate) fn solve_mutual<F>(
    problem: &MutualProblem,
    history: &mut DiisHistory,
    mu_d: &mut Vec<V3>,
    mu_p: &mut Vec<V3>,
    mut induced_field: F,
) -> FailResult<SolveReport>
where
    F: FnMut(&[V3], &[V3]) -> FailResult<(Vec<V3>, Vec<V3>)>,
{
    let len = mu_d.len();
    let mut implied = vec![V3::zero(); 2 * len];
    let mut current = vec![V3::zero(); 2 * len];
    let mut residual = std::f64::INFINITY;

    for iteration in 0..problem.max_iterations {
        let (field_d, field_p) = induced_field(mu_d, mu_p)?;
        for i in 0..len {
            let alpha = problem.polarizability[i];
            implied[i] = (problem.fixed_field_d[i] + field_d[i]) * alpha;
            implied[len + i] = (problem.fixed_field_p[i] + field_p[i]) * alpha;
            current[i] = mu_d[i];
            current[len + i] = mu_p[i];
        }

        let [sum_d, sum_p] = history.record(iteration, &implied, &current);
        let n = problem.num_real.max(1) as f64;
        residual = DEBYE_PER_E_NM_CONVERGENCE * (f64::max(sum_d, sum_p) / n).sqrt();
        debug!("induced dipoles: iteration {}, residual {:.6e} D", iteration, residual);
        if residual < problem.epsilon {
            return Ok(SolveReport { iterations: iteration + 1, residual, converged: true });
        }

        history.solve_coefficients(iteration)?;
        history.extrapolate(iteration, &mut current);
        mu_d.copy_from_slice(&current[..len]);
        mu_p.copy_from_slice(&current[len..]);
    }
    Ok(SolveReport { iterations: problem.max_iterations, residual, converged: false })
}
