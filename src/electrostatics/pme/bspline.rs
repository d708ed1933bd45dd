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


//! Cardinal B-splines of order `PME_ORDER` and their DFT moduli.

use std::f64::consts::PI;

use crate::consts::PME_ORDER;

/// Number of derivatives (including the value) kept for each spline weight.
pub(crate) const NUM_DERIVS: usize = 4;

/// `theta[j][d]` is the d-th derivative of `M_n` at `w + j`, for `0 <= w < 1`.
pub(crate) fn weights(w: f64) -> [[f64; NUM_DERIVS]; PME_ORDER] {
    // m[q][t] = M_q(w + t)
    let mut m = [[0.0; PME_ORDER]; PME_ORDER + 1];
    m[1][0] = 1.0;
    for q in 2..=PME_ORDER {
        for t in 0..q {
            let x = w + t as f64;
            let shifted = if t > 0 { m[q - 1][t - 1] } else { 0.0 };
            m[q][t] = (x * m[q - 1][t] + (q as f64 - x) * shifted) / (q - 1) as f64;
        }
    }

    // M_n^(d)(x) = sum_i (-1)^i C(d, i) M_{n-d}(x - i)
    let mut theta = [[0.0; NUM_DERIVS]; PME_ORDER];
    for j in 0..PME_ORDER {
        for d in 0..NUM_DERIVS {
            let mut sum = 0.0;
            for i in 0..=usize::min(d, j) {
                let sign = if i % 2 == 1 { -1.0 } else { 1.0 };
                sum += sign * binomial(d, i) * m[PME_ORDER - d][j - i];
            }
            theta[j][d] = sum;
        }
    }
    theta
}

fn binomial(n: usize, k: usize) -> f64
{ (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64) }

/// Squared moduli of the spline's discrete Fourier transform along an axis
/// of `n` points, with the Euler spline fix and the zeta correction applied.
pub(crate) fn moduli(n: usize) -> Vec<f64> {
    assert!(n >= PME_ORDER);
    let spline = weights(0.0);

    let factor = 2.0 * PI / n as f64;
    let mut moduli: Vec<f64> = (0..n).map(|i| {
        let (mut sc, mut ss) = (0.0, 0.0);
        for (k, theta) in spline.iter().enumerate() {
            let arg = factor * (i * k) as f64;
            sc += theta[0] * arg.cos();
            ss += theta[0] * arg.sin();
        }
        sc * sc + ss * ss
    }).collect();

    let eps = 1e-7;
    if moduli[0] < eps {
        moduli[0] = 0.9 * moduli[1];
    }
    for i in 1..n - 1 {
        if moduli[i] < eps {
            moduli[i] = 0.9 * (moduli[i - 1] + moduli[i + 1]);
        }
    }
    if moduli[n - 1] < eps {
        moduli[n - 1] = 0.9 * moduli[n - 2];
    }

    for (index, modulus) in moduli.iter_mut().enumerate() {
        let k = match index >= n / 2 {
            true => index as f64 - n as f64,
            false => index as f64,
        };
        *modulus *= zeta(k, n).powi(2);
    }
    moduli
}

fn zeta(k: f64, n: usize) -> f64 {
    const JCUT: usize = 50;
    if k == 0.0 {
        return 1.0;
    }
    let factor = PI * k / n as f64;
    let (mut sum1, mut sum2) = (1.0, 1.0);
    for &sign in &[1.0, -1.0] {
        for j in 1..=JCUT {
            let arg = factor / (factor + sign * PI * j as f64);
            sum1 += arg.powi(PME_ORDER as i32);
            sum2 += arg.powi(2 * PME_ORDER as i32);
        }
    }
    sum2 / sum1
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpole_numerical::slope;

    #[test]
    fn integer_values() {
        let theta = weights(0.0);
        let expected = [0.0, 1.0 / 24.0, 11.0 / 24.0, 11.0 / 24.0, 1.0 / 24.0];
        for j in 0..PME_ORDER {
            assert_close!(abs=1e-15, theta[j][0], expected[j]);
        }
    }

    #[test]
    fn partition_of_unity() {
        for &w in &[0.0, 0.1, 0.5, 0.77, 0.999] {
            let theta = weights(w);
            assert_close!(abs=1e-14, theta.iter().map(|t| t[0]).sum::<f64>(), 1.0);
            // so every derivative sums to zero
            for d in 1..NUM_DERIVS {
                assert_close!(abs=1e-13, theta.iter().map(|t| t[d]).sum::<f64>(), 0.0);
            }
        }
    }

    #[test]
    fn derivatives() {
        for &w in &[0.2, 0.45, 0.8] {
            let theta = weights(w);
            for j in 0..PME_ORDER {
                for d in 1..NUM_DERIVS {
                    let numerical = slope(1e-4, None, w, |w| weights(w)[j][d - 1]);
                    assert_close!(rel=1e-7, abs=1e-9, theta[j][d], numerical, "j={} d={}", j, d);
                }
            }
        }
    }

    #[test]
    fn moduli_are_symmetric() {
        for &n in &[10, 15, 24] {
            let m = moduli(n);
            assert_close!(m[0], 1.0);
            for i in 1..n / 2 {
                assert_close!(rel=1e-12, m[i], m[n - i], "n={} i={}", n, i);
            }
            assert!(m.iter().all(|&x| x > 0.0));
        }
    }
}
