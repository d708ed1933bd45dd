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

//! Radial kernels: bare Coulomb, Ewald real space, and Thole damping.
//!
//! Each function returns `B_n` for `n = 0..=5`, where the n-th radial
//! derivative value is `g_n = (-1)^n B_n` (see `tensors`).

use std::f64::consts::PI;

use statrs::function::erf::erfc;

use crate::tensors::{Radial, MAX_ORDER};

/// `B_n` for `1/r`.
pub(crate) fn bare(r: f64) -> Radial {
    let r2_inv = 1.0 / (r * r);
    let mut b = [0.0; MAX_ORDER + 1];
    b[0] = 1.0 / r;
    for n in 1..=MAX_ORDER {
        b[n] = (2 * n - 1) as f64 * b[n - 1] * r2_inv;
    }
    b
}

/// `B_n` for `erfc(alpha r) / r`.
pub(crate) fn ewald(r: f64, alpha: f64) -> Radial {
    let r2_inv = 1.0 / (r * r);
    let alsq2 = 2.0 * alpha * alpha;
    let exp_term = (-alpha * alpha * r * r).exp() / (alpha * PI.sqrt());

    let mut b = [0.0; MAX_ORDER + 1];
    b[0] = erfc(alpha * r) / r;
    let mut alsq2n = 1.0;
    for n in 1..=MAX_ORDER {
        alsq2n *= alsq2;
        b[n] = ((2 * n - 1) as f64 * b[n - 1] + alsq2n * exp_term) * r2_inv;
    }
    b
}

/// Thole damping factors `lambda_{2n+1}` for `n = 0..=5`.
///
/// `damp_product` is the product of the two damping factors; zero disables damping.
pub(crate) fn thole(r: f64, damp_product: f64, thole: f64) -> Radial {
    let mut lambda = [1.0; MAX_ORDER + 1];
    if damp_product == 0.0 {
        return lambda;
    }
    let u = r / damp_product;
    let d = thole * u * u * u;
    if d > 50.0 {
        // exp(-d) underflows the precision of the factors
        return lambda;
    }
    let exp_d = (-d).exp();

    // P_1 = 1,  P_{n+1} = P_n + 3d (P_n - P_n') / (2n + 1)
    let mut poly = vec![1.0];
    for n in 1..=MAX_ORDER {
        lambda[n] = 1.0 - eval(&poly, d) * exp_d;

        let mut next = poly.clone();
        next.push(0.0);
        let scale = 3.0 / (2 * n + 1) as f64;
        for k in 0..poly.len() {
            let deriv_k = poly.get(k + 1).map_or(0.0, |&c| (k + 1) as f64 * c);
            next[k + 1] += scale * (poly[k] - deriv_k);
        }
        poly = next;
    }
    lambda
}

fn eval(coeffs: &[f64], x: f64) -> f64
{ coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c) }

/// `g_n` for a scaled, optionally damped and optionally Ewald-screened kernel.
///
/// * without Ewald, `D_n = scale lambda_n B_n`;
/// * with Ewald, `D_n = E_n - (1 - scale lambda_n) B_n`, so that the real and
///   reciprocal sums together see the scaled interaction.
pub(crate) fn kernel(bare: &Radial, ewald: Option<&Radial>, scale: f64, lambda: &Radial) -> Radial {
    let mut g = [0.0; MAX_ORDER + 1];
    for n in 0..=MAX_ORDER {
        let sign = if n % 2 == 1 { -1.0 } else { 1.0 };
        let damped = scale * lambda[n];
        let value = match ewald {
            None => damped * bare[n],
            Some(ewald) => ewald[n] - (1.0 - damped) * bare[n],
        };
        g[n] = sign * value;
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpole_numerical::slope;

    #[test]
    fn thole_closed_forms() {
        let (r, damp, a): (f64, f64, f64) = (0.13, 0.21, 0.39);
        let u = r / damp;
        let d = a * u * u * u;
        let e = (-d).exp();
        let lambda = thole(r, damp, a);
        assert_eq!(lambda[0], 1.0);
        assert_close!(lambda[1], 1.0 - e);
        assert_close!(lambda[2], 1.0 - (1.0 + d) * e);
        assert_close!(lambda[3], 1.0 - (1.0 + d + 0.6 * d * d) * e);
        assert_close!(lambda[4], 1.0 - (1.0 + d + 18.0 / 35.0 * d * d + 9.0 / 35.0 * d * d * d) * e);
        assert_eq!(thole(r, 0.0, a), [1.0; 6]);
    }

    // g_{n+1} = (1/r) d g_n / dr
    fn check_radial_chain(g_of: impl Fn(f64) -> Radial, first: usize) {
        for &r in &[0.05, 0.12, 0.4, 0.9] {
            let g = g_of(r);
            for n in first..MAX_ORDER {
                let numerical = slope(1e-4 * r, None, r, |r| g_of(r)[n]) / r;
                assert_close!(rel=1e-6, abs=1e-8, g[n + 1], numerical, "r={} n={}", r, n);
            }
        }
    }

    #[test]
    fn kernels_are_radial_derivatives() {
        let none = [1.0; 6];
        check_radial_chain(|r| kernel(&bare(r), None, 1.0, &none), 0);
        check_radial_chain(|r| kernel(&bare(r), Some(&ewald(r, 3.1)), 1.0, &none), 0);
        check_radial_chain(|r| kernel(&bare(r), Some(&ewald(r, 3.1)), 0.0, &none), 0);

        // damping leaves g_0 alone, so the chain starts at g_1
        check_radial_chain(|r| kernel(&bare(r), None, 1.0, &thole(r, 0.2, 0.39)), 1);
        check_radial_chain(|r| kernel(&bare(r), Some(&ewald(r, 3.1)), 0.5, &thole(r, 0.2, 0.39)), 1);
    }

    #[test]
    fn ewald_limits() {
        // at alpha -> 0 the screened kernel is the bare one
        let r = 0.3;
        let b = bare(r);
        let e = ewald(r, 1e-6);
        for n in 0..=MAX_ORDER {
            assert_close!(rel=1e-6, b[n], e[n]);
        }
        // an excluded pair subtracts the full bare interaction
        let g = kernel(&b, Some(&ewald(r, 3.0)), 0.0, &[1.0; 6]);
        assert_close!(g[0], -statrs::function::erf::erf(3.0 * r) / r);
    }
}
