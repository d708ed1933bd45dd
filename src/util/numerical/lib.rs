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

//! Utilities for numeric differentiation.
//!
//! These exist mostly to check analytic forces against the energy that
//! produced them.

#[cfg(test)]
#[macro_use]
extern crate mpole_assert_close;

use mpole_array_types::V3;
use slice_of_array::prelude::*;

/// Approximation method for a numerical 1D derivative.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DerivativeKind {
    /// n-point central stencil. Only implemented for `n = 3, 5, 7, 9`.
    Stencil(u32),
}

impl Default for DerivativeKind {
    fn default() -> DerivativeKind {
        DerivativeKind::Stencil(5)
    }
}

impl DerivativeKind {
    // (offset, coefficient) pairs and the denominator, in units of the step.
    // http://www.holoborodko.com/pavel/numerical-methods/numerical-derivative/central-differences/
    fn stencil(self) -> (&'static [(f64, f64)], f64) {
        match self {
            DerivativeKind::Stencil(3) => (&[(-1.0, -1.0), (1.0, 1.0)], 2.0),
            DerivativeKind::Stencil(5) => (&[
                (-2.0, 1.0), (-1.0, -8.0), (1.0, 8.0), (2.0, -1.0),
            ], 12.0),
            DerivativeKind::Stencil(7) => (&[
                (-3.0, -1.0), (-2.0, 9.0), (-1.0, -45.0),
                (1.0, 45.0), (2.0, -9.0), (3.0, 1.0),
            ], 60.0),
            DerivativeKind::Stencil(9) => (&[
                (-4.0, 3.0), (-3.0, -32.0), (-2.0, 168.0), (-1.0, -672.0),
                (1.0, 672.0), (2.0, -168.0), (3.0, 32.0), (4.0, -3.0),
            ], 840.0),
            DerivativeKind::Stencil(n) => panic!("{}-point stencil is not implemented", n),
        }
    }
}

enum Never {}

/// Compute a numerical derivative using finite differences.
pub fn slope(
    step: f64,
    kind: Option<DerivativeKind>,
    point: f64,
    mut value_fn: impl FnMut(f64) -> f64,
) -> f64 {
    try_slope::<Never, _>(step, kind, point, |x| Ok(value_fn(x)))
        .unwrap_or_else(|e| match e {})
}

/// `slope` for functions that can fail.
pub fn try_slope<E, F>(
    step: f64,
    kind: Option<DerivativeKind>,
    point: f64,
    mut value_fn: F,
) -> Result<f64, E>
where
    F: FnMut(f64) -> Result<f64, E>,
{
    let (terms, denom) = kind.unwrap_or_default().stencil();
    let mut numer = 0.0;
    for &(offset, coeff) in terms {
        numer += coeff * value_fn(point + offset * step)?;
    }
    Ok(numer / (denom * step))
}

/// Numerical gradient of a function of many variables.
///
/// Each axis is differentiated independently, so the number of function
/// calls is proportional to the input size.
pub fn try_gradient<E, F>(
    step: f64,
    kind: Option<DerivativeKind>,
    point: &[f64],
    mut value_fn: F,
) -> Result<Vec<f64>, E>
where
    F: FnMut(&[f64]) -> Result<f64, E>,
{
    let kind = kind.unwrap_or_default();
    let mut work = point.to_vec();
    let mut out = Vec::with_capacity(point.len());
    for i in 0..point.len() {
        let center = point[i];
        let d = try_slope(step, Some(kind), center, |x| {
            work[i] = x;
            value_fn(&work)
        })?;
        work[i] = center;
        out.push(d);
    }
    Ok(out)
}

/// `try_gradient` for functions of particle positions.
pub fn try_gradient_v3<E, F>(
    step: f64,
    kind: Option<DerivativeKind>,
    positions: &[V3],
    mut value_fn: F,
) -> Result<Vec<V3>, E>
where
    F: FnMut(&[V3]) -> Result<f64, E>,
{
    let flat = try_gradient(step, kind, positions.flat(), |x| value_fn(x.nest()))?;
    Ok(flat.nest::<V3>().to_vec())
}
