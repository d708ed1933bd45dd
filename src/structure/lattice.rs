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

use std::sync::Arc;

use mpole_array_types::{V3, M33, M3};
use crate::FailResult;

/// A periodic cell whose vectors are in reduced (lower triangular) form.
///
/// Reduced form means
///
/// * `a = (ax, 0, 0)`, `b = (bx, by, 0)`, `c = (cx, cy, cz)`,
/// * `ax, by, cz > 0`,
/// * `|bx| <= ax/2`, `|cx| <= ax/2`, `|cy| <= by/2`.
///
/// Under these conditions, the minimum image of a displacement is found by
/// subtracting whole multiples of `c`, then `b`, then `a`.
#[derive(Debug, Clone)]
pub struct PeriodicBox {
    matrix: Arc<M33>,
    reciprocal: Arc<M33>,
}

#[derive(Debug, Fail)]
#[fail(display = "periodic box vectors are not in reduced form: {:?}", vectors)]
pub struct BoxError {
    vectors: [V3; 3],
}

// Manual impl that doesn't compare the reciprocal.
impl PartialEq for PeriodicBox {
    fn eq(&self, other: &PeriodicBox) -> bool {
        let PeriodicBox { ref matrix, reciprocal: _ } = *self;
        matrix == &other.matrix
    }
}

impl PeriodicBox {
    /// Validate and construct from the three cell vectors.
    pub fn new(vectors: [V3; 3]) -> FailResult<Self> {
        let [a, b, c] = vectors;
        let tol = 1e-12 * a[0].abs().max(b[1].abs()).max(c[2].abs());
        let reduced = {
            a[1] == 0.0 && a[2] == 0.0 && b[2] == 0.0
            && a[0] > 0.0 && b[1] > 0.0 && c[2] > 0.0
            && b[0].abs() <= 0.5 * a[0] + tol
            && c[0].abs() <= 0.5 * a[0] + tol
            && c[1].abs() <= 0.5 * b[1] + tol
        };
        if !reduced {
            throw!(BoxError { vectors });
        }

        let matrix = M3(vectors);
        let inverse = match matrix.inv() {
            Some(inv) => inv,
            None => throw!(BoxError { vectors }),
        };
        Ok(PeriodicBox {
            matrix: Arc::new(matrix),
            reciprocal: Arc::new(inverse.t()),
        })
    }

    /// A rectangular box.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> FailResult<Self> {
        PeriodicBox::new([
            V3([a, 0.0, 0.0]),
            V3([0.0, b, 0.0]),
            V3([0.0, 0.0, c]),
        ])
    }

    #[inline]
    pub fn vectors(&self) -> &[V3; 3]
    { &self.matrix.0 }

    /// Reciprocal vectors as rows.
    ///
    /// This is the inverse transpose. **There is no 2 PI factor.**
    /// Row `b` dotted with a cartesian position gives its fractional coordinate along `b`.
    #[inline]
    pub fn reciprocal(&self) -> &[V3; 3]
    { &self.reciprocal.0 }

    pub fn volume(&self) -> f64
    { self.matrix[0][0] * self.matrix[1][1] * self.matrix[2][2] }

    /// Largest cutoff for which the minimum image convention is exact.
    pub fn max_cutoff(&self) -> f64 {
        let m = &self.matrix;
        0.5 * m[0][0].min(m[1][1]).min(m[2][2])
    }

    /// Fractional coordinates, each wrapped into `[0, 1)`.
    pub fn wrapped_fracs(&self, cart: &V3) -> V3 {
        V3::from_fn(|k| {
            let f = self.reciprocal[k].dot(cart);
            f - f.floor()
        })
    }

    /// Shortest periodic image of a displacement.
    #[inline]
    pub fn min_image(&self, delta: V3) -> V3 {
        let [a, b, c] = *self.vectors();
        let mut d = delta;
        d -= c * (d[2] / c[2]).round();
        d -= b * (d[1] / b[1]).round();
        d -= a * (d[0] / a[0]).round();
        d
    }
}
