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

use crate::types::*;
use mpole_assert_close::{CheckClose, CheckCloseError, Tolerances};

/// Build a matrix from nested row arrays.
#[inline(always)]
pub fn mat(rows: [[f64; 3]; 3]) -> M33
{ M3([V3(rows[0]), V3(rows[1]), V3(rows[2])]) }

/// `a b^T`
#[inline]
pub fn outer(a: &V3, b: &V3) -> M33
{ M33::from_fn(|r, c| a[r] * b[c]) }

impl M33 {
    #[inline(always)]
    pub fn zero() -> Self
    { M3([V3::zero(); 3]) }

    #[inline]
    pub fn eye() -> Self
    { M33::from_fn(|r, c| if r == c { 1.0 } else { 0.0 }) }

    /// Construct a matrix from a function of `(row, col)`.
    #[inline]
    pub fn from_fn<F>(mut f: F) -> Self
    where F: FnMut(usize, usize) -> f64,
    {
        let r0 = V3::from_fn(|c| f(0, c));
        let r1 = V3::from_fn(|c| f(1, c));
        let r2 = V3::from_fn(|c| f(2, c));
        M3([r0, r1, r2])
    }

    /// Construct a matrix whose columns are the given vectors.
    #[inline]
    pub fn from_cols(cols: &[V3; 3]) -> Self
    { M33::from_fn(|r, c| cols[c][r]) }

    #[inline]
    pub fn col(&self, c: usize) -> V3
    { V3::from_fn(|r| self[r][c]) }

    #[inline]
    pub fn t(&self) -> Self
    { M33::from_fn(|r, c| self[c][r]) }

    #[inline]
    pub fn trace(&self) -> f64
    { self[0][0] + self[1][1] + self[2][2] }

    /// Full contraction `sum_ab A_ab B_ab`.
    #[inline]
    pub fn ddot(&self, other: &Self) -> f64
    { (0..3).map(|r| self[r].dot(&other[r])).sum() }

    #[inline]
    pub fn det(&self) -> f64
    { self[0].dot(&self[1].cross(&self[2])) }

    /// Inverse matrix, or `None` for a singular matrix.
    pub fn inv(&self) -> Option<Self> {
        let det = self.det();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        // rows of the inverse transpose are cross products of pairs of rows
        let cof = M3([
            self[1].cross(&self[2]),
            self[2].cross(&self[0]),
            self[0].cross(&self[1]),
        ]);
        Some(cof.t() / det)
    }
}

impl CheckClose for M33 {
    type Scalar = f64;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<f64>>
    { self.0.check_close(&other.0, tol) }
}
