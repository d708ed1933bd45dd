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

impl<X> V3<X> {
    /// Construct a vector from a function on indices.
    #[inline(always)]
    pub fn from_fn<F>(mut f: F) -> Self
    where F: FnMut(usize) -> X,
    { V3([f(0), f(1), f(2)]) }

    /// Apply a function to each element.
    #[inline(always)]
    pub fn map<B, F>(self, mut f: F) -> V3<B>
    where F: FnMut(X) -> B,
    {
        let V3([a, b, c]) = self;
        V3([f(a), f(b), f(c)])
    }
}

impl V3 {
    #[inline(always)]
    pub fn zero() -> Self
    { V3([0.0; 3]) }

    /// Unit vector along a lab axis.
    #[inline]
    pub fn axis_unit(i: usize) -> Self
    { V3::from_fn(|k| if k == i { 1.0 } else { 0.0 }) }

    /// It is recommended you write this as `V3::dot(a, b)`, rather than `a.dot(b)`.
    #[inline(always)]
    pub fn dot(&self, other: &Self) -> f64
    { self[0] * other[0] + self[1] * other[1] + self[2] * other[2] }

    #[inline(always)]
    pub fn sqnorm(&self) -> f64
    { self.dot(self) }

    #[inline(always)]
    pub fn norm(&self) -> f64
    { self.sqnorm().sqrt() }

    /// Normalize. A zero vector produces NaNs.
    #[inline]
    pub fn unit(&self) -> Self
    { *self / self.norm() }

    #[inline]
    pub fn cross(&self, other: &Self) -> Self {
        V3([
            self[1] * other[2] - self[2] * other[1],
            self[2] * other[0] - self[0] * other[2],
            self[0] * other[1] - self[1] * other[0],
        ])
    }

    /// Component of `self` perpendicular to the unit vector `u`.
    #[inline]
    pub fn perp_unit(&self, u: &Self) -> Self
    { *self - *u * self.dot(u) }

    /// A uniformly distributed random unit vector.
    pub fn random_unit() -> Self {
        use rand::distributions::{Normal, IndependentSample};

        let normal = Normal::new(0.0, 1.0);
        let mut rng = rand::thread_rng();
        V3::from_fn(|_| normal.ind_sample(&mut rng)).unit()
    }
}

#[inline(always)]
pub fn dot(a: &V3, b: &V3) -> f64
{ a.dot(b) }

#[inline(always)]
pub fn cross(a: &V3, b: &V3) -> V3
{ a.cross(b) }

impl std::iter::Sum for V3 {
    fn sum<I: Iterator<Item=V3>>(iter: I) -> Self
    { iter.fold(V3::zero(), |a, b| a + b) }
}

impl<'a> std::iter::Sum<&'a V3> for V3 {
    fn sum<I: Iterator<Item=&'a V3>>(iter: I) -> Self
    { iter.fold(V3::zero(), |a, b| a + *b) }
}

impl CheckClose for V3 {
    type Scalar = f64;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<f64>>
    { self.0.check_close(&other.0, tol) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_is_right_handed() {
        let x = V3::axis_unit(0);
        let y = V3::axis_unit(1);
        assert_eq!(x.cross(&y), V3::axis_unit(2));
        assert_eq!(y.cross(&x), -V3::axis_unit(2));
    }

    #[test]
    fn random_unit_norm() {
        for _ in 0..10 {
            assert_close!(abs=1e-10, 1.0, V3::random_unit().sqnorm());
        }
    }

    #[test]
    fn perp_is_perp() {
        for _ in 0..10 {
            let a = V3::random_unit() * 3.0;
            let u = V3::random_unit();
            assert_close!(abs=1e-10, 0.0, dot(&a.perp_unit(&u), &u));
        }
    }
}
