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

use std::ops::{Add, Sub, Neg, Mul, Div, AddAssign, SubAssign, MulAssign};

use crate::types::*;

// ---------------------------------------------------------------------------
// elementwise ops, shared by vectors and matrices

macro_rules! impl_elementwise {
    ($($T:ty;)*) => {$(
        impl Add for $T {
            type Output = $T;

            #[inline(always)]
            fn add(self, other: $T) -> $T
            { let mut out = self; out += other; out }
        }

        impl Sub for $T {
            type Output = $T;

            #[inline(always)]
            fn sub(self, other: $T) -> $T
            { let mut out = self; out -= other; out }
        }

        impl<'a> Add<&'a $T> for $T {
            type Output = $T;

            #[inline(always)]
            fn add(self, other: &'a $T) -> $T
            { self + *other }
        }

        impl<'a> Sub<&'a $T> for $T {
            type Output = $T;

            #[inline(always)]
            fn sub(self, other: &'a $T) -> $T
            { self - *other }
        }

        impl AddAssign for $T {
            #[inline(always)]
            fn add_assign(&mut self, other: $T)
            { for k in 0..3 { self.0[k] += other.0[k]; } }
        }

        impl SubAssign for $T {
            #[inline(always)]
            fn sub_assign(&mut self, other: $T)
            { for k in 0..3 { self.0[k] -= other.0[k]; } }
        }

        impl MulAssign<f64> for $T {
            #[inline(always)]
            fn mul_assign(&mut self, s: f64)
            { for k in 0..3 { self.0[k] *= s; } }
        }

        impl Neg for $T {
            type Output = $T;

            #[inline(always)]
            fn neg(self) -> $T
            { self * -1.0 }
        }

        impl Mul<f64> for $T {
            type Output = $T;

            #[inline(always)]
            fn mul(self, s: f64) -> $T
            { let mut out = self; out *= s; out }
        }

        impl Mul<$T> for f64 {
            type Output = $T;

            #[inline(always)]
            fn mul(self, v: $T) -> $T
            { v * self }
        }

        impl Div<f64> for $T {
            type Output = $T;

            #[inline(always)]
            fn div(self, s: f64) -> $T
            { self * (1.0 / s) }
        }
    )*};
}

impl_elementwise! {
    V3;
    M33;
}

// ---------------------------------------------------------------------------
// products

// matrix * column vector
impl Mul<V3> for M33 {
    type Output = V3;

    #[inline]
    fn mul(self, v: V3) -> V3
    { V3::from_fn(|r| self[r].dot(&v)) }
}

// row vector * matrix
impl Mul<M33> for V3 {
    type Output = V3;

    #[inline]
    fn mul(self, m: M33) -> V3
    { m[0] * self[0] + m[1] * self[1] + m[2] * self[2] }
}

impl Mul<M33> for M33 {
    type Output = M33;

    #[inline]
    fn mul(self, other: M33) -> M33
    { M3([self[0] * other, self[1] * other, self[2] * other]) }
}
