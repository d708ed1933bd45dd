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

//! Approximate equality assertions for floating point data.
//!
//! ```ignore
//! assert_close!(energy, expected);
//! assert_close!(abs=1e-8, forces, expected_forces);
//! assert_close!(rel=1e-3, abs=1e-6, a, b, "in system {}", name);
//! ```

#[macro_use]
extern crate failure;

use std::fmt;

pub const DEFAULT_REL_TOL: f64 = 1e-9;

#[macro_export]
macro_rules! assert_close {
    (rel=$rel:expr, abs=$abs:expr, $($rest:tt)+) => {
        assert_close!(@go [$rel, $abs] $($rest)+)
    };
    (abs=$abs:expr, rel=$rel:expr, $($rest:tt)+) => {
        assert_close!(@go [$rel, $abs] $($rest)+)
    };
    (rel=$rel:expr, $($rest:tt)+) => {
        assert_close!(@go [$rel, 0.0] $($rest)+)
    };
    (abs=$abs:expr, $($rest:tt)+) => {
        assert_close!(@go [$crate::DEFAULT_REL_TOL, $abs] $($rest)+)
    };
    (@go [$rel:expr, $abs:expr] $a:expr, $b:expr $(,)*) => {
        assert_close!(@check [$rel, $abs] $a, $b, "not nearly equal!")
    };
    (@go [$rel:expr, $abs:expr] $a:expr, $b:expr, $($fmt:tt)+) => {
        assert_close!(@check [$rel, $abs] $a, $b, $($fmt)+)
    };
    (@check [$rel:expr, $abs:expr] $a:expr, $b:expr, $($fmt:tt)+) => {{
        let tol = $crate::Tolerances { rel: $rel, abs: $abs };
        let (a, b) = (&$a, &$b);
        if let Err(e) = $crate::CheckClose::check_close(a, b, tol) {
            panic!(
                "{} (tolerances: rel={}, abs={})\n left: {:?}\nright: {:?}\n{}",
                format!($($fmt)+), tol.rel, tol.abs, a, b, e,
            );
        }
    }};
    (@go $($bad:tt)*) => {
        compile_error!("assert_close!: expected two expressions to compare")
    };
    ($a:expr, $b:expr $(, $($rest:tt)*)?) => {
        assert_close!(@go [$crate::DEFAULT_REL_TOL, 0.0] $a, $b $(, $($rest)*)?)
    };
}

#[macro_export]
macro_rules! debug_assert_close {
    ($($t:tt)*) => {{
        #[cfg(debug_assertions)] {
            assert_close!{$($t)*}
        }
    }};
}

/// Closeness of two scalars, following the semantics of Python's `math.isclose`.
#[inline]
pub fn is_close(a: f64, b: f64, Tolerances { abs, rel }: Tolerances) -> bool {
    assert!(rel >= 0.0 && abs >= 0.0, "negative tolerance");

    if a == b {
        return true; // includes same-signed infinities
    }
    if !(a.is_finite() && b.is_finite()) {
        return false;
    }
    (a - b).abs() <= abs.max(rel * a.abs().max(b.abs()))
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Tolerances {
    pub rel: f64,
    pub abs: f64,
}

/// The first pair of scalars found to differ.
#[derive(Debug)]
pub struct CheckCloseError<T = f64> {
    pub values: (T, T),
    pub tol: Tolerances,
}

impl<T: fmt::Debug + Send + Sync + 'static> failure::Fail for CheckCloseError<T> {}

impl<T: fmt::Debug> fmt::Display for CheckCloseError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (ref left, ref right) = self.values;
        write!(f, "first mismatch:\n  left: {:?}\n right: {:?}", left, right)
    }
}

pub trait CheckClose<Rhs: ?Sized = Self> {
    type Scalar;

    /// Test that all values of self and other are close.
    fn check_close(&self, other: &Rhs, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>;
}

impl CheckClose for f64 {
    type Scalar = f64;

    #[inline]
    fn check_close(&self, other: &f64, tol: Tolerances) -> Result<(), CheckCloseError<f64>> {
        match is_close(*self, *other, tol) {
            true => Ok(()),
            false => Err(CheckCloseError { values: (*self, *other), tol }),
        }
    }
}

impl<'a, T: ?Sized + CheckClose> CheckClose for &'a T {
    type Scalar = T::Scalar;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>
    { (**self).check_close(*other, tol) }
}

impl<T: CheckClose> CheckClose for [T] {
    type Scalar = T::Scalar;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>> {
        assert_eq!(self.len(), other.len(), "length mismatch");
        self.iter().zip(other).try_for_each(|(a, b)| a.check_close(b, tol))
    }
}

impl<T: CheckClose> CheckClose for Vec<T> {
    type Scalar = T::Scalar;

    fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>
    { self[..].check_close(&other[..], tol) }
}

macro_rules! impl_for_arrays {
    ($($n:tt)*) => {$(
        impl<T: CheckClose> CheckClose for [T; $n] {
            type Scalar = T::Scalar;

            fn check_close(&self, other: &Self, tol: Tolerances) -> Result<(), CheckCloseError<Self::Scalar>>
            { self[..].check_close(&other[..], tol) }
        }
    )*};
}

impl_for_arrays! { 1 2 3 4 5 6 9 10 13 20 27 }

#[cfg(test)]
mod tests {
    #[test]
    fn macro_forms() {
        assert_close!(1.0, 1.0);
        assert_close!(1.0, 1.0,);
        assert_close!(abs=1e-8, 1.0, 1.0 + 1e-9);
        assert_close!(rel=1e-8, 1e10, 1e10 + 1.0);
        assert_close!(rel=1e-8, abs=1e-8, 0.0, 1e-9);
        assert_close!(abs=1e-8, rel=1e-8, 0.0, 1e-9, "{}", "with message");
        assert_close!(abs=0.0, vec![1.0, 2.0], vec![1.0, 2.0]);
    }

    #[test]
    #[should_panic]
    fn not_close() {
        assert_close!(abs=0.0, rel=0.0, 1.0, 1.1);
    }

    #[test]
    #[should_panic]
    fn nan_is_never_close() {
        assert_close!(abs=1.0, ::std::f64::NAN, ::std::f64::NAN);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn debug_not_close() {
        debug_assert_close!(abs=0.0, rel=0.0, 1.0, 1.1);
    }
}
