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

//! `V3` and `M33`, the only shapes the electrostatics code needs.
//!
//! Matrices are stored as rows. `m * v` is the usual matrix-vector
//! product and `v * m` multiplies by a row vector on the left.

#[cfg(test)]
#[macro_use]
extern crate mpole_assert_close;

mod types;
mod methods_v;
mod methods_m;
mod ops;

pub use crate::types::*;
pub use crate::methods_v::{dot, cross};
pub use crate::methods_m::{mat, outer};
