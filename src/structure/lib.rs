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

//! Periodic boxes and covalent topology.

#[macro_use] extern crate failure;
#[cfg(test)] #[macro_use] extern crate mpole_assert_close;

// FIXME copied from failure 1.0 prerelease; remove once actually released
macro_rules! throw {
    ($e:expr) => {{
        return Err(::std::convert::Into::into($e));
    }}
}

pub type FailResult<T> = Result<T, failure::Error>;

mod lattice;
mod topology;

pub use crate::lattice::{PeriodicBox, BoxError};
pub use crate::topology::{CovalentMaps, BadCovalentIndex};
