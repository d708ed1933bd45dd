/* ********************************************************************** **
**  This file is part of mpole.                                           **
**                                                                        **
**  mpole is free software: you can redistribute it and/or modify it      **
**  under the terms of the GNU General Public License as published by the **
**  Free Software Foundation, either version 3 of the License, or (at     **
**  your option) any later version.                                       **
**                                                                        **
**      http://www.gnu.org/licenses/                                      **
**                                                                        **
** Do note that, while the whole of mpole is licensed under the GPL, many **
** parts of it are licensed under more permissive terms.                  **
** ********************************************************************** */

//! Tasks behind the mpole binaries.

#[macro_use] extern crate failure;
#[macro_use] extern crate log;
#[macro_use] extern crate serde_json;
#[cfg(test)] #[macro_use] extern crate mpole_assert_close;

pub type FailResult<T> = Result<T, failure::Error>;

mod logging;
mod water;
pub mod entry_points;

pub use crate::logging::GlobalLogger;
pub use crate::water::{WaterCluster, build_water_cluster};
