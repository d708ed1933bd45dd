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

//! Umbrella crate for the mpole workspace.
//!
//! The library lives in `mpole-electrostatics`.  This crate only re-exports it
//! alongside the tasks behind the binaries.

pub use mpole_electrostatics as electrostatics;
pub use mpole_tasks as tasks;
pub use mpole_tasks_config as config;
