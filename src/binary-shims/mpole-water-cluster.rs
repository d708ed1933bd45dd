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

// %% CRATES: binary: mpole-water-cluster %%
fn main() {
    mpole_tasks::entry_points::water_cluster();
}
