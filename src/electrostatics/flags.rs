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

//! Per-tile bitmasks for covalent exclusions and polarization groups.

use std::collections::HashMap;

use mpole_structure::CovalentMaps;

use crate::FailResult;
use crate::consts::TILE_SIZE;
use crate::errors::TopologyChangedError;
use crate::params::ScaleFactors;
use crate::tiles::{TileLayout, tile_key};

/// Covalent relationship of a pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Covalent {
    /// 1-2, 1-3, or the particle itself.
    Excluded,
    Scaled14,
    Scaled15,
    Unrelated,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct PairFlags {
    pub covalent: Covalent,
    pub same_group: bool,
}

impl PairFlags {
    pub const UNRELATED: PairFlags = PairFlags { covalent: Covalent::Unrelated, same_group: false };

    /// Scale for the permanent multipole energy.
    pub fn mscale(self, factors: &ScaleFactors) -> f64 {
        match self.covalent {
            Covalent::Excluded => 0.0,
            Covalent::Scaled14 => factors.m14,
            Covalent::Scaled15 => factors.m15,
            Covalent::Unrelated => 1.0,
        }
    }

    /// Scale for the field that induces the "p" dipoles.
    pub fn pscale(self, factors: &ScaleFactors) -> f64 {
        match self.covalent {
            Covalent::Excluded => 0.0,
            Covalent::Scaled14 => factors.p14,
            Covalent::Scaled15 => factors.p15,
            Covalent::Unrelated => 1.0,
        }
    }

    /// Scale for the field that induces the "d" dipoles.
    pub fn dscale(self) -> f64
    { if self.same_group { 0.0 } else { 1.0 } }

    /// Scale for induced-induced coupling.
    pub fn uscale(self) -> f64
    { if self.same_group { 0.0 } else { 1.0 } }
}

// Row `r` describes slot `r` of the larger tile.  Bit `b` of a row describes
// slot `b` of the smaller tile.
#[derive(Debug, Clone, Default)]
struct TileFlags {
    // set for 1-2, 1-3 and 1-4
    covalent1: [u32; TILE_SIZE],
    // set for 1-2, 1-3 and 1-5
    covalent2: [u32; TILE_SIZE],
    group: [u32; TILE_SIZE],
}

/// Exclusion and polarization-group flags, immutable once built.
#[derive(Debug, Clone)]
pub(crate) struct ExclusionFlags {
    tiles: HashMap<(usize, usize), TileFlags>,
}

impl ExclusionFlags {
    pub fn build(covalent: &CovalentMaps, layout: &TileLayout) -> FailResult<Self> {
        covalent.validate()?;
        if covalent.num_particles() != layout.num_particles() {
            bail!("covalent maps describe {} particles, but the layout has {}", covalent.num_particles(), layout.num_particles());
        }

        let mut tiles: HashMap<_, _> = {
            layout.exclusion_tiles()
                .map(|key| (key, TileFlags::default()))
                .collect()
        };

        let mut set = |slot_i: usize, slot_j: usize, value: Option<u32>, group: bool| -> FailResult<()> {
            let key = tile_key(slot_i, slot_j);
            let flags = match tiles.get_mut(&key) {
                Some(flags) => flags,
                None => throw!(TopologyChangedError {
                    message: format!("slots {} and {} are related, but tile pair {:?} has no exclusions", slot_i, slot_j, key),
                }),
            };
            let (ti, tj) = (slot_i / TILE_SIZE, slot_j / TILE_SIZE);
            let (oi, oj) = (slot_i % TILE_SIZE, slot_j % TILE_SIZE);
            let mut entries = vec![];
            if ti >= tj { entries.push((oi, oj)); }
            if tj >= ti { entries.push((oj, oi)); }
            for (row, bit) in entries {
                if let Some(value) = value {
                    if value == 0 || value == 1 {
                        flags.covalent1[row] |= 1 << bit;
                    }
                    if value == 0 || value == 2 {
                        flags.covalent2[row] |= 1 << bit;
                    }
                }
                if group {
                    flags.group[row] |= 1 << bit;
                }
            }
            Ok(())
        };

        for atom in 0..layout.num_particles() {
            let slot = layout.slot_of(atom);
            set(slot, slot, Some(0), false)?;

            let categories = [
                (&covalent.bonded12, 0),
                (&covalent.bonded13, 0),
                (&covalent.bonded14, 1),
                (&covalent.bonded15, 2),
            ];
            for &(list, value) in &categories {
                for &other in &list[atom] {
                    set(slot, layout.slot_of(other), Some(value), false)?;
                }
            }

            // An atom listed in both the group and the bonded-group list counts as
            // bonded-group.  Kept for compatibility with existing parameter files.
            for &other in &covalent.polarization11[atom] {
                if covalent.polarization12[atom].binary_search(&other).is_err() {
                    set(slot, layout.slot_of(other), None, true)?;
                }
            }
        }
        Ok(ExclusionFlags { tiles })
    }

    pub fn pair(&self, slot_i: usize, slot_j: usize) -> PairFlags {
        let key = tile_key(slot_i, slot_j);
        let flags = match self.tiles.get(&key) {
            Some(flags) => flags,
            None => return PairFlags::UNRELATED,
        };
        let (row, bit) = match slot_i / TILE_SIZE >= slot_j / TILE_SIZE {
            true => (slot_i % TILE_SIZE, slot_j % TILE_SIZE),
            false => (slot_j % TILE_SIZE, slot_i % TILE_SIZE),
        };
        let c1 = flags.covalent1[row] >> bit & 1 == 1;
        let c2 = flags.covalent2[row] >> bit & 1 == 1;
        let covalent = match (c1, c2) {
            (true, true) => Covalent::Excluded,
            (true, false) => Covalent::Scaled14,
            (false, true) => Covalent::Scaled15,
            (false, false) => Covalent::Unrelated,
        };
        let same_group = flags.group[row] >> bit & 1 == 1;
        PairFlags { covalent, same_group }
    }
}
