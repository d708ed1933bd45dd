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

use std::collections::BTreeSet;
use std::ops::Range;

use itertools::Itertools;
use mpole_structure::CovalentMaps;

use crate::FailResult;
use crate::consts::TILE_SIZE;

/// Partitioning of particles into fixed-size tiles.
///
/// Particles are stored in "slot" order.  Tile `t` owns slots
/// `t * TILE_SIZE .. (t + 1) * TILE_SIZE`; slots beyond the particle count are
/// padding.
///
/// Tile pairs are stored as `(x, y)` with `x >= y`.  Exclusion tiles are the
/// subset of tile pairs that may contain covalently related particles.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayout {
    atom_order: Vec<usize>,
    slot_of: Vec<usize>,
    tile_pairs: Vec<(usize, usize)>,
    exclusion_tiles: BTreeSet<(usize, usize)>,
}

impl TileLayout {
    /// Build a layout where all tile pairs interact.
    ///
    /// Bonded clusters are kept contiguous so that most covalent pairs share a tile.
    pub fn new(covalent: &CovalentMaps) -> Self {
        let atom_order = covalent.connected_order();
        let slot_of = invert_order(&atom_order);
        let num_tiles = tile_count(atom_order.len());

        let tile_pairs = (0..num_tiles).cartesian_product(0..num_tiles).filter(|&(x, y)| x >= y).collect();

        let mut exclusion_tiles: BTreeSet<_> = (0..num_tiles).map(|t| (t, t)).collect();
        let lists = [
            &covalent.bonded12, &covalent.bonded13, &covalent.bonded14, &covalent.bonded15,
            &covalent.polarization11, &covalent.polarization12,
        ];
        for list in lists.iter() {
            for (i, related) in list.iter().enumerate() {
                for &j in related {
                    exclusion_tiles.insert(tile_key(slot_of[i], slot_of[j]));
                }
            }
        }

        TileLayout { atom_order, slot_of, tile_pairs, exclusion_tiles }
    }

    /// Use a partitioning produced elsewhere.
    ///
    /// `atom_order[slot]` is the caller's index of the particle stored in that slot.
    pub fn from_parts(
        atom_order: Vec<usize>,
        tile_pairs: Vec<(usize, usize)>,
        exclusion_tiles: impl IntoIterator<Item=(usize, usize)>,
    ) -> FailResult<Self> {
        let mut seen = vec![false; atom_order.len()];
        for &atom in &atom_order {
            if atom >= seen.len() || seen[atom] {
                bail!("atom order is not a permutation");
            }
            seen[atom] = true;
        }

        let num_tiles = tile_count(atom_order.len());
        let mut pair_set = BTreeSet::new();
        for &(x, y) in &tile_pairs {
            if x < y || x >= num_tiles {
                bail!("bad tile pair ({}, {}) for {} tiles", x, y, num_tiles);
            }
            if !pair_set.insert((x, y)) {
                bail!("tile pair ({}, {}) is listed more than once", x, y);
            }
        }
        let exclusion_tiles: BTreeSet<_> = exclusion_tiles.into_iter().collect();
        for key in &exclusion_tiles {
            if !pair_set.contains(key) {
                bail!("exclusion tile {:?} is not an interacting tile", key);
            }
        }

        let slot_of = invert_order(&atom_order);
        Ok(TileLayout { atom_order, slot_of, tile_pairs, exclusion_tiles })
    }

    pub fn num_particles(&self) -> usize
    { self.atom_order.len() }

    pub fn num_tiles(&self) -> usize
    { tile_count(self.num_particles()) }

    pub fn padded_len(&self) -> usize
    { self.num_tiles() * TILE_SIZE }

    pub fn slot_of(&self, atom: usize) -> usize
    { self.slot_of[atom] }

    /// The particle in a slot, or `None` for padding.
    pub fn atom_at(&self, slot: usize) -> Option<usize>
    { self.atom_order.get(slot).cloned() }

    pub fn tile_pairs(&self) -> &[(usize, usize)]
    { &self.tile_pairs }

    pub fn is_exclusion_tile(&self, key: (usize, usize)) -> bool
    { self.exclusion_tiles.contains(&key) }

    pub fn exclusion_tiles(&self) -> impl Iterator<Item=(usize, usize)> + '_
    { self.exclusion_tiles.iter().cloned() }

    /// Slots of real particles in a tile.
    pub fn tile_slots(&self, tile: usize) -> Range<usize> {
        let start = tile * TILE_SIZE;
        let end = usize::min(start + TILE_SIZE, self.num_particles());
        start..end.max(start)
    }

    /// Reorder per-slot data into caller order.
    pub fn to_caller_order<T: Clone>(&self, by_slot: &[T]) -> Vec<T>
    { self.slot_of.iter().map(|&slot| by_slot[slot].clone()).collect() }

    /// Reorder caller-ordered data into slots, filling padding with `fill`.
    pub fn to_slot_order<T: Clone>(&self, by_atom: &[T], fill: T) -> Vec<T> {
        let mut out = vec![fill; self.padded_len()];
        for (atom, value) in by_atom.iter().enumerate() {
            out[self.slot_of[atom]] = value.clone();
        }
        out
    }
}

/// `(larger tile, smaller tile)` for the pair of slots.
pub(crate) fn tile_key(slot_a: usize, slot_b: usize) -> (usize, usize) {
    let (ta, tb) = (slot_a / TILE_SIZE, slot_b / TILE_SIZE);
    (ta.max(tb), ta.min(tb))
}

fn tile_count(num_particles: usize) -> usize
{ (num_particles + TILE_SIZE - 1) / TILE_SIZE }

fn invert_order(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; order.len()];
    for (slot, &atom) in order.iter().enumerate() {
        inverse[atom] = slot;
    }
    inverse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tile() {
        let maps = CovalentMaps::from_bonds(3, &[(0, 2)], &[0, 1, 0]).unwrap();
        let layout = TileLayout::new(&maps);
        assert_eq!(layout.num_tiles(), 1);
        assert_eq!(layout.padded_len(), TILE_SIZE);
        assert_eq!(layout.tile_pairs(), &[(0, 0)]);
        assert!(layout.is_exclusion_tile((0, 0)));
        assert_eq!(layout.atom_at(layout.slot_of(1)), Some(1));
        assert_eq!(layout.atom_at(5), None);
        assert_eq!(layout.tile_slots(0), 0..3);
    }

    #[test]
    fn reorder_round_trip() {
        let n = 70;
        let bonds: Vec<_> = (0..n / 2).map(|i| (i, n - 1 - i)).collect();
        let maps = CovalentMaps::from_bonds(n, &bonds, &vec![0; n]).unwrap();
        let layout = TileLayout::new(&maps);
        assert_eq!(layout.num_tiles(), 3);
        assert_eq!(layout.tile_pairs().len(), 6);
        assert_eq!(layout.tile_slots(2), 64..70);

        let data: Vec<usize> = (0..n).collect();
        let slots = layout.to_slot_order(&data, usize::max_value());
        assert_eq!(slots[layout.slot_of(17)], 17);
        assert_eq!(slots[95], usize::max_value());
        assert_eq!(layout.to_caller_order(&slots), data);

        // bonded partners end up next to each other
        for &(a, b) in &bonds {
            let (sa, sb) = (layout.slot_of(a) as i64, layout.slot_of(b) as i64);
            assert_eq!((sa - sb).abs(), 1);
        }
    }

    #[test]
    fn from_parts_validation() {
        assert!(TileLayout::from_parts(vec![1, 0], vec![(0, 0)], vec![(0, 0)]).is_ok());
        assert!(TileLayout::from_parts(vec![1, 1], vec![(0, 0)], vec![]).is_err());
        assert!(TileLayout::from_parts(vec![1, 0], vec![(0, 1)], vec![]).is_err());
        assert!(TileLayout::from_parts(vec![1, 0], vec![], vec![(0, 0)]).is_err());

        // a repeated pair would be evaluated twice
        let order: Vec<_> = (0..40).collect();
        assert!(TileLayout::from_parts(order.clone(), vec![(0, 0), (1, 0), (1, 1)], vec![]).is_ok());
        assert!(TileLayout::from_parts(order, vec![(0, 0), (1, 0), (1, 0), (1, 1)], vec![]).is_err());
    }
}
