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

//! Covalent neighbor lists derived from a bond graph.

use std::collections::BTreeSet;

use petgraph::prelude::{UnGraph, NodeIndex};
use crate::FailResult;

/// Per-particle lists of covalently related particles.
///
/// Every list is sorted and never contains the particle itself.
///
/// * `bonded1N[i]` holds the particles whose shortest bond path to `i` has `N - 1` bonds.
/// * `polarization11[i]` holds the other members of `i`'s polarization group.
/// * `polarization12[i]` holds the members of groups directly bonded to `i`'s group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CovalentMaps {
    pub bonded12: Vec<Vec<usize>>,
    pub bonded13: Vec<Vec<usize>>,
    pub bonded14: Vec<Vec<usize>>,
    pub bonded15: Vec<Vec<usize>>,
    pub polarization11: Vec<Vec<usize>>,
    pub polarization12: Vec<Vec<usize>>,
}

#[derive(Debug, Fail)]
#[fail(display = "covalent maps reference particle {} but there are only {} particles", index, count)]
pub struct BadCovalentIndex {
    pub index: usize,
    pub count: usize,
}

impl CovalentMaps {
    /// Maps for particles that are all mutually unrelated.
    pub fn unbonded(num_particles: usize) -> Self {
        let empty = vec![vec![]; num_particles];
        CovalentMaps {
            bonded12: empty.clone(),
            bonded13: empty.clone(),
            bonded14: empty.clone(),
            bonded15: empty.clone(),
            polarization11: empty.clone(),
            polarization12: empty,
        }
    }

    /// Derive all lists from a bond list and a polarization group label per particle.
    ///
    /// Path lengths are shortest paths through the bond graph, so a particle in a
    /// ring appears only in its nearest category.
    pub fn from_bonds(
        num_particles: usize,
        bonds: &[(usize, usize)],
        groups: &[usize],
    ) -> FailResult<Self> {
        if groups.len() != num_particles {
            bail!("expected {} polarization group labels, got {}", num_particles, groups.len());
        }
        for &(a, b) in bonds {
            for &index in &[a, b] {
                if index >= num_particles {
                    throw!(BadCovalentIndex { index, count: num_particles });
                }
            }
            if a == b {
                bail!("particle {} is bonded to itself", a);
            }
        }

        let graph = bond_graph(num_particles, bonds);
        let mut maps = CovalentMaps::unbonded(num_particles);
        for i in 0..num_particles {
            let dists = petgraph::algo::dijkstra(&graph, NodeIndex::new(i), None, |_| 1usize);
            for (node, dist) in dists {
                let j = node.index();
                match dist {
                    1 => maps.bonded12[i].push(j),
                    2 => maps.bonded13[i].push(j),
                    3 => maps.bonded14[i].push(j),
                    4 => maps.bonded15[i].push(j),
                    _ => {},
                }
            }
        }

        let mut bonded_groups = BTreeSet::new();
        for &(a, b) in bonds {
            let (ga, gb) = (groups[a], groups[b]);
            if ga != gb {
                bonded_groups.insert((ga, gb));
                bonded_groups.insert((gb, ga));
            }
        }
        for i in 0..num_particles {
            for j in 0..num_particles {
                if i == j {
                    continue;
                }
                if groups[i] == groups[j] {
                    maps.polarization11[i].push(j);
                } else if bonded_groups.contains(&(groups[i], groups[j])) {
                    maps.polarization12[i].push(j);
                }
            }
        }

        maps.sort_lists();
        Ok(maps)
    }

    pub fn num_particles(&self) -> usize
    { self.bonded12.len() }

    /// Check list lengths, indices and ordering.
    ///
    /// Lookups binary search these lists, so each must be strictly increasing.
    pub fn validate(&self) -> FailResult<()> {
        let count = self.num_particles();
        for lists in self.all_lists().iter() {
            if lists.len() != count {
                bail!("inconsistent lengths of covalent maps ({} vs {})", lists.len(), count);
            }
            for (owner, list) in lists.iter().enumerate() {
                for &index in list {
                    if index >= count {
                        throw!(BadCovalentIndex { index, count });
                    }
                    if index == owner {
                        bail!("covalent list of particle {} contains itself", owner);
                    }
                }
                if list.windows(2).any(|w| w[0] >= w[1]) {
                    bail!("covalent list of particle {} is not sorted and free of duplicates: {:?}", owner, list);
                }
            }
        }
        Ok(())
    }

    /// An ordering of the particles that visits each bonded cluster contiguously,
    /// breadth-first from its lowest-index member.
    pub fn connected_order(&self) -> Vec<usize> {
        let count = self.num_particles();
        let mut bonds = vec![];
        for (i, neighbors) in self.bonded12.iter().enumerate() {
            bonds.extend(neighbors.iter().filter(|&&j| i < j).map(|&j| (i, j)));
        }
        let graph = bond_graph(count, &bonds);

        let mut visited = vec![false; count];
        let mut order = Vec::with_capacity(count);
        for start in 0..count {
            if visited[start] {
                continue;
            }
            let mut bfs = petgraph::visit::Bfs::new(&graph, NodeIndex::new(start));
            while let Some(node) = bfs.next(&graph) {
                visited[node.index()] = true;
                order.push(node.index());
            }
        }
        order
    }

    fn all_lists(&self) -> [&Vec<Vec<usize>>; 6] {
        [
            &self.bonded12, &self.bonded13, &self.bonded14, &self.bonded15,
            &self.polarization11, &self.polarization12,
        ]
    }

    fn sort_lists(&mut self) {
        let CovalentMaps {
            bonded12, bonded13, bonded14, bonded15,
            polarization11, polarization12,
        } = self;
        for lists in vec![bonded12, bonded13, bonded14, bonded15, polarization11, polarization12] {
            for list in lists {
                list.sort();
                list.dedup();
            }
        }
    }
}

fn bond_graph(num_particles: usize, bonds: &[(usize, usize)]) -> UnGraph<(), ()> {
    let mut graph = UnGraph::with_capacity(num_particles, bonds.len());
    for site in 0..num_particles {
        assert_eq!(NodeIndex::new(site), graph.add_node(()));
    }
    for &(a, b) in bonds {
        graph.update_edge(NodeIndex::new(a), NodeIndex::new(b), ());
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_distances() {
        // 0-1-2-3-4-5, plus an isolated particle 6
        let bonds = [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)];
        let groups = [0, 0, 0, 1, 1, 2, 3];
        let maps = CovalentMaps::from_bonds(7, &bonds, &groups).unwrap();
        assert_eq!(maps.bonded12[2], vec![1, 3]);
        assert_eq!(maps.bonded13[2], vec![0, 4]);
        assert_eq!(maps.bonded14[2], vec![5]);
        assert_eq!(maps.bonded15[0], vec![4]);
        assert!(maps.bonded15[2].is_empty());
        assert!(maps.bonded12[6].is_empty());

        assert_eq!(maps.polarization11[0], vec![1, 2]);
        assert_eq!(maps.polarization12[0], vec![3, 4]);
        assert_eq!(maps.polarization12[3], vec![0, 1, 2, 5]);
        assert!(maps.polarization12[6].is_empty());
        maps.validate().unwrap();
    }

    #[test]
    fn ring_uses_shortest_path() {
        let bonds = [(0, 1), (1, 2), (2, 3), (3, 0)];
        let maps = CovalentMaps::from_bonds(4, &bonds, &[0; 4]).unwrap();
        assert_eq!(maps.bonded12[0], vec![1, 3]);
        assert_eq!(maps.bonded13[0], vec![2]);
        assert!(maps.bonded14[0].is_empty());
    }

    #[test]
    fn bad_input() {
        assert!(CovalentMaps::from_bonds(2, &[(0, 2)], &[0, 0]).is_err());
        assert!(CovalentMaps::from_bonds(2, &[(1, 1)], &[0, 0]).is_err());
        assert!(CovalentMaps::from_bonds(2, &[(0, 1)], &[0]).is_err());

        let mut maps = CovalentMaps::unbonded(3);
        maps.bonded14[1].push(7);
        assert!(maps.validate().is_err());
    }

    #[test]
    fn lists_must_be_sorted() {
        let mut maps = CovalentMaps::unbonded(4);
        maps.polarization11[0] = vec![1, 2, 3];
        maps.polarization12[0] = vec![1, 3];
        maps.validate().unwrap();

        maps.polarization12[0] = vec![3, 1];
        assert!(maps.validate().is_err());

        maps.polarization12[0] = vec![1, 1, 3];
        assert!(maps.validate().is_err());

        maps.polarization12[0] = vec![];
        maps.bonded13[2] = vec![2];
        assert!(maps.validate().is_err());
    }

    #[test]
    fn connected_order_keeps_clusters_together() {
        // two molecules with interleaved indices
        let bonds = [(0, 2), (2, 4), (1, 3), (3, 5)];
        let maps = CovalentMaps::from_bonds(6, &bonds, &[0, 1, 0, 1, 0, 1]).unwrap();
        let order = maps.connected_order();

        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, (0..6).collect::<Vec<_>>());

        let first: BTreeSet<_> = order[..3].iter().cloned().collect();
        assert_eq!(first, vec![0, 2, 4].into_iter().collect());
        assert_eq!(order[0], 0);
        assert_eq!(order[3], 1);
    }
}
