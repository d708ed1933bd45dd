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

//! Direct-space passes over the tile pairs.
//!
//! Every pass visits each interacting pair once, accumulating into a small
//! per-tile-pair buffer.  The buffers are added into per-slot totals in a
//! serial step afterwards, so the result does not depend on scheduling.

use std::ops::AddAssign;

use mpole_array_types::V3;
use mpole_structure::PeriodicBox;
use rayon_cond::CondIterator;

use crate::consts::TILE_SIZE;
use crate::damping;
use crate::flags::{ExclusionFlags, PairFlags};
use crate::params::{ParticleTable, ScaleFactors};
use crate::tensors::{self, Derivs, Direction, Multipole, Radial};
use crate::tiles::TileLayout;

const UNDAMPED: Radial = [1.0; 6];

/// Read-only view of the system for one direct-space pass.
pub(crate) struct DirectSpace<'a> {
    pub table: &'a ParticleTable,
    pub layout: &'a TileLayout,
    pub flags: &'a ExclusionFlags,
    pub scales: &'a ScaleFactors,
    /// Slot order, padded.
    pub positions: &'a [V3],
    pub periodic: Option<&'a PeriodicBox>,
    pub cutoff: Option<f64>,
    /// Present when the reciprocal sum handles the long range part.
    pub ewald_alpha: Option<f64>,
    pub use_rayon: bool,
}

/// `r = r_j - r_i` after minimum image.
struct Pair {
    i: usize,
    j: usize,
    r: V3,
    dist: f64,
    flags: PairFlags,
}

/// Fields that induce the two dipole sets.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub(crate) struct FieldSums {
    pub d: V3,
    pub p: V3,
}

impl AddAssign for FieldSums {
    fn add_assign(&mut self, other: FieldSums) {
        self.d += other.d;
        self.p += other.p;
    }
}

/// Per-slot output of the electrostatics pass.
///
/// Pair energies are attributed to the first particle of the pair.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub(crate) struct SlotSums {
    pub energy: f64,
    pub force: V3,
    pub torque: V3,
}

impl AddAssign for SlotSums {
    fn add_assign(&mut self, other: SlotSums) {
        self.energy += other.energy;
        self.force += other.force;
        self.torque += other.torque;
    }
}

impl<'a> DirectSpace<'a> {
    /// Fields from the permanent multipoles, for the d and p dipoles.
    pub fn fixed_field(&self, lab: &[Multipole]) -> Vec<FieldSums> {
        self.reduce_tiles(FieldSums::default(), |pair, at_i, at_j| {
            let (mi, mj) = (&lab[pair.i], &lab[pair.j]);
            let (bare, ewald) = self.radial(pair.dist);
            let lambda = self.thole_lambda(pair);
            let order = usize::max(mi.rank(), mj.rank()) + 1;

            let fields = |scale: f64| -> (V3, V3) {
                if self.kernel_vanishes(scale) {
                    return (V3::zero(), V3::zero());
                }
                let g = damping::kernel(&bare, ewald.as_ref(), scale, &lambda);
                let derivs = Derivs::new(pair.r, &g, order);
                let at_i = tensors::potential(mj, &derivs, Direction::Reverse, 1).field();
                let at_j = tensors::potential(mi, &derivs, Direction::Forward, 1).field();
                (at_i, at_j)
            };

            let dscale = pair.flags.dscale();
            let pscale = pair.flags.pscale(self.scales);
            let (di, dj) = fields(dscale);
            let (pi, pj) = if pscale == dscale { (di, dj) } else { fields(pscale) };
            *at_i += FieldSums { d: di, p: pi };
            *at_j += FieldSums { d: dj, p: pj };
        })
    }

    /// Fields of the induced dipoles, each set acting on its own kind.
    pub fn induced_field(&self, mu_d: &[V3], mu_p: &[V3]) -> Vec<FieldSums> {
        self.reduce_tiles(FieldSums::default(), |pair, at_i, at_j| {
            let uscale = pair.flags.uscale();
            if self.kernel_vanishes(uscale) {
                return;
            }
            let (bare, ewald) = self.radial(pair.dist);
            let g = damping::kernel(&bare, ewald.as_ref(), uscale, &self.thole_lambda(pair));
            let derivs = Derivs::new(pair.r, &g, 2);

            let field = |mu: &[V3]| {
                let (si, sj) = (Multipole::dipole(mu[pair.i]), Multipole::dipole(mu[pair.j]));
                let at_i = tensors::potential(&sj, &derivs, Direction::Reverse, 1).field();
                let at_j = tensors::potential(&si, &derivs, Direction::Forward, 1).field();
                (at_i, at_j)
            };
            let (di, dj) = field(mu_d);
            let (pi, pj) = field(mu_p);
            *at_i += FieldSums { d: di, p: pi };
            *at_j += FieldSums { d: dj, p: pj };
        })
    }

    /// Permanent pair energy, plus forces and torques of the full functional.
    ///
    /// `induced` holds the d and p dipoles.  The induced-induced coupling is
    /// only included when `mutual` is set.
    pub fn electrostatics(
        &self,
        lab: &[Multipole],
        induced: Option<(&[V3], &[V3])>,
        mutual: bool,
    ) -> Vec<SlotSums> {
        self.reduce_tiles(SlotSums::default(), |pair, at_i, at_j| {
            let (mi, mj) = (&lab[pair.i], &lab[pair.j]);
            let (bare, ewald) = self.radial(pair.dist);
            dbg!("pair {} {}: r = {:?}, flags = {:?}", pair.i, pair.j, pair.r, pair.flags);

            let mscale = pair.flags.mscale(self.scales);
            if !self.kernel_vanishes(mscale) {
                let g = damping::kernel(&bare, ewald.as_ref(), mscale, &UNDAMPED);
                let derivs = Derivs::new(pair.r, &g, mi.rank() + mj.rank() + 1);
                let terms = Terms { weight: 1.0, energy: true, torque_a: true, torque_b: true };
                interact(mi, mj, &derivs, terms, at_i, at_j);
            }

            let (mu_d, mu_p) = match induced {
                Some(induced) => induced,
                None => return,
            };
            let lambda = self.thole_lambda(pair);
            let (di, dj) = (Multipole::dipole(mu_d[pair.i]), Multipole::dipole(mu_d[pair.j]));
            let (pi, pj) = (Multipole::dipole(mu_p[pair.i]), Multipole::dipole(mu_p[pair.j]));
            let order = usize::max(mi.rank(), mj.rank()) + 2;
            let on_a = Terms { weight: 0.5, energy: false, torque_a: true, torque_b: false };
            let on_b = Terms { weight: 0.5, energy: false, torque_a: false, torque_b: true };

            // the d-field couples to the p dipoles and vice versa
            let dscale = pair.flags.dscale();
            if !self.kernel_vanishes(dscale) {
                let g = damping::kernel(&bare, ewald.as_ref(), dscale, &lambda);
                let derivs = Derivs::new(pair.r, &g, order);
                interact(mi, &pj, &derivs, on_a, at_i, at_j);
                interact(&pi, mj, &derivs, on_b, at_i, at_j);
            }
            let pscale = pair.flags.pscale(self.scales);
            if !self.kernel_vanishes(pscale) {
                let g = damping::kernel(&bare, ewald.as_ref(), pscale, &lambda);
                let derivs = Derivs::new(pair.r, &g, order);
                interact(mi, &dj, &derivs, on_a, at_i, at_j);
                interact(&di, mj, &derivs, on_b, at_i, at_j);
            }

            let uscale = pair.flags.uscale();
            if mutual && !self.kernel_vanishes(uscale) {
                let g = damping::kernel(&bare, ewald.as_ref(), uscale, &lambda);
                let derivs = Derivs::new(pair.r, &g, 3);
                let neither = Terms { weight: 0.5, energy: false, torque_a: false, torque_b: false };
                interact(&di, &pj, &derivs, neither, at_i, at_j);
                interact(&pi, &dj, &derivs, neither, at_i, at_j);
            }
        })
    }

    /// Real space potential of `sources` (slot order) at arbitrary points.
    pub fn potential_at(&self, points: &[V3], sources: &[Multipole]) -> Vec<f64> {
        CondIterator::new(points, self.use_rayon).map(|&point| {
            let mut phi = 0.0;
            for slot in 0..self.table.num_real {
                let mut r = point - self.positions[slot];
                if let Some(pbox) = self.periodic {
                    r = pbox.min_image(r);
                }
                let dist = r.norm();
                if self.cutoff.map_or(false, |cutoff| dist > cutoff) {
                    continue;
                }
                let source = &sources[slot];
                let (bare, ewald) = self.radial(dist);
                let g = damping::kernel(&bare, ewald.as_ref(), 1.0, &UNDAMPED);
                let derivs = Derivs::new(r, &g, source.rank());
                phi += tensors::potential(source, &derivs, Direction::Forward, 0).phi;
            }
            phi
        }).collect()
    }

    //--------------------------------------------------------------------------

    fn radial(&self, dist: f64) -> (Radial, Option<Radial>)
    { (damping::bare(dist), self.ewald_alpha.map(|alpha| damping::ewald(dist, alpha))) }

    fn thole_lambda(&self, pair: &Pair) -> Radial {
        let (a, b) = (&self.table.records[pair.i], &self.table.records[pair.j]);
        damping::thole(pair.dist, a.damping_factor * b.damping_factor, a.thole.min(b.thole))
    }

    // Without Ewald, a zero scale removes the pair entirely.  With Ewald it
    // still subtracts what the reciprocal sum added.
    fn kernel_vanishes(&self, scale: f64) -> bool
    { self.ewald_alpha.is_none() && scale == 0.0 }

    /// Run `visit` on every interacting pair and sum its per-particle output by slot.
    fn reduce_tiles<T, F>(&self, zero: T, visit: F) -> Vec<T>
    where
        T: Copy + Send + Sync + AddAssign,
        F: Fn(&Pair, &mut T, &mut T) + Sync,
    {
        let bounds = self.tile_bounds();
        let partials: Vec<_> = {
            CondIterator::new(self.layout.tile_pairs(), self.use_rayon)
                .filter(|&&(x, y)| match &bounds {
                    Some(bounds) => within_cutoff(&bounds[x], &bounds[y], self.cutoff),
                    None => true,
                })
                .map(|&(x, y)| {
                    // rows for tile x, then rows for tile y
                    let mut rows = vec![zero; 2 * TILE_SIZE];
                    {
                        let (rows_x, rows_y) = rows.split_at_mut(TILE_SIZE);
                        self.for_each_pair(x, y, |pair| {
                            visit(pair, &mut rows_x[pair.i % TILE_SIZE], &mut rows_y[pair.j % TILE_SIZE]);
                        });
                    }
                    (x, y, rows)
                })
                .collect()
        };

        let mut out = vec![zero; self.layout.padded_len()];
        for (x, y, rows) in partials {
            for k in 0..TILE_SIZE {
                out[x * TILE_SIZE + k] += rows[k];
                out[y * TILE_SIZE + k] += rows[TILE_SIZE + k];
            }
        }
        out
    }

    fn for_each_pair(&self, x: usize, y: usize, mut f: impl FnMut(&Pair)) {
        let has_exclusions = self.layout.is_exclusion_tile((x, y));
        for i in self.layout.tile_slots(x) {
            for j in self.layout.tile_slots(y) {
                if x == y && j >= i {
                    continue;
                }
                let mut r = self.positions[j] - self.positions[i];
                if let Some(pbox) = self.periodic {
                    r = pbox.min_image(r);
                }
                let dist = r.norm();
                if self.cutoff.map_or(false, |cutoff| dist > cutoff) {
                    continue;
                }
                let flags = match has_exclusions {
                    true => self.flags.pair(i, j),
                    false => PairFlags::UNRELATED,
                };
                f(&Pair { i, j, r, dist, flags });
            }
        }
    }

    // Bounding boxes per tile, only used to cull tile pairs without periodicity.
    fn tile_bounds(&self) -> Option<Vec<Option<(V3, V3)>>> {
        if self.periodic.is_some() || self.cutoff.is_none() {
            return None;
        }
        Some((0..self.layout.num_tiles()).map(|tile| {
            let mut slots = self.layout.tile_slots(tile);
            let first = self.positions[slots.next()?];
            let (mut lo, mut hi) = (first, first);
            for slot in slots {
                let p = self.positions[slot];
                lo = V3::from_fn(|k| lo[k].min(p[k]));
                hi = V3::from_fn(|k| hi[k].max(p[k]));
            }
            Some((lo, hi))
        }).collect())
    }
}

fn within_cutoff(a: &Option<(V3, V3)>, b: &Option<(V3, V3)>, cutoff: Option<f64>) -> bool {
    match (a, b, cutoff) {
        (Some((lo_a, hi_a)), Some((lo_b, hi_b)), Some(cutoff)) => {
            let gap = V3::from_fn(|k| f64::max(0.0, f64::max(lo_b[k] - hi_a[k], lo_a[k] - hi_b[k])));
            gap.norm() <= cutoff
        },
        // a tile of only padding
        (None, _, _) | (_, None, _) => false,
        _ => true,
    }
}

#[derive(Debug, Copy, Clone)]
struct Terms {
    weight: f64,
    energy: bool,
    torque_a: bool,
    torque_b: bool,
}

/// Accumulate the interaction of `b` (at slot j) with the potential of `a` (at slot i).
fn interact(
    a: &Multipole,
    b: &Multipole,
    derivs: &Derivs,
    terms: Terms,
    at_i: &mut SlotSums,
    at_j: &mut SlotSums,
) {
    let w = terms.weight;
    let pot = tensors::potential(a, derivs, Direction::Forward, b.rank() + 1);
    if terms.energy {
        at_i.energy += w * b.energy_in(&pot);
    }
    let force = b.force_in(&pot) * w;
    at_j.force += force;
    at_i.force -= force;
    if terms.torque_b {
        at_j.torque += b.torque_in(&pot) * w;
    }
    if terms.torque_a && a.rank() > 0 {
        let back = tensors::potential(b, derivs, Direction::Reverse, a.rank());
        at_i.torque += a.torque_in(&back) * w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpole_array_types::{M3, M33};
    use mpole_numerical::try_gradient_v3;
    use mpole_structure::CovalentMaps;

    use crate::params::{ForceParameters, MultipoleParticle};

    struct System {
        table: ParticleTable,
        layout: TileLayout,
        flags: ExclusionFlags,
        scales: ScaleFactors,
    }

    impl System {
        fn new(particles: Vec<MultipoleParticle>, covalent: CovalentMaps) -> Self {
            let layout = TileLayout::new(&covalent);
            let flags = ExclusionFlags::build(&covalent, &layout).unwrap();
            let table = ParticleTable::build(&ForceParameters { particles, covalent }, &layout).unwrap();
            System { table, layout, flags, scales: ScaleFactors::default() }
        }

        fn space<'a>(&'a self, positions: &'a [V3], cutoff: Option<f64>) -> DirectSpace<'a> {
            DirectSpace {
                table: &self.table,
                layout: &self.layout,
                flags: &self.flags,
                scales: &self.scales,
                positions,
                periodic: None,
                cutoff,
                ewald_alpha: None,
                use_rayon: false,
            }
        }

        fn slot_positions(&self, positions: &[V3]) -> Vec<V3>
        { self.layout.to_slot_order(positions, V3::zero()) }

        fn lab(&self) -> Vec<Multipole> {
            self.table.records.iter().enumerate().map(|(slot, r)| match slot < self.table.num_real {
                true => Multipole { q: r.charge, mu: r.dipole, quad: r.local_quadrupole() },
                false => Multipole::zero(),
            }).collect()
        }
    }

    fn lab_particle(q: f64, mu: V3, quad: M33) -> MultipoleParticle {
        MultipoleParticle { dipole: mu, quadrupole: quad, ..MultipoleParticle::charge(q) }
    }

    #[test]
    fn two_charges() {
        let sys = System::new(
            vec![MultipoleParticle::charge(0.5), MultipoleParticle::charge(-0.8)],
            CovalentMaps::unbonded(2),
        );
        let positions = sys.slot_positions(&[V3([0.1, 0.2, 0.3]), V3([0.4, 0.2, 0.3])]);
        let sums = sys.space(&positions, None).electrostatics(&sys.lab(), None, false);
        let energy: f64 = sums.iter().map(|s| s.energy).sum();
        assert_close!(energy, -0.4 / 0.3);

        let force = sums[sys.layout.slot_of(1)].force;
        assert_close!(abs=1e-12, force, V3([-0.4 / 0.09, 0.0, 0.0]));
        assert_close!(abs=1e-12, sums[sys.layout.slot_of(0)].force, -force);

        // beyond the cutoff, nothing
        let sums = sys.space(&positions, Some(0.25)).electrostatics(&sys.lab(), None, false);
        assert!(sums.iter().all(|s| *s == SlotSums::default()));
    }

    #[test]
    fn permanent_forces_are_energy_gradients() {
        let quad = M3([
            V3([0.002, 0.001, -0.0005]),
            V3([0.001, -0.003, 0.0002]),
            V3([-0.0005, 0.0002, 0.001]),
        ]);
        let particles = vec![
            lab_particle(0.4, V3([0.01, -0.02, 0.005]), quad),
            lab_particle(-0.3, V3([-0.01, 0.0, 0.02]), quad * -1.0),
            lab_particle(0.2, V3([0.0, 0.015, -0.01]), M33::zero()),
            lab_particle(-0.3, V3::zero(), quad * 0.5),
        ];
        // particles 0 and 1 are bonded, 0 and 3 are 1-4
        let mut covalent = CovalentMaps::unbonded(4);
        covalent.bonded12[0] = vec![1];
        covalent.bonded12[1] = vec![0];
        covalent.bonded14[0] = vec![3];
        covalent.bonded14[3] = vec![0];
        let sys = System::new(particles, covalent);

        let positions = vec![
            V3([0.0, 0.0, 0.0]),
            V3([0.11, 0.02, -0.01]),
            V3([-0.05, 0.23, 0.08]),
            V3([0.21, -0.12, 0.17]),
        ];
        let lab = sys.lab();
        let energy = |pos: &[V3]| -> Result<f64, ()> {
            let slots = sys.slot_positions(pos);
            let sums = sys.space(&slots, None).electrostatics(&lab, None, false);
            Ok(sums.iter().map(|s| s.energy).sum())
        };
        let numerical = try_gradient_v3(1e-5, None, &positions, energy).unwrap();

        let slots = sys.slot_positions(&positions);
        let sums = sys.space(&slots, None).electrostatics(&lab, None, false);
        for atom in 0..4 {
            let force = sums[sys.layout.slot_of(atom)].force;
            assert_close!(rel=1e-6, abs=1e-8, force, -numerical[atom], "atom {}", atom);
        }
    }

    #[test]
    fn fields_and_potentials_of_a_charge() {
        let sys = System::new(
            vec![MultipoleParticle::charge(1.5), MultipoleParticle::charge(0.0)],
            CovalentMaps::unbonded(2),
        );
        let positions = sys.slot_positions(&[V3::zero(), V3([0.0, 0.0, 0.5])]);
        let space = sys.space(&positions, None);
        let lab = sys.lab();

        let fields = space.fixed_field(&lab);
        let expected = V3([0.0, 0.0, 1.5 / 0.25]);
        assert_close!(fields[sys.layout.slot_of(1)].d, expected);
        assert_close!(fields[sys.layout.slot_of(1)].p, expected);

        let phi = space.potential_at(&[V3([0.3, 0.0, 0.4])], &lab);
        assert_close!(phi[0], 3.0);
    }

    #[test]
    fn induced_field_respects_groups() {
        let mut covalent = CovalentMaps::unbonded(3);
        covalent.polarization11[0] = vec![1];
        covalent.polarization11[1] = vec![0];
        let sys = System::new(vec![MultipoleParticle::charge(0.0); 3], covalent);
        let positions = sys.slot_positions(&[
            V3::zero(), V3([0.3, 0.0, 0.0]), V3([0.0, 0.4, 0.0]),
        ]);
        let space = sys.space(&positions, None);

        let mu = sys.layout.to_slot_order(&[V3([0.0, 0.0, 0.01]); 3], V3::zero());
        let zero = vec![V3::zero(); mu.len()];
        let fields = space.induced_field(&mu, &zero);
        // 0 and 1 share a group and do not see each other
        let at_1 = fields[sys.layout.slot_of(1)].d;
        let r: f64 = (0.3f64 * 0.3 + 0.4 * 0.4).sqrt();
        assert_close!(rel=1e-9, at_1[2], -0.01 / r.powi(3));
        assert_eq!(fields[sys.layout.slot_of(1)].p, V3::zero());
    }
}
