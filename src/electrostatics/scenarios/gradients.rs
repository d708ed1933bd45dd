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

use mpole_array_types::V3;
use mpole_numerical::try_gradient_v3;

use super::*;
use crate::{Method, TileLayout};

#[test]
fn forces_are_energy_gradients() {
    let cluster = water_cluster(3);
    for &polarization in &ALL_POLARIZATION {
        // an unconverged residual shows up directly in the mutual gradient
        let options = Options { mutual_epsilon: 1e-12, ..tight_options(polarization) };
        let mut ctx = context(&cluster, options, None);
        let (_, forces) = evaluate(&mut ctx);

        let grad = try_gradient_v3(1e-5, None, &cluster.positions, |positions| {
            ctx.set_positions(positions)?;
            let mut acc = Accumulator::new(positions.len());
            ctx.execute(&mut acc, false, true)
        }).unwrap();

        for (atom, (force, grad)) in forces.iter().zip(&grad).enumerate() {
            assert_close!(rel=1e-4, abs=1e-3, *force, -*grad, "{:?} polarization, atom {}", polarization, atom);
        }
    }
}

#[test]
fn net_force_vanishes() {
    let cluster = water_cluster(4);
    for &polarization in &ALL_POLARIZATION {
        let mut ctx = context(&cluster, tight_options(polarization), None);
        let (_, forces) = evaluate(&mut ctx);
        let total = forces.iter().fold(V3::zero(), |acc, &f| acc + f);
        assert_close!(abs=1e-6, total, V3::zero(), "{:?} polarization", polarization);
    }
}

#[test]
fn translation_invariance() {
    let cluster = water_cluster(3);
    let mut shifted = cluster.clone();
    for r in &mut shifted.positions {
        *r += V3([1.3, -0.7, 2.1]);
    }
    for &polarization in &ALL_POLARIZATION {
        let (energy, forces) = evaluate(&mut context(&cluster, tight_options(polarization), None));
        let (energy_2, forces_2) = evaluate(&mut context(&shifted, tight_options(polarization), None));
        assert_close!(rel=1e-8, energy, energy_2);
        assert_close!(rel=1e-6, abs=1e-6, forces, forces_2);
    }
}

#[test]
fn rotation_invariance() {
    let cluster = water_cluster(2);
    let rot = rotation(0.9, -1.7);
    let mut rotated = cluster.clone();
    for r in &mut rotated.positions {
        *r = rot * *r;
    }
    for &polarization in &ALL_POLARIZATION {
        let (energy, forces) = evaluate(&mut context(&cluster, tight_options(polarization), None));
        let (energy_2, forces_2) = evaluate(&mut context(&rotated, tight_options(polarization), None));
        let expected: Vec<_> = forces.iter().map(|&f| rot * f).collect();
        assert_close!(rel=1e-8, energy, energy_2, "{:?} polarization", polarization);
        assert_close!(rel=1e-6, abs=1e-6, forces_2, expected, "{:?} polarization", polarization);
    }
}

#[test]
fn particle_order_does_not_matter() {
    // more than one tile, so that off-diagonal tiles hold exclusions
    let cluster = water_cluster(14);
    let n = cluster.positions.len();
    let options = tight_options(PolarizationType::Mutual);

    let (energy, forces) = evaluate(&mut context(&cluster, options.clone(), None));

    let reversed = TileLayout::new(&cluster.force.covalent);
    let num_tiles = reversed.num_tiles();
    let pairs: Vec<_> = (0..num_tiles).flat_map(|x| (0..=x).map(move |y| (x, y))).collect();
    let layout = TileLayout::from_parts((0..n).rev().collect(), pairs.clone(), pairs).unwrap();
    let mut ctx = Context::new(&cluster.force, options, layout, None).unwrap();
    ctx.set_positions(&cluster.positions).unwrap();
    let (energy_2, forces_2) = evaluate(&mut ctx);

    assert_close!(rel=1e-9, energy, energy_2);
    assert_close!(rel=1e-6, abs=1e-6, forces, forces_2);
}

#[test]
fn large_cutoff_matches_no_cutoff() {
    let cluster = water_cluster(3);
    let options = tight_options(PolarizationType::Mutual);
    let (energy, forces) = evaluate(&mut context(&cluster, options.clone(), None));

    let options = Options { method: Method::CutoffNonPeriodic, cutoff: 5.0, ..options };
    let (energy_2, forces_2) = evaluate(&mut context(&cluster, options, None));
    assert_close!(rel=1e-12, energy, energy_2);
    assert_close!(rel=1e-9, abs=1e-9, forces, forces_2);
}

#[test]
fn threading_does_not_change_results() {
    let cluster = water_cluster(5);
    let options = tight_options(PolarizationType::Mutual);
    let (energy, forces) = evaluate(&mut context(&cluster, Options { use_rayon: true, ..options.clone() }, None));
    let (energy_2, forces_2) = evaluate(&mut context(&cluster, Options { use_rayon: false, ..options }, None));
    assert_close!(rel=1e-12, energy, energy_2);
    assert_close!(rel=1e-9, abs=1e-9, forces, forces_2);
}

#[test]
fn energy_only_and_forces_only() {
    let cluster = water_cluster(2);
    let mut ctx = context(&cluster, tight_options(PolarizationType::Direct), None);
    let (energy, forces) = evaluate(&mut ctx);

    let mut acc = Accumulator::new(cluster.positions.len());
    assert_eq!(ctx.execute(&mut acc, true, false).unwrap(), 0.0);
    assert_eq!(acc.energy(), 0.0);
    assert_close!(abs=1e-9, acc.forces(), forces);

    let mut acc = Accumulator::new(cluster.positions.len());
    assert_close!(ctx.execute(&mut acc, false, true).unwrap(), energy);
    assert_eq!(acc.forces(), vec![V3::zero(); cluster.positions.len()]);
}
