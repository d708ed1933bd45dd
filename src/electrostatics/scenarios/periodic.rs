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

use super::*;
use crate::{ConfigError, Method};

fn cubic_box(side: f64) -> [V3; 3] {
    [V3([side, 0.0, 0.0]), V3([0.0, side, 0.0]), V3([0.0, 0.0, side])]
}

fn pme_options(polarization: PolarizationType) -> Options {
    Options {
        method: Method::Pme,
        cutoff: 1.2,
        ewald_error_tolerance: 1e-4,
        ..tight_options(polarization)
    }
}

// In a box much larger than the cluster, the periodic images barely interact.
#[test]
fn pme_in_a_large_box_matches_no_cutoff() {
    let cluster = water_cluster(3);
    for &polarization in &ALL_POLARIZATION {
        let mut ctx = context(&cluster, pme_options(polarization), Some(cubic_box(5.0)));
        let (energy, forces) = evaluate(&mut ctx);
        let (energy_ref, forces_ref) = evaluate(&mut context(&cluster, tight_options(polarization), None));

        assert_close!(rel=1e-3, abs=0.05, energy, energy_ref, "{:?} polarization", polarization);
        for (atom, (f, f_ref)) in forces.iter().zip(&forces_ref).enumerate() {
            assert_close!(rel=1e-2, abs=0.5, *f, *f_ref, "{:?} polarization, atom {}", polarization, atom);
        }
    }
}

#[test]
fn pme_potential_matches_no_cutoff() {
    let cluster = water_cluster(3);
    let points = vec![V3([0.6, 0.1, 0.2]), V3([-0.3, 0.4, -0.5]), V3([0.15, 0.15, 0.7])];

    let mut ctx = context(&cluster, pme_options(PolarizationType::Mutual), Some(cubic_box(5.0)));
    let phi = ctx.electrostatic_potential(&points).unwrap();
    let mut ctx = context(&cluster, tight_options(PolarizationType::Mutual), None);
    let phi_ref = ctx.electrostatic_potential(&points).unwrap();
    assert_close!(abs=0.1, phi, phi_ref);
}

#[test]
fn pme_parameters_are_reported() {
    let cluster = water_cluster(1);
    let options = Options { pme_alpha: Some(3.0), pme_grid: Some([24, 25, 26]), ..pme_options(PolarizationType::None) };
    let ctx = context(&cluster, options, Some(cubic_box(3.0)));
    assert_eq!(ctx.pme_parameters(), Some((3.0, [24, 25, 26])));

    let ctx = context(&cluster, tight_options(PolarizationType::None), None);
    assert_eq!(ctx.pme_parameters(), None);
}

#[test]
fn periodic_methods_need_a_box() {
    let cluster = water_cluster(1);
    let layout = TileLayout::new(&cluster.force.covalent);
    let err = Context::new(&cluster.force, pme_options(PolarizationType::None), layout, None).unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());
}

#[test]
fn cutoff_must_fit_the_box() {
    let cluster = water_cluster(1);
    let layout = TileLayout::new(&cluster.force.covalent);
    let small = Some(cubic_box(2.0));
    let err = Context::new(&cluster.force, pme_options(PolarizationType::None), layout, small).unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());

    let mut ctx = context(&cluster, pme_options(PolarizationType::None), Some(cubic_box(3.0)));
    assert!(ctx.set_box_vectors(cubic_box(2.0)).is_err());
    assert!(ctx.set_box_vectors(cubic_box(4.0)).is_ok());
}

#[test]
fn minimum_image_across_the_boundary() {
    // a dimer straddling a face of the box interacts with its image the same as
    // the dimer assembled in the middle of the box
    let cluster = water_cluster(2);
    let side = 3.0;
    let options = Options {
        method: Method::CutoffPeriodic,
        cutoff: 1.0,
        ..tight_options(PolarizationType::Mutual)
    };

    let mut split = cluster.clone();
    for r in &mut split.positions[3..] {
        *r += V3([side, 0.0, 0.0]);
    }
    let (energy, forces) = evaluate(&mut context(&cluster, options.clone(), Some(cubic_box(side))));
    let (energy_2, forces_2) = evaluate(&mut context(&split, options, Some(cubic_box(side))));
    assert_close!(rel=1e-9, energy, energy_2);
    assert_close!(rel=1e-6, abs=1e-6, forces, forces_2);
}
