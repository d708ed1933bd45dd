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


use mpole_array_types::{V3, M33};
use mpole_structure::CovalentMaps;

use super::*;
use crate::consts::DIPOLE_TO_DEBYE;
use crate::{ConfigError, TopologyChangedError, UnsupportedToggleError};

fn without_polarizability(cluster: &Cluster) -> Cluster {
    let mut cluster = cluster.clone();
    for p in &mut cluster.force.particles {
        p.polarizability = 0.0;
    }
    cluster
}

#[test]
fn zero_polarizability_is_permanent_only() {
    let cluster = without_polarizability(&water_cluster(3));
    let (energy, forces) = evaluate(&mut context(&cluster, tight_options(PolarizationType::None), None));

    let mut ctx = context(&cluster, tight_options(PolarizationType::Mutual), None);
    let (energy_2, forces_2) = evaluate(&mut ctx);
    let report = ctx.solve_report().unwrap();
    assert!(report.converged);
    assert_eq!(report.iterations, 1);
    assert_eq!(ctx.induced_dipoles().unwrap(), vec![V3::zero(); 9]);

    assert_close!(rel=1e-12, energy, energy_2);
    assert_close!(abs=1e-9, forces, forces_2);
}

#[test]
fn mutual_dipoles_converge() {
    let cluster = water_cluster(4);
    let mut ctx = context(&cluster, tight_options(PolarizationType::Mutual), None);
    assert_eq!(ctx.solve_report(), None);

    let induced = ctx.induced_dipoles().unwrap();
    let report = ctx.solve_report().unwrap();
    assert!(report.converged);
    assert!(report.iterations > 1);
    assert!(report.residual < 1e-9);
    assert!(induced.iter().all(|mu| mu.norm() > 0.0));

    // direct dipoles are the first guess, so they differ
    let direct = context(&cluster, tight_options(PolarizationType::Direct), None).induced_dipoles().unwrap();
    assert_ne!(direct, induced);
}

#[test]
fn unconverged_dipoles_are_still_used() {
    let cluster = water_cluster(4);
    let options = Options { max_iterations: 2, ..tight_options(PolarizationType::Mutual) };
    let mut ctx = context(&cluster, options, None);
    let (energy, _) = evaluate(&mut ctx);
    let report = ctx.solve_report().unwrap();
    assert!(!report.converged);
    assert_eq!(report.iterations, 2);
    assert!(energy.is_finite());
}

#[test]
fn results_are_cached_until_positions_change() {
    let cluster = water_cluster(2);
    let mut ctx = context(&cluster, tight_options(PolarizationType::Mutual), None);
    let first = ctx.induced_dipoles().unwrap();
    assert_eq!(ctx.induced_dipoles().unwrap(), first);

    let mut moved = cluster.positions.clone();
    moved[0] += V3([0.01, 0.0, 0.0]);
    ctx.set_positions(&moved).unwrap();
    assert_ne!(ctx.induced_dipoles().unwrap(), first);
}

#[test]
fn update_parameters() {
    let cluster = water_cluster(3);
    let options = tight_options(PolarizationType::Mutual);
    let mut ctx = context(&cluster, options.clone(), None);
    let (energy, _) = evaluate(&mut ctx);

    // same values, same answer
    ctx.update_parameters(&cluster.force).unwrap();
    let (energy_2, _) = evaluate(&mut ctx);
    assert_close!(rel=1e-12, energy, energy_2);

    // new values agree with a freshly built context
    let mut changed = cluster.clone();
    for p in &mut changed.force.particles {
        p.charge *= 0.9;
        p.polarizability *= 1.1;
    }
    ctx.update_parameters(&changed.force).unwrap();
    let (energy_3, forces_3) = evaluate(&mut ctx);
    let (energy_ref, forces_ref) = evaluate(&mut context(&changed, options, None));
    assert_close!(rel=1e-9, energy_3, energy_ref);
    assert_close!(rel=1e-6, abs=1e-6, forces_3, forces_ref);
    assert!((energy_3 - energy).abs() > 1e-3);
}

#[test]
fn update_parameters_rejects_fixed_quantities() {
    let cluster = water_cluster(2);
    let mut ctx = context(&cluster, tight_options(PolarizationType::Direct), None);
    let (energy, _) = evaluate(&mut ctx);

    let mut fewer = cluster.force.clone();
    fewer.particles.pop();
    let err = ctx.update_parameters(&fewer).unwrap_err();
    assert!(err.downcast_ref::<ConfigError>().is_some());

    let mut rebonded = cluster.force.clone();
    rebonded.covalent = CovalentMaps::unbonded(6);
    let err = ctx.update_parameters(&rebonded).unwrap_err();
    assert!(err.downcast_ref::<TopologyChangedError>().is_some());

    // nothing changed
    let (energy_2, _) = evaluate(&mut ctx);
    assert_close!(rel=1e-12, energy, energy_2);
}

#[test]
fn quadrupoles_cannot_be_enabled_later() {
    let mut cluster = water_cluster(2);
    for p in &mut cluster.force.particles {
        p.quadrupole = M33::zero();
    }
    let mut ctx = context(&cluster, tight_options(PolarizationType::None), None);

    let mut with_quads = cluster.force.clone();
    with_quads.particles[0].quadrupole[0][0] = 1e-4;
    with_quads.particles[0].quadrupole[1][1] = -1e-4;
    let err = ctx.update_parameters(&with_quads).unwrap_err();
    assert!(err.downcast_ref::<UnsupportedToggleError>().is_some());
}

#[test]
fn evaluation_needs_positions() {
    let cluster = water_cluster(1);
    let layout = TileLayout::new(&cluster.force.covalent);
    let mut ctx = Context::new(&cluster.force, Options::default(), layout, None).unwrap();
    let mut acc = Accumulator::new(3);
    assert!(ctx.execute(&mut acc, true, true).is_err());
    assert!(ctx.induced_dipoles().is_err());

    assert!(ctx.set_positions(&cluster.positions[..2]).is_err());
    ctx.set_positions(&cluster.positions).unwrap();
    assert!(ctx.execute(&mut Accumulator::new(4), true, true).is_err());
    assert!(ctx.execute(&mut acc, true, true).is_ok());
}

#[test]
fn point_charge_moments() {
    let mut cluster = water_cluster(2);
    for p in &mut cluster.force.particles {
        let charge = p.charge;
        *p = MultipoleParticle::charge(charge);
    }
    let masses: Vec<f64> = (0..6).map(|i| if i % 3 == 0 { 15.999 } else { 1.008 }).collect();
    let mut ctx = context(&cluster, tight_options(PolarizationType::None), None);
    let moments = ctx.system_multipole_moments(&masses).unwrap();

    // neutral, so the dipole does not depend on the origin
    let dipole = cluster.positions.iter().zip(&cluster.force.particles)
        .fold(V3::zero(), |acc, (&r, p)| acc + r * p.charge);
    assert_close!(abs=1e-12, moments[0], 0.0);
    for k in 0..3 {
        assert_close!(rel=1e-9, abs=1e-12, moments[1 + k], dipole[k] * DIPOLE_TO_DEBYE);
    }
    // traceless
    assert_close!(abs=1e-9, moments[4] + moments[8] + moments[12], 0.0);

    assert!(ctx.system_multipole_moments(&masses[..5]).is_err());
}

#[test]
fn induced_dipoles_add_to_the_moments() {
    let cluster = water_cluster(2);
    let masses = vec![1.0; 6];
    let permanent = context(&cluster, tight_options(PolarizationType::None), None)
        .system_multipole_moments(&masses).unwrap();

    let mut ctx = context(&cluster, tight_options(PolarizationType::Mutual), None);
    let total = ctx.system_multipole_moments(&masses).unwrap();
    let induced = ctx.induced_dipoles().unwrap().iter().fold(V3::zero(), |acc, &mu| acc + mu);
    for k in 0..3 {
        assert_close!(rel=1e-9, abs=1e-9, total[1 + k] - permanent[1 + k], induced[k] * DIPOLE_TO_DEBYE);
    }
}
