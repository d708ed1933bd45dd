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

//! The built-in water cluster scenario.

use crate::FailResult;

use mpole_array_types::{V3, M33, mat};
use mpole_electrostatics::{AxisType, CovalentMaps, ForceParameters, MultipoleParticle};
use mpole_tasks_config as config;

const OXYGEN_MASS: f64 = 15.999;
const HYDROGEN_MASS: f64 = 1.008;
const OXYGEN_POLARIZABILITY: f64 = 0.000837;
const HYDROGEN_POLARIZABILITY: f64 = 0.000496;
const THOLE: f64 = 0.39;

/// A cluster of rigid waters, as `O H H` triples in caller order.
#[derive(Debug, Clone)]
pub struct WaterCluster {
    pub force: ForceParameters,
    pub positions: Vec<V3>,
    pub masses: Vec<f64>,
}

impl WaterCluster {
    pub fn num_molecules(&self) -> usize
    { self.positions.len() / 3 }
}

// Local-frame moments of an AMOEBA-style water, in e, e nm, e nm^2.
fn oxygen(first: usize) -> MultipoleParticle {
    MultipoleParticle {
        charge: -0.51966,
        dipole: V3([0.0, 0.0, 0.00755]),
        quadrupole: mat([
            [0.000354, 0.0, 0.0],
            [0.0, -0.000390, 0.0],
            [0.0, 0.0, 0.000036],
        ]),
        axis_type: AxisType::Bisector,
        axis_z: Some(first + 1),
        axis_x: Some(first + 2),
        axis_y: None,
        thole: THOLE,
        damping_factor: OXYGEN_POLARIZABILITY.powf(1.0 / 6.0),
        polarizability: OXYGEN_POLARIZABILITY,
    }
}

fn hydrogen(oxygen: usize, other: usize) -> MultipoleParticle {
    MultipoleParticle {
        charge: 0.25983,
        dipole: V3([-0.00204, 0.0, -0.00310]),
        quadrupole: mat([
            [-0.000030, 0.0, 0.0],
            [0.0, -0.000020, 0.0],
            [0.0, 0.0, 0.000050],
        ]),
        axis_type: AxisType::ZThenX,
        axis_z: Some(oxygen),
        axis_x: Some(other),
        axis_y: None,
        thole: THOLE,
        damping_factor: HYDROGEN_POLARIZABILITY.powf(1.0 / 6.0),
        polarizability: HYDROGEN_POLARIZABILITY,
    }
}

fn rotation(a: f64, b: f64) -> M33 {
    let (ca, sa, cb, sb) = (a.cos(), a.sin(), b.cos(), b.sin());
    let rz = mat([[ca, -sa, 0.0], [sa, ca, 0.0], [0.0, 0.0, 1.0]]);
    let rx = mat([[1.0, 0.0, 0.0], [0.0, cb, -sb], [0.0, sb, cb]]);
    rz * rx
}

/// Place waters on a cubic lattice, each in a different orientation.
///
/// The geometry is deterministic, so results can be compared between runs.
pub fn build_water_cluster(settings: &config::WaterCluster) -> FailResult<WaterCluster> {
    let count = settings.molecules;
    if count == 0 {
        bail!("a water cluster needs at least one molecule");
    }
    let geometry = [V3([0.0, 0.0, 0.0]), V3([0.0757, 0.0586, 0.0]), V3([-0.0757, 0.0586, 0.0])];
    let mut side = 1;
    while side * side * side < count {
        side += 1;
    }

    let mut particles = Vec::with_capacity(3 * count);
    let mut positions = Vec::with_capacity(3 * count);
    let mut masses = Vec::with_capacity(3 * count);
    let mut bonds = vec![];
    let mut groups = vec![];
    for w in 0..count {
        let first = 3 * w;
        particles.extend(vec![oxygen(first), hydrogen(first, first + 2), hydrogen(first, first + 1)]);
        masses.extend(vec![OXYGEN_MASS, HYDROGEN_MASS, HYDROGEN_MASS]);
        bonds.push((first, first + 1));
        bonds.push((first, first + 2));
        groups.extend(vec![w; 3]);

        let cell = V3([(w % side) as f64, (w / side % side) as f64, (w / side / side) as f64]);
        let center = cell * settings.spacing;
        let rot = rotation(1.3 * w as f64 + 0.2, 0.7 * w as f64 - 0.4);
        positions.extend(geometry.iter().map(|&r| rot * r + center));
    }

    let covalent = CovalentMaps::from_bonds(3 * count, &bonds, &groups)?;
    trace!("built {} waters on a {}x{}x{} lattice", count, side, side, side);
    Ok(WaterCluster { force: ForceParameters { particles, covalent }, positions, masses })
}
