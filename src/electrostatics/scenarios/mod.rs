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

//! Whole-context tests on small water clusters.

use mpole_array_types::{V3, M33, mat};
use mpole_structure::CovalentMaps;

use crate::{
    Accumulator, AxisType, Context, ForceParameters, MultipoleParticle,
    Options, PolarizationType, TileLayout,
};

mod gradients;
mod periodic;
mod parameters;

/// Particles and their coordinates, in caller order.
#[derive(Debug, Clone)]
pub(crate) struct Cluster {
    pub force: ForceParameters,
    pub positions: Vec<V3>,
}

const OXYGEN_POLARIZABILITY: f64 = 0.000837;
const HYDROGEN_POLARIZABILITY: f64 = 0.000496;

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
        thole: 0.39,
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
        thole: 0.39,
        damping_factor: HYDROGEN_POLARIZABILITY.powf(1.0 / 6.0),
        polarizability: HYDROGEN_POLARIZABILITY,
    }
}

pub(crate) fn rotation(a: f64, b: f64) -> M33 {
    let rz = mat([
        [a.cos(), -a.sin(), 0.0],
        [a.sin(), a.cos(), 0.0],
        [0.0, 0.0, 1.0],
    ]);
    let rx = mat([
        [1.0, 0.0, 0.0],
        [0.0, b.cos(), -b.sin()],
        [0.0, b.sin(), b.cos()],
    ]);
    rz * rx
}

/// `count` waters on a cubic lattice of spacing 0.3 nm, each turned a different way.
pub(crate) fn water_cluster(count: usize) -> Cluster {
    let geometry = [V3([0.0, 0.0, 0.0]), V3([0.0757, 0.0586, 0.0]), V3([-0.0757, 0.0586, 0.0])];
    let side = (1..).find(|n| n * n * n >= count).unwrap_or(1);

    let mut particles = vec![];
    let mut positions = vec![];
    let mut bonds = vec![];
    let mut groups = vec![];
    for w in 0..count {
        let first = 3 * w;
        particles.push(oxygen(first));
        particles.push(hydrogen(first, first + 2));
        particles.push(hydrogen(first, first + 1));
        bonds.push((first, first + 1));
        bonds.push((first, first + 2));
        groups.extend(vec![w; 3]);

        let cell = V3([(w % side) as f64, (w / side % side) as f64, (w / side / side) as f64]);
        let jitter = V3([0.013, -0.021, 0.008]) * (w as f64 % 3.0);
        let center = cell * 0.3 + jitter;
        let rot = rotation(1.3 * w as f64 + 0.2, 0.7 * w as f64 - 0.4);
        positions.extend(geometry.iter().map(|&r| rot * r + center));
    }

    let covalent = CovalentMaps::from_bonds(3 * count, &bonds, &groups).unwrap();
    Cluster { force: ForceParameters { particles, covalent }, positions }
}

/// Options with a tight convergence threshold, so that forces match the energy.
pub(crate) fn tight_options(polarization: PolarizationType) -> Options {
    Options {
        polarization,
        mutual_epsilon: 1e-9,
        max_iterations: 200,
        ..Options::default()
    }
}

pub(crate) fn context(cluster: &Cluster, options: Options, box_vectors: Option<[V3; 3]>) -> Context {
    let layout = TileLayout::new(&cluster.force.covalent);
    let mut ctx = Context::new(&cluster.force, options, layout, box_vectors).unwrap();
    ctx.set_positions(&cluster.positions).unwrap();
    ctx
}

/// Energy and forces.
pub(crate) fn evaluate(ctx: &mut Context) -> (f64, Vec<V3>) {
    let mut acc = Accumulator::new(ctx.num_particles());
    let energy = ctx.execute(&mut acc, true, true).unwrap();
    assert_eq!(energy, acc.energy());
    (energy, acc.forces())
}

pub(crate) const ALL_POLARIZATION: [PolarizationType; 3] = [
    PolarizationType::None,
    PolarizationType::Direct,
    PolarizationType::Mutual,
];
