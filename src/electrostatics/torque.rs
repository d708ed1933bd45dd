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

//! Conversion of torques on multipoles into forces on their axis atoms.

use mpole_array_types::V3;

use crate::frame::build_frame;
use crate::params::{AxisType, ParticleRecord};

/// Forces equivalent to the torque on the multipole in `slot`.
///
/// The output holds `(slot, force)` pairs, for the particle and each of its axis
/// atoms.  They sum to zero.
pub(crate) fn torque_to_forces(
    record: &ParticleRecord,
    slot: usize,
    positions: &[V3],
    torque: V3,
) -> Vec<(usize, V3)> {
    let frame = match build_frame(record, slot, positions) {
        Some(frame) => frame,
        None => return vec![],
    };
    if torque == V3::zero() {
        return vec![];
    }

    let (tx, ty, tz) = (torque.dot(&frame.x), torque.dot(&frame.y), torque.dot(&frame.z));
    let zn = frame.zraw.norm();
    let wn = frame.w().norm();

    // dE/d(zraw) and dE/d(xraw), for an energy whose rotational derivative is -torque
    let g_zraw = (frame.y * tx - frame.x * ty) / zn
        + frame.y * (tz * frame.xraw.dot(&frame.z) / (zn * wn));
    let g_xraw = match frame.xraw_is_fixed {
        true => V3::zero(),
        false => frame.y * (-tz / wn),
    };

    let [az, ax, ay] = record.axis;
    let mut grads: Vec<(usize, V3)> = vec![];
    match (record.axis_type, az, ax, ay) {
        (AxisType::ZThenX, Some(z), Some(x), _) => {
            grads.push((z, g_zraw));
            grads.push((x, g_xraw));
        },
        (AxisType::ZOnly, Some(z), _, _) => {
            grads.push((z, g_zraw));
        },
        (AxisType::Bisector, Some(z), Some(x), _) => {
            grads.push(pull_back_unit(positions, slot, z, g_zraw));
            grads.push(pull_back_unit(positions, slot, x, g_zraw + g_xraw));
        },
        (AxisType::ZBisect, Some(z), Some(x), Some(y)) => {
            grads.push(pull_back_unit(positions, slot, z, g_zraw));
            grads.push(pull_back_unit(positions, slot, x, g_xraw));
            grads.push(pull_back_unit(positions, slot, y, g_xraw));
        },
        (AxisType::ThreeFold, Some(z), Some(x), Some(y)) => {
            grads.push(pull_back_unit(positions, slot, z, g_zraw));
            grads.push(pull_back_unit(positions, slot, x, g_zraw + g_xraw));
            grads.push(pull_back_unit(positions, slot, y, g_zraw));
        },
        _ => return vec![],
    }

    let own: V3 = grads.iter().map(|&(_, g)| g).sum();
    let mut forces: Vec<_> = grads.into_iter().map(|(atom, g)| (atom, -g)).collect();
    forces.push((slot, own));
    forces
}

/// Gradient with respect to the axis atom position, given the gradient with
/// respect to the unit vector pointing at it.
fn pull_back_unit(positions: &[V3], slot: usize, other: usize, g_unit: V3) -> (usize, V3) {
    let v = positions[other] - positions[slot];
    let norm = v.norm();
    let u = v / norm;
    (other, g_unit.perp_unit(&u) / norm)
}
