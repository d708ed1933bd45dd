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

const FIXED_POINT_SCALE: f64 = 4294967296.0; // 2^32

/// Shared force and energy accumulator owned by the host.
///
/// Forces are stored in 32.32 fixed point, so that their totals do not depend
/// on the order in which contributions arrive.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    forces: Vec<[i64; 3]>,
    energy: f64,
}

impl Accumulator {
    pub fn new(num_particles: usize) -> Self
    { Accumulator { forces: vec![[0; 3]; num_particles], energy: 0.0 } }

    pub fn num_particles(&self) -> usize
    { self.forces.len() }

    pub fn add_force(&mut self, particle: usize, force: V3) {
        for k in 0..3 {
            let fixed = (force[k] * FIXED_POINT_SCALE).round() as i64;
            self.forces[particle][k] = self.forces[particle][k].wrapping_add(fixed);
        }
    }

    pub fn add_energy(&mut self, energy: f64)
    { self.energy += energy; }

    pub fn energy(&self) -> f64
    { self.energy }

    pub fn force(&self, particle: usize) -> V3
    { V3::from_fn(|k| self.forces[particle][k] as f64 / FIXED_POINT_SCALE) }

    pub fn forces(&self) -> Vec<V3>
    { (0..self.num_particles()).map(|i| self.force(i)).collect() }

    pub fn clear(&mut self) {
        for f in &mut self.forces {
            *f = [0; 3];
        }
        self.energy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_independent() {
        let contributions = [
            V3([1e3, -2.5e-7, 0.1]),
            V3([-1e3, 3.3e-7, 0.2]),
            V3([0.3333333333, 1e-9, -0.3]),
        ];
        let mut a = Accumulator::new(1);
        let mut b = Accumulator::new(1);
        for f in &contributions {
            a.add_force(0, *f);
        }
        for f in contributions.iter().rev() {
            b.add_force(0, *f);
        }
        assert_eq!(a, b);
        assert_close!(abs=1e-9, a.force(0), V3([0.3333333333, 8e-8 + 1e-9, 0.0]));

        a.add_energy(2.0);
        a.clear();
        assert_eq!(a, Accumulator::new(1));
    }
}
