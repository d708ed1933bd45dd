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

//! Cartesian derivative tensors of radial kernels, and their contraction
//! with multipoles.
//!
//! A kernel `f(r)` is described by the values `g_s = (r^-1 d/dr)^s f`.
//! Since `d/dR_a g_s = R_a g_{s+1}`, every Cartesian derivative of `f` can be
//! built from these values by the recurrence
//!
//! ```text
//! T(n, s)[a, rest] = R_a T(n-1, s+1)[rest] + sum_{k: rest[k] == a} T(n-2, s+1)[rest without k]
//! ```
//!
//! with `T(0, s) = g_s`.  `T(n, 0)` is the n-th derivative of `f`.
//!
//! Tensors are stored flat, with indices as base-3 numbers whose first index is
//! the most significant digit.

use mpole_array_types::{V3, M33, M3};

pub(crate) const MAX_ORDER: usize = 5;

const POW3: [usize; MAX_ORDER + 1] = [1, 3, 9, 27, 81, 243];
// T(n, s) for s in 0..=(MAX_ORDER - n) is stored at LEVEL_BASE[n] + s * 3^n.
const LEVEL_BASE: [usize; MAX_ORDER + 1] = [0, 6, 21, 57, 138, 300];
const TABLE_LEN: usize = 543;

#[inline(always)]
fn table_index(n: usize, s: usize) -> usize
{ LEVEL_BASE[n] + s * POW3[n] }

/// Radial kernel values `g_0 ..= g_5`.
pub(crate) type Radial = [f64; MAX_ORDER + 1];

/// Derivatives of a radial kernel at a displacement, up to some order.
pub(crate) struct Derivs {
    table: [f64; TABLE_LEN],
    order: usize,
}

impl Derivs {
    pub fn new(r: V3, g: &Radial, order: usize) -> Self {
        assert!(order <= MAX_ORDER);

        let mut table = [0.0; TABLE_LEN];
        for s in 0..=order {
            table[table_index(0, s)] = g[s];
        }
        for n in 1..=order {
            for s in 0..=(order - n) {
                let one_lower = table_index(n - 1, s + 1);
                let two_lower = if n >= 2 { table_index(n - 2, s + 1) } else { 0 };
                let dest = table_index(n, s);

                for flat in 0..POW3[n] {
                    let a = flat / POW3[n - 1];
                    let rest = flat % POW3[n - 1];
                    let mut value = r[a] * table[one_lower + rest];
                    for pos in 0..(n - 1) {
                        let place = POW3[n - 2 - pos];
                        if rest / place % 3 == a {
                            let removed = rest / (3 * place) * place + rest % place;
                            value += table[two_lower + removed];
                        }
                    }
                    table[dest + flat] = value;
                }
            }
        }
        Derivs { table, order }
    }

    /// The full n-th derivative tensor.
    #[inline]
    pub fn tensor(&self, n: usize) -> &[f64] {
        debug_assert!(n <= self.order);
        let start = table_index(n, 0);
        &self.table[start..start + POW3[n]]
    }

    pub fn order(&self) -> usize
    { self.order }
}

//------------------------------------------------------------------------------

/// Charge, dipole and traceless quadrupole at a point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Multipole {
    pub q: f64,
    pub mu: V3,
    pub quad: M33,
}

impl Multipole {
    pub fn zero() -> Self
    { Multipole { q: 0.0, mu: V3::zero(), quad: M33::zero() } }

    pub fn dipole(mu: V3) -> Self
    { Multipole { mu, ..Multipole::zero() } }

    /// Highest moment present, for choosing derivative orders.
    pub fn rank(&self) -> usize {
        if self.quad != M33::zero() { 2 }
        else if self.mu != V3::zero() { 1 }
        else { 0 }
    }

    fn component(&self, l: usize) -> &[f64] {
        match l {
            0 => std::slice::from_ref(&self.q),
            1 => &self.mu.0,
            2 => slice_of_array::SliceFlatExt::flat(&self.quad.0[..]),
            _ => unreachable!(),
        }
    }

    /// `q phi + mu . grad phi + Q : grad grad phi`
    pub fn energy_in(&self, pot: &Potential) -> f64 {
        self.q * pot.phi
            + self.mu.dot(&pot.grad)
            + self.quad.ddot(&pot.hess)
    }

    /// Force on this multipole in an external potential.
    pub fn force_in(&self, pot: &Potential) -> V3 {
        let mut grad = pot.grad * self.q + pot.hess * self.mu;
        if self.rank() == 2 {
            grad += V3::from_fn(|c| {
                let mut sum = 0.0;
                for a in 0..3 {
                    for b in 0..3 {
                        sum += self.quad[a][b] * pot.third[9 * a + 3 * b + c];
                    }
                }
                sum
            });
        }
        -grad
    }

    /// Torque on this multipole in an external potential.
    pub fn torque_in(&self, pot: &Potential) -> V3 {
        let qg = self.quad * pot.hess;
        let v = V3([
            2.0 * (qg[1][2] - qg[2][1]),
            2.0 * (qg[2][0] - qg[0][2]),
            2.0 * (qg[0][1] - qg[1][0]),
        ]);
        -self.mu.cross(&pot.grad) - v
    }
}

/// A potential and its first three derivatives at one point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Potential {
    pub phi: f64,
    pub grad: V3,
    pub hess: M33,
    pub third: [f64; 27],
}

impl Potential {
    pub fn zero() -> Self
    { Potential { phi: 0.0, grad: V3::zero(), hess: M33::zero(), third: [0.0; 27] } }

    /// Electric field `-grad phi`.
    pub fn field(&self) -> V3
    { -self.grad }

    pub fn add_scaled(&mut self, scale: f64, other: &Potential) {
        self.phi += scale * other.phi;
        self.grad += other.grad * scale;
        self.hess += other.hess * scale;
        for (a, b) in self.third.iter_mut().zip(&other.third[..]) {
            *a += scale * b;
        }
    }
}

/// Which end of the displacement `R = r_target - r_source` the multipole sits at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Direction {
    /// The source is at the start of `R` and the potential is wanted at the end.
    Forward,
    /// The source is at the end of `R` and the potential is wanted at the start.
    Reverse,
}

/// Potential of `source` and its derivatives up to `max_deriv`.
///
/// `derivs` must have order of at least `source rank + max_deriv`.
pub(crate) fn potential(source: &Multipole, derivs: &Derivs, dir: Direction, max_deriv: usize) -> Potential {
    let rank = source.rank();
    debug_assert!(rank + max_deriv <= derivs.order());

    let mut out = [[0.0; 27]; 4];
    for k in 0..=max_deriv {
        for l in 0..=rank {
            // phi = q T0 - mu.T1 + Q:T2, and T(-R) = (-1)^n T(R)
            let sign = match dir {
                Direction::Forward => if l == 1 { -1.0 } else { 1.0 },
                Direction::Reverse => if k % 2 == 1 { -1.0 } else { 1.0 },
            };
            let moment = source.component(l);
            let tensor = derivs.tensor(l + k);
            for (lead, &m) in moment.iter().enumerate() {
                if m == 0.0 {
                    continue;
                }
                let chunk = &tensor[lead * POW3[k]..(lead + 1) * POW3[k]];
                for (o, &t) in out[k].iter_mut().zip(chunk) {
                    *o += sign * m * t;
                }
            }
        }
    }

    let [o0, o1, o2, o3] = out;
    Potential {
        phi: o0[0],
        grad: V3([o1[0], o1[1], o1[2]]),
        hess: M3([
            V3([o2[0], o2[1], o2[2]]),
            V3([o2[3], o2[4], o2[5]]),
            V3([o2[6], o2[7], o2[8]]),
        ]),
        third: o3,
    }
}
