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


//! Three dimensional complex FFTs, done one axis at a time.

use std::fmt;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner};
use rustfft::num_complex::Complex;

/// Forward and inverse plans for a grid stored with z fastest.
///
/// Neither direction normalizes.
pub(crate) struct Fft3 {
    dims: [usize; 3],
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
}

impl fmt::Debug for Fft3 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    { f.debug_struct("Fft3").field("dims", &self.dims).finish() }
}

impl Fft3 {
    pub fn new(dims: [usize; 3]) -> Self {
        let mut planner = FftPlanner::new();
        let [nx, ny, nz] = dims;
        let forward = [
            planner.plan_fft_forward(nx),
            planner.plan_fft_forward(ny),
            planner.plan_fft_forward(nz),
        ];
        let inverse = [
            planner.plan_fft_inverse(nx),
            planner.plan_fft_inverse(ny),
            planner.plan_fft_inverse(nz),
        ];
        Fft3 { dims, forward, inverse }
    }

    pub fn len(&self) -> usize
    { self.dims.iter().product() }

    pub fn forward(&self, data: &mut [Complex<f64>])
    { self.transform(data, &self.forward) }

    pub fn inverse(&self, data: &mut [Complex<f64>])
    { self.transform(data, &self.inverse) }

    fn transform(&self, data: &mut [Complex<f64>], plans: &[Arc<dyn Fft<f64>>; 3]) {
        assert_eq!(data.len(), self.len());
        let [nx, ny, nz] = self.dims;

        // z lines are contiguous, and rustfft handles a batch of them at once
        plans[2].process(data);

        let mut line = vec![Complex::new(0.0, 0.0); ny];
        for x in 0..nx {
            for z in 0..nz {
                let index = |y: usize| (x * ny + y) * nz + z;
                for y in 0..ny {
                    line[y] = data[index(y)];
                }
                plans[1].process(&mut line);
                for y in 0..ny {
                    data[index(y)] = line[y];
                }
            }
        }

        let mut line = vec![Complex::new(0.0, 0.0); nx];
        let stride = ny * nz;
        for yz in 0..stride {
            for x in 0..nx {
                line[x] = data[x * stride + yz];
            }
            plans[0].process(&mut line);
            for x in 0..nx {
                data[x * stride + yz] = line[x];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn matches_naive_dft() {
        let dims = [3, 4, 5];
        let fft = Fft3::new(dims);
        let input: Vec<_> = (0..fft.len()).map(|_| Complex::new(::rand::random::<f64>(), 0.0)).collect();
        let mut data = input.clone();
        fft.forward(&mut data);

        let [nx, ny, nz] = dims;
        for &(mx, my, mz) in &[(0, 0, 0), (1, 2, 3), (2, 3, 1)] {
            let mut expected = Complex::new(0.0, 0.0);
            for x in 0..nx {
                for y in 0..ny {
                    for z in 0..nz {
                        let phase = -2.0 * PI * (
                            (mx * x) as f64 / nx as f64
                            + (my * y) as f64 / ny as f64
                            + (mz * z) as f64 / nz as f64
                        );
                        expected += input[(x * ny + y) * nz + z] * Complex::new(phase.cos(), phase.sin());
                    }
                }
            }
            let actual = data[(mx * ny + my) * nz + mz];
            assert_close!(abs=1e-10, [actual.re, actual.im], [expected.re, expected.im]);
        }

        // unnormalized round trip
        fft.inverse(&mut data);
        let n = fft.len() as f64;
        for (a, b) in data.iter().zip(&input) {
            assert_close!(abs=1e-12, a.re / n, b.re);
            assert_close!(abs=1e-12, a.im / n, 0.0);
        }
    }
}
