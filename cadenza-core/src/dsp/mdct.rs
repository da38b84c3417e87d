// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `mdct` module implements the Inverse Modified Discrete Cosine Transform
//! (IMDCT).
//!
//! The IMDCT is expressed in terms of a half-length complex forward FFT with
//! pre- and post-twiddling.

use std::sync::Arc;

use num_complex::Complex;

/// The Inverse Modified Discrete Cosine Transform (IMDCT).
///
/// Transforms N spectral coefficients into 2N time-domain samples.
pub struct Imdct {
    fft: Arc<dyn rustfft::Fft<f32>>,
    fft_scratch: Box<[Complex<f32>]>,
    scratch: Box<[Complex<f32>]>,
    twiddle: Box<[Complex<f32>]>,
}

impl Imdct {
    /// Instantiate an N-point IMDCT with an output scale factor.
    ///
    /// `n` is the number of spectral coefficients and must be a multiple of
    /// four; the half-length FFT itself may be any size.
    pub fn new_scaled(n: usize, scale: f64) -> Self {
        assert!(n % 4 == 0, "n must be a multiple of four");

        let n2 = n / 2;

        // Twiddle factors fold the N real inputs into N/2 complex values and
        // absorb the output scaling.
        let pi_n = std::f64::consts::PI / (n as f64);
        let sqrt_scale = scale.abs().sqrt();

        let mut twiddle = Vec::with_capacity(n2);

        for k in 0..n2 {
            let theta = pi_n * (1.0 / 8.0 + k as f64);
            let re = (sqrt_scale * theta.cos()) as f32;
            let im = (sqrt_scale * theta.sin()) as f32;
            twiddle.push(Complex::new(re, im));
        }

        let mut planner = rustfft::FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n2);

        let fft_scratch =
            vec![Complex::default(); fft.get_inplace_scratch_len()].into_boxed_slice();
        let scratch = vec![Complex::default(); n2].into_boxed_slice();

        Imdct { fft, fft_scratch, scratch, twiddle: twiddle.into_boxed_slice() }
    }

    /// Performs the N-point IMDCT.
    ///
    /// `spec` must hold exactly N coefficients and `out` exactly 2N samples.
    pub fn imdct(&mut self, spec: &[f32], out: &mut [f32]) {
        let n = self.fft.len() << 1;
        let n2 = n >> 1;
        let n4 = n >> 2;

        assert_eq!(spec.len(), n);
        assert_eq!(out.len(), 2 * n);

        // Pre-FFT twiddling: pack pairs of real inputs, taken from opposite
        // ends of the spectrum, into complex values.
        for (k, (t, &w)) in self.scratch.iter_mut().zip(self.twiddle.iter()).enumerate() {
            let even = spec[2 * k];
            let odd = -spec[n - 1 - 2 * k];

            t.re = odd * w.im - even * w.re;
            t.im = odd * w.re + even * w.im;
        }

        self.fft.process_with_scratch(&mut self.scratch, &mut self.fft_scratch);

        // The 2N output samples are assembled as four N/2-sample quarters.
        let (q0, rest) = out.split_at_mut(n2);
        let (q1, rest) = rest.split_at_mut(n2);
        let (q2, q3) = rest.split_at_mut(n2);

        // Post-FFT twiddling. The first half of the FFT output populates the
        // even slots of quarters 1 and 3 in forward order, and the odd slots
        // of quarters 0 and 2 in reverse order.
        for (k, (x, &w)) in self.scratch[..n4].iter().zip(self.twiddle[..n4].iter()).enumerate() {
            let val = w * x.conj();

            let fwd = 2 * k;
            let rev = n2 - 1 - 2 * k;

            q0[rev] = -val.im;
            q1[fwd] = val.im;
            q2[rev] = val.re;
            q3[fwd] = val.re;
        }

        // The second half populates the remaining slots.
        for (k, (x, &w)) in self.scratch[n4..].iter().zip(self.twiddle[n4..].iter()).enumerate() {
            let val = w * x.conj();

            let fwd = 2 * k;
            let rev = n2 - 1 - 2 * k;

            q0[fwd] = -val.re;
            q1[rev] = val.re;
            q2[fwd] = val.im;
            q3[rev] = val.im;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64;

    fn imdct_analytical(x: &[f32], y: &mut [f32], scale: f64) {
        assert!(y.len() == 2 * x.len());

        let n_in = x.len();
        let n_out = 2 * n_in;

        let pi_2n = f64::consts::PI / (2 * n_out) as f64;

        for (i, item) in y.iter_mut().enumerate() {
            let accum: f64 = x
                .iter()
                .copied()
                .map(f64::from)
                .enumerate()
                .map(|(j, xj)| xj * (pi_2n * ((2 * i + 1 + n_in) * (2 * j + 1)) as f64).cos())
                .sum();

            *item = (scale * accum) as f32;
        }
    }

    #[test]
    fn verify_imdct() {
        let spec: Vec<f32> = (1..=64).map(|i| i as f32).collect();

        let mut actual = [0f32; 128];
        let mut expected = [0f32; 128];

        let scale = 2.0f64 / 64.0;

        imdct_analytical(&spec, &mut expected, scale);

        let mut mdct = Imdct::new_scaled(64, scale);
        mdct.imdct(&spec, &mut actual);

        for i in 0..128 {
            let delta = f64::from(actual[i]) - f64::from(expected[i]);
            assert!(delta.abs() < 1e-4);
        }
    }

    #[test]
    fn verify_imdct_non_pow2() {
        // A multiple-of-four length that is not a power of two exercises the
        // mixed-radix FFT path.
        let spec: Vec<f32> = (0..96).map(|i| ((i * 29) % 17) as f32 - 8.0).collect();

        let mut actual = [0f32; 192];
        let mut expected = [0f32; 192];

        let scale = 2.0f64 / 96.0;

        imdct_analytical(&spec, &mut expected, scale);

        let mut mdct = Imdct::new_scaled(96, scale);
        mdct.imdct(&spec, &mut actual);

        for i in 0..192 {
            let delta = f64::from(actual[i]) - f64::from(expected[i]);
            assert!(delta.abs() < 1e-4);
        }
    }
}
