// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 64-band complex QMF filterbank.
//!
//! Analysis runs a 640-tap real delay line per channel: each 64-sample
//! timeslot shift-injects new input, windows it with the prototype, folds five
//! 128-sample phase blocks, and projects onto 64 cosine/sine kernel pairs.
//! Synthesis is the dual operation over a 1280-tap delay line. Both are pure
//! transforms over explicit history buffers.

use lazy_static::lazy_static;
use num_complex::Complex32;

use crate::channel::QmfGrid;
use crate::common::NUM_QMF_BANDS;
use crate::window::bessel_i0;

/// Input samples are normalized against this full-scale reference on entry to
/// the subband domain.
pub const FULL_SCALE: f32 = 32768.0;

const PROTO_LEN: usize = 640;

struct QmfKernel {
    qwin: Vec<f32>,
    /// Analysis kernels, `[subband][fold index]`.
    cos_atab: Vec<f32>,
    sin_atab: Vec<f32>,
    /// Synthesis kernels, `[tap][subband]`.
    cos_stab: Vec<f32>,
    sin_stab: Vec<f32>,
}

impl QmfKernel {
    fn new() -> Self {
        // Root-raised-cosine prototype with full rolloff: the squared
        // magnitude responses of adjacent subbands sum flat across their
        // crossover. A light Kaiser taper absorbs the truncation to 640 taps.
        let mut qwin = vec![0f32; PROTO_LEN];
        let centre = (PROTO_LEN as f64 - 1.0) / 2.0;

        // Kaiser beta 8; the argument convention of bessel_i0 squares it and
        // halves it.
        let beta_sq_quarter = 16.0;

        for (n, q) in qwin.iter_mut().enumerate() {
            let t = n as f64 - centre;

            let rrc = (std::f64::consts::PI * t / 64.0).cos() / (1.0 - (t / 32.0) * (t / 32.0));

            let r = t / (PROTO_LEN as f64 / 2.0);
            let taper =
                bessel_i0(beta_sq_quarter * (1.0 - r * r)) / bessel_i0(beta_sq_quarter);

            *q = (rrc * taper) as f32;
        }

        let mut cos_atab = vec![0f32; NUM_QMF_BANDS * 128];
        let mut sin_atab = vec![0f32; NUM_QMF_BANDS * 128];
        let mut cos_stab = vec![0f32; 128 * NUM_QMF_BANDS];
        let mut sin_stab = vec![0f32; 128 * NUM_QMF_BANDS];

        let pi_128 = std::f64::consts::PI / 128.0;

        for i in 0..NUM_QMF_BANDS {
            for n in 0..128 {
                let arg_a = pi_128 * (i as f64 + 0.5) * ((2 * n) as f64 - 1.0);
                cos_atab[i * 128 + n] = arg_a.cos() as f32;
                sin_atab[i * 128 + n] = arg_a.sin() as f32;

                let arg_s = pi_128 * (i as f64 + 0.5) * ((2 * n) as f64 - 255.0);
                cos_stab[n * NUM_QMF_BANDS + i] = (arg_s.cos() / 64.0) as f32;
                sin_stab[n * NUM_QMF_BANDS + i] = (arg_s.sin() / 64.0) as f32;
            }
        }

        let mut kernel = QmfKernel { qwin, cos_atab, sin_atab, cos_stab, sin_stab };

        // Normalize the cascade for unity passband gain. DC sits on the edge
        // of subband zero where the composite response dips, so the gain is
        // measured mid-band instead.
        let gain = kernel.passband_gain();
        let norm = (1.0 / gain) as f32;
        for v in kernel.cos_stab.iter_mut() {
            *v *= norm;
        }
        for v in kernel.sin_stab.iter_mut() {
            *v *= norm;
        }

        kernel
    }

    /// Magnitude response of analysis followed by synthesis at the centre of
    /// subband eight, measured from the cascade's impulse response.
    fn passband_gain(&self) -> f64 {
        let mut hist_a = vec![0f32; PROTO_LEN];
        let mut hist_s = vec![0f32; 2 * PROTO_LEN];
        let mut q = [Complex32::default(); NUM_QMF_BANDS];
        let mut out = [0f32; NUM_QMF_BANDS];

        let omega = (8.0 + 0.5) * std::f64::consts::PI / 64.0;
        let mut acc_re = 0f64;
        let mut acc_im = 0f64;

        for slot in 0..48 {
            let mut input = [0f32; NUM_QMF_BANDS];
            if slot == 2 {
                input[32] = 1.0;
            }

            self.analyze_slot(&mut hist_a, &input, &mut q);
            self.synth_slot(&mut hist_s, &q, &mut out);

            for (i, &v) in out.iter().enumerate() {
                let n = (slot * 64 + i) as f64;
                acc_re += f64::from(v) * (omega * n).cos();
                acc_im -= f64::from(v) * (omega * n).sin();
            }
        }

        (acc_re * acc_re + acc_im * acc_im).sqrt()
    }

    /// One analysis timeslot: 64 input samples to 64 complex subband values.
    fn analyze_slot(&self, hist: &mut [f32], input: &[f32], q: &mut [Complex32]) {
        // Shift the delay line by one slot and inject the new samples, newest
        // first.
        hist.copy_within(0..PROTO_LEN - 64, 64);
        for sb in 0..64 {
            hist[sb] = input[63 - sb];
        }

        // Window, then fold five phase blocks into 128 sums.
        let mut u = [0f32; 128];
        for n in 0..128 {
            let mut accum = 0.0;
            for k in 0..5 {
                accum += hist[n + k * 128] * self.qwin[n + k * 128];
            }
            u[n] = accum;
        }

        // Project onto the cosine/sine kernel pairs.
        for sb in 0..NUM_QMF_BANDS {
            let cos_row = &self.cos_atab[sb * 128..sb * 128 + 128];
            let sin_row = &self.sin_atab[sb * 128..sb * 128 + 128];

            let mut re = 0.0;
            let mut im = 0.0;
            for n in 0..128 {
                re += u[n] * cos_row[n];
                im += u[n] * sin_row[n];
            }
            q[sb] = Complex32::new(re, im);
        }
    }

    /// One synthesis timeslot: 64 complex subband values to 64 output
    /// samples.
    fn synth_slot(&self, hist: &mut [f32], q: &[Complex32], out: &mut [f32]) {
        hist.copy_within(0..2 * PROTO_LEN - 128, 128);

        for n in 0..128 {
            let cos_row = &self.cos_stab[n * NUM_QMF_BANDS..(n + 1) * NUM_QMF_BANDS];
            let sin_row = &self.sin_stab[n * NUM_QMF_BANDS..(n + 1) * NUM_QMF_BANDS];

            let mut accum = 0.0;
            for sb in 0..NUM_QMF_BANDS {
                accum += q[sb].re * cos_row[sb] - q[sb].im * sin_row[sb];
            }
            hist[n] = accum;
        }

        // Gather the windowed taps: 64 from the head and 64 from the tail of
        // each 256-sample span.
        let mut w = [0f32; PROTO_LEN];
        for blk in 0..5 {
            for i in 0..64 {
                w[blk * 128 + i] = hist[blk * 256 + i] * self.qwin[blk * 128 + i];
                w[blk * 128 + 64 + i] = hist[blk * 256 + 192 + i] * self.qwin[blk * 128 + 64 + i];
            }
        }

        for sb in 0..64 {
            let mut accum = 0.0;
            for n in 0..10 {
                accum += w[64 * n + sb];
            }
            out[sb] = accum;
        }
    }
}

lazy_static! {
    static ref KERNEL: QmfKernel = QmfKernel::new();
}

/// Analyzes `num_ts` timeslots of time-domain input into the complex subband
/// grid, advancing the channel's 640-tap delay line.
pub fn qmf_analysis(hist: &mut [f32], pcm: &[f32], num_ts: usize, grid: &mut QmfGrid) {
    let kernel: &QmfKernel = &KERNEL;

    let mut input = [0f32; NUM_QMF_BANDS];
    let mut q = [Complex32::default(); NUM_QMF_BANDS];

    for ts in 0..num_ts {
        for (i, v) in input.iter_mut().enumerate() {
            *v = pcm[ts * 64 + i] / FULL_SCALE;
        }

        kernel.analyze_slot(hist, &input, &mut q);

        for (sb, &val) in q.iter().enumerate() {
            *grid.at_mut(ts, sb) = val;
        }
    }
}

/// Synthesizes `num_ts` timeslots of output samples from the complex subband
/// grid, advancing the channel's 1280-tap delay line.
pub fn qmf_synthesis(hist: &mut [f32], grid: &QmfGrid, num_ts: usize, pcm: &mut [f32]) {
    let kernel: &QmfKernel = &KERNEL;

    let mut q = [Complex32::default(); NUM_QMF_BANDS];
    let mut out = [0f32; NUM_QMF_BANDS];

    for ts in 0..num_ts {
        for (sb, v) in q.iter_mut().enumerate() {
            *v = grid.at(ts, sb);
        }

        kernel.synth_slot(hist, &q, &mut out);

        pcm[ts * 64..ts * 64 + 64].copy_from_slice(&out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GRID_TS;

    /// Run analysis straight into synthesis over `num_ts` slots.
    fn roundtrip(pcm: &[f32], num_ts: usize) -> Vec<f32> {
        let mut hist_a = vec![0f32; PROTO_LEN];
        let mut hist_s = vec![0f32; 2 * PROTO_LEN];
        let mut grid = QmfGrid::new();
        let mut out = vec![0f32; num_ts * 64];

        qmf_analysis(&mut hist_a, pcm, num_ts, &mut grid);
        qmf_synthesis(&mut hist_s, &grid, num_ts, &mut out);

        out
    }

    #[test]
    fn verify_impulse_roundtrip() {
        // A full-scale impulse early enough that its response fits the frame.
        let num_ts = GRID_TS;
        let mut pcm = vec![0f32; num_ts * 64];
        pcm[160] = FULL_SCALE;

        let out = roundtrip(&pcm, num_ts);

        // The cascade divides by the full-scale reference once.
        let (peak_pos, peak) = out
            .iter()
            .enumerate()
            .map(|(i, &v)| (i, v.abs()))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .unwrap();

        assert!(peak > 0.85 && peak < 1.15, "impulse peak {} at {}", peak, peak_pos);

        // Energy is concentrated at the reconstructed impulse; the rest is
        // passband ripple.
        let total: f32 = out.iter().map(|v| v * v).sum();
        let near: f32 = out[peak_pos.saturating_sub(2)..(peak_pos + 3).min(out.len())]
            .iter()
            .map(|v| v * v)
            .sum();

        assert!(near / total > 0.95, "impulse energy spread: {}", near / total);
    }

    #[test]
    fn verify_sine_roundtrip_gain() {
        // A mid-band tone must come back at unity gain.
        let num_ts = GRID_TS;
        let mut pcm = vec![0f32; num_ts * 64];
        let omega = (8.0f32 + 0.5) * std::f32::consts::PI / 64.0;
        for (n, v) in pcm.iter_mut().enumerate() {
            *v = FULL_SCALE * (omega * n as f32).sin();
        }

        let out = roundtrip(&pcm, num_ts);

        // Measure RMS over a settled window clear of the cascade transient.
        let settled = &out[2048..out.len() - 64];
        let rms = (settled.iter().map(|v| v * v).sum::<f32>() / settled.len() as f32).sqrt();
        let expected = 1.0 / 2f32.sqrt();

        assert!(
            (rms - expected).abs() / expected < 0.1,
            "tone rms {} expected {}",
            rms,
            expected
        );
    }

    #[test]
    fn verify_analysis_is_deterministic() {
        let mut pcm = vec![0f32; 8 * 64];
        for (n, v) in pcm.iter_mut().enumerate() {
            *v = ((n * 37 % 101) as f32 - 50.0) * 100.0;
        }

        let a = roundtrip(&pcm, 8);
        let b = roundtrip(&pcm, 8);
        assert_eq!(a, b);
    }

    #[test]
    fn verify_history_lengths() {
        // The contract: analysis owns 640 taps, synthesis 1280.
        let mut hist_a = vec![0f32; PROTO_LEN];
        let mut hist_s = vec![0f32; 2 * PROTO_LEN];
        let mut grid = QmfGrid::new();
        let pcm = vec![1.0f32; 64];
        let mut out = vec![0f32; 64];

        qmf_analysis(&mut hist_a, &pcm, 1, &mut grid);
        qmf_synthesis(&mut hist_s, &grid, 1, &mut out);

        assert_eq!(hist_a.len(), 640);
        assert_eq!(hist_s.len(), 1280);
        assert!(hist_a.iter().any(|&v| v != 0.0));
    }
}
