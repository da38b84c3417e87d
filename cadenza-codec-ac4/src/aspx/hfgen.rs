// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-frequency generation: the delayed low-band view, the second-order
//! complex linear predictor, chirp smoothing, harmonic patching, and assembly
//! of the regenerated band into the QMF grid.

use num_complex::Complex32;

use crate::channel::{ChannelFrame, ChannelState};
use crate::common::*;
use crate::tables::NEW_CHIRP_TAB;

use super::{AspxConfig, AspxContext};

/// Builds the delayed low-band view: the generator delay's worth of history
/// from the previous frame, followed by this frame's analysis output. Also
/// primes the persistent high-band grid with its previous generation.
pub fn build_low_band(ctx: &AspxContext, state: &ChannelState, cf: &mut ChannelFrame) {
    let st = &state.aspx;
    let sbx = cf.aspx.tables.sbx;
    let off = ctx.ts_offset_hfgen;

    for ts in 0..off {
        for sb in 0..sbx {
            *cf.q_low.at_mut(ts, sb) = st.q_prev.at(ts + ctx.num_qmf_ts - off, sb);
        }
    }

    for ts in off..ctx.num_qmf_ts + off {
        for sb in 0..sbx {
            *cf.q_low.at_mut(ts, sb) = cf.q.at(ts - off, sb);
        }
    }

    cf.q_high.copy_from(&st.q_high_prev);
}

/// 3x3 Hermitian-symmetric covariance of the chirp-extended low band over a
/// time-delayed window, with a stride of two timeslots.
pub fn covariance(ctx: &AspxContext, state: &ChannelState, cf: &mut ChannelFrame) {
    let st = &state.aspx;
    let sba = cf.aspx.tables.sba;

    // Extend with an additional adjuster delay of four timeslots.
    let ts_offset_prev = ctx.num_qmf_ts - TS_OFFSET_HFADJ;
    for sb in 0..sba {
        for ts in 0..TS_OFFSET_HFADJ {
            *cf.q_low_ext.at_mut(ts, sb) = st.q_low_prev.at(ts + ts_offset_prev, sb);
        }
        for ts in 0..ctx.num_qmf_ts + ctx.ts_offset_hfgen {
            *cf.q_low_ext.at_mut(ts + TS_OFFSET_HFADJ, sb) = cf.q_low.at(ts, sb);
        }
    }

    let num_ts_ext = ctx.num_qmf_ts + ctx.ts_offset_hfgen + TS_OFFSET_HFADJ;

    let fp = &mut *cf.aspx;
    for sb in 0..sba {
        for i in 0..3 {
            for j in 1..3 {
                let mut acc = Complex32::default();

                let mut ts = TS_OFFSET_HFADJ;
                while ts < num_ts_ext {
                    let a = cf.q_low_ext.at(ts - 2 * i, sb);
                    let b = cf.q_low_ext.at(ts - 2 * j, sb);
                    acc += a * b.conj();
                    ts += 2;
                }

                fp.cov[sb][i][j] = acc;
            }
        }
    }
}

/// Solves for the two complex second-order predictor coefficients by direct
/// 2x2 complex elimination. Near-singular systems fall back to zero.
pub fn alphas(cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;
    let epsilon_inv = 2f32.powf(-20.0);

    for sb in 0..fp.tables.sba {
        let c01 = fp.cov[sb][0][1];
        let c02 = fp.cov[sb][0][2];
        let c11 = fp.cov[sb][1][1];
        let c12 = fp.cov[sb][1][2];
        let c22 = fp.cov[sb][2][2];

        let mut denom = c22 * c11;
        denom.re -= c12.norm_sqr() / (1.0 + epsilon_inv);

        if denom.norm_sqr() <= 1e-6 {
            fp.alpha1[sb] = Complex32::default();
        }
        else {
            let num = c01 * c12 - c02 * c11;

            // Division with the solver's sign convention on the imaginary
            // part.
            let m = denom.norm_sqr();
            fp.alpha1[sb] = Complex32::new(
                (num.re * denom.re + num.im * denom.im) / m,
                (num.re * denom.im - denom.re * num.im) / m,
            );
        }

        if c11.norm_sqr() <= 1e-6 {
            fp.alpha0[sb] = Complex32::default();
        }
        else {
            let a1 = fp.alpha1[sb];
            let num = Complex32::new(
                -c01.re + a1.re * c12.re + a1.im * c12.im,
                -c01.im + a1.im * c12.re - a1.re * c12.im,
            );

            let m = c11.norm_sqr();
            fp.alpha0[sb] = Complex32::new(
                (num.re * c11.re + num.im * c11.im) / m,
                (num.re * c11.im - c11.re * num.im) / m,
            );
        }
    }
}

/// Asymmetric IIR smoothing of the chirp decorrelation factors: fast when
/// rising, slow when falling, snapped to zero below 1/64.
pub fn chirps(state: &ChannelState, cf: &mut ChannelFrame) {
    let st = &state.aspx;
    let fp = &mut *cf.aspx;

    for sbg in 0..fp.tables.num_sbg_noise {
        let target = NEW_CHIRP_TAB[usize::from(fp.tna_mode[sbg])]
            [usize::from(st.tna_mode_prev[sbg])];

        let smoothed = if target < st.chirp_prev[sbg] {
            0.75000 * target + 0.25000 * st.chirp_prev[sbg]
        }
        else {
            0.90625 * target + 0.09375 * st.chirp_prev[sbg]
        };

        fp.chirp[sbg] = if smoothed < 0.015625 { 0.0 } else { smoothed };
    }
}

/// Fits a third-order polynomial to `y` over `x` by least squares. Returns
/// false when the normal equations are singular.
fn polyfit(order: usize, count: usize, x: &[f32], y: &[f32], coeffs: &mut [f32]) -> bool {
    const MAX_ORDER: usize = 5;

    if count <= order || order > MAX_ORDER {
        return false;
    }

    let cols = 2 * (order + 1);

    let mut b = [0f32; MAX_ORDER + 1];
    let mut p = [0f32; 2 * (MAX_ORDER + 1) + 1];
    let mut a = [0f32; (MAX_ORDER + 1) * 2 * (MAX_ORDER + 1)];

    for i in 0..count {
        let mut powx = 1.0;
        for bj in b.iter_mut().take(order + 1) {
            *bj += y[i] * powx;
            powx *= x[i];
        }
    }

    p[0] = count as f32;
    for i in 0..count {
        let mut powx = x[i];
        for pj in p.iter_mut().take(cols + 1).skip(1) {
            *pj += powx;
            powx *= x[i];
        }
    }

    for i in 0..order + 1 {
        for j in 0..order + 1 {
            a[i * cols + j] = p[i + j];
        }
        a[i * cols + i + (order + 1)] = 1.0;
    }

    // Invert the left block in place by Gauss-Jordan elimination.
    for i in 0..order + 1 {
        let pivot = a[i * cols + i];
        if pivot == 0.0 {
            return false;
        }

        for k in 0..cols {
            a[i * cols + k] /= pivot;
        }

        for j in 0..order + 1 {
            if j != i {
                let factor = a[j * cols + i];
                for k in 0..cols {
                    a[j * cols + k] -= factor * a[i * cols + k];
                }
            }
        }
    }

    for (i, coeff) in coeffs.iter_mut().enumerate().take(order + 1) {
        let mut acc = 0.0;
        for k in 0..order + 1 {
            acc += a[i * cols + k + (order + 1)] * b[k];
        }
        *coeff = acc;
    }

    true
}

/// Derives the pre-flattening gain vector from a polynomial fit of the
/// low-band spectral envelope in dB.
pub fn preflattening(ctx: &AspxContext, cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;
    let order = 3;
    let num_sb = fp.tables.sbx;
    let nts = ctx.num_ts_in_ats;

    let mut x = [0f32; NUM_QMF_BANDS];
    let mut pow_env = [0f32; NUM_QMF_BANDS];
    let mut slope = [0f32; NUM_QMF_BANDS];
    let mut poly = [0f32; 6];

    for (i, xi) in x.iter_mut().enumerate().take(num_sb) {
        *xi = i as f32;
    }

    let tsa = fp.atsg_sig[0] as usize * nts;
    let tsz = fp.atsg_sig[fp.num_env] as usize * nts;

    let mut mean_energy = 0f32;
    for sb in 0..num_sb {
        let mut acc = 0f32;
        for ts in tsa..tsz {
            let v = cf.q_low.at(ts, sb);
            acc += v.re * v.re + v.im * v.im;
        }
        acc /= (tsz - tsa) as f32;

        pow_env[sb] = 10.0 * (acc + 1.0).log10();
        mean_energy += pow_env[sb];
    }

    mean_energy /= num_sb as f32;

    fp.gain_vec = [1.0; NUM_QMF_BANDS];

    if !polyfit(order, num_sb, &x[..num_sb], &pow_env[..num_sb], &mut poly) {
        return;
    }

    for k in (0..=order).rev() {
        for sb in 0..num_sb {
            slope[sb] += x[sb].powi(k as i32) * poly[k];
        }
    }

    for sb in 0..num_sb {
        fp.gain_vec[sb] = 10f32.powf((mean_energy - slope[sb]) / 20.0);
    }
}

/// Copies each patch's low-band run into the high band and extrapolates it
/// with the chirped second-order predictor.
pub fn create_high_signal(cfg: &AspxConfig, ctx: &AspxContext, cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;
    let t = fp.tables.clone();
    let nts = ctx.num_ts_in_ats;

    let ts_start = fp.atsg_sig[0] as usize * nts;
    let ts_end = fp.atsg_sig[fp.num_env] as usize * nts;

    for ts in ts_start..ts_end {
        let mut sum_sb_patches = 0;
        let mut g = 0;

        for i in 0..t.num_patches {
            for sb in 0..t.patch_num_sb[i] {
                let sb_high = t.sbx + sum_sb_patches + sb;

                // Track the noise envelope the chirp factor belongs to.
                if g + 1 < t.num_sbg_noise && t.sbg_noise[g + 1] == sb_high {
                    g += 1;
                }

                let n = ts + TS_OFFSET_HFADJ;
                let p = t.patch_start_sb[i] + sb;

                let chirp = fp.chirp[g];

                let mut val = cf.q_low_ext.at(n, p);
                val += fp.alpha0[p] * cf.q_low_ext.at(n - 2, p) * chirp;
                val += fp.alpha1[p] * cf.q_low_ext.at(n - 4, p) * (chirp * chirp);

                if cfg.preflat {
                    val *= 1.0 / fp.gain_vec[p];
                }

                *cf.q_high.at_mut(ts, sb_high) = val;
            }
            sum_sb_patches += t.patch_num_sb[i];
        }
    }
}

/// Scales the regenerated band by the envelope gains, adds the sinusoid and
/// noise contributions, and accumulates the result into the QMF grid above the
/// crossover.
pub fn assemble_hf_signal(ctx: &AspxContext, state: &ChannelState, cf: &mut ChannelFrame) {
    let st = &state.aspx;
    let t = cf.aspx.tables.clone();
    let nts = ctx.num_ts_in_ats;

    let num_env = cf.aspx.num_env;
    let ts_start = cf.aspx.atsg_sig[0] as usize * nts;
    let ts_end = cf.aspx.atsg_sig[num_env] as usize * nts;

    cf.y.zero();

    // Delayed subsamples from the previous frame bridge an envelope that
    // starts mid-frame.
    for ts in 0..ts_start {
        for sb in 0..t.num_sb_aspx {
            *cf.y.at_mut(ts, sb) = st.y_prev.at(ctx.num_qmf_ts + ts, sb);
        }
    }

    let mut atsg = 0;
    for ts in ts_start..ts_end {
        if atsg + 1 < num_env && ts == cf.aspx.atsg_sig[atsg + 1] as usize * nts {
            atsg += 1;
        }

        for sb in 0..t.num_sb_aspx {
            let gain = cf.aspx.sig_gain_sb_adj[atsg][sb];
            let high = cf.q_high.at(ts + TS_OFFSET_HFADJ, sb + t.sbx);

            *cf.y.at_mut(ts, sb) = high * gain;
        }
    }

    for ts in ts_start..ts_end {
        for sb in 0..t.num_sb_aspx {
            let v = *cf.y.at_mut(ts, sb) + cf.qmf_sine.at(ts, sb) + cf.qmf_noise.at(ts, sb);
            *cf.y.at_mut(ts, sb) = v;
        }
    }

    // Accumulate into the grid at subbands above the crossover, including the
    // bridged head.
    for ts in 0..ts_end {
        for sb in t.sbx..NUM_QMF_BANDS {
            let add = cf.y.at(ts, sb - t.sbx) / crate::qmf::FULL_SCALE;
            *cf.q.at_mut(ts, sb) += add;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelFrame;

    #[test]
    fn verify_alpha_fallback_on_tiny_denominator() {
        let mut cf = ChannelFrame::new();
        {
            let fp = &mut *cf.aspx;
            fp.tables.sba = 2;
            // Covariance left at zero: both denominators vanish.
        }

        alphas(&mut cf);

        let fp = &*cf.aspx;
        for sb in 0..2 {
            assert_eq!(fp.alpha0[sb], Complex32::default());
            assert_eq!(fp.alpha1[sb], Complex32::default());
        }
    }

    #[test]
    fn verify_alpha_solves_known_system() {
        let mut cf = ChannelFrame::new();
        {
            let fp = &mut *cf.aspx;
            fp.tables.sba = 1;

            // A real-valued system with a known solution: with c01 = c12 = 0,
            // alpha1 = -c02*c11 / (c22*c11 - 0) and alpha0 = 0 / c11.
            fp.cov[0][0][1] = Complex32::new(0.0, 0.0);
            fp.cov[0][0][2] = Complex32::new(2.0, 0.0);
            fp.cov[0][1][1] = Complex32::new(4.0, 0.0);
            fp.cov[0][1][2] = Complex32::new(0.0, 0.0);
            fp.cov[0][2][2] = Complex32::new(8.0, 0.0);
        }

        alphas(&mut cf);

        let fp = &*cf.aspx;
        // alpha1 = (0 - 2*4) / (8*4) = -0.25
        assert!((fp.alpha1[0].re + 0.25).abs() < 1e-6);
        assert!(fp.alpha1[0].im.abs() < 1e-6);
        // alpha0 = (-0 + alpha1*0) / 4 = 0
        assert!(fp.alpha0[0].re.abs() < 1e-6);
    }

    #[test]
    fn verify_chirp_smoothing() {
        let mut state = crate::channel::ChannelState::new();
        let mut cf = ChannelFrame::new();

        cf.aspx.tables.num_sbg_noise = 2;

        // Rising: target 0.98 from rest follows the fast path.
        cf.aspx.tna_mode[0] = 3;
        state.aspx.tna_mode_prev[0] = 0;
        state.aspx.chirp_prev[0] = 0.0;

        // Falling: target 0 from 0.9 decays slowly but snaps below 1/64.
        cf.aspx.tna_mode[1] = 0;
        state.aspx.tna_mode_prev[1] = 0;
        state.aspx.chirp_prev[1] = 0.04;

        chirps(&state, &mut cf);

        let expected0 = 0.90625 * 0.98;
        assert!((cf.aspx.chirp[0] - expected0).abs() < 1e-6);

        // 0.75 * 0 + 0.25 * 0.04 = 0.01 < 1/64 -> snapped to zero.
        assert_eq!(cf.aspx.chirp[1], 0.0);
    }

    #[test]
    fn verify_polyfit_recovers_polynomial() {
        let x: Vec<f32> = (0..16).map(|i| i as f32).collect();
        let y: Vec<f32> = x.iter().map(|&v| 1.0 + 2.0 * v - 0.5 * v * v).collect();
        let mut coeffs = [0f32; 6];

        assert!(polyfit(2, 16, &x, &y, &mut coeffs));
        assert!((coeffs[0] - 1.0).abs() < 1e-2);
        assert!((coeffs[1] - 2.0).abs() < 1e-2);
        assert!((coeffs[2] + 0.5).abs() < 1e-2);
    }

    #[test]
    fn verify_polyfit_rejects_underdetermined() {
        let x = [0f32, 1.0];
        let y = [0f32, 1.0];
        let mut coeffs = [0f32; 6];
        assert!(!polyfit(3, 2, &x, &y, &mut coeffs));
    }
}
