// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Envelope reconstruction: differential decode, dequantization, energy
//! estimation, gain derivation with limiting and boost, and synthetic tone
//! and noise generation.

use crate::channel::{ChannelFrame, ChannelState};
use crate::common::*;
use crate::tables::{ASPX_NOISE, ASPX_SINE};

use super::{AspxConfig, AspxContext};

const NOISE_FLOOR_OFFSET: f32 = 6.0;
const PAN_OFFSET: f32 = 12.0;

/// Accumulates the quantized signal envelope values, frequency- or
/// time-differentially, remapping indices across resolution changes.
pub fn qsignal_scale_factors(state: &ChannelState, cf: &mut ChannelFrame, ch: usize) {
    let st = &state.aspx;
    let fp = &mut *cf.aspx;
    let t = &fp.tables;

    let mut high2low = [0usize; MAX_SBG];
    let mut low2high = [0usize; MAX_SBG];
    let mut sbg_low = 0;

    for sbg in 0..t.num_sbg_sig_highres {
        if sbg_low < t.num_sbg_sig_lowres
            && t.sbg_sig_lowres[sbg_low + 1] == t.sbg_sig_highres[sbg]
        {
            sbg_low += 1;
            low2high[sbg_low] = sbg;
        }
        high2low[sbg] = sbg_low;
    }

    let delta = if ch == 1 && fp.balance { 2 } else { 1 };

    fp.qscf_sig = [[0; NUM_QMF_BANDS]; MAX_ENVELOPES];

    for atsg in 0..fp.num_env {
        let cur_res = fp.atsg_freqres[atsg];
        let prev_res = if atsg == 0 {
            st.freqres_prev[fp.num_env_prev - 1]
        }
        else {
            fp.atsg_freqres[atsg - 1]
        };

        for sbg in 0..fp.num_sbg_sig[atsg] {
            if !fp.sig_delta_dir[atsg] {
                // Frequency direction: running sum of the deltas.
                let mut acc = 0;
                for i in 0..=sbg {
                    acc += delta * fp.data[0][atsg][i];
                }
                fp.qscf_sig[atsg][sbg] = acc;
            }
            else {
                // Time direction: relative to the co-located group of the
                // previous segment, remapped across a resolution change.
                let prev_idx = if cur_res == prev_res {
                    sbg
                }
                else if cur_res == 0 {
                    low2high[sbg]
                }
                else {
                    high2low[sbg]
                };

                let prev = if atsg == 0 {
                    st.qscf_sig_prev[fp.num_env_prev - 1][prev_idx]
                }
                else {
                    fp.qscf_sig[atsg - 1][prev_idx]
                };

                fp.qscf_sig[atsg][sbg] = prev + delta * fp.data[0][atsg][sbg];
            }
        }
    }
}

/// Accumulates the quantized noise-floor envelope values.
pub fn qnoise_scale_factors(state: &ChannelState, cf: &mut ChannelFrame, ch: usize) {
    let st = &state.aspx;
    let fp = &mut *cf.aspx;

    let delta = if ch == 1 && fp.balance { 2 } else { 1 };

    fp.qscf_noise = [[0; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES];

    for atsg in 0..fp.num_noise {
        for sbg in 0..fp.tables.num_sbg_noise {
            if !fp.noise_delta_dir[atsg] {
                let mut acc = 0;
                for i in 0..=sbg {
                    acc += delta * fp.data[1][atsg][i];
                }
                fp.qscf_noise[atsg][sbg] = acc;
            }
            else {
                let prev = if atsg == 0 {
                    st.qscf_noise_prev[fp.num_noise_prev - 1][sbg]
                }
                else {
                    fp.qscf_noise[atsg - 1][sbg]
                };
                fp.qscf_noise[atsg][sbg] = prev + delta * fp.data[1][atsg][sbg];
            }
        }
    }
}

/// Dequantizes the signal envelopes of an independently coded channel.
pub fn deq_signal_factors_mono(cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;

    // Coarse quantization halves the exponent.
    let a = if fp.qmode_env == 0 { 2.0 } else { 1.0 };

    fp.scf_sig_sbg = [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES];

    for atsg in 0..fp.num_env {
        for sbg in 0..fp.num_sbg_sig[atsg] {
            fp.scf_sig_sbg[atsg][sbg] = 64.0 * 2f32.powf(fp.qscf_sig[atsg][sbg] as f32 / a);
        }
    }
}

/// Dequantizes the noise-floor envelopes of an independently coded channel.
pub fn deq_noise_factors_mono(cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;

    fp.scf_noise_sbg = [[0.0; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES];

    for atsg in 0..fp.num_noise {
        for sbg in 0..fp.tables.num_sbg_noise {
            fp.scf_noise_sbg[atsg][sbg] =
                2f32.powf(NOISE_FLOOR_OFFSET - fp.qscf_noise[atsg][sbg] as f32);
        }
    }
}

/// Dequantizes a balance-coded pair: channel 0 carries the level, channel 1
/// the pan.
pub fn deq_signoise_factors_stereo(cf0: &mut ChannelFrame, cf1: &mut ChannelFrame) {
    let fp0 = &mut *cf0.aspx;
    let fp1 = &mut *cf1.aspx;

    let a = if fp0.qmode_env == 0 { 2.0 } else { 1.0 };

    for atsg in 0..fp0.num_env {
        for sbg in 0..fp0.num_sbg_sig[atsg] {
            let nom = 64.0 * 2f32.powf(fp0.qscf_sig[atsg][sbg] as f32 / a + 1.0);
            let denom_a = 1.0 + 2f32.powf(PAN_OFFSET - fp1.qscf_sig[atsg][sbg] as f32 / a);
            let denom_b = 1.0 + 2f32.powf(fp1.qscf_sig[atsg][sbg] as f32 / a - PAN_OFFSET);

            fp0.scf_sig_sbg[atsg][sbg] = nom / denom_a;
            fp1.scf_sig_sbg[atsg][sbg] = nom / denom_b;
        }
    }

    for atsg in 0..fp0.num_noise {
        for sbg in 0..fp0.tables.num_sbg_noise {
            let nom =
                2f32.powf(NOISE_FLOOR_OFFSET - fp0.qscf_noise[atsg][sbg] as f32 + 1.0);
            let denom_a = 1.0 + 2f32.powf(PAN_OFFSET - fp1.qscf_noise[atsg][sbg] as f32);
            let denom_b = 1.0 + 2f32.powf(fp1.qscf_noise[atsg][sbg] as f32 - PAN_OFFSET);

            fp0.scf_noise_sbg[atsg][sbg] = nom / denom_a;
            fp1.scf_noise_sbg[atsg][sbg] = nom / denom_b;
        }
    }
}

/// Averages the magnitude of the regenerated band per envelope: the estimated
/// source energy the gains are derived against.
pub fn estimate_spectral_envelopes(cfg: &AspxConfig, ctx: &AspxContext, cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;
    let t = &fp.tables;
    let nts = ctx.num_ts_in_ats;

    for atsg in 0..fp.num_env {
        let tsa = fp.atsg_sig[atsg] as usize * nts + TS_OFFSET_HFADJ;
        let tsz = fp.atsg_sig[atsg + 1] as usize * nts + TS_OFFSET_HFADJ;

        let mut sbg = 0;
        for sb in 0..t.num_sb_aspx {
            if sbg + 1 < fp.num_sbg_sig[atsg] && sb + t.sbx == fp.sbg_sig[atsg][sbg + 1] {
                sbg += 1;
            }

            let mut est = 0f32;
            for ts in tsa..tsz {
                if !cfg.interpolation {
                    for j in fp.sbg_sig[atsg][sbg]..fp.sbg_sig[atsg][sbg + 1] {
                        let v = cf.q_high.at(ts, j);
                        est += v.re.hypot(v.im);
                    }
                }
                else {
                    let v = cf.q_high.at(ts, sb + t.sbx);
                    est += v.re.hypot(v.im);
                }
            }

            if !cfg.interpolation {
                est /= (fp.sbg_sig[atsg][sbg + 1] - fp.sbg_sig[atsg][sbg]) as f32;
            }
            est /= (fp.atsg_sig[atsg + 1] - fp.atsg_sig[atsg]) as f32;

            fp.est_sig_sb[atsg][sb] = est;
        }
    }
}

/// Maps the dequantized envelopes from subband groups onto QMF subbands, and
/// noise floors onto signal envelopes.
pub fn map_signoise(cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;
    let t = &fp.tables;
    let sbx = t.sbx;

    fp.scf_sig_sb = [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES];
    fp.scf_noise_sb = [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES];

    let mut atsg_noise = 0;

    for atsg in 0..fp.num_env {
        for sbg in 0..fp.num_sbg_sig[atsg] {
            for sb in fp.sbg_sig[atsg][sbg] - sbx..fp.sbg_sig[atsg][sbg + 1] - sbx {
                fp.scf_sig_sb[atsg][sb] = fp.scf_sig_sbg[atsg][sbg];
            }
        }

        if atsg_noise + 1 < fp.num_noise && fp.atsg_sig[atsg] == fp.atsg_noise[atsg_noise + 1] {
            atsg_noise += 1;
        }

        for sbg in 0..t.num_sbg_noise {
            for sb in t.sbg_noise[sbg] - sbx..t.sbg_noise[sbg + 1] - sbx {
                fp.scf_noise_sb[atsg][sb] = fp.scf_noise_sbg[atsg_noise][sbg];
            }
        }
    }
}

const EPSILON: f32 = 1.0;
const EPSILON0: f32 = 1.0e-12;
const LIM_GAIN: f32 = 1.41254;
const MAX_SIG_GAIN: f32 = 1.0e5;
const MAX_BOOST_FACT: f32 = 1.584893192;

/// Derives the per-subband signal gain, applies the limiter per limiter
/// subband group, and redistributes the limited energy through the boost
/// factor. Sinusoid markers and levels are resolved here too.
pub fn add_sinusoids(state: &ChannelState, cf: &mut ChannelFrame) {
    let st = &state.aspx;
    let fp = &mut *cf.aspx;
    let t = fp.tables.clone();
    let sbx = t.sbx;

    let p_sine_at_end: i32 =
        if st.tsg_ptr_prev == fp.num_env_prev as i32 { 0 } else { -1 };

    // Sinusoid markers sit mid-group in the high-resolution table, persisting
    // from the previous frame past the transient pointer.
    for atsg in 0..fp.num_env {
        for sbg in 0..t.num_sbg_sig_highres {
            let sba_rel = t.sbg_sig_highres[sbg] - sbx;
            let sbz_rel = t.sbg_sig_highres[sbg + 1] - sbx;
            let sb_mid = (0.5 * (sbz_rel + sba_rel) as f32 + 0.5) as usize;

            for sb in sba_rel..sbz_rel {
                let persists = (atsg as i32) >= fp.tsg_ptr
                    || p_sine_at_end == 0
                    || st.sine_marker_prev[fp.num_env_prev - 1][sb];

                fp.sine_marker[atsg][sb] = sb == sb_mid && persists && fp.add_harmonic[sbg];
            }
        }
    }

    // A group with any marked subband counts as a sinusoid area.
    for atsg in 0..fp.num_env {
        for sbg in 0..fp.num_sbg_sig[atsg] {
            let lo = fp.sbg_sig[atsg][sbg] - sbx;
            let hi = fp.sbg_sig[atsg][sbg + 1] - sbx;

            let sine_present = (lo..hi).any(|sb| fp.sine_marker[atsg][sb]);
            for sb in lo..hi {
                fp.sine_area_sb[atsg][sb] = sine_present;
            }
        }
    }

    fp.noise_lev_sb = [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES];

    for atsg in 0..fp.num_env {
        for sb in 0..t.num_sb_aspx {
            let sig_noise_fact = fp.scf_sig_sb[atsg][sb] / (1.0 + fp.scf_noise_sb[atsg][sb]);

            fp.sine_lev_sb[atsg][sb] =
                (sig_noise_fact * f32::from(u8::from(fp.sine_marker[atsg][sb]))).sqrt();
            fp.noise_lev_sb[atsg][sb] = (sig_noise_fact * fp.scf_noise_sb[atsg][sb]).sqrt();
        }
    }

    // Raw signal gain: target over estimated energy, accounting for noise and
    // sinusoid energy already present.
    for atsg in 0..fp.num_env {
        for sb in 0..t.num_sb_aspx {
            let transient =
                atsg as i32 == fp.tsg_ptr || atsg as i32 == p_sine_at_end;

            if !fp.sine_area_sb[atsg][sb] {
                let mut denom = EPSILON + fp.est_sig_sb[atsg][sb];
                if !transient {
                    denom *= 1.0 + fp.scf_noise_sb[atsg][sb];
                }
                fp.sig_gain_sb[atsg][sb] = (fp.scf_sig_sb[atsg][sb] / denom).sqrt();
            }
            else {
                let denom = (EPSILON + fp.est_sig_sb[atsg][sb])
                    * (1.0 + fp.scf_noise_sb[atsg][sb]);
                fp.sig_gain_sb[atsg][sb] =
                    (fp.scf_sig_sb[atsg][sb] * fp.scf_noise_sb[atsg][sb] / denom).sqrt();
            }
        }
    }

    // Limiter cap per limiter subband group, with fixed headroom.
    for atsg in 0..fp.num_env {
        for sbg in 0..t.num_sbg_lim {
            let mut nom = 0.0;
            let mut denom = EPSILON0;
            for sb in t.sbg_lim[sbg] - sbx..(t.sbg_lim[sbg + 1] - 1).saturating_sub(sbx) {
                nom += fp.scf_sig_sb[atsg][sb];
                denom += fp.est_sig_sb[atsg][sb];
            }

            fp.max_sig_gain_sbg[atsg][sbg] = (nom / denom).sqrt() * LIM_GAIN;
        }

        let mut sbg = 0;
        for sb in 0..t.num_sb_aspx {
            if sbg + 1 <= t.num_sbg_lim && sb == t.sbg_lim[sbg + 1] - sbx {
                sbg += 1;
            }
            fp.max_sig_gain_sb[atsg][sb] =
                fp.max_sig_gain_sbg[atsg][sbg.min(t.num_sbg_lim - 1)].min(MAX_SIG_GAIN);
        }
    }

    fp.noise_lev_sb_lim = [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES];

    for atsg in 0..fp.num_env {
        for sb in 0..t.num_sb_aspx {
            let tmp = fp.noise_lev_sb[atsg][sb] * fp.max_sig_gain_sb[atsg][sb]
                / fp.sig_gain_sb[atsg][sb];
            fp.noise_lev_sb_lim[atsg][sb] = fp.noise_lev_sb[atsg][sb].min(tmp);
        }
    }

    for atsg in 0..fp.num_env {
        for sb in 0..t.num_sb_aspx {
            fp.sig_gain_sb_lim[atsg][sb] =
                fp.sig_gain_sb[atsg][sb].min(fp.max_sig_gain_sb[atsg][sb]);
        }
    }

    // Boost redistributes energy lost to limiting.
    for atsg in 0..fp.num_env {
        let transient = atsg as i32 == fp.tsg_ptr || atsg as i32 == p_sine_at_end;

        for sbg in 0..t.num_sbg_lim {
            let mut nom = EPSILON0;
            let mut denom = EPSILON0;

            for sb in t.sbg_lim[sbg] - sbx..(t.sbg_lim[sbg + 1] - 1).saturating_sub(sbx) {
                nom += fp.scf_sig_sb[atsg][sb];
                denom += fp.est_sig_sb[atsg][sb] * fp.sig_gain_sb_lim[atsg][sb].powi(2);
                denom += fp.sine_lev_sb[atsg][sb].powi(2);
                if fp.sine_lev_sb[atsg][sb] == 0.0 && !transient {
                    denom += fp.noise_lev_sb_lim[atsg][sb].powi(2);
                }
            }

            fp.boost_fact_sbg[atsg][sbg] = (nom / denom).sqrt();
        }

        let mut sbg = 0;
        for sb in 0..t.num_sb_aspx {
            if sbg + 1 <= t.num_sbg_lim && sb == t.sbg_lim[sbg + 1] - sbx {
                sbg += 1;
            }
            fp.boost_fact_sb[atsg][sb] =
                fp.boost_fact_sbg[atsg][sbg.min(t.num_sbg_lim - 1)].min(MAX_BOOST_FACT);
        }
    }

    fp.noise_lev_sb_adj = [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES];

    for atsg in 0..fp.num_env {
        for sb in 0..t.num_sb_aspx {
            let boost = fp.boost_fact_sb[atsg][sb];
            fp.sig_gain_sb_adj[atsg][sb] = fp.sig_gain_sb_lim[atsg][sb] * boost;
            fp.noise_lev_sb_adj[atsg][sb] = fp.noise_lev_sb_lim[atsg][sb] * boost;
            fp.sine_lev_sb_adj[atsg][sb] = fp.sine_lev_sb[atsg][sb] * boost;
        }
    }
}

/// Generates the sinusoid contributions. The per-subband phase counter
/// advances deterministically frame to frame.
pub fn generate_tones(
    ctx: &AspxContext,
    state: &ChannelState,
    cf: &mut ChannelFrame,
    first_frame: &mut bool,
) {
    let st = &state.aspx;
    let fp = &mut *cf.aspx;
    let t = &fp.tables;
    let nts = ctx.num_ts_in_ats;

    fp.sine_phase.copy_from_slice(&st.sine_phase_prev);

    let mut atsg = 0;
    let ts_start = fp.atsg_sig[0] as usize * nts;
    let ts_end = fp.atsg_sig[fp.num_env] as usize * nts;

    for ts in ts_start..ts_end {
        if atsg + 1 < fp.num_env && ts == fp.atsg_sig[atsg + 1] as usize * nts {
            atsg += 1;
        }

        for sb in 0..t.num_sb_aspx {
            let cell = ts * NUM_QMF_BANDS + sb;

            let mut index = if *first_frame {
                *first_frame = false;
                1
            }
            else {
                (i32::from(fp.sine_phase[cell]) + 1) % 4
            };
            index += ts as i32 - fp.atsg_sig[0];
            let index = (index % 4) as usize;

            fp.sine_phase[cell] = index as i8;

            let lev = fp.sine_lev_sb_adj[atsg][sb];
            let flip = if (sb + t.sbx) % 2 == 1 { -1.0 } else { 1.0 };

            let v = cf.qmf_sine.at_mut(ts, sb);
            v.re = lev * ASPX_SINE[0][index];
            v.im = lev * flip * ASPX_SINE[1][index];
        }
    }
}

/// Generates the noise contributions from the fixed pseudo-random table. The
/// per-subband counter advances deterministically frame to frame.
pub fn generate_noise(ctx: &AspxContext, state: &ChannelState, cf: &mut ChannelFrame) {
    let fp = &mut *cf.aspx;
    let t = &fp.tables;
    let nts = ctx.num_ts_in_ats;

    // The counters carry over except on a master reset.
    fp.noise_idx.copy_from_slice(&state.aspx.noise_idx_prev);
    if fp.master_reset {
        fp.noise_idx.fill(0);
    }

    let mut atsg = 0;
    let ts_start = fp.atsg_sig[0] as usize * nts;
    let ts_end = fp.atsg_sig[fp.num_env] as usize * nts;

    for ts in ts_start..ts_end {
        if atsg + 1 < fp.num_env && ts == fp.atsg_sig[atsg + 1] as usize * nts {
            atsg += 1;
        }

        for sb in 0..t.num_sb_aspx {
            let cell = ts * NUM_QMF_BANDS + sb;

            let mut index = i32::from(fp.noise_idx[cell]);
            index += (t.num_sb_aspx as i32) * (ts as i32 - fp.atsg_sig[0]);
            index += sb as i32 + 1;
            let index = (index % 512) as usize;

            fp.noise_idx[cell] = index as i16;

            let lev = fp.noise_lev_sb_adj[atsg][sb];

            let v = cf.qmf_noise.at_mut(ts, sb);
            v.re = lev * ASPX_NOISE[index][0];
            v.im = lev * ASPX_NOISE[index][1];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelFrame;

    #[test]
    fn verify_envelope_boundary() {
        // Any non-negative quantized value maps to a finite positive gain
        // under both quantization divisors.
        let mut cf = ChannelFrame::new();

        cf.aspx.num_env = 1;
        cf.aspx.num_sbg_sig[0] = 3;
        cf.aspx.tables.num_sbg_noise = 2;
        cf.aspx.num_noise = 1;

        for qmode in 0..2 {
            cf.aspx.qmode_env = qmode;
            for &q in &[0i32, 1, 7, 31, 63] {
                cf.aspx.qscf_sig[0][..3].fill(q);
                cf.aspx.qscf_noise[0][..2].fill(q);

                deq_signal_factors_mono(&mut cf);
                deq_noise_factors_mono(&mut cf);

                let fp = &*cf.aspx;
                for sbg in 0..3 {
                    let g = fp.scf_sig_sbg[0][sbg];
                    assert!(g.is_finite() && g > 0.0, "qmode {} q {} gain {}", qmode, q, g);
                }
                for sbg in 0..2 {
                    let g = fp.scf_noise_sbg[0][sbg];
                    assert!(g.is_finite() && g > 0.0);
                }
            }
        }
    }

    #[test]
    fn verify_noise_counter_is_deterministic() {
        let ctx = AspxContext {
            num_qmf_ts: 16,
            num_aspx_ts: 16,
            num_ts_in_ats: 1,
            ts_offset_hfgen: 3,
            fs_index: true,
        };

        let mut make = || {
            let mut cf = ChannelFrame::new();
            {
                let fp = &mut *cf.aspx;
                fp.num_env = 1;
                fp.atsg_sig[0] = 0;
                fp.atsg_sig[1] = 16;
                fp.tables.num_sb_aspx = 8;
                fp.tables.sbx = 16;
                fp.master_reset = true;
                for sb in 0..8 {
                    fp.noise_lev_sb_adj[0][sb] = 1.0;
                }
            }
            let state = crate::channel::ChannelState::new();
            generate_noise(&ctx, &state, &mut cf);
            cf
        };

        let a = make();
        let b = make();

        for ts in 0..16 {
            for sb in 0..8 {
                assert_eq!(a.qmf_noise.at(ts, sb), b.qmf_noise.at(ts, sb));
                assert_eq!(
                    a.aspx.noise_idx[ts * NUM_QMF_BANDS + sb],
                    b.aspx.noise_idx[ts * NUM_QMF_BANDS + sb]
                );
            }
        }

        // Counters advance, so consecutive cells differ in general.
        assert_ne!(a.aspx.noise_idx[0], a.aspx.noise_idx[1]);
    }

    #[test]
    fn verify_zero_energy_limiter_degrades() {
        // With zero estimated and target energy, gains must stay finite and
        // non-negative rather than fail.
        let mut cf = ChannelFrame::new();
        {
            let fp = &mut *cf.aspx;
            fp.num_env = 1;
            fp.num_env_prev = 1;
            fp.num_sbg_sig[0] = 1;
            fp.tables.num_sbg_sig_highres = 1;
            fp.tables.sbg_sig_highres[0] = 16;
            fp.tables.sbg_sig_highres[1] = 24;
            fp.sbg_sig[0][0] = 16;
            fp.sbg_sig[0][1] = 24;
            fp.tables.sbx = 16;
            fp.tables.num_sb_aspx = 8;
            fp.tables.num_sbg_lim = 1;
            fp.tables.sbg_lim[0] = 16;
            fp.tables.sbg_lim[1] = 24;
            fp.tsg_ptr = -1;
        }

        let state = crate::channel::ChannelState::new();
        add_sinusoids(&state, &mut cf);

        let fp = &*cf.aspx;
        for sb in 0..8 {
            assert!(!fp.sig_gain_sb_adj[0][sb].is_nan());
            assert!(fp.sig_gain_sb_adj[0][sb] >= 0.0);
            assert!(!fp.noise_lev_sb_adj[0][sb].is_nan());
            assert!(fp.noise_lev_sb_adj[0][sb] >= 0.0);
        }
    }
}
