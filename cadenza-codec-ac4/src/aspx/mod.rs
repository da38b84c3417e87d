// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The A-SPX engine: spectral band replication of the high band from the
//! decoded low band plus side information.
//!
//! `data` parses side information and builds the subband-group tables, `env`
//! derives envelopes and gains, and `hfgen` runs the harmonic extension and
//! assembles the regenerated band into the QMF grid.

pub mod data;
pub mod env;
pub mod hfgen;

use cadenza_core::errors::Result;
use cadenza_core::io::BitReader;

use crate::channel::{ChannelFrame, ChannelState};

/// Substream-level regeneration configuration, read on independent frames and
/// persistent in between.
#[derive(Clone, Default)]
pub struct AspxConfig {
    pub quant_mode_env: usize,
    pub start_freq: usize,
    pub prev_start_freq: usize,
    pub stop_freq: usize,
    pub prev_stop_freq: usize,
    pub master_freq_scale: bool,
    pub prev_master_freq_scale: bool,
    pub interpolation: bool,
    pub preflat: bool,
    pub limiter: bool,
    pub noise_sbg: usize,
    pub num_env_bits_fixfix: bool,
    pub freq_res_mode: usize,
}

/// Reads the regeneration configuration, keeping the previous master-table
/// parameters for reset detection.
pub fn aspx_config(bs: &mut BitReader<'_>, cfg: &mut AspxConfig) -> Result<()> {
    cfg.quant_mode_env = usize::from(bs.read_bit()?);
    cfg.prev_start_freq = cfg.start_freq;
    cfg.start_freq = bs.read_bits(3)? as usize;
    cfg.prev_stop_freq = cfg.stop_freq;
    cfg.stop_freq = bs.read_bits(2)? as usize;
    cfg.prev_master_freq_scale = cfg.master_freq_scale;
    cfg.master_freq_scale = bs.read_bit()?;
    cfg.interpolation = bs.read_bit()?;
    cfg.preflat = bs.read_bit()?;
    cfg.limiter = bs.read_bit()?;
    cfg.noise_sbg = bs.read_bits(2)? as usize;
    cfg.num_env_bits_fixfix = bs.read_bit()?;
    cfg.freq_res_mode = bs.read_bits(2)? as usize;
    Ok(())
}

/// Frame-wide timing derived from the frame length base.
#[derive(Clone, Copy)]
pub struct AspxContext {
    pub num_qmf_ts: usize,
    pub num_aspx_ts: usize,
    pub num_ts_in_ats: usize,
    pub ts_offset_hfgen: usize,
    pub fs_index: bool,
}

/// The per-channel stages downstream of envelope dequantization.
fn regenerate(
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state: &ChannelState,
    cf: &mut ChannelFrame,
    first_frame: &mut bool,
) {
    hfgen::preflattening(ctx, cf);
    hfgen::covariance(ctx, state, cf);
    hfgen::alphas(cf);
    hfgen::chirps(state, cf);
    hfgen::create_high_signal(cfg, ctx, cf);
    env::estimate_spectral_envelopes(cfg, ctx, cf);
    env::map_signoise(cf);
    env::add_sinusoids(state, cf);
    env::generate_tones(ctx, state, cf, first_frame);
    env::generate_noise(ctx, state, cf);
    hfgen::assemble_hf_signal(ctx, state, cf);
}

/// Runs the pipeline for a mono channel.
pub fn process_mono(
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state: &ChannelState,
    cf: &mut ChannelFrame,
    first_frame: &mut bool,
) {
    hfgen::build_low_band(ctx, state, cf);

    env::qsignal_scale_factors(state, cf, 0);
    env::qnoise_scale_factors(state, cf, 0);
    env::deq_signal_factors_mono(cf);
    env::deq_noise_factors_mono(cf);

    regenerate(cfg, ctx, state, cf, first_frame);
}

/// Runs the pipeline for a channel pair, honouring balance coding.
#[allow(clippy::too_many_arguments)]
pub fn process_pair(
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state0: &ChannelState,
    state1: &ChannelState,
    cf0: &mut ChannelFrame,
    cf1: &mut ChannelFrame,
    first_frame: &mut bool,
) {
    hfgen::build_low_band(ctx, state0, cf0);
    hfgen::build_low_band(ctx, state1, cf1);

    env::qsignal_scale_factors(state0, cf0, 0);
    env::qsignal_scale_factors(state1, cf1, 1);
    env::qnoise_scale_factors(state0, cf0, 0);
    env::qnoise_scale_factors(state1, cf1, 1);

    if !cf0.aspx.balance {
        env::deq_signal_factors_mono(cf0);
        env::deq_signal_factors_mono(cf1);
        env::deq_noise_factors_mono(cf0);
        env::deq_noise_factors_mono(cf1);
    }
    else {
        env::deq_signoise_factors_stereo(cf0, cf1);
    }

    regenerate(cfg, ctx, state0, cf0, first_frame);
    regenerate(cfg, ctx, state1, cf1, first_frame);
}

/// Commits a channel's regeneration history after the frame fully decoded.
pub fn commit_channel(state: &mut ChannelState, cf: &ChannelFrame) {
    let aspx = &mut state.aspx;
    let fp = &cf.aspx;

    aspx.tables = fp.tables.clone();
    aspx.have_tables = true;
    aspx.xover_subband_offset = fp.xover_subband_offset;

    aspx.num_env_prev = fp.num_env;
    aspx.num_noise_prev = fp.num_noise;
    aspx.tsg_ptr_prev = fp.tsg_ptr;
    aspx.previous_stop_pos = fp.stop_pos;
    aspx.freqres_prev = fp.atsg_freqres;

    aspx.tna_mode_prev = fp.tna_mode;
    aspx.chirp_prev = fp.chirp;
    aspx.add_harmonic = fp.add_harmonic;

    aspx.qscf_sig_prev = fp.qscf_sig;
    aspx.qscf_noise_prev = fp.qscf_noise;

    aspx.sine_marker_prev = fp.sine_marker;
    aspx.sine_phase_prev.copy_from_slice(&fp.sine_phase);
    aspx.noise_idx_prev.copy_from_slice(&fp.noise_idx);

    aspx.q_prev.copy_from(&cf.q);
    aspx.q_low_prev.copy_from(&cf.q_low);
    aspx.q_high_prev.copy_from(&cf.q_high);
    aspx.y_prev.copy_from(&cf.y);
}
