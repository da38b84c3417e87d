// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bitstream parsing of the regeneration side data, and construction of the
//! subband-group partition tables.

use cadenza_core::errors::{invalid_aspx_error, Result};
use cadenza_core::io::BitReader;

use crate::channel::{AspxFrameParams, AspxState};
use crate::codebooks::{aspx_codebook, ASPX_INT_CLASS_CODEBOOK};
use crate::common::*;
use crate::tables::{fixed_envelope_borders, SBG_TEMPLATE_HIGHRES, SBG_TEMPLATE_LOWRES};

use super::{AspxConfig, AspxContext};

fn ceil_log2(x: u32) -> u32 {
    debug_assert!(x >= 2);
    32 - (x - 1).leading_zeros()
}

/// Builds the frame's subband-group tables: master (rebuilt only on a master
/// reset), high/low resolution signal tables, noise table, patches, and the
/// limiter table.
pub fn aspx_elements(
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state: &AspxState,
    fp: &mut AspxFrameParams,
    iframe: bool,
) -> Result<()> {
    fp.master_reset = iframe
        && (cfg.prev_start_freq != cfg.start_freq
            || cfg.prev_stop_freq != cfg.stop_freq
            || cfg.prev_master_freq_scale != cfg.master_freq_scale
            || !state.have_tables);

    if fp.master_reset {
        if cfg.master_freq_scale {
            fp.tables.num_sbg_master = 22 - 2 * cfg.start_freq - 2 * cfg.stop_freq;
            for sbg in 0..=fp.tables.num_sbg_master {
                fp.tables.sbg_master[sbg] =
                    usize::from(SBG_TEMPLATE_HIGHRES[2 * cfg.start_freq + sbg]);
            }
        }
        else {
            fp.tables.num_sbg_master = 20 - 2 * cfg.start_freq - 2 * cfg.stop_freq;
            for sbg in 0..=fp.tables.num_sbg_master {
                fp.tables.sbg_master[sbg] =
                    usize::from(SBG_TEMPLATE_LOWRES[2 * cfg.start_freq + sbg]);
            }
        }
    }
    else {
        if !state.have_tables {
            return invalid_aspx_error("ac4: no subband tables before an independent frame");
        }
        fp.tables.num_sbg_master = state.tables.num_sbg_master;
        fp.tables.sbg_master = state.tables.sbg_master;
    }

    let t = &mut fp.tables;

    t.sba = t.sbg_master[0];
    t.sbz = t.sbg_master[t.num_sbg_master];

    if fp.xover_subband_offset >= t.num_sbg_master {
        return invalid_aspx_error("ac4: crossover offset exceeds the master table");
    }

    t.num_sbg_sig_highres = t.num_sbg_master - fp.xover_subband_offset;
    for sbg in 0..=t.num_sbg_sig_highres {
        t.sbg_sig_highres[sbg] = t.sbg_master[sbg + fp.xover_subband_offset];
    }

    t.sbx = t.sbg_sig_highres[0];
    if t.sbx == 0 {
        return invalid_aspx_error("ac4: crossover subband is zero");
    }
    t.num_sb_aspx = t.sbg_sig_highres[t.num_sbg_sig_highres] - t.sbx;

    t.num_sbg_sig_lowres = t.num_sbg_sig_highres - t.num_sbg_sig_highres / 2;
    t.sbg_sig_lowres[0] = t.sbg_sig_highres[0];
    if t.num_sbg_sig_highres % 2 == 0 {
        for sbg in 1..=t.num_sbg_sig_lowres {
            t.sbg_sig_lowres[sbg] = t.sbg_sig_highres[2 * sbg];
        }
    }
    else {
        for sbg in 1..=t.num_sbg_sig_lowres {
            t.sbg_sig_lowres[sbg] = t.sbg_sig_highres[2 * sbg - 1];
        }
    }

    // Noise subband groups: a logarithmic split of the regenerated range.
    let octaves = (t.sbz as f32 / t.sbx as f32).log2();
    t.num_sbg_noise = ((cfg.noise_sbg as f32 * octaves + 0.5).floor() as usize).max(1);
    if t.num_sbg_noise > MAX_NOISE_SBG {
        return invalid_aspx_error("ac4: too many noise subband groups");
    }

    let mut idx = [0usize; MAX_NOISE_SBG + 1];
    t.sbg_noise[0] = t.sbg_sig_lowres[0];
    for sbg in 1..=t.num_sbg_noise {
        idx[sbg] =
            idx[sbg - 1] + (t.num_sbg_sig_lowres - idx[sbg - 1]) / (t.num_sbg_noise + 1 - sbg);
        t.sbg_noise[sbg] = t.sbg_sig_lowres[idx[sbg]];
    }

    build_patches(cfg, ctx, t)?;
    build_limiter_table(t)?;

    Ok(())
}

/// Walks the spectrum downward from the target edge, carving the largest
/// low-band runs that can seed the range below it.
fn build_patches(
    cfg: &AspxConfig,
    ctx: &AspxContext,
    t: &mut crate::channel::AspxTables,
) -> Result<()> {
    let sba = t.sba as i32;
    let sbx = t.sbx as i32;
    let top = (t.sbx + t.num_sb_aspx) as i32;

    let mut msb = sba;
    let mut usb = sbx;
    t.num_patches = 0;

    let goal_sb: i32 = if ctx.fs_index { 43 } else { 46 };
    let source_band_low: i32 = if cfg.master_freq_scale { 4 } else { 2 };

    let mut sbg = if (goal_sb as usize) < t.sbx + t.num_sb_aspx {
        let mut s = 0;
        let mut i = 0;
        while t.sbg_master[i] < goal_sb as usize {
            s = i + 1;
            i += 1;
        }
        s
    }
    else {
        t.num_sbg_master
    };

    let mut guard = 0;
    loop {
        guard += 1;
        if guard > 64 {
            return invalid_aspx_error("ac4: patch construction does not converge");
        }

        let mut j = sbg as i32;
        let mut sb = t.sbg_master[j as usize] as i32;
        let mut odd = (sb - 2 + sba) % 2;

        while sb > (sba - source_band_low + msb - odd) && j >= 1 {
            j -= 1;
            sb = t.sbg_master[j as usize] as i32;
            odd = (sb - 2 + sba) % 2;
        }

        let num_sb = (sb - usb).max(0);

        if num_sb > 0 {
            if t.num_patches >= MAX_PATCHES {
                return invalid_aspx_error("ac4: too many patches");
            }

            let start_sb = sba - odd - num_sb;
            if start_sb < 0 {
                return invalid_aspx_error("ac4: patch source below the spectrum");
            }

            t.patch_num_sb[t.num_patches] = num_sb as usize;
            t.patch_start_sb[t.num_patches] = start_sb as usize;
            usb = sb;
            msb = sb;
            t.num_patches += 1;
        }
        else {
            msb = sbx;
        }

        if t.sbg_master[sbg] as i32 - sb < 3 {
            sbg = t.num_sbg_master;
        }

        if sb == top || j <= 0 {
            break;
        }
    }

    // Drop a trailing sliver when there is more than one patch.
    if t.num_patches > 1 && t.patch_num_sb[t.num_patches - 1] < 3 {
        t.num_patches -= 1;
    }

    t.sbg_patches[0] = t.sbx;
    for i in 1..=t.num_patches {
        t.sbg_patches[i] = t.sbg_patches[i - 1] + t.patch_num_sb[i - 1];
    }

    Ok(())
}

/// The limiter table is the sorted, de-duplicated union of the low-resolution
/// signal table and the patch boundaries, with intervals narrower than ~0.245
/// octave collapsed in favour of patch boundaries.
fn build_limiter_table(t: &mut crate::channel::AspxTables) -> Result<()> {
    let n_entries = t.num_sbg_sig_lowres + t.num_patches;
    if n_entries > MAX_LIM_SBG {
        return invalid_aspx_error("ac4: limiter table overflow");
    }

    for sbg in 0..=t.num_sbg_sig_lowres {
        t.sbg_lim[sbg] = t.sbg_sig_lowres[sbg];
    }
    for sbg in 1..t.num_patches {
        t.sbg_lim[sbg + t.num_sbg_sig_lowres] = t.sbg_patches[sbg];
    }

    t.num_sbg_lim = t.num_sbg_sig_lowres + t.num_patches - 1;
    t.sbg_lim[..=t.num_sbg_lim].sort_unstable();

    let in_patches = |v: usize, t: &crate::channel::AspxTables| {
        t.sbg_patches[..=t.num_patches].contains(&v)
    };

    let mut sbg = 1;
    while sbg <= t.num_sbg_lim {
        let num_octaves = (t.sbg_lim[sbg] as f32 / t.sbg_lim[sbg - 1] as f32).log2();

        if num_octaves >= 0.245 {
            sbg += 1;
            continue;
        }

        if t.sbg_lim[sbg] == t.sbg_lim[sbg - 1] {
            remove_element(&mut t.sbg_lim, t.num_sbg_lim, sbg);
            t.num_sbg_lim -= 1;
        }
        else if in_patches(t.sbg_lim[sbg], t) {
            if in_patches(t.sbg_lim[sbg - 1], t) {
                sbg += 1;
            }
            else {
                remove_element(&mut t.sbg_lim, t.num_sbg_lim, sbg - 1);
                t.num_sbg_lim -= 1;
            }
        }
        else {
            remove_element(&mut t.sbg_lim, t.num_sbg_lim, sbg);
            t.num_sbg_lim -= 1;
        }
    }

    Ok(())
}

fn remove_element(arr: &mut [usize; MAX_LIM_SBG + 1], len: usize, at: usize) {
    for i in at..len {
        arr[i] = arr[i + 1];
    }
}

/// Frequency resolution of one envelope under the configured resolution mode.
fn freq_res_for(
    atsg_sig: &[i32],
    atsg: usize,
    tsg_ptr: i32,
    num_aspx_ts: usize,
    mode: usize,
    flags: &[u8],
) -> u8 {
    match mode {
        0 => flags[atsg],
        1 => 0,
        2 => {
            let wide =
                (atsg_sig[atsg + 1] - atsg_sig[atsg]) as f32 > num_aspx_ts as f32 / 6.0 + 3.25;
            if ((atsg as i32) < tsg_ptr && num_aspx_ts > 8) || wide {
                1
            }
            else {
                0
            }
        }
        _ => 1,
    }
}

/// Index of the signal border splitting the two noise envelopes.
fn noise_mid_border(tsg_ptr: i32, int_class: IntervalClass, num_atsg_sig: usize) -> usize {
    if tsg_ptr == -1 {
        if int_class == IntervalClass::VarFix {
            1
        }
        else {
            num_atsg_sig - 1
        }
    }
    else if int_class == IntervalClass::VarFix {
        num_atsg_sig - 1
    }
    else {
        (tsg_ptr.max(1) as usize).min(num_atsg_sig - 1)
    }
}

/// Derives the envelope borders and per-envelope frequency resolution from the
/// framing fields.
fn aspx_atsg(
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state: &AspxState,
    fp: &mut AspxFrameParams,
    iframe: bool,
) -> Result<()> {
    let num_sig = fp.num_env;
    let num_noise = fp.num_noise;

    if fp.int_class == IntervalClass::FixFix {
        fixed_envelope_borders(ctx.num_aspx_ts, num_sig, &mut fp.atsg_sig);
        fixed_envelope_borders(ctx.num_aspx_ts, num_noise, &mut fp.atsg_noise);

        fp.atsg_freqres[0] =
            freq_res_for(&fp.atsg_sig, 0, 0, ctx.num_aspx_ts, cfg.freq_res_mode, &fp.freq_res);
        for atsg in 1..num_sig {
            fp.atsg_freqres[atsg] = fp.atsg_freqres[0];
        }
    }
    else {
        match fp.int_class {
            IntervalClass::FixVar => {
                fp.atsg_sig[0] = 0;
                fp.atsg_sig[num_sig] = fp.var_bord_right + ctx.num_aspx_ts as i32;
                for tsg in 0..fp.num_rel_right {
                    fp.atsg_sig[num_sig - tsg - 1] =
                        fp.atsg_sig[num_sig - tsg] - fp.rel_bord_right[tsg];
                }
            }
            IntervalClass::VarFix => {
                fp.atsg_sig[0] = if iframe {
                    fp.var_bord_left
                }
                else {
                    state.previous_stop_pos - ctx.num_aspx_ts as i32
                };
                fp.atsg_sig[num_sig] = ctx.num_aspx_ts as i32;
                for tsg in 0..fp.num_rel_left {
                    fp.atsg_sig[tsg + 1] = fp.atsg_sig[tsg] + fp.rel_bord_left[tsg];
                }
            }
            IntervalClass::VarVar => {
                fp.atsg_sig[0] = if iframe {
                    fp.var_bord_left
                }
                else {
                    state.previous_stop_pos - ctx.num_aspx_ts as i32
                };
                fp.atsg_sig[num_sig] = fp.var_bord_right + ctx.num_aspx_ts as i32;
                for tsg in 0..fp.num_rel_left {
                    fp.atsg_sig[tsg + 1] = fp.atsg_sig[tsg] + fp.rel_bord_left[tsg];
                }
                for tsg in 0..fp.num_rel_right {
                    fp.atsg_sig[num_sig - tsg - 1] =
                        fp.atsg_sig[num_sig - tsg] - fp.rel_bord_right[tsg];
                }
            }
            IntervalClass::FixFix => unreachable!(),
        }

        fp.atsg_noise[0] = fp.atsg_sig[0];
        fp.atsg_noise[num_noise] = fp.atsg_sig[num_sig];
        if num_noise > 1 {
            fp.atsg_noise[1] =
                fp.atsg_sig[noise_mid_border(fp.tsg_ptr, fp.int_class, num_sig)];
        }

        for atsg in 0..num_sig {
            fp.atsg_freqres[atsg] = freq_res_for(
                &fp.atsg_sig,
                atsg,
                fp.tsg_ptr,
                ctx.num_aspx_ts,
                cfg.freq_res_mode,
                &fp.freq_res,
            );
        }
    }

    // Borders must be strictly increasing and inside the grid.
    for i in 0..num_sig {
        if fp.atsg_sig[i] >= fp.atsg_sig[i + 1] {
            return invalid_aspx_error("ac4: envelope borders not increasing");
        }
    }
    if fp.atsg_sig[0] < 0 || fp.atsg_sig[num_sig] > (ctx.num_aspx_ts + 3) as i32 {
        return invalid_aspx_error("ac4: envelope borders out of range");
    }

    fp.stop_pos = fp.atsg_sig[num_sig];

    for atsg in 0..num_sig {
        if fp.atsg_freqres[atsg] != 0 {
            fp.num_sbg_sig[atsg] = fp.tables.num_sbg_sig_highres;
            fp.sbg_sig[atsg] = fp.tables.sbg_sig_highres;
        }
        else {
            fp.num_sbg_sig[atsg] = fp.tables.num_sbg_sig_lowres;
            fp.sbg_sig[atsg] = fp.tables.sbg_sig_lowres;
        }
    }

    Ok(())
}

/// Reads the envelope framing: interval class, borders, and frequency
/// resolution flags.
pub fn aspx_framing(
    bs: &mut BitReader<'_>,
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state: &AspxState,
    fp: &mut AspxFrameParams,
    iframe: bool,
) -> Result<()> {
    fp.num_rel_left = 0;
    fp.num_rel_right = 0;

    fp.int_class = IntervalClass::from_index(ASPX_INT_CLASS_CODEBOOK.read(bs)?)?;

    let wide_bits = 1 + u32::from(ctx.num_aspx_ts > 8);

    match fp.int_class {
        IntervalClass::FixFix => {
            let env_bits = 1 + u32::from(cfg.num_env_bits_fixfix);
            fp.num_env = 1 + bs.read_bits(env_bits)? as usize;
            if fp.num_env > 4 {
                return invalid_aspx_error("ac4: too many envelopes in the fixed class");
            }

            if cfg.freq_res_mode == 0 {
                fp.freq_res[0] = u8::from(bs.read_bit()?);
            }
        }
        IntervalClass::FixVar => {
            fp.var_bord_right = bs.read_bits(2)? as i32;
            fp.num_rel_right = bs.read_bits(wide_bits)? as usize;
            for i in 0..fp.num_rel_right {
                fp.rel_bord_right[i] = 2 * bs.read_bits(wide_bits)? as i32 + 2;
            }
        }
        IntervalClass::VarFix => {
            if iframe {
                fp.var_bord_left = bs.read_bits(2)? as i32;
            }
            fp.num_rel_left = bs.read_bits(wide_bits)? as usize;
            for i in 0..fp.num_rel_left {
                fp.rel_bord_left[i] = 2 * bs.read_bits(wide_bits)? as i32 + 2;
            }
        }
        IntervalClass::VarVar => {
            if iframe {
                fp.var_bord_left = bs.read_bits(2)? as i32;
            }
            fp.num_rel_left = bs.read_bits(wide_bits)? as usize;
            for i in 0..fp.num_rel_left {
                fp.rel_bord_left[i] = 2 * bs.read_bits(wide_bits)? as i32 + 2;
            }
            fp.var_bord_right = bs.read_bits(2)? as i32;
            fp.num_rel_right = bs.read_bits(wide_bits)? as usize;
            for i in 0..fp.num_rel_right {
                fp.rel_bord_right[i] = 2 * bs.read_bits(wide_bits)? as i32 + 2;
            }
        }
    }

    if fp.int_class != IntervalClass::FixFix {
        fp.num_env = fp.num_rel_left + fp.num_rel_right + 1;
        if fp.num_env > MAX_ENVELOPES {
            return invalid_aspx_error("ac4: too many envelopes");
        }

        let ptr_bits = ceil_log2(fp.num_env as u32 + 2);
        fp.tsg_ptr = bs.read_bits(ptr_bits)? as i32 - 1;

        if cfg.freq_res_mode == 0 {
            for env in 0..fp.num_env {
                fp.freq_res[env] = u8::from(bs.read_bit()?);
            }
        }
    }
    else {
        fp.tsg_ptr = 0;
    }

    fp.num_noise = if fp.num_env > 1 { 2 } else { 1 };

    fp.num_env_prev =
        if state.num_env_prev == 0 { fp.num_env } else { state.num_env_prev };
    fp.num_noise_prev =
        if state.num_noise_prev == 0 { fp.num_noise } else { state.num_noise_prev };

    aspx_atsg(cfg, ctx, state, fp, iframe)
}

/// Copies framing-derived fields of the reference channel onto the
/// balance-coded channel of a pair.
pub fn copy_framing(fp0: &AspxFrameParams, fp1: &mut AspxFrameParams, state1: &AspxState) {
    fp1.int_class = fp0.int_class;
    fp1.num_env = fp0.num_env;
    fp1.num_noise = fp0.num_noise;
    fp1.tsg_ptr = fp0.tsg_ptr;
    fp1.freq_res = fp0.freq_res;
    fp1.atsg_sig = fp0.atsg_sig;
    fp1.atsg_noise = fp0.atsg_noise;
    fp1.atsg_freqres = fp0.atsg_freqres;
    fp1.num_sbg_sig = fp0.num_sbg_sig;
    fp1.sbg_sig = fp0.sbg_sig;
    fp1.stop_pos = fp0.stop_pos;

    fp1.num_env_prev =
        if state1.num_env_prev == 0 { fp1.num_env } else { state1.num_env_prev };
    fp1.num_noise_prev =
        if state1.num_noise_prev == 0 { fp1.num_noise } else { state1.num_noise_prev };
}

/// Reads the time/frequency differential direction flags.
pub fn aspx_delta_dir(bs: &mut BitReader<'_>, fp: &mut AspxFrameParams) -> Result<()> {
    for env in 0..fp.num_env {
        fp.sig_delta_dir[env] = bs.read_bit()?;
    }
    for env in 0..fp.num_noise {
        fp.noise_delta_dir[env] = bs.read_bit()?;
    }
    Ok(())
}

/// Reads the mono inter-window-coupling data: transient-noise modes, harmonic
/// markers, and inverse-coupling flags.
pub fn hfgen_iwc_1ch(
    bs: &mut BitReader<'_>,
    ctx: &AspxContext,
    state: &AspxState,
    fp: &mut AspxFrameParams,
) -> Result<()> {
    for n in 0..fp.tables.num_sbg_noise {
        fp.tna_mode[n] = bs.read_bits(2)? as u8;
    }

    fp.add_harmonic = state.add_harmonic;
    if bs.read_bit()? {
        for n in 0..fp.tables.num_sbg_sig_highres {
            fp.add_harmonic[n] = bs.read_bit()?;
        }
    }

    fp.fic_used_in_sfb = [false; MAX_SBG];
    if bs.read_bit()? {
        for n in 0..fp.tables.num_sbg_sig_highres {
            fp.fic_used_in_sfb[n] = bs.read_bit()?;
        }
    }

    fp.tic_used_in_slot = [false; MAX_QMF_TS];
    if bs.read_bit()? {
        for n in 0..ctx.num_aspx_ts {
            fp.tic_used_in_slot[n] = bs.read_bit()?;
        }
    }

    Ok(())
}

/// Reads the stereo inter-window-coupling data for a channel pair.
pub fn hfgen_iwc_2ch(
    bs: &mut BitReader<'_>,
    ctx: &AspxContext,
    state0: &AspxState,
    state1: &AspxState,
    fp0: &mut AspxFrameParams,
    fp1: &mut AspxFrameParams,
    balance: bool,
) -> Result<()> {
    for n in 0..fp0.tables.num_sbg_noise {
        fp0.tna_mode[n] = bs.read_bits(2)? as u8;
    }
    if !balance {
        for n in 0..fp0.tables.num_sbg_noise {
            fp1.tna_mode[n] = bs.read_bits(2)? as u8;
        }
    }
    else {
        for n in 0..fp0.tables.num_sbg_noise {
            fp1.tna_mode[n] = fp0.tna_mode[n];
        }
    }

    fp0.add_harmonic = state0.add_harmonic;
    if bs.read_bit()? {
        for n in 0..fp0.tables.num_sbg_sig_highres {
            fp0.add_harmonic[n] = bs.read_bit()?;
        }
    }
    fp1.add_harmonic = state1.add_harmonic;
    if bs.read_bit()? {
        for n in 0..fp0.tables.num_sbg_sig_highres {
            fp1.add_harmonic[n] = bs.read_bit()?;
        }
    }

    fp0.fic_used_in_sfb = [false; MAX_SBG];
    fp1.fic_used_in_sfb = [false; MAX_SBG];

    if bs.read_bit()? {
        if bs.read_bit()? {
            for n in 0..fp0.tables.num_sbg_sig_highres {
                fp0.fic_used_in_sfb[n] = bs.read_bit()?;
            }
        }
        if bs.read_bit()? {
            for n in 0..fp0.tables.num_sbg_sig_highres {
                fp1.fic_used_in_sfb[n] = bs.read_bit()?;
            }
        }
    }

    fp0.tic_used_in_slot = [false; MAX_QMF_TS];
    fp1.tic_used_in_slot = [false; MAX_QMF_TS];

    if bs.read_bit()? {
        let tic_copy = bs.read_bit()?;
        let mut tic_left = false;
        let mut tic_right = false;

        if !tic_copy {
            tic_left = bs.read_bit()?;
            tic_right = bs.read_bit()?;
        }

        if tic_copy || tic_left {
            for n in 0..ctx.num_aspx_ts {
                fp0.tic_used_in_slot[n] = bs.read_bit()?;
            }
        }

        if tic_right {
            for n in 0..ctx.num_aspx_ts {
                fp1.tic_used_in_slot[n] = bs.read_bit()?;
            }
        }

        if tic_copy {
            fp1.tic_used_in_slot = fp0.tic_used_in_slot;
        }
    }

    Ok(())
}

fn aspx_huff_data(
    bs: &mut BitReader<'_>,
    data_type: DataType,
    num_sbg: usize,
    quant_mode: usize,
    stereo_mode: StereoMode,
    time_direction: bool,
    data: &mut [i32],
) -> Result<()> {
    if !time_direction {
        let (cb, off) = aspx_codebook(data_type, quant_mode, stereo_mode, HcbType::F0);
        data[0] = i32::from(cb.read(bs)?) - off;

        let (cb, off) = aspx_codebook(data_type, quant_mode, stereo_mode, HcbType::Df);
        for item in data.iter_mut().take(num_sbg).skip(1) {
            *item = i32::from(cb.read(bs)?) - off;
        }
    }
    else {
        let (cb, off) = aspx_codebook(data_type, quant_mode, stereo_mode, HcbType::Dt);
        for item in data.iter_mut().take(num_sbg) {
            *item = i32::from(cb.read(bs)?) - off;
        }
    }

    Ok(())
}

/// Reads the per-envelope entropy-coded signal or noise values.
pub fn aspx_ec_data(
    bs: &mut BitReader<'_>,
    fp: &mut AspxFrameParams,
    data_type: DataType,
    stereo_mode: StereoMode,
) -> Result<()> {
    let (num_env, quant) = match data_type {
        DataType::Signal => (fp.num_env, fp.qmode_env),
        DataType::Noise => (fp.num_noise, 0),
    };

    for env in 0..num_env {
        let num_sbg = match data_type {
            DataType::Signal => {
                if fp.atsg_freqres[env] != 0 {
                    fp.tables.num_sbg_sig_highres
                }
                else {
                    fp.tables.num_sbg_sig_lowres
                }
            }
            DataType::Noise => fp.tables.num_sbg_noise,
        };

        let dir = match data_type {
            DataType::Signal => fp.sig_delta_dir[env],
            DataType::Noise => fp.noise_delta_dir[env],
        };

        let dt = data_type as usize;
        aspx_huff_data(bs, data_type, num_sbg, quant, stereo_mode, dir, &mut fp.data[dt][env])?;
    }

    Ok(())
}

/// Parses one channel's complete regeneration payload.
pub fn aspx_data_1ch(
    bs: &mut BitReader<'_>,
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state: &AspxState,
    fp: &mut AspxFrameParams,
    iframe: bool,
) -> Result<()> {
    fp.xover_subband_offset =
        if iframe { bs.read_bits(3)? as usize } else { state.xover_subband_offset };

    fp.balance = false;

    aspx_elements(cfg, ctx, state, fp, iframe)?;
    aspx_framing(bs, cfg, ctx, state, fp, iframe)?;

    fp.qmode_env = cfg.quant_mode_env;
    if fp.int_class == IntervalClass::FixFix && fp.num_env == 1 {
        fp.qmode_env = 0;
    }

    aspx_delta_dir(bs, fp)?;
    hfgen_iwc_1ch(bs, ctx, state, fp)?;

    aspx_ec_data(bs, fp, DataType::Signal, StereoMode::Level)?;
    aspx_ec_data(bs, fp, DataType::Noise, StereoMode::Level)?;

    Ok(())
}

/// Parses a channel pair's complete regeneration payload, with optional
/// balance coding of the second channel.
#[allow(clippy::too_many_arguments)]
pub fn aspx_data_2ch(
    bs: &mut BitReader<'_>,
    cfg: &AspxConfig,
    ctx: &AspxContext,
    state0: &AspxState,
    state1: &AspxState,
    fp0: &mut AspxFrameParams,
    fp1: &mut AspxFrameParams,
    iframe: bool,
) -> Result<()> {
    if iframe {
        fp0.xover_subband_offset = bs.read_bits(3)? as usize;
    }
    else {
        fp0.xover_subband_offset = state0.xover_subband_offset;
    }
    fp1.xover_subband_offset = fp0.xover_subband_offset;

    aspx_elements(cfg, ctx, state0, fp0, iframe)?;
    aspx_elements(cfg, ctx, state1, fp1, iframe)?;

    aspx_framing(bs, cfg, ctx, state0, fp0, iframe)?;

    fp0.qmode_env = cfg.quant_mode_env;
    if fp0.int_class == IntervalClass::FixFix && fp0.num_env == 1 {
        fp0.qmode_env = 0;
    }
    fp1.qmode_env = fp0.qmode_env;

    let balance = bs.read_bit()?;
    fp0.balance = balance;
    fp1.balance = balance;

    if !balance {
        aspx_framing(bs, cfg, ctx, state1, fp1, iframe)?;
        fp1.qmode_env = cfg.quant_mode_env;
        if fp1.int_class == IntervalClass::FixFix && fp1.num_env == 1 {
            fp1.qmode_env = 0;
        }
    }
    else {
        copy_framing(fp0, fp1, state1);
    }

    aspx_delta_dir(bs, fp0)?;
    aspx_delta_dir(bs, fp1)?;
    hfgen_iwc_2ch(bs, ctx, state0, state1, fp0, fp1, balance)?;

    aspx_ec_data(bs, fp0, DataType::Signal, StereoMode::Level)?;
    aspx_ec_data(
        bs,
        fp1,
        DataType::Signal,
        if balance { StereoMode::Balance } else { StereoMode::Level },
    )?;
    aspx_ec_data(bs, fp0, DataType::Noise, StereoMode::Level)?;
    aspx_ec_data(
        bs,
        fp1,
        DataType::Noise,
        if balance { StereoMode::Balance } else { StereoMode::Level },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::AspxFrameParams;

    fn test_cfg() -> AspxConfig {
        AspxConfig {
            master_freq_scale: true,
            noise_sbg: 2,
            // Force a rebuild on the first independent frame.
            prev_start_freq: usize::MAX,
            ..Default::default()
        }
    }

    fn test_ctx() -> AspxContext {
        AspxContext {
            num_qmf_ts: 16,
            num_aspx_ts: 16,
            num_ts_in_ats: 1,
            ts_offset_hfgen: 3,
            fs_index: true,
        }
    }

    fn build_tables(cfg: &AspxConfig, xover: usize) -> Box<AspxFrameParams> {
        let ctx = test_ctx();
        let state = crate::channel::ChannelState::new().aspx;
        let mut fp = Box::new(AspxFrameParams::new());
        fp.xover_subband_offset = xover;
        aspx_elements(cfg, &ctx, &state, &mut fp, true).unwrap();
        fp
    }

    #[test]
    fn verify_patch_monotonicity() {
        for xover in 0..6 {
            let fp = build_tables(&test_cfg(), xover);
            let t = &fp.tables;

            assert!(t.num_patches >= 1 && t.num_patches <= MAX_PATCHES);

            // Patches tile upward from the crossover without overlap.
            assert_eq!(t.sbg_patches[0], t.sbx);
            for i in 1..=t.num_patches {
                assert!(t.sbg_patches[i] > t.sbg_patches[i - 1]);
                assert!(t.sbg_patches[i] <= t.sbz);
            }

            // The full-range configuration covers the regenerated range
            // exactly.
            if xover == 0 {
                assert_eq!(t.sbg_patches[t.num_patches], t.sbz);
            }

            // Every patch sources strictly below the crossover.
            for i in 0..t.num_patches {
                assert!(t.patch_start_sb[i] + t.patch_num_sb[i] <= t.sbx);
            }
        }
    }

    #[test]
    fn verify_idempotent_master_rebuild() {
        let cfg = test_cfg();
        let a = build_tables(&cfg, 2);
        let b = build_tables(&cfg, 2);

        assert_eq!(a.tables.num_sbg_master, b.tables.num_sbg_master);
        assert_eq!(a.tables.sbg_master, b.tables.sbg_master);
        assert_eq!(a.tables.sbg_lim, b.tables.sbg_lim);
        assert_eq!(a.tables.num_patches, b.tables.num_patches);
        assert_eq!(a.tables.patch_start_sb, b.tables.patch_start_sb);
    }

    #[test]
    fn verify_subband_group_bounds() {
        let fp = build_tables(&test_cfg(), 1);
        let t = &fp.tables;

        // Strictly increasing, bounded by the band edges.
        for i in 0..t.num_sbg_master {
            assert!(t.sbg_master[i] < t.sbg_master[i + 1]);
        }
        assert!(t.sba >= 1);
        assert!(t.sbz <= NUM_QMF_BANDS);
        assert!(t.sbx >= t.sba);

        // The limiter table is ascending after de-duplication.
        for i in 0..t.num_sbg_lim {
            assert!(t.sbg_lim[i] < t.sbg_lim[i + 1]);
        }

        assert!(t.num_sbg_noise >= 1 && t.num_sbg_noise <= MAX_NOISE_SBG);
    }

    #[test]
    fn verify_fixfix_framing_borders() {
        let cfg = test_cfg();
        let ctx = test_ctx();
        let state = crate::channel::ChannelState::new().aspx;
        let mut fp = Box::new(AspxFrameParams::new());
        fp.xover_subband_offset = 1;
        aspx_elements(&cfg, &ctx, &state, &mut fp, true).unwrap();

        // FIXFIX, one envelope: class codeword then a single envelope bit.
        let mut bw = cadenza_core::io::BitWriter::new();
        let (code, len) = ASPX_INT_CLASS_CODEBOOK.codeword(0).unwrap();
        bw.put_bits(code, len);
        bw.put_bits(0, 1); // num_env = 1
        bw.put_bits(0, 1); // freq_res flag (mode 0)
        let buf = bw.finish();

        let mut bs = BitReader::new(&buf);
        aspx_framing(&mut bs, &cfg, &ctx, &state, &mut fp, true).unwrap();

        assert_eq!(fp.int_class, IntervalClass::FixFix);
        assert_eq!(fp.num_env, 1);
        assert_eq!(fp.num_noise, 1);
        assert_eq!(&fp.atsg_sig[..2], &[0, 16]);
        assert_eq!(fp.stop_pos, 16);
    }
}
