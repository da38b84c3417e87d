// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parametric coupling (A-CPL) call boundary.
//!
//! Coupling synthesis is a peer subsystem outside this decoder; its bitstream
//! payload is still consumed here so the cursor stays aligned for the data
//! that follows it.

use cadenza_core::errors::Result;
use cadenza_core::io::BitReader;

use crate::codebooks::ACPL_CODEBOOKS;

/// Parameter band count per `acpl_num_param_bands_id`.
const ACPL_NUM_PARAM_BANDS: [usize; 4] = [7, 9, 12, 15];

/// First coupled parameter band per `(band region, num_param_bands_id)`.
const ACPL_QMF_SUBBANDS: [[usize; 4]; 8] = [
    [0, 0, 0, 0],
    [1, 1, 1, 1],
    [2, 2, 2, 2],
    [2, 3, 3, 3],
    [3, 4, 4, 4],
    [3, 4, 5, 5],
    [4, 5, 7, 7],
    [5, 7, 9, 10],
];

/// Substream-level coupling configuration.
#[derive(Clone, Copy, Default)]
pub struct AcplConfig {
    pub qmf_band: usize,
    pub param_band: usize,
    pub num_param_bands_id: usize,
    pub quant_mode: [usize; 2],
}

fn sb_to_pb(num_param_bands_id: usize, qmf_band: usize) -> usize {
    let region = match qmf_band {
        0..=8 => (qmf_band + 1) / 2,
        9..=10 => 5,
        11..=17 => 6,
        _ => 7,
    };
    ACPL_QMF_SUBBANDS[region.min(7)][num_param_bands_id]
}

/// Reads the single-channel coupling configuration. In partial mode the
/// coupled range starts above a coded QMF band.
pub fn acpl_config_1ch(
    bs: &mut BitReader<'_>,
    cfg: &mut AcplConfig,
    partial: bool,
) -> Result<()> {
    cfg.qmf_band = 0;
    cfg.param_band = 0;
    cfg.num_param_bands_id = bs.read_bits(2)? as usize;
    cfg.quant_mode[0] = usize::from(bs.read_bit()?);

    if partial {
        cfg.qmf_band = bs.read_bits(3)? as usize + 1;
        cfg.param_band = sb_to_pb(cfg.num_param_bands_id, cfg.qmf_band);
    }

    Ok(())
}

/// Reads the two-channel coupling configuration.
pub fn acpl_config_2ch(bs: &mut BitReader<'_>, cfg: &mut AcplConfig) -> Result<()> {
    cfg.qmf_band = 0;
    cfg.param_band = 0;
    cfg.num_param_bands_id = bs.read_bits(2)? as usize;
    cfg.quant_mode[0] = usize::from(bs.read_bit()?);
    cfg.quant_mode[1] = usize::from(bs.read_bit()?);
    Ok(())
}

fn acpl_framing_data(bs: &mut BitReader<'_>) -> Result<usize> {
    let interpolation_type = bs.read_bit()?;
    let num_param_sets_cod = usize::from(bs.read_bit()?);

    if interpolation_type {
        for _ in 0..num_param_sets_cod + 1 {
            let _param_timeslot = bs.read_bits(5)?;
        }
    }

    Ok(num_param_sets_cod)
}

/// Codebook class of a coupling parameter kind.
fn acpl_class(data_type: usize) -> usize {
    match data_type {
        // alpha1, alpha2
        0 | 1 => 0,
        // beta1, beta2
        2 | 3 => 1,
        // beta3
        4 => 2,
        // gamma1..gamma6
        _ => 3,
    }
}

fn acpl_huff_data(
    bs: &mut BitReader<'_>,
    data_type: usize,
    data_bands: usize,
    start_band: usize,
    quant_mode: usize,
) -> Result<()> {
    let class = acpl_class(data_type);
    let diff_time = bs.read_bit()?;

    if !diff_time {
        let _ = ACPL_CODEBOOKS[class][quant_mode][0].read(bs)?;
        for _ in start_band + 1..data_bands {
            let _ = ACPL_CODEBOOKS[class][quant_mode][1].read(bs)?;
        }
    }
    else {
        for _ in start_band..data_bands {
            let _ = ACPL_CODEBOOKS[class][quant_mode][2].read(bs)?;
        }
    }

    Ok(())
}

fn acpl_ec_data(
    bs: &mut BitReader<'_>,
    num_param_sets: usize,
    data_type: usize,
    data_bands: usize,
    start_band: usize,
    quant_mode: usize,
) -> Result<()> {
    for _ in 0..num_param_sets + 1 {
        acpl_huff_data(bs, data_type, data_bands, start_band, quant_mode)?;
    }
    Ok(())
}

/// Consumes a single channel's coupling payload.
pub fn acpl_data_1ch(bs: &mut BitReader<'_>, cfg: &AcplConfig) -> Result<()> {
    let num_param_sets = acpl_framing_data(bs)?;

    let num_bands = ACPL_NUM_PARAM_BANDS[cfg.num_param_bands_id];
    let start = cfg.param_band;

    // alpha1 and beta1.
    acpl_ec_data(bs, num_param_sets, 0, num_bands, start, cfg.quant_mode[0])?;
    acpl_ec_data(bs, num_param_sets, 2, num_bands, start, cfg.quant_mode[0])?;

    Ok(())
}

/// Consumes a channel pair's coupling payload.
pub fn acpl_data_2ch(bs: &mut BitReader<'_>, cfg: &AcplConfig) -> Result<()> {
    let num_param_sets = acpl_framing_data(bs)?;

    let num_bands = ACPL_NUM_PARAM_BANDS[cfg.num_param_bands_id];
    let start = cfg.param_band;

    // alpha1, alpha2, beta1, beta2, beta3 on the first channel.
    for data_type in 0..5 {
        acpl_ec_data(bs, num_param_sets, data_type, num_bands, start, cfg.quant_mode[0])?;
    }
    // gamma1..gamma6 on the second.
    for data_type in 5..11 {
        acpl_ec_data(bs, num_param_sets, data_type, num_bands, start, cfg.quant_mode[1])?;
    }

    Ok(())
}
