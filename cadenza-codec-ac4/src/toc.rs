// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Table-of-contents parsing: stream version, sequence counter, presentation
//! and substream-group discovery, and the substream index table. Also the
//! structural readers for the metadata that trails the audio payload;
//! metadata is consumed, never reinterpreted.

use log::warn;

use cadenza_core::errors::{invalid_block_error, unsupported_error, Result};
use cadenza_core::io::BitReader;

use crate::codebooks::{BITRATE_INDICATOR_CODEBOOK, CHANNEL_MODE_CODEBOOK};
use crate::tables::FRAME_LEN_BASE_BY_RATE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubstreamType {
    Substream,
    Presentation,
}

#[derive(Clone, Default)]
pub struct SubstreamInfo {
    pub sus_ver: u32,
    pub channel_mode: usize,
    pub sf_multiplier: usize,
    pub bitrate_indicator: usize,
    pub add_ch_base: bool,
    pub iframe: [bool; 4],
    pub substream_index: usize,
}

#[derive(Clone, Default)]
pub struct PresentationInfo {
    pub single_substream: bool,
    pub presentation_config: usize,
    pub presentation_version: u32,
    pub mdcompat: u32,
    pub presentation_id: u32,
    pub frame_rate_factor: usize,
    pub frame_rate_fraction: usize,
    pub pre_virtualized: bool,
    pub n_substream_groups: usize,
    pub ssinfo: SubstreamInfo,
}

pub struct Toc {
    pub version: u32,
    pub sequence_counter: u32,
    pub fs_index: bool,
    pub frame_rate_index: usize,
    pub frame_len_base: usize,
    pub iframe_global: bool,
    pub nb_presentations: usize,
    pub payload_base: usize,
    pub presentations: Vec<PresentationInfo>,
    pub groups: Vec<SubstreamInfo>,
    pub nb_substreams: usize,
    pub substream_size: [usize; 32],
    pub substream_type: [SubstreamType; 32],
}

fn frame_rate_multiply_info(
    bs: &mut BitReader<'_>,
    frame_rate_index: usize,
    p: &mut PresentationInfo,
) -> Result<()> {
    p.frame_rate_factor = 1;

    match frame_rate_index {
        2 | 3 | 4 => {
            if bs.read_bit()? {
                p.frame_rate_factor = if bs.read_bit()? { 4 } else { 2 };
            }
        }
        0 | 1 | 7 | 8 | 9 => {
            if bs.read_bit()? {
                p.frame_rate_factor = 2;
            }
        }
        _ => {}
    }

    Ok(())
}

fn frame_rate_fractions_info(
    bs: &mut BitReader<'_>,
    frame_rate_index: usize,
    p: &mut PresentationInfo,
) -> Result<()> {
    p.frame_rate_fraction = 1;

    if (5..=9).contains(&frame_rate_index) && p.frame_rate_factor == 1 && bs.read_bit()? {
        p.frame_rate_fraction = 2;
    }

    if (10..=12).contains(&frame_rate_index) && bs.read_bit()? {
        p.frame_rate_fraction = if bs.read_bit()? { 4 } else { 2 };
    }

    Ok(())
}

fn emdf_protection(bs: &mut BitReader<'_>) -> Result<()> {
    for _ in 0..2 {
        match bs.read_bits(2)? {
            0 => {}
            1 => bs.ignore_bits(8)?,
            2 => bs.ignore_bits(32)?,
            _ => bs.ignore_bits(128)?,
        }
    }
    Ok(())
}

fn emdf_info(bs: &mut BitReader<'_>) -> Result<()> {
    let version = bs.read_bits(2)?;
    if version == 3 {
        let _ = bs.read_escaped(2)?;
    }
    let key_id = bs.read_bits(3)?;
    if key_id == 7 {
        let _ = bs.read_escaped(3)?;
    }

    if bs.read_bit()? {
        let substream_index = bs.read_bits(2)?;
        if substream_index == 3 {
            let _ = bs.read_escaped(2)?;
        }
    }

    emdf_protection(bs)
}

fn content_type(bs: &mut BitReader<'_>) -> Result<()> {
    bs.ignore_bits(3)?;
    if bs.read_bit()? {
        if bs.read_bit()? {
            bs.ignore_bits(1)?;
            bs.ignore_bits(16)?;
        }
        else {
            let language_tag_bytes = bs.read_bits(6)?;
            bs.ignore_bits(8 * language_tag_bytes)?;
        }
    }
    Ok(())
}

fn read_channel_mode(bs: &mut BitReader<'_>) -> Result<usize> {
    let mut channel_mode = usize::from(CHANNEL_MODE_CODEBOOK.read(bs)?);
    if channel_mode == 16 {
        channel_mode += bs.read_escaped(2)? as usize;
    }
    Ok(channel_mode)
}

fn hsf_ext_substream_info(bs: &mut BitReader<'_>, substream_present: bool) -> Result<()> {
    if substream_present {
        let index = bs.read_bits(2)?;
        if index == 3 {
            let _ = bs.read_escaped(2)?;
        }
    }
    Ok(())
}

fn substream_info(
    bs: &mut BitReader<'_>,
    fs_index: bool,
    frame_rate_factor: usize,
    toc: &mut Toc,
    ssi: &mut SubstreamInfo,
) -> Result<()> {
    ssi.sus_ver = 0;
    ssi.channel_mode = read_channel_mode(bs)?;

    if fs_index && bs.read_bit()? {
        ssi.sf_multiplier = 1 + usize::from(bs.read_bit()?);
    }

    if bs.read_bit()? {
        ssi.bitrate_indicator = usize::from(BITRATE_INDICATOR_CODEBOOK.read(bs)?);
    }

    if (7..=10).contains(&ssi.channel_mode) {
        ssi.add_ch_base = bs.read_bit()?;
    }

    if bs.read_bit()? {
        content_type(bs)?;
    }

    for i in 0..frame_rate_factor.min(4) {
        ssi.iframe[i] = bs.read_bit()?;
    }

    ssi.substream_index = bs.read_bits(2)? as usize;
    if ssi.substream_index == 3 {
        ssi.substream_index += bs.read_escaped(2)? as usize;
    }
    if ssi.substream_index < toc.substream_type.len() {
        toc.substream_type[ssi.substream_index] = SubstreamType::Substream;
    }

    Ok(())
}

fn presentation_config_ext_info(bs: &mut BitReader<'_>) -> Result<()> {
    let mut n_skip_bytes = bs.read_bits(5)? as usize;
    if bs.read_bit()? {
        n_skip_bytes += (bs.read_escaped(2)? as usize) << 5;
    }
    bs.ignore_bits(8 * n_skip_bytes as u32)?;
    Ok(())
}

fn presentation_info(
    bs: &mut BitReader<'_>,
    fs_index: bool,
    frame_rate_index: usize,
    toc: &mut Toc,
    p: &mut PresentationInfo,
) -> Result<()> {
    p.single_substream = bs.read_bit()?;
    if !p.single_substream {
        p.presentation_config = bs.read_bits(3)? as usize;
        if p.presentation_config == 7 {
            p.presentation_config += bs.read_escaped(2)? as usize;
        }
    }

    p.presentation_version = bs.read_unary(false)?;

    let mut add_emdf_substreams = false;
    if !p.single_substream && p.presentation_config == 6 {
        add_emdf_substreams = true;
    }
    else {
        p.mdcompat = bs.read_bits(3)?;

        if bs.read_bit()? {
            p.presentation_id = bs.read_escaped(2)?;
        }

        frame_rate_multiply_info(bs, frame_rate_index, p)?;
        emdf_info(bs)?;

        if p.single_substream {
            let mut ssi = std::mem::take(&mut p.ssinfo);
            substream_info(bs, fs_index, p.frame_rate_factor, toc, &mut ssi)?;
            p.ssinfo = ssi;
        }
        else {
            let _hsf_ext = bs.read_bit()?;
            match p.presentation_config {
                0 => {
                    let mut ssi = std::mem::take(&mut p.ssinfo);
                    substream_info(bs, fs_index, p.frame_rate_factor, toc, &mut ssi)?;
                    hsf_ext_substream_info(bs, true)?;
                    substream_info(bs, fs_index, p.frame_rate_factor, toc, &mut ssi)?;
                    p.ssinfo = ssi;
                }
                _ => presentation_config_ext_info(bs)?,
            }
        }

        p.pre_virtualized = bs.read_bit()?;
        add_emdf_substreams = bs.read_bit()?;
    }

    if add_emdf_substreams {
        let mut n = bs.read_bits(2)? as usize;
        if n == 0 {
            n = bs.read_escaped(2)? as usize + 4;
        }
        for _ in 0..n.min(32) {
            emdf_info(bs)?;
        }
    }

    Ok(())
}

fn sgi_specifier(bs: &mut BitReader<'_>, version: u32, total_groups: &mut usize) -> Result<usize> {
    if version == 1 {
        return unsupported_error("ac4: version 1 group specifier");
    }

    let mut group_index = bs.read_bits(3)? as usize;
    if group_index == 7 {
        group_index += bs.read_escaped(2)? as usize;
    }

    *total_groups = (*total_groups).max(group_index);
    Ok(group_index)
}

fn presentation_v1_info(
    bs: &mut BitReader<'_>,
    version: u32,
    fs_index: bool,
    frame_rate_index: usize,
    toc: &mut Toc,
    total_groups: &mut usize,
    p: &mut PresentationInfo,
) -> Result<()> {
    let single_substream_group = bs.read_bit()?;
    if !single_substream_group {
        p.presentation_config = bs.read_bits(3)? as usize;
        if p.presentation_config == 7 {
            p.presentation_config += bs.read_escaped(2)? as usize;
        }
    }

    if version != 1 {
        p.presentation_version = bs.read_unary(false)?;
    }

    let mut add_emdf_substreams = false;
    if !single_substream_group && p.presentation_config == 6 {
        add_emdf_substreams = true;
    }
    else {
        if version != 1 {
            p.mdcompat = bs.read_bits(3)?;
        }

        if bs.read_bit()? {
            p.presentation_id = bs.read_escaped(2)?;
        }

        frame_rate_multiply_info(bs, frame_rate_index, p)?;
        frame_rate_fractions_info(bs, frame_rate_index, p)?;
        emdf_info(bs)?;

        if bs.read_bit()? {
            let _enable_presentation = bs.read_bit()?;
        }

        if single_substream_group {
            sgi_specifier(bs, version, total_groups)?;
            p.n_substream_groups = 1;
        }
        else {
            let _multi_pid = bs.read_bit()?;
            match p.presentation_config {
                0 | 1 | 2 => {
                    sgi_specifier(bs, version, total_groups)?;
                    sgi_specifier(bs, version, total_groups)?;
                    p.n_substream_groups = if p.presentation_config == 1 { 1 } else { 2 };
                }
                3 | 4 => {
                    sgi_specifier(bs, version, total_groups)?;
                    sgi_specifier(bs, version, total_groups)?;
                    sgi_specifier(bs, version, total_groups)?;
                    p.n_substream_groups = if p.presentation_config == 4 { 2 } else { 3 };
                }
                5 => {
                    p.n_substream_groups = bs.read_bits(2)? as usize + 2;
                    if p.n_substream_groups == 5 {
                        p.n_substream_groups += bs.read_escaped(2)? as usize;
                    }
                    for _ in 0..p.n_substream_groups.min(8) {
                        sgi_specifier(bs, version, total_groups)?;
                    }
                }
                _ => presentation_config_ext_info(bs)?,
            }
        }

        p.pre_virtualized = bs.read_bit()?;
        add_emdf_substreams = bs.read_bit()?;

        // presentation_substream_info
        let _alternative = bs.read_bit()?;
        let _pres_ndot = bs.read_bit()?;
        let mut index = bs.read_bits(2)? as usize;
        if index == 3 {
            index += bs.read_escaped(2)? as usize;
        }
        if index < toc.substream_type.len() {
            toc.substream_type[index] = SubstreamType::Presentation;
        }
    }

    if add_emdf_substreams {
        let mut n = bs.read_bits(2)? as usize;
        if n == 0 {
            n = bs.read_escaped(2)? as usize + 4;
        }
        for _ in 0..n.min(32) {
            emdf_info(bs)?;
        }
    }

    Ok(())
}

fn substream_info_chan(
    bs: &mut BitReader<'_>,
    fs_index: bool,
    frame_rate_factor: usize,
    substreams_present: bool,
    sus_ver: u32,
    ssi: &mut SubstreamInfo,
) -> Result<()> {
    ssi.sus_ver = sus_ver;
    ssi.channel_mode = read_channel_mode(bs)?;

    if (11..=14).contains(&ssi.channel_mode) {
        let _back_channels_present = bs.read_bit()?;
        let _centre_present = bs.read_bit()?;
        let _top_channels_present = bs.read_bits(2)?;
    }

    if fs_index && bs.read_bit()? {
        ssi.sf_multiplier = 1 + usize::from(bs.read_bit()?);
    }

    if bs.read_bit()? {
        ssi.bitrate_indicator = usize::from(BITRATE_INDICATOR_CODEBOOK.read(bs)?);
    }

    if (7..=10).contains(&ssi.channel_mode) {
        ssi.add_ch_base = bs.read_bit()?;
    }

    for i in 0..frame_rate_factor.min(4) {
        ssi.iframe[i] = bs.read_bit()?;
    }

    if substreams_present {
        ssi.substream_index = bs.read_bits(2)? as usize;
        if ssi.substream_index == 3 {
            ssi.substream_index += bs.read_escaped(2)? as usize;
        }
    }

    Ok(())
}

fn substream_group_info(
    bs: &mut BitReader<'_>,
    version: u32,
    fs_index: bool,
    frame_rate_factor: usize,
    ssi: &mut SubstreamInfo,
) -> Result<()> {
    let substreams_present = bs.read_bit()?;
    let hsf_ext = bs.read_bit()?;

    let n_lf_substreams = if bs.read_bit()? {
        1
    }
    else {
        let mut n = bs.read_bits(2)? as usize + 2;
        if n == 5 {
            n += bs.read_escaped(2)? as usize;
        }
        n
    };

    let channel_coded = bs.read_bit()?;
    if channel_coded {
        for _ in 0..n_lf_substreams {
            let sus_ver = if version == 1 { u32::from(bs.read_bit()?) } else { 1 };
            substream_info_chan(bs, fs_index, frame_rate_factor, substreams_present, sus_ver, ssi)?;
            if hsf_ext {
                hsf_ext_substream_info(bs, substreams_present)?;
            }
        }
    }
    else {
        return unsupported_error("ac4: object audio substream group");
    }

    if bs.read_bit()? {
        content_type(bs)?;
    }

    Ok(())
}

fn substream_index_table(bs: &mut BitReader<'_>, toc: &mut Toc) -> Result<()> {
    toc.nb_substreams = bs.read_bits(2)? as usize;
    if toc.nb_substreams == 0 {
        toc.nb_substreams = bs.read_escaped(2)? as usize + 4;
    }
    if toc.nb_substreams > toc.substream_size.len() {
        return invalid_block_error("ac4: too many substreams");
    }

    let size_present = if toc.nb_substreams == 1 { bs.read_bit()? } else { true };

    if size_present {
        for i in 0..toc.nb_substreams {
            let more_bits = bs.read_bit()?;
            toc.substream_size[i] = bs.read_bits(10)? as usize;
            if more_bits {
                toc.substream_size[i] += (bs.read_escaped(2)? as usize) << 10;
            }
        }
    }

    Ok(())
}

/// Parses the table of contents at the head of a frame.
pub fn parse_toc(bs: &mut BitReader<'_>, sequence_counter_prev: u32) -> Result<Toc> {
    let mut toc = Toc {
        version: 0,
        sequence_counter: 0,
        fs_index: false,
        frame_rate_index: 0,
        frame_len_base: 0,
        iframe_global: false,
        nb_presentations: 0,
        payload_base: 0,
        presentations: Vec::new(),
        groups: Vec::new(),
        nb_substreams: 0,
        substream_size: [0; 32],
        substream_type: [SubstreamType::Substream; 32],
    };

    toc.version = bs.read_bits(2)?;
    if toc.version == 3 {
        toc.version += bs.read_escaped(2)?;
    }

    toc.sequence_counter = bs.read_bits(10)?;

    // A broken successor relationship is a warning, not an error; decoding
    // proceeds.
    check_sequence(toc.sequence_counter, sequence_counter_prev);

    if bs.read_bit()? {
        let nb_wait_frames = bs.read_bits(3)?;
        if nb_wait_frames > 0 {
            bs.ignore_bits(2)?;
        }
    }

    toc.fs_index = bs.read_bit()?;
    toc.frame_rate_index = bs.read_bits(4)? as usize;
    toc.frame_len_base = FRAME_LEN_BASE_BY_RATE[toc.frame_rate_index];
    toc.iframe_global = bs.read_bit()?;

    if bs.read_bit()? {
        toc.nb_presentations = 1;
    }
    else if bs.read_bit()? {
        toc.nb_presentations = 2 + bs.read_escaped(2)? as usize;
    }

    if bs.read_bit()? {
        toc.payload_base = bs.read_bits(5)? as usize + 1;
        if toc.payload_base == 0x20 {
            toc.payload_base += bs.read_escaped(3)? as usize;
        }
    }

    let nb_presentations = toc.nb_presentations.min(8);

    if toc.version <= 1 {
        for _ in 0..nb_presentations {
            let mut p = PresentationInfo::default();
            presentation_info(bs, toc.fs_index, toc.frame_rate_index, &mut toc, &mut p)?;
            toc.presentations.push(p);
        }
    }
    else {
        if bs.read_bit()? {
            let _short_program_id = bs.read_bits(16)?;
            if bs.read_bit()? {
                bs.ignore_bits(16 * 8)?;
            }
        }

        let mut total_groups = 0;
        for _ in 0..nb_presentations {
            let mut p = PresentationInfo::default();
            presentation_v1_info(
                bs,
                toc.version,
                toc.fs_index,
                toc.frame_rate_index,
                &mut toc,
                &mut total_groups,
                &mut p,
            )?;
            toc.presentations.push(p);
        }

        let frame_rate_factor =
            toc.presentations.first().map_or(1, |p| p.frame_rate_factor);

        for _ in 0..=total_groups.min(7) {
            let mut ssi = SubstreamInfo::default();
            substream_group_info(bs, toc.version, toc.fs_index, frame_rate_factor, &mut ssi)?;
            toc.groups.push(ssi);
        }
    }

    substream_index_table(bs, &mut toc)?;

    bs.realign();

    Ok(toc)
}

/// Sequence counters count 0..=1020 and wrap from 1020 to 1; zero is a free
/// pass on either side.
fn check_sequence(counter: u32, prev: u32) {
    if counter > 1020 {
        warn!("ac4: invalid sequence counter: {}", counter);
        return;
    }

    let expected = counter == prev + 1
        || (counter != 0 && prev == 0)
        || (counter == 1 && prev == 1020)
        || (counter == 0 && prev == 0);

    if !expected {
        warn!("ac4: sequence discontinuity: {} follows {}", counter, prev);
    }
}

/// Reads the loudness extension of the basic metadata.
fn further_loudness_info(bs: &mut BitReader<'_>) -> Result<()> {
    let loudness_version = bs.read_bits(2)?;
    if loudness_version == 3 {
        let _ = bs.read_bits(4)?;
    }

    let loud_prac_type = bs.read_bits(4)?;
    if loud_prac_type != 0 {
        if bs.read_bit()? {
            let _dialgate_prac_type = bs.read_bits(3)?;
        }
        let _loudcorr_type = bs.read_bit()?;
    }

    if bs.read_bit()? {
        let _loudrelgat = bs.read_bits(11)?;
    }

    if bs.read_bit()? {
        let _loudspchgat = bs.read_bits(11)?;
        let _dialgate_prac_type = bs.read_bits(3)?;
    }

    if bs.read_bit()? {
        let _loudstrm3s = bs.read_bits(11)?;
    }
    if bs.read_bit()? {
        let _max_loudstrm3s = bs.read_bits(11)?;
    }
    if bs.read_bit()? {
        let _truepk = bs.read_bits(11)?;
    }
    if bs.read_bit()? {
        let _max_truepk = bs.read_bits(11)?;
    }

    if bs.read_bit()? {
        // Program boundary: a one-terminated doubling count.
        while !bs.read_bit()? {}
        let _end_or_start = bs.read_bit()?;
        if bs.read_bit()? {
            let _prgmbndy_offset = bs.read_bits(11)?;
        }
    }

    if bs.read_bit()? {
        let _lra = bs.read_bits(10)?;
        let _lra_prac_type = bs.read_bits(3)?;
    }

    if bs.read_bit()? {
        let _loudmntry = bs.read_bits(11)?;
    }
    if bs.read_bit()? {
        let _max_loudmntry = bs.read_bits(11)?;
    }

    if bs.read_bit()? {
        let mut e_bits_size = bs.read_bits(5)?;
        if e_bits_size == 31 {
            e_bits_size += bs.read_escaped(4)?;
        }
        bs.ignore_bits(e_bits_size)?;
    }

    Ok(())
}

fn channel_mode_contains_lfe(channel_mode: usize) -> bool {
    matches!(channel_mode, 4 | 6 | 8 | 10)
}

fn basic_metadata(bs: &mut BitReader<'_>, channel_mode: usize, sus_ver: u32) -> Result<()> {
    if sus_ver == 0 {
        let _dialnorm_bits = bs.read_bits(7)?;
    }

    if bs.read_bit()? {
        if bs.read_bit()? {
            further_loudness_info(bs)?;
        }

        if channel_mode == 1 && bs.read_bit()? {
            let _pre_dmixtyp_2ch = bs.read_bits(3)?;
            let _phase90_info_2ch = bs.read_bits(2)?;
        }

        if channel_mode > 1 {
            if bs.read_bit()? {
                let _loro_center_mixgain = bs.read_bits(3)?;
                let _loro_surround_mixgain = bs.read_bits(3)?;
                if bs.read_bit()? {
                    let _loro_dmx_loud_corr = bs.read_bits(5)?;
                }
                if bs.read_bit()? {
                    let _ltrt_center_mixgain = bs.read_bits(3)?;
                    let _ltrt_surround_mixgain = bs.read_bits(3)?;
                }
                if bs.read_bit()? {
                    let _ltrt_dmx_loud_corr = bs.read_bits(5)?;
                }
                if channel_mode_contains_lfe(channel_mode) && bs.read_bit()? {
                    let _lfe_mixgain = bs.read_bits(5)?;
                }
                let _preferred_dmx_method = bs.read_bits(2)?;
            }

            if channel_mode == 3 || channel_mode == 4 {
                if bs.read_bit()? {
                    let _pre_dmixtyp_5ch = bs.read_bits(3)?;
                }
                if bs.read_bit()? {
                    let _pre_upmixtyp_5ch = bs.read_bits(4)?;
                }
            }

            if (5..=10).contains(&channel_mode) && bs.read_bit()? {
                if channel_mode <= 6 {
                    let _pre_upmixtyp_3_4 = bs.read_bits(2)?;
                }
                else if channel_mode >= 9 {
                    let _pre_upmixtyp_3_2_2 = bs.read_bit()?;
                }
            }

            let _phase90_info_mc = bs.read_bits(2)?;
            let _surround_attenuation_known = bs.read_bit()?;
            let _lfe_attenuation_known = bs.read_bit()?;
        }

        if bs.read_bit()? {
            let _dc_block_on = bs.read_bit()?;
        }
    }

    Ok(())
}

fn drc_frame(bs: &mut BitReader<'_>, iframe: bool) -> Result<()> {
    if bs.read_bit()? {
        if iframe {
            let drc_decoder_nr_modes = bs.read_bits(3)?;
            let _ = drc_decoder_nr_modes;
            let _drc_eac3_profile = bs.read_bits(3)?;
        }
    }
    Ok(())
}

/// Consumes the metadata trailing a substream's audio data.
pub fn metadata(
    bs: &mut BitReader<'_>,
    channel_mode: usize,
    sus_ver: u32,
    iframe: bool,
) -> Result<()> {
    basic_metadata(bs, channel_mode, sus_ver)?;

    let mut tools_metadata_size = bs.read_bits(7)?;
    if bs.read_bit()? {
        tools_metadata_size += bs.read_escaped(3)? << 7;
    }
    let _ = tools_metadata_size;

    drc_frame(bs, iframe)?;

    if bs.read_bit()? {
        // EMDF payloads substream: nothing to consume at this level.
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cadenza_core::io::BitWriter;

    /// Writes a minimal version-0 TOC with a single presentation and a single
    /// substream, byte-aligned like the real thing.
    pub(crate) fn write_minimal_toc(
        bw: &mut BitWriter,
        sequence_counter: u32,
        channel_mode_sym: u16,
    ) {
        bw.put_bits(0, 2); // version 0
        bw.put_bits(sequence_counter, 10);
        bw.put_bit(false); // no wait frames
        bw.put_bit(true); // fs_index = 48 kHz family
        bw.put_bits(5, 4); // frame rate index 5 -> 1024 base
        bw.put_bit(true); // iframe
        bw.put_bit(true); // one presentation
        bw.put_bit(false); // no payload base

        // presentation_info: single substream, presentation version 1 coded
        // as the unary word "10".
        bw.put_bit(true);
        bw.put_bit(true);
        bw.put_bit(false);
        bw.put_bits(0, 3); // mdcompat
        bw.put_bit(false); // no presentation id
        // frame rate index 5: no multiplier bits.
        // emdf_info: version 0, key id 0, no payloads substream info,
        // protection 2x2 bits of zero.
        bw.put_bits(0, 2);
        bw.put_bits(0, 3);
        bw.put_bit(false);
        bw.put_bits(0, 2);
        bw.put_bits(0, 2);

        // substream_info.
        let (code, len) = CHANNEL_MODE_CODEBOOK.codeword(channel_mode_sym).unwrap();
        bw.put_bits(code, len);
        bw.put_bit(false); // no sf multiplier
        bw.put_bit(false); // no bitrate indicator
        bw.put_bit(false); // no content type
        bw.put_bit(true); // iframe
        bw.put_bits(0, 2); // substream index 0

        bw.put_bit(false); // pre_virtualized
        bw.put_bit(false); // no emdf substreams

        // substream_index_table: one substream, no sizes.
        bw.put_bits(1, 2);
        bw.put_bit(false);

        // The TOC ends byte aligned.
        bw.align();
    }

    #[test]
    fn verify_minimal_toc_parses() {
        let mut bw = BitWriter::new();
        write_minimal_toc(&mut bw, 1, 0);
        bw.put_bits(0xaa, 8);
        let buf = bw.finish();
        assert_eq!(buf.last(), Some(&0xaa));

        let mut bs = BitReader::new(&buf);
        let toc = parse_toc(&mut bs, 0).unwrap();

        assert_eq!(toc.version, 0);
        assert_eq!(toc.sequence_counter, 1);
        assert!(toc.iframe_global);
        assert_eq!(toc.frame_len_base, 1024);
        assert_eq!(toc.nb_presentations, 1);
        assert_eq!(toc.presentations.len(), 1);
        assert_eq!(toc.presentations[0].ssinfo.channel_mode, 0);
        assert!(toc.presentations[0].ssinfo.iframe[0]);
        assert_eq!(toc.nb_substreams, 1);

        // The TOC is byte aligned afterwards.
        assert_eq!(bs.read_bits(8).unwrap(), 0xaa);
    }

    #[test]
    fn verify_sequence_wrap_is_accepted() {
        // Warning-only; both calls must not panic.
        check_sequence(1, 1020);
        check_sequence(5, 9);
    }
}
