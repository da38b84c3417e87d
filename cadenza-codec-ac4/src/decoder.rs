// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The decoder: frame pipeline, channel-element dispatch, and the public API.

use log::{debug, warn};

use cadenza_core::audio::{AudioBuffer, Channels, SignalSpec};
use cadenza_core::errors::{limit_error, malformed_code_error, unsupported_error, Result};
use cadenza_core::io::BitReader;

use crate::acpl::{self, AcplConfig};
use crate::aspx::{self, data as aspx_data, AspxConfig, AspxContext};
use crate::channel::{ChannelFrame, ChannelState};
use crate::common::*;
use crate::frontend;
use crate::qmf;
use crate::stereo;
use crate::synth::{self, SynthDsp};
use crate::tables;
use crate::toc::{self, SubstreamType};

/// Decoder options, chosen once before decoding begins.
#[derive(Clone, Copy, Default)]
pub struct DecoderOptions {
    /// Which presentation to decode; clamped to the presentations present.
    pub target_presentation: usize,
}

/// Substream-level coding state persisting between frames.
#[derive(Clone)]
struct Substream {
    codec_mode: CodecMode,
    aspx_cfg: AspxConfig,
    acpl_cfg: AcplConfig,
    mdct_stereo_proc: [bool; 2],
    coding_config: u8,
    mode_2ch: bool,
    chel_matsel: u8,
    spec_frontend: [SpectralFrontend; 2],
    compand_on: [bool; 5],
    compand_avg: bool,
}

impl Default for Substream {
    fn default() -> Self {
        Substream {
            codec_mode: CodecMode::Simple,
            aspx_cfg: AspxConfig::default(),
            acpl_cfg: AcplConfig::default(),
            mdct_stereo_proc: [false; 2],
            coding_config: 0,
            mode_2ch: false,
            chel_matsel: 0,
            spec_frontend: [SpectralFrontend::Asf; 2],
            compand_on: [false; 5],
            compand_avg: false,
        }
    }
}

/// Number of coded channel slots of a channel mode (the LFE occupies the
/// last).
fn num_ssch(channel_mode: usize) -> usize {
    [1, 2, 3, 5, 6, 7, 8][channel_mode]
}

/// Output plane of each channel slot, following the canonical channel order.
fn plane_map(channel_mode: usize) -> &'static [usize] {
    match channel_mode {
        0 => &[0],
        1 => &[0, 1],
        2 => &[0, 1, 2],
        3 => &[0, 1, 2, 3, 4],
        4 => &[0, 1, 2, 4, 5, 3],
        5 => &[0, 1, 2, 3, 4, 5, 6],
        _ => &[0, 1, 2, 4, 5, 6, 7, 3],
    }
}

fn channel_mask(channel_mode: usize) -> Channels {
    let front = Channels::FRONT_LEFT | Channels::FRONT_RIGHT | Channels::FRONT_CENTRE;
    let rear = Channels::REAR_LEFT | Channels::REAR_RIGHT;
    let side = Channels::SIDE_LEFT | Channels::SIDE_RIGHT;

    match channel_mode {
        0 => Channels::FRONT_CENTRE,
        1 => Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
        2 => front,
        3 => front | rear,
        4 => front | rear | Channels::LFE1,
        5 => front | rear | side,
        _ => front | rear | side | Channels::LFE1,
    }
}

/// An AC-4 class audio decoder.
///
/// Feed one compressed frame per call to [`Ac4Decoder::decode`]; the decoder
/// keeps all inter-frame channel history internally. A failed frame leaves
/// that history untouched so decoding can continue with the next frame.
pub struct Ac4Decoder {
    options: DecoderOptions,

    sequence_counter: u32,
    have_iframe: bool,
    first_frame: bool,

    channel_mode: Option<usize>,
    frame_len_base: usize,
    base_idx: usize,
    fs_index: bool,
    num_qmf_ts: usize,
    num_ts_in_ats: usize,
    num_aspx_ts: usize,
    ts_offset_hfgen: usize,

    substream: Substream,
    channels: Vec<ChannelState>,
    frames: Vec<ChannelFrame>,

    dsp: Option<SynthDsp>,
    buf: Option<AudioBuffer>,
    synth_scratch: Vec<f32>,
}

impl Ac4Decoder {
    pub fn try_new(options: &DecoderOptions) -> Result<Self> {
        Ok(Ac4Decoder {
            options: *options,
            sequence_counter: 0,
            have_iframe: false,
            first_frame: true,
            channel_mode: None,
            frame_len_base: 0,
            base_idx: 0,
            fs_index: false,
            num_qmf_ts: 0,
            num_ts_in_ats: 1,
            num_aspx_ts: 0,
            ts_offset_hfgen: 0,
            substream: Substream::default(),
            channels: Vec::new(),
            frames: Vec::new(),
            dsp: None,
            buf: None,
            synth_scratch: vec![0.0; MAX_FRAME_LEN],
        })
    }

    /// Clears all inter-frame state, as at stream (re)initialization.
    pub fn reset(&mut self) {
        self.sequence_counter = 0;
        self.have_iframe = false;
        self.first_frame = true;
        for state in self.channels.iter_mut() {
            state.reset();
        }
        self.substream = Substream::default();
    }

    /// Decodes one frame into the internal planar buffer. On error the buffer
    /// is cleared and channel history keeps its previous generation.
    pub fn decode(&mut self, packet: &[u8]) -> Result<&AudioBuffer> {
        match self.decode_inner(packet) {
            Ok(()) => Ok(self.buf.as_ref().unwrap()),
            Err(err) => {
                if let Some(buf) = self.buf.as_mut() {
                    buf.clear();
                }
                Err(err)
            }
        }
    }

    fn decode_inner(&mut self, packet: &[u8]) -> Result<()> {
        if packet.len() < 8 {
            return malformed_code_error("ac4: packet too small");
        }

        // Raw frame wrapper: sync word and 16-bit size with 0xFFFF escape.
        let mut start_offset = 0u32;
        let header = u16::from_be_bytes([packet[0], packet[1]]);
        if header == 0xAC40 || header == 0xAC41 {
            let size = u16::from_be_bytes([packet[2], packet[3]]);
            start_offset = if size == 0xFFFF { 7 } else { 4 };
        }

        let mut bs = BitReader::new(packet);
        bs.ignore_bits(start_offset * 8)?;

        let toc = toc::parse_toc(&mut bs, self.sequence_counter)?;
        self.sequence_counter = toc.sequence_counter;

        if toc.iframe_global {
            self.have_iframe = true;
        }
        if !self.have_iframe {
            // No independent frame yet; nothing decodable.
            debug!("ac4: waiting for an independent frame");
            self.ensure_buffer_placeholder();
            return Ok(());
        }

        let presentation =
            self.options.target_presentation.min(toc.nb_presentations.saturating_sub(1));

        let ssinfo = if toc.version == 2 {
            toc.groups.first().cloned()
        }
        else {
            toc.presentations.get(presentation).map(|p| p.ssinfo.clone())
        };

        let ssinfo = match ssinfo {
            Some(ssinfo) => ssinfo,
            None => return unsupported_error("ac4: no decodable presentation"),
        };

        if ssinfo.channel_mode > 6 {
            return unsupported_error("ac4: channel mode");
        }

        let iframe = ssinfo.iframe[0];

        self.configure(&toc, ssinfo.channel_mode)?;

        bs.ignore_bits(8 * toc.payload_base as u32)?;

        let mut sub = self.substream.clone();

        let nb = num_ssch(ssinfo.channel_mode);
        for frame in self.frames.iter_mut().take(nb) {
            frame.begin_frame();
        }

        for i in 0..toc.nb_substreams {
            match toc.substream_type[i] {
                SubstreamType::Substream => {
                    self.parse_substream(&mut bs, &mut sub, &ssinfo, iframe, toc.iframe_global)?;
                    break;
                }
                SubstreamType::Presentation => {
                    bs.ignore_bits(8 * toc.substream_size[i] as u32)?;
                }
            }
        }

        // Bitstream parsing is complete; everything below is numeric and,
        // once the transform chains validate, infallible. This is where
        // channel history is allowed to advance.
        let channel_mode = ssinfo.channel_mode;

        for ch in 0..nb {
            synth::scale_spec(self.frame_len_base, &mut self.frames[ch]);
        }

        self.stereo_processing(&sub, channel_mode);

        let dsp = self.dsp.as_mut().unwrap();
        for ch in 0..nb {
            synth::validate_transform_chain(
                dsp,
                self.frame_len_base,
                self.base_idx,
                &self.frames[ch],
                self.channels[ch].n_prev,
            )?;
        }

        {
            let frame_len_base = self.frame_len_base;
            let base_idx = self.base_idx;
            let num_qmf_ts = self.num_qmf_ts;
            let dsp = self.dsp.as_mut().unwrap();

            for ch in 0..nb {
                let frame = &mut self.frames[ch];
                let state = &mut self.channels[ch];

                synth::spectral_reordering(frame_len_base, base_idx, frame);
                synth::spectral_synthesis(
                    dsp,
                    frame_len_base,
                    base_idx,
                    frame,
                    &mut state.n_prev,
                    &mut state.overlap,
                )?;

                qmf::qmf_analysis(&mut state.fbank.analysis, &frame.pcm, num_qmf_ts, &mut frame.q);
            }
        }

        // High-band regeneration for the modes that carry it.
        let ctx = AspxContext {
            num_qmf_ts: self.num_qmf_ts,
            num_aspx_ts: self.num_aspx_ts,
            num_ts_in_ats: self.num_ts_in_ats,
            ts_offset_hfgen: self.ts_offset_hfgen,
            fs_index: self.fs_index,
        };

        let mut aspx_channels: &[usize] = &[];
        match channel_mode {
            0 if sub.codec_mode == CodecMode::Aspx => {
                aspx::process_mono(
                    &sub.aspx_cfg,
                    &ctx,
                    &self.channels[0],
                    &mut self.frames[0],
                    &mut self.first_frame,
                );
                aspx_channels = &[0];
            }
            1 if sub.codec_mode == CodecMode::Aspx => {
                let (f0, f1) = self.frames.split_at_mut(1);
                aspx::process_pair(
                    &sub.aspx_cfg,
                    &ctx,
                    &self.channels[0],
                    &self.channels[1],
                    &mut f0[0],
                    &mut f1[0],
                    &mut self.first_frame,
                );
                aspx_channels = &[0, 1];
            }
            _ => {}
        }

        for &ch in aspx_channels {
            aspx::commit_channel(&mut self.channels[ch], &self.frames[ch]);
        }

        // Final synthesis into the output planes.
        let buf = self.buf.as_mut().unwrap();
        buf.clear();
        buf.render_silence(self.frame_len_base);

        let map = plane_map(channel_mode);
        let out_len = self.num_qmf_ts * 64;

        for ch in 0..nb {
            qmf::qmf_synthesis(
                &mut self.channels[ch].fbank.synthesis,
                &self.frames[ch].q,
                self.num_qmf_ts,
                &mut self.synth_scratch,
            );

            buf.chan_mut(map[ch])[..out_len].copy_from_slice(&self.synth_scratch[..out_len]);
        }

        self.substream = sub;

        Ok(())
    }

    fn ensure_buffer_placeholder(&mut self) {
        if self.buf.is_none() {
            self.buf =
                Some(AudioBuffer::new(0, SignalSpec::new(48000, Channels::FRONT_CENTRE)));
        }
        else if let Some(buf) = self.buf.as_mut() {
            buf.clear();
        }
    }

    fn configure(&mut self, toc: &toc::Toc, channel_mode: usize) -> Result<()> {
        let base_idx = tables::frame_len_base_index(toc.frame_len_base)?;

        let layout_changed = self.channel_mode != Some(channel_mode)
            || self.frame_len_base != toc.frame_len_base
            || self.fs_index != toc.fs_index;

        if layout_changed {
            let nb = num_ssch(channel_mode);

            self.channels = (0..nb).map(|_| ChannelState::new()).collect();
            self.frames = (0..nb).map(|_| ChannelFrame::new()).collect();
            self.substream = Substream::default();
            self.first_frame = true;

            let rate = if toc.fs_index { 48000 } else { 44100 };
            let spec = SignalSpec::new(rate, channel_mask(channel_mode));
            self.buf = Some(AudioBuffer::new(toc.frame_len_base, spec));

            self.channel_mode = Some(channel_mode);
            self.frame_len_base = toc.frame_len_base;
            self.fs_index = toc.fs_index;
        }

        if self.dsp.is_none() || self.base_idx != base_idx {
            self.dsp = Some(SynthDsp::new(base_idx));
            self.base_idx = base_idx;
        }

        self.num_qmf_ts = self.frame_len_base / 64;
        self.num_ts_in_ats = if self.frame_len_base >= 1536 { 2 } else { 1 };
        self.num_aspx_ts = self.num_qmf_ts / self.num_ts_in_ats;
        self.ts_offset_hfgen = 3 * self.num_ts_in_ats;

        Ok(())
    }

    fn aspx_ctx(&self) -> AspxContext {
        AspxContext {
            num_qmf_ts: self.num_qmf_ts,
            num_aspx_ts: self.num_aspx_ts,
            num_ts_in_ats: self.num_ts_in_ats,
            ts_offset_hfgen: self.ts_offset_hfgen,
            fs_index: self.fs_index,
        }
    }

    fn parse_substream(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        ssinfo: &toc::SubstreamInfo,
        iframe: bool,
        iframe_global: bool,
    ) -> Result<()> {
        let mut audio_size = bs.read_bits(15)? as usize;
        if bs.read_bit()? {
            audio_size += (bs.read_escaped(7)? as usize) << 15;
        }
        if audio_size > 131072 {
            return limit_error("ac4: audio size");
        }

        bs.realign();
        let offset = bs.bits_read() / 8;

        self.audio_data(bs, sub, ssinfo.channel_mode, iframe)?;

        bs.realign();
        let consumed = (bs.bits_read() / 8 - offset) as usize;

        if consumed > audio_size {
            return malformed_code_error("ac4: substream audio data overread");
        }
        if consumed < audio_size {
            let mut non_zero = 0;
            for _ in consumed..audio_size {
                non_zero += u32::from(bs.read_bits(8)? != 0);
            }
            if non_zero != 0 {
                warn!("ac4: substream audio data underread: {}", non_zero);
            }
        }

        toc::metadata(bs, ssinfo.channel_mode, ssinfo.sus_ver, iframe_global)?;

        bs.realign();

        Ok(())
    }

    fn audio_data(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        channel_mode: usize,
        iframe: bool,
    ) -> Result<()> {
        match channel_mode {
            0 => self.single_channel_element(bs, sub, iframe),
            1 => self.channel_pair_element(bs, sub, iframe),
            2 => self.channel_element_3x(bs, sub, iframe),
            3 => self.channel_element_5x(bs, sub, false, iframe),
            4 => self.channel_element_5x(bs, sub, true, iframe),
            5 | 6 => self.channel_element_7x(bs, sub, channel_mode, iframe),
            _ => unsupported_error("ac4: channel mode"),
        }
    }

    fn companding_control(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        num_chan: usize,
    ) -> Result<()> {
        let sync_flag = if num_chan > 1 { bs.read_bit()? } else { false };
        let nc = if sync_flag { 1 } else { num_chan };

        let mut need_avg = false;
        for i in 0..nc {
            sub.compand_on[i] = bs.read_bit()?;
            if !sub.compand_on[i] {
                need_avg = true;
            }
        }

        if need_avg {
            sub.compand_avg = bs.read_bit()?;
        }

        Ok(())
    }

    /// Copies a decoded window layout onto another channel of the same
    /// element.
    fn copy_layout(&mut self, src: usize, dst: usize) {
        let (a, b) = if src < dst {
            let (lo, hi) = self.frames.split_at_mut(dst);
            (&lo[src], &mut hi[0])
        }
        else {
            unreachable!()
        };

        b.scp = a.scp.clone();
        b.sect_sfb_offset = a.sect_sfb_offset;
        b.offset2sfb.copy_from_slice(&a.offset2sfb);
        b.offset2g.copy_from_slice(&a.offset2g);
        b.win_offset = a.win_offset;
    }

    fn mono_data(
        &mut self,
        bs: &mut BitReader<'_>,
        ch: usize,
        lfe: bool,
        iframe: bool,
    ) -> Result<()> {
        let spec_frontend;

        if lfe {
            spec_frontend = SpectralFrontend::Asf;
            frontend::sf_info_lfe(bs, self.frame_len_base, self.base_idx, &mut self.frames[ch])?;
        }
        else {
            spec_frontend = SpectralFrontend::from_bit(bs.read_bit()?);
            frontend::sf_info(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[ch],
                spec_frontend,
                false,
                false,
            )?;
        }

        frontend::sf_data(
            bs,
            self.frame_len_base,
            self.base_idx,
            &mut self.frames[ch],
            iframe,
            spec_frontend,
        )
    }

    fn stereo_data(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        iframe: bool,
    ) -> Result<()> {
        sub.mdct_stereo_proc[0] = bs.read_bit()?;

        if sub.mdct_stereo_proc[0] {
            sub.spec_frontend = [SpectralFrontend::Asf; 2];

            frontend::sf_info(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[0],
                SpectralFrontend::Asf,
                false,
                false,
            )?;
            self.copy_layout(0, 1);
            stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[0])?;
        }
        else {
            sub.spec_frontend[0] = SpectralFrontend::from_bit(bs.read_bit()?);
            frontend::sf_info(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[0],
                sub.spec_frontend[0],
                false,
                false,
            )?;
            sub.spec_frontend[1] = SpectralFrontend::from_bit(bs.read_bit()?);
            frontend::sf_info(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[1],
                sub.spec_frontend[1],
                false,
                false,
            )?;
        }

        frontend::sf_data(
            bs,
            self.frame_len_base,
            self.base_idx,
            &mut self.frames[0],
            iframe,
            sub.spec_frontend[0],
        )?;
        frontend::sf_data(
            bs,
            self.frame_len_base,
            self.base_idx,
            &mut self.frames[1],
            iframe,
            sub.spec_frontend[1],
        )?;

        Ok(())
    }

    fn two_channel_data(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        ch0: usize,
        ch1: usize,
        x: usize,
    ) -> Result<()> {
        sub.mdct_stereo_proc[x] = bs.read_bit()?;

        if sub.mdct_stereo_proc[x] {
            frontend::sf_info(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[ch0],
                SpectralFrontend::Asf,
                false,
                false,
            )?;
            self.copy_layout(ch0, ch1);
            stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[ch0])?;
        }
        else {
            for ch in [ch0, ch1] {
                frontend::sf_info(
                    bs,
                    self.frame_len_base,
                    self.base_idx,
                    &mut self.frames[ch],
                    SpectralFrontend::Asf,
                    false,
                    false,
                )?;
            }
        }

        for ch in [ch0, ch1] {
            frontend::sf_data(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[ch],
                false,
                SpectralFrontend::Asf,
            )?;
        }

        Ok(())
    }

    fn three_channel_data(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        channels: [usize; 3],
    ) -> Result<()> {
        frontend::sf_info(
            bs,
            self.frame_len_base,
            self.base_idx,
            &mut self.frames[channels[0]],
            SpectralFrontend::Asf,
            false,
            false,
        )?;
        self.copy_layout(channels[0], channels[1]);
        self.copy_layout(channels[0], channels[2]);

        sub.chel_matsel = bs.read_bits(4)? as u8;
        stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[channels[0]])?;
        stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[channels[1]])?;

        for ch in channels {
            frontend::sf_data(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[ch],
                false,
                SpectralFrontend::Asf,
            )?;
        }

        Ok(())
    }

    fn four_channel_data(
        &mut self,
        bs: &mut BitReader<'_>,
        iframe: bool,
    ) -> Result<()> {
        frontend::sf_info(
            bs,
            self.frame_len_base,
            self.base_idx,
            &mut self.frames[0],
            SpectralFrontend::Asf,
            false,
            false,
        )?;
        for ch in 1..4 {
            self.copy_layout(0, ch);
        }

        for ch in 0..4 {
            stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[ch])?;
        }

        for ch in 0..4 {
            frontend::sf_data(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[ch],
                iframe,
                SpectralFrontend::Asf,
            )?;
        }

        Ok(())
    }

    fn five_channel_data(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        iframe: bool,
    ) -> Result<()> {
        frontend::sf_info(
            bs,
            self.frame_len_base,
            self.base_idx,
            &mut self.frames[0],
            SpectralFrontend::Asf,
            false,
            false,
        )?;
        for ch in 1..5 {
            self.copy_layout(0, ch);
        }

        sub.chel_matsel = bs.read_bits(4)? as u8;
        for ch in 0..5 {
            stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[ch])?;
        }

        for ch in 0..5 {
            frontend::sf_data(
                bs,
                self.frame_len_base,
                self.base_idx,
                &mut self.frames[ch],
                iframe,
                SpectralFrontend::Asf,
            )?;
        }

        Ok(())
    }

    fn single_channel_element(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        iframe: bool,
    ) -> Result<()> {
        sub.codec_mode = CodecMode::from_bits(bs.read_bits(1)?)?;

        if iframe && sub.codec_mode == CodecMode::Aspx {
            aspx::aspx_config(bs, &mut sub.aspx_cfg)?;
        }

        if sub.codec_mode == CodecMode::Simple {
            self.mono_data(bs, 0, false, iframe)
        }
        else {
            self.companding_control(bs, sub, 1)?;
            self.mono_data(bs, 0, false, iframe)?;

            let ctx = self.aspx_ctx();
            aspx_data::aspx_data_1ch(
                bs,
                &sub.aspx_cfg,
                &ctx,
                &self.channels[0].aspx,
                &mut self.frames[0].aspx,
                iframe,
            )
        }
    }

    fn channel_pair_element(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        iframe: bool,
    ) -> Result<()> {
        sub.codec_mode = CodecMode::from_bits(bs.read_bits(2)?)?;

        if iframe {
            if sub.codec_mode != CodecMode::Simple {
                aspx::aspx_config(bs, &mut sub.aspx_cfg)?;
            }
            if sub.codec_mode == CodecMode::AspxAcpl1 {
                acpl::acpl_config_1ch(bs, &mut sub.acpl_cfg, true)?;
            }
            if sub.codec_mode == CodecMode::AspxAcpl2 {
                acpl::acpl_config_1ch(bs, &mut sub.acpl_cfg, false)?;
            }
        }

        match sub.codec_mode {
            CodecMode::Simple => self.stereo_data(bs, sub, iframe),
            CodecMode::Aspx => {
                self.companding_control(bs, sub, 2)?;
                self.stereo_data(bs, sub, iframe)?;

                let ctx = self.aspx_ctx();
                let (f0, f1) = self.frames.split_at_mut(1);
                aspx_data::aspx_data_2ch(
                    bs,
                    &sub.aspx_cfg,
                    &ctx,
                    &self.channels[0].aspx,
                    &self.channels[1].aspx,
                    &mut f0[0].aspx,
                    &mut f1[0].aspx,
                    iframe,
                )
            }
            CodecMode::AspxAcpl1 => {
                self.companding_control(bs, sub, 1)?;

                sub.mdct_stereo_proc[0] = bs.read_bit()?;
                if sub.mdct_stereo_proc[0] {
                    sub.spec_frontend = [SpectralFrontend::Asf; 2];
                    frontend::sf_info(
                        bs,
                        self.frame_len_base,
                        self.base_idx,
                        &mut self.frames[0],
                        SpectralFrontend::Asf,
                        true,
                        false,
                    )?;
                    self.copy_layout(0, 1);
                    stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[0])?;
                }
                else {
                    sub.spec_frontend[0] = SpectralFrontend::from_bit(bs.read_bit()?);
                    frontend::sf_info(
                        bs,
                        self.frame_len_base,
                        self.base_idx,
                        &mut self.frames[0],
                        sub.spec_frontend[0],
                        false,
                        false,
                    )?;
                    sub.spec_frontend[1] = SpectralFrontend::from_bit(bs.read_bit()?);
                    frontend::sf_info(
                        bs,
                        self.frame_len_base,
                        self.base_idx,
                        &mut self.frames[1],
                        sub.spec_frontend[1],
                        false,
                        true,
                    )?;
                }

                for ch in 0..2 {
                    frontend::sf_data(
                        bs,
                        self.frame_len_base,
                        self.base_idx,
                        &mut self.frames[ch],
                        iframe,
                        sub.spec_frontend[0],
                    )?;
                }

                let ctx = self.aspx_ctx();
                aspx_data::aspx_data_1ch(
                    bs,
                    &sub.aspx_cfg,
                    &ctx,
                    &self.channels[0].aspx,
                    &mut self.frames[0].aspx,
                    iframe,
                )?;
                acpl::acpl_data_1ch(bs, &sub.acpl_cfg)
            }
            CodecMode::AspxAcpl2 => {
                self.companding_control(bs, sub, 1)?;

                sub.spec_frontend[0] = SpectralFrontend::from_bit(bs.read_bit()?);
                frontend::sf_info(
                    bs,
                    self.frame_len_base,
                    self.base_idx,
                    &mut self.frames[0],
                    sub.spec_frontend[0],
                    false,
                    false,
                )?;
                frontend::sf_data(
                    bs,
                    self.frame_len_base,
                    self.base_idx,
                    &mut self.frames[0],
                    iframe,
                    sub.spec_frontend[0],
                )?;

                let ctx = self.aspx_ctx();
                aspx_data::aspx_data_1ch(
                    bs,
                    &sub.aspx_cfg,
                    &ctx,
                    &self.channels[0].aspx,
                    &mut self.frames[0].aspx,
                    iframe,
                )?;
                acpl::acpl_data_1ch(bs, &sub.acpl_cfg)
            }
            CodecMode::AspxAcpl3 => unsupported_error("ac4: codec mode"),
        }
    }

    fn channel_element_3x(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        iframe: bool,
    ) -> Result<()> {
        sub.codec_mode = CodecMode::from_bits(bs.read_bits(1)?)?;

        if sub.codec_mode == CodecMode::Aspx {
            if iframe {
                aspx::aspx_config(bs, &mut sub.aspx_cfg)?;
            }
            self.companding_control(bs, sub, 3)?;
        }

        sub.coding_config = u8::from(bs.read_bit()?);
        match sub.coding_config {
            0 => {
                self.stereo_data(bs, sub, iframe)?;
                self.mono_data(bs, 2, false, iframe)?;
            }
            _ => {
                self.three_channel_data(bs, sub, [0, 1, 2])?;
            }
        }

        if sub.codec_mode == CodecMode::Aspx {
            let ctx = self.aspx_ctx();
            {
                let (f0, f1) = self.frames.split_at_mut(1);
                aspx_data::aspx_data_2ch(
                    bs,
                    &sub.aspx_cfg,
                    &ctx,
                    &self.channels[0].aspx,
                    &self.channels[1].aspx,
                    &mut f0[0].aspx,
                    &mut f1[0].aspx,
                    iframe,
                )?;
            }
            aspx_data::aspx_data_1ch(
                bs,
                &sub.aspx_cfg,
                &ctx,
                &self.channels[2].aspx,
                &mut self.frames[2].aspx,
                iframe,
            )?;
        }

        Ok(())
    }

    fn channel_element_5x(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        lfe: bool,
        iframe: bool,
    ) -> Result<()> {
        sub.codec_mode = CodecMode::from_bits(bs.read_bits(3)?)?;

        if iframe {
            if sub.codec_mode != CodecMode::Simple {
                aspx::aspx_config(bs, &mut sub.aspx_cfg)?;
            }
            match sub.codec_mode {
                CodecMode::AspxAcpl1 => acpl::acpl_config_1ch(bs, &mut sub.acpl_cfg, true)?,
                CodecMode::AspxAcpl2 => acpl::acpl_config_1ch(bs, &mut sub.acpl_cfg, false)?,
                CodecMode::AspxAcpl3 => acpl::acpl_config_2ch(bs, &mut sub.acpl_cfg)?,
                _ => {}
            }
        }

        if lfe {
            self.mono_data(bs, 5, true, iframe)?;
        }

        match sub.codec_mode {
            CodecMode::Simple | CodecMode::Aspx => {
                if sub.codec_mode == CodecMode::Aspx {
                    self.companding_control(bs, sub, 5)?;
                }

                sub.coding_config = bs.read_bits(2)? as u8;
                match sub.coding_config {
                    0 => {
                        sub.mode_2ch = bs.read_bit()?;
                        self.two_channel_data(bs, sub, 0, 1, 0)?;
                        self.two_channel_data(bs, sub, 2, 3, 1)?;
                        self.mono_data(bs, 4, false, iframe)?;
                    }
                    1 => {
                        self.three_channel_data(bs, sub, [0, 1, 2])?;
                        self.two_channel_data(bs, sub, 3, 4, 0)?;
                    }
                    2 => {
                        self.four_channel_data(bs, iframe)?;
                        self.mono_data(bs, 4, false, iframe)?;
                    }
                    _ => {
                        self.five_channel_data(bs, sub, iframe)?;
                    }
                }

                if sub.codec_mode == CodecMode::Aspx {
                    let ctx = self.aspx_ctx();
                    for pair in [[0usize, 1], [2, 3]] {
                        let (lo, hi) = self.frames.split_at_mut(pair[1]);
                        aspx_data::aspx_data_2ch(
                            bs,
                            &sub.aspx_cfg,
                            &ctx,
                            &self.channels[pair[0]].aspx,
                            &self.channels[pair[1]].aspx,
                            &mut lo[pair[0]].aspx,
                            &mut hi[0].aspx,
                            iframe,
                        )?;
                    }
                    aspx_data::aspx_data_1ch(
                        bs,
                        &sub.aspx_cfg,
                        &ctx,
                        &self.channels[4].aspx,
                        &mut self.frames[4].aspx,
                        iframe,
                    )?;
                }
            }
            CodecMode::AspxAcpl1 | CodecMode::AspxAcpl2 => {
                self.companding_control(bs, sub, 3)?;

                sub.coding_config = u8::from(bs.read_bit()?);
                if sub.coding_config != 0 {
                    self.three_channel_data(bs, sub, [0, 1, 2])?;
                }
                else {
                    self.two_channel_data(bs, sub, 0, 1, 0)?;
                }

                if sub.codec_mode == CodecMode::AspxAcpl1 {
                    let _max_sfb_master = bs.read_bits(5)?;
                    stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[3])?;
                    stereo::chparam_info(bs, self.frame_len_base, &mut self.frames[4])?;
                    for ch in 3..5 {
                        frontend::sf_data(
                            bs,
                            self.frame_len_base,
                            self.base_idx,
                            &mut self.frames[ch],
                            iframe,
                            SpectralFrontend::Asf,
                        )?;
                    }
                }

                if sub.coding_config == 0 {
                    self.mono_data(bs, 2, false, iframe)?;
                }

                let ctx = self.aspx_ctx();
                {
                    let (f0, f1) = self.frames.split_at_mut(1);
                    aspx_data::aspx_data_2ch(
                        bs,
                        &sub.aspx_cfg,
                        &ctx,
                        &self.channels[0].aspx,
                        &self.channels[1].aspx,
                        &mut f0[0].aspx,
                        &mut f1[0].aspx,
                        iframe,
                    )?;
                }
                aspx_data::aspx_data_1ch(
                    bs,
                    &sub.aspx_cfg,
                    &ctx,
                    &self.channels[2].aspx,
                    &mut self.frames[2].aspx,
                    iframe,
                )?;

                acpl::acpl_data_1ch(bs, &sub.acpl_cfg)?;
                acpl::acpl_data_1ch(bs, &sub.acpl_cfg)?;
            }
            CodecMode::AspxAcpl3 => {
                self.companding_control(bs, sub, 2)?;
                self.stereo_data(bs, sub, iframe)?;

                let ctx = self.aspx_ctx();
                {
                    let (f0, f1) = self.frames.split_at_mut(1);
                    aspx_data::aspx_data_2ch(
                        bs,
                        &sub.aspx_cfg,
                        &ctx,
                        &self.channels[0].aspx,
                        &self.channels[1].aspx,
                        &mut f0[0].aspx,
                        &mut f1[0].aspx,
                        iframe,
                    )?;
                }
                acpl::acpl_data_2ch(bs, &sub.acpl_cfg)?;
            }
        }

        Ok(())
    }

    fn channel_element_7x(
        &mut self,
        bs: &mut BitReader<'_>,
        sub: &mut Substream,
        channel_mode: usize,
        iframe: bool,
    ) -> Result<()> {
        sub.codec_mode = CodecMode::from_bits(bs.read_bits(2)?)?;

        if iframe {
            if sub.codec_mode != CodecMode::Simple {
                aspx::aspx_config(bs, &mut sub.aspx_cfg)?;
            }
            if sub.codec_mode == CodecMode::AspxAcpl1 {
                acpl::acpl_config_1ch(bs, &mut sub.acpl_cfg, true)?;
            }
            if sub.codec_mode == CodecMode::AspxAcpl2 {
                acpl::acpl_config_1ch(bs, &mut sub.acpl_cfg, false)?;
            }
        }

        if channel_mode == 6 {
            self.mono_data(bs, 7, true, iframe)?;
        }

        if matches!(sub.codec_mode, CodecMode::AspxAcpl1 | CodecMode::AspxAcpl2) {
            self.companding_control(bs, sub, 5)?;
        }

        sub.coding_config = bs.read_bits(2)? as u8;
        match sub.coding_config {
            2 => self.four_channel_data(bs, iframe),
            3 => self.five_channel_data(bs, sub, iframe),
            _ => unsupported_error("ac4: 7.x coding configuration"),
        }
    }

    fn stereo_processing(&mut self, sub: &Substream, channel_mode: usize) {
        let process_pair = |frames: &mut [ChannelFrame], a: usize, b: usize, len: usize| {
            let (lo, hi) = frames.split_at_mut(b);
            stereo::two_channel_processing(len, &mut lo[a], &mut hi[0]);
        };

        match channel_mode {
            1 => {
                if sub.mdct_stereo_proc[0] {
                    process_pair(&mut self.frames, 0, 1, self.frame_len_base);
                }
            }
            3 | 4 => match sub.codec_mode {
                CodecMode::Simple | CodecMode::Aspx => {
                    if sub.coding_config == 0 {
                        if sub.mdct_stereo_proc[0] {
                            process_pair(&mut self.frames, 0, 1, self.frame_len_base);
                        }
                        if sub.mdct_stereo_proc[1] {
                            process_pair(&mut self.frames, 2, 3, self.frame_len_base);
                        }
                    }
                }
                CodecMode::AspxAcpl1 | CodecMode::AspxAcpl2 => {
                    if sub.coding_config == 0 && sub.mdct_stereo_proc[0] {
                        process_pair(&mut self.frames, 0, 1, self.frame_len_base);
                    }
                }
                CodecMode::AspxAcpl3 => {}
            },
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebooks::*;
    use cadenza_core::io::BitWriter;

    /// Writes the audio payload for a mono channel: plain + regeneration,
    /// single long 1024 window group, FIXFIX single envelope.
    fn write_mono_aspx_audio(bw: &mut BitWriter) {
        // single_channel_element: codec mode 1 = regeneration.
        bw.put_bits(1, 1);

        // aspx_config (independent frame).
        bw.put_bit(false); // quant_mode_env
        bw.put_bits(0, 3); // start freq
        bw.put_bits(0, 2); // stop freq
        bw.put_bit(true); // master freq scale: logarithmic template
        bw.put_bit(true); // interpolation
        bw.put_bit(false); // no preflattening
        bw.put_bit(true); // limiter
        bw.put_bits(1, 2); // noise subband groups scale
        bw.put_bit(false); // FIXFIX envelope count bit width 1
        bw.put_bits(1, 2); // freq res mode: always low resolution

        // companding_control(1): off, average flag.
        bw.put_bit(false);
        bw.put_bit(false);

        // mono_data: ASF frontend.
        bw.put_bit(false);
        // sf_info: transform length idx 3 -> one 1024 window.
        bw.put_bits(3, 2);
        // psy info: max_sfb = 1 (6 bits), no grouping bits follow.
        bw.put_bits(1, 6);

        // sf_data / section data: codebook 1, run length 1 (5-bit increments).
        bw.put_bits(1, 4);
        bw.put_bits(0, 5);

        // Spectral data: one quad of (1, 0, -1, 1) in signed codebook 1.
        let sym = (2 * 27 + 1 * 9 + 0 * 3 + 2) as u16;
        let (code, len) = ASF_CODEBOOKS[0].codeword(sym).unwrap();
        bw.put_bits(code, len);

        // Scale factors: global value 120; the first coded band takes it
        // directly.
        bw.put_bits(120, 8);

        // No noise fill data.
        bw.put_bit(false);

        // aspx_data_1ch: crossover offset 0 -> sbx = 16.
        bw.put_bits(0, 3);

        // framing: FIXFIX, one envelope.
        let (code, len) = ASPX_INT_CLASS_CODEBOOK.codeword(0).unwrap();
        bw.put_bits(code, len);
        bw.put_bits(0, 1); // num_env = 1

        // delta directions: signal FREQ, noise FREQ.
        bw.put_bit(false);
        bw.put_bit(false);

        // iwc: tna modes for two noise groups, no harmonics, no fic, no tic.
        bw.put_bits(0, 2);
        bw.put_bits(0, 2);
        bw.put_bit(false);
        bw.put_bit(false);
        bw.put_bit(false);

        // Signal envelope, frequency direction over the low-resolution table
        // (11 groups): F0 = 10, then ten zero deltas.
        let (cb, _) = aspx_codebook(DataType::Signal, 0, StereoMode::Level, HcbType::F0);
        let (code, len) = cb.codeword(10u16).unwrap();
        bw.put_bits(code, len);
        let (cb, off) = aspx_codebook(DataType::Signal, 0, StereoMode::Level, HcbType::Df);
        let (code, len) = cb.codeword(off as u16).unwrap();
        for _ in 0..10 {
            bw.put_bits(code, len);
        }

        // Noise envelope over two noise groups: F0 = 4, one zero delta.
        let (cb, _) = aspx_codebook(DataType::Noise, 0, StereoMode::Level, HcbType::F0);
        let (code, len) = cb.codeword(4u16).unwrap();
        bw.put_bits(code, len);
        let (cb, off) = aspx_codebook(DataType::Noise, 0, StereoMode::Level, HcbType::Df);
        let (code, len) = cb.codeword(off as u16).unwrap();
        bw.put_bits(code, len);
    }

    fn write_metadata(bw: &mut BitWriter) {
        bw.put_bits(0, 7); // dialnorm
        bw.put_bit(false); // no extended basic metadata
        bw.put_bits(0, 7); // tools metadata size
        bw.put_bit(false); // no size extension
        bw.put_bit(false); // no drc frame
        bw.put_bit(false); // no emdf payloads
    }

    fn build_mono_frame(sequence_counter: u32) -> Vec<u8> {
        // Audio payload first, so its byte size is known.
        let mut audio = BitWriter::new();
        write_mono_aspx_audio(&mut audio);
        let audio_bytes = audio.finish();

        let mut bw = BitWriter::new();
        crate::toc::tests::write_minimal_toc(&mut bw, sequence_counter, 0);

        // Substream: audio size, alignment, payload, metadata.
        bw.put_bits(audio_bytes.len() as u32, 15);
        bw.put_bit(false);
        bw.align();
        for &byte in &audio_bytes {
            bw.put_bits(u32::from(byte), 8);
        }
        write_metadata(&mut bw);
        bw.align();

        let mut packet = bw.finish();
        // Satisfy the minimum packet length.
        while packet.len() < 8 {
            packet.push(0);
        }
        packet
    }

    #[test]
    fn verify_mono_aspx_scenario() {
        let mut decoder = Ac4Decoder::try_new(&DecoderOptions::default()).unwrap();
        let packet = build_mono_frame(1);

        let n_frames = {
            let buf = decoder.decode(&packet).unwrap();
            assert_eq!(buf.spec().channels.count(), 1);
            buf.frames()
        };

        // Exactly one frame length base of output.
        assert_eq!(n_frames, 1024);

        // The regenerated band occupies subbands [16, 64).
        assert_eq!(decoder.frames[0].aspx.tables.sbx, 16);
        assert_eq!(decoder.frames[0].aspx.tables.sbz, 64);
        assert_eq!(decoder.frames[0].aspx.num_env, 1);

        let mut high_energy = 0f32;
        for ts in 0..decoder.num_qmf_ts {
            for sb in 16..64 {
                high_energy += decoder.frames[0].q.at(ts, sb).norm_sqr();
            }
        }
        assert!(high_energy > 0.0, "no regenerated high-band content");

        // Filterbank histories carry exactly their documented tap counts and
        // were advanced.
        assert_eq!(decoder.channels[0].fbank.analysis.len(), 640);
        assert_eq!(decoder.channels[0].fbank.synthesis.len(), 1280);
        assert!(decoder.channels[0].fbank.analysis.iter().any(|&v| v != 0.0));
        assert_eq!(decoder.channels[0].n_prev, 1024);
    }

    #[test]
    fn verify_decode_is_deterministic() {
        let packet = build_mono_frame(1);

        let mut a = Ac4Decoder::try_new(&DecoderOptions::default()).unwrap();
        let mut b = Ac4Decoder::try_new(&DecoderOptions::default()).unwrap();

        let out_a: Vec<f32> = a.decode(&packet).unwrap().chan(0).to_vec();
        let out_b: Vec<f32> = b.decode(&packet).unwrap().chan(0).to_vec();

        assert_eq!(out_a, out_b);

        // A second frame continues deterministically as well.
        let packet2 = build_mono_frame(2);
        let out_a2: Vec<f32> = a.decode(&packet2).unwrap().chan(0).to_vec();
        let out_b2: Vec<f32> = b.decode(&packet2).unwrap().chan(0).to_vec();
        assert_eq!(out_a2, out_b2);
    }

    #[test]
    fn verify_corrupt_section_preserves_state() {
        let mut decoder = Ac4Decoder::try_new(&DecoderOptions::default()).unwrap();
        decoder.decode(&build_mono_frame(1)).unwrap();

        let n_prev_before = decoder.channels[0].n_prev;
        let overlap_before = decoder.channels[0].overlap.clone();
        let analysis_before = decoder.channels[0].fbank.analysis.clone();

        // The same element, but the section run length escapes past the band
        // count.
        let mut audio = BitWriter::new();
        audio.put_bits(1, 1);
        // aspx_config, present on an independent frame.
        audio.put_bit(false);
        audio.put_bits(0, 3);
        audio.put_bits(0, 2);
        audio.put_bit(true);
        audio.put_bit(true);
        audio.put_bit(false);
        audio.put_bit(true);
        audio.put_bits(1, 2);
        audio.put_bit(false);
        audio.put_bits(1, 2);
        audio.put_bit(false); // compand
        audio.put_bit(false); // compand avg
        audio.put_bit(false); // ASF
        audio.put_bits(3, 2); // 1024 window
        audio.put_bits(1, 6); // max_sfb 1
        audio.put_bits(1, 4); // codebook 1
        audio.put_bits(31, 5); // run-length escape overflows one band
        audio.put_bits(31, 5);
        audio.put_bits(0, 5);
        let audio_bytes = audio.finish();

        let mut bw = BitWriter::new();
        // Not an iframe at either level would stop decoding, so keep the TOC
        // iframe flags set but corrupt only the section table.
        crate::toc::tests::write_minimal_toc(&mut bw, 2, 0);
        bw.put_bits(audio_bytes.len() as u32, 15);
        bw.put_bit(false);
        bw.align();
        for &byte in &audio_bytes {
            bw.put_bits(u32::from(byte), 8);
        }
        write_metadata(&mut bw);
        bw.align();
        let packet = bw.finish();

        let err = decoder.decode(&packet);
        assert!(matches!(err, Err(cadenza_core::errors::Error::InvalidBlockConfig(_))));

        // Channel history kept its previous generation.
        assert_eq!(decoder.channels[0].n_prev, n_prev_before);
        assert_eq!(decoder.channels[0].overlap, overlap_before);
        assert_eq!(decoder.channels[0].fbank.analysis, analysis_before);
    }
}
