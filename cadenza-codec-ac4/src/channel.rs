// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-channel state. `ChannelState` is the persistent record threading
//! history across frames; `ChannelFrame` is the scratch a single frame decodes
//! into. A frame mutates only `ChannelFrame` until it has fully decoded, then
//! commits its history updates in one step.

use num_complex::Complex32;

use crate::common::*;

/// A complex QMF subband grid spanning one frame of timeslots plus the
/// generator and adjuster delays.
#[derive(Clone)]
pub struct QmfGrid {
    data: Vec<Complex32>,
}

impl QmfGrid {
    pub fn new() -> Self {
        QmfGrid { data: vec![Complex32::default(); GRID_TS * NUM_QMF_BANDS] }
    }

    pub fn zero(&mut self) {
        self.data.fill(Complex32::default());
    }

    #[inline(always)]
    pub fn at(&self, ts: usize, sb: usize) -> Complex32 {
        self.data[ts * NUM_QMF_BANDS + sb]
    }

    #[inline(always)]
    pub fn at_mut(&mut self, ts: usize, sb: usize) -> &mut Complex32 {
        &mut self.data[ts * NUM_QMF_BANDS + sb]
    }

    pub fn copy_from(&mut self, other: &QmfGrid) {
        self.data.copy_from_slice(&other.data);
    }
}

impl Default for QmfGrid {
    fn default() -> Self {
        QmfGrid::new()
    }
}

/// QMF filterbank delay lines. Owned by the channel, not by the filterbank
/// functions, which are pure transforms over explicit buffers.
pub struct FilterbankHistory {
    pub analysis: Vec<f32>,
    pub synthesis: Vec<f32>,
}

impl FilterbankHistory {
    fn new() -> Self {
        FilterbankHistory { analysis: vec![0.0; 640], synthesis: vec![0.0; 1280] }
    }

    fn reset(&mut self) {
        self.analysis.fill(0.0);
        self.synthesis.fill(0.0);
    }
}

/// Subband-group partition tables of the regeneration engine. Rebuilt only on
/// a master reset, otherwise carried over between frames.
#[derive(Clone)]
pub struct AspxTables {
    pub num_sbg_master: usize,
    pub sbg_master: [usize; MAX_SBG + 1],

    pub num_sbg_sig_highres: usize,
    pub sbg_sig_highres: [usize; MAX_SBG + 1],
    pub num_sbg_sig_lowres: usize,
    pub sbg_sig_lowres: [usize; MAX_SBG + 1],

    pub num_sbg_noise: usize,
    pub sbg_noise: [usize; MAX_NOISE_SBG + 1],

    pub num_sbg_lim: usize,
    pub sbg_lim: [usize; MAX_LIM_SBG + 1],

    pub num_patches: usize,
    pub patch_num_sb: [usize; MAX_PATCHES],
    pub patch_start_sb: [usize; MAX_PATCHES],
    pub sbg_patches: [usize; MAX_PATCHES + 1],

    /// First master subband.
    pub sba: usize,
    /// Crossover subband: the first regenerated subband.
    pub sbx: usize,
    /// One past the last regenerated subband.
    pub sbz: usize,
    /// Number of regenerated subbands.
    pub num_sb_aspx: usize,
}

impl Default for AspxTables {
    fn default() -> Self {
        AspxTables {
            num_sbg_master: 0,
            sbg_master: [0; MAX_SBG + 1],
            num_sbg_sig_highres: 0,
            sbg_sig_highres: [0; MAX_SBG + 1],
            num_sbg_sig_lowres: 0,
            sbg_sig_lowres: [0; MAX_SBG + 1],
            num_sbg_noise: 0,
            sbg_noise: [0; MAX_NOISE_SBG + 1],
            num_sbg_lim: 0,
            sbg_lim: [0; MAX_LIM_SBG + 1],
            num_patches: 0,
            patch_num_sb: [0; MAX_PATCHES],
            patch_start_sb: [0; MAX_PATCHES],
            sbg_patches: [0; MAX_PATCHES + 1],
            sba: 0,
            sbx: 0,
            sbz: 0,
            num_sb_aspx: 0,
        }
    }
}

/// Persistent regeneration state of one channel.
pub struct AspxState {
    pub tables: AspxTables,
    /// Set when the subband-group tables have been built at least once.
    pub have_tables: bool,

    pub xover_subband_offset: usize,

    pub num_env_prev: usize,
    pub num_noise_prev: usize,
    pub tsg_ptr_prev: i32,
    pub previous_stop_pos: i32,
    /// Per-envelope frequency resolution of the previous frame.
    pub freqres_prev: [u8; MAX_ENVELOPES],

    pub tna_mode_prev: [u8; MAX_NOISE_SBG],
    pub chirp_prev: [f32; MAX_NOISE_SBG],
    /// Harmonic markers carry over when a frame omits them.
    pub add_harmonic: [bool; MAX_SBG],

    pub qscf_sig_prev: [[i32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub qscf_noise_prev: [[i32; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES],

    /// Sinusoid markers of the previous frame's last envelope.
    pub sine_marker_prev: [[bool; NUM_QMF_BANDS]; MAX_ENVELOPES],
    /// Tone phase counters, per timeslot and subband.
    pub sine_phase_prev: Vec<i8>,
    /// Noise table counters, per timeslot and subband.
    pub noise_idx_prev: Vec<i16>,

    /// Previous-frame QMF generations, swapped in at frame commit.
    pub q_prev: QmfGrid,
    pub q_low_prev: QmfGrid,
    pub q_high_prev: QmfGrid,
    pub y_prev: QmfGrid,
}

impl AspxState {
    fn new() -> Self {
        AspxState {
            tables: AspxTables::default(),
            have_tables: false,
            xover_subband_offset: 0,
            num_env_prev: 0,
            num_noise_prev: 0,
            tsg_ptr_prev: -1,
            previous_stop_pos: 0,
            freqres_prev: [0; MAX_ENVELOPES],
            tna_mode_prev: [0; MAX_NOISE_SBG],
            chirp_prev: [0.0; MAX_NOISE_SBG],
            add_harmonic: [false; MAX_SBG],
            qscf_sig_prev: [[0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            qscf_noise_prev: [[0; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES],
            sine_marker_prev: [[false; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sine_phase_prev: vec![0; GRID_TS * NUM_QMF_BANDS],
            noise_idx_prev: vec![0; GRID_TS * NUM_QMF_BANDS],
            q_prev: QmfGrid::new(),
            q_low_prev: QmfGrid::new(),
            q_high_prev: QmfGrid::new(),
            y_prev: QmfGrid::new(),
        }
    }

    fn reset(&mut self) {
        *self = AspxState::new();
    }
}

/// The persistent per-channel record. Lives as long as the decoder; mutated
/// only at frame commit.
pub struct ChannelState {
    /// Transform length of the previous window group; zero before the first.
    pub n_prev: usize,
    /// MDCT overlap-add tail.
    pub overlap: Vec<f32>,
    pub fbank: FilterbankHistory,
    pub aspx: AspxState,
}

impl ChannelState {
    pub fn new() -> Self {
        ChannelState {
            n_prev: 0,
            overlap: vec![0.0; 2 * MAX_FRAME_LEN],
            fbank: FilterbankHistory::new(),
            aspx: AspxState::new(),
        }
    }

    /// Full reset at stream (re)initialization.
    pub fn reset(&mut self) {
        self.n_prev = 0;
        self.overlap.fill(0.0);
        self.fbank.reset();
        self.aspx.reset();
    }
}

/// Window layout of one channel for one frame.
#[derive(Clone)]
pub struct WindowParams {
    pub long_frame: bool,
    pub transf_length_idx: [usize; 2],
    pub transf_length: [usize; 2],
    pub different_framing: bool,
    pub max_sfb: [usize; 2],
    pub max_sfb_side: [usize; 2],
    pub scale_factor_grouping: [bool; 15],
    pub num_windows: usize,
    pub num_window_groups: usize,
    pub window_to_group: [usize; MAX_WINDOWS],
    pub num_win_in_group: [usize; MAX_WINDOW_GROUPS],
    pub dual_maxsfb: bool,
    pub side_limited: bool,
    pub side_channel: bool,
}

impl Default for WindowParams {
    fn default() -> Self {
        WindowParams {
            long_frame: false,
            transf_length_idx: [0; 2],
            transf_length: [0; 2],
            different_framing: false,
            max_sfb: [0; 2],
            max_sfb_side: [0; 2],
            scale_factor_grouping: [false; 15],
            num_windows: 0,
            num_window_groups: 0,
            window_to_group: [0; MAX_WINDOWS],
            num_win_in_group: [0; MAX_WINDOW_GROUPS],
            dual_maxsfb: false,
            side_limited: false,
            side_channel: false,
        }
    }
}

/// Frame-scoped regeneration parameters of one channel.
#[derive(Clone)]
pub struct AspxFrameParams {
    /// Tables in effect this frame: rebuilt or carried over.
    pub tables: AspxTables,
    pub master_reset: bool,
    pub xover_subband_offset: usize,

    pub int_class: IntervalClass,
    pub num_env: usize,
    pub num_noise: usize,
    /// Effective previous-frame envelope counts, defaulted to this frame's on
    /// stream start.
    pub num_env_prev: usize,
    pub num_noise_prev: usize,
    /// Stop position committed as `previous_stop_pos` for the next frame.
    pub stop_pos: i32,
    pub num_rel_left: usize,
    pub num_rel_right: usize,
    pub var_bord_left: i32,
    pub var_bord_right: i32,
    pub rel_bord_left: [i32; 4],
    pub rel_bord_right: [i32; 4],
    pub tsg_ptr: i32,
    pub freq_res: [u8; MAX_ENVELOPES],
    pub qmode_env: usize,
    pub balance: bool,

    pub sig_delta_dir: [bool; MAX_ENVELOPES],
    pub noise_delta_dir: [bool; MAX_NOISE_ENVELOPES],
    pub tna_mode: [u8; MAX_NOISE_SBG],
    pub add_harmonic: [bool; MAX_SBG],
    pub fic_used_in_sfb: [bool; MAX_SBG],
    pub tic_used_in_slot: [bool; MAX_QMF_TS],

    /// Envelope borders, in A-SPX timeslot-group units.
    pub atsg_sig: [i32; MAX_ENVELOPES + 1],
    pub atsg_noise: [i32; MAX_NOISE_ENVELOPES + 1],
    pub atsg_freqres: [u8; MAX_ENVELOPES],

    pub num_sbg_sig: [usize; MAX_ENVELOPES],
    pub sbg_sig: [[usize; MAX_SBG + 1]; MAX_ENVELOPES],

    /// Raw envelope codewords by `[data type][envelope][subband group]`.
    pub data: [[[i32; NUM_QMF_BANDS]; MAX_ENVELOPES]; 2],

    pub qscf_sig: [[i32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub qscf_noise: [[i32; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES],

    pub scf_sig_sbg: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub scf_noise_sbg: [[f32; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES],

    pub scf_sig_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub scf_noise_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub est_sig_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],

    pub sine_marker: [[bool; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub sine_area_sb: [[bool; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub sine_lev_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub noise_lev_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub sig_gain_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub max_sig_gain_sbg: [[f32; MAX_LIM_SBG]; MAX_ENVELOPES],
    pub max_sig_gain_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub noise_lev_sb_lim: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub sig_gain_sb_lim: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub boost_fact_sbg: [[f32; MAX_LIM_SBG]; MAX_ENVELOPES],
    pub boost_fact_sb: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub sig_gain_sb_adj: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub noise_lev_sb_adj: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],
    pub sine_lev_sb_adj: [[f32; NUM_QMF_BANDS]; MAX_ENVELOPES],

    pub chirp: [f32; MAX_NOISE_SBG],
    pub gain_vec: [f32; NUM_QMF_BANDS],
    pub alpha0: [Complex32; NUM_QMF_BANDS],
    pub alpha1: [Complex32; NUM_QMF_BANDS],
    pub cov: [[[Complex32; 3]; 3]; NUM_QMF_BANDS],

    /// Tone phase / noise table counters computed this frame.
    pub sine_phase: Vec<i8>,
    pub noise_idx: Vec<i16>,
}

impl AspxFrameParams {
    pub fn new() -> Self {
        AspxFrameParams {
            tables: AspxTables::default(),
            master_reset: false,
            xover_subband_offset: 0,
            int_class: IntervalClass::FixFix,
            num_env: 0,
            num_noise: 0,
            num_env_prev: 0,
            num_noise_prev: 0,
            stop_pos: 0,
            num_rel_left: 0,
            num_rel_right: 0,
            var_bord_left: 0,
            var_bord_right: 0,
            rel_bord_left: [0; 4],
            rel_bord_right: [0; 4],
            tsg_ptr: -1,
            freq_res: [0; MAX_ENVELOPES],
            qmode_env: 0,
            balance: false,
            sig_delta_dir: [false; MAX_ENVELOPES],
            noise_delta_dir: [false; MAX_NOISE_ENVELOPES],
            tna_mode: [0; MAX_NOISE_SBG],
            add_harmonic: [false; MAX_SBG],
            fic_used_in_sfb: [false; MAX_SBG],
            tic_used_in_slot: [false; MAX_QMF_TS],
            atsg_sig: [0; MAX_ENVELOPES + 1],
            atsg_noise: [0; MAX_NOISE_ENVELOPES + 1],
            atsg_freqres: [0; MAX_ENVELOPES],
            num_sbg_sig: [0; MAX_ENVELOPES],
            sbg_sig: [[0; MAX_SBG + 1]; MAX_ENVELOPES],
            data: [[[0; NUM_QMF_BANDS]; MAX_ENVELOPES]; 2],
            qscf_sig: [[0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            qscf_noise: [[0; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES],
            scf_sig_sbg: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            scf_noise_sbg: [[0.0; NUM_QMF_BANDS]; MAX_NOISE_ENVELOPES],
            scf_sig_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            scf_noise_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            est_sig_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sine_marker: [[false; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sine_area_sb: [[false; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sine_lev_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            noise_lev_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sig_gain_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            max_sig_gain_sbg: [[0.0; MAX_LIM_SBG]; MAX_ENVELOPES],
            max_sig_gain_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            noise_lev_sb_lim: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sig_gain_sb_lim: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            boost_fact_sbg: [[0.0; MAX_LIM_SBG]; MAX_ENVELOPES],
            boost_fact_sb: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sig_gain_sb_adj: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            noise_lev_sb_adj: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            sine_lev_sb_adj: [[0.0; NUM_QMF_BANDS]; MAX_ENVELOPES],
            chirp: [0.0; MAX_NOISE_SBG],
            gain_vec: [1.0; NUM_QMF_BANDS],
            alpha0: [Complex32::default(); NUM_QMF_BANDS],
            alpha1: [Complex32::default(); NUM_QMF_BANDS],
            cov: [[[Complex32::default(); 3]; 3]; NUM_QMF_BANDS],
            sine_phase: vec![0; GRID_TS * NUM_QMF_BANDS],
            noise_idx: vec![0; GRID_TS * NUM_QMF_BANDS],
        }
    }
}

/// Everything one frame decodes for one channel before synthesis. Reused
/// between frames; every field is rewritten or cleared by the stages that own
/// it.
pub struct ChannelFrame {
    pub scp: WindowParams,

    pub num_sec: [usize; MAX_WINDOW_GROUPS],
    pub sect_cb: [[u8; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub sect_start: [[u16; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub sect_end: [[u16; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub sfb_cb: [[u8; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub sect_sfb_offset: [[u16; MAX_SFBS]; MAX_WINDOW_GROUPS],

    pub max_quant_idx: [[i32; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub sf_gain: [[f32; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub snf_data_exists: bool,
    pub dpcm_snf: [[i32; MAX_SFBS]; MAX_WINDOW_GROUPS],

    pub quant_spec: Vec<i32>,
    pub scaled_spec: Vec<f32>,
    pub spec_reord: Vec<f32>,
    pub offset2sfb: Vec<u16>,
    pub offset2g: Vec<u8>,
    pub win_offset: [usize; MAX_WINDOWS],

    pub pcm: Vec<f32>,

    pub sap_mode: u8,
    pub ms_used: [[bool; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub sap_coeff_used: [[bool; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub dpcm_alpha_q: [[i32; MAX_SFBS]; MAX_WINDOW_GROUPS],
    pub delta_code_time: bool,

    pub aspx: Box<AspxFrameParams>,

    pub q: QmfGrid,
    pub q_low: QmfGrid,
    pub q_low_ext: QmfGrid,
    pub q_high: QmfGrid,
    pub qmf_sine: QmfGrid,
    pub qmf_noise: QmfGrid,
    pub y: QmfGrid,
}

impl ChannelFrame {
    pub fn new() -> Self {
        ChannelFrame {
            scp: WindowParams::default(),
            num_sec: [0; MAX_WINDOW_GROUPS],
            sect_cb: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            sect_start: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            sect_end: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            sfb_cb: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            sect_sfb_offset: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            max_quant_idx: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            sf_gain: [[0.0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            snf_data_exists: false,
            dpcm_snf: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            quant_spec: vec![0; MAX_FRAME_LEN],
            scaled_spec: vec![0.0; MAX_FRAME_LEN],
            spec_reord: vec![0.0; MAX_FRAME_LEN],
            offset2sfb: vec![0; MAX_FRAME_LEN],
            offset2g: vec![0; MAX_FRAME_LEN],
            win_offset: [0; MAX_WINDOWS],
            pcm: vec![0.0; MAX_FRAME_LEN],
            sap_mode: 0,
            ms_used: [[false; MAX_SFBS]; MAX_WINDOW_GROUPS],
            sap_coeff_used: [[false; MAX_SFBS]; MAX_WINDOW_GROUPS],
            dpcm_alpha_q: [[0; MAX_SFBS]; MAX_WINDOW_GROUPS],
            delta_code_time: false,
            aspx: Box::new(AspxFrameParams::new()),
            q: QmfGrid::new(),
            q_low: QmfGrid::new(),
            q_low_ext: QmfGrid::new(),
            q_high: QmfGrid::new(),
            qmf_sine: QmfGrid::new(),
            qmf_noise: QmfGrid::new(),
            y: QmfGrid::new(),
        }
    }

    /// Clear the parts a new frame does not unconditionally rewrite.
    pub fn begin_frame(&mut self) {
        self.quant_spec.fill(0);
        self.scaled_spec.fill(0.0);
        self.spec_reord.fill(0.0);
        self.offset2sfb.fill(0);
        self.offset2g.fill(0);
        self.pcm.fill(0.0);
        self.sap_mode = 0;
        self.snf_data_exists = false;
        self.ms_used = [[false; MAX_SFBS]; MAX_WINDOW_GROUPS];
        self.sap_coeff_used = [[false; MAX_SFBS]; MAX_WINDOW_GROUPS];
        self.max_quant_idx = [[0; MAX_SFBS]; MAX_WINDOW_GROUPS];
        self.sf_gain = [[0.0; MAX_SFBS]; MAX_WINDOW_GROUPS];
        self.sect_cb = [[0; MAX_SFBS]; MAX_WINDOW_GROUPS];
        self.sfb_cb = [[0; MAX_SFBS]; MAX_WINDOW_GROUPS];
        self.q.zero();
        self.q_low.zero();
        self.q_low_ext.zero();
        self.q_high.zero();
        self.qmf_sine.zero();
        self.qmf_noise.zero();
        self.y.zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_channel_state_reset() {
        let mut state = ChannelState::new();

        state.n_prev = 1024;
        state.overlap[7] = 1.0;
        state.fbank.analysis[0] = 2.0;
        state.aspx.num_env_prev = 3;
        state.aspx.chirp_prev[0] = 0.5;

        state.reset();

        assert_eq!(state.n_prev, 0);
        assert_eq!(state.overlap[7], 0.0);
        assert_eq!(state.fbank.analysis[0], 0.0);
        assert_eq!(state.aspx.num_env_prev, 0);
        assert_eq!(state.aspx.chirp_prev[0], 0.0);
        assert_eq!(state.aspx.tsg_ptr_prev, -1);
    }

    #[test]
    fn verify_qmf_grid_addressing() {
        let mut grid = QmfGrid::new();
        *grid.at_mut(GRID_TS - 1, NUM_QMF_BANDS - 1) = Complex32::new(1.0, -1.0);
        assert_eq!(grid.at(GRID_TS - 1, NUM_QMF_BANDS - 1), Complex32::new(1.0, -1.0));
        assert_eq!(grid.at(0, 0), Complex32::default());

        grid.zero();
        assert_eq!(grid.at(GRID_TS - 1, NUM_QMF_BANDS - 1), Complex32::default());
    }
}
