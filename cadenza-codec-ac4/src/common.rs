// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use cadenza_core::errors::{invalid_aspx_error, unsupported_error, Result};

/// Maximum number of windows per frame.
pub const MAX_WINDOWS: usize = 16;
/// Maximum number of window groups per frame.
pub const MAX_WINDOW_GROUPS: usize = 16;
/// Maximum number of scale factor bands of any transform length.
pub const MAX_SFBS: usize = 128;
/// Maximum frame length in samples.
pub const MAX_FRAME_LEN: usize = 2048;

/// Number of QMF subbands.
pub const NUM_QMF_BANDS: usize = 64;
/// Maximum number of QMF timeslots per frame.
pub const MAX_QMF_TS: usize = MAX_FRAME_LEN / NUM_QMF_BANDS;
/// High-frequency generator delay, in QMF timeslots, at the maximum
/// audio-transport-slot width.
pub const MAX_TS_OFFSET_HFGEN: usize = 6;
/// Additional adjuster delay in QMF timeslots.
pub const TS_OFFSET_HFADJ: usize = 4;
/// Rows of the QMF subband grids: one frame of timeslots plus both delays.
pub const GRID_TS: usize = MAX_QMF_TS + MAX_TS_OFFSET_HFGEN + TS_OFFSET_HFADJ;

/// Maximum number of signal envelopes per frame.
pub const MAX_ENVELOPES: usize = 5;
/// Maximum number of noise envelopes per frame.
pub const MAX_NOISE_ENVELOPES: usize = 2;
/// Maximum number of high-band patches.
pub const MAX_PATCHES: usize = 6;
/// Maximum number of noise subband groups.
pub const MAX_NOISE_SBG: usize = 5;
/// Maximum number of master / signal subband groups (exclusive of the closing
/// boundary).
pub const MAX_SBG: usize = 24;
/// Maximum number of limiter subband groups.
pub const MAX_LIM_SBG: usize = 32;

/// The stream's codec mode selects which reconstruction stages run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodecMode {
    /// Plain transform coding.
    Simple,
    /// Transform coding plus high-band regeneration.
    Aspx,
    /// Regeneration plus partial-band coupling.
    AspxAcpl1,
    /// Regeneration plus full-band coupling.
    AspxAcpl2,
    /// Regeneration plus two-channel coupling.
    AspxAcpl3,
}

impl CodecMode {
    pub fn from_bits(value: u32) -> Result<CodecMode> {
        match value {
            0 => Ok(CodecMode::Simple),
            1 => Ok(CodecMode::Aspx),
            2 => Ok(CodecMode::AspxAcpl1),
            3 => Ok(CodecMode::AspxAcpl2),
            4 => Ok(CodecMode::AspxAcpl3),
            _ => unsupported_error("ac4: codec mode"),
        }
    }

    pub fn has_aspx(self) -> bool {
        !matches!(self, CodecMode::Simple)
    }
}

/// Envelope interval class of an A-SPX frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntervalClass {
    FixFix,
    FixVar,
    VarFix,
    VarVar,
}

impl IntervalClass {
    pub fn from_index(value: u16) -> Result<IntervalClass> {
        match value {
            0 => Ok(IntervalClass::FixFix),
            1 => Ok(IntervalClass::FixVar),
            2 => Ok(IntervalClass::VarFix),
            3 => Ok(IntervalClass::VarVar),
            _ => invalid_aspx_error("ac4: interval class"),
        }
    }
}

/// Which entropy frontend codes a channel's spectrum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpectralFrontend {
    /// The audio spectral frontend (prefix-coded coefficients).
    Asf,
    /// The speech spectral frontend (range-coded residual).
    Ssf,
}

impl SpectralFrontend {
    pub fn from_bit(bit: bool) -> SpectralFrontend {
        if bit {
            SpectralFrontend::Ssf
        }
        else {
            SpectralFrontend::Asf
        }
    }
}

/// Envelope data category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    Signal = 0,
    Noise = 1,
}

/// Stereo coding of envelope data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StereoMode {
    Level = 0,
    Balance = 1,
}

/// Differential coding context of an envelope codeword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HcbType {
    F0 = 0,
    Df = 1,
    Dt = 2,
}
