// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Structural tables of the format: transform-length sets, scale-factor band
//! offsets, subband-group templates, and envelope border tables.
//!
//! All tables are immutable; derived ones are expanded once at first use.

use std::collections::HashMap;

use lazy_static::lazy_static;

use cadenza_core::errors::{invalid_block_error, Result};

/// The legal frame length bases, in samples.
pub const FRAME_LEN_BASES: [usize; 9] = [2048, 1920, 1536, 1024, 960, 768, 512, 480, 384];

/// Frame length base per frame-rate index.
pub const FRAME_LEN_BASE_BY_RATE: [usize; 16] =
    [2048, 2048, 1920, 1920, 1536, 1024, 1024, 960, 960, 768, 512, 512, 480, 384, 1536, 2048];

/// Index of a frame length base within [`FRAME_LEN_BASES`].
pub fn frame_len_base_index(frame_len_base: usize) -> Result<usize> {
    match FRAME_LEN_BASES.iter().position(|&b| b == frame_len_base) {
        Some(idx) => Ok(idx),
        None => invalid_block_error("ac4: frame length base"),
    }
}

/// The five transform lengths selectable for each frame length base. Indices
/// 0..4 are the short lengths keyed by `transf_length_idx`; index 4 is the
/// long transform spanning the whole frame.
pub const TRANSF_LENGTHS: [[usize; 5]; 9] = [
    [256, 512, 1024, 2048, 2048],
    [240, 480, 960, 1920, 1920],
    [192, 384, 768, 1536, 1536],
    [128, 256, 512, 1024, 1024],
    [120, 240, 480, 960, 960],
    [96, 192, 384, 768, 768],
    [128, 256, 512, 512, 512],
    [120, 240, 480, 480, 480],
    [96, 192, 384, 384, 384],
];

/// Transform length for a `transf_length_idx` under a frame length base.
pub fn transf_length_from_idx(frame_len_base_idx: usize, idx: usize) -> usize {
    TRANSF_LENGTHS[frame_len_base_idx][idx]
}

/// Number of scale factor bands of a transform length.
pub fn num_sfb(transf_length: usize) -> usize {
    match transf_length {
        2048 => 63,
        1920 => 61,
        1536 => 55,
        1024 | 960 => 49,
        768 => 43,
        512 | 480 => 36,
        384 => 33,
        256 | 240 => 20,
        192 => 18,
        128 | 120 => 14,
        96 => 12,
        _ => unreachable!(),
    }
}

/// All transform lengths a scale-factor band table exists for.
const SFB_TRANSF_LENGTHS: [usize; 15] =
    [96, 120, 128, 192, 240, 256, 384, 480, 512, 768, 960, 1024, 1536, 1920, 2048];

fn build_sfb_offsets(n: usize, bands: usize) -> Vec<u16> {
    let mut offsets = Vec::with_capacity(bands + 1);
    offsets.push(0u16);

    let nf = n as f64;

    for i in 1..bands {
        let t = i as f64 / bands as f64;
        // Band widths grow toward high frequencies; quantized to multiples of
        // four so that every band is a whole number of coefficient quads.
        let v = nf * (0.2 * t + 0.8 * t * t * t);
        let v = ((v / 4.0).round() as usize) * 4;

        let prev = usize::from(offsets[i - 1]);
        let max = n - 4 * (bands - i);
        offsets.push(v.clamp(prev + 4, max) as u16);
    }

    offsets.push(n as u16);
    offsets
}

lazy_static! {
    static ref SFB_OFFSETS: HashMap<usize, Vec<u16>> = {
        let mut map = HashMap::new();
        for &n in SFB_TRANSF_LENGTHS.iter() {
            map.insert(n, build_sfb_offsets(n, num_sfb(n)));
        }
        map
    };
}

/// Scale-factor band offsets of a transform length. `offsets[sfb]` is the
/// first coefficient of band `sfb`; the final entry equals the transform
/// length.
pub fn sfb_offsets(transf_length: usize) -> &'static [u16] {
    &SFB_OFFSETS[&transf_length]
}

/// Number of scale-factor grouping bits for a channel's window configuration.
pub fn num_grp_bits(
    frame_len_base: usize,
    long_frame: bool,
    transf_length_idx: [usize; 2],
) -> usize {
    if frame_len_base >= 1536 {
        if long_frame {
            return 0;
        }
        if transf_length_idx[0] == transf_length_idx[1] {
            // Both frame halves framed identically.
            return (1 << (3 - transf_length_idx[0])) - 1;
        }
        // Differently framed halves; the boundary between the halves is an
        // implicit group split and carries no bit.
        return (1 << (2 - transf_length_idx[0].min(2)))
            + (1 << (2 - transf_length_idx[1].min(2)))
            - 2;
    }

    if frame_len_base > 512 {
        N_GRP_BITS_B[transf_length_idx[0]]
    }
    else {
        N_GRP_BITS_C[transf_length_idx[0]]
    }
}

const N_GRP_BITS_B: [usize; 4] = [7, 3, 1, 0];
const N_GRP_BITS_C: [usize; 4] = [3, 1, 0, 0];

/// Bit width of the `max_sfb` field for a transform length.
pub fn num_msfb_bits(transf_length: usize) -> u32 {
    if transf_length >= 384 {
        6
    }
    else if transf_length >= 192 {
        5
    }
    else {
        4
    }
}

/// Bit width of the side-channel `max_sfb` field for a transform length.
pub fn num_side_bits(transf_length: usize) -> u32 {
    if transf_length >= 480 {
        5
    }
    else if transf_length >= 240 {
        4
    }
    else {
        3
    }
}

/// Bit width of the LFE `max_sfb` field.
pub fn num_msfbl_bits(frame_len_base: usize) -> u32 {
    if frame_len_base >= 1536 {
        3
    }
    else {
        2
    }
}

/// Master subband-group template used when the frequency scale flag is set.
/// `aspx_start_freq` strides into the front, `aspx_stop_freq` truncates the
/// back; the table spans the regenerated range up to the full band edge.
pub const SBG_TEMPLATE_HIGHRES: [u8; 23] = [
    16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 30, 32, 34, 37, 40, 44, 48, 53, 58, 64,
];

/// Master subband-group template for the linear frequency scale.
pub const SBG_TEMPLATE_LOWRES: [u8; 21] =
    [14, 16, 18, 20, 22, 24, 26, 28, 30, 32, 34, 36, 38, 41, 44, 47, 50, 54, 58, 61, 64];

/// Envelope border positions for the fixed (FIXFIX) interval class: uniform
/// splits of the frame's A-SPX timeslots.
pub fn fixed_envelope_borders(num_timeslots: usize, num_env: usize, borders: &mut [i32]) {
    for (k, border) in borders.iter_mut().enumerate().take(num_env + 1) {
        *border = ((k * num_timeslots + num_env / 2) / num_env) as i32;
    }
}

/// Chirp-factor targets indexed by `[tna_mode][tna_mode_prev]`.
pub const NEW_CHIRP_TAB: [[f32; 4]; 4] = [
    [0.0, 0.6, 0.9, 0.98],
    [0.6, 0.75, 0.9, 0.98],
    [0.0, 0.75, 0.9, 0.98],
    [0.0, 0.75, 0.9, 0.98],
];

/// Quarter-cycle sinusoid phases for tone injection, real and imaginary rows.
pub const ASPX_SINE: [[f32; 4]; 2] = [[1.0, 0.0, -1.0, 0.0], [0.0, 1.0, 0.0, -1.0]];

/// A Linear Congruential Generator (LCG) pseudo-random number generator from
/// Numerical Recipes.
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(state: u32) -> Self {
        Lcg { state }
    }

    #[inline(always)]
    pub fn next(&mut self) -> i32 {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        self.state as i32
    }
}

lazy_static! {
    /// Fixed pseudo-random complex noise table for noise injection. The table
    /// is expanded once and the per-subband index rule makes every use of it
    /// reproducible.
    pub static ref ASPX_NOISE: [[f32; 2]; 512] = {
        let mut lcg = Lcg::new(0x1f2e3d4c);
        let mut table = [[0f32; 2]; 512];
        for entry in table.iter_mut() {
            entry[0] = f32::from((lcg.next() >> 16) as i16) / 32768.0;
            entry[1] = f32::from((lcg.next() >> 16) as i16) / 32768.0;
        }
        table
    };

    /// Pre-computed table of y = x^(4/3) for dequantization.
    pub static ref POW43_TABLE: [f32; 8192] = {
        let mut pow43 = [0f32; 8192];
        for (i, pow43) in pow43.iter_mut().enumerate() {
            *pow43 = f32::powf(i as f32, 4.0 / 3.0);
        }
        pow43
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_sfb_offsets_partition() {
        for &n in SFB_TRANSF_LENGTHS.iter() {
            let offsets = sfb_offsets(n);
            assert_eq!(offsets.len(), num_sfb(n) + 1);
            assert_eq!(offsets[0], 0);
            assert_eq!(usize::from(*offsets.last().unwrap()), n);

            for w in offsets.windows(2) {
                let width = w[1] - w[0];
                assert!(width >= 4);
                assert_eq!(width % 4, 0);
            }
        }
    }

    #[test]
    fn verify_transf_lengths_cover_frame() {
        for (base_idx, &base) in FRAME_LEN_BASES.iter().enumerate() {
            // Short transforms tile the frame a whole number of times.
            for idx in 0..4 {
                let n = transf_length_from_idx(base_idx, idx);
                assert_eq!(base % n, 0);
            }
            assert_eq!(transf_length_from_idx(base_idx, 4), base);
        }
    }

    #[test]
    fn verify_fixed_envelope_borders() {
        let mut borders = [0i32; 6];

        fixed_envelope_borders(16, 1, &mut borders);
        assert_eq!(&borders[..2], &[0, 16]);

        fixed_envelope_borders(16, 4, &mut borders);
        assert_eq!(&borders[..5], &[0, 4, 8, 12, 16]);

        fixed_envelope_borders(15, 2, &mut borders);
        assert_eq!(&borders[..3], &[0, 8, 15]);

        // Borders are monotone for every supported slot count.
        for &ts in &[6usize, 8, 12, 15, 16] {
            for n in 1..=4 {
                fixed_envelope_borders(ts, n, &mut borders);
                for w in borders[..=n].windows(2) {
                    assert!(w[0] < w[1]);
                }
            }
        }
    }

    #[test]
    fn verify_noise_table_is_fixed() {
        assert_eq!(ASPX_NOISE[0], ASPX_NOISE[0]);
        // Values stay within the unit square.
        for entry in ASPX_NOISE.iter() {
            assert!(entry[0].abs() <= 1.0 && entry[1].abs() <= 1.0);
        }
    }
}
