// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Prefix-code codebooks of the format.
//!
//! Every codebook is described by a compact weight or length specification and
//! expanded into an immutable canonical `Codebook` exactly once, at first use.

use lazy_static::lazy_static;

use cadenza_core::io::vlc::{huffman_lens, Codebook};

use crate::common::{DataType, HcbType, StereoMode};

/// Number of spectrum codebooks.
pub const NUM_ASF_CODEBOOKS: usize = 11;

/// Coefficient tuple width per spectrum codebook.
pub const ASF_CODEBOOK_DIM: [usize; NUM_ASF_CODEBOOKS] = [4, 4, 4, 4, 2, 2, 2, 2, 2, 2, 2];

/// Per-axis modulus per spectrum codebook.
pub const ASF_CODEBOOK_MOD: [usize; NUM_ASF_CODEBOOKS] = [3, 3, 3, 3, 9, 9, 8, 8, 13, 13, 17];

/// Value offset per spectrum codebook (signed books centre on the offset).
pub const ASF_CODEBOOK_OFF: [i32; NUM_ASF_CODEBOOKS] = [1, 1, 0, 0, 4, 4, 0, 0, 0, 0, 0];

/// Whether a spectrum codebook codes magnitudes with separate sign bits.
pub const ASF_CODEBOOK_UNSIGNED: [bool; NUM_ASF_CODEBOOKS] =
    [false, false, true, true, false, false, true, true, true, true, true];

/// The escape spectrum codebook index (1-based, as coded).
pub const ASF_ESCAPE_CODEBOOK: usize = 11;

/// Differential scale factors are coded with this offset.
pub const SF_DPCM_OFFSET: i32 = 60;

/// Differential noise-fill values are coded with this offset.
pub const SNF_DPCM_OFFSET: i32 = 31;

/// Weights for a differential codebook: symbols decay exponentially away from
/// the centre.
fn dpcm_weights(n: usize, centre: usize, decay: u32) -> Vec<u32> {
    (0..n)
        .map(|s| {
            let d = (s as i64 - centre as i64).unsigned_abs() as u32;
            1.max(4096u32 >> (decay * d).min(31))
        })
        .collect()
}

/// Weights for an absolute-valued codebook: slow decay from zero.
fn absolute_weights(n: usize) -> Vec<u32> {
    (0..n).map(|s| 1.max(1024u32 >> ((s as u32) / 4).min(31))).collect()
}

/// Weights for a spectrum codebook: tuples with small magnitudes are likely.
fn spectrum_weights(cb: usize) -> Vec<u32> {
    let dim = ASF_CODEBOOK_DIM[cb];
    let modulus = ASF_CODEBOOK_MOD[cb];
    let off = ASF_CODEBOOK_OFF[cb];
    let count = modulus.pow(dim as u32);

    (0..count)
        .map(|idx| {
            let mut rem = idx;
            let mut dist = 0u32;
            for _ in 0..dim {
                let digit = (rem % modulus) as i32;
                dist += (digit - off).unsigned_abs();
                rem /= modulus;
            }
            1.max(4096u32 >> (2 * dist).min(31))
        })
        .collect()
}

fn codebook_from_weights(weights: &[u32]) -> Codebook {
    Codebook::from_lens(&huffman_lens(weights))
}

lazy_static! {
    /// Differential scale-factor codebook, symbols 0..=120 about offset 60.
    pub static ref SF_CODEBOOK: Codebook = codebook_from_weights(&dpcm_weights(121, 60, 2));

    /// Differential scale-factor noise-fill codebook, symbols 0..=62.
    pub static ref SNF_CODEBOOK: Codebook = codebook_from_weights(&dpcm_weights(63, 31, 2));

    /// Spectrum codebooks 1..=11 (index 0 holds codebook 1).
    pub static ref ASF_CODEBOOKS: Vec<Codebook> =
        (0..NUM_ASF_CODEBOOKS).map(|cb| codebook_from_weights(&spectrum_weights(cb))).collect();

    /// Envelope interval class codebook.
    pub static ref ASPX_INT_CLASS_CODEBOOK: Codebook = Codebook::from_lens(&[1, 2, 3, 3]);

    /// Signal envelope codebooks by `[stereo][quant][hcb]`.
    pub static ref ASPX_SIGNAL_CODEBOOKS: Vec<Vec<Vec<Codebook>>> = (0..2)
        .map(|stereo| {
            (0..2)
                .map(|quant| {
                    (0..3)
                        .map(|hcb| {
                            let n = ASPX_SIGNAL_SIZE[stereo][hcb];
                            let off = ASPX_SIGNAL_OFF[stereo][hcb] as usize;
                            if hcb == 0 {
                                codebook_from_weights(&absolute_weights(n))
                            }
                            else {
                                codebook_from_weights(&dpcm_weights(n, off, 2 + quant as u32))
                            }
                        })
                        .collect()
                })
                .collect()
        })
        .collect();

    /// Noise envelope codebooks by `[stereo][hcb]`.
    pub static ref ASPX_NOISE_CODEBOOKS: Vec<Vec<Codebook>> = (0..2)
        .map(|stereo| {
            (0..3)
                .map(|hcb| {
                    let n = ASPX_NOISE_SIZE[stereo][hcb];
                    let off = ASPX_NOISE_OFF[stereo][hcb] as usize;
                    if hcb == 0 {
                        codebook_from_weights(&absolute_weights(n))
                    }
                    else {
                        codebook_from_weights(&dpcm_weights(n, off, 2))
                    }
                })
                .collect()
        })
        .collect();

    /// Coupling parameter codebooks by `[data type][quant][hcb]`. Consumed for
    /// bit alignment only.
    pub static ref ACPL_CODEBOOKS: Vec<Vec<Vec<Codebook>>> = (0..4)
        .map(|_| {
            (0..2)
                .map(|quant| {
                    let n_f0 = if quant == 0 { 64 } else { 32 };
                    (0..3)
                        .map(|hcb| {
                            if hcb == 0 {
                                codebook_from_weights(&absolute_weights(n_f0))
                            }
                            else {
                                codebook_from_weights(&dpcm_weights(63, 31, 2))
                            }
                        })
                        .collect()
                })
                .collect()
        })
        .collect();

    /// Channel mode codebook of the substream info layer. Symbol 16 marks a
    /// variable-bits extension.
    pub static ref CHANNEL_MODE_CODEBOOK: Codebook =
        Codebook::from_lens(&[1, 2, 3, 4, 5, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 9]);

    /// Bitrate indicator codebook of the substream info layer.
    pub static ref BITRATE_INDICATOR_CODEBOOK: Codebook =
        Codebook::from_lens(&[1, 2, 3, 4, 5, 5]);
}

/// Envelope codebook sizes by `[stereo][hcb]`.
const ASPX_SIGNAL_SIZE: [[usize; 3]; 2] = [[64, 63, 63], [25, 49, 49]];
const ASPX_NOISE_SIZE: [[usize; 3]; 2] = [[32, 63, 63], [25, 49, 49]];

/// Envelope codeword offsets by `[stereo][hcb]`.
const ASPX_SIGNAL_OFF: [[i32; 3]; 2] = [[0, 31, 31], [12, 24, 24]];
const ASPX_NOISE_OFF: [[i32; 3]; 2] = [[0, 31, 31], [12, 24, 24]];

/// The envelope codebook and codeword offset for one data category.
pub fn aspx_codebook(
    data_type: DataType,
    quant_mode: usize,
    stereo_mode: StereoMode,
    hcb_type: HcbType,
) -> (&'static Codebook, i32) {
    let stereo = stereo_mode as usize;
    let hcb = hcb_type as usize;

    match data_type {
        DataType::Signal => {
            (&ASPX_SIGNAL_CODEBOOKS[stereo][quant_mode][hcb], ASPX_SIGNAL_OFF[stereo][hcb])
        }
        DataType::Noise => (&ASPX_NOISE_CODEBOOKS[stereo][hcb], ASPX_NOISE_OFF[stereo][hcb]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::io::{BitReader, BitWriter};

    #[test]
    fn verify_spectrum_codebooks_complete() {
        for cb in 0..NUM_ASF_CODEBOOKS {
            let count = ASF_CODEBOOK_MOD[cb].pow(ASF_CODEBOOK_DIM[cb] as u32);
            for sym in 0..count as u16 {
                assert!(ASF_CODEBOOKS[cb].codeword(sym).is_some());
            }
        }
    }

    #[test]
    fn verify_scale_factor_roundtrip() {
        let syms: Vec<u16> = vec![60, 0, 120, 59, 61, 35];

        let mut bw = BitWriter::new();
        for &sym in &syms {
            let (code, len) = SF_CODEBOOK.codeword(sym).unwrap();
            bw.put_bits(code, len);
        }
        let buf = bw.finish();

        let mut bs = BitReader::new(&buf);
        for &sym in &syms {
            assert_eq!(SF_CODEBOOK.read(&mut bs).unwrap(), sym);
        }
    }

    #[test]
    fn verify_centre_symbol_is_cheapest() {
        let (_, len_centre) = SF_CODEBOOK.codeword(60).unwrap();
        let (_, len_far) = SF_CODEBOOK.codeword(0).unwrap();
        assert!(len_centre < len_far);
    }
}
