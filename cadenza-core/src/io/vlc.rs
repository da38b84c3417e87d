// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `vlc` module provides canonical prefix-code (Huffman) codebooks.
//!
//! A `Codebook` is an immutable decoding table built once from a set of code
//! lengths. Decoding walks the canonical code space one bit at a time; an
//! exhausted walk means the bitstream does not contain a valid codeword.

use crate::errors::{malformed_code_error, Result};
use crate::io::BitReader;

const MAX_CODE_LEN: usize = 32;

/// A canonical prefix-code codebook mapping codewords to symbol indices.
pub struct Codebook {
    /// First canonical code value of each length.
    first_code: [u32; MAX_CODE_LEN + 1],
    /// Number of codewords of each length.
    count: [u32; MAX_CODE_LEN + 1],
    /// Start of each length's run within `syms`.
    sym_base: [u32; MAX_CODE_LEN + 1],
    /// Symbols ordered by (code length, symbol index).
    syms: Vec<u16>,
    max_len: u32,
}

impl Codebook {
    /// Build a codebook from per-symbol code lengths. A length of zero marks a
    /// symbol that is never coded.
    ///
    /// The lengths must satisfy the Kraft inequality; since codebooks are
    /// static data expanded at module initialization, a violation is a
    /// programming error and panics.
    pub fn from_lens(lens: &[u8]) -> Self {
        assert!(lens.len() <= u16::MAX as usize);

        let mut count = [0u32; MAX_CODE_LEN + 1];
        let mut max_len = 0;

        for &len in lens {
            let len = usize::from(len);
            assert!(len <= MAX_CODE_LEN, "codeword too long");
            if len > 0 {
                count[len] += 1;
                max_len = max_len.max(len as u32);
            }
        }

        // Kraft sum, in units of 2^-MAX_CODE_LEN.
        let kraft: u64 =
            (1..=MAX_CODE_LEN).map(|l| u64::from(count[l]) << (MAX_CODE_LEN - l)).sum();
        assert!(kraft <= 1u64 << MAX_CODE_LEN, "code lengths overfull");

        // Assign the first canonical code of each length and the base index of
        // each length's symbol run.
        let mut first_code = [0u32; MAX_CODE_LEN + 1];
        let mut sym_base = [0u32; MAX_CODE_LEN + 1];
        let mut code = 0u32;
        let mut base = 0u32;

        for len in 1..=MAX_CODE_LEN {
            first_code[len] = code;
            sym_base[len] = base;
            code = (code + count[len]) << 1;
            base += count[len];
        }

        // Symbols sorted by (length, index). A counting sort keeps the
        // canonical ordering stable.
        let mut next = sym_base;
        let mut syms = vec![0u16; base as usize];

        for (sym, &len) in lens.iter().enumerate() {
            let len = usize::from(len);
            if len > 0 {
                syms[next[len] as usize] = sym as u16;
                next[len] += 1;
            }
        }

        Codebook { first_code, count, sym_base, syms, max_len }
    }

    /// Read one codeword from the bitstream and return its symbol index.
    pub fn read(&self, bs: &mut BitReader<'_>) -> Result<u16> {
        let mut code = 0u32;

        for len in 1..=self.max_len as usize {
            code = (code << 1) | u32::from(bs.read_bit()?);

            if code >= self.first_code[len] && code - self.first_code[len] < self.count[len] {
                let idx = self.sym_base[len] + (code - self.first_code[len]);
                return Ok(self.syms[idx as usize]);
            }
        }

        malformed_code_error("vlc: no matching codeword")
    }

    /// Returns the canonical `(code, length)` pair for a symbol, if coded.
    /// Used by encoders and test harnesses.
    pub fn codeword(&self, sym: u16) -> Option<(u32, u32)> {
        for len in 1..=self.max_len as usize {
            let base = self.sym_base[len] as usize;
            let count = self.count[len] as usize;

            if let Some(pos) = self.syms[base..base + count].iter().position(|&s| s == sym) {
                return Some((self.first_code[len] + pos as u32, len as u32));
            }
        }
        None
    }
}

/// Derive Huffman code lengths from integer symbol weights.
///
/// The construction is deterministic: ties are broken by node creation order,
/// so a fixed weight table always yields the same codebook. Symbols with
/// weight zero are excluded from the code.
pub fn huffman_lens(weights: &[u32]) -> Vec<u8> {
    struct Node {
        /// Children, or None for a leaf.
        kids: Option<(usize, usize)>,
    }

    let mut nodes: Vec<Node> = Vec::new();
    // (weight, creation sequence, node index); the sequence number makes the
    // ordering total and deterministic.
    let mut queue: Vec<(u64, usize, usize)> = Vec::new();

    for &w in weights {
        if w > 0 {
            let idx = nodes.len();
            nodes.push(Node { kids: None });
            queue.push((u64::from(w), idx, idx));
        }
    }

    let n_leaves = nodes.len();
    let mut lens = vec![0u8; weights.len()];

    if n_leaves == 0 {
        return lens;
    }

    if n_leaves == 1 {
        // A single coded symbol still needs one bit on the wire.
        let sym = weights.iter().position(|&w| w > 0).unwrap();
        lens[sym] = 1;
        return lens;
    }

    while queue.len() > 1 {
        // Descending order; the two lightest nodes sit at the tail.
        queue.sort_by(|a, b| b.cmp(a));

        let lo = queue.pop().unwrap();
        let hi = queue.pop().unwrap();

        let idx = nodes.len();
        nodes.push(Node { kids: Some((lo.2, hi.2)) });
        queue.push((lo.0 + hi.0, idx, idx));
    }

    // Walk depths down from the root.
    let root = queue[0].2;
    let mut depth = vec![0u8; nodes.len()];
    let mut stack = vec![root];

    while let Some(idx) = stack.pop() {
        if let Some((a, b)) = nodes[idx].kids {
            depth[a] = depth[idx] + 1;
            depth[b] = depth[idx] + 1;
            stack.push(a);
            stack.push(b);
        }
    }

    let mut leaf = 0;
    for (sym, &w) in weights.iter().enumerate() {
        if w > 0 {
            lens[sym] = depth[leaf];
            leaf += 1;
        }
    }

    lens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BitWriter;

    #[test]
    fn verify_canonical_roundtrip() {
        // Lengths: a=1, b=2, c=3, d=3. Canonical codes: 0, 10, 110, 111.
        let cb = Codebook::from_lens(&[1, 2, 3, 3]);

        assert_eq!(cb.codeword(0), Some((0b0, 1)));
        assert_eq!(cb.codeword(1), Some((0b10, 2)));
        assert_eq!(cb.codeword(2), Some((0b110, 3)));
        assert_eq!(cb.codeword(3), Some((0b111, 3)));

        let mut bw = BitWriter::new();
        for &sym in &[3u16, 0, 1, 2, 0, 0, 3] {
            let (code, len) = cb.codeword(sym).unwrap();
            bw.put_bits(code, len);
        }
        let buf = bw.finish();

        let mut bs = BitReader::new(&buf);
        for &expected in &[3u16, 0, 1, 2, 0, 0, 3] {
            assert_eq!(cb.read(&mut bs).unwrap(), expected);
        }
    }

    #[test]
    fn verify_unmatched_prefix_fails() {
        // Lengths 2, 2, 2 leave the prefix 11 unassigned.
        let cb = Codebook::from_lens(&[2, 2, 2]);

        let mut bw = BitWriter::new();
        bw.put_bits(0b11, 2);
        bw.put_bits(0, 6);
        let buf = bw.finish();

        let mut bs = BitReader::new(&buf);
        assert!(cb.read(&mut bs).is_err());
    }

    #[test]
    fn verify_huffman_lens_kraft_complete() {
        let weights: Vec<u32> = (0..100).map(|i| 4096u32 >> (i % 13)).collect();
        let lens = huffman_lens(&weights);

        let kraft: f64 = lens.iter().filter(|&&l| l > 0).map(|&l| 2f64.powi(-i32::from(l))).sum();
        assert!((kraft - 1.0).abs() < 1e-9);

        let cb = Codebook::from_lens(&lens);
        for sym in 0..weights.len() as u16 {
            assert!(cb.codeword(sym).is_some());
        }
    }

    #[test]
    fn verify_huffman_lens_deterministic() {
        let weights: Vec<u32> = (0..64).map(|i| 1 + (i * 7) % 23).collect();
        assert_eq!(huffman_lens(&weights), huffman_lens(&weights));
    }

    #[test]
    fn verify_random_symbol_roundtrip() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let weights: Vec<u32> = (0..289).map(|i| 1.max(4096u32 >> (i % 14))).collect();
        let cb = Codebook::from_lens(&huffman_lens(&weights));

        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let syms: Vec<u16> = (0..4096).map(|_| rng.gen_range(0..weights.len() as u16)).collect();

        let mut bw = BitWriter::new();
        for &sym in &syms {
            let (code, len) = cb.codeword(sym).unwrap();
            bw.put_bits(code, len);
        }
        let buf = bw.finish();

        let mut bs = BitReader::new(&buf);
        for &sym in &syms {
            assert_eq!(cb.read(&mut bs).unwrap(), sym);
        }
    }
}
