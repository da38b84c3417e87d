// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-domain synthesis: dequantization, spectral reordering, and the
//! adaptive-length inverse MDCT with cross-fade windows and overlap-add.

use cadenza_core::dsp::mdct::Imdct;
use cadenza_core::errors::{invalid_block_error, Result};

use crate::channel::ChannelFrame;
use crate::common::*;
use crate::frontend::{max_sfb_for_group, transf_length};
use crate::tables::{self, POW43_TABLE};
use crate::window::generate_kbd_window;

/// Per-frame-length-base synthesis resources: one KBD window and one IMDCT per
/// selectable transform length.
pub struct SynthDsp {
    base_idx: usize,
    kbd: Vec<Vec<f32>>,
    imdct: Vec<Imdct>,
    x: Vec<f32>,
}

impl SynthDsp {
    pub fn new(base_idx: usize) -> Self {
        let mut kbd = Vec::with_capacity(5);
        let mut imdct = Vec::with_capacity(5);

        for i in 0..5 {
            let n_w = tables::TRANSF_LENGTHS[base_idx][i];
            let alpha = if n_w <= 256 { 6.0 } else { 4.0 };

            let mut win = vec![0f32; n_w];
            generate_kbd_window(alpha, n_w, &mut win);
            kbd.push(win);

            imdct.push(Imdct::new_scaled(n_w, 2.0 / n_w as f64));
        }

        SynthDsp { base_idx, kbd, imdct, x: vec![0.0; 2 * MAX_FRAME_LEN] }
    }

    /// The KBD kernel of a transform length, if the length is selectable under
    /// the current frame length base.
    fn kernel(&self, n_w: usize) -> Option<usize> {
        tables::TRANSF_LENGTHS[self.base_idx].iter().position(|&len| len == n_w)
    }
}

/// Dequantizes the decoded coefficients in coding order: `x^(4/3)` expansion
/// and the per-band scale factor gain.
pub fn scale_spec(frame_len_base: usize, cf: &mut ChannelFrame) {
    let pow43: &[f32; 8192] = &POW43_TABLE;

    cf.scaled_spec.fill(0.0);

    for k in 0..frame_len_base {
        let x = cf.quant_spec[k];
        let sfb = usize::from(cf.offset2sfb[k]);
        let g = usize::from(cf.offset2g[k]);

        let mag = pow43[x.unsigned_abs() as usize];
        cf.scaled_spec[k] = cf.sf_gain[g][sfb] * if x < 0 { -mag } else { mag };
    }
}

/// Rearranges the group/band interleaved coefficients into per-window
/// transform order.
pub fn spectral_reordering(frame_len_base: usize, base_idx: usize, cf: &mut ChannelFrame) {
    cf.spec_reord.fill(0.0);

    let mut k = 0;
    let mut win = 0;

    for g in 0..cf.scp.num_window_groups {
        let (transf_length_g, _) = transf_length(frame_len_base, base_idx, &cf.scp, g);
        let sfb_offset = tables::sfb_offsets(transf_length_g);
        let max_sfb = max_sfb_for_group(frame_len_base, &cf.scp, g);

        for sfb in 0..max_sfb {
            for w in 0..cf.scp.num_win_in_group[g] {
                for l in usize::from(sfb_offset[sfb])..usize::from(sfb_offset[sfb + 1]) {
                    cf.spec_reord[cf.win_offset[win + w] + l] = cf.scaled_spec[k];
                    k += 1;
                }
            }
        }
        win += cf.scp.num_win_in_group[g];
    }
}

/// Builds the rising (`dir == false`) or falling (`dir == true`) cross-fade
/// window of length `n`, using the prototype of `min(n, n_prev)` with flat
/// extension on either side.
fn compute_window(
    dsp: &SynthDsp,
    n: usize,
    n_prev: usize,
    dir: bool,
    out: &mut [f32],
) -> Result<()> {
    let n_w = if n <= n_prev { n } else { n_prev };

    let idx = match dsp.kernel(n_w) {
        Some(idx) => idx,
        None => return invalid_block_error("ac4: illegal transform length transition"),
    };

    let n_skip = (n - n_w) / 2;
    let kernel = &dsp.kbd[idx];

    for (i, w) in out[..n].iter_mut().enumerate() {
        *w = if i < n_skip {
            if dir {
                1.0
            }
            else {
                0.0
            }
        }
        else if i < n_w + n_skip {
            if dir {
                kernel[n_w - 1 - (i - n_skip)]
            }
            else {
                kernel[i - n_skip]
            }
        }
        else if dir {
            0.0
        }
        else {
            1.0
        };
    }

    Ok(())
}

/// Validates a frame's transform length chain against the previous length
/// without touching any state. Lets a caller reject a frame before any
/// channel's overlap history advances.
pub fn validate_transform_chain(
    dsp: &SynthDsp,
    frame_len_base: usize,
    base_idx: usize,
    cf: &ChannelFrame,
    n_prev: usize,
) -> Result<()> {
    let mut np = if n_prev == 0 { frame_len_base } else { n_prev };

    for g in 0..cf.scp.num_window_groups {
        let (n, _) = transf_length(frame_len_base, base_idx, &cf.scp, g);
        if dsp.kernel(n.min(np)).is_none() {
            return invalid_block_error("ac4: illegal transform length transition");
        }
        np = n;
    }

    Ok(())
}

/// Synthesizes the frame's PCM from the reordered spectra, overlap-adding into
/// the channel's persistent tail.
///
/// All window-length transitions are validated before any state is touched, so
/// a failure leaves `overlap` and `n_prev` unchanged.
pub fn spectral_synthesis(
    dsp: &mut SynthDsp,
    frame_len_base: usize,
    base_idx: usize,
    cf: &mut ChannelFrame,
    n_prev: &mut usize,
    overlap: &mut [f32],
) -> Result<()> {
    let nfull = frame_len_base;

    validate_transform_chain(dsp, frame_len_base, base_idx, cf, *n_prev)?;

    let mut win = 0;

    for g in 0..cf.scp.num_window_groups {
        let (n, idx) = transf_length(frame_len_base, base_idx, &cf.scp, g);

        if *n_prev == 0 {
            *n_prev = nfull;
        }

        let mut winl = vec![0f32; n];
        let mut winr = vec![0f32; *n_prev];
        compute_window(dsp, n, *n_prev, false, &mut winl)?;
        compute_window(dsp, *n_prev, n, true, &mut winr)?;

        let nskip = (nfull - n) / 2;
        let nskip_prev = (nfull - *n_prev) / 2;

        for w in 0..cf.scp.num_win_in_group[g] {
            let off = cf.win_offset[win + w];

            let imdct = &mut dsp.imdct[idx];
            imdct.imdct(&cf.spec_reord[off..off + n], &mut dsp.x[..2 * n]);

            // Window the new block's first half.
            for i in 0..n {
                dsp.x[i] *= winl[i];
            }

            // Window the second half of the previous block.
            for i in 0..*n_prev {
                overlap[nskip_prev + i] *= winr[i];
            }

            // Overlap-add the first half of the new block.
            for i in 0..n {
                overlap[nskip + i] += dsp.x[i];
            }

            // Emit the finished samples.
            for i in 0..n {
                cf.pcm[off + i] = overlap[i];
            }

            // Slide the part of the tail that was not emitted.
            for i in 0..nskip {
                overlap[i] = overlap[n + i];
            }

            // Carry the unconsumed second half forward.
            for i in 0..n {
                overlap[nskip + i] = dsp.x[n + i];
            }
        }

        *n_prev = n;
        win += cf.scp.num_win_in_group[g];
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelState;

    /// Analytic forward MDCT of one windowed 2N block.
    fn forward_mdct(input: &[f64], window: &[f64], spec: &mut [f64]) {
        let n = spec.len();
        let n2 = 2 * n;
        assert_eq!(input.len(), n2);

        let pi_4n = std::f64::consts::PI / (4.0 * n as f64);

        for (k, s) in spec.iter_mut().enumerate() {
            let mut accum = 0.0;
            for i in 0..n2 {
                accum += window[i]
                    * input[i]
                    * (pi_4n * ((2 * i + 1 + n) * (2 * k + 1)) as f64).cos();
            }
            *s = accum;
        }
    }

    fn long_layout(cf: &mut ChannelFrame, n: usize) {
        cf.scp.long_frame = true;
        cf.scp.transf_length_idx[0] = 4;
        cf.scp.transf_length[0] = n;
        cf.scp.num_windows = 1;
        cf.scp.num_window_groups = 1;
        cf.scp.num_win_in_group[0] = 1;
        cf.win_offset[0] = 0;
    }

    #[test]
    fn verify_steady_state_roundtrip() {
        const N: usize = 384;
        const BASE_IDX: usize = 8;

        // Full 2N analysis window from the rising KBD half.
        let mut half = vec![0f32; N];
        generate_kbd_window(4.0, N, &mut half);
        let mut window = vec![0f64; 2 * N];
        for i in 0..N {
            window[i] = f64::from(half[i]);
            window[2 * N - 1 - i] = f64::from(half[i]);
        }

        // A smooth deterministic test signal.
        let x: Vec<f64> =
            (0..4 * N).map(|i| (i as f64 * 0.013).sin() + 0.3 * (i as f64 * 0.057).cos()).collect();

        let mut dsp = SynthDsp::new(BASE_IDX);
        let mut state = ChannelState::new();
        let mut cf = ChannelFrame::new();

        let mut spec = vec![0f64; N];
        let mut out2 = vec![0f32; N];

        for frame in 0..3 {
            forward_mdct(&x[frame * N..frame * N + 2 * N], &window, &mut spec);

            cf.begin_frame();
            long_layout(&mut cf, N);
            for (dst, &src) in cf.spec_reord.iter_mut().zip(spec.iter()) {
                *dst = src as f32;
            }

            spectral_synthesis(
                &mut dsp,
                N,
                BASE_IDX,
                &mut cf,
                &mut state.n_prev,
                &mut state.overlap,
            )
            .unwrap();

            if frame == 2 {
                out2.copy_from_slice(&cf.pcm[..N]);
            }
        }

        // The third frame is past the warm-up transient: the overlap-added
        // output must reproduce the source block.
        for i in 0..N {
            let expected = x[2 * N + i] as f32;
            assert!(
                (out2[i] - expected).abs() < 1e-3,
                "sample {}: got {}, expected {}",
                i,
                out2[i],
                expected
            );
        }
    }

    #[test]
    fn verify_illegal_transition_is_fatal_and_clean() {
        let mut dsp = SynthDsp::new(0);
        let mut state = ChannelState::new();
        let mut cf = ChannelFrame::new();

        long_layout(&mut cf, 2048);

        // A previous length that no transform of this base can pair with.
        state.n_prev = 384;
        state.overlap[5] = 0.25;

        let err = spectral_synthesis(
            &mut dsp,
            2048,
            0,
            &mut cf,
            &mut state.n_prev,
            &mut state.overlap,
        );

        assert!(matches!(err, Err(cadenza_core::errors::Error::InvalidBlockConfig(_))));
        assert_eq!(state.n_prev, 384);
        assert_eq!(state.overlap[5], 0.25);
    }
}
