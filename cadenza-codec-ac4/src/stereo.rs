// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stereo audio processing (SAP): per-band identity, mid/side, or scalable
//! matrixing of a channel pair's scaled spectra.

use cadenza_core::errors::Result;
use cadenza_core::io::BitReader;

use crate::channel::ChannelFrame;
use crate::codebooks::{SF_CODEBOOK, SF_DPCM_OFFSET};
use crate::common::*;
use crate::frontend::max_sfb_for_group;

/// Reads the per-even-band coefficient presence flags and the differential
/// coefficient codewords of the scalable matrix mode.
fn sap_data(bs: &mut BitReader<'_>, frame_len_base: usize, cf: &mut ChannelFrame) -> Result<()> {
    if !bs.read_bit()? {
        for g in 0..cf.scp.num_window_groups {
            let max_sfb_g = max_sfb_for_group(frame_len_base, &cf.scp, g);

            let mut sfb = 0;
            while sfb < max_sfb_g {
                let used = bs.read_bit()?;
                cf.sap_coeff_used[g][sfb] = used;
                if sfb + 1 < max_sfb_g {
                    cf.sap_coeff_used[g][sfb + 1] = used;
                }
                sfb += 2;
            }
        }
    }
    else {
        for g in 0..cf.scp.num_window_groups {
            let max_sfb_g = max_sfb_for_group(frame_len_base, &cf.scp, g);
            for sfb in 0..max_sfb_g {
                cf.sap_coeff_used[g][sfb] = true;
            }
        }
    }

    cf.delta_code_time = false;
    if cf.scp.num_window_groups != 1 {
        cf.delta_code_time = bs.read_bit()?;
    }

    for g in 0..cf.scp.num_window_groups {
        let max_sfb_g = max_sfb_for_group(frame_len_base, &cf.scp, g);

        let mut sfb = 0;
        while sfb < max_sfb_g {
            if cf.sap_coeff_used[g][sfb] {
                cf.dpcm_alpha_q[g][sfb] = i32::from(SF_CODEBOOK.read(bs)?);
            }
            sfb += 2;
        }
    }

    Ok(())
}

/// Reads the stereo processing mode and its side data for a channel pair.
/// The layout was decoded into the left channel; the mask and coefficients
/// land there too.
pub fn chparam_info(
    bs: &mut BitReader<'_>,
    frame_len_base: usize,
    cf: &mut ChannelFrame,
) -> Result<()> {
    cf.sap_mode = bs.read_bits(2)? as u8;

    if cf.sap_mode == 1 {
        for g in 0..cf.scp.num_window_groups {
            let max_sfb_g = max_sfb_for_group(frame_len_base, &cf.scp, g);
            for sfb in 0..max_sfb_g {
                cf.ms_used[g][sfb] = bs.read_bit()?;
            }
        }
    }

    if cf.sap_mode == 3 {
        sap_data(bs, frame_len_base, cf)?;
    }

    Ok(())
}

/// Applies the stereo matrix of the pair `(left, right)` to the scaled
/// spectra, per `(group, band)`.
pub fn two_channel_processing(
    frame_len_base: usize,
    left: &mut ChannelFrame,
    right: &mut ChannelFrame,
) {
    let mut matrix_stereo = vec![[[0f32; 2]; 2]; MAX_WINDOW_GROUPS * MAX_SFBS];
    let mut alpha_q = [[0i32; MAX_SFBS]; MAX_WINDOW_GROUPS];

    let mut max_sfb_prev = max_sfb_for_group(frame_len_base, &left.scp, 0);

    for g in 0..left.scp.num_window_groups {
        let max_sfb_g = max_sfb_for_group(frame_len_base, &left.scp, g);

        for sfb in 0..max_sfb_g {
            let m: [[f32; 2]; 2];

            if left.sap_mode == 0 || (left.sap_mode == 1 && !left.ms_used[g][sfb]) {
                m = [[1.0, 0.0], [0.0, 1.0]];
            }
            else if left.sap_mode == 2 || (left.sap_mode == 1 && left.ms_used[g][sfb]) {
                m = [[1.0, 1.0], [1.0, -1.0]];
            }
            else if left.sap_coeff_used[g][sfb] {
                if sfb & 1 != 0 {
                    alpha_q[g][sfb] = alpha_q[g][sfb - 1];
                }
                else {
                    let delta = left.dpcm_alpha_q[g][sfb] - SF_DPCM_OFFSET;

                    // The coefficient carries forward in time only when this
                    // group's band count matches the previous group's.
                    let code_delta =
                        g != 0 && max_sfb_g == max_sfb_prev && left.delta_code_time;

                    alpha_q[g][sfb] = if code_delta {
                        alpha_q[g - 1][sfb] + delta
                    }
                    else if sfb == 0 {
                        delta
                    }
                    else {
                        alpha_q[g][sfb - 2] + delta
                    };
                }

                let sap_gain = alpha_q[g][sfb] as f32 * 0.1;
                m = [[1.0 + sap_gain, 1.0], [1.0 - sap_gain, -1.0]];
            }
            else {
                m = [[1.0, 0.0], [0.0, 1.0]];
            }

            matrix_stereo[g * MAX_SFBS + sfb] = m;
        }

        max_sfb_prev = max_sfb_g;
    }

    for k in 0..frame_len_base {
        let sfb = usize::from(left.offset2sfb[k]);
        let g = usize::from(left.offset2g[k]);
        let m = &matrix_stereo[g * MAX_SFBS + sfb];

        let i0 = left.scaled_spec[k];
        let i1 = right.scaled_spec[k];

        left.scaled_spec[k] = i0 * m[0][0] + i1 * m[0][1];
        right.scaled_spec[k] = i0 * m[1][0] + i1 * m[1][1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelFrame;

    fn simple_layout(cf: &mut ChannelFrame, frame_len: usize, max_sfb: usize) {
        cf.scp.num_window_groups = 1;
        cf.scp.num_windows = 1;
        cf.scp.num_win_in_group[0] = 1;
        cf.scp.transf_length_idx[0] = 3;
        cf.scp.transf_length[0] = frame_len;
        cf.scp.max_sfb[0] = max_sfb;

        // Map the whole spectrum onto band zero of group zero; the matrix
        // selection only needs a consistent lookup.
        cf.offset2sfb.fill(0);
        cf.offset2g.fill(0);
    }

    #[test]
    fn verify_mid_side_matrixing() {
        let mut left = ChannelFrame::new();
        let mut right = ChannelFrame::new();
        simple_layout(&mut left, 1024, 1);
        simple_layout(&mut right, 1024, 1);

        left.sap_mode = 2;
        left.scaled_spec[..4].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        right.scaled_spec[..4].copy_from_slice(&[0.5, -1.0, 1.0, 0.0]);

        two_channel_processing(1024, &mut left, &mut right);

        assert_eq!(&left.scaled_spec[..4], &[1.5, 1.0, 4.0, 4.0]);
        assert_eq!(&right.scaled_spec[..4], &[0.5, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn verify_identity_matrixing() {
        let mut left = ChannelFrame::new();
        let mut right = ChannelFrame::new();
        simple_layout(&mut left, 1024, 1);
        simple_layout(&mut right, 1024, 1);

        left.sap_mode = 0;
        left.scaled_spec[0] = 0.25;
        right.scaled_spec[0] = -0.75;

        two_channel_processing(1024, &mut left, &mut right);

        assert_eq!(left.scaled_spec[0], 0.25);
        assert_eq!(right.scaled_spec[0], -0.75);
    }

    #[test]
    fn verify_scalable_matrix_coefficient() {
        let mut left = ChannelFrame::new();
        let mut right = ChannelFrame::new();
        simple_layout(&mut left, 1024, 2);
        simple_layout(&mut right, 1024, 2);

        left.sap_mode = 3;
        left.sap_coeff_used[0][0] = true;
        left.sap_coeff_used[0][1] = true;
        // dpcm 65 -> delta +5 -> alpha_q 5 -> alpha 0.5.
        left.dpcm_alpha_q[0][0] = 65;

        left.scaled_spec[0] = 2.0;
        right.scaled_spec[0] = 1.0;

        two_channel_processing(1024, &mut left, &mut right);

        // M = [[1.5, 1.0], [0.5, -1.0]]
        assert!((left.scaled_spec[0] - 4.0).abs() < 1e-6);
        assert!((right.scaled_spec[0] - 0.0).abs() < 1e-6);
    }
}
