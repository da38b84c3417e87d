// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Calculates the rising half of a Kaiser-Bessel derived window of the given
/// size.
pub fn generate_kbd_window(alpha: f32, size: usize, dst: &mut [f32]) {
    let alpha_pi = f64::from(alpha) * std::f64::consts::PI / (size as f64);
    let alpha2 = alpha_pi * alpha_pi;

    let mut accum: Vec<f64> = Vec::with_capacity(size);
    let mut sum = 0.0;
    for n in 0..size {
        let b = bessel_i0(((n * (size - n)) as f64) * alpha2);
        sum += b;
        accum.push(sum);
    }
    sum += 1.0;

    for n in 0..size {
        dst[n] = (accum[n] / sum).sqrt() as f32;
    }
}

pub(crate) fn bessel_i0(inval: f64) -> f64 {
    let mut val: f64 = 1.0;
    for n in (1..64).rev() {
        val *= inval / f64::from(n * n);
        val += 1.0;
    }
    val
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_kbd_window() {
        let mut win = [0f32; 256];
        generate_kbd_window(4.0, 256, &mut win);

        // Rising, bounded, and power-complementary against its own mirror.
        for i in 1..256 {
            assert!(win[i] >= win[i - 1]);
            assert!(win[i] <= 1.0 + 1e-6);
        }

        for i in 0..128 {
            let p = win[i] * win[i] + win[255 - i] * win[255 - i];
            assert!((p - 1.0).abs() < 1e-4);
        }
    }
}
