// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `audio` module provides the planar audio buffer decoders render into.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// A bitmask of audio channels in canonical order.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Channels: u32 {
        const FRONT_LEFT         = 0x0000_0001;
        const FRONT_RIGHT        = 0x0000_0002;
        const FRONT_CENTRE       = 0x0000_0004;
        const LFE1               = 0x0000_0008;
        const REAR_LEFT          = 0x0000_0010;
        const REAR_RIGHT         = 0x0000_0020;
        const SIDE_LEFT          = 0x0000_0040;
        const SIDE_RIGHT         = 0x0000_0080;
    }
}

impl Channels {
    /// The number of channels in the mask.
    pub fn count(self) -> usize {
        self.bits().count_ones() as usize
    }
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#032b}", self.bits())
    }
}

/// `SignalSpec` describes the sample rate and channel layout of a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignalSpec {
    /// The signal's sample rate in Hz.
    pub rate: u32,
    /// The channels present in the signal.
    pub channels: Channels,
}

impl SignalSpec {
    pub fn new(rate: u32, channels: Channels) -> Self {
        SignalSpec { rate, channels }
    }
}

/// A planar 32-bit floating point audio buffer.
///
/// The buffer is allocated once with a fixed per-channel capacity and reused
/// across frames.
pub struct AudioBuffer {
    spec: SignalSpec,
    n_capacity: usize,
    n_frames: usize,
    planes: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Instantiate a buffer with capacity for `duration` frames per channel.
    pub fn new(duration: usize, spec: SignalSpec) -> Self {
        let n_channels = spec.channels.count();

        AudioBuffer {
            spec,
            n_capacity: duration,
            n_frames: 0,
            planes: vec![vec![0.0; duration]; n_channels],
        }
    }

    /// The signal specification of the buffer.
    pub fn spec(&self) -> &SignalSpec {
        &self.spec
    }

    /// The number of frames currently rendered.
    pub fn frames(&self) -> usize {
        self.n_frames
    }

    /// Clears all rendered frames.
    pub fn clear(&mut self) {
        self.n_frames = 0;
    }

    /// Renders `n_frames` of silence into every plane, making them writable
    /// through `chan_mut`.
    pub fn render_silence(&mut self, n_frames: usize) {
        assert!(n_frames <= self.n_capacity);

        for plane in self.planes.iter_mut() {
            plane[..n_frames].fill(0.0);
        }

        self.n_frames = n_frames;
    }

    /// An immutable slice of the rendered samples of one channel.
    pub fn chan(&self, ch: usize) -> &[f32] {
        &self.planes[ch][..self.n_frames]
    }

    /// A mutable slice of the rendered samples of one channel.
    pub fn chan_mut(&mut self, ch: usize) -> &mut [f32] {
        &mut self.planes[ch][..self.n_frames]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_buffer_render() {
        let spec = SignalSpec::new(48000, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut buf = AudioBuffer::new(1024, spec);

        assert_eq!(buf.frames(), 0);

        buf.render_silence(1024);
        assert_eq!(buf.frames(), 1024);
        assert_eq!(buf.chan(0).len(), 1024);

        buf.chan_mut(1)[3] = 0.5;
        assert_eq!(buf.chan(1)[3], 0.5);

        buf.clear();
        assert_eq!(buf.frames(), 0);

        // Previously written samples are zeroed by the next render.
        buf.render_silence(16);
        assert_eq!(buf.chan(1)[3], 0.0);
    }
}
