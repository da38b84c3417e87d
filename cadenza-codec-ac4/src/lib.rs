// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An AC-4 class audio decoder: entropy-coded spectral frontend, adaptive
//! inverse MDCT, 64-band complex QMF filterbank, and spectral band replication
//! (A-SPX).

mod acpl;
mod aspx;
mod channel;
mod codebooks;
mod common;
mod decoder;
mod frontend;
mod qmf;
mod stereo;
mod synth;
mod tables;
mod toc;
mod window;

pub use decoder::{Ac4Decoder, DecoderOptions};
