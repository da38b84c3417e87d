// Cadenza
// Copyright (c) 2026 The Project Cadenza Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Cadenza.
#[derive(Debug)]
pub enum Error {
    /// A read crossed the end of the supplied byte range. Fatal for the current
    /// frame, recoverable for the next.
    Truncated,
    /// A prefix-code table lookup found no matching codeword.
    MalformedCode(&'static str),
    /// A decoded window-layout or section parameter violates a static bound of
    /// the format.
    InvalidBlockConfig(&'static str),
    /// A decoded subband-group, patch, or envelope parameter violates a static
    /// bound of the format.
    InvalidAspxConfig(&'static str),
    /// A default limit was reached while decoding. Limits are used to prevent
    /// denial-of-service attacks from malicious streams.
    LimitError(&'static str),
    /// An unsupported bitstream feature was encountered.
    Unsupported(&'static str),
    /// An IO error occured while reading the stream.
    IoError(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Truncated => {
                write!(f, "malformed stream: read past the end of the bitstream")
            }
            Error::MalformedCode(msg) => {
                write!(f, "malformed stream: {}", msg)
            }
            Error::InvalidBlockConfig(msg) => {
                write!(f, "invalid block configuration: {}", msg)
            }
            Error::InvalidAspxConfig(msg) => {
                write!(f, "invalid aspx configuration: {}", msg)
            }
            Error::LimitError(constraint) => {
                write!(f, "limit reached: {}", constraint)
            }
            Error::Unsupported(feature) => {
                write!(f, "unsupported feature: {}", feature)
            }
            Error::IoError(ref err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {
    fn cause(&self) -> Option<&dyn error::Error> {
        match *self {
            Error::IoError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a truncated bitstream error.
pub fn truncated_error<T>() -> Result<T> {
    Err(Error::Truncated)
}

/// Convenience function to create a malformed prefix-code error.
pub fn malformed_code_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::MalformedCode(desc))
}

/// Convenience function to create an invalid block configuration error.
pub fn invalid_block_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidBlockConfig(desc))
}

/// Convenience function to create an invalid aspx configuration error.
pub fn invalid_aspx_error<T>(desc: &'static str) -> Result<T> {
    Err(Error::InvalidAspxConfig(desc))
}

/// Convenience function to create a limit error.
pub fn limit_error<T>(constraint: &'static str) -> Result<T> {
    Err(Error::LimitError(constraint))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}
