// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Core of the Juicy album player
//!
//! Two small pieces do the real work when an album is loaded:
//!
//! | Module | Purpose |
//! |-------:|---------|
//! | [`metadata`] | pulls Vorbis comments and cover art out of raw track bytes |
//! | [`limit`] | caps how many downloads or tag parses run at once |
//!
//! [`album`] ties them together for a set of already-extracted
//! archive entries, and [`config`] holds the concurrency defaults.

#![warn(missing_docs)]

pub mod album;
pub mod config;
pub mod limit;
pub mod metadata;

/// A crate-wide error
#[derive(Debug)]
pub enum Error {
    /// An I/O error from an underlying reader
    Io(std::io::Error),
    /// A `METADATA_BLOCK_PICTURE` value that is not valid Base64
    Base64(base64::DecodeError),
    /// No Vorbis comment header found in the buffer
    MissingVorbisComment,
    /// A Vorbis comment length runs past the end of the buffer
    TruncatedVorbisComment,
    /// A PICTURE block length runs past the end of the buffer
    TruncatedPicture,
    /// A scheduled task was dropped before producing its value
    TaskAborted,
    /// A task was scheduled from outside a Tokio runtime
    NoRuntime,
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(error: base64::DecodeError) -> Self {
        Self::Base64(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Base64(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Base64(e) => write!(f, "invalid METADATA_BLOCK_PICTURE : {e}"),
            Self::MissingVorbisComment => "missing Vorbis comment header".fmt(f),
            Self::TruncatedVorbisComment => "Vorbis comment truncated".fmt(f),
            Self::TruncatedPicture => "PICTURE block truncated".fmt(f),
            Self::TaskAborted => "task aborted before completion".fmt(f),
            Self::NoRuntime => "no Tokio runtime to run task on".fmt(f),
        }
    }
}
