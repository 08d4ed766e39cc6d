// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Concurrency defaults and read sizes

use crate::limit::Limiter;
use std::num::NonZero;

/// How many leading bytes of a track are handed to the tag extractor
///
/// Tags and cover art are expected near the start of a stream,
/// so there's no need to read whole files.
pub const PREFIX_LEN: usize = 256 * 1024;

/// Core count assumed when the platform won't say
const FALLBACK_CORES: usize = 4;

/// Reads up to [`PREFIX_LEN`] bytes from the start of a stream
///
/// # Errors
///
/// Passes through any error from the reader.
pub fn read_prefix<R: std::io::Read>(r: R) -> std::io::Result<Vec<u8>> {
    use std::io::Read;

    let mut prefix = Vec::new();
    r.take(PREFIX_LEN as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

/// Per-subsystem concurrency caps
///
/// # Example
/// ```
/// use juicy::config::Limits;
///
/// let limits = Limits::from_cores(8);
/// assert_eq!(limits.downloads.get(), 4);
/// assert_eq!(limits.metadata.get(), 7);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Limits {
    /// Simultaneous archive downloads
    pub downloads: NonZero<usize>,
    /// Simultaneous tag parses
    pub metadata: NonZero<usize>,
}

impl Limits {
    /// Derives limits from the given number of cores
    ///
    /// At least two cores are always assumed.
    /// Downloads get half the cores, between 1 and 4,
    /// while tag parsing gets all but one, and at least 2.
    pub fn from_cores(cores: usize) -> Self {
        let cores = cores.max(2);

        Self {
            downloads: NonZero::new((cores / 2).clamp(1, 4)).unwrap_or(NonZero::<usize>::MIN),
            metadata: NonZero::new((cores - 1).max(2)).unwrap_or(NonZero::<usize>::MIN),
        }
    }

    /// Derives limits from this machine's available parallelism
    pub fn detect() -> Self {
        Self::from_cores(
            std::thread::available_parallelism()
                .map(NonZero::get)
                .unwrap_or(FALLBACK_CORES),
        )
    }

    /// A fresh limiter for downloads
    pub fn download_limiter(&self) -> Limiter {
        Limiter::new(self.downloads)
    }

    /// A fresh limiter for tag parsing
    pub fn metadata_limiter(&self) -> Limiter {
        Limiter::new(self.metadata)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::detect()
    }
}

#[test]
fn test_from_cores() {
    fn limits(cores: usize) -> (usize, usize) {
        let l = Limits::from_cores(cores);
        (l.downloads.get(), l.metadata.get())
    }

    assert_eq!(limits(0), (1, 2));
    assert_eq!(limits(1), (1, 2));
    assert_eq!(limits(2), (1, 2));
    assert_eq!(limits(3), (1, 2));
    assert_eq!(limits(4), (2, 3));
    assert_eq!(limits(16), (4, 15));
}

#[test]
fn test_read_prefix() {
    let data = vec![0xAB; PREFIX_LEN + 10];
    assert_eq!(read_prefix(data.as_slice()).unwrap().len(), PREFIX_LEN);
    assert_eq!(read_prefix(&data[..10]).unwrap(), vec![0xAB; 10]);
}
