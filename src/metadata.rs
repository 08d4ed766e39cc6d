// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For pulling tags and cover art out of raw audio bytes
//!
//! Rather than walking a container format, the extractor
//! scans the buffer for a Vorbis comment header and reads
//! the comment list that follows it.
//! This finds comments in Ogg Vorbis and Opus-in-Ogg streams
//! as well as any other stream that embeds the same packet.
//!
//! # Byte Order
//!
//! All comment lengths are stored in little-endian byte order.
//!
//! | Bits | Field | Meaning |
//! |-----:|------:|---------|
//! | 8    | packet type | always `0x03`
//! | 6×8  | magic | `vorbis` in ASCII
//! | 32   | vendor string len | length of vendor string, in bytes
//! | `vendor string len`×8 | vendor string | ignored
//! | 32   | field count | number of comment fields
//! | 32   | field₀ len | length of field₀, in bytes
//! | `field₀ len`×8 | field₀ | `KEY=value`, in UTF-8
//! | | | ⋮
//!
//! Cover art travels as a Base64-encoded FLAC PICTURE block
//! in the `METADATA_BLOCK_PICTURE` field; see [`picture`].

use crate::Error;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bitstream_io::{ByteRead, ByteReader, Endianness, LittleEndian};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub mod picture;

pub use picture::{Picture, parse_picture};

/// Packet type byte followed by the `vorbis` magic
pub const SIGNATURE: [u8; 7] = *b"\x03vorbis";

/// The comment field carrying embedded cover art
pub const PICTURE_FIELD: &str = "METADATA_BLOCK_PICTURE";

/// Standard alphabet, tolerant of missing padding
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Tags and cover art found in a buffer
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct TagResult {
    /// The comment fields
    pub tags: Tags,
    /// Cover art from `METADATA_BLOCK_PICTURE`, if any
    pub picture: Option<Picture>,
}

/// Vorbis comment fields keyed by upper-cased field name
///
/// Only the first value of a repeated field is kept.
/// Lookups are case-insensitive.
///
/// # Example
/// ```
/// use juicy::metadata::parse_tags;
///
/// let data: &[u8] = &[
///     0x03, 0x76, 0x6f, 0x72, 0x62, 0x69, 0x73,  // header
///     0x04, 0x00, 0x00, 0x00,  // 4 byte vendor string
///     0x74, 0x65, 0x73, 0x74,
///     0x02, 0x00, 0x00, 0x00,  // 2 fields
///     0x0a, 0x00, 0x00, 0x00,  // 10 byte field 1
///     0x54, 0x49, 0x54, 0x4c, 0x45, 0x3d, 0x53, 0x6f,
///     0x6e, 0x67,
///     0x0a, 0x00, 0x00, 0x00,  // 10 byte field 2
///     0x74, 0x69, 0x74, 0x6c, 0x65, 0x3d, 0x4f, 0x74,
///     0x68, 0x72,
/// ];
///
/// let tags = parse_tags(data).unwrap().tags;
/// assert_eq!(tags.get("TITLE"), Some("Song"));
/// assert_eq!(tags.get("title"), Some("Song"));
/// assert_eq!(tags.len(), 1);
/// ```
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Tags {
    fields: BTreeMap<String, String>,
}

impl Tags {
    /// Name of current work
    pub const TITLE: &str = "TITLE";

    /// Name of the artist generally responsible for the current work
    pub const ARTIST: &str = "ARTIST";

    /// Name of the collection the current work belongs to
    pub const ALBUM: &str = "ALBUM";

    /// Given a field name, returns its first value, if any
    ///
    /// Fields are matched case-insensitively
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(&field.to_uppercase()).map(String::as_str)
    }

    /// Whether the given field is present
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Number of distinct fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields were found
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over upper-cased field names and their values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns every field under both its upper-cased
    /// and its lower-cased name
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .flat_map(|(k, v)| [(k.clone(), v.clone()), (k.to_lowercase(), v.clone())])
            .collect()
    }

    /// Adds field unless it is already present
    fn insert(&mut self, field: String, value: &str) {
        self.fields
            .entry(field)
            .or_insert_with(|| value.to_owned());
    }
}

/// Finds tags in the given buffer, if it has any
///
/// Returns `None` if the buffer has no Vorbis comment header,
/// or if the header is cut off before its field count.
/// A field list cut off partway returns the fields read so far,
/// and an undecodable picture is logged and skipped.
pub fn parse_tags(bytes: &[u8]) -> Option<TagResult> {
    scan(bytes).ok().map(|scan| scan.result)
}

/// Reads tags from the given buffer
///
/// Unlike [`parse_tags`], this distinguishes a buffer
/// with no comments from one whose comments are malformed.
///
/// # Errors
///
/// Returns [`Error::MissingVorbisComment`] if no header is found
/// and [`Error::TruncatedVorbisComment`] if any declared length
/// runs past the end of the buffer.
/// Undecodable pictures are skipped, as with [`parse_tags`].
pub fn read_tags(bytes: &[u8]) -> Result<TagResult, Error> {
    let Scan { result, complete } = scan(bytes)?;
    if complete {
        Ok(result)
    } else {
        Err(Error::TruncatedVorbisComment)
    }
}

/// Offset just past the first Vorbis comment header, if any
fn find_signature(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(SIGNATURE.len())
        .position(|w| w == SIGNATURE.as_slice())
        .map(|start| start + SIGNATURE.len())
}

struct Scan {
    result: TagResult,
    complete: bool,
}

fn scan(bytes: &[u8]) -> Result<Scan, Error> {
    let truncated = |_| Error::TruncatedVorbisComment;

    let start = find_signature(bytes).ok_or(Error::MissingVorbisComment)?;
    let mut r = Fields::new(&bytes[start..], LittleEndian);

    let vendor_len = r.read_u32().map_err(truncated)?;
    r.skip(vendor_len).map_err(truncated)?;
    let count = r.read_u32().map_err(truncated)?;

    let mut result = TagResult::default();

    for read in 0..count {
        let Ok(field) = r.read_prefixed() else {
            debug!(declared = count, read, "Vorbis comment list truncated");
            return Ok(Scan {
                result,
                complete: false,
            });
        };

        let field = String::from_utf8_lossy(&field);
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let key = key.to_uppercase();

        if key == PICTURE_FIELD && !value.is_empty() {
            match decode_picture(value) {
                Ok(picture) => result.picture = Some(picture),
                Err(err) => warn!("skipping {PICTURE_FIELD} : {err}"),
            }
        }

        result.tags.insert(key, value);
    }

    Ok(Scan {
        result,
        complete: true,
    })
}

fn decode_picture(value: &str) -> Result<Picture, Error> {
    let text = value.split_ascii_whitespace().collect::<String>();
    Picture::read(&BASE64.decode(text)?)
}

/// A length-checked reader over an in-memory buffer
///
/// Declared lengths are checked against the bytes remaining
/// before anything is read or allocated.
struct Fields<'a, E: Endianness> {
    reader: ByteReader<&'a [u8], E>,
    remaining: usize,
}

impl<'a, E: Endianness> Fields<'a, E> {
    fn new(data: &'a [u8], endianness: E) -> Self {
        Self {
            reader: ByteReader::endian(data, endianness),
            remaining: data.len(),
        }
    }

    fn reserve(&mut self, len: usize) -> std::io::Result<()> {
        match self.remaining.checked_sub(len) {
            Some(remaining) => {
                self.remaining = remaining;
                Ok(())
            }
            None => Err(std::io::ErrorKind::UnexpectedEof.into()),
        }
    }

    fn read_u32(&mut self) -> std::io::Result<u32> {
        self.reserve(4)?;
        self.reader.read::<u32>()
    }

    fn skip(&mut self, len: u32) -> std::io::Result<()> {
        self.reserve(size(len)?)?;
        self.reader.skip(len)
    }

    fn take(&mut self, len: u32) -> std::io::Result<Vec<u8>> {
        let len = size(len)?;
        self.reserve(len)?;
        self.reader.read_to_vec(len)
    }

    /// Reads a 32-bit length followed by that many bytes
    fn read_prefixed(&mut self) -> std::io::Result<Vec<u8>> {
        let len = self.read_u32()?;
        self.take(len)
    }
}

fn size(len: u32) -> std::io::Result<usize> {
    usize::try_from(len).map_err(|_| std::io::ErrorKind::UnexpectedEof.into())
}

#[test]
fn test_find_signature() {
    assert_eq!(find_signature(b""), None);
    assert_eq!(find_signature(b"\x03vorbi"), None);
    assert_eq!(find_signature(b"\x01vorbis"), None);
    assert_eq!(find_signature(b"\x03vorbis"), Some(7));
    assert_eq!(find_signature(b"OggS\x00\x03vorbis\x03vorbis"), Some(12));
}

#[test]
fn test_fields_reserve() {
    use bitstream_io::BigEndian;

    let data: &[u8] = &[0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB, 0xCC];
    let mut r = Fields::new(data, BigEndian);
    assert_eq!(r.read_prefixed().unwrap(), vec![0xAA, 0xBB]);
    assert!(r.read_u32().is_err());
    // a failed read leaves the remaining bytes alone
    assert!(r.skip(1).is_ok());
    assert!(r.skip(1).is_err());

    let data: &[u8] = &[0xFF, 0xFF, 0xFF, 0xFF, 0x00];
    let mut r = Fields::new(data, BigEndian);
    assert_eq!(
        r.read_prefixed().unwrap_err().kind(),
        std::io::ErrorKind::UnexpectedEof
    );
}
