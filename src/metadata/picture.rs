// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For decoding embedded FLAC PICTURE blocks

use super::Fields;
use crate::Error;
use bitstream_io::BigEndian;

/// A decoded PICTURE block
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 32   | `picture_type` | picture type |
/// | 32   | media type len | length of `mime`, in bytes |
/// | `media type len`×8 | `mime` | picture's MIME type, in UTF-8 |
/// | 32   | description len | length of description, in bytes |
/// | `description len`×8 | description | ignored |
/// | 32   | `width` | width of picture, in pixels |
/// | 32   | `height` | height of picture, in pixels |
/// | 32   | color depth | ignored |
/// | 32   | colors used | ignored |
/// | 32   | data len | length of `data`, in bytes |
/// | `data len`×8 | `data` | raw picture data |
///
/// All lengths are big-endian.
///
/// # Example
/// ```
/// use juicy::metadata::{Picture, parse_picture};
///
/// let data: &[u8] = &[
///     0x00, 0x00, 0x00, 0x03,  // front cover
///     0x00, 0x00, 0x00, 0x09,  // 9 byte media type
///     0x69, 0x6d, 0x61, 0x67, 0x65, 0x2f, 0x70, 0x6e,
///     0x67,
///     0x00, 0x00, 0x00, 0x00,  // no description
///     0x00, 0x00, 0x00, 0x10,  // 16 pixels wide
///     0x00, 0x00, 0x00, 0x09,  // 9 pixels high
///     0x00, 0x00, 0x00, 0x18,  // 24 bits-per-pixel
///     0x00, 0x00, 0x00, 0x00,  // not indexed
///     0x00, 0x00, 0x00, 0x04,  // 4 bytes of data
///     0x89, 0x50, 0x4e, 0x47,
/// ];
///
/// assert_eq!(
///     parse_picture(data),
///     Some(Picture {
///         picture_type: 3,
///         mime: "image/png".to_owned(),
///         width: 16,
///         height: 9,
///         data: vec![0x89, 0x50, 0x4e, 0x47],
///     }),
/// );
///
/// // claims 4 bytes of data but only has 3
/// assert_eq!(parse_picture(&data[..data.len() - 1]), None);
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Picture {
    /// The picture type, such as 3 for the front cover
    pub picture_type: u32,
    /// The media type string as specified by RFC2046
    pub mime: String,
    /// The width of the picture in pixels
    pub width: u32,
    /// The height of the picture in pixels
    pub height: u32,
    /// The binary picture data
    pub data: Vec<u8>,
}

impl Picture {
    /// Reads a PICTURE block from the given bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::TruncatedPicture`] if any field
    /// runs past the end of the buffer.
    pub fn read(bytes: &[u8]) -> Result<Self, Error> {
        let truncated = |_| Error::TruncatedPicture;

        let mut r = Fields::new(bytes, BigEndian);

        let picture_type = r.read_u32().map_err(truncated)?;
        let mime = String::from_utf8_lossy(&r.read_prefixed().map_err(truncated)?).into_owned();
        let description_len = r.read_u32().map_err(truncated)?;
        r.skip(description_len).map_err(truncated)?;
        let width = r.read_u32().map_err(truncated)?;
        let height = r.read_u32().map_err(truncated)?;
        let _color_depth = r.read_u32().map_err(truncated)?;
        let _colors_used = r.read_u32().map_err(truncated)?;
        let data = r.read_prefixed().map_err(truncated)?;

        Ok(Self {
            picture_type,
            mime,
            width,
            height,
            data,
        })
    }

    /// The picture's media type
    ///
    /// Blocks with an empty media type string fall back
    /// to the type identified from the picture data,
    /// and then to `image/jpeg`.
    pub fn media_type(&self) -> &str {
        if self.mime.is_empty() {
            identify(&self.data).unwrap_or("image/jpeg")
        } else {
            &self.mime
        }
    }
}

/// Decodes a PICTURE block, if it is well-formed
pub fn parse_picture(bytes: &[u8]) -> Option<Picture> {
    Picture::read(bytes).ok()
}

fn identify(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"\x89\x50\x4E\x47\x0D\x0A\x1A\x0A") {
        Some("image/png")
    } else if data.starts_with(b"\xFF\xD8\xFF") {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF") {
        Some("image/gif")
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
        Some("image/webp")
    } else {
        None
    }
}

#[test]
fn test_identify() {
    assert_eq!(identify(b"\x89PNG\r\n\x1a\n\x00"), Some("image/png"));
    assert_eq!(identify(b"\xFF\xD8\xFF\xE0"), Some("image/jpeg"));
    assert_eq!(identify(b"GIF89a"), Some("image/gif"));
    assert_eq!(identify(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some("image/webp"));
    assert_eq!(identify(b"RIFF\x00\x00\x00\x00WAVE"), None);
    assert_eq!(identify(b""), None);
}
