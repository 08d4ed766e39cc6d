// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For gathering an album's metadata from its archive entries
//!
//! Fetching and unpacking the archive happen elsewhere;
//! this module takes the unpacked `(filename, bytes)` entries,
//! parses each track's tags on a [`Limiter`],
//! and settles on titles, an album name, and cover art.
//!
//! [`load_album`] schedules its parses with [`Limiter::run`],
//! so it must be awaited from within a Tokio runtime.

use crate::config::PREFIX_LEN;
use crate::limit::Limiter;
use crate::metadata::{Picture, TagResult, Tags, parse_tags};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use tracing::{debug, warn};

/// A supported audio file type
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AudioKind {
    /// MPEG-1 Audio Layer III
    Mp3,
    /// MPEG-4 audio
    M4a,
    /// Ogg Vorbis or Opus
    Ogg,
    /// FLAC
    Flac,
}

impl AudioKind {
    /// Identifies a track by its file extension, case-insensitively
    pub fn from_filename(filename: &str) -> Option<Self> {
        match extension(filename)?.as_str() {
            "mp3" => Some(Self::Mp3),
            "m4a" => Some(Self::M4a),
            "ogg" => Some(Self::Ogg),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }

    /// The MIME type for this kind of audio
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
            Self::Ogg => "audio/ogg",
            Self::Flac => "audio/flac",
        }
    }
}

/// Identifies an image file by its extension, case-insensitively
pub fn image_media_type(filename: &str) -> Option<&'static str> {
    match extension(filename)?.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn extension(filename: &str) -> Option<String> {
    file_name(filename)
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Builds a display title from a track's filename
///
/// Drops any directories, the extension,
/// and a leading track number with its separators.
///
/// # Example
/// ```
/// use juicy::album::title_from_filename;
///
/// assert_eq!(title_from_filename("disc 1/01 - Intro.flac"), "Intro");
/// assert_eq!(title_from_filename("07_Outro.mp3"), "Outro");
/// assert_eq!(title_from_filename("1979.mp3"), "1979");
/// assert_eq!(title_from_filename(""), "Unknown");
/// ```
pub fn title_from_filename(filename: &str) -> String {
    let name = file_name(filename);
    let stem = match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() => &name[..dot],
        _ => name,
    };

    let unnumbered = stem.trim_start_matches(|c: char| c.is_ascii_digit());
    let title = if unnumbered.len() < stem.len() {
        unnumbered.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '.' | '_'))
    } else {
        stem
    };

    match (title, stem) {
        ("", "") => "Unknown".to_owned(),
        ("", stem) => stem.to_owned(),
        (title, _) => title.to_owned(),
    }
}

/// Builds a display name from an album archive's name or URL path
///
/// The last path segment is percent-decoded first;
/// one that doesn't decode to UTF-8 is used as-is.
///
/// # Example
/// ```
/// use juicy::album::album_name_from_archive;
///
/// assert_eq!(
///     album_name_from_archive("albums/Kind_of-Blue.ZIP"),
///     "Kind of Blue",
/// );
/// assert_eq!(
///     album_name_from_archive("https://host/a%2Fb/Kind%20of%20Blue.zip"),
///     "Kind of Blue",
/// );
/// ```
pub fn album_name_from_archive(archive: &str) -> String {
    let raw = file_name(archive);
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(raw));
    let name: &str = &decoded;
    let stem = match name.len().checked_sub(4) {
        Some(i) if name.is_char_boundary(i) && name[i..].eq_ignore_ascii_case(".zip") => {
            &name[..i]
        }
        _ => name,
    };
    stem.replace(['-', '_'], " ")
}

/// A track's display metadata
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Track {
    /// The track's path within its archive
    pub filename: String,
    /// The track's audio type
    pub kind: AudioKind,
    /// Display title
    pub title: String,
    /// Display artist, possibly empty
    pub artist: String,
    /// Display album name
    pub album: String,
    /// Embedded cover art, if any
    pub picture: Option<Picture>,
}

impl Track {
    /// Settles on a track's metadata from whatever tags were found
    ///
    /// Empty tag values count as missing.
    /// Without a title, one is built from the filename,
    /// and without an album name, `album_name` is used.
    pub fn resolve(
        filename: String,
        kind: AudioKind,
        album_name: &str,
        found: Option<TagResult>,
    ) -> Self {
        let TagResult { tags, picture } = found.unwrap_or_default();
        let field = |name: &str| {
            tags.get(name)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        Self {
            title: field(Tags::TITLE).unwrap_or_else(|| title_from_filename(&filename)),
            artist: field(Tags::ARTIST).unwrap_or_default(),
            album: field(Tags::ALBUM).unwrap_or_else(|| album_name.to_owned()),
            filename,
            kind,
            picture,
        }
    }
}

/// Where an album's cover art came from
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ArtSource {
    /// Embedded in the track at the given index
    Track(usize),
    /// A loose image file in the archive
    Folder(String),
}

/// An album's cover art
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Art {
    /// Where the art was found
    pub source: ArtSource,
    /// The image's MIME type
    pub mime: String,
    /// The raw image data
    pub data: Vec<u8>,
}

/// An album's resolved metadata
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Album {
    /// Display name
    pub name: String,
    /// Tracks in archive order
    pub tracks: Vec<Track>,
    /// Cover art, if any was found
    pub art: Option<Art>,
}

/// Resolves an album's metadata from its unpacked archive entries
///
/// Each track's tags are parsed from its first
/// [`PREFIX_LEN`] bytes, with no more parses
/// in flight at once than `limiter` allows.
/// Entries that are neither audio nor images are ignored.
///
/// The album is named by the first track with an `ALBUM` tag,
/// or else by the archive.
/// Its art is the picture embedded in the earliest track
/// that has one, or else the archive's first image file.
///
/// A track whose tags can't be parsed is still listed,
/// titled by its filename.
///
/// # Panics
///
/// Panics if called from outside a Tokio runtime.
pub async fn load_album<I>(limiter: &Limiter, archive_name: &str, entries: I) -> Album
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let mut parses = vec![];
    let mut images = vec![];

    for (filename, data) in entries {
        if let Some(kind) = AudioKind::from_filename(&filename) {
            let parse = limiter.run(move || async move {
                parse_tags(&data[..data.len().min(PREFIX_LEN)])
            });
            parses.push((filename, kind, parse));
        } else if let Some(mime) = image_media_type(&filename) {
            images.push((filename, mime, data));
        }
    }

    let mut parsed = Vec::with_capacity(parses.len());
    for (filename, kind, parse) in parses {
        let found = parse.await.unwrap_or_else(|err| {
            warn!(%filename, "tag parse failed : {err}");
            None
        });
        if found.is_none() {
            debug!(%filename, "no embedded tags found");
        }
        parsed.push((filename, kind, found));
    }

    let name = parsed
        .iter()
        .find_map(|(_, _, found)| {
            found
                .as_ref()?
                .tags
                .get(Tags::ALBUM)
                .filter(|album| !album.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| album_name_from_archive(archive_name));

    let tracks = parsed
        .into_iter()
        .map(|(filename, kind, found)| Track::resolve(filename, kind, &name, found))
        .collect::<Vec<_>>();

    let art = tracks
        .iter()
        .enumerate()
        .find_map(|(index, track)| {
            track.picture.as_ref().map(|picture| Art {
                source: ArtSource::Track(index),
                mime: picture.media_type().to_owned(),
                data: picture.data.clone(),
            })
        })
        .or_else(|| {
            images.into_iter().next().map(|(filename, mime, data)| Art {
                source: ArtSource::Folder(filename),
                mime: mime.to_owned(),
                data,
            })
        });

    Album { name, tracks, art }
}

#[test]
fn test_extension() {
    assert_eq!(extension("a/b.FLAC").as_deref(), Some("flac"));
    assert_eq!(extension("dir.v2/track"), None);
    assert_eq!(extension("track"), None);
    assert_eq!(AudioKind::from_filename("x/01 Song.M4A"), Some(AudioKind::M4a));
    assert_eq!(AudioKind::from_filename("notes.txt"), None);
    assert_eq!(image_media_type("cover.JPG"), Some("image/jpeg"));
    assert_eq!(image_media_type("folder.webp"), Some("image/webp"));
    assert_eq!(image_media_type("track.ogg"), None);
}

#[test]
fn test_title_from_filename() {
    assert_eq!(title_from_filename("Song.ogg"), "Song");
    assert_eq!(title_from_filename("03. Third Song.mp3"), "Third Song");
    assert_eq!(title_from_filename("12-_ Dashes.flac"), "Dashes");
    assert_eq!(title_from_filename("No Extension"), "No Extension");
    assert_eq!(title_from_filename("trailing."), "trailing.");
    assert_eq!(title_from_filename("2 Become 1.mp3"), "Become 1");
}

#[test]
fn test_album_name_from_archive() {
    assert_eq!(album_name_from_archive("Greatest_Hits.zip"), "Greatest Hits");
    assert_eq!(album_name_from_archive("a/b/no-suffix"), "no suffix");
    assert_eq!(album_name_from_archive("zip"), "zip");
    assert_eq!(
        album_name_from_archive("albums/Kind%20of%20Blue.zip"),
        "Kind of Blue"
    );
    assert_eq!(album_name_from_archive("Caf%C3%A9_Tunes.zip"), "Café Tunes");
    // decoded after splitting, so an encoded slash stays in the name
    assert_eq!(album_name_from_archive("x/AC%2FDC.zip"), "AC/DC");
    // not UTF-8 once decoded, so left alone
    assert_eq!(album_name_from_archive("Bad%FF.zip"), "Bad%FF");
}
