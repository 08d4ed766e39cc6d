// Copyright 2026 The Juicy Authors
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use juicy::metadata::{TagResult, parse_tags};

fn sample() -> Vec<u8> {
    let mut block = vec![];
    block.extend(3u32.to_be_bytes());
    block.extend(10u32.to_be_bytes());
    block.extend(b"image/jpeg");
    block.extend([0; 20]);
    block.extend(6u32.to_be_bytes());
    block.extend(b"\xFF\xD8\xFF\xE0\x00\x10");

    let fields = [
        "TITLE=Sine Wave".to_owned(),
        "ARTIST=Test Artist".to_owned(),
        format!("METADATA_BLOCK_PICTURE={}", STANDARD.encode(block)),
        "ALBUM=Test Album".to_owned(),
        "TRACKNUMBER=1".to_owned(),
    ];

    let mut data = b"OggS\x00\x02\x00\x00".to_vec();
    data.extend(b"\x03vorbis");
    data.extend(20u32.to_le_bytes());
    data.extend(b"Xiph.Org libVorbis I");
    data.extend((fields.len() as u32).to_le_bytes());
    for field in &fields {
        data.extend((field.len() as u32).to_le_bytes());
        data.extend(field.as_bytes());
    }
    data
}

/// Whether every tag in `partial` appears in `full` unchanged
fn is_subset(partial: &TagResult, full: &TagResult) -> bool {
    partial
        .tags
        .iter()
        .all(|(field, value)| full.tags.get(field) == Some(value))
        && (partial.picture.is_none() || partial.picture == full.picture)
}

#[test]
fn test_truncation() {
    let data = sample();
    let full = parse_tags(&data).unwrap();
    assert_eq!(full.tags.len(), 5);
    assert!(full.picture.is_some());

    // header is 7 bytes, vendor string is 4 + 20 bytes,
    // field count is 4 bytes
    let fields_start = 8 + 7 + 24 + 4;

    for len in 0..data.len() {
        match parse_tags(&data[..len]) {
            None => assert!(len < fields_start),
            Some(partial) => {
                assert!(len >= fields_start);
                assert!(partial.tags.len() < full.tags.len());
                assert!(is_subset(&partial, &full));
            }
        }
    }
}

#[test]
fn test_corruption() {
    let data = sample();
    let full = parse_tags(&data).unwrap();

    // flipping bits anywhere must never panic,
    // and flips past the header can only affect later fields
    let fields_start = 8 + 7 + 24 + 4;

    for _ in 0..1000 {
        let mut data = data.clone();
        let flipped = fastrand::usize(0..data.len());
        data[flipped] ^= 1 << fastrand::u32(0..8);

        let parsed = parse_tags(&data);

        if flipped >= fields_start {
            let parsed = parsed.unwrap();
            let first_field_len = 4 + "TITLE=Sine Wave".len();
            if flipped >= fields_start + first_field_len {
                assert_eq!(parsed.tags.get("TITLE"), Some("Sine Wave"));
            }
        }
    }

    // nor must random garbage following a valid header
    for _ in 0..1000 {
        let mut data = data[..fields_start].to_vec();
        data.extend(std::iter::repeat_with(|| fastrand::u8(..)).take(fastrand::usize(0..512)));
        let _ = parse_tags(&data);
    }

    assert!(full.picture.is_some());
}
