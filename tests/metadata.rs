use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use juicy::Error;
use juicy::metadata::{PICTURE_FIELD, Picture, parse_tags, read_tags};

fn comment(vendor: &str, fields: &[&str]) -> Vec<u8> {
    comment_with_count(vendor, fields.len() as u32, fields)
}

fn comment_with_count(vendor: &str, count: u32, fields: &[&str]) -> Vec<u8> {
    let mut data = b"\x03vorbis".to_vec();
    data.extend((vendor.len() as u32).to_le_bytes());
    data.extend(vendor.as_bytes());
    data.extend(count.to_le_bytes());
    for field in fields {
        data.extend((field.len() as u32).to_le_bytes());
        data.extend(field.as_bytes());
    }
    data
}

fn picture(mime: &str, data: &[u8]) -> Vec<u8> {
    let mut block = vec![];
    block.extend(3u32.to_be_bytes());
    block.extend((mime.len() as u32).to_be_bytes());
    block.extend(mime.as_bytes());
    block.extend(11u32.to_be_bytes());
    block.extend(b"front cover");
    block.extend(300u32.to_be_bytes());
    block.extend(200u32.to_be_bytes());
    block.extend(24u32.to_be_bytes());
    block.extend(0u32.to_be_bytes());
    block.extend((data.len() as u32).to_be_bytes());
    block.extend(data);
    block
}

fn picture_field(block: &[u8]) -> String {
    format!("{PICTURE_FIELD}={}", STANDARD.encode(block))
}

#[test]
fn test_missing_header() {
    assert!(parse_tags(b"").is_none());
    assert!(parse_tags(b"\x03vorbi").is_none());
    assert!(parse_tags(b"\x01vorbis\x00\x00\x00\x00\x00\x00\x00\x00").is_none());
    assert!(parse_tags(b"ID3\x04\x00\x00\x00\x00\x00\x00TIT2").is_none());

    // no 0x03 byte can appear, so no header either
    for _ in 0..100 {
        let data = std::iter::repeat_with(|| fastrand::u8(0x80..=0xFF))
            .take(fastrand::usize(0..4096))
            .collect::<Vec<_>>();
        assert!(parse_tags(&data).is_none());
        assert!(matches!(read_tags(&data), Err(Error::MissingVorbisComment)));
    }
}

#[test]
fn test_single_field() {
    let result = parse_tags(&comment("test", &["TITLE=Song"])).unwrap();

    assert_eq!(result.tags.get("TITLE"), Some("Song"));
    assert_eq!(result.tags.get("title"), Some("Song"));
    assert_eq!(result.tags.get("Title"), Some("Song"));
    assert_eq!(result.tags.len(), 1);
    assert!(result.picture.is_none());

    let map = result.tags.to_map();
    assert_eq!(map.len(), 2);
    assert_eq!(map["TITLE"], "Song");
    assert_eq!(map["title"], "Song");
}

#[test]
fn test_header_after_other_data() {
    let mut data = b"OggS\x00\x02\x00\x00\x00\x00\x00\x00\x00\x00\x01vorbis".to_vec();
    data.extend(comment("reference libvorbis", &["ALBUM=Test Album"]));
    data.extend(b"\x05vorbis trailing setup header");

    let result = read_tags(&data).unwrap();
    assert_eq!(result.tags.get("album"), Some("Test Album"));
}

#[test]
fn test_first_value_wins() {
    let result = parse_tags(&comment("", &["ARTIST=A", "ARTIST=B", "artist=C"])).unwrap();
    assert_eq!(result.tags.get("ARTIST"), Some("A"));
    assert_eq!(result.tags.len(), 1);

    let result = parse_tags(&comment("", &["artist=c", "ARTIST=A"])).unwrap();
    assert_eq!(result.tags.get("ARTIST"), Some("c"));
}

#[test]
fn test_field_splitting() {
    let result = parse_tags(&comment(
        "",
        &["NO SEPARATOR", "COMMENT=a=b", "EMPTY=", "=no key"],
    ))
    .unwrap();

    assert_eq!(result.tags.get("COMMENT"), Some("a=b"));
    assert_eq!(result.tags.get("EMPTY"), Some(""));
    assert_eq!(result.tags.get(""), Some("no key"));
    assert!(!result.tags.contains("NO SEPARATOR"));
    assert_eq!(result.tags.len(), 3);

    assert_eq!(
        result.tags.iter().collect::<Vec<_>>(),
        vec![("", "no key"), ("COMMENT", "a=b"), ("EMPTY", "")],
    );
}

#[test]
fn test_no_fields() {
    let result = read_tags(&comment("vendor", &[])).unwrap();
    assert!(result.tags.is_empty());
    assert!(result.picture.is_none());
}

#[test]
fn test_invalid_utf8() {
    let mut data = comment("", &[]);
    let count = data.len() - 4;
    data[count] = 1;
    data.extend(7u32.to_le_bytes());
    data.extend(b"TITLE=\xFF");

    let result = parse_tags(&data).unwrap();
    assert_eq!(result.tags.get("TITLE"), Some("\u{FFFD}"));
}

#[test]
fn test_truncated_header() {
    let data = comment("vendor string", &["TITLE=Song"]);

    // cut off within the vendor string length
    assert!(parse_tags(&data[..9]).is_none());
    assert!(matches!(
        read_tags(&data[..9]),
        Err(Error::TruncatedVorbisComment)
    ));

    // cut off within the vendor string
    assert!(parse_tags(&data[..15]).is_none());

    // cut off within the field count
    assert!(parse_tags(&data[..26]).is_none());

    // vendor string length far past the end
    let mut data = b"\x03vorbis".to_vec();
    data.extend(u32::MAX.to_le_bytes());
    data.extend([0; 16]);
    assert!(parse_tags(&data).is_none());
}

#[test]
fn test_truncated_fields() {
    // three fields declared, one present
    let data = comment_with_count("test", 3, &["TITLE=Song"]);

    let result = parse_tags(&data).unwrap();
    assert_eq!(result.tags.get("TITLE"), Some("Song"));
    assert_eq!(result.tags.len(), 1);

    assert!(matches!(
        read_tags(&data),
        Err(Error::TruncatedVorbisComment)
    ));

    // field cut off partway is dropped entirely
    let data = comment("test", &["TITLE=Song", "ARTIST=Someone"]);
    let result = parse_tags(&data[..data.len() - 3]).unwrap();
    assert_eq!(result.tags.get("TITLE"), Some("Song"));
    assert!(!result.tags.contains("ARTIST"));
}

#[test]
fn test_picture() {
    let jpeg = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];
    let block = picture("image/jpeg", &jpeg);

    let data = comment(
        "test",
        &["TITLE=Song", picture_field(&block).as_str(), "ALBUM=Album"],
    );

    let result = read_tags(&data).unwrap();
    let found = result.picture.unwrap();
    assert_eq!(found.mime, "image/jpeg");
    assert_eq!(found.data.len(), 10);
    assert_eq!(
        found,
        Picture {
            picture_type: 3,
            mime: "image/jpeg".to_owned(),
            width: 300,
            height: 200,
            data: jpeg.to_vec(),
        }
    );

    assert_eq!(result.tags.get("TITLE"), Some("Song"));
    assert_eq!(result.tags.get("ALBUM"), Some("Album"));
    assert_eq!(
        result.tags.get(PICTURE_FIELD),
        Some(STANDARD.encode(&block).as_str())
    );
}

#[test]
fn test_picture_lenient_base64() {
    let block = picture("image/png", b"\x89PNG\r\n\x1a\n\x00");
    let encoded = STANDARD.encode(&block);
    assert!(encoded.ends_with('='));

    // missing padding, wrapped lines, surrounding whitespace
    let unpadded = encoded.trim_end_matches('=');
    let (head, tail) = unpadded.split_at(unpadded.len() / 2);
    let field = format!("metadata_block_picture= {head}\r\n{tail}\n");

    let result = parse_tags(&comment("", &[field.as_str()])).unwrap();
    assert_eq!(result.picture.unwrap().mime, "image/png");
}

#[test]
fn test_bad_picture() {
    // declared data length exceeds the block
    let mut block = picture("image/jpeg", &[0xFF; 10]);
    block.truncate(block.len() - 1);

    let data = comment("test", &[picture_field(&block).as_str(), "TITLE=Song"]);
    let result = parse_tags(&data).unwrap();
    assert!(result.picture.is_none());
    assert_eq!(result.tags.get("TITLE"), Some("Song"));
    assert!(read_tags(&data).is_ok());

    // not Base64 at all
    let data = comment("test", &["METADATA_BLOCK_PICTURE=*not base64*", "TITLE=Song"]);
    let result = parse_tags(&data).unwrap();
    assert!(result.picture.is_none());
    assert_eq!(result.tags.get("TITLE"), Some("Song"));

    // empty value is left alone
    let result = parse_tags(&comment("", &["METADATA_BLOCK_PICTURE="])).unwrap();
    assert!(result.picture.is_none());
    assert_eq!(result.tags.get(PICTURE_FIELD), Some(""));
}

#[test]
fn test_later_picture_replaces_earlier() {
    let first = picture("image/png", b"first");
    let second = picture("image/gif", b"second");
    let mut broken = picture("image/webp", b"third");
    broken.truncate(10);

    let data = comment(
        "",
        &[
            picture_field(&first).as_str(),
            picture_field(&second).as_str(),
            picture_field(&broken).as_str(),
        ],
    );

    let result = parse_tags(&data).unwrap();
    assert_eq!(result.picture.unwrap().data, b"second");
    assert_eq!(
        result.tags.get(PICTURE_FIELD),
        Some(STANDARD.encode(&first).as_str())
    );
}
