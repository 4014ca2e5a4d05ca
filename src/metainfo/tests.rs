use super::*;
use sha1::{Digest, Sha1};

fn sample_document() -> Vec<u8> {
    // Two pieces of 5 bytes over a 10-byte payload.
    let mut pieces = Vec::new();
    pieces.extend_from_slice(&Sha1::digest(b"hello"));
    pieces.extend_from_slice(&Sha1::digest(b"world"));

    let mut doc = Vec::new();
    doc.extend_from_slice(b"d8:announce21:http://localhost:70004:infod6:lengthi10e4:name8:greeting12:piece lengthi5e6:pieces40:");
    doc.extend_from_slice(&pieces);
    doc.extend_from_slice(b"ee");
    doc
}

#[test]
fn test_parse_document() {
    let meta = Metainfo::from_bytes(&sample_document()).unwrap();
    assert_eq!(meta.announce, "http://localhost:7000");
    assert_eq!(meta.info.name, "greeting");
    assert_eq!(meta.info.length, 10);
    assert_eq!(meta.info.piece_length, 5);
    assert_eq!(meta.piece_count(), 2);
    assert_eq!(meta.info.pieces[0], <[u8; 20]>::from(Sha1::digest(b"hello")));
}

#[test]
fn test_content_id_matches_info_section_hash() {
    let doc = sample_document();
    let meta = Metainfo::from_bytes(&doc).unwrap();

    // The info section starts right after the "info" key.
    let marker = b"4:infod";
    let start = doc
        .windows(marker.len())
        .position(|w| w == marker)
        .unwrap()
        + 6;
    let info_bytes = &doc[start..doc.len() - 1];
    let expected: [u8; 20] = Sha1::digest(info_bytes).into();

    assert_eq!(*meta.content_id.as_bytes(), expected);
}

#[test]
fn test_piece_size_last_piece_shorter() {
    let mut meta = Metainfo::from_bytes(&sample_document()).unwrap();
    meta.info.length = 8;
    assert_eq!(meta.piece_size(0), 5);
    assert_eq!(meta.piece_size(1), 3);
}

#[test]
fn test_missing_announce() {
    let doc = b"d4:infod6:lengthi1e4:name1:x12:piece lengthi1e6:pieces20:aaaaaaaaaaaaaaaaaaaaee";
    assert!(matches!(
        Metainfo::from_bytes(doc),
        Err(MetainfoError::MissingField("announce"))
    ));
}

#[test]
fn test_multi_file_rejected() {
    let doc = b"d8:announce1:x4:infod5:filesle4:name1:x12:piece lengthi1e6:pieces0:ee";
    assert!(matches!(
        Metainfo::from_bytes(doc),
        Err(MetainfoError::MultiFileUnsupported)
    ));
}

#[test]
fn test_pieces_length_must_be_multiple_of_20() {
    let doc = b"d8:announce1:x4:infod6:lengthi1e4:name1:x12:piece lengthi1e6:pieces3:abcee";
    assert!(matches!(
        Metainfo::from_bytes(doc),
        Err(MetainfoError::InvalidPiecesLength)
    ));
}

#[test]
fn test_content_id_hex_round_trip() {
    let id = ContentId::from_bytes([0xAB; 20]);
    let hex = id.to_hex();
    assert_eq!(hex.len(), 40);
    assert_eq!(ContentId::from_hex(&hex).unwrap(), id);
}

#[test]
fn test_content_id_url_encode() {
    let id = ContentId::from_bytes([0x12; 20]);
    assert!(id.url_encode().starts_with("%12%12"));
    assert_eq!(id.url_encode().len(), 60);
}
