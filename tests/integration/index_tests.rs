//! Bundle index decoding tests.
//!
//! Tests verify:
//! - Index words split into 40-bit offsets and 24-bit lengths
//! - Empty slots are absent
//! - Big-endian and little-endian hosts decode identical lookups
//! - Indexes load through any range reader

use compact_cache::format::{pack_word, unpack_word, BundleIndex, IndexEntry, BUNDLE_HEADER_SIZE};
use compact_cache::io::{ByteOrder, MemoryReader};
use compact_cache::BundleError;

use super::test_utils::build_bundle;

#[test]
fn test_word_round_trip() {
    let words = [
        0u64,
        1,
        (1 << 40) - 1,
        1 << 40,
        0x0000_1234_5678_9abc,
        0xffff_ff00_0000_0040,
        u64::MAX,
    ];

    for word in words {
        let (offset, length) = unpack_word(word);
        assert!(offset < 1 << 40);
        assert!(length < 1 << 24);
        assert_eq!(pack_word(offset, length), word);

        match IndexEntry::from_word(word) {
            None => assert_eq!(length, 0, "word {:#x}", word),
            Some(entry) => {
                assert_eq!((entry.offset, entry.length), (offset, length));
                assert_eq!(entry.to_word(), word);
            }
        }
    }
}

#[test]
fn test_empty_slots_absent() {
    let bundle = build_bundle(4, &[(1, 2, vec![7; 10])]);
    let reader = MemoryReader::new(bundle, "bundle");
    let (_, index) = BundleIndex::load(&reader, 4).unwrap();

    let present: Vec<_> = (0..4)
        .flat_map(|row| (0..4).map(move |col| (row, col)))
        .filter(|&(row, col)| index.lookup(row, col).is_some())
        .collect();
    assert_eq!(present, vec![(1, 2)]);
}

#[test]
fn test_big_endian_host_portability() {
    let tiles: Vec<_> = (0..16u32)
        .filter(|i| i % 3 != 0)
        .map(|i| (i / 4, i % 4, vec![i as u8; (i * 37 + 1) as usize]))
        .collect();
    let bundle = build_bundle(4, &tiles);
    let raw = &bundle[BUNDLE_HEADER_SIZE..BUNDLE_HEADER_SIZE + 16 * 8];

    let little = BundleIndex::parse_with_host_order(raw, 4, ByteOrder::LittleEndian).unwrap();
    let big = BundleIndex::parse_with_host_order(raw, 4, ByteOrder::BigEndian).unwrap();

    for row in 0..4 {
        for col in 0..4 {
            assert_eq!(little.lookup(row, col), big.lookup(row, col));
        }
    }
    assert_eq!(little.tile_count(), tiles.len());
}

#[test]
fn test_index_entries_address_tile_bytes() {
    let tiles = vec![(0, 0, b"first".to_vec()), (3, 3, b"last tile".to_vec())];
    let bundle = build_bundle(4, &tiles);
    let reader = MemoryReader::new(bundle.clone(), "bundle");
    let (header, index) = BundleIndex::load(&reader, 4).unwrap();

    assert_eq!(header.version, 3);
    for (row, col, bytes) in &tiles {
        let entry = index.lookup(*row, *col).unwrap();
        let start = entry.offset as usize;
        assert_eq!(&bundle[start..start + entry.length as usize], bytes.as_slice());
    }
}

#[test]
fn test_header_mismatch_rejected() {
    let mut bundle = build_bundle(4, &[]);
    bundle[12] = 6;
    let reader = MemoryReader::new(bundle, "bundle");

    assert!(matches!(
        BundleIndex::load(&reader, 4),
        Err(BundleError::HeaderMismatch {
            offset: 12,
            expected: 5,
            actual: 6
        })
    ));
}
