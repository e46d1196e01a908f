//! Compact V2 bundle header and tile index.
//!
//! A bundle holds the compressed tiles for a square grid of
//! `packet_size x packet_size` tiles at one level. The file starts with a
//! 64-byte header followed by the tile index, one little-endian 64-bit word
//! per tile slot in row-major order:
//!
//! ```text
//! ┌──────────────┬───────────────────────────────┬──────────────────┐
//! │ header (64B) │ index: packet_size² × u64 LE  │ tile data ...    │
//! └──────────────┴───────────────────────────────┴──────────────────┘
//!
//!  index word:  63            40 39                               0
//!              ┌────────────────┬──────────────────────────────────┐
//!              │ length (24bit) │           offset (40 bit)        │
//!              └────────────────┴──────────────────────────────────┘
//! ```
//!
//! A slot whose length is zero holds no tile.

use crate::error::BundleError;
use crate::io::{read_u32_le, ByteOrder, RangeReader};

// =============================================================================
// Constants
// =============================================================================

/// Size of the fixed bundle header in bytes.
pub const BUNDLE_HEADER_SIZE: usize = 64;

/// Size of one index word in bytes.
pub const INDEX_ENTRY_SIZE: usize = 8;

/// Header version tag of compact V2 bundles.
pub const BUNDLE_VERSION: u32 = 3;

/// Tiles per bundle side used by Esri caches unless configured otherwise.
pub const DEFAULT_PACKET_SIZE: u32 = 128;

/// Number of low bits of an index word holding the tile offset.
pub const OFFSET_BITS: u32 = 40;

/// Largest offset an index word can address.
pub const MAX_TILE_OFFSET: u64 = (1 << OFFSET_BITS) - 1;

/// Largest tile length an index word can describe.
pub const MAX_TILE_LENGTH: u32 = (1 << (64 - OFFSET_BITS)) - 1;

// =============================================================================
// IndexEntry
// =============================================================================

/// Location of one tile inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Byte offset of the tile data from the start of the bundle
    pub offset: u64,

    /// Length of the tile data in bytes (never zero)
    pub length: u32,
}

impl IndexEntry {
    /// Decode an index word. Returns `None` for an empty slot.
    #[inline]
    pub fn from_word(word: u64) -> Option<Self> {
        let (offset, length) = unpack_word(word);
        if length == 0 {
            return None;
        }
        Some(Self { offset, length })
    }

    /// Encode this entry as an index word.
    #[inline]
    pub fn to_word(self) -> u64 {
        pack_word(self.offset, self.length)
    }
}

/// Split an index word into `(offset, length)`.
#[inline]
pub fn unpack_word(word: u64) -> (u64, u32) {
    (word & MAX_TILE_OFFSET, (word >> OFFSET_BITS) as u32)
}

/// Pack `(offset, length)` into an index word.
///
/// Bits beyond 40 of `offset` and beyond 24 of `length` are discarded.
#[inline]
pub fn pack_word(offset: u64, length: u32) -> u64 {
    (offset & MAX_TILE_OFFSET) | ((u64::from(length) & u64::from(MAX_TILE_LENGTH)) << OFFSET_BITS)
}

// =============================================================================
// BundleHeader
// =============================================================================

/// The validated fixed fields of a bundle header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleHeader {
    /// Format version tag (always 3 for compact V2)
    pub version: u32,

    /// Number of tile slots in the index
    pub tile_count: u32,

    /// Size of the index in bytes
    pub index_size: u32,
}

impl BundleHeader {
    /// Validate the 64-byte header of a bundle with the given packet size.
    ///
    /// Six little-endian u32 fields must hold fixed values:
    ///
    /// | byte | value                  |
    /// |------|------------------------|
    /// | 0    | 3 (version)            |
    /// | 4    | packet_size²           |
    /// | 12   | 5                      |
    /// | 32   | 40 (offset bits)       |
    /// | 36   | 0                      |
    /// | 60   | packet_size² × 8       |
    pub fn parse(bytes: &[u8], packet_size: u32) -> Result<Self, BundleError> {
        if bytes.len() < BUNDLE_HEADER_SIZE {
            return Err(BundleError::FileTooSmall {
                required: BUNDLE_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let tile_count = packet_size * packet_size;
        let index_size = tile_count * INDEX_ENTRY_SIZE as u32;

        let expected: [(usize, u32); 6] = [
            (0, BUNDLE_VERSION),
            (4, tile_count),
            (12, 5),
            (32, OFFSET_BITS),
            (36, 0),
            (60, index_size),
        ];

        for (offset, value) in expected {
            let actual = read_u32_le(&bytes[offset..]);
            if actual != value {
                return Err(BundleError::HeaderMismatch {
                    offset,
                    expected: value,
                    actual,
                });
            }
        }

        Ok(Self {
            version: BUNDLE_VERSION,
            tile_count,
            index_size,
        })
    }
}

// =============================================================================
// BundleIndex
// =============================================================================

/// The tile directory of one bundle.
///
/// Words are held in host order; lookups never touch the file.
#[derive(Debug, Clone)]
pub struct BundleIndex {
    packet_size: u32,
    words: Vec<u64>,
}

impl BundleIndex {
    /// Number of bytes the header plus index occupy for a packet size.
    pub fn required_len(packet_size: u32) -> u64 {
        BUNDLE_HEADER_SIZE as u64 + u64::from(packet_size) * u64::from(packet_size) * 8
    }

    /// Decode the index table (the bytes following the header).
    pub fn parse(raw: &[u8], packet_size: u32) -> Result<Self, BundleError> {
        Self::parse_with_host_order(raw, packet_size, ByteOrder::native())
    }

    /// Decode the index table as a host with the given byte order would.
    ///
    /// The table is first taken word by word in host order, as a raw memory
    /// copy would leave it, then swapped on big-endian hosts so that every
    /// word ends up holding its little-endian value.
    pub fn parse_with_host_order(
        raw: &[u8],
        packet_size: u32,
        host: ByteOrder,
    ) -> Result<Self, BundleError> {
        let count = packet_size as usize * packet_size as usize;
        let required = count * INDEX_ENTRY_SIZE;
        if raw.len() < required {
            return Err(BundleError::FileTooSmall {
                required: required as u64,
                actual: raw.len() as u64,
            });
        }

        let mut words: Vec<u64> = raw[..required]
            .chunks_exact(INDEX_ENTRY_SIZE)
            .map(|chunk| host.read_u64(chunk))
            .collect();

        if host == ByteOrder::BigEndian {
            for word in &mut words {
                *word = word.swap_bytes();
            }
        }

        Ok(Self { packet_size, words })
    }

    /// Read and validate header and index from a bundle file.
    pub fn load<R: RangeReader>(
        reader: &R,
        packet_size: u32,
    ) -> Result<(BundleHeader, Self), BundleError> {
        let required = Self::required_len(packet_size);
        if reader.size() < required {
            return Err(BundleError::FileTooSmall {
                required,
                actual: reader.size(),
            });
        }

        let header_bytes = reader.read_exact_at(0, BUNDLE_HEADER_SIZE)?;
        let header = BundleHeader::parse(&header_bytes, packet_size)?;

        let raw = reader.read_exact_at(BUNDLE_HEADER_SIZE as u64, header.index_size as usize)?;
        let index = Self::parse(&raw, packet_size)?;

        Ok((header, index))
    }

    /// Tiles per bundle side.
    pub fn packet_size(&self) -> u32 {
        self.packet_size
    }

    /// Number of index slots (always packet_size²).
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Raw word for a slot, in host order.
    pub fn word(&self, row: u32, col: u32) -> Option<u64> {
        if row >= self.packet_size || col >= self.packet_size {
            return None;
        }
        self.words
            .get(row as usize * self.packet_size as usize + col as usize)
            .copied()
    }

    /// Locate the tile at a bundle-local `(row, col)`.
    ///
    /// Returns `None` for an empty slot or coordinates outside the bundle.
    pub fn lookup(&self, row: u32, col: u32) -> Option<IndexEntry> {
        self.word(row, col).and_then(IndexEntry::from_word)
    }

    /// Number of slots that hold a tile.
    pub fn tile_count(&self) -> usize {
        self.words
            .iter()
            .filter(|w| unpack_word(**w).1 != 0)
            .count()
    }
}

// =============================================================================
// Tests
// =============================================================================
