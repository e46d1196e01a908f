//! Block to bundle addressing and decoded tile distribution.
//!
//! A block `(x, y)` lives in the bundle whose origin is the block position
//! rounded down to a multiple of the packet size:
//!
//! ```text
//! {root}/_alllayers/L{level:02}/R{row:04x}C{col:04x}.bundle
//! ```
//!
//! where `level` is the storage level (coarsest = 0) and `row`/`col` are the
//! bundle origin in blocks. Within the bundle the tile sits at
//! `(y mod packet, x mod packet)`.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::TileError;
use crate::tile::{BlockCache, BlockKey, TileBuffer};

/// Directory holding the per-level bundle directories.
pub const ALL_LAYERS_DIR: &str = "_alllayers";

/// Where one block's tile is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLocation {
    /// Block row of the bundle origin
    pub bundle_row: u32,

    /// Block column of the bundle origin
    pub bundle_col: u32,

    /// Row within the bundle
    pub row: u32,

    /// Column within the bundle
    pub col: u32,
}

impl TileLocation {
    pub fn new(block_x: u32, block_y: u32, packet_size: u32) -> Self {
        let col = block_x % packet_size;
        let row = block_y % packet_size;
        Self {
            bundle_row: block_y - row,
            bundle_col: block_x - col,
            row,
            col,
        }
    }

    /// Slot of the tile in the bundle index.
    pub fn index_slot(&self, packet_size: u32) -> usize {
        (self.row * packet_size + self.col) as usize
    }

    /// Path of the bundle holding this tile.
    pub fn bundle_path(&self, root: &Path, storage_level: u32) -> PathBuf {
        bundle_path(root, storage_level, self.bundle_row, self.bundle_col)
    }
}

/// Path of the bundle at `storage_level` whose origin is block `(row, col)`.
pub fn bundle_path(root: &Path, storage_level: u32, row: u32, col: u32) -> PathBuf {
    root.join(ALL_LAYERS_DIR)
        .join(format!("L{:02}", storage_level))
        .join(format!("R{:04x}C{:04x}.bundle", row, col))
}

/// Distribute one decoded tile.
///
/// The requested band (1-based) is copied into `dst`. When `share` is set,
/// every other band is copied into `cache` unless its block is already
/// cached there.
pub fn scatter_tile(
    tile: &TileBuffer,
    requested: BlockKey,
    dst: &mut [u8],
    cache: &mut BlockCache,
    share: bool,
) -> Result<(), TileError> {
    tile.extract_band(requested.band - 1, dst)?;

    if !share {
        return Ok(());
    }

    for band in 1..=tile.bands() {
        if band == requested.band {
            continue;
        }
        let key = BlockKey { band, ..requested };
        if cache.contains(&key) {
            continue;
        }

        let mut block = vec![0u8; tile.pixel_count()];
        tile.extract_band(band - 1, &mut block)?;
        cache.put(key, Bytes::from(block));
    }

    Ok(())
}
