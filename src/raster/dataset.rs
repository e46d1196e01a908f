//! Compact cache raster dataset.
//!
//! [`CompactCacheDataset`] is the entry point of the crate. Opening parses
//! `conf.xml` once and lays out every band and overview level; block reads
//! then go through the bundle pool, the tile decoder and the band block
//! cache:
//!
//! ```text
//! read_block(band, level, x, y)
//!     │
//!     ├─ BlockCache hit ───────────────────────────► block
//!     │
//!     ▼
//! bundle path ─► BundlePool ─► BundleIndex slot
//!     │                           │
//!     │                    absent ├──────────────► zeros
//!     ▼                           ▼
//! TileDecoder ─► TileBuffer ─► scatter ─► block (+ sibling bands cached)
//! ```
//!
//! A dataset is single-threaded: every read takes `&mut self` because the
//! pool, the block cache and the decode scratch buffer are mutated in place.
//! Use one dataset per thread to read concurrently.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use super::bands::{BandLevel, BandSet, LevelGeometry};
use super::scatter::{scatter_tile, TileLocation};
use crate::bundle::{BundlePool, BundleSource, FsBundleSource, DEFAULT_POOL_CAPACITY};
use crate::error::{ConfigError, TileError};
use crate::format::conf::{CacheInfo, TileFormat};
use crate::tile::{BlockCache, BlockKey, TileBuffer, TileDecoder, DEFAULT_BLOCK_CACHE_CAPACITY};

/// File name of the cache descriptor.
pub const DESCRIPTOR_NAME: &str = "conf.xml";

// =============================================================================
// DatasetOptions
// =============================================================================

/// Runtime tuning of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetOptions {
    /// Maximum number of simultaneously open bundles
    pub pool_capacity: usize,

    /// Byte budget of the band block cache
    pub block_cache_bytes: usize,

    /// Whether one decode also fills the sibling bands' blocks
    pub share_decoded: bool,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            block_cache_bytes: DEFAULT_BLOCK_CACHE_CAPACITY,
            share_decoded: true,
        }
    }
}

// =============================================================================
// CompactCacheDataset
// =============================================================================

/// A read-only raster over an exploded compact V2 tile cache.
pub struct CompactCacheDataset<S: BundleSource = FsBundleSource> {
    root: PathBuf,
    info: CacheInfo,
    bands: BandSet,
    pool: BundlePool<S>,
    decoder: TileDecoder,
    scratch: TileBuffer,
    blocks: BlockCache,
    options: DatasetOptions,
}

impl CompactCacheDataset<FsBundleSource> {
    /// Open the cache at `path` with default options.
    ///
    /// `path` is either the cache directory or its `conf.xml`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::open_with_options(path, DatasetOptions::default())
    }

    /// Open the cache at `path` reading bundles from the local filesystem.
    pub fn open_with_options(
        path: impl AsRef<Path>,
        options: DatasetOptions,
    ) -> Result<Self, ConfigError> {
        Self::open_with_source(path, FsBundleSource, options)
    }
}

impl<S: BundleSource> CompactCacheDataset<S> {
    /// Open the cache at `path`, reading bundles through `source`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending field if the descriptor is
    /// missing, malformed, or describes an unsupported cache.
    pub fn open_with_source(
        path: impl AsRef<Path>,
        source: S,
        options: DatasetOptions,
    ) -> Result<Self, ConfigError> {
        let (root, descriptor) = resolve_paths(path.as_ref());
        let info = CacheInfo::load(&descriptor)?;
        Self::from_info(root, info, source, options)
    }

    /// Build a dataset from an already parsed descriptor.
    ///
    /// # Arguments
    /// * `root` - Directory holding `_alllayers`
    /// * `info` - Parsed descriptor
    /// * `source` - Opens bundle files
    /// * `options` - Pool and cache tuning
    pub fn from_info(
        root: PathBuf,
        info: CacheInfo,
        source: S,
        options: DatasetOptions,
    ) -> Result<Self, ConfigError> {
        let bands = BandSet::new(&info)?;
        let decoder = TileDecoder::new(
            info.tile_format,
            info.tile_width,
            info.tile_height,
            bands.band_count(),
        );
        let scratch = decoder.buffer();
        let pool = BundlePool::with_capacity(source, info.packet_size, options.pool_capacity);
        let blocks = BlockCache::with_capacity(options.block_cache_bytes);

        info!(
            root = %root.display(),
            format = info.tile_format.name(),
            bands = bands.band_count(),
            levels = bands.level_count(),
            "opened compact cache"
        );

        Ok(Self {
            root,
            info,
            bands,
            pool,
            decoder,
            scratch,
            blocks,
            options,
        })
    }

    // -------------------------------------------------------------------------
    // Metadata
    // -------------------------------------------------------------------------

    /// Directory holding `_alllayers`.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The parsed descriptor.
    pub fn info(&self) -> &CacheInfo {
        &self.info
    }

    pub fn options(&self) -> &DatasetOptions {
        &self.options
    }

    pub fn tile_format(&self) -> TileFormat {
        self.info.tile_format
    }

    /// Full-resolution size in pixels.
    pub fn raster_size(&self) -> (u32, u32) {
        let base = &self.bands.levels()[0];
        (base.width, base.height)
    }

    /// Block size in pixels, identical at every level.
    pub fn block_size(&self) -> (u32, u32) {
        (self.info.tile_width, self.info.tile_height)
    }

    pub fn band_count(&self) -> usize {
        self.bands.band_count()
    }

    /// Number of overview levels, excluding full resolution.
    pub fn overview_count(&self) -> usize {
        self.bands.level_count() - 1
    }

    /// Number of levels, including full resolution.
    pub fn level_count(&self) -> usize {
        self.bands.level_count()
    }

    /// Geometry of `level` (0 = full resolution).
    pub fn level(&self, level: usize) -> Result<&LevelGeometry, TileError> {
        self.bands.level(level)
    }

    /// Full-resolution geotransform.
    pub fn geo_transform(&self) -> [f64; 6] {
        self.bands.levels()[0].geo_transform(self.info.origin_x, self.info.origin_y)
    }

    /// Geotransform of `level`.
    pub fn level_geo_transform(&self, level: usize) -> Result<[f64; 6], TileError> {
        Ok(self
            .bands
            .level(level)?
            .geo_transform(self.info.origin_x, self.info.origin_y))
    }

    /// WKT, or `EPSG:<code>`.
    pub fn spatial_ref(&self) -> &str {
        &self.info.spatial_reference
    }

    /// Band `band` (1-based) at `level`.
    pub fn band(&self, band: usize, level: usize) -> Result<&BandLevel, TileError> {
        self.bands.band(band, level)
    }

    /// Overview `index` (0-based) of band `band`.
    pub fn overview(&self, band: usize, index: usize) -> Result<&BandLevel, TileError> {
        self.bands.band(band, index + 1)
    }

    // -------------------------------------------------------------------------
    // Block access
    // -------------------------------------------------------------------------

    /// Read one block of band `band` at `level`, going through the block
    /// cache.
    ///
    /// The returned block is `block_width * block_height` bytes. Absent
    /// tiles read as zeros.
    pub fn read_block(
        &mut self,
        band: usize,
        level: usize,
        block_x: u32,
        block_y: u32,
    ) -> Result<Bytes, TileError> {
        let key = BlockKey::new(band, level, block_x, block_y);
        let len = self.check_block(key)?;

        if let Some(block) = self.blocks.get(&key) {
            return Ok(block);
        }

        let mut block = vec![0u8; len];
        self.fetch_block(key, &mut block)?;

        let block = Bytes::from(block);
        self.blocks.put(key, block.clone());
        Ok(block)
    }

    /// Read one block into `dst`, always going to the bundle.
    ///
    /// Sibling bands decoded along the way are still placed in the block
    /// cache when sharing is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the band, level or block is out of range, `dst`
    /// has the wrong length, the tile bytes cannot be read in full, or the
    /// tile cannot be decoded. `dst` is unspecified after an error.
    pub fn read_block_into(
        &mut self,
        band: usize,
        level: usize,
        block_x: u32,
        block_y: u32,
        dst: &mut [u8],
    ) -> Result<(), TileError> {
        let key = BlockKey::new(band, level, block_x, block_y);
        let len = self.check_block(key)?;
        if dst.len() != len {
            return Err(TileError::BufferSize {
                expected: len,
                actual: dst.len(),
            });
        }

        self.fetch_block(key, dst)
    }

    /// A block from the block cache, if present.
    pub fn cached_block(
        &mut self,
        band: usize,
        level: usize,
        block_x: u32,
        block_y: u32,
    ) -> Option<Bytes> {
        self.blocks.get(&BlockKey::new(band, level, block_x, block_y))
    }

    /// The bundle handle pool.
    pub fn pool(&self) -> &BundlePool<S> {
        &self.pool
    }

    /// The band block cache.
    pub fn block_cache(&self) -> &BlockCache {
        &self.blocks
    }

    /// Drop every pooled bundle and cached block.
    pub fn clear_caches(&mut self) {
        self.pool.clear();
        self.blocks.clear();
    }

    /// Validate `key`, returning the block length in bytes.
    fn check_block(&self, key: BlockKey) -> Result<usize, TileError> {
        self.bands.band(key.band, key.level)?;
        let geometry = self.bands.level(key.level)?;
        if !geometry.contains_block(key.block_x, key.block_y) {
            return Err(TileError::BlockOutOfRange {
                level: key.level,
                block_x: key.block_x,
                block_y: key.block_y,
            });
        }
        Ok(geometry.block_len())
    }

    fn fetch_block(&mut self, key: BlockKey, dst: &mut [u8]) -> Result<(), TileError> {
        let storage_level = self.bands.level(key.level)?.storage_level;
        let location = TileLocation::new(key.block_x, key.block_y, self.info.packet_size);
        let path = location.bundle_path(&self.root, storage_level);

        let raw = self
            .pool
            .get(&path)?
            .read_tile(location.row, location.col)?;

        let Some(raw) = raw else {
            debug!(
                level = key.level,
                block_x = key.block_x,
                block_y = key.block_y,
                "tile absent"
            );
            dst.fill(0);
            return Ok(());
        };

        self.decoder.decode_into(&raw, &mut self.scratch)?;
        scatter_tile(
            &self.scratch,
            key,
            dst,
            &mut self.blocks,
            self.options.share_decoded,
        )
    }
}

/// Split a dataset path into the cache root and the descriptor path.
fn resolve_paths(path: &Path) -> (PathBuf, PathBuf) {
    if path.is_dir() {
        return (path.to_path_buf(), path.join(DESCRIPTOR_NAME));
    }

    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (root, path.to_path_buf())
}
