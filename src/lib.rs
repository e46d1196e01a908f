//! # Compact Cache
//!
//! A reader for Esri compact V2 ("exploded") tile caches.
//!
//! A compact cache stores each level of detail as a grid of bundle files.
//! Every bundle holds a `packet_size * packet_size` block of tiles behind a
//! binary index, and every tile is a complete JPEG or PNG image. This crate
//! exposes such a cache as a multi-band raster with overviews and reads it
//! one block at a time.
//!
//! ## Features
//!
//! - **Bounded bundle handles**: A small LRU pool of open bundles with their decoded indexes
//! - **Sparse caches**: Absent bundles and tiles read as zeros without errors
//! - **Shared decodes**: One tile decode fills the blocks of every band
//! - **Overviews**: One level per resolution listed in `conf.xml`
//!
//! ## Architecture
//!
//! - [`io`] - Positioned reads from files and memory
//! - [`mod@format`] - Bundle index and `conf.xml` parsing
//! - [`bundle`] - Bundle sources and the handle pool
//! - [`tile`] - Tile decoding and the band block cache
//! - [`raster`] - Bands, overviews and the dataset facade
//! - [`config`] - CLI configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use compact_cache::CompactCacheDataset;
//!
//! let mut dataset = CompactCacheDataset::open("/data/Layers").unwrap();
//! let (width, height) = dataset.raster_size();
//! println!("{}x{}, {} bands", width, height, dataset.band_count());
//!
//! // Red band of the top-left block of the first overview
//! let block = dataset.read_block(1, 1, 0, 0).unwrap();
//! assert_eq!(block.len(), (dataset.block_size().0 * dataset.block_size().1) as usize);
//! ```

pub mod bundle;
pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod raster;
pub mod tile;


// Re-export commonly used types
pub use bundle::{BundleHandle, BundlePool, BundleSource, FsBundleSource};
pub use error::{BundleError, ConfigError, IoError, TileError};
pub use format::{BundleIndex, CacheInfo, IndexEntry, TileFormat};
pub use io::{LocalFileReader, MemoryReader, RangeReader};
pub use raster::{
    BandLevel, ColorInterp, CompactCacheDataset, DatasetOptions, LevelGeometry, TileLocation,
};
pub use tile::{BlockCache, BlockKey, TileBuffer, TileDecoder};
