//! Raster view of a compact cache.
//!
//! - [`CompactCacheDataset`]: Opens a cache and serves band blocks
//! - [`BandSet`]: Flat `(band, level)` table of bands and level geometry
//! - [`TileLocation`]: Maps a block to its bundle file and index slot

mod bands;
mod dataset;
mod scatter;

pub use bands::{BandLevel, BandSet, ColorInterp, LevelGeometry};
pub use dataset::{CompactCacheDataset, DatasetOptions, DESCRIPTOR_NAME};
pub use scatter::{bundle_path, scatter_tile, TileLocation, ALL_LAYERS_DIR};
