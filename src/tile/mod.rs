//! Tile decoding and band block caching.
//!
//! A block request for one band ends up decoding a whole tile, which holds
//! the samples of every band. This module provides the two pieces that make
//! that decode reusable:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           compressed tile bytes         │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │  TileDecoder  →  TileBuffer (all bands) │
//! └────────────────────┬────────────────────┘
//!                      │ one band each
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │     BlockCache (band, level, x, y)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileDecoder`]: Decodes JPEG/PNG tiles and reconciles their bands
//! - [`TileBuffer`]: Pixel-interleaved decoded tile
//! - [`BandMap`]: How tile bands populate dataset bands
//! - [`BlockCache`]: LRU cache for single-band blocks with size-based eviction
//! - [`BlockKey`]: Composite key for a band block

mod cache;
mod decoder;

pub use cache::{BlockCache, BlockKey, DEFAULT_BLOCK_CACHE_CAPACITY};
pub use decoder::{BandMap, TileBuffer, TileDecoder, OPAQUE};
