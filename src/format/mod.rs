//! On-disk formats of an Esri compact V2 cache.
//!
//! An exploded cache is a directory with a `conf.xml` descriptor and one
//! `_alllayers/Lnn` directory per level of detail, each holding bundle files
//! of `packet_size * packet_size` tiles:
//!
//! - [`conf`]: The `conf.xml` descriptor
//! - [`bundle`]: Bundle header and tile index

pub mod bundle;
pub mod conf;

pub use bundle::{
    pack_word, unpack_word, BundleHeader, BundleIndex, IndexEntry, BUNDLE_HEADER_SIZE,
    DEFAULT_PACKET_SIZE,
};
pub use conf::{CacheInfo, LodInfo, TileFormat, COMPACT_V2_STORAGE};
