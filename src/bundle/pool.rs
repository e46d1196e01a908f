//! Bounded pool of open bundle handles.
//!
//! Opening a bundle costs a file open plus a full index read, and adjacent
//! block requests usually land in the same bundle. The pool keeps a handful
//! of handles keyed by path:
//!
//! - a hit returns the pooled handle without touching the filesystem
//! - a miss opens the bundle and admits it, evicting the least recently
//!   used handle once the pool is full
//! - a bundle that does not exist, or whose header is malformed, is pooled
//!   like any other so repeated misses stay cheap

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use super::source::BundleSource;
use crate::error::{BundleError, IoError};
use crate::format::bundle::{BundleHeader, BundleIndex};
use crate::io::RangeReader;

/// Default number of simultaneously open bundles.
pub const DEFAULT_POOL_CAPACITY: usize = 4;

// =============================================================================
// BundleHandle
// =============================================================================

/// State of one pooled bundle.
#[derive(Debug)]
enum HandleState<R> {
    /// No file at this path
    Missing,

    /// The file exists but its header or index could not be used
    Unusable(BundleError),

    /// Open file with its decoded index
    Open {
        reader: R,
        header: BundleHeader,
        index: BundleIndex,
    },
}

/// A bundle file as seen by the pool.
///
/// Handles for absent or malformed bundles are valid entries; every tile
/// they are asked for is absent.
#[derive(Debug)]
pub struct BundleHandle<R> {
    path: PathBuf,
    state: HandleState<R>,
}

impl<R: RangeReader> BundleHandle<R> {
    /// Open the bundle at `path` through `source` and load its index.
    ///
    /// Only failures to open an existing file are errors; a missing file or
    /// an unusable header yields a handle with no file behind it.
    pub fn open<S>(source: &S, path: &Path, packet_size: u32) -> Result<Self, IoError>
    where
        S: BundleSource<Reader = R>,
    {
        let state = match source.open(path)? {
            None => {
                debug!(bundle = %path.display(), "bundle absent");
                HandleState::Missing
            }
            Some(reader) => match BundleIndex::load(&reader, packet_size) {
                Ok((header, index)) => {
                    debug!(
                        bundle = %path.display(),
                        tiles = index.tile_count(),
                        "bundle opened"
                    );
                    HandleState::Open {
                        reader,
                        header,
                        index,
                    }
                }
                Err(e) => {
                    debug!(bundle = %path.display(), error = %e, "bundle unusable");
                    HandleState::Unusable(e)
                }
            },
        };

        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a usable file is behind this handle.
    pub fn is_open(&self) -> bool {
        matches!(self.state, HandleState::Open { .. })
    }

    /// Whether the bundle file was absent when the handle was created.
    pub fn is_missing(&self) -> bool {
        matches!(self.state, HandleState::Missing)
    }

    /// Why the bundle was rejected, if it exists but is unusable.
    pub fn rejection(&self) -> Option<&BundleError> {
        match &self.state {
            HandleState::Unusable(e) => Some(e),
            _ => None,
        }
    }

    /// Format version from the header of an open bundle.
    pub fn version(&self) -> Option<u32> {
        match &self.state {
            HandleState::Open { header, .. } => Some(header.version),
            _ => None,
        }
    }

    pub fn index(&self) -> Option<&BundleIndex> {
        match &self.state {
            HandleState::Open { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Read the compressed bytes of the tile at bundle-local `(row, col)`.
    ///
    /// Returns `Ok(None)` when the slot is empty or the bundle is unusable.
    /// A short read is an error.
    pub fn read_tile(&self, row: u32, col: u32) -> Result<Option<Bytes>, IoError> {
        let (reader, index) = match &self.state {
            HandleState::Open { reader, index, .. } => (reader, index),
            _ => return Ok(None),
        };

        match index.lookup(row, col) {
            None => Ok(None),
            Some(entry) => reader
                .read_exact_at(entry.offset, entry.length as usize)
                .map(Some),
        }
    }
}

// =============================================================================
// BundlePool
// =============================================================================

/// Fixed-capacity set of bundle handles with LRU eviction.
pub struct BundlePool<S: BundleSource> {
    /// The source for opening bundle files
    source: S,

    /// Tiles per bundle side
    packet_size: u32,

    /// Pooled handles indexed by bundle path
    handles: LruCache<PathBuf, BundleHandle<S::Reader>>,
}

impl<S: BundleSource> BundlePool<S> {
    /// Create a pool with the default capacity of four handles.
    pub fn new(source: S, packet_size: u32) -> Self {
        Self::with_capacity(source, packet_size, DEFAULT_POOL_CAPACITY)
    }

    /// Create a pool holding at most `capacity` handles (at least one).
    pub fn with_capacity(source: S, packet_size: u32, capacity: usize) -> Self {
        Self {
            source,
            packet_size,
            handles: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get the handle for `path`, opening the bundle if it is not pooled.
    pub fn get(&mut self, path: &Path) -> Result<&BundleHandle<S::Reader>, IoError> {
        if !self.handles.contains(path) {
            let handle = BundleHandle::open(&self.source, path, self.packet_size)?;
            if let Some((evicted, _)) = self.handles.push(path.to_path_buf(), handle) {
                debug!(bundle = %evicted.display(), "bundle handle evicted");
            }
        }

        self.handles.get(path).ok_or_else(|| IoError::Open {
            path: path.display().to_string(),
            message: "bundle handle was not retained by the pool".to_string(),
        })
    }

    /// Whether a handle for `path` is pooled, without touching LRU order.
    pub fn contains(&self, path: &Path) -> bool {
        self.handles.contains(path)
    }

    /// Number of pooled handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Maximum number of pooled handles.
    pub fn capacity(&self) -> usize {
        self.handles.cap().get()
    }

    pub fn packet_size(&self) -> u32 {
        self.packet_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Close every pooled handle.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
