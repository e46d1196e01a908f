//! Band block cache.
//!
//! Holds decoded single-band blocks so that one tile decode can serve every
//! band of a dataset. Blocks are keyed by:
//! - Band index (1-based)
//! - Level (0 = full resolution)
//! - Block X coordinate
//! - Block Y coordinate
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached blocks in bytes and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;

/// Default cache capacity: 64MB
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 16_384;

// =============================================================================
// Cache Key
// =============================================================================

/// Identifies one band block at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// Band index (1-based)
    pub band: usize,

    /// Level (0 = full resolution)
    pub level: usize,

    /// Block X coordinate (0-indexed from left)
    pub block_x: u32,

    /// Block Y coordinate (0-indexed from top)
    pub block_y: u32,
}

impl BlockKey {
    pub fn new(band: usize, level: usize, block_x: u32, block_y: u32) -> Self {
        Self {
            band,
            level,
            block_x,
            block_y,
        }
    }
}

// =============================================================================
// Block Cache
// =============================================================================

/// LRU cache for decoded band blocks with size-based capacity.
///
/// Owned by a single dataset and mutated through `&mut self`; it is not
/// shared between datasets.
pub struct BlockCache {
    /// The underlying LRU cache
    cache: LruCache<BlockKey, Bytes>,

    /// Maximum total size in bytes
    max_size: usize,

    /// Current total size in bytes
    current_size: usize,
}

impl BlockCache {
    /// Create a new block cache with default capacity (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BLOCK_CACHE_CAPACITY)
    }

    /// Create a new block cache with the specified capacity in bytes.
    ///
    /// A capacity of zero disables caching.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new block cache with specified capacity and maximum entries.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN)),
            max_size,
            current_size: 0,
        }
    }

    /// Get a block from the cache, marking it as recently used.
    pub fn get(&mut self, key: &BlockKey) -> Option<Bytes> {
        self.cache.get(key).cloned()
    }

    /// Check if a block is cached without updating LRU order.
    pub fn contains(&self, key: &BlockKey) -> bool {
        self.cache.contains(key)
    }

    /// Store a block in the cache.
    ///
    /// Blocks larger than the whole capacity are not stored. If the cache is
    /// over capacity after insertion, least-recently-used entries are evicted
    /// until it fits.
    pub fn put(&mut self, key: BlockKey, data: Bytes) {
        let data_size = data.len();
        if data_size > self.max_size {
            return;
        }

        // If key exists, subtract old size first
        if let Some(old_data) = self.cache.peek(&key) {
            self.current_size = self.current_size.saturating_sub(old_data.len());
        }

        // Entry-count eviction also has to be reflected in the byte total
        if let Some((evicted_key, evicted_data)) = self.cache.push(key, data) {
            if evicted_key != key {
                self.current_size = self.current_size.saturating_sub(evicted_data.len());
            }
        }
        self.current_size += data_size;

        while self.current_size > self.max_size {
            if let Some((_, evicted_data)) = self.cache.pop_lru() {
                self.current_size = self.current_size.saturating_sub(evicted_data.len());
            } else {
                break;
            }
        }
    }

    /// Remove a block from the cache.
    pub fn remove(&mut self, key: &BlockKey) -> Option<Bytes> {
        let data = self.cache.pop(key)?;
        self.current_size = self.current_size.saturating_sub(data.len());
        Some(data)
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_size = 0;
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Current total size of cached blocks in bytes.
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
