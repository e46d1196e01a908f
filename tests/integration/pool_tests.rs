//! Bundle handle pool integration tests.
//!
//! Tests verify:
//! - Repeated reads from one bundle open it once
//! - Absent bundles are remembered
//! - The pool never exceeds its capacity and reopens evicted bundles

use compact_cache::bundle::BundlePool;
use compact_cache::raster::bundle_path;
use compact_cache::{CompactCacheDataset, DatasetOptions};

use super::test_utils::{
    build_bundle, encode_png, patterned_rgb, CountingSource, Descriptor, TestCache,
};

fn open_counting(
    cache: &TestCache,
    pool_capacity: usize,
) -> (CompactCacheDataset<CountingSource>, CountingSource) {
    let source = CountingSource::new();
    let dataset = CompactCacheDataset::open_with_source(
        cache.path(),
        source.clone(),
        DatasetOptions {
            pool_capacity,
            ..Default::default()
        },
    )
    .unwrap();
    (dataset, source)
}

#[test]
fn test_bundle_opened_once_for_many_tiles() {
    let tiles: Vec<_> = (0..4)
        .flat_map(|row| (0..4).map(move |col| (row, col)))
        .map(|(row, col)| {
            let seed = (row * 4 + col) as u8;
            (row, col, encode_png(&patterned_rgb(16, seed)))
        })
        .collect();
    let cache = TestCache::new(&Descriptor::default());
    let path = cache.write_bundle(2, 0, 0, &build_bundle(4, &tiles));

    let (mut dataset, source) = open_counting(&cache, 4);

    for by in 0..4 {
        for bx in 0..4 {
            let mut dst = vec![0u8; 256];
            dataset.read_block_into(1, 0, bx, by, &mut dst).unwrap();
        }
    }

    assert_eq!(source.open_count(), 1);
    assert_eq!(source.opens_of(&path), 1);
}

#[test]
fn test_missing_bundle_opened_once() {
    let cache = TestCache::new(&Descriptor::default());
    let (mut dataset, source) = open_counting(&cache, 4);

    let first = dataset.read_block(1, 0, 4, 4).unwrap();
    let mut second = vec![1u8; 256];
    dataset.read_block_into(2, 0, 5, 5, &mut second).unwrap();

    assert!(first.iter().all(|&b| b == 0));
    assert!(second.iter().all(|&b| b == 0));

    let path = bundle_path(cache.path(), 2, 4, 4);
    assert_eq!(source.opens_of(&path), 1);
    assert_eq!(source.open_count(), 1);
}

#[test]
fn test_pool_capacity_bounded() {
    let cache = TestCache::new(&Descriptor::default());
    let (mut dataset, source) = open_counting(&cache, 2);

    // Level 0 has 8x6 blocks in 2x2 bundles of 4x4 blocks
    let bundles = [(0, 0), (4, 0), (0, 4), (4, 4)];
    for (bx, by) in bundles {
        dataset.read_block(1, 0, bx, by).unwrap();
        assert!(dataset.pool().len() <= 2);
    }
    assert_eq!(source.open_count(), 4);

    // The two most recent bundles are still pooled
    assert!(dataset.pool().contains(&bundle_path(cache.path(), 2, 4, 4)));
    assert!(dataset.pool().contains(&bundle_path(cache.path(), 2, 4, 0)));
    assert!(!dataset.pool().contains(&bundle_path(cache.path(), 2, 0, 0)));

    // Reading the evicted bundle opens it again; band 2 is not in the
    // block cache so the read reaches the pool
    dataset.read_block(2, 0, 1, 1).unwrap();
    assert_eq!(source.opens_of(&bundle_path(cache.path(), 2, 0, 0)), 2);
}

#[test]
fn test_clear_caches_reopens() {
    let cache = TestCache::new(&Descriptor::default());
    let tile = encode_png(&patterned_rgb(16, 0));
    cache.write_bundle(2, 0, 0, &build_bundle(4, &[(0, 0, tile)]));
    let (mut dataset, source) = open_counting(&cache, 4);

    dataset.read_block(1, 0, 0, 0).unwrap();
    dataset.read_block(1, 0, 0, 0).unwrap();
    assert_eq!(source.open_count(), 1);

    dataset.clear_caches();
    assert!(dataset.pool().is_empty());
    assert!(dataset.block_cache().is_empty());

    dataset.read_block(1, 0, 0, 0).unwrap();
    assert_eq!(source.open_count(), 2);
}

#[test]
fn test_pool_direct_use() {
    let cache = TestCache::new(&Descriptor::default());
    let tile = encode_png(&patterned_rgb(16, 0));
    let path = cache.write_bundle(2, 0, 0, &build_bundle(4, &[(2, 3, tile.clone())]));

    let source = CountingSource::new();
    let mut pool = BundlePool::with_capacity(source.clone(), 4, 1);

    let handle = pool.get(&path).unwrap();
    assert!(handle.is_open());
    assert_eq!(handle.version(), Some(3));
    assert_eq!(handle.read_tile(2, 3).unwrap().unwrap().as_ref(), tile.as_slice());
    assert!(handle.read_tile(0, 0).unwrap().is_none());

    let missing = cache.path().join("_alllayers/L02/R0000C0004.bundle");
    assert!(pool.get(&missing).unwrap().is_missing());
    assert_eq!(pool.len(), 1);
    assert_eq!(source.open_count(), 2);
}
