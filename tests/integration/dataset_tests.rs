//! End-to-end block read tests.
//!
//! Tests verify:
//! - Dataset geometry, overviews and georeferencing
//! - Band reconciliation for PNG, JPEG and MIXED caches
//! - One decode serves every band
//! - Sparse and damaged data handling
//! - Descriptor errors name the offending field

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

use compact_cache::error::{ConfigError, IoError, TileError};
use compact_cache::{ColorInterp, CompactCacheDataset, DatasetOptions, TileFormat};

use super::test_utils::{
    build_bundle, encode_jpeg, encode_png, patterned_rgb, plane, Descriptor, TestCache,
};

// =============================================================================
// Geometry
// =============================================================================

#[test]
fn test_geometry_from_descriptor() {
    let cache = TestCache::new(&Descriptor::default());
    let dataset = CompactCacheDataset::open(cache.path()).unwrap();

    // Symmetric extent: 2 * |origin| at the finest resolution
    assert_eq!(dataset.raster_size(), (128, 96));
    assert_eq!(dataset.block_size(), (16, 16));
    assert_eq!(dataset.tile_format(), TileFormat::Png);
    assert_eq!(dataset.band_count(), 4);
    assert_eq!(dataset.spatial_ref(), "EPSG:3857");
    assert_eq!(dataset.geo_transform(), [-64.0, 1.0, 0.0, 48.0, 0.0, -1.0]);

    let interps: Vec<_> = (1..=4)
        .map(|b| dataset.band(b, 0).unwrap().color_interp)
        .collect();
    assert_eq!(
        interps,
        vec![
            ColorInterp::Red,
            ColorInterp::Green,
            ColorInterp::Blue,
            ColorInterp::Alpha
        ]
    );
}

#[test]
fn test_overview_sizes_follow_resolution_ratio() {
    let descriptor = Descriptor {
        resolutions: vec![10.0, 3.0, 1.0],
        extent: Some((250.0, 130.0)),
        ..Default::default()
    };
    let cache = TestCache::new(&descriptor);
    let dataset = CompactCacheDataset::open(cache.path()).unwrap();

    let (w, h) = dataset.raster_size();
    assert_eq!((w, h), (250, 130));
    assert_eq!(dataset.overview_count(), 2);

    for (level, res) in [(1usize, 3.0f64), (2, 10.0)] {
        let geometry = dataset.level(level).unwrap();
        let expected = (
            (w as f64 * 1.0 / res).round() as u32,
            (h as f64 * 1.0 / res).round() as u32,
        );
        assert_eq!((geometry.width, geometry.height), expected);
        assert_eq!((geometry.block_width, geometry.block_height), (16, 16));
        assert_eq!(
            dataset.level_geo_transform(level).unwrap()[1],
            res,
            "level {}",
            level
        );
    }
}

// =============================================================================
// Decoding
// =============================================================================

#[test]
fn test_rgb_tile_in_rgba_cache() {
    let img = patterned_rgb(16, 40);
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(2, 4, 0, &build_bundle(4, &[(1, 3, encode_png(&img))]));

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    let rgb = img.to_rgb8().into_raw();

    for band in 1..=3 {
        let block = dataset.read_block(band, 0, 3, 5).unwrap();
        assert_eq!(block.as_ref(), plane(&rgb, 3, band - 1).as_slice());
    }
    let alpha = dataset.read_block(4, 0, 3, 5).unwrap();
    assert_eq!(alpha.len(), 256);
    assert!(alpha.iter().all(|&a| a == 255));
}

#[test]
fn test_rgba_tile_keeps_alpha() {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(16, 16, |x, y| {
        Rgba([x as u8, y as u8, 200, if x < 8 { 0 } else { 255 }])
    }));
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(2, 0, 0, &build_bundle(4, &[(0, 0, encode_png(&img))]));

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    let alpha = dataset.read_block(4, 0, 0, 0).unwrap();
    assert_eq!(alpha[0], 0);
    assert_eq!(alpha[8], 255);
}

#[test]
fn test_gray_jpeg_into_rgb() {
    let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([90])));
    let cache = TestCache::new(&Descriptor {
        tile_format: "JPEG",
        ..Default::default()
    });
    cache.write_bundle(2, 0, 0, &build_bundle(4, &[(0, 0, encode_jpeg(&img))]));

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    assert_eq!(dataset.band_count(), 3);

    let red = dataset.read_block(1, 0, 0, 0).unwrap();
    let blue = dataset.read_block(3, 0, 0, 0).unwrap();
    assert_eq!(red, blue);
    assert!(red.iter().all(|&v| (v as i16 - 90).abs() <= 2));
}

#[test]
fn test_mixed_cache_reads_both_encodings() {
    let png = patterned_rgb(16, 1);
    let jpeg = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(16, 16, image::Rgb([10, 200, 30])));
    let cache = TestCache::new(&Descriptor {
        tile_format: "MIXED",
        ..Default::default()
    });
    cache.write_bundle(
        2,
        0,
        0,
        &build_bundle(4, &[(0, 0, encode_png(&png)), (0, 1, encode_jpeg(&jpeg))]),
    );

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    assert_eq!(dataset.band_count(), 4);

    let green = dataset.read_block(2, 0, 0, 0).unwrap();
    assert_eq!(green.as_ref(), plane(&png.to_rgb8().into_raw(), 3, 1).as_slice());

    let green = dataset.read_block(2, 0, 1, 0).unwrap();
    assert!(green.iter().all(|&v| (v as i16 - 200).abs() <= 4));
    let alpha = dataset.read_block(4, 0, 1, 0).unwrap();
    assert!(alpha.iter().all(|&a| a == 255));
}

#[test]
fn test_overview_reads_from_its_level_directory() {
    let full = patterned_rgb(16, 0);
    let overview = patterned_rgb(16, 99);
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(2, 0, 0, &build_bundle(4, &[(0, 0, encode_png(&full))]));
    cache.write_bundle(0, 0, 0, &build_bundle(4, &[(0, 0, encode_png(&overview))]));

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();

    // Level 2 is the coarsest, stored as L00
    let red = dataset.read_block(1, 2, 0, 0).unwrap();
    assert_eq!(red.as_ref(), plane(&overview.to_rgb8().into_raw(), 3, 0).as_slice());

    // Level 1 (L01) has no bundles
    assert!(dataset.read_block(1, 1, 0, 0).unwrap().iter().all(|&v| v == 0));
}

// =============================================================================
// Shared Decodes
// =============================================================================

#[test]
fn test_shared_decode_matches_independent_reads() {
    let tiles: Vec<_> = (0..4)
        .map(|i| (i / 2, i % 2, encode_png(&patterned_rgb(16, i as u8 * 17))))
        .collect();
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(2, 0, 0, &build_bundle(4, &tiles));

    let mut shared = CompactCacheDataset::open(cache.path()).unwrap();
    let mut independent = CompactCacheDataset::open_with_options(
        cache.path(),
        DatasetOptions {
            share_decoded: false,
            ..Default::default()
        },
    )
    .unwrap();

    for (by, bx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        shared.read_block(1, 0, bx, by).unwrap();
        assert!(independent.cached_block(2, 0, bx, by).is_none());

        for band in 2..=4 {
            let from_sibling = shared
                .cached_block(band, 0, bx, by)
                .expect("sibling block cached by the band 1 read");
            let direct = independent.read_block(band, 0, bx, by).unwrap();
            assert_eq!(from_sibling, direct, "band {} block ({}, {})", band, bx, by);
        }
    }

    // Without sharing every band is its own block cache entry
    assert_eq!(independent.block_cache().len(), 4 * 3);
    assert_eq!(shared.block_cache().len(), 4 * 4);
}

#[test]
fn test_read_block_into_matches_read_block() {
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(
        2,
        0,
        4,
        &build_bundle(4, &[(3, 2, encode_png(&patterned_rgb(16, 5)))]),
    );

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    let mut dst = vec![0u8; 256];
    dataset.read_block_into(3, 0, 6, 3, &mut dst).unwrap();
    assert_eq!(dataset.read_block(3, 0, 6, 3).unwrap().as_ref(), dst.as_slice());
}

// =============================================================================
// Sparse and Damaged Data
// =============================================================================

#[test]
fn test_absent_tile_reads_zero() {
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(2, 0, 0, &build_bundle(4, &[(0, 0, encode_png(&patterned_rgb(16, 3)))]));

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    let mut dst = vec![0xAAu8; 256];
    dataset.read_block_into(1, 0, 2, 1, &mut dst).unwrap();

    assert_eq!(dst.len(), 256);
    assert!(dst.iter().all(|&b| b == 0));
}

#[test]
fn test_malformed_bundle_reads_zero() {
    let cache = TestCache::new(&Descriptor::default());
    let mut bundle = build_bundle(4, &[(0, 0, encode_png(&patterned_rgb(16, 3)))]);
    bundle[0] = 4;
    let path = cache.write_bundle(2, 0, 0, &bundle);

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    let block = dataset.read_block(1, 0, 0, 0).unwrap();
    assert!(block.iter().all(|&b| b == 0));

    // The unusable bundle stays pooled
    assert!(dataset.pool().contains(&path));
}

#[test]
fn test_bundle_for_other_packet_size_reads_zero() {
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(2, 0, 0, &build_bundle(8, &[(0, 0, encode_png(&patterned_rgb(16, 3)))]));

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    assert!(dataset.read_block(1, 0, 0, 0).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn test_truncated_tile_is_error() {
    let cache = TestCache::new(&Descriptor::default());
    let mut bundle = build_bundle(
        4,
        &[
            (0, 0, encode_png(&patterned_rgb(16, 1))),
            (0, 1, encode_png(&patterned_rgb(16, 2))),
        ],
    );
    bundle.truncate(bundle.len() - 10);
    cache.write_bundle(2, 0, 0, &bundle);

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();

    assert!(matches!(
        dataset.read_block(1, 0, 1, 0),
        Err(TileError::Io(IoError::RangeOutOfBounds { .. }))
    ));

    // The failure is local to that block
    assert!(dataset.read_block(1, 0, 0, 0).is_ok());
}

#[test]
fn test_wrong_tile_size_is_error() {
    let cache = TestCache::new(&Descriptor::default());
    cache.write_bundle(2, 0, 0, &build_bundle(4, &[(0, 0, encode_png(&patterned_rgb(32, 0)))]));

    let mut dataset = CompactCacheDataset::open(cache.path()).unwrap();
    assert!(matches!(
        dataset.read_block(1, 0, 0, 0),
        Err(TileError::UnexpectedTileSize {
            expected: (16, 16),
            actual: (32, 32)
        })
    ));
}

// =============================================================================
// Descriptor Errors
// =============================================================================

#[test]
fn test_missing_field_named_in_error() {
    let cache = TestCache::empty();
    let xml = Descriptor::default()
        .to_xml()
        .replace("<TileCols>16</TileCols>", "");
    cache.write_descriptor(&xml);

    let err = CompactCacheDataset::open(cache.path()).err().unwrap();
    assert!(matches!(err, ConfigError::MissingField(_)));
    assert!(err.to_string().contains("TileCacheInfo.TileCols"), "{}", err);
}

#[test]
fn test_invalid_field_named_in_error() {
    let cache = TestCache::empty();
    let xml = Descriptor::default()
        .to_xml()
        .replace("<PacketSize>4</PacketSize>", "<PacketSize>many</PacketSize>");
    cache.write_descriptor(&xml);

    let err = CompactCacheDataset::open(cache.path()).err().unwrap();
    assert!(err.to_string().contains("PacketSize"), "{}", err);
}

#[test]
fn test_unsupported_storage() {
    let cache = TestCache::empty();
    let xml = Descriptor::default().to_xml().replace(
        "esriMapCacheStorageModeCompactV2",
        "esriMapCacheStorageModeExploded",
    );
    cache.write_descriptor(&xml);

    assert!(matches!(
        CompactCacheDataset::open(cache.path()),
        Err(ConfigError::UnsupportedStorage(s)) if s == "esriMapCacheStorageModeExploded"
    ));
}

#[test]
fn test_open_by_descriptor_path() {
    let cache = TestCache::new(&Descriptor::default());
    let dataset = CompactCacheDataset::open(cache.path().join("conf.xml")).unwrap();
    assert_eq!(dataset.root(), cache.path());
}
