//! Per-band, per-level raster geometry.
//!
//! Level 0 is the full-resolution raster; levels 1.. are its overviews,
//! finest first. Every level uses the tile size as its block size, so the
//! block grid shrinks with the level while each block stays one tile.

use crate::error::{ConfigError, TileError};
use crate::format::conf::CacheInfo;

// =============================================================================
// ColorInterp
// =============================================================================

/// Colour interpretation of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorInterp {
    Red,
    Green,
    Blue,
    Alpha,
}

impl ColorInterp {
    /// Interpretation of 1-based `band` in an RGB or RGBA dataset.
    pub const fn for_band(band: usize) -> Self {
        match band {
            1 => ColorInterp::Red,
            2 => ColorInterp::Green,
            3 => ColorInterp::Blue,
            _ => ColorInterp::Alpha,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            ColorInterp::Red => "Red",
            ColorInterp::Green => "Green",
            ColorInterp::Blue => "Blue",
            ColorInterp::Alpha => "Alpha",
        }
    }
}

// =============================================================================
// LevelGeometry
// =============================================================================

/// Pixel and block geometry shared by every band at one level.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelGeometry {
    /// Level index (0 = full resolution)
    pub level: usize,

    /// Level number used in the `_alllayers/Lnn` directory name
    pub storage_level: u32,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Block (tile) width in pixels
    pub block_width: u32,

    /// Block (tile) height in pixels
    pub block_height: u32,

    /// Ground units per pixel
    pub resolution: f64,

    /// Map scale denominator, if the descriptor lists one
    pub scale: Option<f64>,
}

impl LevelGeometry {
    /// Number of blocks across.
    pub fn blocks_x(&self) -> u32 {
        self.width.div_ceil(self.block_width)
    }

    /// Number of blocks down.
    pub fn blocks_y(&self) -> u32 {
        self.height.div_ceil(self.block_height)
    }

    /// Bytes in one single-band block.
    pub fn block_len(&self) -> usize {
        self.block_width as usize * self.block_height as usize
    }

    /// Whether `(block_x, block_y)` lies inside this level's block grid.
    pub fn contains_block(&self, block_x: u32, block_y: u32) -> bool {
        block_x < self.blocks_x() && block_y < self.blocks_y()
    }

    /// Affine transform `[origin_x, res, 0, origin_y, 0, -res]`.
    pub fn geo_transform(&self, origin_x: f64, origin_y: f64) -> [f64; 6] {
        [
            origin_x,
            self.resolution,
            0.0,
            origin_y,
            0.0,
            -self.resolution,
        ]
    }
}

// =============================================================================
// BandLevel
// =============================================================================

/// One band at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandLevel {
    /// Band index (1-based)
    pub band: usize,

    /// Level index (0 = full resolution)
    pub level: usize,

    pub color_interp: ColorInterp,
}

// =============================================================================
// BandSet
// =============================================================================

/// Every band at every level, held flat and keyed by `(band, level)`.
#[derive(Debug, Clone)]
pub struct BandSet {
    band_count: usize,
    levels: Vec<LevelGeometry>,
    bands: Vec<BandLevel>,
}

impl BandSet {
    /// Build the geometry of all levels from a parsed descriptor.
    ///
    /// Overview sizes are `round(size * res[0] / res[k])` with `res` ordered
    /// finest first.
    pub fn new(info: &CacheInfo) -> Result<Self, ConfigError> {
        let (width, height) = info.raster_size()?;
        let band_count = info.band_count();
        let total = info.lods.len();

        // Descriptor levels are coarsest first
        let finest_first: Vec<_> = info.lods.iter().rev().collect();
        let base = finest_first
            .first()
            .ok_or(ConfigError::MissingField("TileCacheInfo.LODInfos.LODInfo"))?
            .resolution;

        let levels: Vec<LevelGeometry> = finest_first
            .iter()
            .enumerate()
            .map(|(level, lod)| {
                let ratio = base / lod.resolution;
                LevelGeometry {
                    level,
                    storage_level: (total - level - 1) as u32,
                    width: scaled(width, ratio),
                    height: scaled(height, ratio),
                    block_width: info.tile_width,
                    block_height: info.tile_height,
                    resolution: lod.resolution,
                    scale: lod.scale,
                }
            })
            .collect();

        let bands = (0..levels.len())
            .flat_map(|level| {
                (1..=band_count).map(move |band| BandLevel {
                    band,
                    level,
                    color_interp: ColorInterp::for_band(band),
                })
            })
            .collect();

        Ok(Self {
            band_count,
            levels,
            bands,
        })
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    /// Number of levels including full resolution.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[LevelGeometry] {
        &self.levels
    }

    /// Geometry of `level`.
    pub fn level(&self, level: usize) -> Result<&LevelGeometry, TileError> {
        self.levels.get(level).ok_or(TileError::InvalidLevel(level))
    }

    /// The band object for 1-based `band` at `level`.
    pub fn band(&self, band: usize, level: usize) -> Result<&BandLevel, TileError> {
        if band == 0 || band > self.band_count {
            return Err(TileError::InvalidBand(band));
        }
        if level >= self.levels.len() {
            return Err(TileError::InvalidLevel(level));
        }
        Ok(&self.bands[level * self.band_count + band - 1])
    }

    /// All bands at `level`, in band order.
    pub fn bands_at(&self, level: usize) -> Result<&[BandLevel], TileError> {
        if level >= self.levels.len() {
            return Err(TileError::InvalidLevel(level));
        }
        let start = level * self.band_count;
        Ok(&self.bands[start..start + self.band_count])
    }
}

fn scaled(size: u32, ratio: f64) -> u32 {
    ((size as f64 * ratio).round() as u32).max(1)
}
