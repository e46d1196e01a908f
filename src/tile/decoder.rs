//! Tile decoder.
//!
//! Every tile in a bundle is a complete, independently compressed image.
//! This module decodes one tile into a pixel-interleaved [`TileBuffer`]
//! holding exactly the dataset's band count.
//!
//! # Band Reconciliation
//!
//! The bands found in a tile do not always match the dataset's bands:
//!
//! | tile bands | dataset bands | result                                   |
//! |------------|---------------|------------------------------------------|
//! | n          | n             | copied as is                             |
//! | 3 (RGB)    | 4 (RGBA)      | RGB copied, alpha filled with 255        |
//! | 1 (gray)   | 3 (RGB)       | gray duplicated into R, G and B          |
//! | 1 (gray)   | 4 (RGBA)      | gray duplicated, alpha filled with 255   |
//!
//! Any other combination is rejected rather than guessed at.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::TileError;
use crate::format::conf::TileFormat;

/// Alpha value of a fully opaque pixel.
pub const OPAQUE: u8 = 255;

// =============================================================================
// TileBuffer
// =============================================================================

/// Pixel-interleaved 8-bit samples of one decoded tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBuffer {
    width: u32,
    height: u32,
    bands: usize,
    data: Vec<u8>,
}

impl TileBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(width: u32, height: u32, bands: usize) -> Self {
        Self {
            width,
            height,
            bands,
            data: vec![0; width as usize * height as usize * bands],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Number of pixels in the tile.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Interleaved samples, `bands` per pixel, rows top to bottom.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Samples of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let start = (y as usize * self.width as usize + x as usize) * self.bands;
        &self.data[start..start + self.bands]
    }

    /// Set every sample to `value`.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Gather the samples of one band (0-based) into `dst`.
    pub fn extract_band(&self, band: usize, dst: &mut [u8]) -> Result<(), TileError> {
        if band >= self.bands {
            return Err(TileError::InvalidBand(band + 1));
        }
        if dst.len() != self.pixel_count() {
            return Err(TileError::BufferSize {
                expected: self.pixel_count(),
                actual: dst.len(),
            });
        }

        for (out, pixel) in dst.iter_mut().zip(self.data.chunks_exact(self.bands)) {
            *out = pixel[band];
        }
        Ok(())
    }
}

// =============================================================================
// Band Reconciliation
// =============================================================================

/// How the bands of a tile populate the dataset's bands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandMap {
    /// Source band (0-based) for each leading destination band
    pub sources: Vec<usize>,

    /// Whether the last destination band is an alpha band filled with 255
    pub fill_alpha: bool,
}

impl BandMap {
    /// Work out the mapping of `source_bands` tile bands onto
    /// `target_bands` dataset bands.
    pub fn new(source_bands: usize, target_bands: usize) -> Result<Self, TileError> {
        let mismatch = TileError::BandMismatch {
            source_bands,
            target_bands,
        };

        if source_bands == 0 || target_bands == 0 {
            return Err(mismatch);
        }

        if source_bands == target_bands {
            return Ok(Self {
                sources: (0..target_bands).collect(),
                fill_alpha: false,
            });
        }

        // An even dataset band count carries a trailing alpha band
        let wants_alpha = target_bands % 2 == 0;
        let color_bands = if wants_alpha {
            target_bands - 1
        } else {
            target_bands
        };

        if wants_alpha && source_bands == color_bands {
            return Ok(Self {
                sources: (0..color_bands).collect(),
                fill_alpha: true,
            });
        }

        if source_bands == 1 && color_bands >= 3 {
            return Ok(Self {
                sources: vec![0; color_bands],
                fill_alpha: wants_alpha,
            });
        }

        Err(mismatch)
    }

    /// Write `source` (interleaved, `source_bands` per pixel) into `out`.
    pub fn apply(&self, source: &[u8], source_bands: usize, out: &mut TileBuffer) {
        if self.fill_alpha {
            out.fill(OPAQUE);
        }

        let target_bands = out.bands;
        for (dst, src) in out
            .data
            .chunks_exact_mut(target_bands)
            .zip(source.chunks_exact(source_bands))
        {
            for (d, &s) in dst.iter_mut().zip(self.sources.iter()) {
                *d = src[s];
            }
        }
    }
}

// =============================================================================
// TileDecoder
// =============================================================================

/// Decodes compressed tiles into the dataset's band layout.
#[derive(Debug, Clone)]
pub struct TileDecoder {
    format: TileFormat,
    tile_width: u32,
    tile_height: u32,
    bands: usize,
}

impl TileDecoder {
    pub fn new(format: TileFormat, tile_width: u32, tile_height: u32, bands: usize) -> Self {
        Self {
            format,
            tile_width,
            tile_height,
            bands,
        }
    }

    /// Allocate a buffer shaped for this decoder's output.
    pub fn buffer(&self) -> TileBuffer {
        TileBuffer::new(self.tile_width, self.tile_height, self.bands)
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Decode one compressed tile into `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `out` is not shaped for this decoder
    /// - The bytes are not a decodable JPEG or PNG
    /// - The tile does not have the configured pixel size
    /// - The tile's bands cannot be mapped onto the dataset's bands
    ///
    /// The contents of `out` are unspecified after an error.
    pub fn decode_into(&self, raw: &[u8], out: &mut TileBuffer) -> Result<(), TileError> {
        if out.width != self.tile_width || out.height != self.tile_height || out.bands != self.bands
        {
            return Err(TileError::BufferSize {
                expected: self.tile_width as usize * self.tile_height as usize * self.bands,
                actual: out.data.len(),
            });
        }

        let img = self.decode_image(raw)?;

        let actual = (img.width(), img.height());
        if actual != (self.tile_width, self.tile_height) {
            return Err(TileError::UnexpectedTileSize {
                expected: (self.tile_width, self.tile_height),
                actual,
            });
        }

        let (source_bands, samples) = into_samples(img);
        let map = BandMap::new(source_bands, self.bands)?;
        map.apply(&samples, source_bands, out);

        Ok(())
    }

    fn decode_image(&self, raw: &[u8]) -> Result<DynamicImage, TileError> {
        let format = self.image_format(raw)?;

        ImageReader::with_format(Cursor::new(raw), format)
            .decode()
            .map_err(|e| TileError::Decode {
                message: e.to_string(),
            })
    }

    fn image_format(&self, raw: &[u8]) -> Result<ImageFormat, TileError> {
        match self.format {
            TileFormat::Jpeg => Ok(ImageFormat::Jpeg),
            TileFormat::Png => Ok(ImageFormat::Png),
            TileFormat::Mixed => match image::guess_format(raw) {
                Ok(f @ (ImageFormat::Jpeg | ImageFormat::Png)) => Ok(f),
                Ok(other) => Err(TileError::Decode {
                    message: format!("unsupported tile encoding {:?}", other),
                }),
                Err(e) => Err(TileError::Decode {
                    message: e.to_string(),
                }),
            },
        }
    }
}

/// Flatten a decoded image to 8-bit samples, returning the band count.
fn into_samples(img: DynamicImage) -> (usize, Vec<u8>) {
    match img {
        DynamicImage::ImageLuma8(b) => (1, b.into_raw()),
        DynamicImage::ImageLumaA8(b) => (2, b.into_raw()),
        DynamicImage::ImageRgb8(b) => (3, b.into_raw()),
        DynamicImage::ImageRgba8(b) => (4, b.into_raw()),
        other => {
            let color = other.color();
            match (color.has_color(), color.has_alpha()) {
                (false, false) => (1, other.into_luma8().into_raw()),
                (false, true) => (2, other.into_luma_alpha8().into_raw()),
                (true, false) => (3, other.into_rgb8().into_raw()),
                (true, true) => (4, other.into_rgba8().into_raw()),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
