//! Cache descriptor (`conf.xml`) parsing.
//!
//! An exploded compact cache stores its layout in a `conf.xml` document next
//! to the `_alllayers` directory:
//!
//! ```xml
//! <CacheInfo>
//!   <TileCacheInfo>
//!     <SpatialReference><WKT>PROJCS[...]</WKT><LatestWKID>3857</LatestWKID></SpatialReference>
//!     <TileOrigin><X>-20037508.342787</X><Y>20037508.342787</Y></TileOrigin>
//!     <TileCols>256</TileCols>
//!     <TileRows>256</TileRows>
//!     <LODInfos>
//!       <LODInfo><LevelID>0</LevelID><Scale>591657527.59</Scale><Resolution>156543.03</Resolution></LODInfo>
//!       ...
//!     </LODInfos>
//!   </TileCacheInfo>
//!   <TileImageInfo><CacheTileFormat>JPEG</CacheTileFormat></TileImageInfo>
//!   <CacheStorageInfo>
//!     <StorageFormat>esriMapCacheStorageModeCompactV2</StorageFormat>
//!     <PacketSize>128</PacketSize>
//!   </CacheStorageInfo>
//! </CacheInfo>
//! ```
//!
//! Levels are listed coarsest first.

use std::path::Path;
use std::str::FromStr;

use quick_xml::events::Event;
use quick_xml::Reader;

use super::bundle::DEFAULT_PACKET_SIZE;
use crate::error::ConfigError;

/// Storage format string of compact V2 caches.
pub const COMPACT_V2_STORAGE: &str = "esriMapCacheStorageModeCompactV2";

/// Largest accepted packet size (tiles per bundle side).
const MAX_PACKET_SIZE: u32 = 1024;

/// Largest accepted tile dimension in pixels.
const MAX_TILE_DIMENSION: u32 = 8192;

// =============================================================================
// TileFormat
// =============================================================================

/// Compression of the tiles stored in the bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    /// Every tile is a JPEG; the dataset exposes RGB
    Jpeg,

    /// Every tile is a PNG (PNG8, PNG24 or PNG32); the dataset exposes RGBA
    Png,

    /// Tiles are JPEG or PNG, recognised per tile; the dataset exposes RGBA
    Mixed,
}

impl TileFormat {
    /// Interpret a `CacheTileFormat` value.
    ///
    /// Anything that is neither JPEG nor a PNG variant is read as mixed.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("JPEG") {
            TileFormat::Jpeg
        } else if value.len() >= 3 && value.as_bytes()[..3].eq_ignore_ascii_case(b"PNG") {
            TileFormat::Png
        } else {
            TileFormat::Mixed
        }
    }

    /// Number of bands the dataset exposes for this format.
    pub const fn band_count(&self) -> usize {
        match self {
            TileFormat::Jpeg => 3,
            TileFormat::Png | TileFormat::Mixed => 4,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            TileFormat::Jpeg => "JPEG",
            TileFormat::Png => "PNG",
            TileFormat::Mixed => "MIXED",
        }
    }
}

// =============================================================================
// CacheInfo
// =============================================================================

/// One level of detail as listed in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodInfo {
    /// Level id as stored in the descriptor (0 = coarsest)
    pub level_id: u32,

    /// Map scale denominator, if given
    pub scale: Option<f64>,

    /// Ground units per pixel
    pub resolution: f64,
}

/// The parsed cache descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheInfo {
    /// Tiles per bundle side
    pub packet_size: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Tile compression
    pub tile_format: TileFormat,

    /// Levels of detail, coarsest first
    pub lods: Vec<LodInfo>,

    /// WKT, or `EPSG:<code>` when only a WKID is given
    pub spatial_reference: String,

    /// Upper-left corner of the tile grid
    pub origin_x: f64,
    pub origin_y: f64,

    /// Ground extent covered by the cache, if given explicitly
    pub tile_extent: Option<(f64, f64)>,
}

impl CacheInfo {
    /// Read and parse a descriptor file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let xml = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_xml(&xml)
    }

    /// Parse a descriptor document.
    pub fn from_xml(xml: &str) -> Result<Self, ConfigError> {
        let root = XmlNode::parse(xml)?;
        if root.name != "CacheInfo" {
            return Err(ConfigError::InvalidField {
                field: "CacheInfo",
                message: format!("unexpected root element <{}>", root.name),
            });
        }

        let storage = root
            .text_at("CacheStorageInfo/StorageFormat")
            .ok_or(ConfigError::MissingField("CacheStorageInfo.StorageFormat"))?;
        if storage != COMPACT_V2_STORAGE {
            return Err(ConfigError::UnsupportedStorage(storage.to_string()));
        }

        let packet_size = optional_field(
            &root,
            "CacheStorageInfo/PacketSize",
            "CacheStorageInfo.PacketSize",
        )?
        .unwrap_or(DEFAULT_PACKET_SIZE);
        if packet_size == 0 || packet_size > MAX_PACKET_SIZE {
            return Err(ConfigError::InvalidField {
                field: "CacheStorageInfo.PacketSize",
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_PACKET_SIZE, packet_size
                ),
            });
        }

        let tile_width: u32 =
            required_field(&root, "TileCacheInfo/TileCols", "TileCacheInfo.TileCols")?;
        let tile_height: u32 =
            required_field(&root, "TileCacheInfo/TileRows", "TileCacheInfo.TileRows")?;
        for (field, value) in [
            ("TileCacheInfo.TileCols", tile_width),
            ("TileCacheInfo.TileRows", tile_height),
        ] {
            if value == 0 || value > MAX_TILE_DIMENSION {
                return Err(ConfigError::InvalidField {
                    field,
                    message: format!(
                        "must be between 1 and {}, got {}",
                        MAX_TILE_DIMENSION, value
                    ),
                });
            }
        }

        let tile_format = root
            .text_at("TileImageInfo/CacheTileFormat")
            .map(TileFormat::parse)
            .unwrap_or(TileFormat::Mixed);

        let lods = parse_lods(&root)?;

        let spatial_reference = parse_spatial_reference(&root)?;

        let origin_x: f64 =
            required_field(&root, "TileCacheInfo/TileOrigin/X", "TileCacheInfo.TileOrigin.X")?;
        let origin_y: f64 =
            required_field(&root, "TileCacheInfo/TileOrigin/Y", "TileCacheInfo.TileOrigin.Y")?;

        let extent_x: Option<f64> =
            optional_field(&root, "TileCacheInfo/TileExtent/X", "TileCacheInfo.TileExtent.X")?;
        let extent_y: Option<f64> =
            optional_field(&root, "TileCacheInfo/TileExtent/Y", "TileCacheInfo.TileExtent.Y")?;
        let tile_extent = match (extent_x, extent_y) {
            (Some(x), Some(y)) => Some((x, y)),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidField {
                    field: "TileCacheInfo.TileExtent",
                    message: "both X and Y must be given".to_string(),
                })
            }
        };

        Ok(CacheInfo {
            packet_size,
            tile_width,
            tile_height,
            tile_format,
            lods,
            spatial_reference,
            origin_x,
            origin_y,
            tile_extent,
        })
    }

    /// Number of bands the dataset exposes.
    pub fn band_count(&self) -> usize {
        self.tile_format.band_count()
    }

    /// Resolutions ordered finest first, as the overview API indexes them.
    pub fn resolutions_finest_first(&self) -> Vec<f64> {
        self.lods.iter().rev().map(|l| l.resolution).collect()
    }

    /// Pixel size of the full-resolution raster.
    ///
    /// Uses the explicit tile extent if present, otherwise assumes the grid
    /// is symmetric around the projection origin.
    pub fn raster_size(&self) -> Result<(u32, u32), ConfigError> {
        let finest = self
            .lods
            .last()
            .ok_or(ConfigError::MissingField("TileCacheInfo.LODInfos.LODInfo"))?
            .resolution;

        let (extent_x, extent_y) = self
            .tile_extent
            .unwrap_or((2.0 * self.origin_x.abs(), 2.0 * self.origin_y.abs()));

        let width = (extent_x / finest).round();
        let height = (extent_y / finest).round();

        if !(width >= 1.0 && height >= 1.0 && width <= u32::MAX as f64 && height <= u32::MAX as f64)
        {
            return Err(ConfigError::InvalidField {
                field: "TileCacheInfo.TileOrigin",
                message: format!(
                    "raster size {}x{} derived from extent {}x{} is unusable",
                    width, height, extent_x, extent_y
                ),
            });
        }

        Ok((width as u32, height as u32))
    }
}

fn parse_lods(root: &XmlNode) -> Result<Vec<LodInfo>, ConfigError> {
    let nodes: Vec<&XmlNode> = root
        .node_at("TileCacheInfo/LODInfos")
        .map(|n| n.children_named("LODInfo").collect())
        .unwrap_or_default();

    if nodes.is_empty() {
        return Err(ConfigError::MissingField("TileCacheInfo.LODInfos.LODInfo"));
    }

    let mut lods = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.into_iter().enumerate() {
        let resolution: f64 = required_field(node, "Resolution", "LODInfo.Resolution")?;
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(ConfigError::InvalidField {
                field: "LODInfo.Resolution",
                message: format!("must be positive, got {}", resolution),
            });
        }

        let level_id = optional_field(node, "LevelID", "LODInfo.LevelID")?.unwrap_or(i as u32);
        let scale = optional_field(node, "Scale", "LODInfo.Scale")?;

        lods.push(LodInfo {
            level_id,
            scale,
            resolution,
        });
    }

    if lods.windows(2).any(|w| w[1].resolution >= w[0].resolution) {
        return Err(ConfigError::InvalidField {
            field: "LODInfo.Resolution",
            message: "resolutions must decrease from the first level to the last".to_string(),
        });
    }

    Ok(lods)
}

fn parse_spatial_reference(root: &XmlNode) -> Result<String, ConfigError> {
    if let Some(wkt) = root.text_at("TileCacheInfo/SpatialReference/WKT") {
        return Ok(wkt.to_string());
    }

    for path in [
        "TileCacheInfo/SpatialReference/LatestWKID",
        "TileCacheInfo/SpatialReference/WKID",
    ] {
        let code: Option<u32> =
            optional_field(root, path, "TileCacheInfo.SpatialReference.WKID")?;
        if let Some(code) = code {
            return Ok(format!("EPSG:{}", code));
        }
    }

    Err(ConfigError::MissingField("TileCacheInfo.SpatialReference.WKT"))
}

fn required_field<T: FromStr>(
    node: &XmlNode,
    path: &str,
    field: &'static str,
) -> Result<T, ConfigError> {
    optional_field(node, path, field)?.ok_or(ConfigError::MissingField(field))
}

fn optional_field<T: FromStr>(
    node: &XmlNode,
    path: &str,
    field: &'static str,
) -> Result<Option<T>, ConfigError> {
    match node.text_at(path) {
        None => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidField {
                field,
                message: format!("cannot parse '{}'", text),
            }),
    }
}

// =============================================================================
// Minimal element tree
// =============================================================================

/// Element tree holding names and text only; attributes are not needed.
#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    fn parse(xml: &str) -> Result<Self, ConfigError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(Self::named(local_name(e.local_name().as_ref())));
                }
                Ok(Event::Empty(e)) => {
                    let node = Self::named(local_name(e.local_name().as_ref()));
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e
                        .unescape()
                        .map_err(|err| ConfigError::Xml(err.to_string()))?;
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::End(_)) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| ConfigError::Xml("unbalanced end tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(node),
                        None => root = Some(node),
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ConfigError::Xml(format!(
                        "error at position {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(ConfigError::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| ConfigError::Xml("document has no root element".to_string()))
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Descend a `/`-separated path of child names.
    fn node_at(&self, path: &str) -> Option<&XmlNode> {
        path.split('/').try_fold(self, |node, name| node.child(name))
    }

    /// Trimmed, non-empty text of the element at `path`.
    fn text_at(&self, path: &str) -> Option<&str> {
        self.node_at(path)
            .map(|n| n.text.trim())
            .filter(|t| !t.is_empty())
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

// =============================================================================
// Tests
// =============================================================================
