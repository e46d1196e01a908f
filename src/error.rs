use thiserror::Error;

/// I/O errors that can occur when reading bundle files
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Requested range exceeds resource bounds (short read)
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// The file exists but could not be opened
    #[error("Failed to open {path}: {message}")]
    Open { path: String, message: String },

    /// A read against an open file failed
    #[error("Read error on {identifier}: {message}")]
    Read { identifier: String, message: String },
}

/// Errors raised while validating a bundle file.
///
/// These never escape a block read: a bundle that fails validation is kept
/// in the pool as "exists but unusable" and all of its tiles read as zero.
#[derive(Debug, Clone, Error)]
pub enum BundleError {
    /// I/O error while reading the header or index
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// File is too small to contain the header and index
    #[error("Bundle too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// A fixed header field does not hold the expected constant
    #[error("Bundle header mismatch at byte {offset}: expected {expected}, got {actual}")]
    HeaderMismatch {
        offset: usize,
        expected: u32,
        actual: u32,
    },
}

/// Errors that abort opening a dataset
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The descriptor could not be read
    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },

    /// The descriptor is not well-formed XML
    #[error("Malformed cache descriptor: {0}")]
    Xml(String),

    /// Required element is missing from the descriptor
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Element is present but its value is unusable
    #[error("Invalid value for {field}: {message}")]
    InvalidField { field: &'static str, message: String },

    /// Only compact V2 storage can be read
    #[error("Unsupported cache storage format: {0} (only esriMapCacheStorageModeCompactV2 is supported)")]
    UnsupportedStorage(String),
}

/// Errors local to a single block read
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// I/O error while reading tile bytes
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The compressed tile could not be decoded
    #[error("Failed to decode tile: {message}")]
    Decode { message: String },

    /// Decoded tile does not have the configured tile size
    #[error("Unexpected tile size: expected {expected:?}, got {actual:?}")]
    UnexpectedTileSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// No mapping exists from the tile's bands to the dataset's bands
    #[error("Cannot map a {source_bands}-band tile onto {target_bands} dataset bands")]
    BandMismatch {
        source_bands: usize,
        target_bands: usize,
    },

    /// Band index outside 1..=band_count
    #[error("Invalid band: {0}")]
    InvalidBand(usize),

    /// Level index outside 0..level_count
    #[error("Invalid level: {0}")]
    InvalidLevel(usize),

    /// Block coordinates outside the level's block grid
    #[error("Block ({block_x}, {block_y}) out of range at level {level}")]
    BlockOutOfRange {
        level: usize,
        block_x: u32,
        block_y: u32,
    },

    /// Destination buffer has the wrong length
    #[error("Buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSize { expected: usize, actual: usize },
}
