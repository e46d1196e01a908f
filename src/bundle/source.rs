use std::path::Path;

use crate::error::IoError;
use crate::io::{LocalFileReader, RangeReader};

/// Opens bundle files by path.
///
/// This abstraction lets the handle pool work against the local filesystem
/// or any other store without being tied to one. An absent file is not an
/// error: implementations return `Ok(None)` and the pool remembers the miss.
pub trait BundleSource {
    /// The type of range reader this source creates.
    type Reader: RangeReader;

    /// Open the bundle at `path`, or `Ok(None)` if it does not exist.
    fn open(&self, path: &Path) -> Result<Option<Self::Reader>, IoError>;
}

/// Bundle source backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBundleSource;

impl BundleSource for FsBundleSource {
    type Reader = LocalFileReader;

    fn open(&self, path: &Path) -> Result<Option<Self::Reader>, IoError> {
        LocalFileReader::open(path)
    }
}
