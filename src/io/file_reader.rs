use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// Local-file implementation of RangeReader.
///
/// The file size is fetched once on open. Reads seek through a shared
/// `&File`, so one reader must not be used from several threads at once.
#[derive(Debug)]
pub struct LocalFileReader {
    file: File,
    size: u64,
    identifier: String,
}

impl LocalFileReader {
    /// Open the file at `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist; any other failure is an
    /// error.
    pub fn open(path: &Path) -> Result<Option<Self>, IoError> {
        let identifier = path.display().to_string();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IoError::Open {
                    path: identifier,
                    message: e.to_string(),
                })
            }
        };

        let size = file
            .metadata()
            .map_err(|e| IoError::Open {
                path: identifier.clone(),
                message: e.to_string(),
            })?
            .len();

        Ok(Some(Self {
            file,
            size,
            identifier,
        }))
    }
}

impl RangeReader for LocalFileReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;

        if len == 0 {
            return Ok(Bytes::new());
        }

        let read_error = |e: std::io::Error| IoError::Read {
            identifier: self.identifier.clone(),
            message: e.to_string(),
        };

        let mut file = &self.file;
        file.seek(SeekFrom::Start(offset)).map_err(read_error)?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).map_err(|e| {
            // The file shrank underneath us
            if e.kind() == ErrorKind::UnexpectedEof {
                IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size: self.size,
                }
            } else {
                read_error(e)
            }
        })?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
