use bytes::Bytes;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// RangeReader over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Bytes,
    identifier: String,
}

impl MemoryReader {
    pub fn new(data: impl Into<Bytes>, identifier: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            identifier: identifier.into(),
        }
    }
}

impl RangeReader for MemoryReader {
    fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.data.len() as u64)?;
        let start = offset as usize;
        Ok(self.data.slice(start..start + len))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
