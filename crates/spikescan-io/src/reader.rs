//! Memory-mapped spike-file reader.

use crate::format::RecordLayout;
use crate::{IoError, Result};
use memmap2::Mmap;
use spikescan_core::SpikeRecord;
use std::fs::File;
use std::path::Path;

/// Read-back access to a spike file written with the same [`RecordLayout`].
pub struct SpikeFileReader {
    // None for zero-length files, which cannot be mapped
    mmap: Option<Mmap>,
    layout: RecordLayout,
    num_spikes: usize,
}

impl SpikeFileReader {
    pub fn open<P: AsRef<Path>>(path: P, layout: RecordLayout) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len() as usize;

        if len == 0 {
            return Ok(Self {
                mmap: None,
                layout,
                num_spikes: 0,
            });
        }
        if len % layout.row_size() != 0 {
            return Err(IoError::Format(format!(
                "{}: {} bytes is not a whole number of {}-byte rows",
                path.as_ref().display(),
                len,
                layout.row_size()
            )));
        }

        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            num_spikes: len / layout.row_size(),
            mmap: Some(mmap),
            layout,
        })
    }

    pub fn len(&self) -> usize {
        self.num_spikes
    }

    pub fn is_empty(&self) -> bool {
        self.num_spikes == 0
    }

    pub fn get(&self, index: usize) -> Result<SpikeRecord> {
        if index >= self.num_spikes {
            return Err(IoError::Format(format!(
                "row {} out of range ({} rows)",
                index, self.num_spikes
            )));
        }
        let row_size = self.layout.row_size();
        let bytes = self
            .mmap
            .as_deref()
            .map(|m| &m[index * row_size..(index + 1) * row_size])
            .unwrap_or(&[]);
        self.layout.decode(bytes)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<SpikeRecord>> + '_ {
        (0..self.num_spikes).map(move |i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, [0u8; 17]).unwrap();

        let result = SpikeFileReader::open(&path, RecordLayout::new(false, 0));
        assert!(matches!(result, Err(IoError::Format(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = SpikeFileReader::open("/nonexistent/spikes.bin", RecordLayout::new(false, 0));
        assert!(matches!(result, Err(IoError::Io(_))));
    }

    #[test]
    fn test_get_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.bin");
        std::fs::write(&path, [0u8; 12]).unwrap();

        let reader = SpikeFileReader::open(&path, RecordLayout::new(false, 0)).unwrap();
        assert_eq!(reader.len(), 1);
        assert!(reader.get(0).is_ok());
        assert!(reader.get(1).is_err());
    }
}
