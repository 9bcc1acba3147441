//! Incremental spike-file writer.

use crate::format::RecordLayout;
use crate::{IoError, Result};
use spikescan_core::{CoreError, SpikeRecord, SpikeSink};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Streams encoded rows to disk as spikes arrive. The file is truncated on
/// open; a run that finds nothing leaves a zero-length file behind, which is
/// the valid encoding of an empty result.
pub struct SpikeFileWriter {
    writer: BufWriter<File>,
    layout: RecordLayout,
    path: PathBuf,
    row: Vec<u8>,
    num_written: usize,
}

impl SpikeFileWriter {
    pub fn create<P: AsRef<Path>>(path: P, layout: RecordLayout) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        log::debug!(
            "writing spike rows of {} bytes to {}",
            layout.row_size(),
            path.display()
        );
        Ok(Self {
            writer: BufWriter::new(file),
            layout,
            path,
            row: Vec::with_capacity(layout.row_size()),
            num_written: 0,
        })
    }

    pub fn write(&mut self, spike: &SpikeRecord) -> Result<()> {
        if spike.shape.len() != self.layout.cutout_length {
            return Err(IoError::Format(format!(
                "spike with {} shape samples in a file of {}-sample cutouts",
                spike.shape.len(),
                self.layout.cutout_length
            )));
        }
        self.row.clear();
        self.layout.encode(spike, &mut self.row);
        self.writer.write_all(&self.row)?;
        self.num_written += 1;
        Ok(())
    }

    /// Flushes buffered rows and returns the number written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        log::info!(
            "wrote {} spikes to {}",
            self.num_written,
            self.path.display()
        );
        Ok(self.num_written)
    }

    pub fn num_written(&self) -> usize {
        self.num_written
    }
}

impl SpikeSink for SpikeFileWriter {
    fn accept(&mut self, spike: SpikeRecord) -> spikescan_core::Result<()> {
        self.write(&spike).map_err(|e| match e {
            IoError::Io(io) => CoreError::Io(io),
            other => CoreError::recording(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::SpikeFileReader;
    use spikescan_core::Point;

    fn spike(channel: usize, frame: i32) -> SpikeRecord {
        SpikeRecord {
            channel,
            frame,
            amplitude: 1_000,
            position: Some(Point::new(1.0, 2.0)),
            shape: vec![1, -2, 3],
        }
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spikes.bin");
        let layout = RecordLayout::new(true, 3);

        let mut writer = SpikeFileWriter::create(&path, layout).unwrap();
        writer.write(&spike(1, 10)).unwrap();
        writer.write(&spike(2, 20)).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        let reader = SpikeFileReader::open(&path, layout).unwrap();
        let spikes: Vec<_> = reader.iter().collect::<Result<_>>().unwrap();
        assert_eq!(spikes.len(), 2);
        assert_eq!(spikes[0].channel, 1);
        assert_eq!(spikes[1].frame, 20);
        assert_eq!(spikes[1].shape, vec![1, -2, 3]);
    }

    #[test]
    fn test_empty_run_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spikes.bin");
        let layout = RecordLayout::new(true, 3);

        let writer = SpikeFileWriter::create(&path, layout).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        let reader = SpikeFileReader::open(&path, layout).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_rejects_mismatched_shape_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spikes.bin");
        let mut writer = SpikeFileWriter::create(&path, RecordLayout::new(true, 5)).unwrap();
        assert!(writer.write(&spike(0, 0)).is_err());
    }
}
