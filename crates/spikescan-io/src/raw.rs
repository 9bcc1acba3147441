//! Raw binary recordings as a trace source.

use crate::{IoError, Result};
use memmap2::Mmap;
use spikescan_core::{CoreError, Frame, Recording, Volt};
use std::fs::File;
use std::path::Path;

/// A flat acquisition dump: little-endian `i16` samples, channel-interleaved,
/// single segment, memory-mapped for random chunk access.
pub struct RawRecording {
    mmap: Mmap,
    num_channels: usize,
    num_frames: Frame,
    sampling_frequency: f64,
}

impl RawRecording {
    pub fn open<P: AsRef<Path>>(
        path: P,
        num_channels: usize,
        sampling_frequency: f64,
    ) -> Result<Self> {
        if num_channels == 0 {
            return Err(IoError::Format("recording needs at least 1 channel".into()));
        }
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Err(IoError::Format(format!(
                "{}: empty recording",
                path.as_ref().display()
            )));
        }
        let frame_bytes = num_channels * std::mem::size_of::<Volt>();
        if len % frame_bytes != 0 {
            return Err(IoError::Format(format!(
                "{}: {} bytes is not a whole number of {}-channel frames",
                path.as_ref().display(),
                len,
                num_channels
            )));
        }

        let mmap = unsafe { Mmap::map(&file)? };
        let num_frames = (len / frame_bytes) as Frame;
        log::info!(
            "mapped {}: {} channels, {} frames at {} Hz",
            path.as_ref().display(),
            num_channels,
            num_frames,
            sampling_frequency
        );
        Ok(Self {
            mmap,
            num_channels,
            num_frames,
            sampling_frequency,
        })
    }
}

impl Recording for RawRecording {
    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    fn num_samples(&self, _segment: usize) -> Frame {
        self.num_frames
    }

    fn read_traces(
        &self,
        _segment: usize,
        start: Frame,
        end: Frame,
        out: &mut [Volt],
    ) -> spikescan_core::Result<()> {
        if start < 0 || end > self.num_frames || start > end {
            return Err(CoreError::recording(format!(
                "trace request [{}, {}) outside recording of {} frames",
                start, end, self.num_frames
            )));
        }
        let expected = (end - start) as usize * self.num_channels;
        if out.len() != expected {
            return Err(CoreError::recording(format!(
                "output buffer holds {} samples, request needs {}",
                out.len(),
                expected
            )));
        }

        let byte_start = start as usize * self.num_channels * 2;
        let bytes = &self.mmap[byte_start..byte_start + expected * 2];
        for (sample, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
            *sample = Volt::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_samples(path: &Path, samples: &[Volt]) {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for v in samples {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_open_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");
        write_samples(&path, &[1, 2, 3, 4, 5, 6]);

        let rec = RawRecording::open(&path, 2, 30_000.0).unwrap();
        assert_eq!(rec.num_channels(), 2);
        assert_eq!(rec.num_samples(0), 3);

        let mut out = vec![0; 4];
        rec.read_traces(0, 1, 3, &mut out).unwrap();
        assert_eq!(out, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_rejects_ragged_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();
        assert!(RawRecording::open(&path, 3, 30_000.0).is_err());
    }

    #[test]
    fn test_out_of_range_read_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.bin");
        write_samples(&path, &[0; 8]);

        let rec = RawRecording::open(&path, 2, 30_000.0).unwrap();
        let mut out = vec![0; 2];
        assert!(rec.read_traces(0, 3, 4, &mut out).is_ok());
        assert!(rec.read_traces(0, 4, 5, &mut out).is_err());
    }
}
