//! Recording-source abstraction.
//!
//! The detection engine consumes raw traces through the [`Recording`] trait.
//! Implementations only ever see clamped, in-range requests; zero-padding of
//! out-of-range frames is the caller's job, done once in [`read_padded`].

use crate::errors::{CoreError, Result};
use crate::types::{Frame, Volt};

/// A multichannel raw recording, possibly split into segments.
///
/// Traces are channel-interleaved: sample `(frame, channel)` lives at
/// `(frame - start) * num_channels + channel` of the output buffer.
pub trait Recording {
    fn num_channels(&self) -> usize;

    fn sampling_frequency(&self) -> f64;

    fn num_segments(&self) -> usize {
        1
    }

    /// Number of frames in one segment.
    fn num_samples(&self, segment: usize) -> Frame;

    /// Copies traces for `[start, end)` into `out`.
    ///
    /// The range must be within the recording; `out` must hold exactly
    /// `(end - start) * num_channels` samples. A source that cannot deliver
    /// the full range must fail rather than return partial data.
    fn read_traces(&self, segment: usize, start: Frame, end: Frame, out: &mut [Volt])
        -> Result<()>;
}

/// Reads `[start, end)` with zero-padding outside the valid frame range.
///
/// Negative `start` and `end` beyond the segment length are not errors: the
/// out-of-range portion of `out` is zero-filled and only the clamped middle
/// is fetched from the source.
pub fn read_padded<R: Recording + ?Sized>(
    recording: &R,
    segment: usize,
    start: Frame,
    end: Frame,
    out: &mut [Volt],
) -> Result<()> {
    let num_channels = recording.num_channels();
    let total = recording.num_samples(segment);
    debug_assert_eq!(out.len(), (end - start) as usize * num_channels);

    let valid_start = start.max(0);
    let valid_end = end.min(total);

    out.fill(0);
    if valid_start >= valid_end {
        return Ok(());
    }

    let offset = (valid_start - start) as usize * num_channels;
    let len = (valid_end - valid_start) as usize * num_channels;
    recording.read_traces(segment, valid_start, valid_end, &mut out[offset..offset + len])
}

/// In-memory recording backed by one channel-interleaved sample buffer.
#[derive(Debug, Clone)]
pub struct SliceRecording {
    data: Vec<Volt>,
    num_channels: usize,
    sampling_frequency: f64,
}

impl SliceRecording {
    pub fn new(data: Vec<Volt>, num_channels: usize, sampling_frequency: f64) -> Result<Self> {
        if num_channels == 0 {
            return Err(CoreError::recording("recording has no channels"));
        }
        if data.len() % num_channels != 0 {
            return Err(CoreError::recording(format!(
                "buffer of {} samples is not divisible by {} channels",
                data.len(),
                num_channels
            )));
        }
        Ok(Self {
            data,
            num_channels,
            sampling_frequency,
        })
    }
}

impl Recording for SliceRecording {
    fn num_channels(&self) -> usize {
        self.num_channels
    }

    fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    fn num_samples(&self, _segment: usize) -> Frame {
        (self.data.len() / self.num_channels) as Frame
    }

    fn read_traces(
        &self,
        segment: usize,
        start: Frame,
        end: Frame,
        out: &mut [Volt],
    ) -> Result<()> {
        if segment != 0 {
            return Err(CoreError::recording(format!(
                "segment {} out of range (1 segment)",
                segment
            )));
        }
        if start < 0 || end < start || end > self.num_samples(0) {
            return Err(CoreError::recording(format!(
                "frame range [{}, {}) outside recording of {} frames",
                start,
                end,
                self.num_samples(0)
            )));
        }
        let lo = start as usize * self.num_channels;
        let hi = end as usize * self.num_channels;
        out.copy_from_slice(&self.data[lo..hi]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_recording() -> SliceRecording {
        // 2 channels, 4 frames: ch0 = frame, ch1 = 10 + frame
        let data = vec![0, 10, 1, 11, 2, 12, 3, 13];
        SliceRecording::new(data, 2, 1000.0).unwrap()
    }

    #[test]
    fn test_read_traces_in_range() {
        let rec = ramp_recording();
        let mut out = vec![0; 4];
        rec.read_traces(0, 1, 3, &mut out).unwrap();
        assert_eq!(out, vec![1, 11, 2, 12]);
    }

    #[test]
    fn test_read_traces_out_of_range_is_error() {
        let rec = ramp_recording();
        let mut out = vec![0; 4];
        assert!(rec.read_traces(0, 3, 5, &mut out).is_err());
        assert!(rec.read_traces(0, -1, 1, &mut out).is_err());
    }

    #[test]
    fn test_read_padded_zero_fills() {
        let rec = ramp_recording();
        // [-2, 6): two padded frames on each side
        let mut out = vec![99; 8 * 2];
        read_padded(&rec, 0, -2, 6, &mut out).unwrap();
        assert_eq!(&out[..4], &[0, 0, 0, 0]);
        assert_eq!(&out[4..12], &[0, 10, 1, 11, 2, 12, 3, 13]);
        assert_eq!(&out[12..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_read_padded_fully_outside() {
        let rec = ramp_recording();
        let mut out = vec![7; 2 * 2];
        read_padded(&rec, 0, -4, -2, &mut out).unwrap();
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_misaligned_buffer_rejected() {
        assert!(SliceRecording::new(vec![1, 2, 3], 2, 1000.0).is_err());
    }
}
