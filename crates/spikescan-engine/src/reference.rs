//! Per-frame common reference across channels.

use crate::chunk::ChunkBuffer;
use spikescan_core::{CommonReference, Frame};

/// Reference trace for one chunk window, addressed by absolute frame.
///
/// The value at a frame depends only on the samples of that frame, so
/// recomputing it in overlapping windows yields identical results and
/// chunking stays transparent.
pub struct ReferenceTrace {
    values: Vec<i32>,
    start: Frame,
}

impl ReferenceTrace {
    /// Computes the reference over the whole padded window of `chunk`.
    /// `CommonReference::None` produces all zeros.
    pub fn compute(mode: CommonReference, chunk: &ChunkBuffer) -> Self {
        let start = chunk.start();
        let len = match mode {
            CommonReference::None => 0,
            _ => (chunk.end() - start) as usize,
        };
        let mut values = vec![0i32; len];

        match mode {
            CommonReference::None => {}
            CommonReference::Average => {
                let n = chunk.num_channels() as i64;
                for (i, value) in values.iter_mut().enumerate() {
                    let frame = start + i as Frame;
                    let sum: i64 = chunk.frame(frame).iter().map(|&v| v as i64).sum();
                    *value = (sum / n) as i32;
                }
            }
            CommonReference::Median => {
                let mut scratch = vec![0i16; chunk.num_channels()];
                for (i, value) in values.iter_mut().enumerate() {
                    let frame = start + i as Frame;
                    scratch.copy_from_slice(chunk.frame(frame));
                    *value = median(&mut scratch);
                }
            }
        }

        Self { values, start }
    }

    #[inline]
    pub fn at(&self, frame: Frame) -> i32 {
        if self.values.is_empty() {
            return 0;
        }
        self.values[(frame - self.start) as usize]
    }
}

fn median(scratch: &mut [i16]) -> i32 {
    let len = scratch.len();
    let mid = (len - 1) / 2;
    let (_, lower_mid, upper) = scratch.select_nth_unstable(mid);
    let lower_mid = *lower_mid as i32;
    if len % 2 == 0 {
        // select_nth leaves the other middle element as the minimum of the
        // upper partition
        let upper_mid = upper.iter().copied().min().map(i32::from).unwrap_or(lower_mid);
        (lower_mid + upper_mid) / 2
    } else {
        lower_mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikescan_core::{SliceRecording, Volt};

    fn chunk_from(data: Vec<Volt>, num_channels: usize, frames: Frame) -> ChunkBuffer {
        let rec = SliceRecording::new(data, num_channels, 10_000.0).unwrap();
        let mut chunk = ChunkBuffer::new(num_channels);
        chunk.load(&rec, 0, 0, frames, 0, 0).unwrap();
        chunk
    }

    #[test]
    fn test_average_reference() {
        let chunk = chunk_from(vec![10, 20, 30, 40, -10, -20, -30, -40], 4, 2);
        let reference = ReferenceTrace::compute(CommonReference::Average, &chunk);
        assert_eq!(reference.at(0), 25);
        assert_eq!(reference.at(1), -25);
    }

    #[test]
    fn test_median_reference_odd_and_even() {
        let chunk = chunk_from(vec![1, 100, 3, 7, 9], 5, 1);
        let reference = ReferenceTrace::compute(CommonReference::Median, &chunk);
        assert_eq!(reference.at(0), 7);

        let chunk = chunk_from(vec![1, 100, 3, 7], 4, 1);
        let reference = ReferenceTrace::compute(CommonReference::Median, &chunk);
        assert_eq!(reference.at(0), 5);
    }

    #[test]
    fn test_none_reference_is_zero() {
        let chunk = chunk_from(vec![5, 5, 5, 5], 2, 2);
        let reference = ReferenceTrace::compute(CommonReference::None, &chunk);
        assert_eq!(reference.at(0), 0);
        assert_eq!(reference.at(1), 0);
    }
}
