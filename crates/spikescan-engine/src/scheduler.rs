//! Chunk scheduling over a recording segment.

use spikescan_core::Frame;

/// One detection window: frames `[t0, t1)` are processed, with the margins
/// `t_cut` before and `t_cut2` after loaded alongside as context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub t0: Frame,
    pub t1: Frame,
}

/// Partitions `[0, total)` into increments of at most `chunk_size` frames.
///
/// Every increment keeps `t_cut` look-behind and `t_cut2` look-ahead frames
/// available, so a spike peaking near a boundary can always be resolved and
/// cut out in full. The trailing increment shrinks to fit; the final `t_cut2`
/// frames of the segment are never processed because no look-ahead exists
/// for them.
pub struct ChunkScheduler {
    t0: Frame,
    t_inc: Frame,
    total: Frame,
    t_cut2: Frame,
}

impl ChunkScheduler {
    pub fn new(total: Frame, chunk_size: Frame, t_cut: Frame, t_cut2: Frame) -> Self {
        let t_inc = chunk_size.min(total - t_cut - t_cut2);
        if t_inc <= 0 {
            log::warn!(
                "segment of {} frames is shorter than the detection margins ({} + {}); nothing to process",
                total,
                t_cut,
                t_cut2
            );
        }
        Self {
            t0: 0,
            t_inc,
            total,
            t_cut2,
        }
    }
}

impl Iterator for ChunkScheduler {
    type Item = ChunkSpan;

    fn next(&mut self) -> Option<ChunkSpan> {
        if self.t_inc <= 0 || self.t0 + self.t_inc + self.t_cut2 > self.total {
            return None;
        }
        let span = ChunkSpan {
            t0: self.t0,
            t1: self.t0 + self.t_inc,
        };
        self.t0 += self.t_inc;
        if self.t0 < self.total - self.t_cut2 {
            self.t_inc = self.t_inc.min(self.total - self.t_cut2 - self.t0);
        }
        Some(span)
    }
}
