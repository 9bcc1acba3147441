//! Padded chunk buffer addressed by absolute frame.

use spikescan_core::{read_padded, Frame, Recording, Result, Volt};

/// One scheduler window of channel-interleaved samples, covering the frame
/// range `[t0 - t_cut, t1 + t_cut2)`. Frames outside the recording are
/// zero-filled. The buffer is reused across iterations.
pub struct ChunkBuffer {
    data: Vec<Volt>,
    num_channels: usize,
    start: Frame,
    num_frames: Frame,
}

impl ChunkBuffer {
    pub fn new(num_channels: usize) -> Self {
        Self {
            data: Vec::new(),
            num_channels,
            start: 0,
            num_frames: 0,
        }
    }

    /// Loads the window `[t0 - t_cut, t1 + t_cut2)` from `recording`.
    pub fn load<R: Recording + ?Sized>(
        &mut self,
        recording: &R,
        segment: usize,
        t0: Frame,
        t1: Frame,
        t_cut: Frame,
        t_cut2: Frame,
    ) -> Result<()> {
        self.start = t0 - t_cut;
        self.num_frames = (t1 + t_cut2) - self.start;
        self.data
            .resize(self.num_frames as usize * self.num_channels, 0);
        read_padded(recording, segment, self.start, t1 + t_cut2, &mut self.data)
    }

    pub fn start(&self) -> Frame {
        self.start
    }

    pub fn end(&self) -> Frame {
        self.start + self.num_frames
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// All channels at an absolute frame.
    pub fn frame(&self, frame: Frame) -> &[Volt] {
        debug_assert!(frame >= self.start && frame < self.end());
        let row = (frame - self.start) as usize * self.num_channels;
        &self.data[row..row + self.num_channels]
    }

    pub fn get(&self, frame: Frame, channel: usize) -> Volt {
        self.frame(frame)[channel]
    }

    /// Mutable access to the raw interleaved samples, for preprocessing.
    pub fn data_mut(&mut self) -> &mut [Volt] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikescan_core::SliceRecording;

    fn ramp_recording(num_channels: usize, num_frames: usize) -> SliceRecording {
        let data = (0..num_frames * num_channels)
            .map(|i| i as Volt)
            .collect::<Vec<_>>();
        SliceRecording::new(data, num_channels, 10_000.0).unwrap()
    }

    #[test]
    fn test_load_pads_outside_recording() {
        let rec = ramp_recording(2, 10);
        let mut chunk = ChunkBuffer::new(2);
        chunk.load(&rec, 0, 0, 8, 3, 4).unwrap();

        assert_eq!(chunk.start(), -3);
        assert_eq!(chunk.end(), 12);
        assert_eq!(chunk.frame(-1), &[0, 0]);
        assert_eq!(chunk.frame(0), &[0, 1]);
        assert_eq!(chunk.get(5, 1), 11);
        assert_eq!(chunk.frame(11), &[0, 0]);
    }

    #[test]
    fn test_reload_reuses_buffer() {
        let rec = ramp_recording(2, 100);
        let mut chunk = ChunkBuffer::new(2);
        chunk.load(&rec, 0, 0, 50, 5, 5).unwrap();
        chunk.load(&rec, 0, 50, 100, 5, 5).unwrap();
        assert_eq!(chunk.start(), 45);
        assert_eq!(chunk.get(60, 0), 120);
    }
}
