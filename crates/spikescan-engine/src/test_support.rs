//! Shared fixtures for unit tests.

use spikescan_core::{
    ChannelGraph, DetectionConfig, DetectionParams, Frame, Point, Recording, SliceRecording,
    SpikeRecord, VecSink, Volt,
};

/// 10 kHz parameters with short windows, convenient for synthetic traces.
pub fn test_params() -> DetectionParams {
    DetectionConfig::builder()
        .threshold(20)
        .cutout_ms(1.0, 2.0)
        .evaluation_ms(0.5, 1.0)
        .radii(45.0, 25.0)
        .chunk_size(1_000)
        .build()
        .unwrap()
        .resolve(10_000.0)
        .unwrap()
}

/// Square grid of `side * side` channels on a 20 um pitch.
pub fn grid_graph(side: usize) -> ChannelGraph {
    grid_graph_with_masks(side, &[])
}

pub fn grid_graph_with_masks(side: usize, masked: &[usize]) -> ChannelGraph {
    let positions: Vec<Point> = (0..side * side)
        .map(|i| Point::new((i % side) as f32 * 20.0, (i / side) as f32 * 20.0))
        .collect();
    ChannelGraph::new(&positions, 45.0, 25.0, masked).unwrap()
}

/// Flat recording with single-frame pulses of `amplitude` at the given
/// `(channel, frame)` positions.
pub fn pulse_recording(
    num_channels: usize,
    num_frames: usize,
    pulses: &[(usize, Frame)],
    amplitude: Volt,
) -> SliceRecording {
    let mut data = vec![0 as Volt; num_channels * num_frames];
    for &(channel, frame) in pulses {
        data[frame as usize * num_channels + channel] = amplitude;
    }
    SliceRecording::new(data, num_channels, 10_000.0).unwrap()
}

/// Recording with one segment per inner slice recording. All segments must
/// share the channel count and sampling frequency.
pub struct SegmentedRecording {
    pub segments: Vec<SliceRecording>,
}

impl Recording for SegmentedRecording {
    fn num_channels(&self) -> usize {
        self.segments[0].num_channels()
    }

    fn sampling_frequency(&self) -> f64 {
        self.segments[0].sampling_frequency()
    }

    fn num_segments(&self) -> usize {
        self.segments.len()
    }

    fn num_samples(&self, segment: usize) -> Frame {
        self.segments[segment].num_samples(0)
    }

    fn read_traces(
        &self,
        segment: usize,
        start: Frame,
        end: Frame,
        out: &mut [Volt],
    ) -> spikescan_core::Result<()> {
        self.segments[segment].read_traces(0, start, end, out)
    }
}

/// Runs the full pipeline and returns the emitted spikes.
pub fn detect_all<R: Recording>(
    recording: &R,
    graph: &ChannelGraph,
    params: &DetectionParams,
) -> Vec<SpikeRecord> {
    let mut sink = VecSink::new();
    crate::pipeline::run(recording, graph, params, &mut sink).unwrap();
    sink.spikes
}
