//! End-to-end detection runs.

use crate::chunk::ChunkBuffer;
use crate::detector::Detector;
use crate::rescale::Rescaler;
use crate::scheduler::ChunkScheduler;
use crate::Result;
use spikescan_core::{ChannelGraph, DetectionParams, Recording, SpikeSink};

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectionSummary {
    /// Spikes emitted after deduplication.
    pub num_spikes: usize,
    /// Raw threshold-machine acceptances, before deduplication.
    pub num_detected: usize,
    /// Frames actually processed, summed over segments.
    pub frames_processed: i64,
}

/// Runs detection over every segment of `recording`, emitting spikes to
/// `sink` as they ripen. Detector state is reset between segments; frames
/// in the emitted records are segment-local.
pub fn run<R, S>(
    recording: &R,
    graph: &ChannelGraph,
    params: &DetectionParams,
    sink: &mut S,
) -> Result<DetectionSummary>
where
    R: Recording + ?Sized,
    S: SpikeSink,
{
    let rescaler = if params.rescale {
        Some(Rescaler::estimate(recording, params)?)
    } else {
        None
    };

    let mut counting = CountingSink { inner: sink, count: 0 };
    let mut num_detected = 0;
    let mut frames_processed = 0i64;

    for segment in 0..recording.num_segments() {
        let mut total = recording.num_samples(segment);
        if let Some(max_frames) = params.max_frames {
            total = total.min(max_frames);
        }

        let mut detector = Detector::new(params, graph);
        let mut chunk = ChunkBuffer::new(recording.num_channels());

        for span in ChunkScheduler::new(total, params.chunk_size, params.t_cut(), params.t_cut2())
        {
            log::debug!(
                "segment {}: frames {}..{} of {}",
                segment,
                span.t0,
                span.t1,
                total
            );
            chunk.load(recording, segment, span.t0, span.t1, params.t_cut(), params.t_cut2())?;
            if let Some(rescaler) = &rescaler {
                rescaler.apply(chunk.data_mut());
            }
            detector.process_chunk(&chunk, span, &mut counting)?;
            frames_processed += (span.t1 - span.t0) as i64;
        }

        detector.finish(&mut counting)?;
        num_detected += detector.num_detected();
    }

    let summary = DetectionSummary {
        num_spikes: counting.count,
        num_detected,
        frames_processed,
    };
    log::info!(
        "detection finished: {} spikes from {} raw detections over {} frames",
        summary.num_spikes,
        summary.num_detected,
        summary.frames_processed
    );
    Ok(summary)
}

struct CountingSink<'a, S: SpikeSink> {
    inner: &'a mut S,
    count: usize,
}

impl<S: SpikeSink> SpikeSink for CountingSink<'_, S> {
    fn accept(&mut self, spike: spikescan_core::SpikeRecord) -> spikescan_core::Result<()> {
        self.count += 1;
        self.inner.accept(spike)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{grid_graph, pulse_recording, test_params, SegmentedRecording};
    use spikescan_core::VecSink;

    #[test]
    fn test_run_reports_summary() {
        let params = test_params();
        let graph = grid_graph(4);
        let rec = pulse_recording(16, 5_000, &[(5, 1_000), (10, 3_000)], 500);

        let mut sink = VecSink::new();
        let summary = run(&rec, &graph, &params, &mut sink).unwrap();
        assert_eq!(summary.num_spikes, 2);
        assert_eq!(summary.num_spikes, sink.spikes.len());
        assert_eq!(
            summary.frames_processed,
            (5_000 - params.t_cut2()) as i64
        );
    }

    #[test]
    fn test_max_frames_truncates() {
        let mut params = test_params();
        let graph = grid_graph(4);
        let rec = pulse_recording(16, 5_000, &[(5, 1_000), (10, 3_000)], 500);

        params.max_frames = Some(2_000);
        let mut sink = VecSink::new();
        let summary = run(&rec, &graph, &params, &mut sink).unwrap();
        // only the first pulse falls inside the truncated range
        assert_eq!(summary.num_spikes, 1);
        assert_eq!(sink.spikes[0].channel, 5);
    }

    #[test]
    fn test_segments_run_independently() {
        let params = test_params();
        let graph = grid_graph(4);
        // a pulse at the very end of segment 0 must not suppress an
        // identical pulse at the start of segment 1, and the emitted frames
        // stay segment-local
        let rec = SegmentedRecording {
            segments: vec![
                pulse_recording(16, 2_000, &[(5, 1_960)], 500),
                pulse_recording(16, 2_000, &[(5, 40)], 500),
            ],
        };

        let mut sink = VecSink::new();
        let summary = run(&rec, &graph, &params, &mut sink).unwrap();
        assert_eq!(summary.num_spikes, 2);
        assert_eq!(
            summary.frames_processed,
            2 * (2_000 - params.t_cut2()) as i64
        );
        assert!((sink.spikes[0].frame - 1_960).abs() <= 2);
        assert!((sink.spikes[1].frame - 40).abs() <= 2);
    }

    #[test]
    fn test_zero_input_zero_spikes() {
        let params = test_params();
        let graph = grid_graph(4);
        let rec = pulse_recording(16, 5_000, &[], 0);

        let mut sink = VecSink::new();
        let summary = run(&rec, &graph, &params, &mut sink).unwrap();
        assert_eq!(summary.num_spikes, 0);
        assert!(sink.spikes.is_empty());
    }
}
