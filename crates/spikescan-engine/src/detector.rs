//! Per-channel threshold-crossing state machine.
//!
//! Each channel walks `Quiescent -> Active -> Quiescent`. A threshold
//! crossing opens an excursion; while it is open the peak may still move
//! forward (resetting the window), the area under the early excursion is
//! integrated for the minimum-average-amplitude gate, and the trace is
//! watched for the after-hyperpolarization dip. Exactly `maxsl` frames
//! after the final peak the gates are applied and the excursion either
//! becomes a queued spike or is dropped. The `Active` window doubles as
//! the dead time: no new excursion can open on a channel until the current
//! one resolves, so accepted spikes on one channel are always at least
//! `maxsl` frames apart.
//!
//! All of this is causal in the padded chunk window, and the per-channel
//! state carries across chunk boundaries, so detection results do not
//! depend on the chunking.

use crate::baseline::BaselineTracker;
use crate::chunk::ChunkBuffer;
use crate::queue::{QueuedSpike, SpikeQueue};
use crate::reference::ReferenceTrace;
use crate::scheduler::ChunkSpan;
use crate::Result;
use spikescan_core::config::COMMON_REFERENCE_MIN_CHANNELS;
use spikescan_core::{
    ChannelGraph, CommonReference, DetectionParams, Frame, SpikeSink,
};

/// Fixed-point gain applied to reference-subtracted samples before baseline
/// tracking and thresholding. Gives the integer baseline and deviation
/// estimates sub-sample resolution.
pub const VOLT_SCALE: i32 = 64;

#[derive(Debug, Clone, Copy)]
enum ChannelState {
    Quiescent,
    Active {
        /// Frames since the provisional peak.
        age: Frame,
        /// Peak amplitude, in scaled centered units.
        amplitude: i32,
        /// Integrated amplitude over the early excursion.
        area: i64,
        has_ahp: bool,
    },
}

pub struct Detector<'a> {
    params: &'a DetectionParams,
    graph: &'a ChannelGraph,
    baseline: BaselineTracker,
    states: Vec<ChannelState>,
    queue: SpikeQueue<'a>,
    reference_mode: CommonReference,
    num_spikes: usize,
}

impl<'a> Detector<'a> {
    pub fn new(params: &'a DetectionParams, graph: &'a ChannelGraph) -> Self {
        let num_channels = graph.num_channels();
        // deep enough that localization can read the baseline as it was
        // spike_peak_duration frames before a peak resolved maxsl-1 frames ago
        let history_len = (params.maxsl + params.spike_peak_duration + 1) as usize;

        let mut reference_mode = params.common_reference;
        if reference_mode != CommonReference::None
            && num_channels < COMMON_REFERENCE_MIN_CHANNELS
        {
            log::warn!(
                "only {} channels; common reference needs at least {}, skipping subtraction",
                num_channels,
                COMMON_REFERENCE_MIN_CHANNELS
            );
            reference_mode = CommonReference::None;
        }

        Self {
            params,
            graph,
            baseline: BaselineTracker::new(num_channels, history_len),
            states: vec![ChannelState::Quiescent; num_channels],
            queue: SpikeQueue::new(params, graph),
            reference_mode,
            num_spikes: 0,
        }
    }

    /// Runs detection over the frames `[span.t0, span.t1)` of a loaded
    /// chunk, emitting ripe deduplicated spikes to `sink`.
    pub fn process_chunk<S: SpikeSink>(
        &mut self,
        chunk: &ChunkBuffer,
        span: ChunkSpan,
        sink: &mut S,
    ) -> Result<()> {
        let params = self.params;
        let reference = ReferenceTrace::compute(self.reference_mode, chunk);

        for t in span.t0..span.t1 {
            let frame_data = chunk.frame(t);
            let ref_t = reference.at(t);

            for channel in 0..frame_data.len() {
                let raw = (frame_data[channel] as i32 - ref_t) * VOLT_SCALE;
                let prev_base = self.baseline.baseline(channel);
                let (base, dev) = self.baseline.update(channel, raw - prev_base);
                let volt = raw - base;

                if self.graph.is_masked(channel) {
                    continue;
                }

                match self.states[channel] {
                    ChannelState::Quiescent => {
                        if volt > params.threshold * dev / 2 {
                            self.states[channel] = ChannelState::Active {
                                age: 0,
                                amplitude: volt,
                                area: volt as i64,
                                has_ahp: false,
                            };
                        }
                    }
                    ChannelState::Active {
                        age,
                        amplitude,
                        area,
                        has_ahp,
                    } => {
                        let age = age + 1;
                        if age < params.minsl - 1 {
                            // integrating the early excursion
                            let mut area = area + volt as i64;
                            if amplitude < volt {
                                area += volt as i64;
                                self.states[channel] = ChannelState::Active {
                                    age: 0,
                                    amplitude: volt,
                                    area,
                                    has_ahp: false,
                                };
                            } else {
                                self.states[channel] = ChannelState::Active {
                                    age,
                                    amplitude,
                                    area,
                                    has_ahp,
                                };
                            }
                        } else if age < params.maxsl - 1 {
                            // waiting for repolarization
                            if volt < params.ahpthr * dev {
                                self.states[channel] = ChannelState::Active {
                                    age,
                                    amplitude,
                                    area,
                                    has_ahp: true,
                                };
                            } else if amplitude < volt {
                                self.states[channel] = ChannelState::Active {
                                    age: 0,
                                    amplitude: volt,
                                    area: area + volt as i64,
                                    has_ahp: false,
                                };
                            } else {
                                self.states[channel] = ChannelState::Active {
                                    age,
                                    amplitude,
                                    area,
                                    has_ahp,
                                };
                            }
                        } else {
                            // excursion resolves maxsl - 1 frames after the peak
                            let min_area =
                                params.minsl as i64 * params.maa as i64 * dev as i64;
                            if 2 * area > min_area
                                && (has_ahp || volt < params.ahpthr * dev)
                            {
                                let frame = t - (params.maxsl - 1);
                                let spike =
                                    self.capture(chunk, &reference, channel, frame, amplitude);
                                self.num_spikes += 1;
                                self.queue.add(spike, sink)?;
                            }
                            self.states[channel] = ChannelState::Quiescent;
                        }
                    }
                }
            }

            self.baseline.commit_frame(t);
        }

        Ok(())
    }

    /// Drains the deduplication queue. Call once after the last chunk.
    pub fn finish<S: SpikeSink>(&mut self, sink: &mut S) -> Result<()> {
        self.queue.close(sink)
    }

    /// Spikes accepted by the state machine, before deduplication.
    pub fn num_detected(&self) -> usize {
        self.num_spikes
    }

    /// Snapshots everything a queued spike needs from the current chunk, so
    /// deduplication and localization can run after the window is gone.
    fn capture(
        &self,
        chunk: &ChunkBuffer,
        reference: &ReferenceTrace,
        channel: usize,
        frame: Frame,
        amplitude: i32,
    ) -> QueuedSpike {
        let params = self.params;

        let shape = if params.save_shape {
            (frame - params.cutout_start..=frame + params.cutout_end)
                .map(|t| chunk.get(t, channel))
                .collect()
        } else {
            Vec::new()
        };

        let mut center_sums = Vec::new();
        if params.localize {
            let ref_frame = reference.at(frame);
            let baseline_frame = frame - params.spike_peak_duration;
            let inner = self.graph.inner_neighbors(channel);
            for &center in inner.iter().take(params.num_com_centers) {
                let mut sums = Vec::new();
                for &neighbor in self.graph.inner_neighbors(center as usize) {
                    let neighbor = neighbor as usize;
                    let baseline = self.baseline.baseline_at(baseline_frame, neighbor);
                    let mut sum = 0i32;
                    for t in frame - params.noise_duration..frame + params.noise_duration {
                        let amp =
                            (chunk.get(t, neighbor) as i32 - ref_frame) * VOLT_SCALE - baseline;
                        if amp >= 0 {
                            sum += amp;
                        }
                    }
                    sums.push((neighbor, sum));
                }
                center_sums.push(sums);
            }
            if center_sums.len() < params.num_com_centers {
                log::warn!(
                    "channel {} has only {} inner neighbors for {} centroid centers",
                    channel,
                    inner.len(),
                    params.num_com_centers
                );
            }
        }

        QueuedSpike {
            channel,
            frame,
            amplitude,
            shape,
            center_sums,
        }
    }
}
