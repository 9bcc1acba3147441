//! Time-ordered spike queue with duplicate suppression.
//!
//! A large spike is picked up by several neighboring electrodes within a few
//! frames of each other. Raw detections therefore sit in a holding queue
//! until they are ripe (no later detection can still belong to the same
//! physical event), at which point the largest detection in the
//! neighborhood is promoted and its smaller satellites are dropped. Two
//! suppression strategies exist: plain amplitude comparison, and a decay
//! model that only drops a distant detection if its amplitude is consistent
//! with passive decay from a closer, larger one.

use crate::localizer;
use crate::Result;
use spikescan_core::{ChannelGraph, DetectionParams, Frame, SpikeRecord, SpikeSink, Volt};

/// A detection waiting for deduplication. Everything needed downstream was
/// captured when the spike was accepted, so entries outlive the chunk they
/// were found in.
#[derive(Debug, Clone)]
pub struct QueuedSpike {
    pub channel: usize,
    pub frame: Frame,
    pub amplitude: i32,
    /// Raw-trace cutout around the peak; empty when shapes are not kept.
    pub shape: Vec<Volt>,
    /// Per centroid center: positive amplitude sums of its inner neighbors.
    pub center_sums: Vec<Vec<(usize, i32)>>,
}

pub struct SpikeQueue<'a> {
    spikes: Vec<QueuedSpike>,
    params: &'a DetectionParams,
    graph: &'a ChannelGraph,
}

impl<'a> SpikeQueue<'a> {
    pub fn new(params: &'a DetectionParams, graph: &'a ChannelGraph) -> Self {
        Self {
            spikes: Vec::new(),
            params,
            graph,
        }
    }

    /// Inserts a new detection, first flushing every queued spike too old to
    /// interact with it.
    pub fn add<S: SpikeSink>(&mut self, spike: QueuedSpike, sink: &mut S) -> Result<()> {
        let horizon = self.params.spike_peak_duration + self.params.noise_duration;
        while let Some(front) = self.spikes.first() {
            if spike.frame <= front.frame + horizon {
                break;
            }
            self.process_front(sink)?;
        }
        self.spikes.push(spike);
        Ok(())
    }

    /// Flushes everything still queued. Call after the last detection.
    pub fn close<S: SpikeSink>(&mut self, sink: &mut S) -> Result<()> {
        while !self.spikes.is_empty() {
            self.process_front(sink)?;
        }
        Ok(())
    }

    /// Resolves one event group: promotes the largest neighbor of the oldest
    /// detection, suppresses its duplicates, localizes and emits it.
    fn process_front<S: SpikeSink>(&mut self, sink: &mut S) -> Result<()> {
        self.promote_max();
        if self.spikes.len() > 1 {
            if self.params.decay_filtering {
                self.filter_decayed();
            } else {
                self.filter_smaller();
            }
        }

        let mut spike = self.spikes.remove(0);
        let position = if self.params.localize {
            localizer::localize(&spike.center_sums, self.graph)
        } else {
            None
        };

        sink.accept(SpikeRecord {
            channel: spike.channel,
            frame: spike.frame,
            amplitude: spike.amplitude,
            position,
            shape: std::mem::take(&mut spike.shape),
        })?;
        Ok(())
    }

    /// Moves the largest in-window neighbor of the front spike to the front.
    /// Amplitude ties go to the later detection.
    fn promote_max(&mut self) {
        let center = self.spikes[0].channel;
        let frame_bound = self.spikes[0].frame + self.params.noise_duration + 1;

        let mut best = 0;
        for i in 1..self.spikes.len() {
            let candidate = &self.spikes[i];
            if candidate.frame < frame_bound
                && self.graph.are_neighbors(candidate.channel, center)
                && self.spikes[best].amplitude <= candidate.amplitude
            {
                best = i;
            }
        }
        if best != 0 {
            let spike = self.spikes.remove(best);
            self.spikes.insert(0, spike);
        }
    }

    /// Drops every queued neighbor of the promoted spike with a smaller
    /// amplitude, regardless of distance-decay plausibility.
    fn filter_smaller(&mut self) {
        let max_channel = self.spikes[0].channel;
        let max_amp = self.spikes[0].amplitude;
        let graph = self.graph;
        self.spikes
            .retain(|s| !(graph.are_neighbors(s.channel, max_channel) && s.amplitude < max_amp));
    }

    /// Decay-aware suppression around the promoted spike.
    fn filter_decayed(&mut self) {
        let max = self.spikes[0].clone();
        let frame_bound = max.frame + self.params.noise_duration + 1;

        // outer neighbors only go if their amplitude fits passive decay
        let mut doomed: Vec<(usize, Frame)> = Vec::new();
        for spike in self.spikes.iter().skip(1) {
            if spike.frame < frame_bound
                && self.graph.are_neighbors(max.channel, spike.channel)
                && !self.graph.are_inner_neighbors(max.channel, spike.channel)
                && self.is_decayed_outer(spike, &max)
            {
                doomed.push((spike.channel, spike.frame));
            }
        }
        self.spikes
            .retain(|s| !doomed.contains(&(s.channel, s.frame)));

        // smaller inner neighbors are always duplicates
        let graph = self.graph;
        self.spikes.retain(|s| {
            !(s.frame < frame_bound
                && graph.are_inner_neighbors(max.channel, s.channel)
                && s.amplitude < max.amplitude)
        });
    }

    /// Whether `outer` looks like the decayed image of `max`.
    ///
    /// If `outer` shares an inner neighborhood with `max`, the spike found
    /// there settles the question. Otherwise the search hops to the queued
    /// spike on the inner neighbor of `outer` closest to `max` and repeats
    /// from there.
    fn is_decayed_outer(&self, outer: &QueuedSpike, max: &QueuedSpike) -> bool {
        let decay = self.params.noise_amp_percent;

        for &inner in self.graph.inner_neighbors(outer.channel) {
            let inner = inner as usize;
            if !self.graph.are_inner_neighbors(max.channel, inner) {
                continue;
            }
            if let Some(bridge) = self.spike_on_channel(inner) {
                if (outer.amplitude as f32) < bridge.amplitude as f32 * decay {
                    // too early to be related means a genuinely new spike
                    return outer.frame >= bridge.frame - self.params.noise_duration;
                }
                // amplitude too large to be a decayed duplicate
                return false;
            }
        }

        let outer_dist = self.graph.channel_distance(outer.channel, max.channel);
        for &inner in self.graph.inner_neighbors(outer.channel) {
            let inner = inner as usize;
            if self.graph.channel_distance(inner, max.channel) >= outer_dist {
                continue;
            }
            let Some(bridge) = self.spike_on_channel(inner) else {
                continue;
            };
            if (outer.amplitude as f32) >= bridge.amplitude as f32 * decay {
                continue;
            }
            if outer.frame < bridge.frame - self.params.noise_duration {
                continue;
            }
            // hop one step closer to the center and re-evaluate
            let bridge = bridge.clone();
            return self.is_decayed_outer(&bridge, max);
        }
        false
    }

    fn spike_on_channel(&self, channel: usize) -> Option<&QueuedSpike> {
        self.spikes.iter().find(|s| s.channel == channel)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.spikes.len()
    }
}
