//! Per-channel affine rescaling.
//!
//! The gain and offset are estimated once, from a fixed-seed random sample
//! of the recording, so that every channel spans roughly the same dynamic
//! range before detection: `scale = rescale_value / (hi - lo)` where `lo`
//! and `hi` are symmetric quantiles of the sampled amplitude distribution,
//! and the offset centers the median at zero.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spikescan_core::{CoreError, DetectionParams, Recording, Result, Volt};

/// Frames per sampled chunk during estimation.
const SAMPLE_CHUNK_FRAMES: usize = 10_000;

pub struct Rescaler {
    scale: Vec<f32>,
    offset: Vec<f32>,
}

impl Rescaler {
    /// Estimates gains and offsets from `params.rescale_chunks` random
    /// chunks per segment, seeded by `params.rescale_seed`.
    pub fn estimate<R: Recording + ?Sized>(recording: &R, params: &DetectionParams) -> Result<Self> {
        let num_channels = recording.num_channels();
        let mut samples: Vec<Vec<f32>> = vec![Vec::new(); num_channels];
        let mut rng = StdRng::seed_from_u64(params.rescale_seed);
        let mut buffer = Vec::new();

        for segment in 0..recording.num_segments() {
            let num_frames = recording.num_samples(segment) as usize;
            if num_frames == 0 {
                continue;
            }
            let chunk_frames = SAMPLE_CHUNK_FRAMES.min(num_frames);
            for _ in 0..params.rescale_chunks {
                let start = if num_frames > chunk_frames {
                    rng.gen_range(0..num_frames - chunk_frames)
                } else {
                    0
                };
                buffer.resize(chunk_frames * num_channels, 0);
                recording.read_traces(
                    segment,
                    start as i32,
                    (start + chunk_frames) as i32,
                    &mut buffer,
                )?;
                for frame in buffer.chunks_exact(num_channels) {
                    for (channel, &v) in frame.iter().enumerate() {
                        samples[channel].push(v as f32);
                    }
                }
            }
        }

        if samples[0].is_empty() {
            return Err(CoreError::recording(
                "cannot estimate rescaling from an empty recording",
            ));
        }

        let q = params.rescale_quantile;
        let mut scale = Vec::with_capacity(num_channels);
        let mut offset = Vec::with_capacity(num_channels);
        for (channel, channel_samples) in samples.iter_mut().enumerate() {
            channel_samples.sort_unstable_by(f32::total_cmp);
            let lo = quantile_sorted(channel_samples, q);
            let mid = quantile_sorted(channel_samples, 0.5);
            let hi = quantile_sorted(channel_samples, 1.0 - q);
            if hi > lo {
                let s = params.rescale_value / (hi - lo);
                scale.push(s);
                offset.push(-mid * s);
            } else {
                log::warn!(
                    "channel {} has a flat amplitude distribution; leaving it unscaled",
                    channel
                );
                scale.push(1.0);
                offset.push(0.0);
            }
        }

        Ok(Self { scale, offset })
    }

    /// Applies the transform in place to channel-interleaved samples.
    pub fn apply(&self, data: &mut [Volt]) {
        let num_channels = self.scale.len();
        for frame in data.chunks_exact_mut(num_channels) {
            for (channel, v) in frame.iter_mut().enumerate() {
                *v = (*v as f32 * self.scale[channel] + self.offset[channel]) as Volt;
            }
        }
    }
}

/// Linear-interpolation quantile of an ascending-sorted slice.
fn quantile_sorted(sorted: &[f32], q: f32) -> f32 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q as f64 * (n - 1) as f64;
    let idx = pos.floor() as usize;
    let frac = (pos - idx as f64) as f32;
    if idx + 1 < n {
        sorted[idx] * (1.0 - frac) + sorted[idx + 1] * frac
    } else {
        sorted[n - 1]
    }
}
