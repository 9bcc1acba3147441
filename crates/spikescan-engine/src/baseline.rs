//! Per-channel running baseline and noise deviation.
//!
//! Both estimates are integer random walks driven by the sign and size of
//! each centered sample: the baseline chases the signal asymmetrically
//! (depolarizations pull it up faster than hyperpolarizations pull it down),
//! and the deviation grows while samples sit inside the plausible-noise band
//! and shrinks otherwise. A short history of baselines is kept so that
//! localization can read the value as it was before a spike began.

use spikescan_core::Frame;

/// Timescale of baseline updates; the increment is `deviation / TAU_BASE`.
const TAU_BASE: i32 = 4;
/// Floor for the deviation estimate.
const MIN_DEV: i32 = 200;
/// Deviation at the first frame.
const INIT_DEV: i32 = 400;
/// Baseline at the first frame.
const INIT_BASE: i32 = 0;
/// Per-frame deviation step.
const DEV_CHANGE: i32 = 1;

pub struct BaselineTracker {
    baseline: Vec<i32>,
    deviation: Vec<i32>,
    history: Vec<i32>,
    history_len: usize,
    num_channels: usize,
}

impl BaselineTracker {
    /// `history_len` is the number of past frames whose baselines stay
    /// readable through [`baseline_at`](Self::baseline_at).
    pub fn new(num_channels: usize, history_len: usize) -> Self {
        Self {
            baseline: vec![INIT_BASE; num_channels],
            deviation: vec![INIT_DEV; num_channels],
            history: vec![INIT_BASE; history_len * num_channels],
            history_len,
            num_channels,
        }
    }

    /// Advances one channel by one frame. `centered` is the sample with the
    /// common reference and the previous baseline already subtracted.
    /// Returns the updated `(baseline, deviation)`.
    #[inline]
    pub fn update(&mut self, channel: usize, centered: i32) -> (i32, i32) {
        let dev = self.deviation[channel];

        let delta_base = if centered > dev {
            dev / TAU_BASE
        } else if centered < -dev {
            -dev / (TAU_BASE * 2)
        } else {
            0
        };
        let base = self.baseline[channel] + delta_base;
        self.baseline[channel] = base;

        let delta_dev = if centered > dev && centered < 5 * dev {
            DEV_CHANGE
        } else if (centered > 0 && centered <= dev) || centered > 6 * dev {
            -DEV_CHANGE
        } else {
            0
        };
        let dev = (dev + delta_dev).max(MIN_DEV);
        self.deviation[channel] = dev;

        (base, dev)
    }

    /// Records the current baselines as belonging to `frame`. Call once per
    /// frame after all channels have been updated.
    pub fn commit_frame(&mut self, frame: Frame) {
        let slot = (frame.rem_euclid(self.history_len as Frame)) as usize * self.num_channels;
        self.history[slot..slot + self.num_channels].copy_from_slice(&self.baseline);
    }

    /// Baseline of `channel` as committed at `frame`. Frames before the
    /// first commit read as the initial baseline.
    pub fn baseline_at(&self, frame: Frame, channel: usize) -> i32 {
        let slot = (frame.rem_euclid(self.history_len as Frame)) as usize * self.num_channels;
        self.history[slot + channel]
    }

    pub fn baseline(&self, channel: usize) -> i32 {
        self.baseline[channel]
    }

    pub fn deviation(&self, channel: usize) -> i32 {
        self.deviation[channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_signal_leaves_baseline_alone() {
        let mut tracker = BaselineTracker::new(1, 4);
        for _ in 0..400 {
            tracker.update(0, 50);
        }
        assert_eq!(tracker.baseline(0), 0);
        // small positive samples shrink the deviation down to its floor
        assert_eq!(tracker.deviation(0), MIN_DEV);
    }

    #[test]
    fn test_baseline_chases_positive_excursion() {
        let mut tracker = BaselineTracker::new(1, 4);
        let before = tracker.baseline(0);
        tracker.update(0, 2_000);
        assert_eq!(tracker.baseline(0), before + INIT_DEV / TAU_BASE);
    }

    #[test]
    fn test_negative_excursion_pulls_half_as_fast() {
        let mut tracker = BaselineTracker::new(1, 4);
        tracker.update(0, -2_000);
        assert_eq!(tracker.baseline(0), -INIT_DEV / (TAU_BASE * 2));
    }

    #[test]
    fn test_deviation_tracks_noise_band() {
        let mut tracker = BaselineTracker::new(1, 4);
        // samples just above the deviation widen the band
        let dev0 = tracker.deviation(0);
        tracker.update(0, dev0 + 1);
        assert_eq!(tracker.deviation(0), dev0 + 1);
        // far outliers narrow it instead
        let dev1 = tracker.deviation(0);
        tracker.update(0, 7 * dev1);
        assert_eq!(tracker.deviation(0), dev1 - 1);
    }

    #[test]
    fn test_deviation_never_below_floor() {
        let mut tracker = BaselineTracker::new(1, 4);
        for _ in 0..1_000 {
            tracker.update(0, 1);
        }
        assert_eq!(tracker.deviation(0), MIN_DEV);
    }

    #[test]
    fn test_history_readback() {
        let mut tracker = BaselineTracker::new(2, 8);
        for frame in 0..5 {
            tracker.update(0, 2_000);
            tracker.update(1, 0);
            tracker.commit_frame(frame);
        }
        // channel 1 never moved
        assert_eq!(tracker.baseline_at(3, 1), 0);
        // channel 0 at frame 3 differs from its current value
        assert!(tracker.baseline_at(3, 0) < tracker.baseline(0));
        // frames never committed still read initial values
        assert_eq!(tracker.baseline_at(-2, 0), INIT_BASE);
    }
}
