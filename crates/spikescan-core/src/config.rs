//! Detection configuration and validation.
//!
//! User-facing parameters are expressed in milliseconds and physical units;
//! [`DetectionConfig::resolve`] converts them once, against the recording's
//! sampling frequency, into the all-frames [`DetectionParams`] consumed by
//! the engine. Frames are the only unit of time used past this point.

use crate::errors::{CoreError, Result};
use crate::types::Frame;
use serde::{Deserialize, Serialize};

/// Common-reference subtraction mode applied before thresholding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommonReference {
    /// No reference subtraction
    None,
    /// Per-frame median across channels
    Median,
    /// Per-frame mean across channels
    Average,
}

/// Minimum channel count for a stable common-reference estimate. Below this
/// the subtraction is skipped with a warning, which materially changes
/// detection sensitivity on small arrays.
pub const COMMON_REFERENCE_MIN_CHANNELS: usize = 20;

/// User-facing detection configuration.
///
/// All fields have defaults matching the reference parameterization; load
/// from JSON or build with [`DetectionConfig::builder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Detection threshold in units of the per-channel running noise deviation
    #[serde(default = "default_threshold")]
    pub threshold: i32,

    /// Minimum average amplitude over the evaluation window (same units)
    #[serde(default)]
    pub maa: i32,

    /// After-hyperpolarization threshold; the trace must dip below
    /// `ahpthr * deviation` after the peak for the event to be accepted
    #[serde(default)]
    pub ahpthr: i32,

    /// Enable decay-based duplicate filtering across neighboring channels
    #[serde(default)]
    pub decay_filtering: bool,

    /// Milliseconds of waveform kept before the peak
    #[serde(default = "default_left_cutout_ms")]
    pub left_cutout_ms: f64,

    /// Milliseconds of waveform kept after the peak
    #[serde(default = "default_right_cutout_ms")]
    pub right_cutout_ms: f64,

    /// Amplitude-evaluation window in milliseconds (resolved to `minsl`)
    #[serde(default = "default_amp_evaluation_ms")]
    pub amp_evaluation_ms: f64,

    /// Post-peak evaluation / dead-time window in milliseconds (resolved to
    /// `maxsl`)
    #[serde(default = "default_spk_evaluation_ms")]
    pub spk_evaluation_ms: f64,

    /// Time for a spike amplitude to fully decay, in milliseconds (resolved
    /// to `spike_peak_duration`; governs queue ripening)
    #[serde(default = "default_event_length_ms")]
    pub event_length_ms: f64,

    /// Peak jitter between duplicate detections on neighboring channels, in
    /// milliseconds (resolved to `noise_duration`)
    #[serde(default = "default_peak_jitter_ms")]
    pub peak_jitter_ms: f64,

    /// Amplitude fraction used by decay filtering to recognize a decayed
    /// duplicate on a neighboring channel
    #[serde(default = "default_noise_amp_percent")]
    pub noise_amp_percent: f32,

    /// Radius defining the neighbor set of each channel
    #[serde(default = "default_neighbor_radius")]
    pub neighbor_radius: f32,

    /// Tighter radius used for centroiding and duplicate merging
    #[serde(default = "default_inner_radius")]
    pub inner_radius: f32,

    /// Number of centroid refinement centers used by the localizer
    #[serde(default = "default_num_com_centers")]
    pub num_com_centers: usize,

    /// Estimate a spatial origin for each spike
    #[serde(default = "default_true")]
    pub localize: bool,

    /// Persist waveform cutouts in the output records
    #[serde(default = "default_true")]
    pub save_shape: bool,

    /// Frames per scheduler step, excluding padding
    #[serde(default = "default_chunk_size")]
    pub chunk_size: Frame,

    /// Enable per-channel affine rescaling before detection
    #[serde(default)]
    pub rescale: bool,

    /// Target dynamic range of the rescaled signal
    #[serde(default = "default_rescale_value")]
    pub rescale_value: f32,

    /// Quantile used for the rescale range estimate
    #[serde(default = "default_rescale_quantile")]
    pub rescale_quantile: f32,

    /// Random chunks sampled per segment for the rescale estimate
    #[serde(default = "default_rescale_chunks")]
    pub rescale_chunks: usize,

    /// RNG seed for the rescale chunk sample; fixed so reruns are
    /// byte-identical
    #[serde(default)]
    pub rescale_seed: u64,

    /// Common-reference subtraction mode
    #[serde(default = "default_common_reference")]
    pub common_reference: CommonReference,

    /// Channels excluded from triggering
    #[serde(default)]
    pub masked_channels: Vec<usize>,

    /// Stop after this many frames; partial results are valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<Frame>,
}

fn default_threshold() -> i32 {
    20
}

fn default_left_cutout_ms() -> f64 {
    1.0
}

fn default_right_cutout_ms() -> f64 {
    2.2
}

fn default_amp_evaluation_ms() -> f64 {
    0.4
}

fn default_spk_evaluation_ms() -> f64 {
    1.7
}

fn default_event_length_ms() -> f64 {
    0.5
}

fn default_peak_jitter_ms() -> f64 {
    0.2
}

fn default_noise_amp_percent() -> f32 {
    1.0
}

fn default_neighbor_radius() -> f32 {
    60.0
}

fn default_inner_radius() -> f32 {
    60.0
}

fn default_num_com_centers() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> Frame {
    50_000
}

fn default_rescale_value() -> f32 {
    20.0
}

fn default_rescale_quantile() -> f32 {
    0.05
}

fn default_rescale_chunks() -> usize {
    20
}

fn default_common_reference() -> CommonReference {
    CommonReference::Average
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            maa: 0,
            ahpthr: 0,
            decay_filtering: false,
            left_cutout_ms: default_left_cutout_ms(),
            right_cutout_ms: default_right_cutout_ms(),
            amp_evaluation_ms: default_amp_evaluation_ms(),
            spk_evaluation_ms: default_spk_evaluation_ms(),
            event_length_ms: default_event_length_ms(),
            peak_jitter_ms: default_peak_jitter_ms(),
            noise_amp_percent: default_noise_amp_percent(),
            neighbor_radius: default_neighbor_radius(),
            inner_radius: default_inner_radius(),
            num_com_centers: default_num_com_centers(),
            localize: true,
            save_shape: true,
            chunk_size: default_chunk_size(),
            rescale: false,
            rescale_value: default_rescale_value(),
            rescale_quantile: default_rescale_quantile(),
            rescale_chunks: default_rescale_chunks(),
            rescale_seed: 0,
            common_reference: default_common_reference(),
            masked_channels: Vec::new(),
            max_frames: None,
        }
    }
}

impl DetectionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> DetectionConfigBuilder {
        DetectionConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.threshold <= 0 {
            return Err(CoreError::config("threshold must be greater than 0"));
        }
        if self.maa < 0 || self.ahpthr < 0 {
            return Err(CoreError::config("maa and ahpthr must be non-negative"));
        }
        if self.chunk_size <= 0 {
            return Err(CoreError::config("chunk_size must be greater than 0"));
        }
        if self.num_com_centers == 0 {
            return Err(CoreError::config("num_com_centers must be at least 1"));
        }
        if !(self.neighbor_radius > 0.0) || !(self.inner_radius > 0.0) {
            return Err(CoreError::config("radii must be positive"));
        }
        if !(self.rescale_quantile > 0.0 && self.rescale_quantile < 0.5) {
            return Err(CoreError::config(
                "rescale_quantile must lie strictly between 0 and 0.5",
            ));
        }
        if self.amp_evaluation_ms <= 0.0 || self.spk_evaluation_ms <= 0.0 {
            return Err(CoreError::config("evaluation windows must be positive"));
        }
        if self.amp_evaluation_ms > self.spk_evaluation_ms {
            return Err(CoreError::config(
                "amp_evaluation_ms cannot exceed spk_evaluation_ms",
            ));
        }
        if self.left_cutout_ms < 0.0 || self.right_cutout_ms < 0.0 {
            return Err(CoreError::config("cutout extents cannot be negative"));
        }
        Ok(())
    }

    /// Converts millisecond parameters to frames and freezes them into
    /// [`DetectionParams`].
    pub fn resolve(&self, sampling_frequency: f64) -> Result<DetectionParams> {
        self.validate()?;
        if !(sampling_frequency > 0.0) {
            return Err(CoreError::config(format!(
                "invalid sampling frequency: {}",
                sampling_frequency
            )));
        }

        let frames = |ms: f64| (ms * sampling_frequency / 1000.0 + 0.5) as Frame;

        let cutout_start = frames(self.left_cutout_ms);
        let cutout_end = frames(self.right_cutout_ms);
        let minsl = frames(self.amp_evaluation_ms).max(1);
        let maxsl = frames(self.spk_evaluation_ms).max(minsl);
        let spike_peak_duration = frames(self.event_length_ms).max(1);
        let mut noise_duration = frames(self.peak_jitter_ms).max(1);

        // the localizer reads noise_duration frames on both sides of a peak,
        // which must stay within the cutout margins kept in the trace history
        let margin = cutout_start.min(cutout_end);
        if noise_duration > margin {
            if margin == 0 && self.localize {
                return Err(CoreError::config(
                    "localization requires nonzero cutout extents",
                ));
            }
            log::warn!(
                "peak_jitter ({} frames) exceeds the cutout margin ({} frames); clamping",
                noise_duration,
                margin
            );
            noise_duration = margin.max(if self.localize { 1 } else { 0 });
        }

        if self.chunk_size < maxsl + spike_peak_duration {
            return Err(CoreError::config(format!(
                "chunk_size ({}) is smaller than the minimum window ({} frames)",
                self.chunk_size,
                maxsl + spike_peak_duration
            )));
        }

        Ok(DetectionParams {
            threshold: self.threshold,
            maa: self.maa,
            ahpthr: self.ahpthr,
            decay_filtering: self.decay_filtering,
            cutout_start,
            cutout_end,
            minsl,
            maxsl,
            spike_peak_duration,
            noise_duration,
            noise_amp_percent: self.noise_amp_percent,
            neighbor_radius: self.neighbor_radius,
            inner_radius: self.inner_radius,
            num_com_centers: self.num_com_centers,
            localize: self.localize,
            save_shape: self.save_shape,
            chunk_size: self.chunk_size,
            rescale: self.rescale,
            rescale_value: self.rescale_value,
            rescale_quantile: self.rescale_quantile,
            rescale_chunks: self.rescale_chunks,
            rescale_seed: self.rescale_seed,
            common_reference: self.common_reference,
            masked_channels: self.masked_channels.clone(),
            max_frames: self.max_frames,
        })
    }
}

/// Resolved, frame-based detection parameters. Immutable once built.
#[derive(Debug, Clone)]
pub struct DetectionParams {
    pub threshold: i32,
    pub maa: i32,
    pub ahpthr: i32,
    pub decay_filtering: bool,
    /// Frames kept before the peak in a cutout
    pub cutout_start: Frame,
    /// Frames kept after the peak in a cutout
    pub cutout_end: Frame,
    /// Amplitude-evaluation window in frames
    pub minsl: Frame,
    /// Post-peak evaluation / dead-time window in frames
    pub maxsl: Frame,
    /// Frames for a spike amplitude to fully decay
    pub spike_peak_duration: Frame,
    /// Maximum peak jitter between duplicates on neighboring channels
    pub noise_duration: Frame,
    pub noise_amp_percent: f32,
    pub neighbor_radius: f32,
    pub inner_radius: f32,
    pub num_com_centers: usize,
    pub localize: bool,
    pub save_shape: bool,
    pub chunk_size: Frame,
    pub rescale: bool,
    pub rescale_value: f32,
    pub rescale_quantile: f32,
    pub rescale_chunks: usize,
    pub rescale_seed: u64,
    pub common_reference: CommonReference,
    pub masked_channels: Vec<usize>,
    pub max_frames: Option<Frame>,
}

impl DetectionParams {
    /// Total cutout length: `cutout_start + 1 + cutout_end` frames.
    pub fn cutout_length(&self) -> usize {
        (self.cutout_start + 1 + self.cutout_end) as usize
    }

    /// Look-behind margin required by the scheduler.
    pub fn t_cut(&self) -> Frame {
        self.cutout_start + self.maxsl
    }

    /// Look-ahead margin required by the scheduler.
    pub fn t_cut2(&self) -> Frame {
        self.cutout_end + self.maxsl
    }
}

/// Builder for [`DetectionConfig`].
#[derive(Debug, Default)]
pub struct DetectionConfigBuilder {
    config: DetectionConfig,
}

impl DetectionConfigBuilder {
    pub fn threshold(mut self, threshold: i32) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn maa(mut self, maa: i32) -> Self {
        self.config.maa = maa;
        self
    }

    pub fn ahpthr(mut self, ahpthr: i32) -> Self {
        self.config.ahpthr = ahpthr;
        self
    }

    pub fn decay_filtering(mut self, enabled: bool) -> Self {
        self.config.decay_filtering = enabled;
        self
    }

    pub fn cutout_ms(mut self, left: f64, right: f64) -> Self {
        self.config.left_cutout_ms = left;
        self.config.right_cutout_ms = right;
        self
    }

    pub fn evaluation_ms(mut self, amp: f64, spk: f64) -> Self {
        self.config.amp_evaluation_ms = amp;
        self.config.spk_evaluation_ms = spk;
        self
    }

    pub fn radii(mut self, neighbor: f32, inner: f32) -> Self {
        self.config.neighbor_radius = neighbor;
        self.config.inner_radius = inner;
        self
    }

    pub fn num_com_centers(mut self, n: usize) -> Self {
        self.config.num_com_centers = n;
        self
    }

    pub fn localize(mut self, enabled: bool) -> Self {
        self.config.localize = enabled;
        self
    }

    pub fn save_shape(mut self, enabled: bool) -> Self {
        self.config.save_shape = enabled;
        self
    }

    pub fn chunk_size(mut self, frames: Frame) -> Self {
        self.config.chunk_size = frames;
        self
    }

    pub fn rescale(mut self, enabled: bool) -> Self {
        self.config.rescale = enabled;
        self
    }

    pub fn common_reference(mut self, mode: CommonReference) -> Self {
        self.config.common_reference = mode;
        self
    }

    pub fn masked_channels(mut self, channels: Vec<usize>) -> Self {
        self.config.masked_channels = channels;
        self
    }

    pub fn max_frames(mut self, frames: Frame) -> Self {
        self.config.max_frames = Some(frames);
        self
    }

    pub fn build(self) -> Result<DetectionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
