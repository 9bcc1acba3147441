//! Core types for streaming spike detection on dense multielectrode arrays.
//!
//! This crate holds the pieces shared by the detection engine and its I/O
//! layer: channel geometry ([`ChannelGraph`]), recording access
//! ([`Recording`]), configuration ([`DetectionConfig`] and the resolved
//! [`DetectionParams`]), and the spike record type itself.

pub mod config;
pub mod errors;
pub mod probe;
pub mod recording;
pub mod sink;
pub mod types;

pub use config::{CommonReference, DetectionConfig, DetectionParams};
pub use errors::{CoreError, Result};
pub use probe::{points_from_coords, ChannelGraph};
pub use recording::{read_padded, Recording, SliceRecording};
pub use sink::{SpikeSink, VecSink};
pub use types::{Frame, Point, SpikeRecord, Volt};
