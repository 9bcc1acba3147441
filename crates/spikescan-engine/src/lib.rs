//! Streaming spike detection engine for dense multielectrode arrays.
//!
//! The engine walks a recording in overlapping chunks, tracks a per-channel
//! noise model, turns threshold crossings into candidate spikes, suppresses
//! duplicates seen on neighboring electrodes, and estimates a spatial origin
//! for what remains. Results are identical for any chunk size: every
//! detection decision depends only on the recording, never on where the
//! window boundaries fall.
//!
//! [`pipeline::run`] is the entry point; the other modules are exposed for
//! finer-grained use.

pub mod baseline;
pub mod chunk;
pub mod detector;
pub mod localizer;
pub mod pipeline;
pub mod queue;
pub mod reference;
pub mod rescale;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;

pub use detector::Detector;
pub use pipeline::{run, DetectionSummary};
pub use queue::{QueuedSpike, SpikeQueue};
pub use scheduler::{ChunkScheduler, ChunkSpan};

/// Engine results share the core error type; sinks and sources both speak it.
pub type Result<T> = spikescan_core::Result<T>;
