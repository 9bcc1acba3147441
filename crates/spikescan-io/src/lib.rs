//! Spike-file persistence.
//!
//! Spikes are stored as fixed-width little-endian rows ([`RecordLayout`]),
//! streamed out incrementally during detection ([`SpikeFileWriter`]) and
//! read back through a memory map ([`SpikeFileReader`]).

pub mod format;
pub mod raw;
pub mod reader;
pub mod writer;

pub use format::RecordLayout;
pub use raw::RawRecording;
pub use reader::SpikeFileReader;
pub use writer::SpikeFileWriter;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    /// Malformed or inconsistent spike-file contents
    #[error("spike file format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IoError>;
