//! Error types shared across the spikescan crates.

use thiserror::Error;

/// Unified error type for core operations.
///
/// Geometry and configuration degeneracies that have a documented fallback
/// are reported through `log::warn!` instead of this type; only conditions
/// that leave no sensible way to continue become errors.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Probe geometry errors (degenerate layouts, dimension mismatch)
    #[error("probe geometry error: {0}")]
    Geometry(String),

    /// Recording source errors (short reads, out-of-range requests)
    #[error("recording error: {0}")]
    Recording(String),

    /// I/O errors from the underlying recording storage
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        CoreError::Config(message.into())
    }

    /// Creates a probe geometry error.
    pub fn geometry(message: impl Into<String>) -> Self {
        CoreError::Geometry(message.into())
    }

    /// Creates a recording error.
    pub fn recording(message: impl Into<String>) -> Self {
        CoreError::Recording(message.into())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = CoreError::config("chunk_size must be greater than 0");
        assert!(matches!(err, CoreError::Config(_)));

        let err = CoreError::recording("short read");
        assert!(matches!(err, CoreError::Recording(_)));
    }
}
