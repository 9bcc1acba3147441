//! Fixed-width binary spike record layout.
//!
//! One little-endian row per spike:
//!
//! ```text
//! channel:i32  frame:i32  amplitude:i32  [x:i32 y:i32]  [shape:i16 * cutout]
//! ```
//!
//! Positions are fixed-point micrometers at a x1000 scale, rounded half up.
//! The coordinate and shape sections are present or absent for a whole file,
//! so the row width is constant and a file is valid iff its length is a
//! multiple of the row size. A zero-length file is a valid result with no
//! spikes.

use crate::{IoError, Result};
use spikescan_core::{Point, SpikeRecord, Volt};

/// Shape of every row in one spike file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    /// Rows carry the fixed-point x/y pair.
    pub has_position: bool,
    /// Samples per waveform cutout; zero when shapes are not stored.
    pub cutout_length: usize,
}

impl RecordLayout {
    pub fn new(has_position: bool, cutout_length: usize) -> Self {
        Self {
            has_position,
            cutout_length,
        }
    }

    /// Bytes per row.
    pub fn row_size(&self) -> usize {
        let mut size = 3 * 4;
        if self.has_position {
            size += 2 * 4;
        }
        size + 2 * self.cutout_length
    }

    /// Appends one encoded row to `out`.
    pub fn encode(&self, spike: &SpikeRecord, out: &mut Vec<u8>) {
        out.extend_from_slice(&(spike.channel as i32).to_le_bytes());
        out.extend_from_slice(&spike.frame.to_le_bytes());
        out.extend_from_slice(&spike.amplitude.to_le_bytes());

        if self.has_position {
            let position = spike.position.unwrap_or_default();
            out.extend_from_slice(&fixed_point(position.x).to_le_bytes());
            out.extend_from_slice(&fixed_point(position.y).to_le_bytes());
        }

        debug_assert_eq!(spike.shape.len(), self.cutout_length);
        for &v in &spike.shape {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Decodes one row. `bytes` must be exactly `row_size` long.
    pub fn decode(&self, bytes: &[u8]) -> Result<SpikeRecord> {
        if bytes.len() != self.row_size() {
            return Err(IoError::Format(format!(
                "row of {} bytes, expected {}",
                bytes.len(),
                self.row_size()
            )));
        }

        let channel = i32::from_le_bytes(bytes[0..4].try_into().unwrap_or_default());
        if channel < 0 {
            return Err(IoError::Format(format!("negative channel {}", channel)));
        }
        let frame = i32::from_le_bytes(bytes[4..8].try_into().unwrap_or_default());
        let amplitude = i32::from_le_bytes(bytes[8..12].try_into().unwrap_or_default());

        let mut offset = 12;
        let position = if self.has_position {
            let x = i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap_or_default());
            let y =
                i32::from_le_bytes(bytes[offset + 4..offset + 8].try_into().unwrap_or_default());
            offset += 8;
            Some(Point::new(x as f32 / 1000.0, y as f32 / 1000.0))
        } else {
            None
        };

        let shape: Vec<Volt> = bytes[offset..]
            .chunks_exact(2)
            .map(|pair| Volt::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(SpikeRecord {
            channel: channel as usize,
            frame,
            amplitude,
            position,
            shape,
        })
    }
}

/// x1000 fixed point, rounded half up.
fn fixed_point(v: f32) -> i32 {
    (v * 1000.0 + 0.5).floor() as i32
}
