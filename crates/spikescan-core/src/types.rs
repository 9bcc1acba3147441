//! Core data types for the spikescan detection pipeline.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul};

/// Sample index along the time axis, shared by all channels.
pub type Frame = i32;

/// Raw quantized voltage as delivered by the acquisition system.
pub type Volt = i16;

/// 2-D electrode position in probe coordinates (usually micrometers).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Mul<f32> for Point {
    type Output = Point;

    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Point {
    type Output = Point;

    fn div(self, rhs: f32) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

/// One finalized detection event.
///
/// Created by the detection engine, enriched by the localizer, consumed by
/// the spike writer. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeRecord {
    /// Channel on which the event triggered
    pub channel: usize,

    /// Peak frame, relative to the start of the segment
    pub frame: Frame,

    /// Peak amplitude of the centered signal, in the engine's fixed-point
    /// units
    pub amplitude: i32,

    /// Estimated spatial origin, present only when localization is enabled
    pub position: Option<Point>,

    /// Raw waveform cutout around the peak, empty when shapes are not kept
    pub shape: Vec<Volt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
    }

    #[test]
    fn test_point_arithmetic() {
        let p = (Point::new(1.0, 2.0) + Point::new(3.0, 4.0)) * 0.5;
        assert_eq!(p, Point::new(2.0, 3.0));
        assert_eq!(p / 2.0, Point::new(1.0, 1.5));
    }
}
