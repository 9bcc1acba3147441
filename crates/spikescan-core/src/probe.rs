//! Probe geometry: per-channel neighbor sets derived from electrode positions.
//!
//! Neighbor membership uses strict `<` against the radius, so channels at
//! exactly the radius are excluded. Inner neighbors are kept sorted by
//! ascending distance with the channel itself first, which is what the
//! localizer relies on when it picks its centroid centers.

use crate::errors::{CoreError, Result};
use crate::types::Point;

/// Immutable channel geometry: positions, masking, and neighbor sets.
///
/// Neighbor lists are stored as ranges into shared flat arrays rather than a
/// fixed-width sentinel-padded matrix; see [`ChannelGraph::neighbors`].
#[derive(Debug, Clone)]
pub struct ChannelGraph {
    positions: Vec<Point>,
    masked: Vec<bool>,
    neighbor_index: Vec<u32>,
    neighbor_offsets: Vec<usize>,
    inner_index: Vec<u32>,
    inner_offsets: Vec<usize>,
}

impl ChannelGraph {
    /// Builds the neighbor graph for a set of electrode positions.
    ///
    /// `masked_channels` lists channels excluded from triggering; they still
    /// appear in neighbor sets and contribute to reference computations.
    pub fn new(
        positions: &[Point],
        neighbor_radius: f32,
        inner_radius: f32,
        masked_channels: &[usize],
    ) -> Result<Self> {
        let num_channels = positions.len();
        if num_channels == 0 {
            return Err(CoreError::geometry("empty channel set"));
        }
        if !(neighbor_radius > 0.0) || !(inner_radius > 0.0) {
            return Err(CoreError::geometry(format!(
                "radii must be positive (neighbor: {}, inner: {})",
                neighbor_radius, inner_radius
            )));
        }

        let mut masked = vec![false; num_channels];
        for &ch in masked_channels {
            if ch >= num_channels {
                return Err(CoreError::geometry(format!(
                    "masked channel {} out of range ({} channels)",
                    ch, num_channels
                )));
            }
            masked[ch] = true;
        }
        if masked_channels.is_empty() {
            log::debug!("not masking any channels");
        } else {
            log::info!("masking channels: {:?}", masked_channels);
        }

        let mut neighbor_index = Vec::new();
        let mut neighbor_offsets = Vec::with_capacity(num_channels + 1);
        let mut inner_index = Vec::new();
        let mut inner_offsets = Vec::with_capacity(num_channels + 1);
        neighbor_offsets.push(0);
        inner_offsets.push(0);

        let mut isolated = 0usize;
        let mut distance = vec![0.0f32; num_channels];
        for i in 0..num_channels {
            let mut inner: Vec<u32> = Vec::new();
            for j in 0..num_channels {
                let dist = positions[i].distance(&positions[j]);
                distance[j] = dist;
                if dist < neighbor_radius {
                    neighbor_index.push(j as u32);
                    if dist < inner_radius {
                        inner.push(j as u32);
                    }
                }
            }
            // ascending distance, self (distance 0) first
            inner.sort_by(|&a, &b| distance[a as usize].total_cmp(&distance[b as usize]));
            if neighbor_offsets.last() == Some(&(neighbor_index.len() - 1)) {
                isolated += 1;
            }
            neighbor_offsets.push(neighbor_index.len());
            inner_index.extend_from_slice(&inner);
            inner_offsets.push(inner_index.len());
        }

        if isolated > 0 {
            log::warn!(
                "{} of {} channels have no neighbors within radius {}; they will \
                 be detected but never merged or localized against neighbors",
                isolated,
                num_channels,
                neighbor_radius
            );
        }

        Ok(Self {
            positions: positions.to_vec(),
            masked,
            neighbor_index,
            neighbor_offsets,
            inner_index,
            inner_offsets,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.positions.len()
    }

    pub fn position(&self, channel: usize) -> Point {
        self.positions[channel]
    }

    pub fn is_masked(&self, channel: usize) -> bool {
        self.masked[channel]
    }

    /// All channels strictly within `neighbor_radius`, including the channel
    /// itself, in channel-id order.
    pub fn neighbors(&self, channel: usize) -> &[u32] {
        &self.neighbor_index[self.neighbor_offsets[channel]..self.neighbor_offsets[channel + 1]]
    }

    /// Channels strictly within `inner_radius`, sorted by ascending distance;
    /// the channel itself comes first.
    pub fn inner_neighbors(&self, channel: usize) -> &[u32] {
        &self.inner_index[self.inner_offsets[channel]..self.inner_offsets[channel + 1]]
    }

    pub fn are_neighbors(&self, a: usize, b: usize) -> bool {
        self.neighbors(a).binary_search(&(b as u32)).is_ok()
    }

    pub fn are_inner_neighbors(&self, a: usize, b: usize) -> bool {
        self.inner_neighbors(a).contains(&(b as u32))
    }

    pub fn channel_distance(&self, a: usize, b: usize) -> f32 {
        self.positions[a].distance(&self.positions[b])
    }
}

/// Reduces raw channel coordinates to 2-D points.
///
/// Recording sources may supply more than two coordinates per channel; only
/// the last two are used, with a warning, matching the recording-source
/// contract. Fewer than two dimensions is a hard error.
pub fn points_from_coords(coords: &[Vec<f32>]) -> Result<Vec<Point>> {
    let mut points = Vec::with_capacity(coords.len());
    let mut warned = false;
    for (ch, c) in coords.iter().enumerate() {
        if c.len() < 2 {
            return Err(CoreError::geometry(format!(
                "channel {} has {}-dimensional location, need at least 2",
                ch,
                c.len()
            )));
        }
        if c.len() > 2 && !warned {
            log::warn!(
                "channel locations have {} dimensions; using the last two",
                c.len()
            );
            warned = true;
        }
        points.push(Point::new(c[c.len() - 2], c[c.len() - 1]));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_2x2(pitch: f32) -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(pitch, 0.0),
            Point::new(0.0, pitch),
            Point::new(pitch, pitch),
        ]
    }

    #[test]
    fn test_neighbors_strict_radius() {
        // pitch 10, diagonal ~14.14
        let graph = ChannelGraph::new(&grid_2x2(10.0), 10.0, 10.0, &[]).unwrap();
        // radius exactly equal to pitch excludes the orthogonal neighbors
        for ch in 0..4 {
            assert_eq!(graph.neighbors(ch), &[ch as u32]);
        }

        let graph = ChannelGraph::new(&grid_2x2(10.0), 10.1, 10.1, &[]).unwrap();
        assert_eq!(graph.neighbors(0), &[0, 1, 2]);
        assert_eq!(graph.neighbors(3), &[1, 2, 3]);
    }

    #[test]
    fn test_neighbor_symmetry() {
        let mut positions = grid_2x2(20.0);
        positions.push(Point::new(7.0, 3.0));
        positions.push(Point::new(33.0, 18.0));
        let graph = ChannelGraph::new(&positions, 25.0, 12.0, &[]).unwrap();
        for a in 0..positions.len() {
            for b in 0..positions.len() {
                assert_eq!(
                    graph.are_neighbors(a, b),
                    graph.are_neighbors(b, a),
                    "asymmetry between {} and {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_inner_neighbors_sorted_self_first() {
        let positions = vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(2.0, 0.0),
        ];
        let graph = ChannelGraph::new(&positions, 100.0, 100.0, &[]).unwrap();
        assert_eq!(graph.inner_neighbors(0), &[0, 2, 1]);
        assert_eq!(graph.inner_neighbors(1), &[1, 2, 0]);
    }

    #[test]
    fn test_masked_channels() {
        let graph = ChannelGraph::new(&grid_2x2(10.0), 15.0, 15.0, &[2]).unwrap();
        assert!(graph.is_masked(2));
        assert!(!graph.is_masked(0));
        // masked channels still appear as neighbors
        assert!(graph.are_neighbors(0, 2));
    }

    #[test]
    fn test_empty_channel_set_fails() {
        assert!(ChannelGraph::new(&[], 10.0, 10.0, &[]).is_err());
    }

    #[test]
    fn test_points_from_coords() {
        let coords = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let points = points_from_coords(&coords).unwrap();
        assert_eq!(points[0], Point::new(2.0, 3.0));
        assert_eq!(points[1], Point::new(5.0, 6.0));

        assert!(points_from_coords(&[vec![1.0]]).is_err());
    }
}
