//! Center-of-mass spike localization.
//!
//! Works on the per-center amplitude sums captured when the spike was
//! accepted. For each centroid center the neighbor sums are thresholded at
//! their median, the surviving amplitudes weight an average of electrode
//! positions, and the per-center estimates are averaged into the final
//! position.

use spikescan_core::{ChannelGraph, Point};

/// Returns `None` when no amplitude sums were captured.
pub fn localize(center_sums: &[Vec<(usize, i32)>], graph: &ChannelGraph) -> Option<Point> {
    if center_sums.is_empty() {
        return None;
    }

    let mut total = Point::new(0.0, 0.0);
    let mut count = 0u32;

    for sums in center_sums {
        if sums.is_empty() {
            continue;
        }
        let median = median_amplitude(sums);

        let mut com = Point::new(0.0, 0.0);
        let mut weight = 0i64;
        for &(channel, sum) in sums {
            let amp = sum as i64 - median as i64;
            if amp > 0 {
                com += graph.position(channel) * amp as f32;
                weight += amp;
            }
        }

        let com = if weight == 0 {
            // every sum at or below the median; the spike sits on whichever
            // electrode carries the median amplitude
            let fallback = sums
                .iter()
                .find(|&&(_, sum)| sum == median)
                .or_else(|| sums.iter().max_by_key(|&&(_, sum)| sum))?;
            graph.position(fallback.0)
        } else {
            com / weight as f32
        };

        total += com;
        count += 1;
    }

    if count == 0 {
        return None;
    }
    Some(total / count as f32)
}

/// Median of the amplitude sums; even counts average the two middles.
fn median_amplitude(sums: &[(usize, i32)]) -> i32 {
    let mut amps: Vec<i32> = sums.iter().map(|&(_, sum)| sum).collect();
    let len = amps.len();
    let mid = (len - 1) / 2;
    let (_, lower_mid, upper) = amps.select_nth_unstable(mid);
    let lower_mid = *lower_mid;
    if len % 2 == 0 {
        let upper_mid = upper.iter().copied().min().unwrap_or(lower_mid);
        (lower_mid + upper_mid) / 2
    } else {
        lower_mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::grid_graph;

    #[test]
    fn test_centroid_pulls_toward_strong_channels() {
        let graph = grid_graph(4);
        // center channel 5 at (20, 20); channel 6 at (40, 20) much stronger
        let sums = vec![vec![(5usize, 1_000), (6usize, 3_000), (1usize, 0), (4usize, 0), (9usize, 0)]];
        let position = localize(&sums, &graph).unwrap();

        assert!(position.x > 20.0 && position.x <= 40.0);
        assert_eq!(position.y, 20.0);
        // stronger channel dominates
        assert!(position.x > 30.0);
    }

    #[test]
    fn test_degenerate_sums_fall_back_to_median_channel() {
        let graph = grid_graph(4);
        let sums = vec![vec![(5usize, 100), (6usize, 100), (9usize, 100)]];
        let position = localize(&sums, &graph).unwrap();
        // all equal: the position is some electrode, not an average
        let on_electrode = [5usize, 6, 9]
            .iter()
            .any(|&ch| graph.position(ch) == position);
        assert!(on_electrode);
    }

    #[test]
    fn test_even_neighbor_count_averages_median() {
        let graph = grid_graph(4);
        // four sums: the median is the mean of the two middle values, 50
        let sums = vec![vec![(5usize, 300), (6usize, 100), (9usize, 0), (10usize, 0)]];
        let position = localize(&sums, &graph).unwrap();

        // channel 5 at (20, 20) carries 250 above the median, channel 6 at
        // (40, 20) carries 50
        assert!((position.x - (20.0 * 250.0 + 40.0 * 50.0) / 300.0).abs() < 1e-4);
        assert!((position.y - 20.0).abs() < 1e-4);
    }

    #[test]
    fn test_multiple_centers_average() {
        let graph = grid_graph(4);
        let center_a = vec![(5usize, 2_000), (6usize, 0), (9usize, 0)];
        let center_b = vec![(6usize, 2_000), (5usize, 0), (10usize, 0)];
        let a = localize(&[center_a.clone()], &graph).unwrap();
        let b = localize(&[center_b.clone()], &graph).unwrap();
        let both = localize(&[center_a, center_b], &graph).unwrap();

        assert!((both.x - (a.x + b.x) / 2.0).abs() < 1e-4);
        assert!((both.y - (a.y + b.y) / 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_empty_input_yields_no_position() {
        let graph = grid_graph(4);
        assert!(localize(&[], &graph).is_none());
    }
}
