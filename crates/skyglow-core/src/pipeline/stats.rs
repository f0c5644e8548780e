//! Region statistics over Bayer channel planes.

use ndarray::{s, Array2};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{ChannelStats, Region};

use super::decode::ChannelPlanes;

/// Mean and population variance of `channel` inside `region`.
///
/// `region` spans columns `x1..x2` and rows `y1..y2`; bounds past the
/// channel edge are clipped. The mean is rounded to 1 decimal and the
/// variance to 2.
pub fn region_stats(channel: &Array2<u16>, region: &Region) -> PipelineResult<ChannelStats> {
    let (rows, cols) = channel.dim();
    let (y1, y2) = (region.y1.min(rows), region.y2.min(rows));
    let (x1, x2) = (region.x1.min(cols), region.x2.min(cols));
    if y1 >= y2 || x1 >= x2 {
        return Err(PipelineError::EmptyRegion {
            region: region.to_string(),
            rows,
            cols,
        });
    }

    let window = channel.slice(s![y1..y2, x1..x2]).mapv(f64::from);
    let n = window.len() as f64;
    let mean = window.sum() / n;
    let variance = window.fold(0.0, |acc, &v| acc + (v - mean) * (v - mean)) / n;

    Ok(ChannelStats {
        mean: round_to(mean, 1),
        variance: round_to(variance, 2),
    })
}

/// Statistics of the same region in all four channels.
pub fn channel_stats(planes: &ChannelPlanes, region: &Region) -> PipelineResult<[ChannelStats; 4]> {
    Ok([
        region_stats(&planes[0], region)?,
        region_stats(&planes[1], region)?,
        region_stats(&planes[2], region)?,
        region_stats(&planes[3], region)?,
    ])
}

/// A `width × height` window centered on a `rows × cols` channel.
pub fn center_region(rows: usize, cols: usize, width: usize, height: usize) -> Region {
    let x = (cols / 2).saturating_sub(width / 2);
    let y = (rows / 2).saturating_sub(height / 2);
    Region::sized(width, height).shifted(x, y)
}

/// The bottom-right `corner_rows × corner_cols` window of a channel.
pub fn corner_region(rows: usize, cols: usize, corner_rows: usize, corner_cols: usize) -> Region {
    Region::new(cols.saturating_sub(corner_cols), cols, rows.saturating_sub(corner_rows), rows)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_stats_analytic() {
        // Rows 0..2, cols 0..2 of [[1,2,9],[3,4,9]] → {1,2,3,4}
        let channel = Array2::from_shape_vec((2, 3), vec![1, 2, 9, 3, 4, 9]).unwrap();
        let stats = region_stats(&channel, &Region::new(0, 2, 0, 2)).unwrap();
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.variance, 1.25);
    }

    #[test]
    fn test_region_stats_constant_window() {
        let channel = Array2::from_elem((10, 10), 2048u16);
        let stats = region_stats(&channel, &Region::new(2, 8, 3, 7)).unwrap();
        assert_eq!(stats.mean, 2048.0);
        assert_eq!(stats.variance, 0.0);
    }

    #[test]
    fn test_region_stats_rounding() {
        // {0, 0, 1} → mean 1/3, variance 2/9
        let channel = Array2::from_shape_vec((1, 3), vec![0, 0, 1]).unwrap();
        let stats = region_stats(&channel, &Region::new(0, 3, 0, 1)).unwrap();
        assert_eq!(stats.mean, 0.3);
        assert_eq!(stats.variance, 0.22);
    }

    #[test]
    fn test_region_stats_axes() {
        // x indexes columns, y indexes rows
        let channel = Array2::from_shape_fn((4, 6), |(r, c)| (10 * r + c) as u16);
        let stats = region_stats(&channel, &Region::new(5, 6, 0, 1)).unwrap();
        assert_eq!(stats.mean, 5.0);
        let stats = region_stats(&channel, &Region::new(0, 1, 3, 4)).unwrap();
        assert_eq!(stats.mean, 30.0);
    }

    #[test]
    fn test_region_stats_clips_to_channel() {
        let channel = Array2::from_elem((4, 4), 7u16);
        let stats = region_stats(&channel, &Region::new(2, 100, 2, 100)).unwrap();
        assert_eq!(stats.mean, 7.0);

        let err = region_stats(&channel, &Region::new(10, 20, 0, 4)).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyRegion { rows: 4, cols: 4, .. }));
    }

    #[test]
    fn test_center_region() {
        let region = center_region(1000, 1500, 500, 400);
        assert_eq!(region, Region::new(500, 1000, 300, 700));
        assert_eq!(region.width(), 500);
        assert_eq!(region.height(), 400);

        // Window larger than the channel starts at the origin.
        assert_eq!(center_region(10, 10, 50, 50), Region::new(0, 50, 0, 50));
    }

    #[test]
    fn test_corner_region() {
        assert_eq!(
            corner_region(1730, 2600, 410, 610),
            Region::new(1990, 2600, 1320, 1730)
        );
        assert_eq!(corner_region(100, 100, 410, 610), Region::new(0, 100, 0, 100));
    }
}
