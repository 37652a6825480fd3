//! Ridge-line extraction.
//!
//! Turns a [`HeightField`] into horizontal polylines, one scanline at a
//! time, displaced upward by scaled height and split wherever the
//! terrain dips to the ocean level.

use crate::{sampler::HeightField, Settings};
use geo::geometry::Coord;
use std::ops::Range;
use terrainrgb::C;

/// Fewest points a segment needs to be drawn.
pub const MIN_SEGMENT_POINTS: usize = 3;

/// A smoothed polyline and the vertical extent of its smoothed points.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedRange {
    pub points: Vec<Coord<C>>,
    pub min: C,
    pub max: C,
}

impl SmoothedRange {
    pub fn extent(&self) -> C {
        self.max - self.min
    }
}

/// Moving average of the `y` values of `points`.
///
/// Point `i` becomes the mean of points `i - window ..= i + window`,
/// with the window clipped to the slice. Near either end the window
/// shrinks rather than reading past the segment, so edge values lean
/// towards their inner neighbours.
#[allow(clippy::cast_precision_loss)]
pub fn smooth(points: &[Coord<C>], window: usize) -> SmoothedRange {
    let mut min = C::INFINITY;
    let mut max = C::NEG_INFINITY;
    let points = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let from = i.saturating_sub(window);
            let to = i.saturating_add(window).saturating_add(1).min(points.len());
            let span = &points[from..to];
            let y = span.iter().map(|p| p.y).sum::<C>() / span.len() as C;
            min = min.min(y);
            max = max.max(y);
            Coord { x: p.x, y }
        })
        .collect();
    SmoothedRange { points, min, max }
}

/// Distance in pixels between drawn rows. Never zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn step_size(height: usize, rows: usize) -> usize {
    let step = (height as f64 / rows.max(1) as f64).round();
    if step >= 1.0 {
        step as usize
    } else {
        1
    }
}

/// First drawn row such that `row_of_max` lands exactly on the grid.
///
/// Satisfies `start < step` and `(row_of_max - start) % step == 0`.
pub fn anchored_start(row_of_max: usize, step: usize) -> usize {
    row_of_max % step.max(1)
}

/// The rows drawn for one viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanGrid {
    pub start: usize,
    pub step: usize,
    pub stop: usize,
}

impl ScanGrid {
    /// Grid for `field` at the density requested by `settings`.
    pub fn new(field: &HeightField, settings: &Settings) -> Self {
        let step = step_size(field.height(), settings.row_count(field.height()));
        Self {
            start: anchored_start(field.row_of_max(), step),
            step,
            stop: field.height(),
        }
    }

    /// Drawn rows, top to bottom. Reverse for bottom to top.
    pub fn rows(&self) -> std::iter::StepBy<Range<usize>> {
        (self.start..self.stop).step_by(self.step)
    }
}

/// Sink-agnostic extractor of ridge lines from a [`HeightField`].
pub struct Extractor<'a> {
    field: &'a HeightField,
    grid: ScanGrid,
    min: C,
    range: C,
    height_scale: C,
    ocean_level: C,
    smooth_steps: usize,
}

impl<'a> Extractor<'a> {
    pub fn new(field: &'a HeightField, settings: &Settings) -> Self {
        Self {
            field,
            grid: ScanGrid::new(field, settings),
            min: C::from(field.min()),
            range: C::from(field.max()) - C::from(field.min()),
            height_scale: settings.height_scale,
            ocean_level: settings.ocean_level,
            smooth_steps: settings.smooth_steps,
        }
    }

    pub fn grid(&self) -> ScanGrid {
        self.grid
    }

    /// Screen-space offset of row `y` at height `h`.
    fn displaced(&self, y: usize, h: C) -> C {
        let lift = if self.range > 0.0 && self.range.is_finite() {
            (self.height_scale * (h - self.min) / self.range).floor()
        } else {
            0.0
        };
        #[allow(clippy::cast_precision_loss)]
        let y = y as C;
        y - lift
    }

    /// Unsmoothed polylines of row `y`, left to right, split at every
    /// column at or below the ocean level.
    #[allow(clippy::cast_precision_loss)]
    pub fn raw_segments(&self, y: usize) -> Vec<Vec<Coord<C>>> {
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for (x, &h) in self.field.row(y).iter().enumerate() {
            let h = C::from(h);
            if h <= self.ocean_level {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            } else {
                current.push(Coord {
                    x: x as C,
                    y: self.displaced(y, h),
                });
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }

    /// Smoothed, drawable segments of row `y`.
    ///
    /// Segments shorter than [`MIN_SEGMENT_POINTS`] are dropped.
    pub fn row(&self, y: usize) -> Vec<SmoothedRange> {
        self.raw_segments(y)
            .into_iter()
            .filter(|segment| segment.len() >= MIN_SEGMENT_POINTS)
            .map(|segment| smooth(&segment, self.smooth_steps))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{anchored_start, smooth, step_size, Extractor, ScanGrid};
    use crate::{sampler::HeightField, Settings};
    use approx::assert_relative_eq;
    use geo::geometry::Coord;

    fn settings() -> Settings {
        Settings {
            smooth_steps: 0,
            ..Settings::default()
        }
    }

    #[test]
    fn test_anchored_start() {
        for step in 1..40 {
            for row_of_max in 0..200 {
                let start = anchored_start(row_of_max, step);
                assert!(start < step);
                assert_eq!((row_of_max - start) % step, 0);
            }
        }
    }

    #[test]
    fn test_grid_includes_row_of_max() {
        let mut heights = vec![1.0; 10 * 100];
        heights[57 * 10 + 3] = 9.0;
        let field = HeightField::from_heights(10, 100, heights).unwrap();
        for density in [1.0, 7.0, 28.0, 33.0, 100.0] {
            let settings = Settings {
                line_density: density,
                ..Settings::default()
            };
            let grid = ScanGrid::new(&field, &settings);
            assert!(grid.rows().any(|y| y == 57), "density {density}");
            assert!(grid.rows().rev().all(|y| y < 100));
        }
    }

    #[test]
    fn test_step_size() {
        assert_eq!(step_size(1000, 280), 4);
        assert_eq!(step_size(10, 1000), 1);
        assert_eq!(step_size(10, 0), 10);
    }

    #[test]
    fn test_alternating_ocean_clip() {
        // Runs of 1, 2, 3 and 4 land columns separated by water.
        let row = [
            5.0, 0.0, 5.0, 5.0, -1.0, 5.0, 5.0, 5.0, 0.0, 5.0, 5.0, 5.0, 5.0,
        ];
        let field = HeightField::from_heights(row.len(), 1, row.to_vec()).unwrap();
        let extractor = Extractor::new(&field, &settings());

        let lengths: Vec<usize> = extractor.raw_segments(0).iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![1, 2, 3, 4]);
        let drawn: Vec<usize> = extractor.row(0).iter().map(|s| s.points.len()).collect();
        assert_eq!(drawn, vec![3, 4]);

        let xs: Vec<f64> = extractor.row(0)[0].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_every_other_pixel_below_ocean() {
        let row: Vec<f32> = (0..20).map(|x| if x % 2 == 0 { 3.0 } else { -3.0 }).collect();
        let field = HeightField::from_heights(20, 1, row).unwrap();
        let segments = Extractor::new(&field, &settings()).raw_segments(0);
        assert_eq!(segments.len(), 10);
        assert!(segments.iter().all(|s| s.len() == 1));
    }

    #[test]
    fn test_displacement() {
        let field = HeightField::from_heights(3, 2, vec![1.0, 2.0, 3.0, 1.0, 1.0, 1.0]).unwrap();
        let settings = Settings {
            height_scale: 10.0,
            ..settings()
        };
        let extractor = Extractor::new(&field, &settings);
        let ys: Vec<f64> = extractor.raw_segments(1)[0].iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![1.0, 1.0, 1.0]);
        let ys: Vec<f64> = extractor.raw_segments(0)[0].iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![0.0, -5.0, -10.0]);
    }

    #[test]
    fn test_flat_field_is_not_displaced() {
        let field = HeightField::from_heights(4, 1, vec![7.0; 4]).unwrap();
        let extractor = Extractor::new(&field, &settings());
        assert!(extractor.raw_segments(0)[0].iter().all(|p| p.y == 0.0));
    }

    #[test]
    fn test_smooth_constant() {
        let points: Vec<Coord> = (0..9).map(|x| Coord { x: f64::from(x), y: 4.5 }).collect();
        for window in 0..12 {
            let smoothed = smooth(&points, window);
            assert_eq!(smoothed.points.len(), points.len());
            for (p, s) in points.iter().zip(&smoothed.points) {
                assert_eq!(p.x, s.x);
                assert_relative_eq!(s.y, 4.5);
            }
            assert_relative_eq!(smoothed.extent(), 0.0);
        }
    }

    #[test]
    fn test_smooth_huge_window_is_segment_mean() {
        let points: Vec<Coord> = [2.0, 4.0, 6.0, 8.0, 10.0]
            .iter()
            .enumerate()
            .map(|(x, &y)| Coord { x: x as f64, y })
            .collect();
        let smoothed = smooth(&points, usize::MAX);
        assert!(smoothed.points.iter().all(|p| p.y == 6.0));
        assert_eq!((smoothed.min, smoothed.max), (6.0, 6.0));
    }

    #[test]
    fn test_smooth_shrinks_at_edges() {
        let points: Vec<Coord> = [0.0, 3.0, 6.0, 9.0]
            .iter()
            .enumerate()
            .map(|(x, &y)| Coord { x: x as f64, y })
            .collect();
        let smoothed = smooth(&points, 1);
        let ys: Vec<f64> = smoothed.points.iter().map(|p| p.y).collect();
        assert_eq!(ys, vec![1.5, 3.0, 6.0, 7.5]);
        assert_eq!((smoothed.min, smoothed.max), (1.5, 7.5));
    }
}
