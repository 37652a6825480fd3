//! Viewport height sampling.

use crate::{
    composite::RasterBuffer, mask::Mask, viewport::Projection, Progress, RidgelineError, Step,
};
use log::debug;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use terrainrgb::{Elev, C};

/// Height assigned to pixels outside the region mask. Well below any
/// sensible ocean level.
pub const OUTSIDE_HEIGHT: Elev = -20.0;

/// Wall-clock budget of one sampling slice.
pub const FRAME_QUOTA: Duration = Duration::from_millis(16);

/// Rows sampled per slice before the quota is consulted.
pub const MIN_ROWS_PER_SLICE: usize = 4;

/// Row-major heights for every viewport pixel, plus summary stats.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    heights: Vec<Elev>,
    min: Elev,
    max: Elev,
    row_of_max: usize,
}

impl HeightField {
    /// Builds a field from row-major `heights`.
    ///
    /// Returns `EmptyViewport` if either dimension is zero or `heights`
    /// does not hold exactly `width * height` values.
    pub fn from_heights(
        width: usize,
        height: usize,
        heights: Vec<Elev>,
    ) -> Result<Self, RidgelineError> {
        if width == 0 || height == 0 || heights.len() != width * height {
            return Err(RidgelineError::EmptyViewport);
        }
        let mut stats = Stats::default();
        for (y, row) in heights.chunks_exact(width).enumerate() {
            for &h in row {
                stats.push(h, y);
            }
        }
        Ok(stats.into_field(width, height, heights))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn min(&self) -> Elev {
        self.min
    }

    pub fn max(&self) -> Elev {
        self.max
    }

    /// Row on which [`Self::max`] was first seen, scanning top to
    /// bottom and left to right.
    pub fn row_of_max(&self) -> usize {
        self.row_of_max
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Elev> {
        if x < self.width && y < self.height {
            Some(self.heights[y * self.width + x])
        } else {
            None
        }
    }

    /// Returns row `y`, left to right.
    ///
    /// Panics if `y >= height`.
    pub fn row(&self, y: usize) -> &[Elev] {
        &self.heights[y * self.width..(y + 1) * self.width]
    }
}

struct Stats {
    min: Elev,
    max: Elev,
    row_of_max: usize,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            min: Elev::INFINITY,
            max: Elev::NEG_INFINITY,
            row_of_max: 0,
        }
    }
}

impl Stats {
    fn push(&mut self, h: Elev, y: usize) {
        if h < self.min {
            self.min = h;
        }
        // Strict, so the first occurrence wins.
        if h > self.max {
            self.max = h;
            self.row_of_max = y;
        }
    }

    fn into_field(self, width: usize, height: usize, heights: Vec<Elev>) -> HeightField {
        HeightField {
            width,
            height,
            heights,
            min: self.min,
            max: self.max,
            row_of_max: self.row_of_max,
        }
    }
}

/// Resumable sampler turning a [`RasterBuffer`] into a [`HeightField`].
///
/// Call [`HeightSampler::step`] once per scheduler tick until it
/// returns `Done` or `Cancelled`.
pub struct HeightSampler {
    raster: RasterBuffer,
    projection: Arc<dyn Projection>,
    mask: Option<Mask>,
    progress: Progress,
    width: usize,
    height: usize,
    next_row: usize,
    heights: Vec<Elev>,
    stats: Stats,
    elapsed: Duration,
}

impl HeightSampler {
    /// Prepares to sample a `width`×`height` viewport.
    ///
    /// Fails with `OutOfRaster` if any viewport corner maps outside
    /// `raster`.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        raster: RasterBuffer,
        projection: Arc<dyn Projection>,
        width: usize,
        height: usize,
        mask: Option<Mask>,
        progress: Progress,
    ) -> Result<Self, RidgelineError> {
        if width == 0 || height == 0 {
            return Err(RidgelineError::EmptyViewport);
        }
        for (x, y) in [(0, 0), (width - 1, 0), (0, height - 1), (width - 1, height - 1)] {
            let coord = projection.unproject(x as C, y as C);
            if raster.pixel_for(coord).is_none() {
                return Err(RidgelineError::OutOfRaster { x, y });
            }
        }
        progress.message("Computing elevation lines...");
        Ok(Self {
            raster,
            projection,
            mask,
            progress,
            width,
            height,
            next_row: 0,
            heights: Vec::with_capacity(width * height),
            stats: Stats::default(),
            elapsed: Duration::ZERO,
        })
    }

    /// Samples rows until `quota` has elapsed.
    ///
    /// At least [`MIN_ROWS_PER_SLICE`] rows are sampled per call unless
    /// the request is cancelled first.
    pub fn step(&mut self, quota: Duration) -> Result<Step<HeightField>, RidgelineError> {
        let start = Instant::now();
        let mut rows = 0;
        while self.next_row < self.height {
            if self.progress.is_cancelled() {
                return Ok(Step::Cancelled);
            }
            self.sample_row(self.next_row)?;
            self.next_row += 1;
            rows += 1;
            if rows >= MIN_ROWS_PER_SLICE && start.elapsed() > quota {
                self.elapsed += start.elapsed();
                self.progress.message(format!(
                    "Computing elevation lines... {}%",
                    self.next_row * 100 / self.height
                ));
                return Ok(Step::Yield);
            }
        }
        if self.progress.is_cancelled() {
            return Ok(Step::Cancelled);
        }
        self.elapsed += start.elapsed();

        let stats = std::mem::take(&mut self.stats);
        let heights = std::mem::take(&mut self.heights);
        debug!(
            "sample; size: {}x{}, min: {}, max: {}, row_of_max: {}, exec: {:?}",
            self.width, self.height, stats.min, stats.max, stats.row_of_max, self.elapsed
        );
        Ok(Step::Done(stats.into_field(self.width, self.height, heights)))
    }

    /// Runs every remaining slice back to back.
    pub fn run(mut self) -> Result<Option<HeightField>, RidgelineError> {
        loop {
            match self.step(Duration::MAX)? {
                Step::Yield => {}
                Step::Done(field) => return Ok(Some(field)),
                Step::Cancelled => return Ok(None),
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn sample_row(&mut self, y: usize) -> Result<(), RidgelineError> {
        for x in 0..self.width {
            let coord = self.projection.unproject(x as C, y as C);
            let h = match &self.mask {
                Some(mask) if !mask.contains(coord) => OUTSIDE_HEIGHT,
                _ => {
                    let px = self
                        .raster
                        .pixel_for(coord)
                        .ok_or(RidgelineError::OutOfRaster { x, y })?;
                    self.raster.height_at_pixel(px)
                }
            };
            self.stats.push(h, y);
            self.heights.push(h);
        }
        Ok(())
    }
}
