//! Drawing extracted ridge lines.
//!
//! [`LineSink`] is the seam between extraction and output. The raster
//! sink paints a pixmap with fills and painter's-algorithm overdraw;
//! the vector sink emits stroke-only SVG with occlusion culling. Both
//! are fed by [`draw_all`], or row by row through [`SlicedRender`].

pub mod raster;
pub mod vector;

pub use raster::RasterSink;
pub use vector::VectorSink;

use crate::{
    extract::{Extractor, SmoothedRange},
    sampler::HeightField,
    svg::Label,
    CancelToken, RidgelineError, Settings, Step,
};
use log::debug;
use std::time::{Duration, Instant};
use tiny_skia::Pixmap;

/// Wall-clock budget of one raster slice.
pub const RASTER_QUOTA: Duration = Duration::from_secs(2);

/// Order in which a sink wants rows delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOrder {
    TopDown,
    BottomUp,
}

/// Receives smoothed ridge-line segments, row by row.
pub trait LineSink {
    fn order(&self) -> DrawOrder;

    fn begin_row(&mut self, _y: usize) {}

    /// Draws one segment. Points run left to right.
    fn draw_segment(&mut self, segment: &SmoothedRange);

    fn end_row(&mut self) {}
}

/// Rows of `extractor`'s grid in the order `order` asks for.
fn rows_in_order(extractor: &Extractor<'_>, order: DrawOrder) -> Vec<usize> {
    let rows = extractor.grid().rows();
    match order {
        DrawOrder::TopDown => rows.collect(),
        DrawOrder::BottomUp => rows.rev().collect(),
    }
}

/// Feeds row `y` to `sink`. Returns `false`, leaving the row
/// unfinished, if `cancel` is set before a segment.
fn draw_row(
    extractor: &Extractor<'_>,
    y: usize,
    sink: &mut impl LineSink,
    cancel: Option<&CancelToken>,
) -> bool {
    sink.begin_row(y);
    for segment in extractor.row(y) {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return false;
        }
        sink.draw_segment(&segment);
    }
    sink.end_row();
    true
}

/// Feeds every row of `extractor` to `sink` in the sink's order.
pub fn draw_all(extractor: &Extractor<'_>, sink: &mut impl LineSink) {
    for y in rows_in_order(extractor, sink.order()) {
        draw_row(extractor, y, sink, None);
    }
}

/// Renders `field` as an SVG document in one go.
pub fn render_svg(field: &HeightField, settings: &Settings, labels: &[Label]) -> String {
    let now = Instant::now();
    let mut sink = VectorSink::new(field.width(), field.height(), settings);
    draw_all(&Extractor::new(field, settings), &mut sink);
    let svg = sink.finish(labels);
    debug!("render_svg; len: {}, exec: {:?}", svg.len(), now.elapsed());
    svg
}

/// Resumable [`draw_all`]: feeds one [`HeightField`] to a sink a few
/// rows per call.
pub struct SlicedRender<S> {
    field: HeightField,
    settings: Settings,
    sink: Option<S>,
    rows: Vec<usize>,
    next: usize,
    cancel: CancelToken,
    elapsed: Duration,
}

impl<S: LineSink> SlicedRender<S> {
    pub fn new(field: HeightField, settings: Settings, sink: S, cancel: CancelToken) -> Self {
        let rows = rows_in_order(&Extractor::new(&field, &settings), sink.order());
        Self {
            field,
            settings,
            sink: Some(sink),
            rows,
            next: 0,
            cancel,
            elapsed: Duration::ZERO,
        }
    }

    /// Draws rows until `quota` has elapsed and hands back the sink once
    /// every row is drawn.
    ///
    /// Cancellation is checked before every segment. Calling again
    /// after `Done` returns `Cancelled`.
    pub fn step(&mut self, quota: Duration) -> Step<S> {
        let start = Instant::now();
        let Some(sink) = self.sink.as_mut() else {
            return Step::Cancelled;
        };
        let extractor = Extractor::new(&self.field, &self.settings);
        while let Some(&y) = self.rows.get(self.next) {
            if !draw_row(&extractor, y, sink, Some(&self.cancel)) {
                return Step::Cancelled;
            }
            self.next += 1;
            if self.next < self.rows.len() && start.elapsed() > quota {
                self.elapsed += start.elapsed();
                return Step::Yield;
            }
        }
        if self.cancel.is_cancelled() {
            return Step::Cancelled;
        }
        self.elapsed += start.elapsed();
        debug!(
            "sliced_render; rows: {}, exec: {:?}",
            self.rows.len(),
            self.elapsed
        );
        self.sink.take().map_or(Step::Cancelled, Step::Done)
    }
}

/// Resumable raster rendering of one [`HeightField`].
pub struct RasterRender(SlicedRender<RasterSink>);

impl RasterRender {
    pub fn new(
        field: HeightField,
        settings: Settings,
        cancel: CancelToken,
    ) -> Result<Self, RidgelineError> {
        let sink = RasterSink::new(field.width(), field.height(), &settings)?;
        Ok(Self(SlicedRender::new(field, settings, sink, cancel)))
    }

    /// Draws rows until `quota` has elapsed.
    pub fn step(&mut self, quota: Duration) -> Result<Step<Pixmap>, RidgelineError> {
        match self.0.step(quota) {
            Step::Yield => Ok(Step::Yield),
            Step::Done(sink) => sink.finish().map(Step::Done),
            Step::Cancelled => Ok(Step::Cancelled),
        }
    }
}

/// Renders `field` to a pixmap in one go.
pub fn render_raster(field: HeightField, settings: Settings) -> Result<Pixmap, RidgelineError> {
    let mut render = RasterRender::new(field, settings, CancelToken::new())?;
    loop {
        match render.step(Duration::MAX)? {
            Step::Done(pixmap) => return Ok(pixmap),
            Step::Yield => {}
            Step::Cancelled => return Err(RidgelineError::Disconnected),
        }
    }
}
