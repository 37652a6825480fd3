//! Request-level orchestration.
//!
//! A [`RenderJob`] runs compositing, sampling and rendering strictly in
//! that order, one stage at a time, driven by the host calling
//! [`RenderJob::tick`]. A [`Pipeline`] keeps at most one job live:
//! starting a new one cancels its predecessor.

use crate::{
    composite::{composite, RasterBuffer, TileBounds},
    mask::Mask,
    progress::ProgressSink,
    render::{render_svg, RasterRender, RASTER_QUOTA},
    sampler::{HeightSampler, FRAME_QUOTA},
    svg::Label,
    tile_source::TileSource,
    viewport::{MercatorViewport, Projection},
    CancelToken, Progress, RenderProgress, RidgelineError, Settings, Step,
};
use log::debug;
use std::{
    sync::{
        mpsc::{self, Receiver, TryRecvError},
        Arc,
    },
    time::Duration,
};
use terrainrgb::TileCoord;
use tiny_skia::Pixmap;

/// What a request produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A pixmap, time-sliced across ticks.
    Raster,
    /// An SVG document, rendered in one tick.
    Vector { labels: Vec<Label> },
}

#[derive(Debug, Clone)]
pub enum RenderOutput {
    Raster(Pixmap),
    Svg(String),
}

impl RenderOutput {
    /// Returns the output as file contents: PNG for rasters, UTF-8
    /// text for SVG.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RidgelineError> {
        match self {
            RenderOutput::Raster(pixmap) => pixmap
                .encode_png()
                .map_err(|e| RidgelineError::Png(e.to_string())),
            RenderOutput::Svg(svg) => Ok(svg.clone().into_bytes()),
        }
    }
}

/// Everything needed to render one viewport.
pub struct RenderRequest {
    /// Tiles covering the viewport, all at one zoom.
    pub tiles: Vec<TileCoord>,
    pub projection: Arc<dyn Projection>,
    pub width: usize,
    pub height: usize,
    pub mask: Option<Mask>,
    pub settings: Settings,
    pub target: Target,
}

impl RenderRequest {
    /// Builds a request covering `view` with tiles at its integer zoom.
    pub fn for_viewport(view: MercatorViewport, settings: Settings, target: Target) -> Self {
        Self {
            tiles: view.covering_tiles(),
            projection: Arc::new(view),
            width: view.width(),
            height: view.height(),
            mask: None,
            settings,
            target,
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// Owns the tile cache and the single live job.
pub struct Pipeline {
    source: Arc<TileSource>,
    sink: Arc<dyn ProgressSink>,
    current: Option<Progress>,
}

impl Pipeline {
    pub fn new(source: TileSource, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            source: Arc::new(source),
            sink,
            current: None,
        }
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    /// Cancels the live job, if any, and starts `request`.
    ///
    /// Fails fast, before anything is fetched, if the covering tile set
    /// is empty or too large.
    pub fn start(&mut self, request: RenderRequest) -> Result<RenderJob, RidgelineError> {
        self.cancel();
        let progress = Progress::new(Arc::clone(&self.sink), CancelToken::new());
        let job = RenderJob::new(request, Arc::clone(&self.source), progress.clone())?;
        self.current = Some(progress);
        Ok(job)
    }

    /// Cancels the live job. Its progress is cleared once and never
    /// updated again.
    pub fn cancel(&mut self) {
        if let Some(progress) = self.current.take() {
            progress.cancel();
        }
    }
}

type Composited = Result<Option<RasterBuffer>, RidgelineError>;

enum Stage {
    Compositing(Receiver<Composited>),
    Sampling(HeightSampler),
    Rendering(RasterRender),
    Finished,
}

/// One render request in flight.
pub struct RenderJob {
    stage: Stage,
    projection: Arc<dyn Projection>,
    width: usize,
    height: usize,
    mask: Option<Mask>,
    settings: Settings,
    target: Target,
    progress: Progress,
}

impl RenderJob {
    /// Starts fetching tiles for `request` in the background.
    pub fn new(
        request: RenderRequest,
        source: Arc<TileSource>,
        progress: Progress,
    ) -> Result<Self, RidgelineError> {
        let RenderRequest {
            tiles,
            projection,
            width,
            height,
            mask,
            settings,
            target,
        } = request;
        TileBounds::new(&tiles)?;
        if width == 0 || height == 0 {
            return Err(RidgelineError::EmptyViewport);
        }

        let (tx, rx) = mpsc::channel();
        let task_progress = progress.clone();
        rayon::spawn(move || {
            let composited = composite(&tiles, &source, &task_progress);
            // The job may have been dropped.
            let _ = tx.send(composited);
        });

        Ok(Self {
            stage: Stage::Compositing(rx),
            projection,
            width,
            height,
            mask,
            settings,
            target,
            progress,
        })
    }

    /// Advances the current stage by one time slice.
    ///
    /// Never blocks on the network: while tiles are still downloading
    /// this returns `Yield` immediately.
    pub fn tick(&mut self) -> Result<Step<RenderOutput>, RidgelineError> {
        self.advance(false)
    }

    /// Runs every stage to the end on the calling thread.
    ///
    /// Returns `Ok(None)` if the job was cancelled.
    pub fn run_to_completion(mut self) -> Result<Option<RenderOutput>, RidgelineError> {
        loop {
            match self.advance(true)? {
                Step::Yield => {}
                Step::Done(output) => return Ok(Some(output)),
                Step::Cancelled => return Ok(None),
            }
        }
    }

    /// Cancels this job. Idempotent.
    pub fn cancel(&self) {
        self.progress.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.progress.is_cancelled()
    }

    /// Returns the latest progress report.
    pub fn progress(&self) -> RenderProgress {
        self.progress.snapshot()
    }

    fn advance(&mut self, block: bool) -> Result<Step<RenderOutput>, RidgelineError> {
        if self.progress.is_cancelled() {
            self.stage = Stage::Finished;
            return Ok(Step::Cancelled);
        }
        let result = self.advance_stage(block);
        if result.is_err() {
            self.progress.finish();
        }
        result
    }

    /// Runs one slice of the current stage. The stage is left as
    /// `Finished` if this returns an error.
    fn advance_stage(&mut self, block: bool) -> Result<Step<RenderOutput>, RidgelineError> {
        let (sample_quota, raster_quota) = if block {
            (Duration::MAX, Duration::MAX)
        } else {
            (FRAME_QUOTA, RASTER_QUOTA)
        };

        let (next, step) = match std::mem::replace(&mut self.stage, Stage::Finished) {
            Stage::Compositing(rx) => {
                let received = if block {
                    rx.recv().map_err(|_| RidgelineError::Disconnected)
                } else {
                    match rx.try_recv() {
                        Ok(composited) => Ok(composited),
                        Err(TryRecvError::Empty) => {
                            self.stage = Stage::Compositing(rx);
                            return Ok(Step::Yield);
                        }
                        Err(TryRecvError::Disconnected) => Err(RidgelineError::Disconnected),
                    }
                };
                match received?? {
                    Some(raster) => {
                        let sampler = HeightSampler::new(
                            raster,
                            Arc::clone(&self.projection),
                            self.width,
                            self.height,
                            self.mask.take(),
                            self.progress.clone(),
                        )?;
                        (Stage::Sampling(sampler), Step::Yield)
                    }
                    None => (Stage::Finished, Step::Cancelled),
                }
            }

            Stage::Sampling(mut sampler) => match sampler.step(sample_quota)? {
                Step::Yield => (Stage::Sampling(sampler), Step::Yield),
                Step::Cancelled => (Stage::Finished, Step::Cancelled),
                Step::Done(field) => match &self.target {
                    Target::Raster => {
                        self.progress.message("Rendering...");
                        let cancel = self.progress.cancel_token().clone();
                        let render = RasterRender::new(field, self.settings.clone(), cancel)?;
                        (Stage::Rendering(render), Step::Yield)
                    }
                    Target::Vector { labels } => {
                        self.progress.message("Rendering...");
                        let svg = render_svg(&field, &self.settings, labels);
                        self.finish(Step::Done(RenderOutput::Svg(svg)))
                    }
                },
            },

            Stage::Rendering(mut render) => match render.step(raster_quota)? {
                Step::Yield => (Stage::Rendering(render), Step::Yield),
                Step::Cancelled => (Stage::Finished, Step::Cancelled),
                Step::Done(pixmap) => self.finish(Step::Done(RenderOutput::Raster(pixmap))),
            },

            Stage::Finished => (Stage::Finished, Step::Cancelled),
        };
        self.stage = next;
        Ok(step)
    }

    fn finish(&self, step: Step<RenderOutput>) -> (Stage, Step<RenderOutput>) {
        if self.progress.is_cancelled() {
            return (Stage::Finished, Step::Cancelled);
        }
        debug!("render finished; size: {}x{}", self.width, self.height);
        self.progress.finish();
        (Stage::Finished, step)
    }
}

/// Drives `job` to completion on the calling thread.
pub fn render_blocking(job: RenderJob) -> Result<Option<RenderOutput>, RidgelineError> {
    job.run_to_completion()
}

#[cfg(test)]
mod tests {
    use super::{Pipeline, RenderOutput, RenderRequest, Target};
    use crate::{
        tile_source::{FetchError, TileSource, UrlTemplate},
        MercatorViewport, RenderProgress, RidgelineError, Settings,
    };
    use geo::geometry::Coord;
    use std::sync::Arc;
    use terrainrgb::TileSize;

    fn pipeline() -> Pipeline {
        let source = TileSource::new(
            UrlTemplate::new("{z}/{x}/{y}"),
            TileSize::Standard,
            |_: &str| Err::<Vec<u8>, _>(FetchError::Status(404)),
        );
        Pipeline::new(source, Arc::new(|_: Option<&RenderProgress>| {}))
    }

    #[test]
    fn test_too_many_tiles_fails_fast() {
        let view = MercatorViewport::new(
            Coord { x: 0.0, y: 0.0 },
            12.0,
            256 * 60,
            256,
            TileSize::Standard,
        );
        let request = RenderRequest::for_viewport(view, Settings::default(), Target::Raster);
        let mut pipeline = pipeline();
        assert!(matches!(
            pipeline.start(request),
            Err(RidgelineError::TooManyTiles { .. })
        ));
        assert!(pipeline.source().is_empty());
    }

    #[test]
    fn test_restart_cancels_previous_job() {
        let view = MercatorViewport::new(
            Coord { x: 10.0, y: 10.0 },
            8.0,
            64,
            64,
            TileSize::Standard,
        );
        let mut pipeline = pipeline();
        let first = pipeline
            .start(RenderRequest::for_viewport(view, Settings::default(), Target::Raster))
            .unwrap();
        let second = pipeline
            .start(RenderRequest::for_viewport(view, Settings::default(), Target::Raster))
            .unwrap();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(first.run_to_completion().unwrap().is_none());
        assert!(second.run_to_completion().unwrap().is_some());
    }

    #[test]
    fn test_high_latitude_view_renders() {
        let view = MercatorViewport::new(
            Coord { x: 15.0, y: 82.0 },
            3.0,
            640,
            400,
            TileSize::Standard,
        );
        let labels = Vec::new();
        let request =
            RenderRequest::for_viewport(view, Settings::default(), Target::Vector { labels });
        let job = pipeline().start(request).unwrap();
        let output = job.run_to_completion().unwrap();
        assert!(matches!(output, Some(RenderOutput::Svg(_))));
    }
}
