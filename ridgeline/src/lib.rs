mod cancel;
pub mod composite;
mod error;
pub mod extract;
pub mod mask;
pub mod pipeline;
mod progress;
pub mod render;
pub mod sampler;
mod settings;
pub mod svg;
pub mod tile_source;
mod viewport;

#[cfg(feature = "http")]
pub use crate::tile_source::HttpFetch;
pub use crate::{
    cancel::{CancelToken, Step},
    error::RidgelineError,
    mask::Mask,
    pipeline::{render_blocking, Pipeline, RenderJob, RenderOutput, RenderRequest, Target},
    progress::{Progress, ProgressSink, RenderProgress},
    sampler::HeightField,
    settings::{Rgba, Settings},
    svg::Label,
    tile_source::{Fetch, FetchError, FileFetch, TileSource, UrlTemplate},
    viewport::{GeoBounds, MercatorViewport, Projection},
};
