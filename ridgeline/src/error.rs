use thiserror::Error;

#[derive(Error, Debug)]
pub enum RidgelineError {
    #[error("no tiles cover the requested viewport")]
    NoTiles,

    #[error("too many tiles requested ({width}x{height})")]
    TooManyTiles { width: usize, height: usize },

    #[error("unsupported mask geometry {0}")]
    UnsupportedGeometry(&'static str),

    #[error("viewport pixel ({x}, {y}) maps outside the elevation raster")]
    OutOfRaster { x: usize, y: usize },

    #[error("viewport is empty")]
    EmptyViewport,

    #[error("could not allocate {width}x{height} drawing surface")]
    Surface { width: usize, height: usize },

    #[error("png encoding failed: {0}")]
    Png(String),

    #[error("tile compositing exited before reporting a result")]
    Disconnected,
}
