use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerrainRgbError {
    #[error("{0}")]
    Image(#[from] image::ImageError),

    #[error("expected {expected}x{expected} tile, got {}x{}", actual.0, actual.1)]
    TileDimensions { expected: u32, actual: (u32, u32) },
}
