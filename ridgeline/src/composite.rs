//! Stitches covering tiles into a single raster.

use crate::{tile_source::TileSource, Progress, RidgelineError};
use geo::geometry::Coord;
use image::{imageops, Rgba, RgbaImage};
use log::debug;
use rayon::prelude::*;
use std::time::Instant;
use terrainrgb::{coord_to_tile, decode_height, zoom_power, Elev, TerrainTile, TileCoord, C};

/// Largest covering set, in tiles, along either axis.
pub const MAX_TILES_PER_SIDE: usize = 50;

/// Integer extent of a covering tile set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub z: u8,
}

impl TileBounds {
    /// Returns the extent of `tiles`, failing if it is empty or more
    /// than [`MAX_TILES_PER_SIDE`] tiles wide or tall.
    pub fn new(tiles: &[TileCoord]) -> Result<Self, RidgelineError> {
        let first = tiles.first().ok_or(RidgelineError::NoTiles)?;
        let bounds = tiles.iter().fold(
            Self {
                min_x: first.x,
                min_y: first.y,
                max_x: first.x,
                max_y: first.y,
                z: first.z,
            },
            |b, t| Self {
                min_x: b.min_x.min(t.x),
                min_y: b.min_y.min(t.y),
                max_x: b.max_x.max(t.x),
                max_y: b.max_y.max(t.y),
                z: b.z,
            },
        );
        let (width, height) = (bounds.width(), bounds.height());
        if width > MAX_TILES_PER_SIDE || height > MAX_TILES_PER_SIDE {
            return Err(RidgelineError::TooManyTiles { width, height });
        }
        Ok(bounds)
    }

    /// Width in tiles.
    #[allow(clippy::cast_sign_loss)]
    pub fn width(&self) -> usize {
        (self.max_x - self.min_x) as usize + 1
    }

    /// Height in tiles.
    #[allow(clippy::cast_sign_loss)]
    pub fn height(&self) -> usize {
        (self.max_y - self.min_y) as usize + 1
    }
}

/// Covering tiles drawn into one contiguous image.
///
/// Pixel `(0, 0)` is the top-left corner of the tile at
/// `(bounds.min_x, bounds.min_y)`.
pub struct RasterBuffer {
    image: RgbaImage,
    bounds: TileBounds,
    tile_px: u32,
    zoom_power: C,
}

impl RasterBuffer {
    /// Returns an unpainted buffer sized for `bounds`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(bounds: TileBounds, tile_px: u32) -> Self {
        let image = RgbaImage::new(
            bounds.width() as u32 * tile_px,
            bounds.height() as u32 * tile_px,
        );
        Self {
            image,
            bounds,
            tile_px,
            zoom_power: zoom_power(bounds.z),
        }
    }

    pub fn bounds(&self) -> &TileBounds {
        &self.bounds
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Draws `tile` at its slot in the buffer.
    pub fn draw(&mut self, coord: TileCoord, tile: &TerrainTile) {
        let x = i64::from(coord.x - self.bounds.min_x) * i64::from(self.tile_px);
        let y = i64::from(coord.y - self.bounds.min_y) * i64::from(self.tile_px);
        imageops::replace(&mut self.image, tile.image(), x, y);
    }

    /// Returns the buffer pixel nearest to geographic `coord`, or
    /// `None` if it falls outside the buffer.
    ///
    /// A coordinate exactly on the far edge rounds onto the last
    /// pixel.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn pixel_for(&self, coord: Coord<C>) -> Option<(u32, u32)> {
        let tile = coord_to_tile(coord, self.zoom_power);
        let px = C::from(self.tile_px);
        let x = ((tile.x - C::from(self.bounds.min_x)) * px).round();
        let y = ((tile.y - C::from(self.bounds.min_y)) * px).round();
        let (width, height) = self.image.dimensions();
        if (0.0..=C::from(width)).contains(&x) && (0.0..=C::from(height)).contains(&y) {
            Some(((x as u32).min(width - 1), (y as u32).min(height - 1)))
        } else {
            None
        }
    }

    /// Returns the decoded height at buffer pixel `(x, y)`.
    ///
    /// Panics if the pixel is out of bounds.
    pub fn height_at_pixel(&self, (x, y): (u32, u32)) -> Elev {
        let Rgba([r, g, b, _]) = *self.image.get_pixel(x, y);
        decode_height(r, g, b)
    }

    /// Returns the decoded height at `coord`, if it is covered.
    pub fn height_at(&self, coord: Coord<C>) -> Option<Elev> {
        self.pixel_for(coord).map(|px| self.height_at_pixel(px))
    }
}

/// Fetches every tile in `tiles` concurrently and draws them into a
/// [`RasterBuffer`].
///
/// Tiles which fail to load are replaced with the sentinel sea-level
/// tile. Returns `Ok(None)` if the request was cancelled.
pub fn composite(
    tiles: &[TileCoord],
    source: &TileSource,
    progress: &Progress,
) -> Result<Option<RasterBuffer>, RidgelineError> {
    let bounds = TileBounds::new(tiles)?;
    let tile_size = source.tile_size();
    progress.start(tiles.len());

    let now = Instant::now();
    let loaded: Vec<_> = tiles
        .par_iter()
        .filter(|_| !progress.is_cancelled())
        .map(|&coord| {
            let tile = source.get(coord);
            progress.advance();
            (coord, tile)
        })
        .collect();
    if progress.is_cancelled() {
        return Ok(None);
    }

    let mut raster = RasterBuffer::new(bounds, tile_size.pixels());
    let sentinel = TerrainTile::sentinel(tile_size);
    for (coord, tile) in loaded {
        match tile {
            Ok(tile) => raster.draw(coord, &tile),
            Err(e) => {
                debug!("drawing sentinel in lieu of {coord:?}: {e}");
                raster.draw(coord, &sentinel);
            }
        }
    }

    debug!(
        "composite; tiles: {}, size: {:?}, exec: {:?}",
        tiles.len(),
        raster.image.dimensions(),
        now.elapsed()
    );
    Ok(Some(raster))
}
