//! Terrain-RGB elevation tiles.
//!
//! Terrain-RGB tiles are ordinary web-mercator raster tiles whose
//! three colour channels encode elevation in decimeters above a
//! -10 km datum.
//!
//! # References
//!
//! 1. [Mapbox Terrain-RGB](https://docs.mapbox.com/data/tilesets/reference/mapbox-terrain-rgb-v1/)
//! 1. [Slippy map tilenames](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames)

mod error;

pub use crate::error::TerrainRgbError;
use geo::geometry::Coord;
use image::{ImageFormat, Rgba, RgbaImage};
use std::f64::consts::PI;

/// Base floating point type used for all coordinates and tile math.
pub type C = f64;

/// Decoded elevation in meters.
///
/// Height fields are large and dense, `f32` is plenty for meters.
pub type Elev = f32;

/// Highest latitude representable by the web-mercator tile scheme.
pub const MAX_LATITUDE: C = 85.051_128_779_806_59;

/// Colour drawn in place of tiles which could not be fetched.
///
/// Decodes to exactly 0 m, i.e. sea level.
pub const SENTINEL_RGB: [u8; 3] = [0x01, 0x86, 0xa0];

/// Returns `2^zoom`, the number of tiles along one axis at `zoom`.
pub fn zoom_power(zoom: u8) -> C {
    C::from(zoom).exp2()
}

/// Returns the fractional tile column containing longitude `lon`.
pub fn lon_to_tile_x(lon: C, zoom_power: C) -> C {
    (lon + 180.0) / 360.0 * zoom_power
}

/// Returns the fractional tile row containing latitude `lat`.
///
/// Only defined within ±[`MAX_LATITUDE`]; callers clamp.
pub fn lat_to_tile_y(lat: C, zoom_power: C) -> C {
    let angle = lat.to_radians();
    (1.0 - (angle.tan() + 1.0 / angle.cos()).ln() / PI) / 2.0 * zoom_power
}

/// Inverse of [`lon_to_tile_x`].
pub fn tile_x_to_lon(x: C, zoom_power: C) -> C {
    x / zoom_power * 360.0 - 180.0
}

/// Inverse of [`lat_to_tile_y`].
pub fn tile_y_to_lat(y: C, zoom_power: C) -> C {
    let n = PI - 2.0 * PI * y / zoom_power;
    n.sinh().atan().to_degrees()
}

/// Converts a geographic coordinate (x: lon, y: lat) to fractional
/// tile space.
pub fn coord_to_tile(coord: Coord<C>, zoom_power: C) -> Coord<C> {
    Coord {
        x: lon_to_tile_x(coord.x, zoom_power),
        y: lat_to_tile_y(coord.y, zoom_power),
    }
}

/// Converts fractional tile space back to a geographic coordinate.
pub fn tile_to_coord(tile: Coord<C>, zoom_power: C) -> Coord<C> {
    Coord {
        x: tile_x_to_lon(tile.x, zoom_power),
        y: tile_y_to_lat(tile.y, zoom_power),
    }
}

/// Decodes a Terrain-RGB pixel to meters.
///
/// `height = -10000 + (R·65536 + G·256 + B) · 0.1`
///
/// Heights below -100 m are divided by 5000. One region of the
/// dataset (around Fiji) encodes implausibly deep trenches which
/// would otherwise stretch the height range of every render that
/// touches it.
#[allow(clippy::cast_possible_truncation)]
pub fn decode_height(r: u8, g: u8, b: u8) -> Elev {
    let raw = C::from(r) * 65_536.0 + C::from(g) * 256.0 + C::from(b);
    let mut height = -10_000.0 + raw * 0.1;
    if height < -100.0 {
        height /= 5000.0;
    }
    height as Elev
}

/// Pixel dimensions of requested tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileSize {
    /// 256×256 tiles.
    Standard,

    /// 512×512 tiles, requested with an `@2x` suffix.
    #[default]
    Hd,
}

impl TileSize {
    /// Returns the edge length in pixels.
    pub fn pixels(self) -> u32 {
        match self {
            TileSize::Standard => 256,
            TileSize::Hd => 512,
        }
    }

    /// Returns the URL suffix selecting this size.
    pub fn suffix(self) -> &'static str {
        match self {
            TileSize::Standard => "",
            TileSize::Hd => "@2x",
        }
    }
}

/// Integer tile address.
///
/// `x` is kept unwrapped so that a covering set spanning the
/// antimeridian stays contiguous; use [`TileCoord::wrapped_x`] when
/// addressing the tile server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
    pub z: u8,
}

impl TileCoord {
    pub fn new(x: i32, y: i32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Returns the tile containing `coord` at zoom `z`.
    ///
    /// Rows are clamped to the valid range, columns are not wrapped.
    pub fn containing(coord: Coord<C>, z: u8) -> Self {
        let zp = zoom_power(z);
        let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        #[allow(clippy::cast_possible_truncation)]
        let x = lon_to_tile_x(coord.x, zp).floor() as i32;
        #[allow(clippy::cast_possible_truncation)]
        let y = (lat_to_tile_y(lat, zp).floor() as i32).clamp(0, Self::dim(z) - 1);
        Self { x, y, z }
    }

    /// Returns `x` folded back into `[0, 2^z)`.
    pub fn wrapped_x(&self) -> i32 {
        self.x.rem_euclid(Self::dim(self.z))
    }

    /// Returns the geographic coordinate of this tile's top-left
    /// (north-west) corner.
    pub fn nw_corner(&self) -> Coord<C> {
        tile_to_coord(
            Coord {
                x: C::from(self.x),
                y: C::from(self.y),
            },
            zoom_power(self.z),
        )
    }

    fn dim(z: u8) -> i32 {
        1_i32 << z.min(30)
    }
}

/// One decoded Terrain-RGB tile.
pub struct TerrainTile {
    image: RgbaImage,
}

impl TerrainTile {
    /// Decodes PNG bytes, checking the result is `size` pixels square.
    pub fn from_png(bytes: &[u8], size: TileSize) -> Result<Self, TerrainRgbError> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.into_rgba8();
        let expected = size.pixels();
        if image.dimensions() != (expected, expected) {
            return Err(TerrainRgbError::TileDimensions {
                expected,
                actual: image.dimensions(),
            });
        }
        Ok(Self { image })
    }

    /// Returns a tile filled with [`SENTINEL_RGB`].
    pub fn sentinel(size: TileSize) -> Self {
        let [r, g, b] = SENTINEL_RGB;
        let image = RgbaImage::from_pixel(size.pixels(), size.pixels(), Rgba([r, g, b, 255]));
        Self { image }
    }

    /// Returns the decoded height of the pixel at `(x, y)`, if any.
    pub fn get(&self, x: u32, y: u32) -> Option<Elev> {
        if x < self.image.width() && y < self.image.height() {
            let Rgba([r, g, b, _]) = *self.image.get_pixel(x, y);
            Some(decode_height(r, g, b))
        } else {
            None
        }
    }

    /// Returns the raw RGBA pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}
