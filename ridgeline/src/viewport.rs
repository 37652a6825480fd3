//! Screen ⇄ geographic mapping.

use geo::geometry::Coord;
use terrainrgb::{
    lat_to_tile_y, lon_to_tile_x, tile_x_to_lon, tile_y_to_lat, TileCoord, TileSize, C, MAX_LATITUDE,
};

/// Forward and inverse projection between screen pixels and
/// geographic coordinates (x: lon, y: lat).
///
/// Supplied by whatever hosts the map.
pub trait Projection: Send + Sync {
    /// Returns the geographic coordinate under screen pixel `(x, y)`.
    fn unproject(&self, x: C, y: C) -> Coord<C>;

    /// Returns the screen pixel for a geographic coordinate.
    fn project(&self, coord: Coord<C>) -> Coord<C>;
}

/// Geographic bounding box in degrees.
///
/// `east < west` means the box crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub north: C,
    pub south: C,
    pub east: C,
    pub west: C,
}

impl GeoBounds {
    pub fn new(north: C, south: C, east: C, west: C) -> Self {
        debug_assert!(north > south);
        Self {
            north,
            south,
            east,
            west,
        }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.east < self.west
    }

    /// Returns every tile at zoom `z` which intersects these bounds.
    ///
    /// Columns east of the antimeridian are numbered past `2^z` so the
    /// set stays contiguous.
    pub fn covering_tiles(&self, z: u8) -> Vec<TileCoord> {
        let east = if self.crosses_antimeridian() {
            self.east + 360.0
        } else {
            self.east
        };
        let nw = TileCoord::containing(
            Coord {
                x: self.west,
                y: self.north,
            },
            z,
        );
        let se = TileCoord::containing(
            Coord {
                x: east,
                y: self.south,
            },
            z,
        );
        tile_range(nw, se)
    }
}

/// A web-mercator view of `width`×`height` pixels centered on
/// `center` at fractional `zoom`.
///
/// Like a slippy map, the view never scrolls past the poles: near them
/// it is shifted vertically so its top and bottom stay inside the
/// world, and `center` no longer lands in the middle of the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorViewport {
    center: Coord<C>,
    zoom: C,
    width: usize,
    height: usize,
    tile_size: TileSize,
}

impl MercatorViewport {
    pub fn new(center: Coord<C>, zoom: C, width: usize, height: usize, tile_size: TileSize) -> Self {
        let center = Coord {
            x: center.x,
            y: center.y.clamp(-MAX_LATITUDE, MAX_LATITUDE),
        };
        Self {
            center,
            zoom,
            width,
            height,
            tile_size,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Integer zoom level of the tiles backing this view.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn tile_zoom(&self) -> u8 {
        self.zoom.floor().clamp(0.0, 22.0) as u8
    }

    /// Returns the geographic extent of the view.
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self) -> GeoBounds {
        let nw = self.unproject(0.0, 0.0);
        let se = self.unproject(self.width as C, self.height as C);
        GeoBounds::new(nw.y, se.y, wrap_lon(se.x), wrap_lon(nw.x))
    }

    /// Returns the tiles at [`Self::tile_zoom`] under every pixel of
    /// the view.
    #[allow(clippy::cast_precision_loss)]
    pub fn covering_tiles(&self) -> Vec<TileCoord> {
        let z = self.tile_zoom();
        let last_x = self.width.saturating_sub(1) as C;
        let last_y = self.height.saturating_sub(1) as C;
        let nw = TileCoord::containing(self.unproject(0.0, 0.0), z);
        let se = TileCoord::containing(self.unproject(last_x, last_y), z);
        tile_range(nw, se)
    }

    /// Size of the whole world in pixels at this zoom.
    fn world_px(&self) -> C {
        C::from(self.tile_size.pixels()) * self.zoom.exp2()
    }

    /// World pixel coordinates of the view's top-left corner.
    #[allow(clippy::cast_precision_loss)]
    fn origin(&self) -> Coord<C> {
        let world = self.world_px();
        let height = self.height as C;
        let top = lat_to_tile_y(self.center.y, 1.0) * world - height / 2.0;
        Coord {
            x: lon_to_tile_x(self.center.x, 1.0) * world - self.width as C / 2.0,
            y: if height <= world {
                top.clamp(0.0, world - height)
            } else {
                (world - height) / 2.0
            },
        }
    }
}

impl Projection for MercatorViewport {
    fn unproject(&self, x: C, y: C) -> Coord<C> {
        let world = self.world_px();
        let origin = self.origin();
        Coord {
            x: tile_x_to_lon((origin.x + x) / world, 1.0),
            y: tile_y_to_lat((origin.y + y) / world, 1.0),
        }
    }

    fn project(&self, coord: Coord<C>) -> Coord<C> {
        let world = self.world_px();
        let origin = self.origin();
        let lat = coord.y.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        Coord {
            x: lon_to_tile_x(coord.x, 1.0) * world - origin.x,
            y: lat_to_tile_y(lat, 1.0) * world - origin.y,
        }
    }
}

/// Returns a row-major list of every tile in the rectangle spanned by
/// `nw` and `se`.
fn tile_range(nw: TileCoord, se: TileCoord) -> Vec<TileCoord> {
    let z = nw.z;
    (nw.y.min(se.y)..=nw.y.max(se.y))
        .flat_map(|y| (nw.x.min(se.x)..=nw.x.max(se.x)).map(move |x| TileCoord::new(x, y, z)))
        .collect()
}

fn wrap_lon(lon: C) -> C {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}
