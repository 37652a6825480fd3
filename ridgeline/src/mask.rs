//! Region masks.

use crate::RidgelineError;
use geo::{
    geometry::{Coord, Geometry, Polygon, Rect},
    BoundingRect, Contains, Simplify,
};
use terrainrgb::C;

/// Point-in-region predicate built from a boundary polygon.
///
/// Coordinates outside the bounding box are always outside. Inside the
/// box, a coordinate is inside if any of the (simplified) polygons
/// contains it.
#[derive(Debug, Clone)]
pub struct Mask {
    bbox: Rect<C>,
    shape: Shape,
}

#[derive(Debug, Clone)]
enum Shape {
    /// The geometry includes a point; only the bounding box applies.
    Anywhere,
    Polygons(Vec<Polygon<C>>),
}

impl Mask {
    /// Builds a mask from `geometry`.
    ///
    /// `bbox` defaults to the geometry's bounding rectangle. Exterior
    /// rings are simplified to a tolerance of a thousandth of the box's
    /// width; holes are ignored. A point anywhere in `geometry` makes
    /// the whole bounding box inside, whatever polygons accompany it.
    pub fn new(geometry: &Geometry<C>, bbox: Option<Rect<C>>) -> Result<Self, RidgelineError> {
        let bbox = bbox
            .or_else(|| geometry.bounding_rect())
            .ok_or(RidgelineError::UnsupportedGeometry("without extent"))?;
        let tolerance = bbox.width() / 1000.0;

        let mut polygons = Vec::new();
        let anywhere = collect(geometry, tolerance, &mut polygons)?;
        let shape = if anywhere {
            Shape::Anywhere
        } else {
            Shape::Polygons(polygons)
        };
        Ok(Self { bbox, shape })
    }

    /// Returns `true` if `coord` (x: lon, y: lat) is inside the region.
    pub fn contains(&self, coord: Coord<C>) -> bool {
        let (min, max) = (self.bbox.min(), self.bbox.max());
        let in_bbox = min.x <= coord.x && coord.x <= max.x && min.y <= coord.y && coord.y <= max.y;
        in_bbox
            && match &self.shape {
                Shape::Anywhere => true,
                Shape::Polygons(polygons) => polygons.iter().any(|p| p.contains(&coord)),
            }
    }
}

/// Pushes simplified polygons from `geometry` onto `out`.
///
/// Returns `true` if a point was encountered.
fn collect(
    geometry: &Geometry<C>,
    tolerance: C,
    out: &mut Vec<Polygon<C>>,
) -> Result<bool, RidgelineError> {
    let simplified = |polygon: &Polygon<C>| Polygon::new(polygon.exterior().simplify(&tolerance), vec![]);
    match geometry {
        Geometry::Point(_) => Ok(true),
        Geometry::Polygon(polygon) => {
            out.push(simplified(polygon));
            Ok(false)
        }
        Geometry::MultiPolygon(multi) => {
            out.extend(multi.iter().map(simplified));
            Ok(false)
        }
        Geometry::GeometryCollection(collection) => {
            let mut anywhere = false;
            for geometry in collection {
                anywhere |= collect(geometry, tolerance, out)?;
            }
            Ok(anywhere)
        }
        Geometry::Line(_) => Err(RidgelineError::UnsupportedGeometry("Line")),
        Geometry::LineString(_) => Err(RidgelineError::UnsupportedGeometry("LineString")),
        Geometry::MultiLineString(_) => Err(RidgelineError::UnsupportedGeometry("MultiLineString")),
        Geometry::MultiPoint(_) => Err(RidgelineError::UnsupportedGeometry("MultiPoint")),
        Geometry::Rect(_) => Err(RidgelineError::UnsupportedGeometry("Rect")),
        Geometry::Triangle(_) => Err(RidgelineError::UnsupportedGeometry("Triangle")),
    }
}
