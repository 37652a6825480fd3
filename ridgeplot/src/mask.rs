use anyhow::Result;
use geo::{Geometry, GeometryCollection};
use geojson::{quick_collection, GeoJson};
use ridgeline::Mask;
use std::{fs::File, path::Path};

pub fn open(maybe_path: Option<&Path>) -> Result<Option<Mask>> {
    match maybe_path {
        None => Ok(None),
        Some(path) => {
            let mask_file = File::open(path)?;
            let mask_json = GeoJson::from_reader(mask_file)?;
            let shapes: GeometryCollection<f64> = quick_collection(&mask_json)?;
            let mask = Mask::new(&Geometry::GeometryCollection(shapes), None)?;
            Ok(Some(mask))
        }
    }
}
