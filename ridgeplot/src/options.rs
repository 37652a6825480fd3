use anyhow::{anyhow, Error as AnyError};
use clap::{Parser, Subcommand};
use geo::geometry::Coord;
use std::{path::PathBuf, str::FromStr};

/// Render ridge-line maps of terrain.
#[derive(Parser, Debug)]
pub struct Cli {
    /// Map center "lat,lon"
    #[arg(long)]
    pub center: LatLon,

    /// Fractional web-mercator zoom.
    #[arg(short, long)]
    pub zoom: f64,

    /// Output width in pixels.
    #[arg(long, default_value_t = 1280)]
    pub width: usize,

    /// Output height in pixels.
    #[arg(long, default_value_t = 800)]
    pub height: usize,

    /// JSON file with rendering settings. Missing keys use defaults.
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// GeoJSON polygon outside of which nothing is drawn.
    #[arg(short, long)]
    pub mask: Option<PathBuf>,

    /// Mapbox access token.
    #[arg(long, env = "MAPBOX_TOKEN")]
    pub token: Option<String>,

    /// Tile URL or path template with {z}, {x}, {y} and {suffix}
    /// placeholders. Overrides the Mapbox endpoint.
    #[arg(long)]
    pub tiles: Option<String>,

    /// Use 256px tiles instead of 512px.
    #[arg(long)]
    pub sd: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Clone, Debug)]
pub struct LatLon(pub Coord<f64>);

impl FromStr for LatLon {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (lat_str, lon_str) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid lat,lon pair"))?;
        let lat = f64::from_str(lat_str.trim())?;
        let lon = f64::from_str(lon_str.trim())?;
        Ok(Self(Coord { y: lat, x: lon }))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render to a PNG.
    Png {
        /// PNG file path.
        out: PathBuf,
    },

    /// Render to an SVG.
    Svg {
        /// SVG file path.
        out: PathBuf,

        /// Text placed in the bottom right corner.
        #[arg(long)]
        label: Option<String>,
    },
}
