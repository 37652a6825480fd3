mod mask;
mod options;
mod progress;

use anyhow::{anyhow, Error as AnyError};
use clap::Parser;
use log::info;
use options::{Cli, Command as CliCmd};
use progress::BarSink;
use ridgeline::{
    render_blocking, FileFetch, HttpFetch, Label, MercatorViewport, Pipeline,
    RenderRequest, Settings, Target, TileSource, UrlTemplate,
};
use std::{fs::File, sync::Arc};
use terrainrgb::TileSize;

#[allow(clippy::cast_precision_loss)]
fn main() -> Result<(), AnyError> {
    let Cli {
        center,
        zoom,
        width,
        height,
        settings,
        mask: mask_path,
        token,
        tiles,
        sd,
        cmd,
    } = Cli::parse();

    env_logger::init();

    let settings = match settings {
        Some(path) => serde_json::from_reader(File::open(path)?)?,
        None => Settings::default(),
    };
    let tile_size = if sd { TileSize::Standard } else { TileSize::Hd };
    let source = tile_source(tiles, token, tile_size)?;

    let view = MercatorViewport::new(center.0, zoom, width, height, tile_size);
    let (target, out) = match cmd {
        CliCmd::Png { out } => (Target::Raster, out),
        CliCmd::Svg { out, label } => {
            let labels = label
                .into_iter()
                .map(|text| Label {
                    text,
                    x: width as f64 - 10.0,
                    y: height as f64 - 10.0,
                    font_family: "sans-serif".to_string(),
                    font_size: 12.0,
                    color: settings.line_color,
                })
                .collect();
            (Target::Vector { labels }, out)
        }
    };

    let mut request = RenderRequest::for_viewport(view, settings, target);
    if let Some(mask) = mask::open(mask_path.as_deref())? {
        request = request.with_mask(mask);
    }
    info!("rendering {} tiles", request.tiles.len());

    let mut pipeline = Pipeline::new(source, Arc::new(BarSink::default()));
    let job = pipeline.start(request)?;
    let output = render_blocking(job)?.ok_or_else(|| anyhow!("render was cancelled"))?;
    std::fs::write(&out, output.to_bytes()?)?;
    info!("wrote {}", out.display());
    Ok(())
}

/// Picks a fetcher for the tile template: HTTP for URLs, the file
/// system for anything else.
fn tile_source(
    tiles: Option<String>,
    token: Option<String>,
    tile_size: TileSize,
) -> Result<TileSource, AnyError> {
    let source = match (tiles, token) {
        (Some(template), _) if template.starts_with("http://") || template.starts_with("https://") => {
            TileSource::new(UrlTemplate::new(template), tile_size, HttpFetch::new()?)
        }
        (Some(template), _) => TileSource::new(UrlTemplate::new(template), tile_size, FileFetch),
        (None, Some(token)) => {
            TileSource::new(UrlTemplate::mapbox(&token), tile_size, HttpFetch::new()?)
        }
        (None, None) => return Err(anyhow!("either --tiles or --token is required")),
    };
    Ok(source)
}
