//! Terrain-RGB tile fetching and caching.

use dashmap::DashMap;
use log::{debug, warn};
use std::{
    path::Path,
    sync::{Arc, OnceLock},
};
use terrainrgb::{TerrainRgbError, TerrainTile, TileCoord, TileSize};
use thiserror::Error;

/// Why a single tile could not be loaded.
///
/// Never fatal to a render; the compositor draws a sentinel instead.
#[derive(Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "http")]
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Decode(#[from] TerrainRgbError),
}

/// Retrieves raw tile bytes for a URL.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetch for F
where
    F: Fn(&str) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self(url)
    }
}

/// Fetches tiles over HTTP(S).
#[cfg(feature = "http")]
pub struct HttpFetch {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetch {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl Fetch for HttpFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Reads tiles from the local file system, treating URLs as paths.
pub struct FileFetch;

impl Fetch for FileFetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(std::fs::read(Path::new(url))?)
    }
}

/// Tile URL with `{z}`, `{x}`, `{y}` and optional `{suffix}`
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Mapbox's Terrain-RGB endpoint.
    pub fn mapbox(access_token: &str) -> Self {
        Self(format!(
            "https://api.mapbox.com/v4/mapbox.terrain-rgb/{{z}}/{{x}}/{{y}}{{suffix}}.pngraw?access_token={access_token}"
        ))
    }

    /// Returns the URL for `tile`. Columns are wrapped into range.
    pub fn url(&self, tile: TileCoord, size: TileSize) -> String {
        self.0
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.wrapped_x().to_string())
            .replace("{y}", &tile.y.to_string())
            .replace("{suffix}", size.suffix())
    }
}

type Loaded = Result<Arc<TerrainTile>, Arc<FetchError>>;

/// Memoizing tile loader.
///
/// Each URL is fetched at most once per `TileSource`. Concurrent
/// callers asking for the same URL wait on the one in-flight fetch.
/// Failures are remembered too, so a broken tile is not retried.
pub struct TileSource {
    template: UrlTemplate,

    tile_size: TileSize,

    fetcher: Box<dyn Fetch>,

    /// Tiles which have been requested, keyed by URL.
    tiles: DashMap<String, Arc<OnceLock<Loaded>>>,
}

impl TileSource {
    pub fn new(template: UrlTemplate, tile_size: TileSize, fetcher: impl Fetch + 'static) -> Self {
        Self {
            template,
            tile_size,
            fetcher: Box::new(fetcher),
            tiles: DashMap::new(),
        }
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    /// Returns the decoded tile at `coord`, loading it if this source
    /// has never been asked for it.
    pub fn get(&self, coord: TileCoord) -> Loaded {
        let url = self.template.url(coord, self.tile_size);
        // Clone the cell out so the shard lock is released before
        // fetching.
        let cell = Arc::clone(&self.tiles.entry(url.clone()).or_default());
        cell.get_or_init(|| self.load_tile(&url).map(Arc::new).map_err(Arc::new))
            .clone()
    }

    /// Returns the number of distinct URLs requested so far.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl TileSource {
    fn load_tile(&self, url: &str) -> Result<TerrainTile, FetchError> {
        debug!("loading {url}");
        let tile = self
            .fetcher
            .fetch(url)
            .and_then(|bytes| TerrainTile::from_png(&bytes, self.tile_size).map_err(FetchError::from));
        if let Err(e) = &tile {
            warn!("failed to load {url}: {e}");
        }
        tile
    }
}
