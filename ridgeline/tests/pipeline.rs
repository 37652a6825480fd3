use geo::geometry::Coord;
use image::{ImageOutputFormat, Rgba as Pixel, RgbaImage};
use ridgeline::{
    CancelToken, FetchError, Label, MercatorViewport, Pipeline, Progress, RenderJob,
    RenderOutput, RenderProgress, RenderRequest, Rgba, Settings, Step, Target, TileSource,
    UrlTemplate,
};
use std::{
    io::Cursor,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};
use terrainrgb::{decode_height, TileSize};

const MT_WASHINGTON: Coord = Coord {
    y: 44.2705,
    x: -71.30325,
};

type Log = Arc<Mutex<Vec<Option<RenderProgress>>>>;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_height(h: f64) -> [u8; 3] {
    let v = ((h + 10000.0) * 10.0).round() as u32;
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}

/// Synthetic terrain: ridges running north-south with sea between.
fn terrain_png(x: i32, y: i32) -> Vec<u8> {
    let image = RgbaImage::from_fn(256, 256, |px, py| {
        let gx = f64::from(x) * 256.0 + f64::from(px);
        let gy = f64::from(y) * 256.0 + f64::from(py);
        let h = 600.0 * (gx / 40.0).sin() + 150.0 * (gy / 25.0).cos();
        let [r, g, b] = encode_height(h);
        Pixel([r, g, b, 255])
    });
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageOutputFormat::Png).unwrap();
    bytes.into_inner()
}

/// Serves `z/x/y` URLs from [`terrain_png`], failing for `broken`.
fn source(broken: Option<String>) -> TileSource {
    TileSource::new(
        UrlTemplate::new("{z}/{x}/{y}"),
        TileSize::Standard,
        move |url: &str| {
            if broken.as_deref() == Some(url) {
                return Err(FetchError::Status(500));
            }
            let parts: Vec<i32> = url.split('/').map(|p| p.parse().unwrap()).collect();
            Ok(terrain_png(parts[1], parts[2]))
        },
    )
}

fn recording() -> (Arc<dyn ridgeline::ProgressSink>, Log) {
    let log: Log = Arc::default();
    let sink = {
        let log = Arc::clone(&log);
        move |p: Option<&RenderProgress>| log.lock().unwrap().push(p.cloned())
    };
    (Arc::new(sink), log)
}

fn view() -> MercatorViewport {
    MercatorViewport::new(MT_WASHINGTON, 10.0, 320, 240, TileSize::Standard)
}

#[test]
fn test_encode_height() {
    let [r, g, b] = encode_height(1234.5);
    assert!((decode_height(r, g, b) - 1234.5).abs() < 0.05);
}

#[test]
fn test_raster_render() {
    let (sink, log) = recording();
    let mut pipeline = Pipeline::new(source(None), sink);
    let job = pipeline
        .start(RenderRequest::for_viewport(
            view(),
            Settings::default(),
            Target::Raster,
        ))
        .unwrap();
    let tiles = view().covering_tiles().len();

    let Some(RenderOutput::Raster(pixmap)) = job.run_to_completion().unwrap() else {
        panic!("expected a raster");
    };
    assert_eq!((pixmap.width(), pixmap.height()), (320, 240));

    // Some pixels are line colour, most are paper.
    let inked = pixmap
        .pixels()
        .iter()
        .filter(|p| p.red() < 100 && p.green() < 100 && p.blue() < 100)
        .count();
    assert!(inked > 0);
    assert!(inked < 320 * 240 / 2);

    let log = log.lock().unwrap();
    let last_download = format!("Downloading tiles: {tiles} of {tiles}...");
    assert!(log.iter().flatten().any(|p| p.message == last_download));
    assert!(log
        .iter()
        .flatten()
        .any(|p| p.message.starts_with("Computing elevation lines")));
    assert_eq!(log.last(), Some(&None));
    assert_eq!(pipeline.source().len(), tiles);
}

#[test]
fn test_svg_render_with_failed_tile() {
    let tile = view().covering_tiles()[0];
    let broken = format!("{}/{}/{}", tile.z, tile.x, tile.y);
    let (sink, log) = recording();
    let mut pipeline = Pipeline::new(source(Some(broken)), sink);
    let labels = vec![Label {
        text: "© Terrain & Co".to_string(),
        x: 310.0,
        y: 230.0,
        font_family: "sans-serif".to_string(),
        font_size: 10.0,
        color: Rgba::new(0, 0, 0, 1.0),
    }];
    let job = pipeline
        .start(RenderRequest::for_viewport(
            view(),
            Settings::default(),
            Target::Vector { labels },
        ))
        .unwrap();

    let Some(RenderOutput::Svg(svg)) = job.run_to_completion().unwrap() else {
        panic!("expected svg");
    };
    assert!(svg.contains(r#"viewBox="0 0 320 240""#));
    assert!(svg.contains("<path d=\"M"));
    assert!(svg.contains("© Terrain &amp; Co</text>"));

    let log = log.lock().unwrap();
    let tiles = view().covering_tiles().len();
    let completed = log.iter().flatten().map(|p| p.completed).max();
    assert_eq!(completed, Some(tiles));
}

#[test]
fn test_cancel_mid_sample() {
    let (sink, log) = recording();
    let progress = Progress::new(sink, CancelToken::new());
    let request = RenderRequest::for_viewport(view(), Settings::default(), Target::Raster);
    let mut job = RenderJob::new(request, Arc::new(source(None)), progress).unwrap();

    // Tick until sampling has begun.
    loop {
        match job.tick().unwrap() {
            Step::Yield if job.progress().message.starts_with("Computing") => break,
            Step::Yield => thread::sleep(Duration::from_millis(1)),
            _ => panic!("job ended before sampling"),
        }
    }

    job.cancel();
    let seen = log.lock().unwrap().len();
    assert_eq!(log.lock().unwrap().last(), Some(&None));

    for _ in 0..3 {
        assert!(matches!(job.tick().unwrap(), Step::Cancelled));
    }
    assert_eq!(log.lock().unwrap().len(), seen);
}
