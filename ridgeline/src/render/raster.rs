use super::{DrawOrder, LineSink};
use crate::{extract::SmoothedRange, settings::Rgba, RidgelineError, Settings};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform};

/// Segments whose smoothed extent is at most this many pixels are
/// stroked but not filled.
pub const MIN_FILL_EXTENT: f64 = 2.0;

/// Paints ridge lines onto a pixmap, top to bottom.
///
/// Each row is filled beneath its line with the line background, so
/// rows drawn later hide whatever they overlap.
pub struct RasterSink {
    pixmap: Pixmap,
    stroke: Paint<'static>,
    fill: Paint<'static>,
    opacity: f32,
}

impl RasterSink {
    /// Returns a `width`×`height` sink cleared to the background colour.
    pub fn new(width: usize, height: usize, settings: &Settings) -> Result<Self, RidgelineError> {
        let mut pixmap = u32::try_from(width)
            .ok()
            .zip(u32::try_from(height).ok())
            .and_then(|(w, h)| Pixmap::new(w, h))
            .ok_or(RidgelineError::Surface { width, height })?;
        pixmap.fill(color(settings.background_color));
        Ok(Self {
            pixmap,
            stroke: paint(settings.line_color),
            fill: paint(settings.line_background),
            opacity: settings.opacity(),
        })
    }

    /// Returns the finished layer with the map opacity applied.
    pub fn finish(self) -> Result<Pixmap, RidgelineError> {
        if self.opacity >= 1.0 {
            return Ok(self.pixmap);
        }
        let (width, height) = (self.pixmap.width(), self.pixmap.height());
        let mut layer = Pixmap::new(width, height).ok_or(RidgelineError::Surface {
            width: width as usize,
            height: height as usize,
        })?;
        layer.draw_pixmap(
            0,
            0,
            self.pixmap.as_ref(),
            &PixmapPaint {
                opacity: self.opacity,
                ..PixmapPaint::default()
            },
            Transform::identity(),
            None,
        );
        Ok(layer)
    }
}

impl LineSink for RasterSink {
    fn order(&self) -> DrawOrder {
        DrawOrder::TopDown
    }

    #[allow(clippy::cast_possible_truncation)]
    fn draw_segment(&mut self, segment: &SmoothedRange) {
        let (Some(first), Some(last)) = (segment.points.first(), segment.points.last()) else {
            return;
        };
        let line = |pb: &mut PathBuilder| {
            pb.move_to(first.x as f32, first.y as f32);
            for p in &segment.points[1..] {
                pb.line_to(p.x as f32, p.y as f32);
            }
        };

        if segment.extent() > MIN_FILL_EXTENT {
            let mut pb = PathBuilder::new();
            line(&mut pb);
            pb.line_to(last.x as f32, segment.max as f32);
            pb.line_to(first.x as f32, segment.max as f32);
            pb.close();
            if let Some(path) = pb.finish() {
                self.pixmap.fill_path(
                    &path,
                    &self.fill,
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
        }

        let mut pb = PathBuilder::new();
        line(&mut pb);
        if let Some(path) = pb.finish() {
            self.pixmap.stroke_path(
                &path,
                &self.stroke,
                &Stroke::default(),
                Transform::identity(),
                None,
            );
        }
    }
}

fn color(c: Rgba) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.alpha_u8())
}

fn paint(c: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color(c));
    paint.anti_alias = true;
    paint
}

#[cfg(test)]
mod tests {
    use super::RasterSink;
    use crate::{extract::smooth, render::LineSink, settings::Rgba, Settings};
    use geo::geometry::Coord;
    use tiny_skia::PremultipliedColorU8;

    fn settings() -> Settings {
        Settings {
            background_color: Rgba::new(255, 255, 255, 1.0),
            line_background: Rgba::new(0, 0, 255, 1.0),
            line_color: Rgba::new(255, 0, 0, 1.0),
            ..Settings::default()
        }
    }

    fn pixel(sink: &tiny_skia::Pixmap, x: u32, y: u32) -> PremultipliedColorU8 {
        sink.pixel(x, y).unwrap()
    }

    #[test]
    fn test_background() {
        let sink = RasterSink::new(8, 4, &settings()).unwrap();
        let pixmap = sink.finish().unwrap();
        let p = pixel(&pixmap, 3, 2);
        assert_eq!((p.red(), p.green(), p.blue(), p.alpha()), (255, 255, 255, 255));
    }

    #[test]
    fn test_tall_segment_is_filled() {
        // A peak: 0..=20 up to y=0 and back down to y=20.
        let points: Vec<Coord> = (0..=40_i32)
            .map(|x| Coord {
                x: f64::from(x),
                y: f64::from((x - 20).abs()),
            })
            .collect();
        let segment = smooth(&points, 0);
        let mut sink = RasterSink::new(41, 30, &settings()).unwrap();
        sink.draw_segment(&segment);
        let pixmap = sink.finish().unwrap();

        // Inside the peak, below the outline: fill.
        let p = pixel(&pixmap, 20, 15);
        assert_eq!((p.red(), p.green(), p.blue()), (0, 0, 255));
        // Below the closing edge: untouched.
        let p = pixel(&pixmap, 20, 25);
        assert_eq!((p.red(), p.green(), p.blue()), (255, 255, 255));
    }

    #[test]
    fn test_flat_segment_is_not_filled() {
        let points: Vec<Coord> = (0..10).map(|x| Coord { x: f64::from(x), y: 5.5 }).collect();
        let mut sink = RasterSink::new(10, 10, &settings()).unwrap();
        sink.draw_segment(&smooth(&points, 0));
        let pixmap = sink.finish().unwrap();
        let p = pixel(&pixmap, 5, 5);
        assert_eq!((p.red(), p.alpha()), (255, 255));
        assert!(p.green() < 255);
        // Fill would have cleared the red channel.
        assert!((0..10).all(|y| pixel(&pixmap, 5, y).red() == 255));
    }

    #[test]
    fn test_map_opacity() {
        let settings = Settings {
            map_opacity: 50.0,
            ..settings()
        };
        let pixmap = RasterSink::new(4, 4, &settings).unwrap().finish().unwrap();
        let alpha = pixel(&pixmap, 0, 0).alpha();
        assert!((126..=129).contains(&alpha), "alpha {alpha}");
    }
}
