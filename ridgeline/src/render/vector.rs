use super::{DrawOrder, LineSink};
use crate::{
    extract::SmoothedRange,
    svg::{Label, SvgDocument},
    Settings,
};
use geo::geometry::Coord;
use terrainrgb::C;

/// Emits ridge lines as SVG paths, bottom to top.
///
/// Rows nearer the viewer are drawn first. Each column remembers the
/// highest point drawn so far, and anything at or below it is left out
/// of the document instead of being painted over. Rows alternate
/// direction so consecutive paths start near where the last one ended.
pub struct VectorSink {
    svg: SvgDocument,
    /// Highest drawn `y` per column.
    occlusion: Vec<C>,
    height: C,
    row: Vec<SmoothedRange>,
    rows_drawn: usize,
}

impl VectorSink {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(width: usize, height: usize, settings: &Settings) -> Self {
        let mut svg = SvgDocument::new(width, height);
        svg.set_fill_style(settings.background_color);
        svg.fill_rect(0.0, 0.0, width as C, height as C);
        svg.set_stroke_style(settings.line_color);
        svg.set_line_width(settings.line_width);
        Self {
            svg,
            occlusion: vec![height as C; width],
            height: height as C,
            row: Vec::new(),
            rows_drawn: 0,
        }
    }

    /// Appends `labels` above the lines and serializes the document.
    pub fn finish(mut self, labels: &[Label]) -> String {
        self.svg.append_labels(labels);
        self.svg.serialize()
    }

    /// Occlusion limit for the column under `p`, if it is on screen.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn column(&self, p: Coord<C>) -> Option<usize> {
        let col = p.x.round();
        (col >= 0.0 && (col as usize) < self.occlusion.len()).then_some(col as usize)
    }

    fn is_visible(&self, p: Coord<C>) -> bool {
        self.column(p)
            .is_some_and(|col| p.y >= 0.0 && p.y < self.occlusion[col])
    }

    /// Where a line crossing into or out of view at `p` is cut.
    fn boundary(&self, p: Coord<C>) -> Coord<C> {
        let limit = self.column(p).map_or(self.height, |col| self.occlusion[col]);
        Coord {
            x: p.x,
            y: p.y.clamp(0.0, limit),
        }
    }

    fn trace(&mut self, points: impl Iterator<Item = Coord<C>>) {
        let mut prev: Option<(Coord<C>, bool)> = None;
        for p in points {
            let visible = self.is_visible(p);
            match (prev, visible) {
                (None, true) => self.svg.move_to(p.x, p.y),
                (Some((q, false)), true) => {
                    let q = self.boundary(q);
                    self.svg.move_to(q.x, q.y);
                    self.svg.line_to(p.x, p.y);
                }
                (Some((_, true)), true) => self.svg.line_to(p.x, p.y),
                (Some((_, true)), false) => {
                    let b = self.boundary(p);
                    self.svg.line_to(b.x, b.y);
                }
                (_, false) => {}
            }
            if visible {
                if let Some(col) = self.column(p) {
                    self.occlusion[col] = self.occlusion[col].min(p.y);
                }
            }
            prev = Some((p, visible));
        }
    }
}

impl LineSink for VectorSink {
    fn order(&self) -> DrawOrder {
        DrawOrder::BottomUp
    }

    fn begin_row(&mut self, _y: usize) {
        self.row.clear();
    }

    fn draw_segment(&mut self, segment: &SmoothedRange) {
        self.row.push(segment.clone());
    }

    fn end_row(&mut self) {
        let row = std::mem::take(&mut self.row);
        let reversed = self.rows_drawn % 2 == 1;
        self.svg.begin_path();
        if reversed {
            for segment in row.iter().rev() {
                self.trace(segment.points.iter().rev().copied());
            }
        } else {
            for segment in &row {
                self.trace(segment.points.iter().copied());
            }
        }
        self.svg.stroke();
        self.rows_drawn += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::VectorSink;
    use crate::{extract::smooth, render::LineSink, Settings};
    use geo::geometry::Coord;

    fn draw_row(sink: &mut VectorSink, y: usize, ys: &[f64]) {
        let points: Vec<Coord> = ys
            .iter()
            .enumerate()
            .map(|(x, &y)| Coord { x: x as f64, y })
            .collect();
        sink.begin_row(y);
        sink.draw_segment(&smooth(&points, 0));
        sink.end_row();
    }

    fn path_data(svg: &str) -> Vec<String> {
        svg.lines()
            .filter_map(|l| l.strip_prefix(r#"<path d=""#))
            .filter_map(|l| l.split('"').next())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_occluded_points_are_clipped() {
        let mut sink = VectorSink::new(5, 10, &Settings::default());
        draw_row(&mut sink, 8, &[8.0; 5]);
        // Drawn right to left; the dip at x 2..=3 hides behind row 8.
        draw_row(&mut sink, 6, &[5.0, 5.0, 9.0, 9.0, 5.0]);
        let svg = sink.finish(&[]);
        assert_eq!(
            path_data(&svg),
            vec!["M0 8 L1 8 2 8 3 8 4 8", "M4 5 L3 8 M2 8 L1 5 0 5"]
        );
    }

    #[test]
    fn test_fully_hidden_row_is_dropped() {
        let mut sink = VectorSink::new(4, 10, &Settings::default());
        draw_row(&mut sink, 5, &[2.0; 4]);
        draw_row(&mut sink, 3, &[4.0; 4]);
        // Above the top edge.
        draw_row(&mut sink, 1, &[-1.0; 4]);
        let svg = sink.finish(&[]);
        assert_eq!(path_data(&svg), vec!["M0 2 L1 2 2 2 3 2"]);
    }

    #[test]
    fn test_serpentine_order() {
        let mut sink = VectorSink::new(3, 10, &Settings::default());
        draw_row(&mut sink, 9, &[9.0; 3]);
        draw_row(&mut sink, 6, &[6.0; 3]);
        draw_row(&mut sink, 3, &[3.0; 3]);
        let svg = sink.finish(&[]);
        assert_eq!(
            path_data(&svg),
            vec!["M0 9 L1 9 2 9", "M2 6 L1 6 0 6", "M0 3 L1 3 2 3"]
        );
    }
}
