//! Minimal vector drawing surface which serializes to SVG.

use crate::settings::Rgba;
use std::fmt::Write;

/// Text annotation placed over the ridge lines.
///
/// `(x, y)` is the bottom-right corner of the text; labels are
/// right-anchored.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_family: String,
    pub font_size: f64,
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Move,
    Line,
}

#[derive(Debug, Clone)]
struct SvgPath {
    d: String,
    last: Option<Command>,
    /// Where the most recent command begins in `d`, and the command
    /// before it.
    mark: (usize, Option<Command>),
    lines: usize,
    stroke: String,
    line_width: f64,
}

impl SvgPath {
    fn new() -> Self {
        Self {
            d: String::new(),
            last: None,
            mark: (0, None),
            lines: 0,
            stroke: String::new(),
            line_width: 1.0,
        }
    }

    fn push(&mut self, command: Command, x: f64, y: f64) {
        self.mark = (self.d.len(), self.last);
        if !self.d.is_empty() {
            self.d.push(' ');
        }
        if self.last != Some(command) {
            self.d.push(match command {
                Command::Move => 'M',
                Command::Line => 'L',
            });
        }
        let _ = write!(self.d, "{} {}", round(x), round(y));
        self.last = Some(command);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        // Consecutive moves collapse into the last one.
        if self.last == Some(Command::Move) {
            let (at, before) = self.mark;
            self.d.truncate(at);
            self.last = before;
        }
        self.push(Command::Move, x, y);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.lines += 1;
        self.push(Command::Line, x, y);
    }
}

/// Records canvas-style drawing calls and serializes them as one SVG
/// document.
///
/// Only stroked paths, a background rectangle and text labels are
/// supported.
#[derive(Debug, Clone)]
pub struct SvgDocument {
    width: usize,
    height: usize,
    background: Option<String>,
    paths: Vec<SvgPath>,
    current: Option<SvgPath>,
    labels: Vec<String>,
    stroke_style: String,
    fill_style: String,
    line_width: f64,
}

impl SvgDocument {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            background: None,
            paths: Vec::new(),
            current: None,
            labels: Vec::new(),
            stroke_style: "#161616".to_string(),
            fill_style: "white".to_string(),
            line_width: 1.0,
        }
    }

    pub fn set_stroke_style(&mut self, color: Rgba) {
        self.stroke_style = color.to_css();
    }

    pub fn set_fill_style(&mut self, color: Rgba) {
        self.fill_style = color.to_css();
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    pub fn begin_path(&mut self) {
        self.current = Some(SvgPath::new());
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.current.get_or_insert_with(SvgPath::new).move_to(x, y);
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.current.get_or_insert_with(SvgPath::new).line_to(x, y);
    }

    /// Commits the current path with the current stroke style.
    ///
    /// Paths without a single line segment are dropped.
    pub fn stroke(&mut self) {
        if let Some(mut path) = self.current.take() {
            if path.lines > 0 {
                path.stroke.clone_from(&self.stroke_style);
                path.line_width = self.line_width;
                self.paths.push(path);
            }
        }
    }

    /// Sets the background rectangle. Only the last call is kept.
    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.background = Some(format!(
            r#"<rect id="background" fill="{}" x="{}" y="{}" width="{}" height="{}"></rect>"#,
            self.fill_style,
            round(x),
            round(y),
            round(width),
            round(height)
        ));
    }

    /// Adds text labels. Labels with empty text are skipped.
    pub fn append_labels(&mut self, labels: &[Label]) {
        for label in labels.iter().filter(|l| !l.text.is_empty()) {
            self.labels.push(format!(
                r#"<text text-anchor="end" x="{}" y="{}" fill="{}" font-family="{}" font-size="{}">{}</text>"#,
                round(label.x),
                round(label.y),
                label.color.to_css(),
                escape_text(&label.font_family.replace('"', "'")),
                round(label.font_size),
                escape_text(&label.text)
            ));
        }
    }

    /// Number of committed paths.
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, r#"<?xml version="1.0" encoding="utf-8"?>"#);
        let _ = writeln!(
            out,
            r#"<svg version="1.1" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {} {}">"#,
            self.width, self.height
        );
        if let Some(background) = &self.background {
            let _ = writeln!(out, "{background}");
        }
        let _ = writeln!(out, r#"<g id="paths" fill="none">"#);
        for path in &self.paths {
            let _ = write!(out, r#"<path d="{}" stroke="{}""#, path.d, path.stroke);
            if (path.line_width - 1.0).abs() > f64::EPSILON {
                let _ = write!(out, r#" stroke-width="{}""#, round(path.line_width));
            }
            let _ = writeln!(out, "></path>");
        }
        let _ = writeln!(out, "</g>");
        if !self.labels.is_empty() {
            let _ = writeln!(out, r#"<g id="labels">"#);
            for label in &self.labels {
                let _ = writeln!(out, "{label}");
            }
            let _ = writeln!(out, "</g>");
        }
        let _ = writeln!(out, "</svg>");
        out
    }
}

/// Rounds to two decimal places, without negative zero.
fn round(v: f64) -> f64 {
    (v * 100.0).round() / 100.0 + 0.0
}

fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}
