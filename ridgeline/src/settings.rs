use serde::{Deserialize, Serialize};

/// An sRGB colour with straight alpha in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns alpha scaled to `0..=255`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn alpha_u8(&self) -> u8 {
        (self.a.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    /// Returns this colour as a CSS `rgba()` function.
    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// User tunable rendering parameters.
///
/// Every field has a default, so partial JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Rows drawn per 100 pixels of viewport height.
    pub line_density: f64,

    /// Moving average half-window, in points.
    pub smooth_steps: usize,

    /// Opacity of the raster layer, `0..=100`.
    pub map_opacity: f64,

    /// Pixels of vertical displacement for the full height range.
    pub height_scale: f64,

    /// Heights at or below this level are not drawn.
    pub ocean_level: f64,

    pub line_color: Rgba,

    /// Fill drawn beneath each line in raster mode.
    pub line_background: Rgba,

    pub background_color: Rgba,

    /// Stroke width in vector mode.
    pub line_width: f64,
}

impl Default for Settings {
    fn default() -> Self {
        const PAPER: Rgba = Rgba::new(0xF7, 0xF2, 0xE8, 1.0);
        Self {
            line_density: 28.0,
            smooth_steps: 1,
            map_opacity: 100.0,
            height_scale: 42.0,
            ocean_level: 0.0,
            line_color: Rgba::new(22, 22, 22, 1.0),
            line_background: PAPER,
            background_color: PAPER,
            line_width: 1.0,
        }
    }
}

impl Settings {
    /// Returns the number of rows to draw for a viewport `height`
    /// pixels tall. Never zero.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn row_count(&self, height: usize) -> usize {
        let rows = (height as f64 * self.line_density / 100.0).round();
        if rows.is_finite() && rows >= 1.0 {
            rows as usize
        } else {
            1
        }
    }

    /// Returns `map_opacity` as a fraction.
    #[allow(clippy::cast_possible_truncation)]
    pub fn opacity(&self) -> f32 {
        (self.map_opacity / 100.0).clamp(0.0, 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::{Rgba, Settings};

    #[test]
    fn test_partial_json() {
        let settings: Settings =
            serde_json::from_str(r#"{"lineDensity": 50, "lineColor": {"r": 1, "g": 2, "b": 3, "a": 0.5}}"#)
                .unwrap();
        assert_eq!(settings.line_density, 50.0);
        assert_eq!(settings.line_color, Rgba::new(1, 2, 3, 0.5));
        assert_eq!(settings.smooth_steps, Settings::default().smooth_steps);
    }

    #[test]
    fn test_row_count() {
        let settings = Settings::default();
        assert_eq!(settings.row_count(1000), 280);
        let sparse = Settings {
            line_density: 0.0,
            ..Settings::default()
        };
        assert_eq!(sparse.row_count(1000), 1);
    }

    #[test]
    fn test_css() {
        assert_eq!(Rgba::new(22, 22, 22, 1.0).to_css(), "rgba(22, 22, 22, 1)");
        assert_eq!(Rgba::new(0, 0, 0, 0.5).alpha_u8(), 128);
    }
}
