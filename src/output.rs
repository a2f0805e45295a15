//! Result values: [`Color`] and [`ColorPalette`].

use palette::Srgb;
use serde::{Serialize, Serializer};

use crate::scoring::{ScoredClusters, normalize};

/// A representative color with its normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    #[serde(rename = "color", serialize_with = "serialize_srgb")]
    rgb: Srgb<u8>,
    score: f64,
}

impl Color {
    pub fn new(rgb: Srgb<u8>, score: f64) -> Self {
        Self { rgb, score }
    }

    pub fn srgb(&self) -> Srgb<u8> {
        self.rgb
    }

    /// Packed `0xRRGGBB`
    pub fn rgb(&self) -> u32 {
        pack(self.rgb)
    }

    /// Uppercase `RRGGBB`
    pub fn hex(&self) -> String {
        hex(self.rgb)
    }

    /// Score in `[0, 1]`
    pub fn score(&self) -> f64 {
        self.score
    }
}

/// Primary and secondary colors plus the ranked rest.
///
/// `secondary` is `None` only when the image has a single distinct color. The
/// palette never repeats primary or secondary and is sorted by non-increasing score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorPalette {
    pub primary: Color,
    pub secondary: Option<Color>,
    pub palette: Vec<Color>,
}

impl ColorPalette {
    /// Every color, primary first.
    pub fn colors(&self) -> impl Iterator<Item = &Color> {
        std::iter::once(&self.primary)
            .chain(self.secondary.as_ref())
            .chain(&self.palette)
    }
}

/// Assemble the palette from scored clusters.
///
/// Primary and secondary are scored against their own maxima; the rest against
/// the secondary's winning score, sorted descending. The sort is stable, so equal
/// scores keep cluster order.
pub fn build_palette(scored: &ScoredClusters) -> ColorPalette {
    let primary = scored.primary();
    let primary = Color::new(
        primary.rgb,
        normalize(primary.primary_score, scored.primary_max_score),
    );

    let secondary = scored
        .secondary()
        .map(|s| Color::new(s.rgb, scored.palette_score(s)));

    let mut palette: Vec<Color> = scored
        .remainder()
        .map(|s| Color::new(s.rgb, scored.palette_score(s)))
        .collect();
    palette.sort_by(|a, b| b.score.total_cmp(&a.score));

    ColorPalette {
        primary,
        secondary,
        palette,
    }
}

pub fn pack(rgb: Srgb<u8>) -> u32 {
    ((rgb.red as u32) << 16) | ((rgb.green as u32) << 8) | rgb.blue as u32
}

pub fn hex(rgb: Srgb<u8>) -> String {
    format!("{:02X}{:02X}{:02X}", rgb.red, rgb.green, rgb.blue)
}

pub(crate) fn serialize_srgb<S: Serializer>(rgb: &Srgb<u8>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex(*rgb))
}
