//! Colors, Color Modes and AQI Bands
//!
//! Colors are written in configuration the way chart people write them: a
//! handful of CSS names (`palegreen`, `Maroon`, case-insensitive) or
//! `#rrggbb` hex.
//!
//! ## Default Bands
//!
//! | Up to | Light | Dark | Greyscale |
//! |-------|-------|------|-----------|
//! | 50  | palegreen 0.30 | palegreen 0.40 | black 0.1 |
//! | 100 | yellow 0.25 | yellow 0.40 | black 0.2 |
//! | 150 | orange 0.25 | orange 0.40 | black 0.3 |
//! | 200 | red 0.30 | red 0.40 | black 0.4 |
//! | 250 | red 0.40 | red 0.30 | black 0.5 |
//! | 300 | purple 0.30 | purple 0.60 | black 0.6 |
//! | 350 | purple 0.40 | purple 0.50 | black 0.7 |
//! | 400 | purple 0.50 | purple 0.40 | black 0.8 |
//! | 450 | purple 0.60 | purple 0.30 | black 0.9 |
//! | 500 | maroon 0.30 | maroon 0.30 | black 1.0 |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color string could not be understood
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColorError {
    #[error("unknown color name {0:?}")]
    UnknownName(String),

    #[error("invalid hex color {0:?}, expected #rrggbb")]
    InvalidHex(String),
}

/// Opaque 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

// ===== NAMED COLORS =====

const NAMED: &[(&str, Color)] = &[
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("grey", Color::rgb(128, 128, 128)),
    ("gray", Color::rgb(128, 128, 128)),
    ("lightgrey", Color::rgb(211, 211, 211)),
    ("darkgrey", Color::rgb(169, 169, 169)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("purple", Color::rgb(128, 0, 128)),
    ("maroon", Color::rgb(128, 0, 0)),
    ("palegreen", Color::rgb(152, 251, 152)),
    ("palegoldenrod", Color::rgb(238, 232, 170)),
    ("peachpuff", Color::rgb(255, 218, 185)),
    ("lightcoral", Color::rgb(240, 128, 128)),
];

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    /// Default plot line color
    pub const TAB_BLUE: Color = Color::rgb(0x1f, 0x77, 0xb4);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a CSS color name or `#rrggbb`
    pub fn parse(text: &str) -> Result<Self, ColorError> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ColorError::InvalidHex(text.to_string()));
        }

        NAMED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(text))
            .map(|(_, color)| *color)
            .ok_or_else(|| ColorError::UnknownName(text.to_string()))
    }

    /// `self` painted over `base` with opacity `alpha` (0 = invisible)
    pub fn over(self, base: Color, alpha: f64) -> Color {
        let a = alpha.clamp(0.0, 1.0);
        let mix = |top: u8, bottom: u8| -> u8 {
            (f64::from(top) * a + f64::from(bottom) * (1.0 - a))
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Color::rgb(mix(self.r, base.r), mix(self.g, base.g), mix(self.b, base.b))
    }

    pub fn to_pixel(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }

    pub fn from_pixel(pixel: image::Rgb<u8>) -> Self {
        let [r, g, b] = pixel.0;
        Self { r, g, b }
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// One horizontal AQI band, drawn from the previous band's threshold up to
/// this one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Band {
    /// Upper edge in index units
    pub threshold: f64,
    pub color: Color,
    /// Opacity, 0.0–1.0
    pub alpha: f64,
}

impl Band {
    pub const fn new(threshold: f64, color: Color, alpha: f64) -> Self {
        Self {
            threshold,
            color,
            alpha,
        }
    }
}

const THRESHOLDS: [f64; 10] = [50.0, 100.0, 150.0, 200.0, 250.0, 300.0, 350.0, 400.0, 450.0, 500.0];

const BAND_COLORS: [Color; 10] = [
    Color::rgb(152, 251, 152), // palegreen
    Color::rgb(255, 255, 0),   // yellow
    Color::rgb(255, 165, 0),   // orange
    Color::rgb(255, 0, 0),     // red
    Color::rgb(255, 0, 0),
    Color::rgb(128, 0, 128), // purple
    Color::rgb(128, 0, 128),
    Color::rgb(128, 0, 128),
    Color::rgb(128, 0, 128),
    Color::rgb(128, 0, 0), // maroon
];

const LIGHT_ALPHAS: [f64; 10] = [0.3, 0.25, 0.25, 0.3, 0.4, 0.3, 0.4, 0.5, 0.6, 0.3];
const DARK_ALPHAS: [f64; 10] = [0.4, 0.4, 0.4, 0.4, 0.3, 0.6, 0.5, 0.4, 0.3, 0.3];
const GREYSCALE_ALPHAS: [f64; 10] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];

/// Overall chart palette
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
    Greyscale,
}

impl ColorMode {
    pub fn background(&self) -> Color {
        match self {
            ColorMode::Light => Color::WHITE,
            ColorMode::Dark => Color::BLACK,
            ColorMode::Greyscale => Color::rgb(158, 158, 158),
        }
    }

    /// Axes, tick labels and title
    pub fn foreground(&self) -> Color {
        match self {
            ColorMode::Light | ColorMode::Greyscale => Color::BLACK,
            ColorMode::Dark => Color::WHITE,
        }
    }

    pub fn line_color(&self) -> Color {
        match self {
            ColorMode::Light | ColorMode::Dark => Color::TAB_BLUE,
            ColorMode::Greyscale => Color::WHITE,
        }
    }

    /// The 50…500 band ladder for this mode
    pub fn default_bands(&self) -> Vec<Band> {
        let (colors, alphas) = match self {
            ColorMode::Light => (BAND_COLORS, LIGHT_ALPHAS),
            ColorMode::Dark => (BAND_COLORS, DARK_ALPHAS),
            ColorMode::Greyscale => ([Color::BLACK; 10], GREYSCALE_ALPHAS),
        };

        THRESHOLDS
            .iter()
            .zip(colors)
            .zip(alphas)
            .map(|((threshold, color), alpha)| Band::new(*threshold, color, alpha))
            .collect()
    }
}
