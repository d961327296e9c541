//! Chart Renderer
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               PARTICULATE SENSOR DATA         │ title
//! │      EPA PM 2.5 AQI                           │ y-axis label
//! │  150 ┤░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░ │
//! │  100 ┤▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒▒ 57 ●▒▒▒▒▒▒ │ bands, series,
//! │   50 ┤- - - -/\- - - - - - - - -/- - - - - - │ mean line,
//! │    0 ┤▓▓▓▓▓▓/▓▓\▓▓▓▓▓▓▓▓▓▓/\▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓ │ latest value
//! │      └─────────────────────────────────────── │
//! │      07-06 14:00                 07-07 14:00  │ first / last sample
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The x-axis spans the first to the last sample. The y-axis runs from 0 to
//! the y-limit: either fixed, or the maximum rounded up to the next multiple
//! of 50 so the current health category is always fully visible.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use airguard_core::{RenderSink, Sample, Timestamp};

use crate::canvas::{draw_dashed_hline, draw_line, fill_circle, fill_rect};
use crate::color::{Band, Color, ColorMode};
use crate::font::{draw_text, text_height, text_width};

// ===== CHART DEFAULTS =====

pub const DEFAULT_TITLE: &str = "Particulate Sensor Data";
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 600;
/// Y-limit rounding step and tick spacing in index units
pub const Y_STEP: f64 = 50.0;

const MIN_WIDTH: u32 = 200;
const MIN_HEIGHT: u32 = 150;
const MAX_DIMENSION: u32 = 8192;

// ===== LAYOUT =====

const TITLE_SCALE: u32 = 2;
const LABEL_SCALE: u32 = 1;
const VALUE_SCALE: u32 = 2;
const MARGIN: i64 = 10;
const TICK_LENGTH: i64 = 5;
const LINE_THICKNESS: u32 = 2;
const MARKER_RADIUS: i64 = 4;
const X_LABEL_FORMAT: &str = "%m-%d %H:%M";

/// Chart rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    /// Settings that cannot produce a chart
    #[error("invalid chart configuration: {0}")]
    InvalidConfig(String),

    /// Output extension does not name a supported image format
    #[error("unsupported image format for {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Image encoder failure
    #[error("failed to encode chart: {0}")]
    Encode(#[from] image::ImageError),

    /// Filesystem failure writing the chart
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Upper bound of the y-axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "YLimitRepr", into = "YLimitRepr")]
pub enum YLimit {
    /// `ceil(max / 50) * 50`, at least 50
    #[default]
    Auto,
    /// Fixed limit; higher values are drawn clipped at the top edge
    Fixed(f64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum YLimitRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<YLimitRepr> for YLimit {
    type Error = String;

    fn try_from(repr: YLimitRepr) -> Result<Self, Self::Error> {
        match repr {
            YLimitRepr::Text(text) if text.eq_ignore_ascii_case("auto") => Ok(YLimit::Auto),
            YLimitRepr::Text(text) => Err(format!("y_limit must be a number or \"auto\", got {text:?}")),
            YLimitRepr::Number(value) => Ok(YLimit::Fixed(value)),
        }
    }
}

impl From<YLimit> for YLimitRepr {
    fn from(limit: YLimit) -> Self {
        match limit {
            YLimit::Auto => YLimitRepr::Text("auto".to_string()),
            YLimit::Fixed(value) => YLimitRepr::Number(value),
        }
    }
}

impl YLimit {
    /// Concrete limit for a series whose largest value is `max`
    pub fn resolve(&self, max: f64) -> f64 {
        match *self {
            YLimit::Fixed(limit) => limit,
            YLimit::Auto if max.is_finite() && max > 0.0 => ((max / Y_STEP).ceil() * Y_STEP).max(Y_STEP),
            YLimit::Auto => Y_STEP,
        }
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn enabled() -> bool {
    true
}

/// Chart appearance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Y-axis caption; chosen from the conversion mode when unset
    #[serde(default)]
    pub y_axis_label: Option<String>,
    #[serde(default)]
    pub y_limit: YLimit,
    #[serde(default)]
    pub color_mode: ColorMode,
    /// Band ladder, ascending; the color mode's ladder when unset
    #[serde(default)]
    pub bands: Option<Vec<Band>>,
    /// Series line color; the color mode's line color when unset
    #[serde(default)]
    pub line_color: Option<Color>,
    /// Mark the latest sample and print its value
    #[serde(default = "enabled")]
    pub include_aqi_text: bool,
    /// Dashed line at the series mean
    #[serde(default = "enabled")]
    pub include_average_line: bool,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            y_axis_label: None,
            y_limit: YLimit::Auto,
            color_mode: ColorMode::Light,
            bands: None,
            line_color: None,
            include_aqi_text: true,
            include_average_line: true,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl ChartConfig {
    pub fn validate(&self) -> Result<(), RenderError> {
        let invalid = |msg: String| Err(RenderError::InvalidConfig(msg));

        if !(MIN_WIDTH..=MAX_DIMENSION).contains(&self.width)
            || !(MIN_HEIGHT..=MAX_DIMENSION).contains(&self.height)
        {
            return invalid(format!(
                "size {}x{} outside {MIN_WIDTH}x{MIN_HEIGHT}..{MAX_DIMENSION}x{MAX_DIMENSION}",
                self.width, self.height
            ));
        }

        if let YLimit::Fixed(limit) = self.y_limit {
            if !limit.is_finite() || limit <= 0.0 {
                return invalid(format!("y_limit must be positive, got {limit}"));
            }
        }

        if let Some(bands) = &self.bands {
            if bands.is_empty() {
                return invalid("bands must not be empty".to_string());
            }
            if let Some(band) = bands
                .iter()
                .find(|b| !b.threshold.is_finite() || b.threshold <= 0.0 || !(0.0..=1.0).contains(&b.alpha))
            {
                return invalid(format!(
                    "band {} needs a positive threshold and alpha in 0..=1, got alpha {}",
                    band.threshold, band.alpha
                ));
            }
            if bands.windows(2).any(|pair| pair[0].threshold >= pair[1].threshold) {
                return invalid("band thresholds must be strictly ascending".to_string());
            }
        }

        Ok(())
    }

    /// Configured bands, or the color mode's defaults
    pub fn resolved_bands(&self) -> Vec<Band> {
        self.bands
            .clone()
            .unwrap_or_else(|| self.color_mode.default_bands())
    }

    pub fn resolved_line_color(&self) -> Color {
        self.line_color.unwrap_or_else(|| self.color_mode.line_color())
    }
}

/// Pixel rectangle of the plotting area plus the value/time mapping
#[derive(Debug, Clone, Copy)]
struct Plot {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    y_limit: f64,
    start: Timestamp,
    span_secs: i64,
}

impl Plot {
    fn y_for(&self, value: f64) -> i64 {
        let fraction = (value / self.y_limit).clamp(0.0, 1.0);
        self.bottom - (fraction * (self.bottom - self.top) as f64).round() as i64
    }

    fn x_for(&self, timestamp: Timestamp) -> i64 {
        if self.span_secs <= 0 {
            return (self.left + self.right) / 2;
        }
        let offset = (timestamp - self.start).num_seconds() as f64;
        let fraction = (offset / self.span_secs as f64).clamp(0.0, 1.0);
        self.left + (fraction * (self.right - self.left) as f64).round() as i64
    }
}

/// Renders the series to an image file
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    config: ChartConfig,
    output: PathBuf,
    format: ImageFormat,
    bands: Vec<Band>,
    line_color: Color,
}

impl ChartRenderer {
    /// Validate the configuration and pick the encoder from the file extension
    pub fn new(config: ChartConfig, output: impl Into<PathBuf>) -> Result<Self, RenderError> {
        config.validate()?;
        let output = output.into();
        let format = ImageFormat::from_path(&output)
            .ok()
            .filter(|format| matches!(format, ImageFormat::Jpeg | ImageFormat::Png))
            .ok_or_else(|| RenderError::UnsupportedFormat(output.clone()))?;

        Ok(Self {
            bands: config.resolved_bands(),
            line_color: config.resolved_line_color(),
            config,
            output,
            format,
        })
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Draw the chart in memory
    ///
    /// `series` must be non-empty and ordered oldest first.
    pub fn draw(&self, series: &[Sample]) -> RgbImage {
        let mode = self.config.color_mode;
        let background = mode.background();
        let foreground = mode.foreground();
        let mut image = RgbImage::from_pixel(self.config.width, self.config.height, background.to_pixel());

        let plot = self.layout(series);

        self.draw_bands(&mut image, &plot);
        draw_y_ticks(&mut image, &plot, foreground);
        draw_line(&mut image, (plot.left, plot.top), (plot.left, plot.bottom), foreground, 1);
        draw_line(&mut image, (plot.left, plot.bottom), (plot.right, plot.bottom), foreground, 1);

        let points: Vec<(i64, i64)> = series
            .iter()
            .map(|s| (plot.x_for(s.timestamp), plot.y_for(s.value)))
            .collect();
        for pair in points.windows(2) {
            draw_line(&mut image, pair[0], pair[1], self.line_color, LINE_THICKNESS);
        }
        if let [only] = points.as_slice() {
            fill_circle(&mut image, only.0, only.1, 2, self.line_color);
        }

        if self.config.include_average_line {
            let mean = series.iter().map(|s| s.value).sum::<f64>() / series.len() as f64;
            draw_dashed_hline(&mut image, plot.left + 1, plot.right, plot.y_for(mean), foreground, 8, 6);
        }

        if let (true, Some(latest), Some(&(x, y))) =
            (self.config.include_aqi_text, series.last(), points.last())
        {
            fill_circle(&mut image, x, y, MARKER_RADIUS, self.line_color);
            let label = format!("{:.0}", latest.value);
            let w = i64::from(text_width(&label, VALUE_SCALE));
            let h = i64::from(text_height(VALUE_SCALE));
            let lx = (x - w - 2 * MARKER_RADIUS).max(plot.left + 2);
            let ly = (y - h - 2 * MARKER_RADIUS).max(plot.top + 2);
            draw_text(&mut image, lx, ly, &label, VALUE_SCALE, foreground);
        }

        self.draw_captions(&mut image, &plot, series, foreground);
        image
    }

    fn layout(&self, series: &[Sample]) -> Plot {
        let max = series.iter().map(|s| s.value).fold(f64::MIN, f64::max);
        let y_limit = self.config.y_limit.resolve(max);
        let widest_tick = i64::from(text_width(&format!("{y_limit:.0}"), LABEL_SCALE));

        let start = series.first().map(|s| s.timestamp).unwrap_or_default();
        let end = series.last().map(|s| s.timestamp).unwrap_or(start);

        let width = i64::from(self.config.width);
        let height = i64::from(self.config.height);
        let label_h = i64::from(text_height(LABEL_SCALE));

        Plot {
            left: MARGIN + widest_tick + TICK_LENGTH + 4,
            top: MARGIN + i64::from(text_height(TITLE_SCALE)) + 2 * label_h,
            right: width - 2 * MARGIN,
            bottom: height - MARGIN - 2 * label_h,
            y_limit,
            start,
            span_secs: (end - start).num_seconds(),
        }
    }

    fn draw_bands(&self, image: &mut RgbImage, plot: &Plot) {
        let mut lower = 0.0;
        for band in &self.bands {
            let upper = band.threshold.min(plot.y_limit);
            if upper > lower {
                fill_rect(
                    image,
                    plot.left,
                    plot.y_for(upper),
                    plot.right + 1,
                    plot.y_for(lower),
                    band.color,
                    band.alpha,
                );
            }
            lower = band.threshold;
            if lower >= plot.y_limit {
                break;
            }
        }
    }

    fn draw_captions(&self, image: &mut RgbImage, plot: &Plot, series: &[Sample], color: Color) {
        let width = i64::from(self.config.width);
        let title_w = i64::from(text_width(&self.config.title, TITLE_SCALE));
        draw_text(image, (width - title_w) / 2, MARGIN, &self.config.title, TITLE_SCALE, color);

        if let Some(label) = &self.config.y_axis_label {
            let y = plot.top - i64::from(text_height(LABEL_SCALE)) - 4;
            draw_text(image, plot.left, y, label, LABEL_SCALE, color);
        }

        let label_y = plot.bottom + TICK_LENGTH + 3;
        if let Some(first) = series.first() {
            let text = first.timestamp.format(X_LABEL_FORMAT).to_string();
            draw_text(image, plot.left, label_y, &text, LABEL_SCALE, color);
        }
        if let (Some(last), true) = (series.last(), series.len() > 1) {
            let text = last.timestamp.format(X_LABEL_FORMAT).to_string();
            let w = i64::from(text_width(&text, LABEL_SCALE));
            draw_text(image, plot.right - w, label_y, &text, LABEL_SCALE, color);
        }
    }

    /// Encode and atomically replace the output file
    fn write(&self, image: &RgbImage) -> Result<(), RenderError> {
        let mut encoded = Cursor::new(Vec::new());
        image.write_to(&mut encoded, self.format)?;

        let dir = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| RenderError::io("create directory for", &self.output, e))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| RenderError::io("create temporary file for", &self.output, e))?;
        tmp.write_all(encoded.get_ref())
            .map_err(|e| RenderError::io("write temporary file for", &self.output, e))?;
        tmp.persist(&self.output)
            .map_err(|e| RenderError::io("replace", &self.output, e.error))?;
        Ok(())
    }
}

fn draw_y_ticks(image: &mut RgbImage, plot: &Plot, color: Color) {
    let step = tick_step(plot.y_limit);
    let mut value = 0.0;
    while value <= plot.y_limit + f64::EPSILON {
        let y = plot.y_for(value);
        draw_line(image, (plot.left - TICK_LENGTH, y), (plot.left, y), color, 1);

        let label = format!("{value:.0}");
        let w = i64::from(text_width(&label, LABEL_SCALE));
        let h = i64::from(text_height(LABEL_SCALE));
        draw_text(image, plot.left - TICK_LENGTH - 3 - w, y - h / 2, &label, LABEL_SCALE, color);
        value += step;
    }
}

/// Tick spacing: every 50 up to 500, then a multiple of 50 giving ~10 ticks
fn tick_step(y_limit: f64) -> f64 {
    if y_limit <= 10.0 * Y_STEP {
        return Y_STEP.min(y_limit);
    }
    ((y_limit / 10.0 / Y_STEP).ceil() * Y_STEP).max(Y_STEP)
}

impl RenderSink for ChartRenderer {
    type Error = RenderError;

    fn render(&mut self, series: &[Sample]) -> Result<(), RenderError> {
        if series.is_empty() {
            log::info!("chart: no samples yet, skipping {}", self.output.display());
            return Ok(());
        }

        let image = self.draw(series);
        self.write(&image)?;
        log::info!(
            "chart: wrote {} samples={} {}x{}",
            self.output.display(),
            series.len(),
            self.config.width,
            self.config.height
        );
        Ok(())
    }
}
