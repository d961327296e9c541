//! Chart output for AirGuard
//!
//! Draws the stored index series over the US EPA AQI color bands and writes
//! it as a JPEG or PNG, replacing the previous chart atomically so a web
//! server or photo frame never picks up half an image.
//!
//! No plotting library and no font files: bands, lines and a 5x7 bitmap font
//! are rasterized directly with the `image` crate, which keeps the binary
//! small enough for a Raspberry Pi Zero.
//!
//! ```no_run
//! use airguard_chart::{ChartConfig, ChartRenderer, ColorMode};
//! use airguard_core::RenderSink;
//!
//! let config = ChartConfig {
//!     color_mode: ColorMode::Dark,
//!     y_axis_label: Some("EPA PM 2.5 AQI".into()),
//!     ..ChartConfig::default()
//! };
//! let mut chart = ChartRenderer::new(config, "sensor_data.jpg")?;
//! chart.render(&[])?; // nothing to draw yet
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

mod canvas;
pub mod color;
pub mod font;
pub mod render;

pub use color::{Band, Color, ColorError, ColorMode};
pub use render::{ChartConfig, ChartRenderer, RenderError, YLimit};
