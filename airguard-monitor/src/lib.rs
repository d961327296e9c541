//! AirGuard Monitor
//!
//! The `airguard` binary and the pieces it is assembled from:
//!
//! - [`config`]: the TOML file and the paths it resolves to
//! - [`app`]: builds the scheduler, chart output and one-shot commands
//! - [`cli`]: command line
//! - [`logging`]: `env_logger` setup with an optional log file
//!
//! A typical deployment is a single `airguard.toml` next to the data:
//!
//! ```text
//! /srv/airguard/
//! ├── airguard.toml
//! ├── sensor_data.csv          appended every logging interval
//! ├── sensor_data.jpg          redrawn every plotting interval
//! └── truncate_checkpoint.txt  time of the last retention pass
//! ```

#![deny(unsafe_code)]

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;

pub use app::{ChartOutput, Monitor, MonitorScheduler};
pub use cli::{Cli, Command};
pub use config::{ConfigError, MonitorConfig, StoragePaths};
