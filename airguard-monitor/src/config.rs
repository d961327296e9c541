//! Monitor Configuration
//!
//! One TOML file, read once at startup. Every section except `[sensor]` is
//! optional and falls back to the defaults below.
//!
//! ```toml
//! [sensor]
//! connection_url = "http://192.168.20.36/json"
//!
//! [schedule]
//! logging_interval_secs = 120
//! plotting_interval_secs = 240
//! start_hour = 0
//! finish_hour = 24
//!
//! [retry]
//! max_attempts = 4
//! delay_secs = 90
//! escalation_secs = 90
//!
//! [normalizer]
//! channel = "atm"
//! humidity_offset = 4.0
//!
//! [conversion]
//! epa_correction = false
//!
//! [retention]
//! days_to_log = 14
//! truncate_interval_hours = 24
//!
//! [storage]
//! data_file = "sensor_data.csv"
//! image_file = "sensor_data.jpg"
//! checkpoint_file = "truncate_checkpoint.txt"
//!
//! [chart]
//! color_mode = "light"
//! y_limit = "auto"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## Paths
//!
//! Relative file names resolve against `[storage] directory`. Without one
//! they resolve against the directory holding the configuration file, so a
//! checkout with `airguard.toml` next to its data works from any working
//! directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use airguard_chart::ChartConfig;
use airguard_connectors::HttpSensorConfig;
use airguard_core::constants::HOURS_PER_DAY;
use airguard_core::{NormalizerConfig, RetentionConfig, RetryPolicy, ScheduleConfig};

pub const DEFAULT_CONFIG_FILE: &str = "airguard.toml";
pub const DEFAULT_DATA_FILE: &str = "sensor_data.csv";
pub const DEFAULT_IMAGE_FILE: &str = "sensor_data.jpg";
pub const DEFAULT_CHECKPOINT_FILE: &str = "truncate_checkpoint.txt";

pub const EPA_CONVERSION_Y_LABEL: &str = "EPA PM 2.5 AQI w/ EPA Conversion";
pub const PLAIN_Y_LABEL: &str = "EPA PM 2.5 AQI";

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid [{section}] configuration: {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

fn invalid(section: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        section,
        message: message.into(),
    }
}

/// Index conversion settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    /// Apply the EPA humidity correction before the AQI conversion
    pub epa_correction: bool,
}

/// File locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Base directory for relative file names
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub data_file: PathBuf,
    pub image_file: PathBuf,
    pub checkpoint_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: None,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            image_file: PathBuf::from(DEFAULT_IMAGE_FILE),
            checkpoint_file: PathBuf::from(DEFAULT_CHECKPOINT_FILE),
        }
    }
}

fn enabled() -> bool {
    true
}

/// `[chart]`: on/off switch plus the renderer's own settings
///
/// Keys neither struct knows land in `unknown` and fail validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSection {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub style: ChartConfig,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

impl Default for ChartSection {
    fn default() -> Self {
        Self {
            enabled: true,
            style: ChartConfig::default(),
            unknown: BTreeMap::new(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`; `RUST_LOG` overrides
    pub level: String,
    /// Also append log records to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    pub sensor: HttpSensorConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chart: ChartSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    /// Defaults for everything, polling `connection_url`
    pub fn new(connection_url: impl Into<String>) -> Self {
        Self {
            sensor: HttpSensorConfig::new(connection_url),
            schedule: ScheduleConfig::default(),
            retry: RetryPolicy::default(),
            normalizer: NormalizerConfig::default(),
            conversion: ConversionConfig::default(),
            retention: RetentionConfig::default(),
            storage: StorageConfig::default(),
            chart: ChartSection::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sensor
            .validate()
            .map_err(|e| invalid("sensor", e.to_string()))?;

        let schedule = &self.schedule;
        if schedule.logging_interval_secs == 0 || schedule.plotting_interval_secs == 0 {
            return Err(invalid("schedule", "intervals must be positive"));
        }
        if schedule.tick_millis == 0 {
            return Err(invalid("schedule", "tick_millis must be positive"));
        }
        if schedule.start_hour >= HOURS_PER_DAY || schedule.finish_hour > HOURS_PER_DAY {
            return Err(invalid(
                "schedule",
                format!(
                    "hours must satisfy 0 <= start_hour < 24 and 0 <= finish_hour <= 24, got {} and {}",
                    schedule.start_hour, schedule.finish_hour
                ),
            ));
        }
        if schedule.start_hour == schedule.finish_hour {
            return Err(invalid(
                "schedule",
                "start_hour equals finish_hour, the window would be empty",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("retry", "max_attempts must be at least 1"));
        }

        if !self.normalizer.humidity_offset.is_finite() {
            return Err(invalid("normalizer", "humidity_offset must be a finite number"));
        }

        if self.retention.days_to_log == 0 || self.retention.truncate_interval_hours == 0 {
            return Err(invalid(
                "retention",
                "days_to_log and truncate_interval_hours must be positive",
            ));
        }

        let storage = &self.storage;
        for (name, file) in [
            ("data_file", &storage.data_file),
            ("image_file", &storage.image_file),
            ("checkpoint_file", &storage.checkpoint_file),
        ] {
            if file.as_os_str().is_empty() {
                return Err(invalid("storage", format!("{name} must not be empty")));
            }
        }

        if let Some(key) = self.chart.unknown.keys().next() {
            return Err(invalid("chart", format!("unknown field `{key}`")));
        }
        self.chart
            .style
            .validate()
            .map_err(|e| invalid("chart", e.to_string()))?;

        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            return Err(invalid(
                "logging",
                format!("unknown level {:?}", self.logging.level),
            ));
        }

        Ok(())
    }

    /// Chart settings with the y-axis caption filled in from the conversion mode
    pub fn chart_style(&self) -> ChartConfig {
        let mut style = self.chart.style.clone();
        if style.y_axis_label.is_none() {
            let label = if self.conversion.epa_correction {
                EPA_CONVERSION_Y_LABEL
            } else {
                PLAIN_Y_LABEL
            };
            style.y_axis_label = Some(label.to_string());
        }
        style
    }
}

/// Absolute locations of every file the monitor touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub data: PathBuf,
    pub image: PathBuf,
    pub checkpoint: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl StoragePaths {
    /// Resolve relative names against `[storage] directory`, else `config_dir`
    pub fn resolve(config: &MonitorConfig, config_dir: &Path) -> Self {
        let base = match &config.storage.directory {
            Some(dir) => config_dir.join(dir),
            None => config_dir.to_path_buf(),
        };
        let place = |file: &Path| base.join(file);

        Self {
            data: place(&config.storage.data_file),
            image: place(&config.storage.image_file),
            checkpoint: place(&config.storage.checkpoint_file),
            log_file: config.logging.file.as_deref().map(place),
        }
    }
}

/// Directory holding `config_path`, or `.` for a bare file name
pub fn config_dir(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
