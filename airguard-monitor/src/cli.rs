use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::config::DEFAULT_CONFIG_FILE;

/// Poll a PurpleAir sensor, keep a rolling AQI history and chart it
#[derive(Debug, Parser)]
#[command(name = "airguard", version)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, value_name = "PATH", env = "AIRGUARD_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LevelFilter>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the monitor loop until the sensor stays unreachable (default)
    Run,
    /// Draw the chart once from the stored series
    Render,
    /// Apply the retention window once and update the checkpoint
    Truncate,
    /// Validate the configuration and print it with resolved paths
    CheckConfig,
}

impl Cli {
    pub fn command_or_default(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }
}
