//! Log output setup
//!
//! Records go to stderr through `env_logger`. When `[logging] file` is set,
//! every record is also appended to that file, so an unattended monitor
//! leaves a trail next to its data after the terminal is gone.
//!
//! Level precedence: `--log-level`, then `RUST_LOG`, then `[logging] level`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::LevelFilter;

/// Writes every buffer to stderr and to a file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Build the logger without installing it
pub fn builder(cli_level: Option<LevelFilter>, config_level: &str, file: Option<&Path>) -> Result<Builder> {
    let mut builder = match cli_level {
        Some(level) => {
            let mut builder = Builder::new();
            builder.filter_level(level);
            builder
        }
        None => Builder::from_env(Env::default().default_filter_or(config_level)),
    };
    builder.format_timestamp_secs();

    if let Some(path) = file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(Tee { file })));
    }

    Ok(builder)
}

/// Install the process-wide logger
pub fn init(cli_level: Option<LevelFilter>, config_level: &str, file: Option<&Path>) -> Result<()> {
    builder(cli_level, config_level, file)?
        .try_init()
        .context("logger already initialized")
}
