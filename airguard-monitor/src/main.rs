use anyhow::{Context, Result};
use clap::Parser;

use airguard_core::{SystemClock, TruncationOutcome};
use airguard_monitor::{logging, Cli, Command, Monitor};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let monitor = Monitor::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    let command = cli.command_or_default();
    if command == Command::CheckConfig {
        print!("{}", monitor.describe()?);
        return Ok(());
    }

    logging::init(
        cli.log_level,
        &monitor.config().logging.level,
        monitor.paths().log_file.as_deref(),
    )?;

    match command {
        Command::Run => monitor.run(),
        Command::Render => {
            let samples = monitor.render_once()?;
            log::info!("rendered {samples} samples to {}", monitor.paths().image.display());
            Ok(())
        }
        Command::Truncate => {
            match monitor.truncate_once(&SystemClock)? {
                TruncationOutcome::StoreMissing => log::info!("no series file yet"),
                TruncationOutcome::Unchanged { kept } => log::info!("nothing to remove, {kept} samples kept"),
                TruncationOutcome::Truncated { removed, kept } => {
                    log::info!("removed {removed} samples, {kept} kept")
                }
            }
            Ok(())
        }
        Command::CheckConfig => Ok(()),
    }
}
