//! Wiring: configuration in, running components out
//!
//! [`Monitor`] owns the validated configuration and the resolved paths and
//! builds each component from them on demand. Nothing here keeps global
//! state; the `log` facade is the only process-wide hook.

use std::path::Path;

use anyhow::{Context, Result};

use airguard_chart::{ChartRenderer, RenderError};
use airguard_connectors::HttpSensor;
use airguard_core::{
    AqiConverter, Clock, NullSink, ReadingNormalizer, RenderSink, Retention, RetentionCheckpoint,
    Sample, Scheduler, SchedulerError, SensorSource, SeriesStore, SystemClock, TruncationOutcome,
};

use crate::config::{config_dir, MonitorConfig, StoragePaths};

/// Chart output, or nothing when `[chart] enabled = false`
pub enum ChartOutput {
    Image(ChartRenderer),
    Disabled(NullSink),
}

impl RenderSink for ChartOutput {
    type Error = RenderError;

    fn render(&mut self, series: &[Sample]) -> Result<(), RenderError> {
        match self {
            ChartOutput::Image(renderer) => renderer.render(series),
            ChartOutput::Disabled(sink) => sink.render(series).map_err(|never| match never {}),
        }
    }
}

/// Scheduler as assembled for the monitor
pub type MonitorScheduler<C, S> = Scheduler<C, S, ChartOutput, AqiConverter>;

/// Validated configuration plus resolved file locations
#[derive(Debug, Clone)]
pub struct Monitor {
    config: MonitorConfig,
    paths: StoragePaths,
}

impl Monitor {
    pub fn new(config: MonitorConfig, paths: StoragePaths) -> Self {
        Self { config, paths }
    }

    /// Load `config_path` and resolve paths relative to its directory
    pub fn load(config_path: &Path) -> Result<Self> {
        let config = MonitorConfig::load(config_path)?;
        let paths = StoragePaths::resolve(&config, config_dir(config_path));
        Ok(Self::new(config, paths))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn store(&self) -> SeriesStore {
        SeriesStore::new(&self.paths.data)
    }

    pub fn converter(&self) -> AqiConverter {
        AqiConverter::new().with_epa_correction(self.config.conversion.epa_correction)
    }

    pub fn chart_output(&self) -> Result<ChartOutput> {
        if !self.config.chart.enabled {
            return Ok(ChartOutput::Disabled(NullSink));
        }
        let renderer = ChartRenderer::new(self.config.chart_style(), &self.paths.image)
            .context("failed to set up chart output")?;
        Ok(ChartOutput::Image(renderer))
    }

    fn retention(&self, now: airguard_core::Timestamp) -> Result<Retention> {
        let checkpoint = RetentionCheckpoint::load_or_init(&self.paths.checkpoint, now)
            .context("failed to load retention checkpoint")?;
        Ok(Retention::new(&self.config.retention, checkpoint))
    }

    /// Assemble the loop around any clock and sensor source
    pub fn scheduler<C, S>(&self, clock: C, source: S) -> Result<MonitorScheduler<C, S>>
    where
        C: Clock,
        S: SensorSource,
    {
        let retention = self.retention(clock.now())?;
        let normalizer = ReadingNormalizer::new(self.config.normalizer, self.converter());

        Ok(Scheduler::new(
            self.config.schedule,
            clock,
            source,
            self.chart_output()?,
            normalizer,
            self.store(),
            retention,
        )
        .with_retry(self.config.retry))
    }

    /// Run against the configured sensor until a fatal error
    pub fn run(&self) -> Result<()> {
        let sensor = HttpSensor::new(self.config.sensor.clone()).context("invalid sensor configuration")?;
        log::info!(
            "airguard {} polling {} data={} chart={}",
            airguard_core::VERSION,
            sensor.url(),
            self.paths.data.display(),
            self.paths.image.display()
        );

        let mut scheduler = self.scheduler(SystemClock, sensor)?;
        scheduler.run().map_err(|e| {
            if let SchedulerError::RetriesExhausted { attempts, .. } = &e {
                log::error!("giving up after {attempts} attempts, exiting");
            }
            anyhow::Error::new(e).context("monitor stopped")
        })
    }

    /// Draw the chart once from whatever the store holds
    pub fn render_once(&self) -> Result<usize> {
        let series = self.store().read_all().context("failed to read series")?;
        self.chart_output()?
            .render(&series)
            .context("failed to render chart")?;
        Ok(series.len())
    }

    /// Apply the retention window once and record the checkpoint
    pub fn truncate_once(&self, clock: &impl Clock) -> Result<TruncationOutcome> {
        let now = clock.now();
        let mut retention = self.retention(now)?;
        retention
            .run(&self.store(), now)
            .context("failed to truncate series")
    }

    /// Resolved configuration as TOML, followed by the file locations
    pub fn describe(&self) -> Result<String> {
        let mut text = toml::to_string_pretty(&self.config).context("failed to serialize configuration")?;
        text.push_str("\n# resolved paths\n");
        text.push_str(&format!("# data       = {}\n", self.paths.data.display()));
        text.push_str(&format!("# image      = {}\n", self.paths.image.display()));
        text.push_str(&format!("# checkpoint = {}\n", self.paths.checkpoint.display()));
        if let Some(log_file) = &self.paths.log_file {
            text.push_str(&format!("# log file   = {}\n", log_file.display()));
        }
        Ok(text)
    }
}
