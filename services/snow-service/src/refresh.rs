//! Periodic rebuild of the published snow field.

use anyhow::{Context, Result};
use chrono::Utc;
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use snow_common::SnowError;
use snow_processor::{write_snow_map_png, SnowDepthService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::config::ServiceConfig;
use crate::sources::{
    CsvPassthrough, CycleMode, CycleSelector, ForecastCycle, ForecastFetcher, GfsCycleSelector,
    LocalFileFetcher, SampleConverter,
};

/// Result of a single refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Published { generation: u64, cycle: ForecastCycle },
    /// Another build was already running
    Skipped,
}

/// Fetch, convert, build and publish, on a timer.
pub struct RefreshPipeline {
    service: Arc<SnowDepthService>,
    selector: Box<dyn CycleSelector>,
    fetcher: Box<dyn ForecastFetcher>,
    converter: Arc<dyn SampleConverter>,
    mode: CycleMode,
    interval: Duration,
    export_png: Option<PathBuf>,
}

impl RefreshPipeline {
    pub fn new(
        service: Arc<SnowDepthService>,
        selector: Box<dyn CycleSelector>,
        fetcher: Box<dyn ForecastFetcher>,
        converter: Arc<dyn SampleConverter>,
    ) -> Self {
        Self {
            service,
            selector,
            fetcher,
            converter,
            mode: CycleMode::Live,
            interval: Duration::from_secs(3600),
            export_png: None,
        }
    }

    /// Pipeline reading local CSV samples as configured.
    pub fn from_config(service: Arc<SnowDepthService>, config: &ServiceConfig) -> Self {
        let mode = match config.historic_time {
            Some(t) => CycleMode::At(t),
            None => CycleMode::Live,
        };
        Self::new(
            service,
            Box::new(GfsCycleSelector::default()),
            Box::new(LocalFileFetcher::new(config.samples_path.clone())),
            Arc::new(CsvPassthrough),
        )
        .with_mode(mode)
        .with_interval(Duration::from_secs(config.refresh_interval_secs))
        .with_export_png(config.export_png.clone())
    }

    pub fn with_mode(mut self, mode: CycleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_export_png(mut self, path: Option<PathBuf>) -> Self {
        self.export_png = path;
        self
    }

    pub fn service(&self) -> &Arc<SnowDepthService> {
        &self.service
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run refreshes until the process exits.
    pub async fn run_forever(&self) -> Result<()> {
        loop {
            info!("Starting refresh cycle");

            if let Err(e) = self.run_once().await {
                error!(error = %e, "Refresh cycle failed");
            }

            info!(
                interval_secs = self.interval.as_secs(),
                "Sleeping until next cycle"
            );
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One refresh. A failure leaves the previously published field in place.
    pub async fn run_once(&self) -> Result<RefreshOutcome> {
        if self.service.is_building() {
            warn!("Build already running, skipping refresh");
            return Ok(RefreshOutcome::Skipped);
        }

        let cycle = self.selector.select(Utc::now(), self.mode);
        let start = Instant::now();

        match self.build(&cycle).await {
            Ok(Some(generation)) => {
                let duration_ms = start.elapsed().as_millis() as f64;
                counter!("snow_builds_total").increment(1);
                histogram!("snow_build_duration_ms").record(duration_ms);
                gauge!("snow_field_generation").set(generation as f64);
                Ok(RefreshOutcome::Published { generation, cycle })
            }
            Ok(None) => Ok(RefreshOutcome::Skipped),
            Err(e) => {
                let reason = match e.downcast_ref::<SnowError>() {
                    Some(err) => err.code(),
                    None => "fetch",
                };
                counter!("snow_build_failures_total", "reason" => reason).increment(1);
                Err(e)
            }
        }
    }

    #[instrument(skip(self, cycle), fields(cycle = %cycle))]
    async fn build(&self, cycle: &ForecastCycle) -> Result<Option<u64>> {
        let blob = self.fetcher.fetch(cycle).await?;

        let service = Arc::clone(&self.service);
        let converter = Arc::clone(&self.converter);
        let export_png = self.export_png.clone();

        let built = tokio::task::spawn_blocking(move || -> Result<Option<u64>> {
            let reader = converter.convert(blob)?;
            let published = match service.build_from_reader(reader) {
                Ok(published) => published,
                Err(SnowError::BuildInProgress) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            gauge!("snow_cells_raised").set(published.diffusion.cells_raised as f64);

            if let Some(path) = export_png {
                // The field is already live; a failed export is only logged.
                if let Err(e) =
                    write_snow_map_png(&path, &published.raw, &published.corrected, service.coast())
                {
                    warn!(path = %path.display(), error = %e, "Snow map export failed");
                }
            }
            Ok(Some(published.generation))
        })
        .await
        .context("build task panicked")??;

        if let Some(generation) = built {
            info!(generation, "Published snow field");
        }
        Ok(built)
    }
}
