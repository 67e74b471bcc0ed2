//! Shared fixtures for snow-service tests.
//!
//! Provides a small service on a 10 degree grid with a straight coast at
//! column 20 and in-memory stand-ins for the refresh collaborators.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use snow_processor::{CoastMap, DepthGrid, ProcessorConfig, SnowDepthService};
use snow_service::{
    CsvPassthrough, CycleMode, CycleSelector, ForecastCycle, ForecastFetcher, RefreshPipeline,
    SampleConverter,
};
use std::io::{BufRead, BufReader, Cursor, Read};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use test_utils::{depth_csv, straight_coast_mask, test_grid};

/// Snow 0.3 m three cells inland of the coast at the equator.
pub fn inland_snow_csv() -> String {
    depth_csv(&[(220.0, 0.0, 0.3)])
}

pub fn service() -> Arc<SnowDepthService> {
    let grid = test_grid(36, 18);
    let coast = CoastMap::from_water_mask(grid, &straight_coast_mask(&grid, 20), 0).unwrap();
    let config = ProcessorConfig {
        depth_grid: DepthGrid(test_grid(36, 19)),
        ..ProcessorConfig::default()
    };
    Arc::new(SnowDepthService::new(Arc::new(coast), &config).unwrap())
}

pub fn fixed_cycle() -> ForecastCycle {
    ForecastCycle {
        date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        cycle: 6,
        forecast_hour: 6,
        historic: false,
    }
}

/// Always selects [`fixed_cycle`].
pub struct FixedSelector;

impl CycleSelector for FixedSelector {
    fn select(&self, _now: DateTime<Utc>, _mode: CycleMode) -> ForecastCycle {
        fixed_cycle()
    }
}

/// Serves the same blob for every cycle.
pub struct MemoryFetcher(pub Bytes);

#[async_trait]
impl ForecastFetcher for MemoryFetcher {
    async fn fetch(&self, _cycle: &ForecastCycle) -> Result<Bytes> {
        Ok(self.0.clone())
    }
}

pub struct FailingFetcher;

#[async_trait]
impl ForecastFetcher for FailingFetcher {
    async fn fetch(&self, cycle: &ForecastCycle) -> Result<Bytes> {
        bail!("no forecast for {}", cycle)
    }
}

/// Holds the first stream it produces until the gate is opened.
pub struct GatedConverter {
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GatedConverter {
    pub fn new() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                gate: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

struct GatedReader {
    gate: Option<mpsc::Receiver<()>>,
    inner: Cursor<Bytes>,
}

impl Read for GatedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if let Some(gate) = self.gate.take() {
            let _ = gate.recv();
        }
        self.inner.read(buf)
    }
}

impl SampleConverter for GatedConverter {
    fn convert(&self, blob: Bytes) -> Result<Box<dyn BufRead + Send>> {
        let gate = self.gate.lock().unwrap().take();
        Ok(Box::new(BufReader::new(GatedReader {
            gate,
            inner: Cursor::new(blob),
        })))
    }
}

pub fn pipeline(service: Arc<SnowDepthService>, csv: &str) -> RefreshPipeline {
    RefreshPipeline::new(
        service,
        Box::new(FixedSelector),
        Box::new(MemoryFetcher(Bytes::from(csv.to_string()))),
        Arc::new(CsvPassthrough),
    )
}

pub fn gated_pipeline(
    service: Arc<SnowDepthService>,
    csv: &str,
) -> (RefreshPipeline, mpsc::Sender<()>) {
    let (converter, gate) = GatedConverter::new();
    let pipeline = RefreshPipeline::new(
        service,
        Box::new(FixedSelector),
        Box::new(MemoryFetcher(Bytes::from(csv.to_string()))),
        Arc::new(converter),
    );
    (pipeline, gate)
}

/// Poll until `cond` holds, failing after two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
