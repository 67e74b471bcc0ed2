//! Collaborators of the refresh cycle: which forecast to use, where its bytes
//! come from and how they become a sample stream.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;
use std::fmt;
use std::io::{BufRead, Cursor};
use tracing::{debug, info, instrument};

/// GFS model run hours.
pub const GFS_CYCLES: [u32; 4] = [0, 6, 12, 18];

/// Forecast hour used for archived runs.
const HISTORIC_FORECAST_HOUR: u32 = 6;

/// A model run and the forecast step to read from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastCycle {
    pub date: NaiveDate,
    pub cycle: u32,
    pub forecast_hour: u32,
    /// Selected for a fixed time outside the live window
    pub historic: bool,
}

impl ForecastCycle {
    /// `YYYYMMDD` of the run.
    pub fn date_compact(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// File name of the run on the NOAA servers.
    pub fn noaa_filename(&self) -> String {
        format!("gfs.t{:02}z.pgrb2.0p25.f0{:02}", self.cycle, self.forecast_hour)
    }

    /// Substitute `{date}`, `{cycle}` and `{forecast}` in a path template.
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{date}", &self.date_compact())
            .replace("{cycle}", &format!("{:02}", self.cycle))
            .replace("{forecast}", &format!("{:03}", self.forecast_hour))
    }
}

impl fmt::Display for ForecastCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}z f{:03}", self.date, self.cycle, self.forecast_hour)
    }
}

/// Which time the forecast should describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleMode {
    /// The current time
    Live,
    /// A fixed time; within the last 24 hours it is treated as live
    At(DateTime<Utc>),
}

/// Picks the model run for a point in time.
pub trait CycleSelector: Send + Sync {
    fn select(&self, now: DateTime<Utc>, mode: CycleMode) -> ForecastCycle;
}

/// GFS run selection: the newest published run and the 3-hourly forecast
/// step closest below the requested hour.
#[derive(Debug, Clone)]
pub struct GfsCycleSelector {
    /// Time between cycle start and availability of its files
    pub publish_delay: Duration,
    pub cycles: Vec<u32>,
}

impl Default for GfsCycleSelector {
    fn default() -> Self {
        Self {
            publish_delay: Duration::hours(4) + Duration::minutes(25),
            cycles: GFS_CYCLES.to_vec(),
        }
    }
}

impl CycleSelector for GfsCycleSelector {
    fn select(&self, now: DateTime<Utc>, mode: CycleMode) -> ForecastCycle {
        let (target, historic) = match mode {
            CycleMode::Live => (now, false),
            CycleMode::At(t) if t > now - Duration::hours(24) && t <= now => {
                debug!(requested = %t, "Requested time is recent, using live selection");
                (now, false)
            }
            CycleMode::At(t) => (t, true),
        };

        let adjusted = target - self.publish_delay;
        let cycle = self
            .cycles
            .iter()
            .copied()
            .filter(|&c| adjusted.hour() >= c)
            .max()
            .unwrap_or(0);

        let forecast_hour = if historic {
            HISTORIC_FORECAST_HOUR
        } else {
            let day_offset = if adjusted.day() != target.day() { 24 } else { 0 };
            (day_offset + target.hour() - cycle) / 3 * 3
        };

        ForecastCycle {
            date: adjusted.date_naive(),
            cycle,
            forecast_hour,
            historic,
        }
    }
}

/// Retrieves the raw forecast for a cycle.
#[async_trait]
pub trait ForecastFetcher: Send + Sync {
    async fn fetch(&self, cycle: &ForecastCycle) -> Result<Bytes>;
}

/// Reads an already converted sample file from disk.
#[derive(Debug, Clone)]
pub struct LocalFileFetcher {
    template: String,
}

impl LocalFileFetcher {
    /// `template` may contain `{date}`, `{cycle}` and `{forecast}`.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

#[async_trait]
impl ForecastFetcher for LocalFileFetcher {
    #[instrument(skip(self, cycle), fields(cycle = %cycle))]
    async fn fetch(&self, cycle: &ForecastCycle) -> Result<Bytes> {
        let path = cycle.expand(&self.template);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading forecast samples {}", path))?;
        info!(path = %path, size = data.len(), "Read forecast samples");
        Ok(Bytes::from(data))
    }
}

/// Turns a fetched blob into a `lon,lat,value` sample stream.
pub trait SampleConverter: Send + Sync {
    fn convert(&self, blob: Bytes) -> Result<Box<dyn BufRead + Send>>;
}

/// The blob already is CSV text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvPassthrough;

impl SampleConverter for CsvPassthrough {
    fn convert(&self, blob: Bytes) -> Result<Box<dyn BufRead + Send>> {
        Ok(Box::new(Cursor::new(blob)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Read;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_live_same_day() {
        let cycle = GfsCycleSelector::default().select(at(2024, 1, 15, 14, 30), CycleMode::Live);
        // adjusted 10:05 -> cycle 6, forecast (14 - 6) / 3 * 3 = 6
        assert_eq!(cycle.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(cycle.cycle, 6);
        assert_eq!(cycle.forecast_hour, 6);
        assert!(!cycle.historic);
    }

    #[test]
    fn test_live_delay_crosses_midnight() {
        let cycle = GfsCycleSelector::default().select(at(2024, 1, 15, 2, 0), CycleMode::Live);
        // adjusted 2024-01-14 21:35 -> cycle 18, forecast (24 + 2 - 18) / 3 * 3 = 6
        assert_eq!(cycle.date, NaiveDate::from_ymd_opt(2024, 1, 14).unwrap());
        assert_eq!(cycle.cycle, 18);
        assert_eq!(cycle.forecast_hour, 6);
    }

    #[test]
    fn test_live_just_after_publication() {
        let cycle = GfsCycleSelector::default().select(at(2024, 1, 15, 16, 25), CycleMode::Live);
        assert_eq!(cycle.cycle, 12);
        assert_eq!(cycle.forecast_hour, 3);
    }

    #[test]
    fn test_recent_fixed_time_is_live() {
        let now = at(2024, 1, 15, 14, 30);
        let cycle = GfsCycleSelector::default().select(now, CycleMode::At(now - Duration::hours(3)));
        assert!(!cycle.historic);
        assert_eq!(cycle.cycle, 6);
    }

    #[test]
    fn test_historic_time() {
        let now = at(2024, 1, 15, 14, 30);
        let cycle = GfsCycleSelector::default().select(now, CycleMode::At(at(2023, 12, 24, 20, 0)));
        assert!(cycle.historic);
        assert_eq!(cycle.date, NaiveDate::from_ymd_opt(2023, 12, 24).unwrap());
        assert_eq!(cycle.cycle, 12);
        assert_eq!(cycle.forecast_hour, 6);
    }

    #[test]
    fn test_names() {
        let cycle = ForecastCycle {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            cycle: 6,
            forecast_hour: 9,
            historic: false,
        };
        assert_eq!(cycle.noaa_filename(), "gfs.t06z.pgrb2.0p25.f009");
        assert_eq!(cycle.expand("/cache/{date}_{cycle}_f{forecast}.csv"), "/cache/20240105_06_f009.csv");
        assert_eq!(cycle.to_string(), "2024-01-05 06z f009");
    }

    #[test]
    fn test_csv_passthrough() {
        let mut reader = CsvPassthrough.convert(Bytes::from_static(b"a\nb\n")).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "a\nb\n");
    }

    #[tokio::test]
    async fn test_local_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("20240105_06.csv"), "lon,lat,snod\n").unwrap();
        let template = format!("{}/{{date}}_{{cycle}}.csv", dir.path().display());

        let cycle = ForecastCycle {
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            cycle: 6,
            forecast_hour: 9,
            historic: false,
        };
        let data = LocalFileFetcher::new(template.clone()).fetch(&cycle).await.unwrap();
        assert_eq!(&data[..], b"lon,lat,snod\n");

        let other = ForecastCycle { cycle: 12, ..cycle };
        assert!(LocalFileFetcher::new(template).fetch(&other).await.is_err());
    }
}
