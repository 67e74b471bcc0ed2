//! Service configuration.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snow_processor::ProcessorConfig;
use std::env;
use std::path::{Path, PathBuf};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Land/water PNG decoded at startup
    pub raster_path: PathBuf,

    /// Sample CSV path; `{date}`, `{cycle}` and `{forecast}` are substituted
    pub samples_path: String,

    /// HTTP listen port
    pub port: u16,

    /// Seconds between refresh cycles
    pub refresh_interval_secs: u64,

    /// Write a diagnostic snow map after every build
    pub export_png: Option<PathBuf>,

    /// Fixed forecast time instead of the current time
    pub historic_time: Option<DateTime<Utc>>,

    /// Classification and diffusion settings
    pub processor: ProcessorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            raster_path: PathBuf::from("resources/esacci_landmask.png"),
            samples_path: "data/snod.csv".to_string(),
            port: 8090,
            refresh_interval_secs: 3600,
            export_png: None,
            historic_time: None,
            processor: ProcessorConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match env::var("SNOW_PORT") {
            Ok(v) => v.parse().with_context(|| format!("invalid SNOW_PORT '{}'", v))?,
            Err(_) => defaults.port,
        };

        let refresh_interval_secs = match env::var("SNOW_REFRESH_INTERVAL_SECS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("invalid SNOW_REFRESH_INTERVAL_SECS '{}'", v))?,
            Err(_) => defaults.refresh_interval_secs,
        };

        let historic_time = match env::var("SNOW_HISTORIC_TIME") {
            Ok(v) => Some(
                DateTime::parse_from_rfc3339(&v)
                    .with_context(|| format!("invalid SNOW_HISTORIC_TIME '{}'", v))?
                    .with_timezone(&Utc),
            ),
            Err(_) => None,
        };

        Ok(Self {
            raster_path: env::var("SNOW_RASTER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.raster_path),
            samples_path: env::var("SNOW_SAMPLES_PATH").unwrap_or(defaults.samples_path),
            port,
            refresh_interval_secs,
            export_png: env::var("SNOW_EXPORT_PNG").ok().map(PathBuf::from),
            historic_time,
            processor: ProcessorConfig::from_env(),
        })
    }

    /// Load configuration from a YAML file. Missing keys use defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be > 0");
        }
        if self.samples_path.trim().is_empty() {
            bail!("samples_path must not be empty");
        }
        self.processor.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert_eq!(config.port, 8090);
        assert!(config.export_png.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = ServiceConfig {
            refresh_interval_secs: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());

        config = ServiceConfig::default();
        config.processor.diffusion.max_step = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml() {
        let yaml = r#"
port: 9000
samples_path: "/cache/{date}_{cycle}.csv"
historic_time: "2024-01-15T12:00:00Z"
processor:
  diffusion:
    decay: 0.7
"#;
        let config = ServiceConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.samples_path, "/cache/{date}_{cycle}.csv");
        assert!(config.historic_time.is_some());
        assert!((config.processor.diffusion.decay - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.refresh_interval_secs, 3600);
    }
}
