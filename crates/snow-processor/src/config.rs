//! Configuration for raster classification and coastal diffusion.

use serde::{Deserialize, Serialize};
use snow_common::{grids, GridSpec, SnowError, SnowResult};
use std::path::Path;

/// How the land/water image maps onto the forecast grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Grid the image must match (width x height).
    pub grid: GridSpec,

    /// Pixel value that denotes open water; everything else is land.
    pub water_value: u8,

    /// Image column of grid longitude index 0. The raster starts at -180°
    /// while the forecast starts at 0°, plus 3 columns of visual alignment.
    pub lon_shift_cols: i32,

    /// Extra rows between grid latitude index and the flipped image row.
    pub lat_shift_rows: i32,

    /// Rows next to each pole where no coastline is detected.
    pub pole_margin: usize,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            grid: grids::coast_0p1(),
            water_value: 0,
            lon_shift_cols: 1803,
            lat_shift_rows: 2,
            pole_margin: 10,
        }
    }
}

impl RasterConfig {
    /// Raster configuration without any alignment shift, for synthetic images.
    pub fn unshifted(grid: GridSpec) -> Self {
        Self {
            grid,
            lon_shift_cols: 0,
            lat_shift_rows: 0,
            pole_margin: 0,
            ..Self::default()
        }
    }

    /// Validate the raster configuration.
    pub fn validate(&self) -> SnowResult<()> {
        self.grid.validate()?;
        if 2 * self.pole_margin >= self.grid.n_lat {
            return Err(SnowError::Config(format!(
                "pole_margin {} leaves no rows in a grid of height {}",
                self.pole_margin, self.grid.n_lat
            )));
        }
        Ok(())
    }
}

/// Parameters of the coastal snow diffusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionParams {
    /// Snow depth (m) at or below which a cell counts as snow free.
    pub no_snow_threshold: f32,

    /// Maximum grid steps to look inland for snow (~5 to 10 km per step).
    pub max_step: u32,

    /// Multiplicative decay per step from the inland anchor to the coast.
    pub decay: f32,
}

impl Default for DiffusionParams {
    fn default() -> Self {
        Self {
            no_snow_threshold: 0.02,
            max_step: 3,
            decay: 0.8,
        }
    }
}

impl DiffusionParams {
    /// Validate the diffusion parameters.
    pub fn validate(&self) -> SnowResult<()> {
        if self.no_snow_threshold.is_nan() || self.no_snow_threshold < 0.0 {
            return Err(SnowError::Config(
                "no_snow_threshold must be >= 0".to_string(),
            ));
        }
        if self.max_step == 0 {
            return Err(SnowError::Config("max_step must be > 0".to_string()));
        }
        if self.decay.is_nan() || self.decay <= 0.0 || self.decay > 1.0 {
            return Err(SnowError::Config("decay must be in (0, 1]".to_string()));
        }
        Ok(())
    }
}

/// Configuration for the processing core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Land/water raster alignment.
    pub raster: RasterConfig,

    /// Coastal diffusion parameters.
    pub diffusion: DiffusionParams,

    /// Grid of the forecast depth field.
    pub depth_grid: DepthGrid,
}

/// Wrapper so the depth grid defaults to the canonical 0.1° forecast grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepthGrid(pub GridSpec);

impl Default for DepthGrid {
    fn default() -> Self {
        Self(grids::depth_0p1())
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SNOW_WATER_VALUE") {
            if let Ok(v) = val.parse() {
                config.raster.water_value = v;
            }
        }

        if let Ok(val) = std::env::var("SNOW_LON_SHIFT_COLS") {
            if let Ok(v) = val.parse() {
                config.raster.lon_shift_cols = v;
            }
        }

        if let Ok(val) = std::env::var("SNOW_LAT_SHIFT_ROWS") {
            if let Ok(v) = val.parse() {
                config.raster.lat_shift_rows = v;
            }
        }

        if let Ok(val) = std::env::var("SNOW_POLE_MARGIN") {
            if let Ok(v) = val.parse() {
                config.raster.pole_margin = v;
            }
        }

        if let Ok(val) = std::env::var("SNOW_NO_SNOW_THRESHOLD") {
            if let Ok(v) = val.parse() {
                config.diffusion.no_snow_threshold = v;
            }
        }

        if let Ok(val) = std::env::var("SNOW_MAX_STEP") {
            if let Ok(v) = val.parse() {
                config.diffusion.max_step = v;
            }
        }

        if let Ok(val) = std::env::var("SNOW_DECAY") {
            if let Ok(v) = val.parse() {
                config.diffusion.decay = v;
            }
        }

        config
    }

    /// Parse configuration from a YAML document. Missing keys use defaults.
    pub fn from_yaml_str(yaml: &str) -> SnowResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| SnowError::Config(e.to_string()))
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> SnowResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SnowResult<()> {
        self.raster.validate()?;
        self.diffusion.validate()?;
        self.depth_grid.0.validate()?;
        if self.depth_grid.0.n_lon != self.raster.grid.n_lon {
            return Err(SnowError::Config(format!(
                "depth grid width {} differs from raster width {}",
                self.depth_grid.0.n_lon, self.raster.grid.n_lon
            )));
        }
        Ok(())
    }
}
