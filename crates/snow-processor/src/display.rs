//! Mapping of physical snow depth to the client's display parameters.

use serde::{Deserialize, Serialize};
use snow_common::{SnowError, SnowResult};
use tracing::error;

/// Calibrated depth breakpoints (m).
pub const DEPTH_BREAKPOINTS: [f32; 7] = [0.01, 0.02, 0.03, 0.05, 0.10, 0.20, 0.25];
const SNOW_NOW: [f32; 7] = [0.90, 0.70, 0.60, 0.30, 0.15, 0.06, 0.05];
const SNOW_AREA_WIDTH: [f32; 7] = [0.25, 0.25, 0.25, 0.25, 0.25, 0.29, 0.33];
const ICE_NOW: [f32; 7] = [2.0, 2.0, 2.0, 2.0, 0.80, 0.37, 0.37];

const SNOW_NOW_NO_SNOW: f32 = 1.2;
const ICE_HOLD_BELOW: f32 = 0.05;

/// Display parameters of one depth value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayParams {
    pub snow_now: f32,
    pub snow_area_width: f32,
    pub ice_now: f32,
}

/// Piecewise linear curve over depth breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CurveTable")]
pub struct DisplayCurve {
    depths: Vec<f32>,
    values: Vec<f32>,
    no_snow: f32,
    hold_below: Option<f32>,
}

/// Unchecked curve as written in configuration.
#[derive(Debug, Deserialize)]
struct CurveTable {
    depths: Vec<f32>,
    values: Vec<f32>,
    no_snow: f32,
    #[serde(default)]
    hold_below: Option<f32>,
}

impl TryFrom<CurveTable> for DisplayCurve {
    type Error = SnowError;

    fn try_from(table: CurveTable) -> SnowResult<Self> {
        let curve = Self::new(table.depths, table.values, table.no_snow)?;
        match table.hold_below {
            Some(depth) if !depth.is_finite() => Err(SnowError::InvalidTable(
                "hold_below must be finite".to_string(),
            )),
            Some(depth) => Ok(curve.with_hold_below(depth)),
            None => Ok(curve),
        }
    }
}

impl DisplayCurve {
    /// Build a curve. `no_snow` is returned at or below the first breakpoint.
    pub fn new(depths: Vec<f32>, values: Vec<f32>, no_snow: f32) -> SnowResult<Self> {
        if depths.len() < 2 {
            return Err(SnowError::InvalidTable(format!(
                "need at least 2 breakpoints, got {}",
                depths.len()
            )));
        }
        if depths.len() != values.len() {
            return Err(SnowError::InvalidTable(format!(
                "{} depths but {} values",
                depths.len(),
                values.len()
            )));
        }
        if depths.iter().chain(values.iter()).any(|v| !v.is_finite()) || !no_snow.is_finite() {
            return Err(SnowError::InvalidTable("non-finite table entry".to_string()));
        }
        if depths.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SnowError::InvalidTable(
                "depths must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            depths,
            values,
            no_snow,
            hold_below: None,
        })
    }

    /// Hold the first value without interpolating below `depth`.
    pub fn with_hold_below(mut self, depth: f32) -> Self {
        self.hold_below = Some(depth);
        self
    }

    pub fn lower_bound(&self) -> f32 {
        self.depths[0]
    }

    pub fn upper_bound(&self) -> f32 {
        self.depths[self.depths.len() - 1]
    }

    pub fn eval(&self, depth: f32) -> f32 {
        let last = self.values[self.values.len() - 1];
        if depth.is_nan() {
            return self.no_snow;
        }
        if depth >= self.upper_bound() {
            return last;
        }
        if depth <= self.lower_bound() {
            return self.no_snow;
        }
        if self.hold_below.is_some_and(|h| depth < h) {
            return self.values[0];
        }

        for (d, v) in self.depths.windows(2).zip(self.values.windows(2)) {
            if d[0] <= depth && depth < d[1] {
                let x = (depth - d[0]) / (d[1] - d[0]);
                return v[0] + x * (v[1] - v[0]);
            }
        }

        error!(depth, "Depth fell through the display table");
        last
    }
}

/// Maps snow depth to (snow_now, snow_area_width, ice_now).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayMapper {
    snow_now: DisplayCurve,
    snow_area_width: DisplayCurve,
    ice_now: DisplayCurve,
}

impl Default for DisplayMapper {
    fn default() -> Self {
        let curve = |values: [f32; 7], no_snow: f32| DisplayCurve {
            depths: DEPTH_BREAKPOINTS.to_vec(),
            values: values.to_vec(),
            no_snow,
            hold_below: None,
        };
        Self {
            snow_now: curve(SNOW_NOW, SNOW_NOW_NO_SNOW),
            snow_area_width: curve(SNOW_AREA_WIDTH, SNOW_AREA_WIDTH[0]),
            ice_now: curve(ICE_NOW, ICE_NOW[0]).with_hold_below(ICE_HOLD_BELOW),
        }
    }
}

impl DisplayMapper {
    pub fn new(snow_now: DisplayCurve, snow_area_width: DisplayCurve, ice_now: DisplayCurve) -> Self {
        Self {
            snow_now,
            snow_area_width,
            ice_now,
        }
    }

    pub fn map(&self, depth: f32) -> DisplayParams {
        DisplayParams {
            snow_now: self.snow_now.eval(depth),
            snow_area_width: self.snow_area_width.eval(depth),
            ice_now: self.ice_now.eval(depth),
        }
    }

    /// Display parameters for bare ground.
    pub fn no_snow(&self) -> DisplayParams {
        self.map(f32::NAN)
    }

    pub fn lower_bound(&self) -> f32 {
        self.snow_now
            .lower_bound()
            .min(self.snow_area_width.lower_bound())
            .min(self.ice_now.lower_bound())
    }

    pub fn upper_bound(&self) -> f32 {
        self.snow_now
            .upper_bound()
            .max(self.snow_area_width.upper_bound())
            .max(self.ice_now.upper_bound())
    }
}
