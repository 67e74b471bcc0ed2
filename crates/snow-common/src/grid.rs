//! Geometry of the global longitude/latitude grids.
//!
//! Longitude index 0 sits on 0°E and grows eastward; latitude index 0 sits on
//! -90° and grows northward. Longitude wraps around the globe, latitude is
//! clamped at the poles.

use crate::{SnowError, SnowResult};
use serde::{Deserialize, Serialize};

/// Guard against decimal values such as `0.3 * 10 = 2.9999999` landing in the
/// cell below when converting sample coordinates to indices.
const INDEX_EPSILON: f64 = 1e-6;

/// Specification of a regular global lon/lat grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of points in longitude direction (covers [0, 360))
    pub n_lon: usize,
    /// Number of points in latitude direction (starting at -90°)
    pub n_lat: usize,
    /// Grid points per degree (10 for 0.1° cells)
    pub cells_per_degree: f64,
}

impl GridSpec {
    /// Create a validated grid specification.
    pub fn new(n_lon: usize, n_lat: usize, cells_per_degree: f64) -> SnowResult<Self> {
        let spec = Self {
            n_lon,
            n_lat,
            cells_per_degree,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check that the grid is non-empty and spans the full longitude circle.
    pub fn validate(&self) -> SnowResult<()> {
        if self.n_lon == 0 || self.n_lat == 0 {
            return Err(SnowError::InvalidGrid(format!(
                "grid {}x{} is empty",
                self.n_lon, self.n_lat
            )));
        }
        if !self.cells_per_degree.is_finite() || self.cells_per_degree <= 0.0 {
            return Err(SnowError::InvalidGrid(format!(
                "cells_per_degree must be positive, got {}",
                self.cells_per_degree
            )));
        }
        let expected_lon = 360.0 * self.cells_per_degree;
        if (self.n_lon as f64 - expected_lon).abs() > 1e-6 {
            return Err(SnowError::InvalidGrid(format!(
                "n_lon {} does not cover 360° at {} cells/degree",
                self.n_lon, self.cells_per_degree
            )));
        }
        if self.n_lat as f64 > 180.0 * self.cells_per_degree + 1.0 + 1e-6 {
            return Err(SnowError::InvalidGrid(format!(
                "n_lat {} exceeds 180° at {} cells/degree",
                self.n_lat, self.cells_per_degree
            )));
        }
        Ok(())
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.n_lon * self.n_lat
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.n_lon == 0 || self.n_lat == 0
    }

    /// Longitude index modulo the grid width, in both directions.
    #[inline]
    pub fn wrap_lon(&self, i: i32) -> usize {
        i.rem_euclid(self.n_lon as i32) as usize
    }

    /// Latitude index confined to `[0, n_lat - 1]`.
    #[inline]
    pub fn clamp_lat(&self, j: i32) -> usize {
        j.clamp(0, self.n_lat as i32 - 1) as usize
    }

    /// Row-major flat index after wrapping longitude and clamping latitude.
    #[inline]
    pub fn flat_index(&self, i: i32, j: i32) -> usize {
        self.clamp_lat(j) * self.n_lon + self.wrap_lon(i)
    }

    /// Whether `(i, j)` is a valid index without any wrapping.
    pub fn contains(&self, i: i32, j: i32) -> bool {
        i >= 0 && j >= 0 && (i as usize) < self.n_lon && (j as usize) < self.n_lat
    }

    /// Convert geographic coordinates to continuous grid coordinates.
    ///
    /// Longitude is normalised to [0, 360) (so -180..180 input works too),
    /// latitude is clamped to [-90, 90] and offset by +90°.
    pub fn continuous_coords(&self, lon: f64, lat: f64) -> (f64, f64) {
        let lon = if lon.is_finite() { lon.rem_euclid(360.0) } else { 0.0 };
        let lat = if lat.is_finite() { lat.clamp(-90.0, 90.0) } else { 0.0 };
        (
            lon * self.cells_per_degree,
            (lat + 90.0) * self.cells_per_degree,
        )
    }

    /// Nearest lower grid index for a sample coordinate, or `None` if the
    /// latitude falls outside the grid.
    pub fn sample_index(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let x = (lon.rem_euclid(360.0) * self.cells_per_degree + INDEX_EPSILON).floor() as i64;
        let y = ((lat + 90.0) * self.cells_per_degree + INDEX_EPSILON).floor() as i64;
        if y < 0 || y >= self.n_lat as i64 {
            return None;
        }
        // x may reach n_lon for lon values a hair below 360
        let x = x.rem_euclid(self.n_lon as i64) as usize;
        Some((x, y as usize))
    }

    /// Geographic coordinates (lon in [0, 360), lat in [-90, 90]) of a grid index.
    pub fn index_to_coord(&self, i: usize, j: usize) -> (f64, f64) {
        (
            i as f64 / self.cells_per_degree,
            j as f64 / self.cells_per_degree - 90.0,
        )
    }
}

/// Canonical grids of the snow pipeline.
pub mod grids {
    use super::*;

    /// Forecast depth grid: 3600 x 1801 points at 0.1°, lat -90..=90.
    pub fn depth_0p1() -> GridSpec {
        GridSpec {
            n_lon: 3600,
            n_lat: 1801,
            cells_per_degree: 10.0,
        }
    }

    /// Land/water raster grid: 3600 x 1800 cells at 0.1°.
    pub fn coast_0p1() -> GridSpec {
        GridSpec {
            n_lon: 3600,
            n_lat: 1800,
            cells_per_degree: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_grids_validate() {
        assert!(grids::depth_0p1().validate().is_ok());
        assert!(grids::coast_0p1().validate().is_ok());
        assert_eq!(grids::depth_0p1().len(), 3600 * 1801);
    }

    #[test]
    fn test_invalid_grids() {
        assert!(GridSpec::new(0, 10, 10.0).is_err());
        assert!(GridSpec::new(3600, 1801, 0.0).is_err());
        assert!(GridSpec::new(3500, 1801, 10.0).is_err());
        assert!(GridSpec::new(3600, 1900, 10.0).is_err());
        assert!(GridSpec::new(36, 19, 0.1).is_ok());
    }

    #[test]
    fn test_wrap_lon_both_directions() {
        let grid = grids::depth_0p1();
        assert_eq!(grid.wrap_lon(3600), 0);
        assert_eq!(grid.wrap_lon(3601), 1);
        assert_eq!(grid.wrap_lon(-1), 3599);
        assert_eq!(grid.wrap_lon(-3601), 3599);
        assert_eq!(grid.wrap_lon(1234), 1234);
    }

    #[test]
    fn test_clamp_lat_at_poles() {
        let grid = grids::depth_0p1();
        assert_eq!(grid.clamp_lat(-5), 0);
        assert_eq!(grid.clamp_lat(1801), 1800);
        assert_eq!(grid.clamp_lat(i32::MAX), 1800);
        assert_eq!(grid.clamp_lat(900), 900);
    }

    #[test]
    fn test_continuous_coords() {
        let grid = grids::depth_0p1();
        let (x, y) = grid.continuous_coords(-0.05, 0.0);
        assert!((x - 3599.5).abs() < 1e-6);
        assert!((y - 900.0).abs() < 1e-6);

        let (_, y) = grid.continuous_coords(10.0, 95.0);
        assert!((y - 1800.0).abs() < 1e-9);
    }

    #[test]
    fn test_sample_index_decimal_guard() {
        let grid = grids::depth_0p1();
        assert_eq!(grid.sample_index(0.3, -89.7), Some((3, 3)));
        assert_eq!(grid.sample_index(359.9, 90.0), Some((3599, 1800)));
        assert_eq!(grid.sample_index(-0.1, 0.0), Some((3599, 900)));
        assert_eq!(grid.sample_index(10.0, 90.2), None);
        assert_eq!(grid.sample_index(f64::NAN, 0.0), None);
    }

    #[test]
    fn test_index_to_coord() {
        let grid = grids::depth_0p1();
        let (lon, lat) = grid.index_to_coord(1800, 0);
        assert!((lon - 180.0).abs() < 1e-9);
        assert!((lat + 90.0).abs() < 1e-9);
    }
}
