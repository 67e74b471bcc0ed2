//! Land/water raster classification and coastline normals.
//!
//! The raster is decoded once at startup and classified into water, land and
//! coast cells. A coast cell is a water cell that borders land along at least
//! one of the 8 compass directions; it stores the rounded direction of the
//! summed land-ward vectors.

mod compass;

pub use compass::{CellClass, CellKind, Compass, CoastNormal, DIAGONAL_WEIGHT};

use crate::config::RasterConfig;
use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use snow_common::{GridSpec, SnowError, SnowResult};
use std::path::Path;
use tracing::{debug, info};

/// Cell census of a classified raster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassStats {
    pub water: usize,
    pub land: usize,
    pub coast: usize,
}

/// Immutable classification of the land/water raster.
#[derive(Debug, Clone)]
pub struct CoastMap {
    grid: GridSpec,
    cells: Vec<CellClass>,
    stats: ClassStats,
}

impl CoastMap {
    /// Decode a land/water image from disk and classify it.
    pub fn load(path: impl AsRef<Path>, config: &RasterConfig) -> SnowResult<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| SnowError::RasterLoad(format!("{}: {}", path.display(), e)))?
            .to_luma8();

        info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "Decoded land/water raster"
        );

        Self::from_image(&image, config)
    }

    /// Classify an already decoded single-channel image.
    ///
    /// The image must match `config.grid` exactly. Row 0 of the image is the
    /// northern edge; grid cells are mapped onto it with the configured shifts.
    pub fn from_image(image: &GrayImage, config: &RasterConfig) -> SnowResult<Self> {
        config.validate()?;
        let grid = config.grid;
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width != grid.n_lon || height != grid.n_lat {
            return Err(SnowError::RasterDimensions {
                expected_width: grid.n_lon,
                expected_height: grid.n_lat,
                actual_width: width,
                actual_height: height,
            });
        }

        let mut mask = vec![false; grid.len()];
        mask.par_chunks_mut(grid.n_lon)
            .enumerate()
            .for_each(|(j, row)| {
                let y = (height as i32 - 1 - (j as i32 + config.lat_shift_rows))
                    .clamp(0, height as i32 - 1) as u32;
                for (i, water) in row.iter_mut().enumerate() {
                    let x = (i as i32 + config.lon_shift_cols).rem_euclid(width as i32) as u32;
                    *water = image.get_pixel(x, y)[0] == config.water_value;
                }
            });

        Self::from_water_mask(grid, &mask, config.pole_margin)
    }

    /// Classify a grid-space water mask (`true` = water), row-major, row 0 south.
    pub fn from_water_mask(grid: GridSpec, water: &[bool], pole_margin: usize) -> SnowResult<Self> {
        grid.validate()?;
        if water.len() != grid.len() {
            return Err(SnowError::RasterDimensions {
                expected_width: grid.n_lon,
                expected_height: grid.n_lat,
                actual_width: grid.n_lon,
                actual_height: water.len() / grid.n_lon,
            });
        }

        let mut cells = vec![CellClass::Land; grid.len()];
        cells
            .par_chunks_mut(grid.n_lon)
            .enumerate()
            .for_each(|(j, row)| classify_row(&grid, water, pole_margin, j, row));

        let stats = census(&cells);
        info!(
            width = grid.n_lon,
            height = grid.n_lat,
            water = stats.water,
            land = stats.land,
            coast = stats.coast,
            "Classified land/water raster"
        );

        Ok(Self { grid, cells, stats })
    }

    /// Map from hand-made classes, bypassing detection.
    #[cfg(test)]
    pub(crate) fn from_cells(grid: GridSpec, cells: Vec<CellClass>) -> Self {
        let stats = census(&cells);
        Self { grid, cells, stats }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn stats(&self) -> ClassStats {
        self.stats
    }

    /// Stored class with longitude wrap and latitude clamp.
    pub fn class_at(&self, i: i32, j: i32) -> CellClass {
        self.cells[self.grid.flat_index(i, j)]
    }

    pub fn classify(&self, i: i32, j: i32) -> CellKind {
        self.class_at(i, j).kind()
    }

    /// Direction from a coast cell towards land. `None` for any other cell and
    /// for latitude rows the raster does not cover.
    pub fn coast_normal(&self, i: i32, j: i32) -> Option<CoastNormal> {
        if j < 0 || j as usize >= self.grid.n_lat {
            return None;
        }
        match self.class_at(i, j) {
            CellClass::Coast(direction) => Some(direction.into()),
            _ => None,
        }
    }

    /// Open water, excluding coast cells.
    pub fn is_water(&self, i: i32, j: i32) -> bool {
        self.classify(i, j) == CellKind::Water
    }

    pub fn is_land(&self, i: i32, j: i32) -> bool {
        self.classify(i, j) == CellKind::Land
    }
}

fn classify_row(grid: &GridSpec, water: &[bool], pole_margin: usize, j: usize, row: &mut [CellClass]) {
    let is_water = |i: i32, j: i32| water[grid.flat_index(i, j)];
    let inside_margin = j < pole_margin || j + pole_margin >= grid.n_lat;
    let jj = j as i32;

    for (i, cell) in row.iter_mut().enumerate() {
        let ii = i as i32;
        if !is_water(ii, jj) {
            *cell = CellClass::Land;
            continue;
        }
        *cell = CellClass::Water;
        if inside_margin {
            continue;
        }

        let mut qualifying = 0;
        let (mut sum_x, mut sum_y) = (0.0f32, 0.0f32);
        for dir in Compass::ALL {
            let (dx, dy) = dir.step();
            if is_water(ii - 2 * dx, jj - 2 * dy)
                && is_water(ii - dx, jj - dy)
                && !is_water(ii + dx, jj + dy)
            {
                qualifying += 1;
                sum_x += dir.weight() * dx as f32;
                sum_y += dir.weight() * dy as f32;
            }
        }

        if qualifying > 0 {
            match Compass::from_vector(sum_x, sum_y) {
                Some(direction) => *cell = CellClass::Coast(direction),
                None => debug!(i, j, qualifying, "Coast contributions cancel out"),
            }
        }
    }
}

fn census(cells: &[CellClass]) -> ClassStats {
    cells.iter().fold(ClassStats::default(), |mut stats, cell| {
        match cell.kind() {
            CellKind::Water => stats.water += 1,
            CellKind::Land => stats.land += 1,
            CellKind::Coast => stats.coast += 1,
        }
        stats
    })
}
