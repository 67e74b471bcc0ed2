//! Generators for synthetic land/water masks, rasters and sample streams.
//!
//! Masks are row-major with row 0 at the southern edge and `true` for water,
//! the layout `CoastMap::from_water_mask` expects.

use image::{GrayImage, Luma};
use snow_common::GridSpec;
use std::fmt::Write;

/// Pixel value used for land in generated rasters; water is 0.
pub const LAND_PIXEL: u8 = 255;

/// A global grid with `n_lon` columns covering 360°.
pub fn test_grid(n_lon: usize, n_lat: usize) -> GridSpec {
    GridSpec::new(n_lon, n_lat, n_lon as f64 / 360.0).expect("valid test grid")
}

/// Builds a mask from ASCII rows, northernmost row first.
///
/// `#` is land, anything else is water.
///
/// # Example
///
/// ```
/// use test_utils::mask_from_ascii;
///
/// let mask = mask_from_ascii(&["..#", "###"]);
/// assert_eq!(mask, vec![false, false, false, true, true, false]);
/// ```
pub fn mask_from_ascii(rows: &[&str]) -> Vec<bool> {
    rows.iter()
        .rev()
        .flat_map(|row| row.chars().map(|c| c != '#'))
        .collect()
}

/// Water everywhere, land from column `land_from` to the east edge.
///
/// The land block also meets column 0 across the antimeridian.
pub fn straight_coast_mask(grid: &GridSpec, land_from: usize) -> Vec<bool> {
    (0..grid.len())
        .map(|idx| idx % grid.n_lon < land_from)
        .collect()
}

/// A southern land mass (rows `0..base_rows`) with a one cell wide isthmus
/// at `column` reaching north up to and including `tip_row`.
///
/// The isthmus is surrounded by water on its west, east and north sides.
pub fn isthmus_mask(grid: &GridSpec, column: usize, base_rows: usize, tip_row: usize) -> Vec<bool> {
    (0..grid.len())
        .map(|idx| {
            let (i, j) = (idx % grid.n_lon, idx / grid.n_lon);
            let land = j < base_rows || (i == column && j <= tip_row);
            !land
        })
        .collect()
}

/// Renders a grid-space mask as an unshifted raster (image row 0 = north).
pub fn mask_to_image(grid: &GridSpec, water: &[bool]) -> GrayImage {
    let (w, h) = (grid.n_lon as u32, grid.n_lat as u32);
    GrayImage::from_fn(w, h, |x, y| {
        let j = (h - 1 - y) as usize;
        let idx = j * grid.n_lon + x as usize;
        if water[idx] {
            Luma([0])
        } else {
            Luma([LAND_PIXEL])
        }
    })
}

/// Writes a sample stream with a header line.
///
/// # Example
///
/// ```
/// use test_utils::depth_csv;
///
/// let csv = depth_csv(&[(10.0, 45.0, 0.3)]);
/// assert_eq!(csv, "lon,lat,snod\n10,45,0.3\n");
/// ```
pub fn depth_csv(samples: &[(f64, f64, f32)]) -> String {
    let mut out = String::from("lon,lat,snod\n");
    for (lon, lat, value) in samples {
        let _ = writeln!(out, "{},{},{}", lon, lat, value);
    }
    out
}

/// Writes one record per cell of `grid`, taking the value from `value_at(i, j)`.
pub fn grid_csv(grid: &GridSpec, value_at: impl Fn(usize, usize) -> f32) -> String {
    let mut out = String::from("lon,lat,snod\n");
    for j in 0..grid.n_lat {
        for i in 0..grid.n_lon {
            let (lon, lat) = grid.index_to_coord(i, j);
            let _ = writeln!(out, "{:.3},{:.3},{}", lon, lat, value_at(i, j));
        }
    }
    out
}
