//! Diagnostic PNG of the raw and corrected snow fields.
//!
//! Land is drawn grey, raw snow in cyan shades and cells raised by the coastal
//! diffusion in yellow. The image is centred on the antimeridian and north is
//! up, matching the layout of the land/water raster.

use crate::coast::CoastMap;
use crate::depth_map::DepthMap;
use image::{ImageBuffer, Rgba, RgbaImage};
use snow_common::{SnowError, SnowResult};
use std::path::Path;
use tracing::info;

const LAND: Rgba<u8> = Rgba([80, 80, 80, 255]);
const SNOW_MIN_DEPTH: f32 = 0.01;
const SNOW_SATURATION_DEPTH: f32 = 0.10;
const SNOW_SHADE_OFFSET: f32 = 70.0;
const RAISED_SHADE_OFFSET: f32 = 100.0;

/// Render the diagnostic map on the classifier grid.
///
/// # Arguments
/// * `raw` - Field as ingested
/// * `corrected` - Field after coastal diffusion
/// * `coast` - Classified land/water raster
pub fn render_snow_map(raw: &DepthMap, corrected: &DepthMap, coast: &CoastMap) -> RgbaImage {
    let grid = *coast.grid();
    let (width, height) = (grid.n_lon as u32, grid.n_lat as u32);
    let mut img = ImageBuffer::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    for j in 0..grid.n_lat as i32 {
        let y = height - 1 - j as u32;
        for i in 0..grid.n_lon as i32 {
            let x = (i as u32 + width / 2) % width;

            let sd = raw.get_idx(i, j);
            let sdc = corrected.get_idx(i, j);

            let pixel = if sd != sdc {
                let rg = shade(RAISED_SHADE_OFFSET, sdc);
                Some(Rgba([rg, rg, 0, 255]))
            } else if sd > SNOW_MIN_DEPTH {
                let bg = shade(SNOW_SHADE_OFFSET, sd.min(SNOW_SATURATION_DEPTH) / SNOW_SATURATION_DEPTH);
                Some(Rgba([0, bg, bg, 255]))
            } else if coast.is_land(i, j) {
                Some(LAND)
            } else {
                None
            };

            if let Some(pixel) = pixel {
                img.put_pixel(x, y, pixel);
            }
        }
    }

    img
}

/// Render the diagnostic map and write it as PNG.
pub fn write_snow_map_png(
    path: impl AsRef<Path>,
    raw: &DepthMap,
    corrected: &DepthMap,
    coast: &CoastMap,
) -> SnowResult<()> {
    let path = path.as_ref();
    let img = render_snow_map(raw, corrected, coast);
    img.save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| SnowError::Image(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), "Wrote snow map");
    Ok(())
}

/// Colour channel `offset + fraction * (255 - offset)`, saturating.
fn shade(offset: f32, fraction: f32) -> u8 {
    (offset + fraction.clamp(0.0, 1.0) * (255.0 - offset)) as u8
}
