//! Coastal snow diffusion.
//!
//! Forecast grids often report bare ground on coastal cells even when snow
//! lies a few kilometres inland. For every snow-free coast cell we look along
//! the coastline normal for inland snow and carry it back to the coast with
//! an exponential decay.

use crate::coast::{CoastMap, CoastNormal};
use crate::config::DiffusionParams;
use crate::depth_map::{DepthMap, FieldKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counters of one diffusion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffusionStats {
    /// Coast cells at or below the no-snow threshold.
    pub coast_cells_checked: usize,
    pub anchors_found: usize,
    /// Cells whose corrected value ended up above the raw value.
    pub cells_raised: usize,
}

/// Pending raise of one cell.
#[derive(Debug, Clone, Copy)]
struct Raise {
    i: i32,
    j: i32,
    value: f32,
}

#[derive(Debug, Default)]
struct RowOutcome {
    checked: usize,
    anchors: usize,
    raises: Vec<Raise>,
}

/// Build the corrected field from `raw`.
///
/// The result is never below `raw` at any cell. Rows are scanned in parallel;
/// their contributions are merged with a pointwise maximum, so the outcome
/// does not depend on scheduling.
pub fn extend_coastal_snow(
    raw: &DepthMap,
    coast: &CoastMap,
    params: &DiffusionParams,
) -> (DepthMap, DiffusionStats) {
    let grid = *raw.grid();

    let rows: Vec<RowOutcome> = (0..grid.n_lat)
        .into_par_iter()
        .map(|j| scan_row(raw, coast, params, j as i32))
        .collect();

    let mut values = raw.values().to_vec();
    let mut stats = DiffusionStats::default();
    for row in rows {
        stats.coast_cells_checked += row.checked;
        stats.anchors_found += row.anchors;
        for raise in row.raises {
            let idx = grid.flat_index(raise.i, raise.j);
            if raise.value > values[idx] {
                values[idx] = raise.value;
            }
        }
    }

    stats.cells_raised = values
        .iter()
        .zip(raw.values())
        .filter(|(c, r)| c > r)
        .count();

    let corrected = raw.derive(FieldKind::Corrected, values);

    info!(
        raw_seq = raw.seq(),
        corrected_seq = corrected.seq(),
        coast_cells_checked = stats.coast_cells_checked,
        anchors_found = stats.anchors_found,
        cells_raised = stats.cells_raised,
        "Extended coastal snow"
    );

    (corrected, stats)
}

fn scan_row(raw: &DepthMap, coast: &CoastMap, params: &DiffusionParams, j: i32) -> RowOutcome {
    let mut outcome = RowOutcome::default();
    let threshold = params.no_snow_threshold;

    for i in 0..raw.grid().n_lon as i32 {
        let Some(normal) = coast.coast_normal(i, j) else {
            continue;
        };
        let local = raw.get_idx(i, j);
        if local > threshold {
            continue;
        }
        outcome.checked += 1;

        if let Some((dist, anchor)) = find_inland_snow(raw, coast, params, i, j, local, normal) {
            outcome.anchors += 1;
            let mut value = anchor;
            for k in (0..dist).rev() {
                value = (value * params.decay).max(threshold);
                outcome.raises.push(Raise {
                    i: i + k * normal.step_x,
                    j: j + k * normal.step_y,
                    value,
                });
            }
        }
    }

    outcome
}

/// First cell along the normal with more snow than both the coast cell and
/// the threshold. Water is skipped except on the last step.
fn find_inland_snow(
    raw: &DepthMap,
    coast: &CoastMap,
    params: &DiffusionParams,
    i: i32,
    j: i32,
    local: f32,
    normal: CoastNormal,
) -> Option<(i32, f32)> {
    let max_step = params.max_step as i32;
    for k in 1..=max_step {
        let x = i + k * normal.step_x;
        let y = j + k * normal.step_y;
        if k < max_step && coast.is_water(x, y) {
            continue;
        }
        let value = raw.get_idx(x, y);
        if value > local && value > params.no_snow_threshold {
            return Some((k, value));
        }
    }
    None
}
