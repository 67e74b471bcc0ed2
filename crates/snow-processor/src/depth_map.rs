//! Global scalar field with longitude wraparound and bilinear lookup.

use serde::{Deserialize, Serialize};
use snow_common::{GridSpec, SnowError, SnowResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Sample values below this are reported as no snow.
const MIN_REPORTED_DEPTH: f32 = 0.001;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Which stage of the pipeline produced a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Raw,
    Corrected,
}

/// Record counts of one sample ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Data lines after the header.
    pub records: usize,
    pub accepted: usize,
    /// Accepted records whose value was reported as zero.
    pub zeroed: usize,
    pub malformed: usize,
    pub out_of_grid: usize,
}

/// Snow depth (m) on a regular global grid, stored row-major.
#[derive(Debug, Clone)]
pub struct DepthMap {
    grid: GridSpec,
    kind: FieldKind,
    seq: u64,
    loaded: bool,
    values: Vec<f32>,
}

impl DepthMap {
    /// Zero-filled field that is not yet loaded.
    pub fn new(grid: GridSpec, kind: FieldKind) -> Self {
        Self {
            grid,
            kind,
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            loaded: false,
            values: vec![0.0; grid.len()],
        }
    }

    /// Loaded field from a row-major value vector.
    pub fn from_values(grid: GridSpec, kind: FieldKind, values: Vec<f32>) -> SnowResult<Self> {
        grid.validate()?;
        if values.len() != grid.len() {
            return Err(SnowError::InvalidGrid(format!(
                "expected {} values for a {}x{} grid, got {}",
                grid.len(),
                grid.n_lon,
                grid.n_lat,
                values.len()
            )));
        }
        let mut map = Self::new(grid, kind);
        map.values = values;
        map.loaded = true;
        Ok(map)
    }

    /// Loaded field on the same grid with new values of the same length.
    pub(crate) fn derive(&self, kind: FieldKind, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), self.values.len());
        let mut map = Self::new(self.grid, kind);
        map.values = values;
        map.loaded = true;
        map
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Bilinear lookup at a geographic position.
    ///
    /// Longitude may be given in [-180, 180) or [0, 360). The result always
    /// lies between the smallest and largest of the four surrounding cells.
    pub fn get(&self, lon: f64, lat: f64) -> f32 {
        if !self.loaded {
            warn!(seq = self.seq, kind = ?self.kind, "Depth map queried before it was loaded");
            return 0.0;
        }

        let (x, y) = self.grid.continuous_coords(lon, lat);
        let (x0, y0) = (x.floor(), y.floor());
        let s = (x - x0) as f32;
        let t = (y - y0) as f32;
        let (i, j) = (x0 as i32, y0 as i32);

        let v00 = self.get_idx(i, j);
        let v10 = self.get_idx(i + 1, j);
        let v01 = self.get_idx(i, j + 1);
        let v11 = self.get_idx(i + 1, j + 1);

        let value = (1.0 - s) * (1.0 - t) * v00 + s * (1.0 - t) * v10 + (1.0 - s) * t * v01 + s * t * v11;

        let lo = v00.min(v10).min(v01).min(v11);
        let hi = v00.max(v10).max(v01).max(v11);
        value.clamp(lo, hi)
    }

    /// Exact cell value with longitude wrap and latitude clamp.
    #[inline]
    pub fn get_idx(&self, i: i32, j: i32) -> f32 {
        self.values[self.grid.flat_index(i, j)]
    }

    #[inline]
    pub fn set_idx(&mut self, i: i32, j: i32, value: f32) {
        let idx = self.grid.flat_index(i, j);
        self.values[idx] = value;
    }

    /// Raise a cell to `value` if it is currently lower. Returns whether it changed.
    #[inline]
    pub fn raise_idx(&mut self, i: i32, j: i32, value: f32) -> bool {
        let idx = self.grid.flat_index(i, j);
        if value > self.values[idx] {
            self.values[idx] = value;
            true
        } else {
            false
        }
    }

    pub fn max_value(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }

    pub fn count_above(&self, threshold: f32) -> usize {
        self.values.iter().filter(|&&v| v > threshold).count()
    }

    /// Populate the field from a header line followed by `lon, lat, value` records.
    ///
    /// Rows that are not valid UTF-8 count as malformed. On error the field
    /// is left untouched.
    pub fn load_csv<R: BufRead>(&mut self, mut reader: R) -> SnowResult<LoadStats> {
        let mut buf = Vec::new();
        let header_len = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| SnowError::Ingest(format!("read header: {}", e)))?;
        if header_len == 0 {
            return Err(SnowError::Ingest("sample stream is empty".to_string()));
        }
        debug!(
            seq = self.seq,
            header = %String::from_utf8_lossy(&buf).trim(),
            "Skipping sample header"
        );

        let mut values = vec![0.0f32; self.grid.len()];
        let mut stats = LoadStats::default();
        let mut line_no = 1;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| SnowError::Ingest(format!("read line {}: {}", line_no + 1, e)))?;
            if read == 0 {
                break;
            }
            line_no += 1;

            // A corrupt row is malformed, not a broken stream
            let Ok(line) = std::str::from_utf8(&buf) else {
                stats.records += 1;
                stats.malformed += 1;
                debug!(seq = self.seq, line = line_no, "Skipping non-UTF-8 sample row");
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            stats.records += 1;

            let Some((lon, lat, value)) = parse_record(line) else {
                stats.malformed += 1;
                continue;
            };
            let Some((i, j)) = self.grid.sample_index(lon, lat) else {
                stats.out_of_grid += 1;
                continue;
            };

            if value == 0.0 {
                stats.zeroed += 1;
            }
            values[j * self.grid.n_lon + i] = value;
            stats.accepted += 1;
        }

        if stats.accepted == 0 {
            return Err(SnowError::Ingest(format!(
                "no usable records ({} read, {} malformed, {} outside the grid)",
                stats.records, stats.malformed, stats.out_of_grid
            )));
        }

        self.values = values;
        self.loaded = true;

        info!(
            seq = self.seq,
            records = stats.records,
            accepted = stats.accepted,
            zeroed = stats.zeroed,
            malformed = stats.malformed,
            out_of_grid = stats.out_of_grid,
            "Loaded snow depth samples"
        );
        Ok(stats)
    }

    /// Open a sample file and load it with [`DepthMap::load_csv`].
    pub fn load_csv_file(&mut self, path: impl AsRef<Path>) -> SnowResult<LoadStats> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SnowError::Ingest(format!("open {}: {}", path.display(), e)))?;
        self.load_csv(BufReader::new(file))
    }
}

/// Parse one `lon, lat, value` record. Returns `None` for malformed lines.
fn parse_record(line: &str) -> Option<(f64, f64, f32)> {
    let mut fields = line
        .split([',', ';', '\t', ' '])
        .map(str::trim)
        .filter(|f| !f.is_empty());

    let lon: f64 = fields.next()?.parse().ok()?;
    let lat: f64 = fields.next()?.parse().ok()?;
    let raw = fields.next()?;
    if !lon.is_finite() || !lat.is_finite() {
        return None;
    }

    // Tiny values are written with an exponent by the converter
    if raw.contains(['e', 'E']) {
        return Some((lon, lat, 0.0));
    }
    let value: f32 = raw.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let value = if value < MIN_REPORTED_DEPTH { 0.0 } else { value };
    Some((lon, lat, value))
}
