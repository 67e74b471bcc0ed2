//! Application context owning the classifier and the published field.

use crate::coast::CoastMap;
use crate::config::{DiffusionParams, ProcessorConfig};
use crate::depth_map::{DepthMap, FieldKind, LoadStats};
use crate::diffusion::{extend_coastal_snow, DiffusionStats};
use crate::display::{DisplayMapper, DisplayParams};
use chrono::{DateTime, Utc};
use snow_common::{GridSpec, SnowError, SnowResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tracing::{info, warn};

/// A raw field and its diffused counterpart, published together.
#[derive(Debug)]
pub struct PublishedField {
    pub raw: DepthMap,
    pub corrected: DepthMap,
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    pub load: LoadStats,
    pub diffusion: DiffusionStats,
}

/// Owns the coast map and the current depth field; shared by reference.
///
/// Readers clone an `Arc` to the published field and never observe a field
/// that is still being built. At most one build runs at a time.
#[derive(Debug)]
pub struct SnowDepthService {
    coast: Arc<CoastMap>,
    depth_grid: GridSpec,
    params: DiffusionParams,
    mapper: DisplayMapper,
    current: RwLock<Option<Arc<PublishedField>>>,
    building: AtomicBool,
    next_generation: AtomicU64,
}

/// Clears the build flag when dropped.
struct BuildGuard<'a>(&'a AtomicBool);

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SnowDepthService {
    pub fn new(coast: Arc<CoastMap>, config: &ProcessorConfig) -> SnowResult<Self> {
        config.diffusion.validate()?;
        let depth_grid = config.depth_grid.0;
        depth_grid.validate()?;
        if depth_grid.n_lon != coast.grid().n_lon {
            return Err(SnowError::Config(format!(
                "depth grid width {} differs from coast map width {}",
                depth_grid.n_lon,
                coast.grid().n_lon
            )));
        }

        Ok(Self {
            coast,
            depth_grid,
            params: config.diffusion,
            mapper: DisplayMapper::default(),
            current: RwLock::new(None),
            building: AtomicBool::new(false),
            next_generation: AtomicU64::new(1),
        })
    }

    /// Replace the display tables.
    pub fn with_mapper(mut self, mapper: DisplayMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn coast(&self) -> &Arc<CoastMap> {
        &self.coast
    }

    pub fn depth_grid(&self) -> &GridSpec {
        &self.depth_grid
    }

    pub fn params(&self) -> &DiffusionParams {
        &self.params
    }

    /// Load, diffuse and publish a new field from a sample stream.
    ///
    /// Fails with [`SnowError::BuildInProgress`] while another build runs. On
    /// any failure the previously published field stays in place.
    pub fn build_from_reader<R: BufRead>(&self, reader: R) -> SnowResult<Arc<PublishedField>> {
        let _guard = self.begin_build()?;
        let start = Instant::now();

        let mut raw = DepthMap::new(self.depth_grid, FieldKind::Raw);
        let load = raw.load_csv(reader)?;
        let (corrected, diffusion) = extend_coastal_snow(&raw, &self.coast, &self.params);

        let field = Arc::new(PublishedField {
            raw,
            corrected,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            built_at: Utc::now(),
            load,
            diffusion,
        });
        self.publish(field.clone());

        info!(
            generation = field.generation,
            accepted = load.accepted,
            cells_raised = diffusion.cells_raised,
            duration_ms = start.elapsed().as_millis() as u64,
            "Published snow depth field"
        );
        Ok(field)
    }

    /// Open a sample file and build from it.
    pub fn build_from_file(&self, path: impl AsRef<Path>) -> SnowResult<Arc<PublishedField>> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| SnowError::Ingest(format!("open {}: {}", path.display(), e)))?;
        self.build_from_reader(BufReader::new(file))
    }

    /// Current published field, if any.
    pub fn snapshot(&self) -> Option<Arc<PublishedField>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Corrected snow depth (m) at a position; 0 before the first build.
    pub fn query(&self, lat: f64, lon: f64) -> f32 {
        match self.snapshot() {
            Some(field) => field.corrected.get(lon, lat),
            None => {
                warn!(lat, lon, "Snow depth queried before any field was published");
                0.0
            }
        }
    }

    pub fn map_to_display(&self, depth: f32) -> DisplayParams {
        self.mapper.map(depth)
    }

    pub fn display_at(&self, lat: f64, lon: f64) -> DisplayParams {
        self.map_to_display(self.query(lat, lon))
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::Acquire)
    }

    /// Generation of the published field, 0 before the first build.
    pub fn generation(&self) -> u64 {
        self.snapshot().map_or(0, |f| f.generation)
    }

    fn begin_build(&self) -> SnowResult<BuildGuard<'_>> {
        self.building
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SnowError::BuildInProgress)?;
        Ok(BuildGuard(&self.building))
    }

    fn publish(&self, field: Arc<PublishedField>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(field);
    }
}
