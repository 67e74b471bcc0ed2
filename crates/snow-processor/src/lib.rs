//! Coastal snow depth processing
//!
//! Turns a global snow depth forecast and a static land/water raster into a
//! continuous, queryable effective snow depth field.
//!
//! # Pipeline
//!
//! ```text
//! land/water PNG ──► CoastMap (water / land / coast + normal)
//!                          │
//! lon,lat,value CSV ──► DepthMap (raw)
//!                          │
//!                          ▼
//!          extend_coastal_snow ──► DepthMap (corrected)
//!                          │
//!                          ▼
//!      SnowDepthService::query(lat, lon) ──► DisplayMapper::map(depth)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use snow_processor::{CoastMap, ProcessorConfig, SnowDepthService};
//! use std::sync::Arc;
//!
//! let config = ProcessorConfig::default();
//! let coast = CoastMap::load("esacci_landmask.png", &config.raster)?;
//! let service = SnowDepthService::new(Arc::new(coast), &config)?;
//! service.build_from_file("snod.csv")?;
//!
//! let depth = service.query(47.5, 11.3);
//! let display = service.map_to_display(depth);
//! ```

pub mod coast;
pub mod config;
pub mod depth_map;
pub mod diffusion;
pub mod display;
pub mod export;
pub mod service;

// Re-export commonly used types at crate root
pub use coast::{CellClass, CellKind, ClassStats, CoastMap, CoastNormal, Compass};
pub use config::{DepthGrid, DiffusionParams, ProcessorConfig, RasterConfig};
pub use depth_map::{DepthMap, FieldKind, LoadStats};
pub use diffusion::{extend_coastal_snow, DiffusionStats};
pub use display::{DisplayCurve, DisplayMapper, DisplayParams};
pub use export::{render_snow_map, write_snow_map_png};
pub use service::{PublishedField, SnowDepthService};
pub use snow_common::{GridSpec, SnowError, SnowResult};
