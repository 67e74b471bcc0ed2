//! Snow depth service.
//!
//! Wraps [`snow_processor::SnowDepthService`] with a periodic refresh loop
//! that selects the current GFS cycle, fetches its samples and republishes
//! the corrected field, and an HTTP surface for point queries.

pub mod config;
pub mod refresh;
pub mod server;
pub mod sources;

pub use config::ServiceConfig;
pub use refresh::{RefreshOutcome, RefreshPipeline};
pub use server::{build_router, start_server, ServerState};
pub use sources::{
    CsvPassthrough, CycleMode, CycleSelector, ForecastCycle, ForecastFetcher, GfsCycleSelector,
    LocalFileFetcher, SampleConverter,
};
