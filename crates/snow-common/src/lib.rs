//! Common types shared by the coastal snow crates.

pub mod error;
pub mod grid;

pub use error::{SnowError, SnowResult};
pub use grid::{grids, GridSpec};
