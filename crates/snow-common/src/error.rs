//! Error types for the coastal snow pipeline.

use thiserror::Error;

/// Result type alias using SnowError.
pub type SnowResult<T> = Result<T, SnowError>;

/// Primary error type for classifier, field and service operations.
#[derive(Debug, Error)]
pub enum SnowError {
    // === Setup Errors ===
    #[error("Failed to load land/water raster: {0}")]
    RasterLoad(String),

    #[error("Raster has dimensions {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    RasterDimensions {
        expected_width: usize,
        expected_height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid interpolation table: {0}")]
    InvalidTable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // === Ingestion Errors ===
    #[error("Failed to ingest forecast samples: {0}")]
    Ingest(String),

    #[error("A field build is already in progress")]
    BuildInProgress,

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Image error: {0}")]
    Image(String),
}

impl SnowError {
    /// Whether the error leaves the service usable with its previous field.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SnowError::Ingest(_) | SnowError::BuildInProgress | SnowError::Io(_)
        )
    }

    /// Short machine-readable code for API responses and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            SnowError::RasterLoad(_) => "raster_load",
            SnowError::RasterDimensions { .. } => "raster_dimensions",
            SnowError::InvalidGrid(_) => "invalid_grid",
            SnowError::InvalidTable(_) => "invalid_table",
            SnowError::Config(_) => "config",
            SnowError::Ingest(_) => "ingest",
            SnowError::BuildInProgress => "build_in_progress",
            SnowError::Io(_) => "io",
            SnowError::Image(_) => "image",
        }
    }
}

impl From<std::io::Error> for SnowError {
    fn from(err: std::io::Error) -> Self {
        SnowError::Io(err.to_string())
    }
}
