//! Terrain generation error types.

use tidewater_config::ConfigError;

use crate::grid::TileCoord;

/// Errors surfaced by generation and export.
///
/// Geometry faults inside the pipeline never reach this type; they are
/// repaired or the offending feature is skipped.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// The configuration cannot drive the pipeline.
    #[error("invalid terrain configuration: {0}")]
    Config(#[from] ConfigError),

    /// The 3x3 block around this tile leaves the `i32` tile grid.
    #[error("tile block around ({}, {}) is outside the tile grid", .0.tx, .0.ty)]
    OutOfRange(TileCoord),

    /// Encoding GeoJSON or heightfield JSON failed.
    #[error("failed to encode terrain output: {0}")]
    Export(#[from] serde_json::Error),

    /// Writing output files failed.
    #[error("failed to write terrain output: {0}")]
    Io(#[from] std::io::Error),
}
