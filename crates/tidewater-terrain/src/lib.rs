//! Deterministic tiled terrain generation: seeded fBm heightfields shaped by a
//! geographic mask and hydraulic erosion, then read back as vector landforms
//! (coastlines, bays, barrier islands, rivers, deltas, lakes, beaches and
//! contours) clipped to their tile and exported as GeoJSON.

mod async_generation;
mod barrier;
mod bay;
mod beach;
mod clip;
mod coastline;
mod contour;
mod delta;
mod erosion;
mod error;
mod flow;
mod generator;
mod heightmap;
mod lake;
mod mask;
mod river;
mod seed;

pub mod export;
pub mod feature;
pub mod geometry;
pub mod grid;

pub use async_generation::{AsyncTerrainGenerator, GeneratedTerrain, GenerationTask};
pub use barrier::extract_barrier_islands;
pub use bay::{Bay, ConcaveRun, apply_bay_erosion, extract_bays};
pub use beach::{BeachContext, Overlaps, Verdict, classify_beach, extract_beaches};
pub use clip::{MIN_RETAINED_FRACTION, clip_feature, clip_features, clip_line, clip_polygon};
pub use coastline::{extract_coastlines, landmass_polygons};
pub use contour::{cell_segments, extract_contours};
pub use delta::{OffshoreProfile, classify_mouth, extract_deltas};
pub use erosion::{ErosionStats, erode};
pub use error::TerrainError;
pub use feature::{FeatureGeometry, FeatureKind, FeatureProperties, TerrainFeature};
pub use flow::{FlowGrid, accumulate_flow, downstream};
pub use generator::{HeightfieldRecord, TerrainResult, TileTerrainData, generate, generate_tile};
pub use grid::{Heightfield, TileCoord, TileFrame};
pub use heightmap::{HeightmapParams, HeightmapSampler, generate_heightfield};
pub use lake::{Lake, LakeMetrics, classify_lake, extract_lakes};
pub use mask::{MaskContext, MaskFn, apply_mask, mask_for};
pub use river::{River, extract_rivers, river_width};
pub use seed::{Phase, derive_tile_seed, derive_world_seed, hash_tile, phase_rng};
pub use tidewater_config::{TerrainConfig, WorldType};
