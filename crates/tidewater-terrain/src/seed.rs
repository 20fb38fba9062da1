//! Deterministic seeded generation utilities.
//!
//! Every randomised phase of the pipeline draws from its own RNG stream,
//! derived from the world seed, the tile coordinate and the phase. Adding or
//! removing draws in one phase therefore never shifts another phase's output.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::TileTerrainData;
use crate::feature::FeatureGeometry;
use crate::grid::TileCoord;

/// Pipeline phases that consume randomness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Geographic mask perturbation.
    Mask,
    /// Raindrop erosion.
    Erosion,
    /// Coastline fractal detail.
    Coastline,
    /// Bay outlines and depth profiles.
    Bay,
    /// Barrier island wave energy and jitter.
    BarrierIsland,
    /// Distributary channel layout.
    Delta,
    /// Beach segmentation.
    Beach,
}

// ---------------------------------------------------------------------------
// Seed derivation
// ---------------------------------------------------------------------------

/// Derive a u64 seed for one phase of one tile.
///
/// Uses SipHash (via std's `DefaultHasher`) to combine the world seed, tile
/// coordinate and phase into a well-distributed u64.
pub fn derive_tile_seed(world_seed: u64, coord: TileCoord, phase: Phase) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    coord.tx.hash(&mut hasher);
    coord.ty.hash(&mut hasher);
    phase.hash(&mut hasher);
    hasher.finish()
}

/// Derive a deterministic RNG for one phase of one tile.
pub fn phase_rng(world_seed: u64, coord: TileCoord, phase: Phase) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_tile_seed(world_seed, coord, phase))
}

/// Derive a seed that depends only on the world seed and a phase, for
/// world-space effects that must agree across tiles.
pub fn derive_world_seed(world_seed: u64, phase: Phase) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    phase.hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Hash the heightfield bits and feature geometry of a tile for determinism
/// comparison.
pub fn hash_tile(tile: &TileTerrainData) -> u64 {
    let mut hasher = DefaultHasher::new();
    tile.tx.hash(&mut hasher);
    tile.ty.hash(&mut hasher);
    for row in &tile.heightfield {
        for v in row {
            v.to_bits().hash(&mut hasher);
        }
    }
    for feature in &tile.features {
        feature.kind().tag().hash(&mut hasher);
        let coords: Vec<geo::Coord<f64>> = match &feature.geometry {
            FeatureGeometry::Point(p) => vec![p.0],
            FeatureGeometry::LineString(ls) => ls.0.clone(),
            FeatureGeometry::Polygon(poly) => poly.exterior().0.clone(),
        };
        for c in coords {
            c.x.to_bits().hash(&mut hasher);
            c.y.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}
