//! Per-tile phase sequence and the 3×3 orchestrator.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tidewater_config::TerrainConfig;

use crate::barrier::extract_barrier_islands;
use crate::bay::{apply_bay_erosion, extract_bays};
use crate::beach::{BeachContext, extract_beaches};
use crate::clip::clip_features;
use crate::coastline::extract_coastlines;
use crate::contour::extract_contours;
use crate::delta::extract_deltas;
use crate::erosion::erode;
use crate::error::TerrainError;
use crate::export;
use crate::feature::{FeatureKind, TerrainFeature, polygons_of};
use crate::flow::accumulate_flow;
use crate::grid::{TileCoord, TileFrame};
use crate::heightmap::generate_heightfield;
use crate::lake::extract_lakes;
use crate::mask::{MaskContext, apply_mask};
use crate::river::extract_rivers;
use crate::seed::{Phase, phase_rng};

/// Heightfield and features of one generated tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileTerrainData {
    /// Column index.
    pub tx: i32,
    /// Row index.
    pub ty: i32,
    /// Final heights, `heightfield[y][x]`, all in `[0, 1]`.
    pub heightfield: Vec<Vec<f64>>,
    /// Clipped features, in phase order.
    pub features: Vec<TerrainFeature>,
}

/// Heightfield-only view for raw storage.
#[derive(Debug, Serialize)]
pub struct HeightfieldRecord<'a> {
    pub tx: i32,
    pub ty: i32,
    pub resolution: usize,
    pub heightfield: &'a [Vec<f64>],
}

impl TileTerrainData {
    /// Tile coordinate.
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.tx, self.ty)
    }

    pub fn heightfield_record(&self) -> HeightfieldRecord<'_> {
        HeightfieldRecord {
            tx: self.tx,
            ty: self.ty,
            resolution: self.heightfield.len(),
            heightfield: &self.heightfield,
        }
    }

    /// GeoJSON `FeatureCollection` of every feature on the tile.
    pub fn to_feature_collection(&self) -> Result<serde_json::Value, TerrainError> {
        export::feature_collection(&self.features)
    }

    /// Features of one kind.
    pub fn features_of(&self, kind: FeatureKind) -> impl Iterator<Item = &TerrainFeature> {
        self.features.iter().filter(move |f| f.kind() == kind)
    }
}

/// A center tile and its eight neighbours.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainResult {
    /// The requested tile.
    pub center: TileTerrainData,
    /// Neighbours keyed by `(dx, dy)` offset from the center.
    pub neighbors: BTreeMap<(i32, i32), TileTerrainData>,
}

impl TerrainResult {
    /// The tile at offset `(dx, dy)`; `(0, 0)` is the center.
    pub fn tile(&self, dx: i32, dy: i32) -> Option<&TileTerrainData> {
        if (dx, dy) == (0, 0) {
            Some(&self.center)
        } else {
            self.neighbors.get(&(dx, dy))
        }
    }

    /// All nine tiles in row-major offset order, top-left first.
    pub fn all_tiles(&self) -> Vec<(TileCoord, &TileTerrainData)> {
        let mut tiles = Vec::with_capacity(9);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(tile) = self.tile(dx, dy) {
                    tiles.push((tile.coord(), tile));
                }
            }
        }
        tiles
    }
}

/// Generates the tile at `(center_tx, center_ty)` and its eight neighbours.
pub fn generate(
    config: &TerrainConfig,
    center_tx: i32,
    center_ty: i32,
) -> Result<TerrainResult, TerrainError> {
    config.validate()?;
    let start = Instant::now();
    let center = TileCoord::new(center_tx, center_ty);

    let offsets = (-1..=1)
        .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
        .filter(|&offset| offset != (0, 0))
        .map(|(dx, dy)| center.offset(dx, dy).map(|coord| ((dx, dy), coord)))
        .collect::<Option<Vec<_>>>()
        .ok_or(TerrainError::OutOfRange(center))?;

    let neighbors = offsets
        .into_iter()
        .map(|(offset, coord)| (offset, generate_tile(config, coord)))
        .collect();
    let result = TerrainResult {
        center: generate_tile(config, center),
        neighbors,
    };

    let features: usize = result.all_tiles().iter().map(|(_, t)| t.features.len()).sum();
    tracing::info!(
        tx = center_tx,
        ty = center_ty,
        seed = config.seed,
        features,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generated 3x3 terrain block"
    );
    Ok(result)
}

/// Runs every phase for one tile. Phases run strictly in order because later
/// ones read what earlier ones carved or emitted.
pub fn generate_tile(config: &TerrainConfig, coord: TileCoord) -> TileTerrainData {
    let frame = TileFrame::new(coord, config.tile_size, config.resolution);
    let seed = config.seed;

    let mut heights = generate_heightfield(config, &frame);
    apply_mask(config.world_type, &mut heights, &MaskContext { frame, seed });
    heights.clamp_unit();

    let stats = erode(&mut heights, &config.erosion, &mut phase_rng(seed, coord, Phase::Erosion));
    heights.clamp_unit();
    tracing::debug!(
        tx = coord.tx,
        ty = coord.ty,
        drops = stats.drops,
        steps = stats.steps,
        "erosion done"
    );

    let mut flow = accumulate_flow(&heights);

    let mut rng = phase_rng(seed, coord, Phase::Coastline);
    let mut features = extract_coastlines(&heights, &frame, config, &mut rng);
    let coastlines = polygons_of(&features, FeatureKind::Coastline);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = coastlines.len(), "coastlines");

    let mut rng = phase_rng(seed, coord, Phase::Bay);
    let (bay_features, bays) = extract_bays(&coastlines, &flow, &frame, config, &mut rng);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = bays.len(), "bays");
    features.extend(bay_features);
    if !bays.is_empty() {
        apply_bay_erosion(&mut heights, &bays, &frame);
        heights.clamp_unit();
        flow = accumulate_flow(&heights);
    }

    let mut rng = phase_rng(seed, coord, Phase::BarrierIsland);
    let barrier = extract_barrier_islands(&heights, &frame, config, &mut rng);
    let lagoons = polygons_of(&barrier, FeatureKind::Lagoon);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = barrier.len(), "barrier island features");
    features.extend(barrier);

    let rivers = extract_rivers(&heights, &flow, &frame, config, &coastlines);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = rivers.len(), "rivers");
    features.extend(rivers.iter().map(|r| r.to_feature()));

    let mut rng = phase_rng(seed, coord, Phase::Delta);
    let deltas = extract_deltas(&rivers, &heights, &frame, config, &mut rng);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = deltas.len(), "delta features");
    features.extend(deltas);

    let (lake_features, lakes) = extract_lakes(&heights, &frame, config);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = lakes.len(), "lakes");
    features.extend(lake_features);

    let context = BeachContext {
        rivers: &rivers,
        lagoons,
        bays: bays.iter().map(|b| b.polygon.clone()).collect(),
        lakes: &lakes,
    };
    let mut rng = phase_rng(seed, coord, Phase::Beach);
    let beaches = extract_beaches(&heights, &frame, config, &context, &mut rng);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = beaches.len(), "beaches");
    features.extend(beaches);

    let contours = extract_contours(&heights, &frame, &config.contour);
    tracing::debug!(tx = coord.tx, ty = coord.ty, count = contours.len(), "contour segments");
    features.extend(contours);

    let features = clip_features(features, &frame.bounds());
    heights.clamp_unit();

    TileTerrainData {
        tx: coord.tx,
        ty: coord.ty,
        heightfield: heights.to_rows(),
        features,
    }
}
