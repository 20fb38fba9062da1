//! Beaches: low, gently sloping strips along the water line, split into
//! discrete stretches and classified against the water bodies they face.

use std::cmp::Reverse;

use geo::{Area, BooleanOps, MultiPolygon, Polygon};
use hashbrown::{HashMap, HashSet};
use rand::Rng;
use tidewater_config::{BeachConfig, TerrainConfig};

use crate::feature::{BeachProperties, BeachType, FeatureProperties, TerrainFeature};
use crate::geometry::{
    EPSILON, buffer_path, hull_polygon, overlap_fraction, polygon_perimeter, union_all,
};
use crate::grid::{CellMask, Heightfield, NEIGHBORS_8, TileFrame, connected_regions};
use crate::lake::Lake;
use crate::river::River;

/// Geometry from earlier phases that beaches are classified against.
#[derive(Debug, Default)]
pub struct BeachContext<'a> {
    /// Traced rivers.
    pub rivers: &'a [River],
    /// Lagoons behind barrier islands.
    pub lagoons: Vec<Polygon<f64>>,
    /// Accepted bays.
    pub bays: Vec<Polygon<f64>>,
    /// Accepted lakes.
    pub lakes: &'a [Lake],
}

/// Outcome of the overlap rules for one segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Keep with this classification.
    Keep(BeachType),
    /// Keep as a lake beach on the lake at this index, subject to the cap.
    Lake(usize),
    /// Drop the segment.
    Drop,
}

/// Overlap fractions of one beach polygon with the surrounding water bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Overlaps {
    /// Fraction covered by river buffers.
    pub river: f64,
    /// Fraction covered by lagoons.
    pub lagoon: f64,
    /// Fraction covered by bays.
    pub bay: f64,
    /// Best lake overlap and that lake's index. Measured on the segment's
    /// cell footprint: its land cells plus the water fringe it faces.
    pub lake: Option<(usize, f64)>,
    /// Whether a river buffer lies within the proximity distance.
    pub near_river: bool,
}

/// Applies the drop and classification rules in order.
pub fn classify_beach(o: &Overlaps, config: &BeachConfig) -> Verdict {
    if o.river > config.river_overlap_max
        || o.lagoon > config.lagoon_overlap_max
        || o.bay > config.bay_overlap_max
    {
        return Verdict::Drop;
    }
    if o.bay > config.bay_overlap_min {
        return Verdict::Keep(BeachType::Bay);
    }
    match o.lake {
        Some((_, overlap)) if overlap > config.lake_overlap_min && o.near_river => {
            Verdict::Keep(BeachType::River)
        }
        Some((index, overlap)) if overlap > config.lake_overlap_min => Verdict::Lake(index),
        _ => Verdict::Keep(BeachType::Ocean),
    }
}

fn candidate_mask(heights: &Heightfield, config: &TerrainConfig) -> CellMask {
    let settings = &config.beach;
    let wl = config.water_level;
    let top = wl + settings.height_band * settings.width_multiplier;
    CellMask::from_fn(heights.resolution(), |x, y| {
        let h = heights.get(x, y);
        (wl..top).contains(&h)
            && heights.slope(x, y) <= settings.max_slope
            && NEIGHBORS_8.iter().any(|&(dx, dy)| {
                heights
                    .get_signed(x as i64 + dx, y as i64 + dy)
                    .is_some_and(|n| n < wl)
            })
    })
}

/// Splits a region into stretches of random length separated by random gaps.
/// Regions no longer than one stretch are kept whole.
fn split_region(
    mut cells: Vec<(usize, usize)>,
    config: &BeachConfig,
    rng: &mut impl Rng,
) -> Vec<Vec<(usize, usize)>> {
    let max_len = config.max_segment_cells.max(config.min_cells).max(1);
    if cells.len() <= max_len {
        return vec![cells];
    }
    let (min_x, max_x, min_y, max_y) = cells.iter().fold(
        (usize::MAX, 0, usize::MAX, 0),
        |(a, b, c, d), &(x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
    );
    if max_x - min_x >= max_y - min_y {
        cells.sort_by_key(|&(x, y)| (x, y));
    } else {
        cells.sort_by_key(|&(x, y)| (y, x));
    }

    let mut segments = Vec::new();
    let mut i = 0;
    while i < cells.len() {
        let len = rng.random_range(config.min_cells.min(max_len)..=max_len);
        let end = (i + len).min(cells.len());
        segments.push(cells[i..end].to_vec());
        let max_gap = config.max_gap_cells.max(config.min_gap_cells);
        let gap = rng.random_range(config.min_gap_cells..=max_gap);
        i = end + gap;
    }
    segments
}

/// Splits a segment into its 8-connected pieces. Axis-sorted segments of a
/// curved shore can hold stretches from opposite banks.
fn connected_pieces(segment: &[(usize, usize)]) -> Vec<Vec<(usize, usize)>> {
    let mut remaining: HashSet<(usize, usize)> = segment.iter().copied().collect();
    let mut pieces = Vec::new();
    for &start in segment {
        if !remaining.remove(&start) {
            continue;
        }
        let mut piece = vec![start];
        let mut i = 0;
        while i < piece.len() {
            let (x, y) = piece[i];
            for &(dx, dy) in &NEIGHBORS_8 {
                let next = ((x as i64 + dx) as usize, (y as i64 + dy) as usize);
                if remaining.remove(&next) {
                    piece.push(next);
                }
            }
            i += 1;
        }
        pieces.push(piece);
    }
    pieces
}

/// The lake holding most of `fringe`, with its share of the segment footprint.
fn lake_overlap(
    segment_len: usize,
    fringe: &[(usize, usize)],
    lake_cells: &HashMap<(usize, usize), usize>,
) -> Option<(usize, f64)> {
    let mut per_lake: HashMap<usize, usize> = HashMap::new();
    for cell in fringe {
        if let Some(&index) = lake_cells.get(cell) {
            *per_lake.entry(index).or_insert(0) += 1;
        }
    }
    let footprint = (segment_len + fringe.len()) as f64;
    per_lake
        .into_iter()
        .max_by_key(|&(index, count)| (count, Reverse(index)))
        .map(|(index, count)| (index, count as f64 / footprint))
}

/// Water cells touching the segment, in row-major order.
fn water_fringe(
    heights: &Heightfield,
    segment: &[(usize, usize)],
    water_level: f64,
) -> Vec<(usize, usize)> {
    let fringe: HashSet<(usize, usize)> = segment
        .iter()
        .flat_map(|&(x, y)| {
            NEIGHBORS_8.iter().filter_map(move |&(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                heights
                    .get_signed(nx, ny)
                    .filter(|&h| h < water_level)
                    .map(|_| (nx as usize, ny as usize))
            })
        })
        .collect();
    let mut fringe: Vec<_> = fringe.into_iter().collect();
    fringe.sort_unstable_by_key(|&(x, y)| (y, x));
    fringe
}

/// Extracts and classifies beaches.
pub fn extract_beaches(
    heights: &Heightfield,
    frame: &TileFrame,
    config: &TerrainConfig,
    context: &BeachContext<'_>,
    rng: &mut impl Rng,
) -> Vec<TerrainFeature> {
    let settings = &config.beach;
    if !settings.enabled {
        return Vec::new();
    }
    let cs = frame.cell_size();
    let wl = config.water_level;

    let river_buffer = union_all(
        context
            .rivers
            .iter()
            .flat_map(|r| buffer_path(&r.line.0, r.width * 0.5).0),
    );
    let river_reach = union_all(context.rivers.iter().flat_map(|r| {
        buffer_path(&r.line.0, r.width * 0.5 + settings.river_proximity_cells * cs).0
    }));
    let lagoons = MultiPolygon::new(context.lagoons.clone());
    let bays = MultiPolygon::new(context.bays.clone());
    let lake_cells: HashMap<(usize, usize), usize> = context
        .lakes
        .iter()
        .enumerate()
        .flat_map(|(index, lake)| lake.cells.iter().map(move |&cell| (cell, index)))
        .collect();
    let mut lake_shore_used: HashMap<usize, f64> = HashMap::new();

    let mut features = Vec::new();
    let candidates = candidate_mask(heights, config);
    let pieces = connected_regions(&candidates, &NEIGHBORS_8)
        .into_iter()
        .flat_map(|region| split_region(region, settings, rng))
        .flat_map(|segment| connected_pieces(&segment))
        .collect::<Vec<_>>();
    for segment in pieces {
        if segment.len() < settings.min_cells {
            continue;
        }
        let fringe = water_fringe(heights, &segment, wl);
        let points: Vec<_> = segment
            .iter()
            .chain(fringe.iter())
            .map(|&(x, y)| frame.cell_to_world(x, y))
            .collect();
        let Some(polygon) = hull_polygon(&points, settings.concavity, cs) else {
            continue;
        };
        let area = polygon.unsigned_area();
        let perimeter = polygon_perimeter(&polygon);
        if area <= EPSILON || perimeter <= EPSILON {
            continue;
        }

        let overlaps = Overlaps {
            river: overlap_fraction(&polygon, &river_buffer),
            lagoon: overlap_fraction(&polygon, &lagoons),
            bay: overlap_fraction(&polygon, &bays),
            lake: lake_overlap(segment.len(), &fringe, &lake_cells),
            near_river: !river_reach.0.is_empty()
                && polygon.intersection(&river_reach).unsigned_area() > EPSILON,
        };

        let beach_type = match classify_beach(&overlaps, settings) {
            Verdict::Drop => {
                tracing::trace!(?overlaps, "beach segment dropped");
                continue;
            }
            Verdict::Keep(kind) => kind,
            Verdict::Lake(index) => {
                let lake_perimeter = polygon_perimeter(&context.lakes[index].polygon);
                let cap = settings.lake_perimeter_cap * lake_perimeter;
                let used = lake_shore_used.entry(index).or_insert(0.0);
                if *used + perimeter * 0.5 > cap {
                    tracing::trace!(lake = index, "lake beach cap reached");
                    continue;
                }
                *used += perimeter * 0.5;
                BeachType::Lake
            }
        };

        features.push(TerrainFeature::polygon(
            polygon,
            FeatureProperties::Beach(BeachProperties {
                area,
                perimeter,
                avg_width: 2.0 * area / perimeter,
                beach_type,
                cell_count: segment.len(),
            }),
        ));
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileCoord;
    use crate::lake::extract_lakes;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(n: usize, water_level: f64) -> (TileFrame, TerrainConfig) {
        let config = TerrainConfig {
            resolution: n,
            tile_size: 470.0,
            water_level,
            ..Default::default()
        };
        (TileFrame::new(TileCoord::new(0, 0), 470.0, n), config)
    }

    fn beach_types(features: &[TerrainFeature]) -> Vec<BeachType> {
        features
            .iter()
            .filter_map(|f| match &f.properties {
                FeatureProperties::Beach(p) => Some(p.beach_type),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_gradual_slope_yields_ocean_beach() {
        let (frame, config) = setup(48, 0.42);
        let hf = Heightfield::from_fn(48, |x, _| 0.3 + 0.3 * x as f64 / 47.0);
        let features = extract_beaches(
            &hf,
            &frame,
            &config,
            &BeachContext::default(),
            &mut ChaCha8Rng::seed_from_u64(8),
        );
        let types = beach_types(&features);
        assert!(!types.is_empty());
        assert!(types.iter().all(|&t| t == BeachType::Ocean));
        for f in &features {
            let FeatureProperties::Beach(p) = &f.properties else { unreachable!() };
            assert!((p.avg_width - 2.0 * p.area / p.perimeter).abs() < 1e-9);
        }
    }

    #[test]
    fn test_steep_slope_yields_no_beach() {
        let (frame, config) = setup(48, 0.42);
        // Column 15 sits inside the height band but the whole tile is too steep.
        let hf = Heightfield::from_fn(48, |x, _| 0.43 + 0.1 * (x as f64 - 15.0));
        let features = extract_beaches(
            &hf,
            &frame,
            &config,
            &BeachContext::default(),
            &mut ChaCha8Rng::seed_from_u64(8),
        );
        assert!(features.is_empty());
    }

    #[test]
    fn test_submerged_tile_yields_no_beach() {
        let (frame, config) = setup(24, 0.45);
        let features = extract_beaches(
            &Heightfield::filled(24, 0.2),
            &frame,
            &config,
            &BeachContext::default(),
            &mut ChaCha8Rng::seed_from_u64(8),
        );
        assert!(features.is_empty());
    }

    /// Radial bowl flooded out to a radius of ten cells.
    fn bowl(n: usize) -> Heightfield {
        let c = (n - 1) as f64 / 2.0;
        Heightfield::from_fn(n, |x, y| 0.35 + 0.01 * (x as f64 - c).hypot(y as f64 - c))
    }

    /// Beaches around the bowl lake and that lake's perimeter.
    fn lake_shore(cap: f64) -> (Vec<TerrainFeature>, f64) {
        let (frame, mut config) = setup(48, 0.45);
        config.beach.lake_perimeter_cap = cap;
        let hf = bowl(48);
        let (_, lakes) = extract_lakes(&hf, &frame, &config);
        assert_eq!(lakes.len(), 1);
        let context = BeachContext {
            lakes: &lakes,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let features = extract_beaches(&hf, &frame, &config, &context, &mut rng);
        (features, polygon_perimeter(&lakes[0].polygon))
    }

    fn shore_covered(features: &[TerrainFeature]) -> f64 {
        features
            .iter()
            .filter_map(|f| match &f.properties {
                FeatureProperties::Beach(p) => Some(p.perimeter * 0.5),
                _ => None,
            })
            .sum()
    }

    #[test]
    fn test_landlocked_lake_has_only_lake_beaches() {
        let (features, _) = lake_shore(1.0);
        let types = beach_types(&features);
        assert!(!types.is_empty());
        assert!(types.iter().all(|&t| t == BeachType::Lake), "{types:?}");
    }

    #[test]
    fn test_lake_beach_coverage_is_capped() {
        let (uncapped, perimeter) = lake_shore(1.0);
        assert!(shore_covered(&uncapped) > 0.2 * perimeter);

        let (capped, perimeter) = lake_shore(0.2);
        assert!(shore_covered(&capped) <= 0.2 * perimeter + 1e-9);
        assert!(beach_types(&capped).iter().all(|&t| t == BeachType::Lake));
    }

    #[test]
    fn test_lake_overlap_counts_fringe_cells() {
        let lake_cells: HashMap<(usize, usize), usize> =
            [((5, 5), 1), ((6, 5), 1), ((9, 9), 0)].into_iter().collect();
        let fringe = [(5, 5), (6, 5), (7, 5), (9, 9)];
        assert_eq!(lake_overlap(4, &fringe, &lake_cells), Some((1, 0.25)));
        assert_eq!(lake_overlap(4, &[(0, 0)], &lake_cells), None);
    }

    #[test]
    fn test_segment_split_into_connected_pieces() {
        let segment = vec![(0, 0), (10, 0), (1, 1), (11, 1), (2, 1)];
        let pieces = connected_pieces(&segment);
        assert_eq!(pieces, vec![vec![(0, 0), (1, 1), (2, 1)], vec![(10, 0), (11, 1)]]);
    }

    #[test]
    fn test_overlap_rules() {
        let config = BeachConfig::default();
        let base = Overlaps::default();
        assert_eq!(classify_beach(&base, &config), Verdict::Keep(BeachType::Ocean));
        assert_eq!(classify_beach(&Overlaps { river: 0.31, ..base }, &config), Verdict::Drop);
        assert_eq!(classify_beach(&Overlaps { lagoon: 0.6, ..base }, &config), Verdict::Drop);
        assert_eq!(classify_beach(&Overlaps { bay: 0.5, ..base }, &config), Verdict::Drop);
        assert_eq!(
            classify_beach(&Overlaps { bay: 0.2, ..base }, &config),
            Verdict::Keep(BeachType::Bay)
        );
        let on_lake = Overlaps { lake: Some((2, 0.5)), ..base };
        assert_eq!(classify_beach(&on_lake, &config), Verdict::Lake(2));
        assert_eq!(
            classify_beach(&Overlaps { near_river: true, ..on_lake }, &config),
            Verdict::Keep(BeachType::River)
        );
        assert_eq!(
            classify_beach(&Overlaps { lake: Some((0, 0.1)), ..base }, &config),
            Verdict::Keep(BeachType::Ocean)
        );
    }

    #[test]
    fn test_split_region_respects_bounds() {
        let config = BeachConfig::default();
        let cells: Vec<_> = (0..200).map(|y| (3, y)).collect();
        let segments = split_region(cells, &config, &mut ChaCha8Rng::seed_from_u64(1));
        assert!(segments.len() > 1);
        assert!(segments.iter().all(|s| s.len() <= config.max_segment_cells));
        for pair in segments.windows(2) {
            let gap = pair[1][0].1 - pair[0].last().unwrap().1 - 1;
            assert!(gap >= config.min_gap_cells && gap <= config.max_gap_cells);
        }
    }
}
