//! Barrier island chains along gentle shores: islands, the lagoon behind
//! them, tidal flats, dune ridges and the inlets between islands.

use geo::{Area, BooleanOps, LineString, MultiPolygon, Point, Polygon};
use glam::DVec2;
use rand::Rng;
use tidewater_config::{BarrierIslandConfig, TerrainConfig};

use crate::feature::{
    BarrierIslandProperties, DuneRidgeProperties, FeatureProperties, InletProperties,
    LagoonProperties, TerrainFeature, TidalFlatProperties,
};
use crate::geometry::{
    EPSILON, buffer_polygon, line_length, path_length, polygon_from_ring, to_coord, to_dvec,
};
use crate::grid::{CellMask, Heightfield, NEIGHBORS_4, NEIGHBORS_8, TileFrame, connected_regions};

/// One shoreline cell with its seaward direction and wave exposure.
#[derive(Clone, Copy, Debug)]
struct ShorePoint {
    /// World position of the cell.
    pos: DVec2,
    /// Unit vector pointing out to sea.
    normal: DVec2,
    /// Normalised fetch times a seeded factor, in `[0, 1]`.
    energy: f64,
}

/// Land cells touching water whose slope is below `max_slope`.
fn gentle_shore_mask(heights: &Heightfield, water_level: f64, max_slope: f64) -> CellMask {
    CellMask::from_fn(heights.resolution(), |x, y| {
        heights.get(x, y) >= water_level
            && heights.slope(x, y) < max_slope
            && NEIGHBORS_4.iter().any(|&(dx, dy)| {
                heights
                    .get_signed(x as i64 + dx, y as i64 + dy)
                    .is_some_and(|h| h < water_level)
            })
    })
}

/// Orders cells along the segment's longer bounding-box axis.
fn sort_along_axis(cells: &mut [(usize, usize)]) {
    let (min_x, max_x, min_y, max_y) = cells.iter().fold(
        (usize::MAX, 0, usize::MAX, 0),
        |(a, b, c, d), &(x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
    );
    if max_x - min_x >= max_y - min_y {
        cells.sort_by_key(|&(x, y)| (x, y));
    } else {
        cells.sort_by_key(|&(x, y)| (y, x));
    }
}

/// Mean direction from the cell toward water cells within two cells, falling
/// back to the downhill gradient.
fn seaward_normal(heights: &Heightfield, water_level: f64, x: usize, y: usize) -> Option<DVec2> {
    let mut sum = DVec2::ZERO;
    for dy in -2..=2_i64 {
        for dx in -2..=2_i64 {
            if heights
                .get_signed(x as i64 + dx, y as i64 + dy)
                .is_some_and(|h| h < water_level)
            {
                sum += DVec2::new(dx as f64, dy as f64);
            }
        }
    }
    sum.try_normalize().or_else(|| {
        let (gx, gy) = heights.gradient(x, y);
        (-DVec2::new(gx, gy)).try_normalize()
    })
}

/// Open water in cells along `normal` before hitting land, as a fraction of
/// `max_fetch`. Leaving the tile counts as open sea.
fn fetch(
    heights: &Heightfield,
    water_level: f64,
    x: usize,
    y: usize,
    normal: DVec2,
    max_fetch: usize,
) -> f64 {
    if max_fetch == 0 {
        return 0.0;
    }
    let origin = DVec2::new(x as f64, y as f64);
    for k in 1..=max_fetch {
        let p = origin + normal * k as f64;
        match heights.get_signed(p.x.round() as i64, p.y.round() as i64) {
            None => return 1.0,
            Some(h) if h >= water_level => return (k - 1) as f64 / max_fetch as f64,
            Some(_) => {}
        }
    }
    1.0
}

/// Greedy inlet placement by descending energy with a minimum spacing; the
/// ends of the segment are kept for islands.
fn pick_inlets(points: &[ShorePoint], config: &BarrierIslandConfig) -> Vec<usize> {
    let len = points.len();
    let margin = config.min_island_cells;
    if len <= 2 * margin {
        return Vec::new();
    }
    let mut order: Vec<usize> = (margin..len - margin).collect();
    order.sort_by(|&a, &b| points[b].energy.total_cmp(&points[a].energy).then(a.cmp(&b)));

    let mut picked: Vec<usize> = Vec::new();
    for idx in order {
        if picked.iter().all(|&p| p.abs_diff(idx) >= config.min_inlet_spacing.max(1)) {
            picked.push(idx);
        }
    }
    picked.sort_unstable();
    picked
}

/// Smooths normals over a small window so adjacent offsets do not fold.
fn smooth_normals(points: &mut [ShorePoint]) {
    let normals: Vec<DVec2> = points.iter().map(|p| p.normal).collect();
    for (i, point) in points.iter_mut().enumerate() {
        let lo = i.saturating_sub(2);
        let hi = (i + 2).min(normals.len() - 1);
        let mean: DVec2 = normals[lo..=hi].iter().copied().sum();
        if let Some(n) = mean.try_normalize() {
            point.normal = n;
        }
    }
}

struct ChainBuilder<'a> {
    config: &'a BarrierIslandConfig,
    cell_size: f64,
    chain_id: usize,
    features: Vec<TerrainFeature>,
}

impl ChainBuilder<'_> {
    fn island(
        &mut self,
        span: &[ShorePoint],
        island_index: usize,
        rng: &mut impl Rng,
    ) -> Option<Polygon<f64>> {
        let cs = self.cell_size;
        let offset = self.config.offset_cells * cs;
        let width = self.config.width_cells * cs;
        let jitter = self.config.jitter_cells * cs;

        let mut ocean = Vec::with_capacity(span.len());
        let mut lagoon_side = Vec::with_capacity(span.len());
        let mut ridge = Vec::with_capacity(span.len());
        for p in span {
            let jo = rng.random_range(-jitter..=jitter);
            let jl = rng.random_range(-jitter..=jitter);
            ocean.push(to_coord(p.pos + p.normal * (offset + width + jo)));
            lagoon_side.push(to_coord(p.pos + p.normal * (offset + jl)));
            ridge.push(to_coord(p.pos + p.normal * (offset + width * 0.75 + jo * 0.5)));
        }
        let length = path_length(&ocean);
        lagoon_side.reverse();
        ocean.extend(lagoon_side);
        let polygon = polygon_from_ring(ocean)?;

        self.features.push(TerrainFeature::polygon(
            polygon.clone(),
            FeatureProperties::BarrierIsland(BarrierIslandProperties {
                area: polygon.unsigned_area(),
                length,
                chain_id: self.chain_id,
                island_index,
            }),
        ));

        let ridge = LineString::new(ridge);
        let ridge_length = line_length(&ridge);
        if ridge_length > EPSILON {
            self.features.push(TerrainFeature::line(
                ridge,
                FeatureProperties::DuneRidge(DuneRidgeProperties {
                    length: ridge_length,
                    chain_id: self.chain_id,
                    island_index,
                }),
            ));
        }
        Some(polygon)
    }

    fn lagoon(&mut self, points: &[ShorePoint]) -> Option<Polygon<f64>> {
        let offset = self.config.offset_cells * self.cell_size;
        let mut ring: Vec<_> = points.iter().map(|p| to_coord(p.pos)).collect();
        ring.extend(points.iter().rev().map(|p| to_coord(p.pos + p.normal * offset)));
        let polygon = polygon_from_ring(ring)?;
        self.features.push(TerrainFeature::polygon(
            polygon.clone(),
            FeatureProperties::Lagoon(LagoonProperties {
                area: polygon.unsigned_area(),
                chain_id: self.chain_id,
            }),
        ));
        Some(polygon)
    }

    fn tidal_flats(&mut self, islands: &[Polygon<f64>], lagoon: &Polygon<f64>) {
        let distance = self.config.tidal_flat_cells * self.cell_size;
        let lagoon = MultiPolygon::new(vec![lagoon.clone()]);
        for island in islands {
            let flats = buffer_polygon(island, distance).intersection(&lagoon);
            for flat in flats.0 {
                let area = flat.unsigned_area();
                if area <= EPSILON {
                    continue;
                }
                self.features.push(TerrainFeature::polygon(
                    flat,
                    FeatureProperties::TidalFlat(TidalFlatProperties {
                        area,
                        chain_id: self.chain_id,
                    }),
                ));
            }
        }
    }

    fn inlet(&mut self, point: &ShorePoint) {
        let cs = self.cell_size;
        let c = self.config;
        let spread = c.max_inlet_width_cells - c.min_inlet_width_cells;
        let width = (c.min_inlet_width_cells + point.energy * spread) * cs;
        let at = point.pos + point.normal * (c.offset_cells + c.width_cells * 0.5) * cs;
        self.features.push(TerrainFeature::point(
            Point::from(to_coord(at)),
            FeatureProperties::Inlet(InletProperties {
                width,
                wave_energy: point.energy,
                chain_id: self.chain_id,
            }),
        ));
    }
}

/// Extracts barrier island chains from the gentle stretches of shore.
pub fn extract_barrier_islands(
    heights: &Heightfield,
    frame: &TileFrame,
    config: &TerrainConfig,
    rng: &mut impl Rng,
) -> Vec<TerrainFeature> {
    let settings = &config.barrier_island;
    if !settings.enabled {
        return Vec::new();
    }
    let wl = config.water_level;
    let mask = gentle_shore_mask(heights, wl, settings.max_slope);

    let mut features = Vec::new();
    let mut chain_id = 0;
    for mut segment in connected_regions(&mask, &NEIGHBORS_8) {
        if segment.len() < settings.min_segment_cells {
            continue;
        }
        sort_along_axis(&mut segment);

        let mut points: Vec<ShorePoint> = segment
            .iter()
            .filter_map(|&(x, y)| {
                let normal = seaward_normal(heights, wl, x, y)?;
                let exposure = fetch(heights, wl, x, y, normal, settings.max_fetch_cells);
                Some(ShorePoint {
                    pos: to_dvec(frame.cell_to_world(x, y)),
                    normal,
                    energy: exposure * rng.random_range(0.5..=1.0),
                })
            })
            .collect();
        if points.len() < settings.min_segment_cells {
            continue;
        }
        smooth_normals(&mut points);

        let inlets = pick_inlets(&points, settings);
        let mut builder = ChainBuilder {
            config: settings,
            cell_size: frame.cell_size(),
            chain_id,
            features: Vec::new(),
        };

        let mut islands = Vec::new();
        let mut span_start = 0;
        for &cut in inlets.iter().chain(std::iter::once(&points.len())) {
            let span = &points[span_start..cut];
            if span.len() >= settings.min_island_cells.max(2)
                && let Some(island) = builder.island(span, islands.len(), rng)
            {
                islands.push(island);
            }
            span_start = cut + 1;
        }
        if islands.is_empty() {
            continue;
        }
        for &cut in &inlets {
            builder.inlet(&points[cut]);
        }
        if let Some(lagoon) = builder.lagoon(&points) {
            builder.tidal_flats(&islands, &lagoon);
        }

        tracing::trace!(chain_id, islands = islands.len(), inlets = inlets.len(), "barrier chain");
        features.extend(builder.features);
        chain_id += 1;
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureKind;
    use crate::grid::TileCoord;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup(n: usize) -> (TileFrame, TerrainConfig) {
        let config = TerrainConfig {
            resolution: n,
            tile_size: 310.0,
            ..Default::default()
        };
        (TileFrame::new(TileCoord::new(0, 0), 310.0, n), config)
    }

    fn count(features: &[TerrainFeature], kind: FeatureKind) -> usize {
        features.iter().filter(|f| f.kind() == kind).count()
    }

    #[test]
    fn test_gentle_ramp_builds_chain() {
        let (frame, config) = setup(32);
        // Rises 0.01 per cell; the shore sits at x = 15.
        let hf = Heightfield::from_fn(32, |x, _| 0.3 + 0.01 * x as f64);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let features = extract_barrier_islands(&hf, &frame, &config, &mut rng);

        assert!(count(&features, FeatureKind::BarrierIsland) >= 2);
        assert_eq!(count(&features, FeatureKind::Lagoon), 1);
        assert!(count(&features, FeatureKind::Inlet) >= 1);
        assert!(count(&features, FeatureKind::DuneRidge) >= 2);

        let shore_x = frame.cell_to_world(15, 0).x;
        for f in features.iter().filter(|f| f.kind() == FeatureKind::BarrierIsland) {
            let poly = f.as_polygon().unwrap();
            assert!(poly.exterior().0.iter().all(|c| c.x < shore_x), "islands sit offshore");
        }
    }

    #[test]
    fn test_steep_shore_has_no_islands() {
        let (frame, config) = setup(32);
        let hf = Heightfield::from_fn(32, |x, _| 0.05 * x as f64);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let features = extract_barrier_islands(&hf, &frame, &config, &mut rng);
        assert!(features.is_empty());
    }

    #[test]
    fn test_fetch_stops_at_land() {
        let hf = Heightfield::from_fn(20, |x, _| if x < 5 || x > 12 { 0.8 } else { 0.1 });
        let f = fetch(&hf, 0.45, 12, 4, DVec2::new(-1.0, 0.0), 20);
        assert!(f > 0.0 && f < 0.5);
        let open = fetch(&hf, 0.45, 8, 4, DVec2::new(0.0, 1.0), 20);
        assert_eq!(open, 1.0);
        let blocked = fetch(&hf, 0.45, 4, 4, DVec2::new(-1.0, 0.0), 20);
        assert_eq!(blocked, 0.0);
    }

    #[test]
    fn test_inlets_respect_spacing() {
        let config = BarrierIslandConfig::default();
        let points: Vec<ShorePoint> = (0..40)
            .map(|i| ShorePoint {
                pos: DVec2::new(i as f64, 0.0),
                normal: DVec2::Y,
                energy: ((i * 7919) % 13) as f64 / 13.0,
            })
            .collect();
        let inlets = pick_inlets(&points, &config);
        assert!(!inlets.is_empty());
        for pair in inlets.windows(2) {
            assert!(pair[1] - pair[0] >= config.min_inlet_spacing);
        }
        let interior = config.min_island_cells..40 - config.min_island_cells;
        assert!(inlets.iter().all(|i| interior.contains(i)));
    }
}
