//! Bay detection from coastline curvature, plus the heightfield feedback that
//! carves accepted bays into the terrain.

use geo::{Area, BoundingRect, Centroid, Contains, Coord, LineString, Point, Polygon};
use glam::DVec2;
use rand::Rng;
use tidewater_config::{BayConfig, TerrainConfig};

use crate::feature::{BayProperties, BayType, FeatureProperties, TerrainFeature};
use crate::flow::FlowGrid;
use crate::geometry::{EPSILON, make_valid, open_ccw_ring, to_coord, to_dvec};
use crate::grid::{Heightfield, TileFrame};

/// A contiguous run of concave ring vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConcaveRun {
    /// First vertex above the curvature threshold.
    pub start: usize,
    /// Vertex of maximum curvature.
    pub apex: usize,
    /// Last vertex above the curvature threshold.
    pub end: usize,
    /// Curvature at the apex.
    pub peak: f64,
}

/// An accepted bay, kept around for the erosion feedback.
#[derive(Clone, Debug)]
pub struct Bay {
    /// Water outline.
    pub polygon: Polygon<f64>,
    /// Maximum carve depth, river-mouth bonus included.
    pub max_depth: f64,
    /// Whether significant flow drains into the apex.
    pub is_river_mouth: bool,
}

/// Resamples a closed ring to roughly uniform vertex spacing.
pub fn resample_ring(ring: &[Coord<f64>], spacing: f64) -> Vec<Coord<f64>> {
    let n = ring.len();
    if n < 3 || spacing <= EPSILON {
        return ring.to_vec();
    }
    let mut out = vec![ring[0]];
    let mut carried = 0.0;
    for i in 0..n {
        let a = to_dvec(ring[i]);
        let b = to_dvec(ring[(i + 1) % n]);
        let len = a.distance(b);
        if len <= EPSILON {
            continue;
        }
        let mut t = spacing - carried;
        while t < len {
            out.push(to_coord(a.lerp(b, t / len)));
            t += spacing;
        }
        carried = len - (t - spacing);
    }
    // The walk ends back at ring[0]; drop a duplicate that landed on it.
    if out.len() > 1 && to_dvec(out[out.len() - 1]).distance(to_dvec(out[0])) < spacing * 0.5 {
        out.pop();
    }
    out
}

/// Signed curvature at every vertex of a counter-clockwise ring, measured over
/// `window` vertices on each side. Positive values turn clockwise, i.e. the
/// coast bends into the land.
pub fn signed_curvature(ring: &[Coord<f64>], window: usize) -> Vec<f64> {
    let n = ring.len();
    if n < 3 || window == 0 || 2 * window >= n {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| {
            let p = to_dvec(ring[i]);
            let prev = to_dvec(ring[(i + n - window) % n]);
            let next = to_dvec(ring[(i + window) % n]);
            let d1 = (p - prev).normalize_or_zero();
            let d2 = (next - p).normalize_or_zero();
            -d1.perp_dot(d2)
        })
        .collect()
}

/// Groups contiguous vertices with curvature above `min_curvature`, following
/// the ring across its seam.
pub fn find_concave_runs(curvature: &[f64], min_curvature: f64) -> Vec<ConcaveRun> {
    let n = curvature.len();
    let Some(anchor) = curvature.iter().position(|&c| c <= min_curvature) else {
        return Vec::new();
    };

    let mut runs = Vec::new();
    let mut current: Option<ConcaveRun> = None;
    for step in 1..=n {
        let i = (anchor + step) % n;
        let c = curvature[i];
        if c > min_curvature {
            let run = current.get_or_insert(ConcaveRun {
                start: i,
                apex: i,
                end: i,
                peak: c,
            });
            run.end = i;
            if c > run.peak {
                run.peak = c;
                run.apex = i;
            }
        } else if let Some(run) = current.take() {
            runs.push(run);
        }
    }
    runs
}

/// Turning of the coast at `apex` in degrees: 180 minus the interior angle
/// between the two entrance points.
pub fn concavity_angle(a: DVec2, apex: DVec2, b: DVec2) -> Option<f64> {
    let u = (a - apex).try_normalize()?;
    let v = (b - apex).try_normalize()?;
    let inner = u.dot(v).clamp(-1.0, 1.0).acos().to_degrees();
    Some(180.0 - inner)
}

fn classify_size(area: f64, cell_area: f64, config: &BayConfig) -> BayType {
    if area <= config.cove_max_cells * cell_area {
        BayType::Cove
    } else if area <= config.bay_max_cells * cell_area {
        BayType::Bay
    } else {
        BayType::Harbor
    }
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Quadratic curve from `a` to `b` through `apex`, with seeded jitter
/// perpendicular to the entrance chord that vanishes at both ends.
fn bay_outline(
    a: DVec2,
    apex: DVec2,
    b: DVec2,
    config: &BayConfig,
    rng: &mut impl Rng,
) -> Vec<Coord<f64>> {
    let control = apex * 2.0 - (a + b) * 0.5;
    let chord = b - a;
    let width = chord.length();
    let normal = chord.perp().normalize_or_zero();
    let samples = config.outline_points.max(4);
    (0..=samples)
        .map(|k| {
            let t = k as f64 / samples as f64;
            let mt = 1.0 - t;
            let on_curve = a * (mt * mt) + control * (2.0 * mt * t) + b * (t * t);
            let envelope = (std::f64::consts::PI * t).sin();
            let jitter = rng.random_range(-1.0..=1.0) * config.jitter * width * envelope;
            to_coord(on_curve + normal * jitter)
        })
        .collect()
}

fn depth_profile(max_depth: f64, samples: usize, rng: &mut impl Rng) -> Vec<f64> {
    let samples = samples.max(2);
    (0..samples)
        .map(|k| {
            let t = k as f64 / (samples - 1) as f64;
            let noise = rng.random_range(-0.1..=0.1);
            (max_depth * (smoothstep(t) + noise)).clamp(0.0, max_depth)
        })
        .collect()
}

struct Inputs<'a> {
    flow: &'a FlowGrid,
    frame: &'a TileFrame,
    config: &'a TerrainConfig,
}

fn bay_from_run(
    ring: &[Coord<f64>],
    run: ConcaveRun,
    inputs: &Inputs<'_>,
    rng: &mut impl Rng,
) -> Option<(TerrainFeature, Bay)> {
    let settings = &inputs.config.bay;
    let frame = inputs.frame;
    let n = ring.len();
    let w = settings.curvature_window;
    let a = to_dvec(ring[(run.start + n - w) % n]);
    let b = to_dvec(ring[(run.end + w) % n]);
    let apex = to_dvec(ring[run.apex]);

    let (cx, cy) = frame.nearest_cell(to_coord(apex));
    if cx == 0 || cy == 0 || cx + 1 >= frame.resolution || cy + 1 >= frame.resolution {
        tracing::trace!(apex = ?(cx, cy), "bay apex on tile edge");
        return None;
    }

    let angle = concavity_angle(a, apex, b)?;
    if angle < settings.min_concavity_angle {
        tracing::trace!(angle, "bay rejected: shallow concavity");
        return None;
    }

    let entrance_width = a.distance(b);
    if entrance_width <= EPSILON {
        return None;
    }

    let mouth_flow = inputs.flow.max_near(cx, cy, 2);
    let is_river_mouth =
        mouth_flow > settings.river_mouth_flow_factor * frame.resolution as f64;

    let mut outline = bay_outline(a, apex, b, settings, rng);
    outline.push(outline[0]);
    let polygon = make_valid(Polygon::new(LineString::new(outline), vec![]))?;

    let area = polygon.unsigned_area();
    if area < settings.min_area_cells * frame.cell_area() {
        tracing::trace!(area, "bay rejected: too small");
        return None;
    }

    let depth = (apex - a).perp_dot((b - a).normalize()).abs();
    let depth_ratio = depth / entrance_width;
    if !(0.3..=settings.max_depth_ratio).contains(&depth_ratio) {
        tracing::trace!(depth_ratio, "bay rejected: depth ratio");
        return None;
    }

    let bonus = if is_river_mouth { 1.0 + settings.river_mouth_bonus } else { 1.0 };
    let max_depth = settings.base_depth * bonus;
    let properties = FeatureProperties::Bay(BayProperties {
        area,
        bay_type: classify_size(area, frame.cell_area(), settings),
        entrance_width,
        depth,
        depth_ratio,
        concavity_angle: angle,
        is_river_mouth,
        max_depth,
        depth_profile: depth_profile(max_depth, settings.profile_samples, rng),
    });

    Some((
        TerrainFeature::polygon(polygon.clone(), properties),
        Bay {
            polygon,
            max_depth,
            is_river_mouth,
        },
    ))
}

/// Finds bays along every coastline polygon.
pub fn extract_bays(
    coastlines: &[Polygon<f64>],
    flow: &FlowGrid,
    frame: &TileFrame,
    config: &TerrainConfig,
    rng: &mut impl Rng,
) -> (Vec<TerrainFeature>, Vec<Bay>) {
    let settings = &config.bay;
    let mut features = Vec::new();
    let mut bays = Vec::new();
    if !settings.enabled {
        return (features, bays);
    }

    let inputs = Inputs { flow, frame, config };
    for coast in coastlines {
        let ring = resample_ring(&open_ccw_ring(coast), frame.cell_size());
        if ring.len() < 2 * settings.curvature_window + 3 {
            continue;
        }
        let curvature = signed_curvature(&ring, settings.curvature_window);
        for run in find_concave_runs(&curvature, settings.min_curvature) {
            if let Some((feature, bay)) = bay_from_run(&ring, run, &inputs, rng) {
                features.push(feature);
                bays.push(bay);
            }
        }
    }
    (features, bays)
}

/// Lowers interior cells inside each bay. The carve is deepest at the bay's
/// centroid and half as deep at its rim.
pub fn apply_bay_erosion(heights: &mut Heightfield, bays: &[Bay], frame: &TileFrame) {
    let n = heights.resolution();
    for bay in bays {
        let bounds = (bay.polygon.bounding_rect(), bay.polygon.centroid());
        let (Some(rect), Some(center)) = bounds else {
            continue;
        };
        let center = to_dvec(center.0);
        let radius = bay
            .polygon
            .exterior()
            .0
            .iter()
            .map(|c| to_dvec(*c).distance(center))
            .fold(0.0, f64::max);
        if radius <= EPSILON {
            continue;
        }

        let (x0, y0) = frame.nearest_cell(rect.min());
        let (x1, y1) = frame.nearest_cell(rect.max());
        for y in y0.max(1)..=y1.min(n - 2) {
            for x in x0.max(1)..=x1.min(n - 2) {
                let world = frame.cell_to_world(x, y);
                if !bay.polygon.contains(&Point::from(world)) {
                    continue;
                }
                let d_norm = (to_dvec(world).distance(center) / radius).clamp(0.0, 1.0);
                let carve = bay.max_depth * (1.0 - 0.5 * d_norm);
                let h = heights.get(x, y);
                heights.set(x, y, (h - carve).max(0.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureKind;
    use crate::flow::accumulate_flow;
    use crate::grid::TileCoord;
    use geo::coord;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square_ring(size: f64) -> Vec<Coord<f64>> {
        vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: size, y: 0.0 },
            coord! { x: size, y: size },
            coord! { x: 0.0, y: size },
        ]
    }

    /// Land square with a rectangular notch cut into its bottom edge.
    fn notched_polygon() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (10.0, 10.0),
                (40.0, 10.0),
                (40.0, 24.0),
                (50.0, 24.0),
                (50.0, 10.0),
                (90.0, 10.0),
                (90.0, 90.0),
                (10.0, 90.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_resample_spacing() {
        let ring = resample_ring(&square_ring(10.0), 1.0);
        assert_eq!(ring.len(), 40);
    }

    #[test]
    fn test_convex_ring_has_no_concave_runs() {
        let ring = resample_ring(&square_ring(10.0), 1.0);
        let curvature = signed_curvature(&ring, 2);
        assert!(curvature.iter().all(|&c| c <= 1e-9));
        assert!(find_concave_runs(&curvature, 0.2).is_empty());
    }

    #[test]
    fn test_notch_is_concave() {
        let ring = resample_ring(&open_ccw_ring(&notched_polygon()), 2.0);
        let curvature = signed_curvature(&ring, 2);
        let runs = find_concave_runs(&curvature, 0.2);
        assert!(!runs.is_empty());
        let apex = ring[runs[0].apex];
        assert!((38.0..=52.0).contains(&apex.x), "apex {apex:?}");
    }

    #[test]
    fn test_concavity_angle() {
        let angle =
            concavity_angle(DVec2::new(-1.0, 0.0), DVec2::ZERO, DVec2::new(0.0, 1.0)).unwrap();
        assert!((angle - 90.0).abs() < 1e-9);
        assert!(concavity_angle(DVec2::ZERO, DVec2::ZERO, DVec2::X).is_none());
    }

    #[test]
    fn test_wrapping_run_is_joined() {
        let curvature = vec![0.5, 0.6, 0.0, 0.0, 0.9];
        let runs = find_concave_runs(&curvature, 0.2);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].start, 4);
        assert_eq!(runs[0].end, 1);
        assert_eq!(runs[0].apex, 4);
    }

    #[test]
    fn test_notched_coast_yields_bay_and_carves() {
        let frame = TileFrame::new(TileCoord::new(0, 0), 100.0, 51);
        let config = TerrainConfig {
            resolution: 51,
            tile_size: 100.0,
            ..Default::default()
        };
        let mut heights = Heightfield::filled(51, 0.6);
        let flow = accumulate_flow(&heights);
        let (features, bays) = extract_bays(
            &[notched_polygon()],
            &flow,
            &frame,
            &config,
            &mut ChaCha8Rng::seed_from_u64(2),
        );
        assert_eq!(features.len(), bays.len());
        assert!(!features.is_empty(), "notch should produce a bay");
        assert!(features.iter().all(|f| f.kind() == FeatureKind::Bay));
        assert!(bays.iter().all(|b| !b.is_river_mouth));

        let before = heights.clone();
        apply_bay_erosion(&mut heights, &bays, &frame);
        assert!(heights.values().iter().zip(before.values()).any(|(a, b)| a < b));
        for i in 0..51 {
            assert_eq!(heights.get(i, 0), 0.6);
            assert_eq!(heights.get(0, i), 0.6);
        }
    }

    #[test]
    fn test_disabled_bays() {
        let frame = TileFrame::new(TileCoord::new(0, 0), 100.0, 51);
        let mut config = TerrainConfig::default();
        config.bay.enabled = false;
        let flow = accumulate_flow(&Heightfield::filled(51, 0.6));
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (features, bays) = extract_bays(&[notched_polygon()], &flow, &frame, &config, &mut rng);
        assert!(features.is_empty() && bays.is_empty());
    }
}
