//! Planar geometry helpers shared by the extractors.
//!
//! Heavy lifting (overlay, hulls, simplification) goes through `geo`; this
//! module adds the grid-specific glue: polygonising cell sets, validity repair,
//! polyline buffers and the curve smoothing used for rivers and coasts.

use std::collections::BTreeMap;

use geo::{
    Area, BooleanOps, ConcaveHull, ConvexHull, Coord, LineString, MultiPoint, MultiPolygon, Point,
    Polygon, Rect, Simplify, coord,
};
use glam::DVec2;
use rand::Rng;

use crate::grid::TileFrame;

/// Areas and lengths below this are treated as zero.
pub const EPSILON: f64 = 1e-9;

/// `geo` coordinate as a `glam` vector.
#[inline]
pub fn to_dvec(c: Coord<f64>) -> DVec2 {
    DVec2::new(c.x, c.y)
}

#[inline]
pub fn to_coord(v: DVec2) -> Coord<f64> {
    coord! { x: v.x, y: v.y }
}

/// Length of a polyline.
pub fn line_length(line: &LineString<f64>) -> f64 {
    path_length(&line.0)
}

/// Length of an open coordinate path.
pub fn path_length(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .sum()
}

/// Total boundary length of a polygon, holes included.
pub fn polygon_perimeter(poly: &Polygon<f64>) -> f64 {
    line_length(poly.exterior()) + poly.interiors().iter().map(line_length).sum::<f64>()
}

/// Shoelace area of an open or closed ring; positive when counter-clockwise.
pub fn signed_ring_area(ring: &[Coord<f64>]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let a = ring[i];
        let b = ring[(i + 1) % n];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

/// The exterior ring without its closing coordinate, oriented counter-clockwise.
pub fn open_ccw_ring(poly: &Polygon<f64>) -> Vec<Coord<f64>> {
    let mut ring = poly.exterior().0.clone();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if signed_ring_area(&ring) < 0.0 {
        ring.reverse();
    }
    ring
}

fn orientation(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn segments_cross(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>, d: Coord<f64>) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    o1 * o2 < 0.0 && o3 * o4 < 0.0
}

/// Whether any two non-adjacent edges of a closed ring properly cross.
pub fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let pts = &ring.0;
    let n = pts.len();
    if n < 5 {
        return false;
    }
    let edges = n - 1;
    for i in 0..edges {
        for j in (i + 2)..edges {
            if i == 0 && j == edges - 1 {
                continue;
            }
            if segments_cross(pts[i], pts[i + 1], pts[j], pts[j + 1]) {
                return true;
            }
        }
    }
    false
}

/// The largest member of a multipolygon.
pub fn largest_polygon(mp: MultiPolygon<f64>) -> Option<Polygon<f64>> {
    mp.0.into_iter()
        .filter(|p| p.unsigned_area() > EPSILON)
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

/// Returns a valid polygon, repairing self-intersections with a zero-width
/// overlay. `None` when the shape is degenerate or cannot be repaired.
pub fn make_valid(poly: Polygon<f64>) -> Option<Polygon<f64>> {
    if poly.exterior().0.len() < 4 || poly.unsigned_area() <= EPSILON {
        return None;
    }
    let broken = ring_self_intersects(poly.exterior())
        || poly.interiors().iter().any(ring_self_intersects);
    if !broken {
        return Some(poly);
    }
    let repaired =
        largest_polygon(MultiPolygon::new(vec![poly]).union(&MultiPolygon::<f64>::new(vec![])))?;
    if ring_self_intersects(repaired.exterior()) {
        tracing::warn!("polygon could not be repaired; skipping feature");
        return None;
    }
    Some(repaired)
}

/// Polygon from an open ring of at least three points, validated.
pub fn polygon_from_ring(ring: Vec<Coord<f64>>) -> Option<Polygon<f64>> {
    if ring.len() < 3 {
        return None;
    }
    make_valid(Polygon::new(LineString::new(ring), vec![]))
}

/// Polygon around a point cloud sampled on the grid.
///
/// Tries a concave hull first, falls back to the convex hull, and for
/// collinear inputs to the hull of the points expanded by half a cell.
pub fn hull_polygon(points: &[Coord<f64>], concavity: f64, cell_size: f64) -> Option<Polygon<f64>> {
    if points.len() < 3 {
        return expanded_hull(points, cell_size);
    }
    let cloud = MultiPoint::new(points.iter().map(|&c| Point::from(c)).collect());
    let convex = cloud.convex_hull();
    if convex.unsigned_area() <= cell_size * cell_size * 0.01 {
        return expanded_hull(points, cell_size);
    }
    let concave = cloud.concave_hull(concavity);
    make_valid(concave).or_else(|| make_valid(convex))
}

fn expanded_hull(points: &[Coord<f64>], cell_size: f64) -> Option<Polygon<f64>> {
    if points.is_empty() {
        return None;
    }
    let h = cell_size * 0.5;
    let corners: Vec<Point<f64>> = points
        .iter()
        .flat_map(|c| {
            [(-h, -h), (h, -h), (h, h), (-h, h)]
                .into_iter()
                .map(move |(dx, dy)| Point::new(c.x + dx, c.y + dy))
        })
        .collect();
    make_valid(MultiPoint::new(corners).convex_hull())
}

/// Union of a set of polygons.
pub fn union_all(polys: impl IntoIterator<Item = Polygon<f64>>) -> MultiPolygon<f64> {
    polys
        .into_iter()
        .fold(MultiPolygon::new(vec![]), |acc, p| acc.union(&p))
}

/// Union of the one-cell squares centred on `cells`.
///
/// Runs of cells in a row become one rectangle and rows are merged pairwise,
/// so the outline keeps every notch and inlet of the cell set.
pub fn cell_footprint(cells: &[(usize, usize)], frame: &TileFrame) -> MultiPolygon<f64> {
    let mut rows: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &(x, y) in cells {
        rows.entry(y).or_default().push(x);
    }

    let mut strips: Vec<MultiPolygon<f64>> = rows
        .into_iter()
        .map(|(y, mut xs)| {
            xs.sort_unstable();
            xs.dedup();
            let mut runs = Vec::new();
            let mut start = xs[0];
            for pair in xs.windows(2) {
                if pair[1] != pair[0] + 1 {
                    runs.push(cell_run(frame, start, pair[0], y));
                    start = pair[1];
                }
            }
            runs.push(cell_run(frame, start, xs[xs.len() - 1], y));
            MultiPolygon::new(runs)
        })
        .collect();

    while strips.len() > 1 {
        strips = strips
            .chunks(2)
            .map(|pair| pair[1..].iter().fold(pair[0].clone(), |acc, p| acc.union(p)))
            .collect();
    }
    strips.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

fn cell_run(frame: &TileFrame, x0: usize, x1: usize, y: usize) -> Polygon<f64> {
    let min = frame.to_world(x0 as f64 - 0.5, y as f64 - 0.5);
    let max = frame.to_world(x1 as f64 + 0.5, y as f64 + 0.5);
    Rect::new(min, max).to_polygon()
}

/// Simplifies a polygon ring with Douglas-Peucker, keeping the original when
/// simplification would collapse or break it.
pub fn simplify_polygon(poly: Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    let simplified = poly.simplify(&tolerance);
    if simplified.exterior().0.len() >= 4
        && simplified.unsigned_area() > poly.unsigned_area() * 0.5
        && !ring_self_intersects(simplified.exterior())
    {
        simplified
    } else {
        poly
    }
}

/// Douglas-Peucker simplification of an open polyline.
pub fn simplify_path(coords: &[Coord<f64>], tolerance: f64) -> Vec<Coord<f64>> {
    if coords.len() < 3 {
        return coords.to_vec();
    }
    LineString::new(coords.to_vec()).simplify(&tolerance).0
}

/// Chaikin corner cutting; endpoints are preserved.
pub fn chaikin(coords: &[Coord<f64>], iterations: u32) -> Vec<Coord<f64>> {
    let mut current = coords.to_vec();
    for _ in 0..iterations {
        if current.len() < 3 {
            break;
        }
        let mut next = Vec::with_capacity(current.len() * 2);
        next.push(current[0]);
        for w in current.windows(2) {
            let (a, b) = (to_dvec(w[0]), to_dvec(w[1]));
            next.push(to_coord(a * 0.75 + b * 0.25));
            next.push(to_coord(a * 0.25 + b * 0.75));
        }
        if let Some(&last) = current.last() {
            next.push(last);
        }
        current = next;
    }
    current
}

/// Fractal midpoint displacement of a closed (open-represented) ring.
///
/// Every pass inserts the midpoint of each edge, pushed perpendicular to the
/// edge by a uniform draw in `[-amplitude, amplitude]`; amplitude halves per pass.
pub fn midpoint_displace(
    ring: &[Coord<f64>],
    iterations: u32,
    amplitude: f64,
    rng: &mut impl Rng,
) -> Vec<Coord<f64>> {
    let mut current = ring.to_vec();
    let mut amp = amplitude;
    for _ in 0..iterations {
        let n = current.len();
        if n < 3 || amp <= 0.0 {
            break;
        }
        let mut next = Vec::with_capacity(n * 2);
        for i in 0..n {
            let a = to_dvec(current[i]);
            let b = to_dvec(current[(i + 1) % n]);
            next.push(current[i]);
            let edge = b - a;
            let len = edge.length();
            if len <= EPSILON {
                continue;
            }
            let normal = DVec2::new(-edge.y, edge.x) / len;
            let offset = rng.random_range(-amp..=amp);
            next.push(to_coord((a + b) * 0.5 + normal * offset));
        }
        current = next;
        amp *= 0.5;
    }
    current
}

/// Distance from `p` to segment `ab`, and the closest point on it.
pub fn closest_on_segment(p: DVec2, a: DVec2, b: DVec2) -> (f64, DVec2) {
    let ab = b - a;
    let len2 = ab.length_squared();
    let t = if len2 <= EPSILON {
        0.0
    } else {
        ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
    };
    let q = a + ab * t;
    (p.distance(q), q)
}

/// Closest point on a polyline to `p`.
pub fn closest_on_path(p: Coord<f64>, path: &[Coord<f64>]) -> Option<(f64, Coord<f64>)> {
    let p = to_dvec(p);
    match path {
        [] => None,
        [only] => Some((p.distance(to_dvec(*only)), *only)),
        _ => path
            .windows(2)
            .map(|w| closest_on_segment(p, to_dvec(w[0]), to_dvec(w[1])))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(d, q)| (d, to_coord(q))),
    }
}

/// Distance from `p` to a polyline, infinite for an empty one.
pub fn distance_to_path(p: Coord<f64>, path: &[Coord<f64>]) -> f64 {
    closest_on_path(p, path).map_or(f64::INFINITY, |(d, _)| d)
}

/// Buffer of an open polyline: union of squared-off segment quads.
pub fn buffer_path(path: &[Coord<f64>], half_width: f64) -> MultiPolygon<f64> {
    if half_width <= EPSILON {
        return MultiPolygon::new(vec![]);
    }
    let quads = path.windows(2).filter_map(|w| {
        let a = to_dvec(w[0]);
        let b = to_dvec(w[1]);
        let d = b - a;
        let len = d.length();
        if len <= EPSILON {
            return None;
        }
        let u = d / len * half_width;
        let n = DVec2::new(-u.y, u.x);
        Some(Polygon::new(
            LineString::new(vec![
                to_coord(a - u + n),
                to_coord(b + u + n),
                to_coord(b + u - n),
                to_coord(a - u - n),
            ]),
            vec![],
        ))
    });
    union_all(quads)
}

/// Outward buffer of a polygon by `distance`.
pub fn buffer_polygon(poly: &Polygon<f64>, distance: f64) -> MultiPolygon<f64> {
    let ring = buffer_path(&poly.exterior().0, distance);
    MultiPolygon::new(vec![poly.clone()]).union(&ring)
}

/// Fraction of `poly`'s area covered by `other`.
pub fn overlap_fraction(poly: &Polygon<f64>, other: &MultiPolygon<f64>) -> f64 {
    let area = poly.unsigned_area();
    if area <= EPSILON || other.0.is_empty() {
        return 0.0;
    }
    (poly.intersection(other).unsigned_area() / area).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + size, y0),
                (x0 + size, y0 + size),
                (x0, y0 + size),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
        ];
        assert!((signed_ring_area(&ccw) - 0.5).abs() < 1e-12);
        let mut cw = ccw.clone();
        cw.reverse();
        assert!(signed_ring_area(&cw) < 0.0);
    }

    #[test]
    fn test_open_ccw_ring_drops_closing_point() {
        let ring = open_ccw_ring(&square(0.0, 0.0, 2.0));
        assert_eq!(ring.len(), 4);
        assert!(signed_ring_area(&ring) > 0.0);
    }

    #[test]
    fn test_bowtie_detected_and_repaired() {
        let bowtie = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)]),
            vec![],
        );
        assert!(ring_self_intersects(bowtie.exterior()));
        if let Some(fixed) = make_valid(bowtie) {
            assert!(!ring_self_intersects(fixed.exterior()));
            assert!(fixed.unsigned_area() > 0.0);
        }
    }

    #[test]
    fn test_make_valid_rejects_degenerate() {
        let flat = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            vec![],
        );
        assert!(make_valid(flat).is_none());
    }

    #[test]
    fn test_hull_of_collinear_points_is_expanded() {
        let pts: Vec<_> = (0..5).map(|i| coord! { x: i as f64, y: 0.0 }).collect();
        let hull = hull_polygon(&pts, 2.0, 1.0).unwrap();
        assert!((hull.unsigned_area() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_hull_of_grid_block() {
        let pts: Vec<_> = (0..6)
            .flat_map(|x| (0..6).map(move |y| coord! { x: x as f64, y: y as f64 }))
            .collect();
        let hull = hull_polygon(&pts, 2.0, 1.0).unwrap();
        assert!(hull.unsigned_area() > 12.0);
        assert!(hull.unsigned_area() <= 25.0 + 1e-9);
    }

    #[test]
    fn test_cell_footprint_keeps_notch() {
        use crate::grid::TileCoord;
        use geo::Contains;

        // 10x10 block with a 4-wide, 6-deep notch cut into its top rows.
        let frame = TileFrame::new(TileCoord::new(0, 0), 20.0, 21);
        let cells: Vec<_> = (0..10)
            .flat_map(|y| (0..10).map(move |x| (x, y)))
            .filter(|&(x, y)| !((3..7).contains(&x) && y < 6))
            .collect();
        let footprint = cell_footprint(&cells, &frame);
        assert_eq!(footprint.0.len(), 1);
        assert!((footprint.unsigned_area() - cells.len() as f64).abs() < 1e-9);
        assert!(!footprint.contains(&Point::new(5.0, 2.0)));
        assert!(footprint.contains(&Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_chaikin_preserves_endpoints_and_smooths() {
        let path = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
            coord! { x: 2.0, y: 0.0 },
        ];
        let smooth = chaikin(&path, 2);
        assert_eq!(smooth.first(), path.first());
        assert_eq!(smooth.last(), path.last());
        assert!(smooth.len() > path.len());
        let peak = smooth.iter().map(|c| c.y).fold(f64::MIN, f64::max);
        assert!(peak < 1.0);
    }

    #[test]
    fn test_midpoint_displacement_is_seeded() {
        let ring = open_ccw_ring(&square(0.0, 0.0, 10.0));
        let a = midpoint_displace(&ring, 3, 0.5, &mut ChaCha8Rng::seed_from_u64(1));
        let b = midpoint_displace(&ring, 3, 0.5, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_closest_on_path() {
        let path = vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 }];
        let (d, q) = closest_on_path(coord! { x: 4.0, y: 3.0 }, &path).unwrap();
        assert!((d - 3.0).abs() < 1e-12);
        assert!((q.x - 4.0).abs() < 1e-12);
        assert!(distance_to_path(coord! { x: 0.0, y: 0.0 }, &[]).is_infinite());
    }

    #[test]
    fn test_buffer_path_area() {
        let path = vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 }];
        let buffer = buffer_path(&path, 1.0);
        // 12 x 2 rectangle including the squared caps.
        assert!((buffer.unsigned_area() - 24.0).abs() < 1e-3);
    }

    #[test]
    fn test_overlap_fraction_half() {
        let a = square(0.0, 0.0, 2.0);
        let b = MultiPolygon::new(vec![square(1.0, 0.0, 2.0)]);
        assert!((overlap_fraction(&a, &b) - 0.5).abs() < 1e-4);
        assert_eq!(overlap_fraction(&a, &MultiPolygon::new(vec![])), 0.0);
    }
}
