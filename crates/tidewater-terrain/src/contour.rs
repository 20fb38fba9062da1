//! Marching-squares elevation contours.
//!
//! Every grid cell contributes zero, one or two short segments per level.
//! Segments are emitted individually; no joining into longer lines.

use geo::{Coord, LineString};
use tidewater_config::ContourConfig;

use crate::feature::{ContourProperties, FeatureProperties, TerrainFeature};
use crate::geometry::{EPSILON, line_length};
use crate::grid::{Heightfield, TileFrame};

/// Cell edges, in corner order top-left, top-right, bottom-right, bottom-left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

use Edge::{Bottom, Left, Right, Top};

/// Segments per case, indexed by `tl << 3 | tr << 2 | br << 1 | bl`. Saddles
/// (5 and 10) list the pairing used when the cell centre is below the level.
const CASES: [&[(Edge, Edge)]; 16] = [
    &[],
    &[(Left, Bottom)],
    &[(Bottom, Right)],
    &[(Left, Right)],
    &[(Top, Right)],
    &[(Left, Bottom), (Top, Right)],
    &[(Top, Bottom)],
    &[(Left, Top)],
    &[(Left, Top)],
    &[(Top, Bottom)],
    &[(Left, Top), (Bottom, Right)],
    &[(Top, Right)],
    &[(Left, Right)],
    &[(Bottom, Right)],
    &[(Left, Bottom)],
    &[],
];

/// Saddle pairings when the cell centre is at or above the level.
const SADDLE_HIGH_5: &[(Edge, Edge)] = &[(Left, Top), (Bottom, Right)];
const SADDLE_HIGH_10: &[(Edge, Edge)] = &[(Top, Right), (Left, Bottom)];

fn lerp_param(a: f64, b: f64, level: f64) -> f64 {
    let d = b - a;
    if d.abs() <= EPSILON { 0.5 } else { ((level - a) / d).clamp(0.0, 1.0) }
}

/// Segments of the `level` iso-line inside cell `(x, y)`, in grid coordinates.
pub fn cell_segments(
    heights: &Heightfield,
    x: usize,
    y: usize,
    level: f64,
) -> Vec<[(f64, f64); 2]> {
    let tl = heights.get(x, y);
    let tr = heights.get(x + 1, y);
    let br = heights.get(x + 1, y + 1);
    let bl = heights.get(x, y + 1);
    let case = (usize::from(tl >= level) << 3)
        | (usize::from(tr >= level) << 2)
        | (usize::from(br >= level) << 1)
        | usize::from(bl >= level);

    let centre_high = (tl + tr + br + bl) * 0.25 >= level;
    let pairs = match case {
        5 if centre_high => SADDLE_HIGH_5,
        10 if centre_high => SADDLE_HIGH_10,
        _ => CASES[case],
    };

    let (fx, fy) = (x as f64, y as f64);
    let point = |edge: Edge| match edge {
        Top => (fx + lerp_param(tl, tr, level), fy),
        Right => (fx + 1.0, fy + lerp_param(tr, br, level)),
        Bottom => (fx + lerp_param(bl, br, level), fy + 1.0),
        Left => (fx, fy + lerp_param(tl, bl, level)),
    };
    pairs.iter().map(|&(a, b)| [point(a), point(b)]).collect()
}

/// Contour segments for every configured level.
pub fn extract_contours(
    heights: &Heightfield,
    frame: &TileFrame,
    config: &ContourConfig,
) -> Vec<TerrainFeature> {
    let n = heights.resolution();
    let mut features = Vec::new();
    if n < 2 {
        return features;
    }
    for &level in &config.levels {
        let mut emitted = 0;
        'cells: for y in 0..n - 1 {
            for x in 0..n - 1 {
                for [a, b] in cell_segments(heights, x, y, level) {
                    if emitted >= config.max_segments_per_level {
                        tracing::debug!(level, "contour segment cap reached");
                        break 'cells;
                    }
                    let coords: Vec<Coord<f64>> =
                        vec![frame.to_world(a.0, a.1), frame.to_world(b.0, b.1)];
                    let line = LineString::new(coords);
                    let length = line_length(&line);
                    if length <= EPSILON {
                        continue;
                    }
                    features.push(TerrainFeature::line(
                        line,
                        FeatureProperties::Contour(ContourProperties { elevation: level, length }),
                    ));
                    emitted += 1;
                }
            }
        }
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileCoord;

    fn frame(n: usize) -> TileFrame {
        TileFrame::new(TileCoord::new(0, 0), (n - 1) as f64, n)
    }

    #[test]
    fn test_ramp_gives_one_segment_per_row() {
        let hf = Heightfield::from_fn(5, |x, _| x as f64 * 0.25);
        let config = ContourConfig {
            levels: vec![0.4],
            ..Default::default()
        };
        let features = extract_contours(&hf, &frame(5), &config);
        assert_eq!(features.len(), 4);
        for f in &features {
            let line = f.as_line().unwrap();
            for c in &line.0 {
                assert!((c.x - 1.6).abs() < 1e-9);
            }
            let FeatureProperties::Contour(p) = &f.properties else { unreachable!() };
            assert!((p.length - 1.0).abs() < 1e-9);
            assert_eq!(p.elevation, 0.4);
        }
    }

    #[test]
    fn test_uniform_cell_has_no_segments() {
        let hf = Heightfield::filled(3, 0.5);
        assert!(cell_segments(&hf, 0, 0, 0.3).is_empty());
        assert!(cell_segments(&hf, 0, 0, 0.7).is_empty());
    }

    #[test]
    fn test_saddle_resolution_by_centre() {
        // tl and br high, tr and bl low.
        let hf = Heightfield::new(2, vec![1.0, 0.0, 0.0, 1.0]);
        let high = cell_segments(&hf, 0, 0, 0.4);
        assert_eq!(high.len(), 2);
        // Centre average 0.5 >= 0.4: high corners joined, low corners cut off.
        assert!(high.iter().any(|s| s.contains(&(0.6, 0.0)) && s.contains(&(1.0, 0.4))));

        let low = cell_segments(&hf, 0, 0, 0.6);
        assert_eq!(low.len(), 2);
        assert!(low.iter().any(|s| s.contains(&(0.0, 0.4)) && s.contains(&(0.4, 0.0))));
    }

    #[test]
    fn test_segment_cap() {
        let hf = Heightfield::from_fn(20, |x, _| x as f64 / 19.0);
        let config = ContourConfig {
            levels: vec![0.5],
            max_segments_per_level: 3,
        };
        assert_eq!(extract_contours(&hf, &frame(20), &config).len(), 3);
    }
}
