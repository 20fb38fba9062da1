//! Clips features to their tile's bounding box.

use geo::{
    Area, BooleanOps, BoundingRect, Coord, LineString, MultiLineString, MultiPolygon, Polygon, Rect,
};

use crate::feature::{FeatureGeometry, TerrainFeature};
use crate::geometry::{EPSILON, largest_polygon, line_length};

/// Clipped results smaller than this share of the original are dropped.
pub const MIN_RETAINED_FRACTION: f64 = 0.01;

fn rect_contains(rect: &Rect<f64>, c: Coord<f64>) -> bool {
    c.x >= rect.min().x && c.x <= rect.max().x && c.y >= rect.min().y && c.y <= rect.max().y
}

fn inside(rect: &Rect<f64>, inner: Option<Rect<f64>>) -> bool {
    inner.is_some_and(|r| rect_contains(rect, r.min()) && rect_contains(rect, r.max()))
}

fn clamp_coord(rect: &Rect<f64>, c: Coord<f64>) -> Coord<f64> {
    Coord {
        x: c.x.clamp(rect.min().x, rect.max().x),
        y: c.y.clamp(rect.min().y, rect.max().y),
    }
}

/// Snaps overlay round-off back onto the box.
fn clamp_polygon(rect: &Rect<f64>, poly: Polygon<f64>) -> Polygon<f64> {
    let (exterior, interiors) = poly.into_inner();
    let clamp_ring = |ring: LineString<f64>| {
        LineString::new(ring.0.into_iter().map(|c| clamp_coord(rect, c)).collect())
    };
    Polygon::new(clamp_ring(exterior), interiors.into_iter().map(clamp_ring).collect())
}

/// Intersection of a polygon with the box, reduced to its largest member.
pub fn clip_polygon(poly: &Polygon<f64>, rect: &Rect<f64>) -> Option<Polygon<f64>> {
    if inside(rect, poly.bounding_rect()) {
        return Some(poly.clone());
    }
    let original = poly.unsigned_area();
    if original <= EPSILON {
        return None;
    }
    let clipped = MultiPolygon::new(vec![rect.to_polygon()])
        .intersection(&MultiPolygon::new(vec![poly.clone()]));
    let largest = largest_polygon(clipped)?;
    let largest = clamp_polygon(rect, largest);
    (largest.unsigned_area() >= original * MIN_RETAINED_FRACTION).then_some(largest)
}

/// Portion of a line inside the box, reduced to its longest member.
pub fn clip_line(line: &LineString<f64>, rect: &Rect<f64>) -> Option<LineString<f64>> {
    if inside(rect, line.bounding_rect()) {
        return Some(line.clone());
    }
    let original = line_length(line);
    if original <= EPSILON {
        return None;
    }
    let clipped = rect
        .to_polygon()
        .clip(&MultiLineString::new(vec![line.clone()]), false);
    let longest = clipped
        .0
        .into_iter()
        .max_by(|a, b| line_length(a).total_cmp(&line_length(b)))?;
    let longest = LineString::new(longest.0.into_iter().map(|c| clamp_coord(rect, c)).collect());
    let length = line_length(&longest);
    (length >= original * MIN_RETAINED_FRACTION && length > EPSILON).then_some(longest)
}

/// Clips one feature, recomputing its area or length when it was cut.
pub fn clip_feature(feature: TerrainFeature, rect: &Rect<f64>) -> Option<TerrainFeature> {
    let TerrainFeature {
        geometry,
        mut properties,
    } = feature;
    let geometry = match geometry {
        FeatureGeometry::Point(p) => {
            if !rect_contains(rect, p.0) {
                return None;
            }
            FeatureGeometry::Point(p)
        }
        FeatureGeometry::Polygon(poly) => {
            let clipped = clip_polygon(&poly, rect)?;
            if clipped != poly {
                properties.set_area(clipped.unsigned_area());
            }
            FeatureGeometry::Polygon(clipped)
        }
        FeatureGeometry::LineString(line) => {
            let clipped = clip_line(&line, rect)?;
            if clipped != line {
                properties.set_length(line_length(&clipped));
            }
            FeatureGeometry::LineString(clipped)
        }
    };
    Some(TerrainFeature {
        geometry,
        properties,
    })
}

/// Clips every feature, dropping those that end up outside or as slivers.
pub fn clip_features(features: Vec<TerrainFeature>, rect: &Rect<f64>) -> Vec<TerrainFeature> {
    let before = features.len();
    let kept: Vec<_> = features.into_iter().filter_map(|f| clip_feature(f, rect)).collect();
    tracing::debug!(before, after = kept.len(), "clipped features to tile");
    kept
}
