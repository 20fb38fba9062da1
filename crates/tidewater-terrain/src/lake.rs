//! Landlocked lake extraction and shape-based classification.

use geo::{Area, Polygon};
use hashbrown::HashSet;
use tidewater_config::{LakeConfig, TerrainConfig};

use crate::feature::{FeatureProperties, LakeProperties, LakeType, TerrainFeature};
use crate::geometry::{EPSILON, hull_polygon, polygon_perimeter};
use crate::grid::{CellMask, Heightfield, NEIGHBORS_4, TileFrame, boundary_cells, connected_regions};

/// Shape measurements used for classification.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LakeMetrics {
    /// Number of grid cells in the basin.
    pub cell_count: usize,
    /// `4 pi A / P^2`; 1 for a circle.
    pub circularity: f64,
    /// Long over short side of the cell bounding box.
    pub elongation: f64,
    /// Mean height of the surrounding land above the water level.
    pub rim_height: f64,
}

/// An accepted lake, kept for beach classification.
#[derive(Clone, Debug)]
pub struct Lake {
    /// Outline.
    pub polygon: Polygon<f64>,
    /// Submerged cells of the basin.
    pub cells: Vec<(usize, usize)>,
    /// Classification.
    pub lake_type: LakeType,
}

/// Maps shape metrics to a lake type.
pub fn classify_lake(metrics: &LakeMetrics, config: &LakeConfig) -> LakeType {
    if metrics.cell_count <= config.pond_max_cells {
        LakeType::Pond
    } else if metrics.elongation >= config.elongated_ratio
        && metrics.circularity < config.kettle_circularity
    {
        if metrics.rim_height >= config.rift_rim_height {
            LakeType::Rift
        } else {
            LakeType::Oxbow
        }
    } else if metrics.circularity >= config.crater_circularity
        && metrics.rim_height >= config.crater_rim_height
    {
        LakeType::Crater
    } else if metrics.circularity >= config.kettle_circularity {
        LakeType::Kettle
    } else {
        LakeType::Glacial
    }
}

fn elongation(cells: &[(usize, usize)]) -> f64 {
    let (min_x, max_x, min_y, max_y) = cells.iter().fold(
        (usize::MAX, 0, usize::MAX, 0),
        |(a, b, c, d), &(x, y)| (a.min(x), b.max(x), c.min(y), d.max(y)),
    );
    let w = (max_x - min_x + 1) as f64;
    let h = (max_y - min_y + 1) as f64;
    w.max(h) / w.min(h)
}

fn rim_height(
    heights: &Heightfield,
    cells: &[(usize, usize)],
    water: &CellMask,
    water_level: f64,
) -> f64 {
    let rim: HashSet<(usize, usize)> = cells
        .iter()
        .flat_map(|&(x, y)| {
            NEIGHBORS_4.iter().filter_map(move |&(dx, dy)| {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                heights.in_bounds(nx, ny).then_some((nx as usize, ny as usize))
            })
        })
        .filter(|&(x, y)| !water.get(x, y))
        .collect();
    if rim.is_empty() {
        return 0.0;
    }
    rim.iter().map(|&(x, y)| heights.get(x, y)).sum::<f64>() / rim.len() as f64 - water_level
}

/// Finds lakes: submerged basins that stay clear of the tile border.
pub fn extract_lakes(
    heights: &Heightfield,
    frame: &TileFrame,
    config: &TerrainConfig,
) -> (Vec<TerrainFeature>, Vec<Lake>) {
    let settings = &config.lake;
    let wl = config.water_level;
    let water = CellMask::from_fn(heights.resolution(), |x, y| heights.get(x, y) < wl);

    let mut features = Vec::new();
    let mut lakes = Vec::new();
    for region in connected_regions(&water, &NEIGHBORS_4) {
        if region.len() < settings.min_area_cells
            || region.iter().any(|&(x, y)| heights.is_border(x, y))
        {
            continue;
        }
        let depths: Vec<f64> = region.iter().map(|&(x, y)| wl - heights.get(x, y)).collect();
        let mean_depth = depths.iter().sum::<f64>() / depths.len() as f64;
        if mean_depth < settings.min_depth {
            continue;
        }
        let max_depth = depths.iter().copied().fold(0.0, f64::max);

        let points: Vec<_> = boundary_cells(&region, &water)
            .into_iter()
            .map(|(x, y)| frame.cell_to_world(x, y))
            .collect();
        let Some(polygon) = hull_polygon(&points, settings.concavity, frame.cell_size()) else {
            continue;
        };
        let area = polygon.unsigned_area();
        let perimeter = polygon_perimeter(&polygon);
        if perimeter <= EPSILON {
            continue;
        }

        let metrics = LakeMetrics {
            cell_count: region.len(),
            circularity: (4.0 * std::f64::consts::PI * area / (perimeter * perimeter)).min(1.0),
            elongation: elongation(&region),
            rim_height: rim_height(heights, &region, &water, wl),
        };
        let lake_type = classify_lake(&metrics, settings);

        features.push(TerrainFeature::polygon(
            polygon.clone(),
            FeatureProperties::Lake(LakeProperties {
                area,
                perimeter,
                lake_type,
                mean_depth,
                max_depth,
                circularity: metrics.circularity,
                elongation: metrics.elongation,
                rim_height: metrics.rim_height,
                cell_count: metrics.cell_count,
            }),
        ));
        lakes.push(Lake {
            polygon,
            cells: region,
            lake_type,
        });
    }
    (features, lakes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileCoord;

    fn setup(n: usize) -> (TileFrame, TerrainConfig) {
        let config = TerrainConfig {
            resolution: n,
            tile_size: 310.0,
            ..Default::default()
        };
        (TileFrame::new(TileCoord::new(0, 0), 310.0, n), config)
    }

    fn basin(n: usize, cx: f64, cy: f64, rx: f64, ry: f64) -> Heightfield {
        Heightfield::from_fn(n, |x, y| {
            let d = ((x as f64 - cx) / rx).powi(2) + ((y as f64 - cy) / ry).powi(2);
            if d < 1.0 { 0.3 } else { 0.6 }
        })
    }

    #[test]
    fn test_round_basin_is_landlocked_lake() {
        let (frame, config) = setup(32);
        let hf = basin(32, 15.5, 15.5, 6.0, 6.0);
        let (features, lakes) = extract_lakes(&hf, &frame, &config);
        assert_eq!(features.len(), 1);
        assert_eq!(lakes.len(), 1);
        assert!(lakes[0].cells.iter().all(|&(x, y)| !hf.is_border(x, y)));
        assert_ne!(lakes[0].lake_type, LakeType::Pond);

        let FeatureProperties::Lake(props) = &features[0].properties else { unreachable!() };
        assert!(props.circularity > 0.6, "circularity {}", props.circularity);
        assert!((props.rim_height - 0.15).abs() < 1e-9);
        assert!((props.mean_depth - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_border_water_is_not_a_lake() {
        let (frame, config) = setup(32);
        let hf = basin(32, 0.0, 15.5, 8.0, 8.0);
        let (features, _) = extract_lakes(&hf, &frame, &config);
        assert!(features.is_empty());
    }

    #[test]
    fn test_shallow_basin_filtered() {
        let (frame, config) = setup(32);
        let hf = Heightfield::from_fn(32, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) { 0.445 } else { 0.6 }
        });
        let (features, _) = extract_lakes(&hf, &frame, &config);
        assert!(features.is_empty());
    }

    #[test]
    fn test_submerged_tile_has_no_lakes() {
        let (frame, config) = setup(32);
        let (features, _) = extract_lakes(&Heightfield::filled(32, 0.1), &frame, &config);
        assert!(features.is_empty());
    }

    #[test]
    fn test_classification_rules() {
        let config = LakeConfig::default();
        let m = |cell_count, circularity, elongation, rim_height| LakeMetrics {
            cell_count,
            circularity,
            elongation,
            rim_height,
        };
        assert_eq!(classify_lake(&m(10, 0.9, 1.0, 0.3), &config), LakeType::Pond);
        assert_eq!(classify_lake(&m(100, 0.3, 4.0, 0.2), &config), LakeType::Rift);
        assert_eq!(classify_lake(&m(100, 0.3, 4.0, 0.05), &config), LakeType::Oxbow);
        assert_eq!(classify_lake(&m(100, 0.85, 1.1, 0.2), &config), LakeType::Crater);
        assert_eq!(classify_lake(&m(100, 0.85, 1.1, 0.02), &config), LakeType::Kettle);
        assert_eq!(classify_lake(&m(100, 0.4, 1.5, 0.02), &config), LakeType::Glacial);
    }
}
