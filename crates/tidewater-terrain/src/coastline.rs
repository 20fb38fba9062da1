//! Land/water polygonisation.
//!
//! Each land region is outlined by the union of its cell squares, which keeps
//! inlets open for bay detection. Outlines are merged, lightly simplified and
//! optionally roughened with seeded midpoint displacement.

use geo::{Area, Polygon};
use rand::Rng;
use tidewater_config::TerrainConfig;

use crate::feature::{CoastlineProperties, FeatureProperties, TerrainFeature};
use crate::geometry::{
    cell_footprint, largest_polygon, make_valid, midpoint_displace, open_ccw_ring,
    polygon_from_ring, polygon_perimeter, simplify_polygon, union_all,
};
use crate::grid::{CellMask, Heightfield, NEIGHBORS_4, TileFrame, connected_regions};

/// Polygons covering every sufficiently large landmass on the tile.
pub fn landmass_polygons(
    heights: &Heightfield,
    frame: &TileFrame,
    config: &TerrainConfig,
    rng: &mut impl Rng,
) -> Vec<Polygon<f64>> {
    let settings = &config.coastline;
    let cs = frame.cell_size();
    let land = CellMask::land(heights, config.water_level);

    // Enclosed water becomes a lake of its own, so only exteriors are kept.
    let outlines = connected_regions(&land, &NEIGHBORS_4)
        .into_iter()
        .filter(|region| region.len() >= settings.min_region_cells)
        .filter_map(|region| largest_polygon(cell_footprint(&region, frame)))
        .map(|poly| Polygon::new(poly.exterior().clone(), vec![]));

    union_all(outlines)
        .0
        .into_iter()
        .filter_map(|poly| {
            let poly = simplify_polygon(poly, settings.simplify_cells * cs);
            if settings.fractal_detail {
                let amplitude = settings.fractal_amplitude_cells * cs;
                roughen(&poly, settings.fractal_iterations, amplitude, rng).or(Some(poly))
            } else {
                Some(poly)
            }
        })
        .filter(|poly| poly.unsigned_area() > cs * cs)
        .collect()
}

fn roughen(
    poly: &Polygon<f64>,
    iterations: u32,
    amplitude: f64,
    rng: &mut impl Rng,
) -> Option<Polygon<f64>> {
    let ring = midpoint_displace(&open_ccw_ring(poly), iterations, amplitude, rng);
    let exterior = polygon_from_ring(ring)?;
    make_valid(Polygon::new(
        exterior.exterior().clone(),
        poly.interiors().to_vec(),
    ))
}

/// One `coastline` feature per landmass.
pub fn extract_coastlines(
    heights: &Heightfield,
    frame: &TileFrame,
    config: &TerrainConfig,
    rng: &mut impl Rng,
) -> Vec<TerrainFeature> {
    landmass_polygons(heights, frame, config, rng)
        .into_iter()
        .enumerate()
        .map(|(index, poly)| {
            let properties = FeatureProperties::Coastline(CoastlineProperties {
                area: poly.unsigned_area(),
                perimeter: polygon_perimeter(&poly),
                landmass_index: index,
            });
            TerrainFeature::polygon(poly, properties)
        })
        .collect()
}
