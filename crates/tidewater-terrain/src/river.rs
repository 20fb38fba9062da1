//! River tracing over the flow grid.
//!
//! Rivers start at headwaters (candidate cells with no higher candidate
//! neighbour), follow the lowest unvisited candidate cell, then finish with a
//! short downhill run toward the sea. A river that runs into one traced
//! earlier stops at the junction and raises the stream order below it. Paths
//! are smoothed and their mouths snapped onto the nearest coastline.

use geo::{Coord, LineString, Polygon};
use tidewater_config::TerrainConfig;

use crate::feature::{FeatureProperties, RiverProperties, TerrainFeature};
use crate::flow::FlowGrid;
use crate::geometry::{chaikin, closest_on_path, line_length, simplify_path};
use crate::grid::{CellMask, Heightfield, NEIGHBORS_8, TileFrame};

/// A traced river, kept for delta generation and beach exclusion.
#[derive(Clone, Debug, PartialEq)]
pub struct River {
    /// Index in extraction order.
    pub id: usize,
    /// Grid cells from source to mouth.
    pub cells: Vec<(usize, usize)>,
    /// Smoothed world-space course.
    pub line: LineString<f64>,
    /// Channel width in world units.
    pub width: f64,
    /// Largest flow along the course.
    pub max_flow: f64,
    /// Flow at the last cell.
    pub mouth_flow: f64,
    /// Whether the course ends in a submerged cell.
    pub reaches_water: bool,
    /// Strahler-style order: 1 at headwaters, raised where equal orders meet.
    pub stream_order: u32,
    /// The river this one flows into, when it ends at a junction.
    pub tributary_of: Option<usize>,
}

impl River {
    /// The river as an emitted feature.
    pub fn to_feature(&self) -> TerrainFeature {
        TerrainFeature::line(
            self.line.clone(),
            FeatureProperties::River(RiverProperties {
                river_id: self.id,
                length: line_length(&self.line),
                width: self.width,
                max_flow: self.max_flow,
                mouth_flow: self.mouth_flow,
                reaches_water: self.reaches_water,
                stream_order: self.stream_order,
                tributary_of: self.tributary_of,
            }),
        )
    }
}

fn neighbors(
    heights: &Heightfield,
    x: usize,
    y: usize,
) -> impl Iterator<Item = (usize, usize)> + '_ {
    NEIGHBORS_8.iter().filter_map(move |&(dx, dy)| {
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        heights.in_bounds(nx, ny).then_some((nx as usize, ny as usize))
    })
}

/// Candidate cells with no higher candidate neighbour, highest first.
fn headwaters(heights: &Heightfield, candidates: &CellMask) -> Vec<(usize, usize)> {
    let n = heights.resolution();
    let mut heads: Vec<(usize, usize)> = (0..n)
        .flat_map(|y| (0..n).map(move |x| (x, y)))
        .filter(|&(x, y)| candidates.get(x, y))
        .filter(|&(x, y)| {
            let h = heights.get(x, y);
            !neighbors(heights, x, y)
                .any(|(nx, ny)| candidates.get(nx, ny) && heights.get(nx, ny) > h)
        })
        .collect();
    heads.sort_by(|a, b| heights.get(b.0, b.1).total_cmp(&heights.get(a.0, a.1)));
    heads
}

struct Trace {
    cells: Vec<(usize, usize)>,
    reaches_water: bool,
    joins: Option<usize>,
}

fn trace(
    heights: &Heightfield,
    candidates: &CellMask,
    claimed: &[Option<usize>],
    start: (usize, usize),
    config: &TerrainConfig,
) -> Trace {
    let n = heights.resolution();
    let wl = config.water_level;
    let mut cells = vec![start];
    let mut on_path = vec![false; n * n];
    on_path[start.1 * n + start.0] = true;
    let (mut x, mut y) = start;

    loop {
        let next = neighbors(heights, x, y)
            .filter(|&(nx, ny)| candidates.get(nx, ny) && !on_path[ny * n + nx])
            .min_by(|a, b| heights.get(a.0, a.1).total_cmp(&heights.get(b.0, b.1)));
        let Some((nx, ny)) = next else { break };
        cells.push((nx, ny));
        on_path[ny * n + nx] = true;
        if let Some(owner) = claimed[ny * n + nx] {
            return Trace {
                cells,
                reaches_water: false,
                joins: Some(owner),
            };
        }
        if heights.get(nx, ny) < wl {
            return Trace {
                cells,
                reaches_water: true,
                joins: None,
            };
        }
        (x, y) = (nx, ny);
    }

    for _ in 0..config.river.downhill_extension_steps {
        let here = heights.get(x, y);
        let next = neighbors(heights, x, y)
            .filter(|&(nx, ny)| !on_path[ny * n + nx] && heights.get(nx, ny) < here)
            .min_by(|a, b| heights.get(a.0, a.1).total_cmp(&heights.get(b.0, b.1)));
        let Some((nx, ny)) = next else { break };
        cells.push((nx, ny));
        on_path[ny * n + nx] = true;
        if heights.get(nx, ny) < wl {
            return Trace {
                cells,
                reaches_water: true,
                joins: None,
            };
        }
        (x, y) = (nx, ny);
    }
    Trace {
        cells,
        reaches_water: false,
        joins: None,
    }
}

/// Feeds a tributary of order `incoming` into `target` and carries any
/// increase on downstream.
fn raise_order(rivers: &mut [River], mut target: usize, mut incoming: u32) {
    while let Some(river) = rivers.get_mut(target) {
        let order = if river.stream_order == incoming {
            river.stream_order + 1
        } else {
            river.stream_order.max(incoming)
        };
        if order == river.stream_order {
            break;
        }
        river.stream_order = order;
        incoming = order;
        match river.tributary_of {
            Some(next) => target = next,
            None => break,
        }
    }
}

/// Channel width on a log scale between `flow_threshold` and twenty times it.
pub fn river_width(max_flow: f64, config: &TerrainConfig, cell_size: f64) -> f64 {
    let settings = &config.river;
    let ft = settings.flow_threshold.max(1.0);
    let t = ((max_flow / ft).max(1.0).ln() / 20.0_f64.ln()).clamp(0.0, 1.0);
    let span = settings.max_width_cells - settings.min_width_cells;
    (settings.min_width_cells + t * span) * cell_size
}

/// Moves the last coordinate onto the nearest coastline ring when it lies
/// within `max_distance` of one.
pub fn snap_to_coast(coords: &mut [Coord<f64>], coastlines: &[Polygon<f64>], max_distance: f64) {
    let Some(end) = coords.last_mut() else { return };
    let nearest = coastlines
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .filter_map(|ring| closest_on_path(*end, &ring.0))
        .min_by(|a, b| a.0.total_cmp(&b.0));
    if let Some((d, q)) = nearest
        && d <= max_distance
    {
        *end = q;
    }
}

/// Traces every river on the tile.
pub fn extract_rivers(
    heights: &Heightfield,
    flow: &FlowGrid,
    frame: &TileFrame,
    config: &TerrainConfig,
    coastlines: &[Polygon<f64>],
) -> Vec<River> {
    let settings = &config.river;
    let n = heights.resolution();
    let cs = frame.cell_size();
    let candidates = CellMask::from_fn(n, |x, y| {
        flow.get(x, y) >= settings.flow_threshold && heights.get(x, y) >= 0.8 * config.water_level
    });

    let mut claimed: Vec<Option<usize>> = vec![None; n * n];
    let mut rivers = Vec::new();
    for head in headwaters(heights, &candidates) {
        if claimed[head.1 * n + head.0].is_some() {
            continue;
        }
        let traced = trace(heights, &candidates, &claimed, head, config);
        if traced.cells.len() < settings.min_length {
            tracing::trace!(?head, len = traced.cells.len(), "river too short");
            continue;
        }
        let id = rivers.len();
        // The junction cell stays with the river it belongs to.
        for &(x, y) in &traced.cells {
            claimed[y * n + x].get_or_insert(id);
        }

        let raw: Vec<Coord<f64>> =
            traced.cells.iter().map(|&(x, y)| frame.cell_to_world(x, y)).collect();
        let mut coords = chaikin(
            &simplify_path(&raw, settings.simplify_cells * cs),
            settings.smoothing_iterations,
        );
        if coords.len() < 2 {
            continue;
        }
        snap_to_coast(&mut coords, coastlines, settings.snap_distance_cells * cs);

        let max_flow = traced.cells.iter().map(|&(x, y)| flow.get(x, y)).fold(0.0, f64::max);
        let mouth_flow = traced.cells.last().map_or(0.0, |&(x, y)| flow.get(x, y));
        rivers.push(River {
            id,
            cells: traced.cells,
            line: LineString::new(coords),
            width: river_width(max_flow, config, cs),
            max_flow,
            mouth_flow,
            reaches_water: traced.reaches_water,
            stream_order: 1,
            tributary_of: traced.joins,
        });
        if let Some(main) = traced.joins {
            raise_order(&mut rivers, main, 1);
        }
    }
    rivers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::accumulate_flow;
    use crate::grid::TileCoord;
    use geo::coord;

    fn valley(n: usize) -> Heightfield {
        let c = (n / 2) as f64;
        Heightfield::from_fn(n, |x, y| 0.3 + (x as f64 - c).abs() * 0.02 + y as f64 * 0.01)
    }

    fn setup(n: usize) -> (TileFrame, TerrainConfig) {
        let config = TerrainConfig {
            resolution: n,
            tile_size: 310.0,
            ..Default::default()
        };
        (TileFrame::new(TileCoord::new(0, 0), 310.0, n), config)
    }

    #[test]
    fn test_valley_river_reaches_sea() {
        let (frame, config) = setup(32);
        let hf = valley(32);
        let flow = accumulate_flow(&hf);
        let rivers = extract_rivers(&hf, &flow, &frame, &config, &[]);

        assert_eq!(rivers.len(), 1);
        let river = &rivers[0];
        assert!(river.reaches_water);
        assert!(river.cells.iter().all(|&(x, _)| x == 16));
        let &(_, last_y) = river.cells.last().unwrap();
        assert!(hf.get(16, last_y) < config.water_level);
        // Never continues past the first submerged cell.
        assert!(river.cells[..river.cells.len() - 1]
            .iter()
            .all(|&(x, y)| hf.get(x, y) >= config.water_level));
        assert!(river.width >= config.river.min_width_cells * frame.cell_size());
    }

    #[test]
    fn test_single_valley_is_first_order() {
        let (frame, config) = setup(32);
        let hf = valley(32);
        let rivers = extract_rivers(&hf, &accumulate_flow(&hf), &frame, &config, &[]);
        assert_eq!(rivers.len(), 1);
        assert_eq!(rivers[0].stream_order, 1);
        assert_eq!(rivers[0].tributary_of, None);

        let FeatureProperties::River(props) = &rivers[0].to_feature().properties else {
            unreachable!()
        };
        assert_eq!(props.stream_order, 1);
    }

    fn stub(id: usize, stream_order: u32, tributary_of: Option<usize>) -> River {
        River {
            id,
            cells: Vec::new(),
            line: LineString::new(vec![]),
            width: 1.0,
            max_flow: 0.0,
            mouth_flow: 0.0,
            reaches_water: tributary_of.is_none(),
            stream_order,
            tributary_of,
        }
    }

    #[test]
    fn test_equal_orders_meeting_raise_downstream() {
        // 2 joins 1, which joins the trunk 0.
        let mut rivers = vec![stub(0, 2, None), stub(1, 1, Some(0)), stub(2, 1, Some(1))];
        raise_order(&mut rivers, 1, 1);
        assert_eq!(rivers[1].stream_order, 2);
        assert_eq!(rivers[0].stream_order, 3);

        // A lower order joining changes nothing.
        raise_order(&mut rivers, 0, 1);
        assert_eq!(rivers[0].stream_order, 3);
    }

    #[test]
    fn test_short_paths_discarded() {
        let (frame, mut config) = setup(32);
        config.river.min_length = 100;
        let hf = valley(32);
        let flow = accumulate_flow(&hf);
        assert!(extract_rivers(&hf, &flow, &frame, &config, &[]).is_empty());
    }

    #[test]
    fn test_width_scales_logarithmically() {
        let config = TerrainConfig::default();
        let ft = config.river.flow_threshold;
        let narrow = river_width(ft, &config, 1.0);
        let wide = river_width(ft * 20.0, &config, 1.0);
        let capped = river_width(ft * 1000.0, &config, 1.0);
        assert!((narrow - config.river.min_width_cells).abs() < 1e-12);
        assert!((wide - config.river.max_width_cells).abs() < 1e-9);
        assert_eq!(wide, capped);
    }

    #[test]
    fn test_snap_moves_endpoint_onto_ring() {
        let coast = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]),
            vec![],
        );
        let mut coords = vec![coord! { x: 5.0, y: 5.0 }, coord! { x: 5.0, y: 1.0 }];
        snap_to_coast(&mut coords, std::slice::from_ref(&coast), 2.0);
        assert!((coords[1].y - 0.0).abs() < 1e-12);

        let mut far = vec![coord! { x: 5.0, y: 9.0 }, coord! { x: 5.0, y: 5.0 }];
        snap_to_coast(&mut far, &[coast], 2.0);
        assert_eq!(far[1], coord! { x: 5.0, y: 5.0 });
    }
}
