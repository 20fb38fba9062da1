//! Raindrop hydraulic erosion.
//!
//! Each drop carries water and sediment downhill along the steepest
//! 4-neighbor, picking up material while under capacity and dropping it when
//! over. The outermost ring of cells is never modified so neighbouring tiles
//! keep identical shared edges.

use rand::Rng;
use tidewater_config::ErosionConfig;

use crate::grid::{Heightfield, NEIGHBORS_4};

/// Minimum slope used in the capacity term, so drops on flats still carry a
/// little sediment.
const MIN_CAPACITY_SLOPE: f64 = 1e-4;

/// Totals reported after an erosion pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ErosionStats {
    /// Drops simulated.
    pub drops: usize,
    /// Total steps taken across all drops.
    pub steps: usize,
    /// Total height removed.
    pub eroded: f64,
    /// Total height added back.
    pub deposited: f64,
}

/// Runs `iterations * resolution` drops over `heights`.
///
/// Values may overshoot `[0, 1]` slightly; callers clamp afterwards.
pub fn erode(
    heights: &mut Heightfield,
    config: &ErosionConfig,
    rng: &mut impl Rng,
) -> ErosionStats {
    let n = heights.resolution();
    let mut stats = ErosionStats::default();
    if !config.enabled || n < 3 {
        return stats;
    }

    let drops = config.iterations as usize * n;
    for _ in 0..drops {
        let x = rng.random_range(1..n - 1);
        let y = rng.random_range(1..n - 1);
        simulate_drop(heights, config, (x, y), &mut stats);
        stats.drops += 1;
    }
    stats
}

fn lowest_neighbor(heights: &Heightfield, x: usize, y: usize) -> Option<(usize, usize, f64)> {
    let here = heights.get(x, y);
    NEIGHBORS_4
        .iter()
        .filter_map(|&(dx, dy)| {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            heights
                .get_signed(nx, ny)
                .map(|h| (nx as usize, ny as usize, h))
        })
        .filter(|&(_, _, h)| h < here)
        .min_by(|a, b| a.2.total_cmp(&b.2))
}

fn simulate_drop(
    heights: &mut Heightfield,
    config: &ErosionConfig,
    start: (usize, usize),
    stats: &mut ErosionStats,
) {
    let (mut x, mut y) = start;
    let mut water = config.initial_water;
    let mut sediment = 0.0;

    for _ in 0..config.max_steps {
        if heights.is_border(x, y) || water < config.min_water {
            break;
        }
        let Some((nx, ny, next_h)) = lowest_neighbor(heights, x, y) else {
            // Pit: leave whatever the drop still carries.
            let h = heights.get(x, y);
            heights.set(x, y, h + sediment);
            stats.deposited += sediment;
            break;
        };

        let here = heights.get(x, y);
        let slope = here - next_h;
        let capacity = slope.max(MIN_CAPACITY_SLOPE) * water * config.capacity_factor;

        if sediment > capacity {
            let amount = (sediment - capacity) * config.deposition_rate;
            heights.set(x, y, here + amount);
            sediment -= amount;
            stats.deposited += amount;
        } else {
            // Never dig below the downhill neighbour.
            let amount = ((capacity - sediment) * config.erosion_rate).min(slope);
            heights.set(x, y, here - amount);
            sediment += amount;
            stats.eroded += amount;
        }

        water *= 1.0 - config.evaporation;
        x = nx;
        y = ny;
        stats.steps += 1;
    }
}
