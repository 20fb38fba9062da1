//! D8 flow accumulation.
//!
//! Every cell starts with one unit of flow. Cells are visited from highest to
//! lowest and pass their accumulated flow to the steepest strictly lower of
//! their 8 neighbours. Cells with no lower neighbour keep their flow.

use std::cmp::Ordering;

use crate::grid::{Heightfield, NEIGHBORS_8};

/// Per-cell accumulated flow, same shape as the heightfield it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowGrid {
    resolution: usize,
    values: Vec<f64>,
}

impl FlowGrid {
    /// Samples per edge.
    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Flow through `(x, y)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.resolution + x]
    }

    /// Row-major flow values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Largest flow within a square window of `radius` cells around `(x, y)`.
    pub fn max_near(&self, x: usize, y: usize, radius: usize) -> f64 {
        let last = self.resolution - 1;
        let mut best = 0.0_f64;
        for ny in y.saturating_sub(radius)..=(y + radius).min(last) {
            for nx in x.saturating_sub(radius)..=(x + radius).min(last) {
                best = best.max(self.get(nx, ny));
            }
        }
        best
    }
}

/// Steepest strictly-lower 8-neighbour of `(x, y)`, by drop per unit distance.
pub fn downstream(heights: &Heightfield, x: usize, y: usize) -> Option<(usize, usize)> {
    let here = heights.get(x, y);
    let mut best: Option<((usize, usize), f64)> = None;
    for &(dx, dy) in &NEIGHBORS_8 {
        let nx = x as i64 + dx;
        let ny = y as i64 + dy;
        let Some(h) = heights.get_signed(nx, ny) else {
            continue;
        };
        if h >= here {
            continue;
        }
        let dist = if dx != 0 && dy != 0 { std::f64::consts::SQRT_2 } else { 1.0 };
        let gradient = (here - h) / dist;
        if best.is_none_or(|(_, g)| gradient > g) {
            best = Some(((nx as usize, ny as usize), gradient));
        }
    }
    best.map(|(cell, _)| cell)
}

/// Computes D8 flow accumulation for `heights`.
pub fn accumulate_flow(heights: &Heightfield) -> FlowGrid {
    let n = heights.resolution();
    let mut values = vec![1.0; n * n];

    let mut order: Vec<usize> = (0..n * n).collect();
    // Stable sort keeps equal heights in row-major order.
    order.sort_by(|&a, &b| {
        heights.values()[b]
            .partial_cmp(&heights.values()[a])
            .unwrap_or(Ordering::Equal)
    });

    for idx in order {
        let (x, y) = (idx % n, idx / n);
        if let Some((dx, dy)) = downstream(heights, x, y) {
            values[dy * n + dx] += values[idx];
        }
    }

    FlowGrid {
        resolution: n,
        values,
    }
}
