//! Tile addressing, the per-tile height grid, and grid-space helpers shared by
//! every extractor.

use std::collections::VecDeque;

use geo::{Coord, Rect, coord};
use serde::{Deserialize, Serialize};

/// 4-neighborhood offsets: E, N, W, S.
pub const NEIGHBORS_4: [(i64, i64); 4] = [(1, 0), (0, -1), (-1, 0), (0, 1)];

/// 8-neighborhood offsets: E, NE, N, NW, W, SW, S, SE.
pub const NEIGHBORS_8: [(i64, i64); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// A tile's position in the infinite world grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Column index.
    pub tx: i32,
    /// Row index.
    pub ty: i32,
}

impl TileCoord {
    /// Creates a tile coordinate.
    pub const fn new(tx: i32, ty: i32) -> Self {
        Self { tx, ty }
    }

    /// The tile at offset `(dx, dy)` from this one, or `None` past the edge
    /// of the `i32` grid.
    pub fn offset(self, dx: i32, dy: i32) -> Option<Self> {
        Some(Self {
            tx: self.tx.checked_add(dx)?,
            ty: self.ty.checked_add(dy)?,
        })
    }
}

/// Maps between grid indices and world coordinates for one tile.
///
/// Sample `(0, 0)` sits on the tile's minimum corner and sample
/// `(resolution - 1, resolution - 1)` on its maximum corner, so neighbouring
/// tiles sample their shared edge at identical world positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileFrame {
    /// Tile being generated.
    pub coord: TileCoord,
    /// Edge length in world units.
    pub tile_size: f64,
    /// Samples per edge.
    pub resolution: usize,
}

impl TileFrame {
    /// Creates a frame for `coord`.
    pub fn new(coord: TileCoord, tile_size: f64, resolution: usize) -> Self {
        Self {
            coord,
            tile_size,
            resolution,
        }
    }

    /// World units between adjacent samples.
    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.tile_size / (self.resolution.max(2) - 1) as f64
    }

    /// Area of one grid cell in world units squared.
    #[inline]
    pub fn cell_area(&self) -> f64 {
        self.cell_size() * self.cell_size()
    }

    /// World coordinate of the tile's minimum corner.
    #[inline]
    pub fn origin(&self) -> Coord<f64> {
        coord! {
            x: self.coord.tx as f64 * self.tile_size,
            y: self.coord.ty as f64 * self.tile_size,
        }
    }

    /// World coordinate of a (possibly fractional) grid position.
    #[inline]
    pub fn to_world(&self, gx: f64, gy: f64) -> Coord<f64> {
        let n = (self.resolution.max(2) - 1) as f64;
        coord! {
            x: (self.coord.tx as f64 + gx / n) * self.tile_size,
            y: (self.coord.ty as f64 + gy / n) * self.tile_size,
        }
    }

    /// World coordinate of a cell center.
    #[inline]
    pub fn cell_to_world(&self, x: usize, y: usize) -> Coord<f64> {
        self.to_world(x as f64, y as f64)
    }

    /// Fractional grid position of a world coordinate.
    #[inline]
    pub fn to_grid(&self, c: Coord<f64>) -> (f64, f64) {
        let origin = self.origin();
        let cs = self.cell_size();
        ((c.x - origin.x) / cs, (c.y - origin.y) / cs)
    }

    /// Nearest grid cell to a world coordinate, clamped into the tile.
    pub fn nearest_cell(&self, c: Coord<f64>) -> (usize, usize) {
        let (gx, gy) = self.to_grid(c);
        let max = (self.resolution - 1) as f64;
        (
            gx.round().clamp(0.0, max) as usize,
            gy.round().clamp(0.0, max) as usize,
        )
    }

    /// Axis-aligned world-space bounds of the tile.
    pub fn bounds(&self) -> Rect<f64> {
        let min = self.origin();
        let max = coord! {
            x: (self.coord.tx as f64 + 1.0) * self.tile_size,
            y: (self.coord.ty as f64 + 1.0) * self.tile_size,
        };
        Rect::new(min, max)
    }
}

/// A `resolution x resolution` grid of normalized elevations, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Heightfield {
    resolution: usize,
    values: Vec<f64>,
}

impl Heightfield {
    /// Wraps row-major samples.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != resolution * resolution`.
    pub fn new(resolution: usize, values: Vec<f64>) -> Self {
        assert_eq!(
            values.len(),
            resolution * resolution,
            "heightfield needs resolution^2 samples"
        );
        Self { resolution, values }
    }

    /// A grid with every sample set to `value`.
    pub fn filled(resolution: usize, value: f64) -> Self {
        Self::new(resolution, vec![value; resolution * resolution])
    }

    /// Builds a grid by evaluating `f(x, y)` for every cell.
    pub fn from_fn(resolution: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(resolution * resolution);
        for y in 0..resolution {
            for x in 0..resolution {
                values.push(f(x, y));
            }
        }
        Self { resolution, values }
    }

    /// Samples per edge.
    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.resolution && y < self.resolution);
        y * self.resolution + x
    }

    /// Elevation at `(x, y)`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.values[self.index(x, y)]
    }

    /// Overwrites the elevation at `(x, y)`.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        let idx = self.index(x, y);
        self.values[idx] = value;
    }

    /// Elevation at signed coordinates, `None` outside the grid.
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64) -> Option<f64> {
        self.in_bounds(x, y)
            .then(|| self.values[y as usize * self.resolution + x as usize])
    }

    /// Whether signed coordinates fall inside the grid.
    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.resolution && (y as usize) < self.resolution
    }

    /// Whether `(x, y)` lies on the outermost ring of cells.
    #[inline]
    pub fn is_border(&self, x: usize, y: usize) -> bool {
        x == 0 || y == 0 || x + 1 == self.resolution || y + 1 == self.resolution
    }

    /// Bilinearly interpolated elevation at a fractional grid position,
    /// clamped to the grid.
    pub fn sample(&self, gx: f64, gy: f64) -> f64 {
        let max = (self.resolution - 1) as f64;
        let gx = gx.clamp(0.0, max);
        let gy = gy.clamp(0.0, max);
        let x0 = gx.floor() as usize;
        let y0 = gy.floor() as usize;
        let x1 = (x0 + 1).min(self.resolution - 1);
        let y1 = (y0 + 1).min(self.resolution - 1);
        let fx = gx - x0 as f64;
        let fy = gy - y0 as f64;
        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x1, y0) * fx;
        let bottom = self.get(x0, y1) * (1.0 - fx) + self.get(x1, y1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Height gradient per cell via central differences (one-sided at edges).
    pub fn gradient(&self, x: usize, y: usize) -> (f64, f64) {
        let last = self.resolution - 1;
        let (xl, xr) = (x.saturating_sub(1), (x + 1).min(last));
        let (yu, yd) = (y.saturating_sub(1), (y + 1).min(last));
        let dx = (self.get(xr, y) - self.get(xl, y)) / (xr - xl).max(1) as f64;
        let dy = (self.get(x, yd) - self.get(x, yu)) / (yd - yu).max(1) as f64;
        (dx, dy)
    }

    /// Gradient magnitude at `(x, y)`.
    #[inline]
    pub fn slope(&self, x: usize, y: usize) -> f64 {
        let (dx, dy) = self.gradient(x, y);
        dx.hypot(dy)
    }

    /// Clamps every sample into `[0, 1]`.
    pub fn clamp_unit(&mut self) {
        for v in &mut self.values {
            *v = v.clamp(0.0, 1.0);
        }
    }

    /// Row-major samples.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Mutable row-major samples.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// The grid as nested rows, the shape persisted with a tile.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.values
            .chunks(self.resolution)
            .map(<[f64]>::to_vec)
            .collect()
    }
}

/// A boolean mask over the grid, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellMask {
    resolution: usize,
    bits: Vec<bool>,
}

impl CellMask {
    /// Builds a mask by evaluating `f(x, y)` per cell.
    pub fn from_fn(resolution: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut bits = Vec::with_capacity(resolution * resolution);
        for y in 0..resolution {
            for x in 0..resolution {
                bits.push(f(x, y));
            }
        }
        Self { resolution, bits }
    }

    /// Cells at or above the water level.
    pub fn land(heights: &Heightfield, water_level: f64) -> Self {
        Self::from_fn(heights.resolution(), |x, y| heights.get(x, y) >= water_level)
    }

    /// Whether `(x, y)` is set.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.bits[y * self.resolution + x]
    }

    /// Whether signed `(x, y)` is inside the grid and set.
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.resolution
            && (y as usize) < self.resolution
            && self.bits[y as usize * self.resolution + x as usize]
    }

    /// Number of set cells.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }
}

/// Connected components of the set cells in `mask`, each listed in BFS order.
///
/// Components are discovered in row-major order of their first cell, so the
/// output order is deterministic.
pub fn connected_regions(
    mask: &CellMask,
    neighbors: &[(i64, i64)],
) -> Vec<Vec<(usize, usize)>> {
    let n = mask.resolution;
    let mut visited = vec![false; n * n];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..n {
        for x in 0..n {
            let idx = y * n + x;
            if visited[idx] || !mask.bits[idx] {
                continue;
            }
            visited[idx] = true;
            queue.push_back((x, y));
            let mut region = Vec::new();
            while let Some((cx, cy)) = queue.pop_front() {
                region.push((cx, cy));
                for &(dx, dy) in neighbors {
                    let nx = cx as i64 + dx;
                    let ny = cy as i64 + dy;
                    if !mask.get_signed(nx, ny) {
                        continue;
                    }
                    let nidx = ny as usize * n + nx as usize;
                    if !visited[nidx] {
                        visited[nidx] = true;
                        queue.push_back((nx as usize, ny as usize));
                    }
                }
            }
            regions.push(region);
        }
    }

    regions
}

/// Cells of `region` with at least one 4-neighbor outside `mask` (grid edges
/// count as outside).
pub fn boundary_cells(region: &[(usize, usize)], mask: &CellMask) -> Vec<(usize, usize)> {
    region
        .iter()
        .copied()
        .filter(|&(x, y)| {
            NEIGHBORS_4
                .iter()
                .any(|&(dx, dy)| !mask.get_signed(x as i64 + dx, y as i64 + dy))
        })
        .collect()
}
