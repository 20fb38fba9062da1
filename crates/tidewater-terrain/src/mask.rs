//! Geographic masks: world-type-specific reshaping of the raw noise field.
//!
//! The set of world types is closed, so dispatch is a `match` over
//! [`WorldType`] rather than a runtime registry. Every mask is a pure function
//! of world position and seed, which keeps shared tile edges identical.

use noise::{NoiseFn, Simplex};
use tidewater_config::WorldType;

use crate::grid::{Heightfield, TileFrame};
use crate::seed::{Phase, derive_world_seed};

/// Everything a mask may depend on besides the heightfield itself.
#[derive(Clone, Copy, Debug)]
pub struct MaskContext {
    /// Tile being shaped.
    pub frame: TileFrame,
    /// World seed.
    pub seed: u64,
}

impl MaskContext {
    fn shape_noise(&self) -> Simplex {
        Simplex::new(derive_world_seed(self.seed, Phase::Mask) as u32)
    }

    /// Characteristic radius of masked landforms, in world units.
    fn radius(&self) -> f64 {
        self.frame.tile_size * 1.5
    }
}

/// Signature shared by all masks. Results may leave `[0, 1]`; the caller clamps.
pub type MaskFn = fn(&mut Heightfield, &MaskContext);

/// The mask function for a world type.
pub fn mask_for(world_type: WorldType) -> MaskFn {
    match world_type {
        WorldType::Island => island_mask,
        WorldType::Peninsula => peninsula_mask,
        WorldType::Inland => inland_mask,
        WorldType::Lakefront => lakefront_mask,
        WorldType::BayHarbor => bay_harbor_mask,
        WorldType::Coastal | WorldType::RiverValley | WorldType::Delta => identity_mask,
    }
}

/// Applies the mask for `world_type` in place.
pub fn apply_mask(world_type: WorldType, heights: &mut Heightfield, ctx: &MaskContext) {
    mask_for(world_type)(heights, ctx);
}

fn identity_mask(_heights: &mut Heightfield, _ctx: &MaskContext) {}

#[inline]
fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn apply_world_fn(heights: &mut Heightfield, frame: &TileFrame, f: impl Fn(f64, f64, f64) -> f64) {
    let n = heights.resolution();
    for y in 0..n {
        for x in 0..n {
            let w = frame.cell_to_world(x, y);
            let h = heights.get(x, y);
            heights.set(x, y, f(w.x, w.y, h));
        }
    }
}

/// Radial falloff around the world origin. The ellipse axes and an
/// angle-dependent radius wobble come from the seeded noise.
fn island_mask(heights: &mut Heightfield, ctx: &MaskContext) {
    let noise = ctx.shape_noise();
    let radius = ctx.radius();
    let stretch = noise.get([0.5, 0.5]) * 0.25;
    let rx = radius * (1.0 + stretch);
    let ry = radius * (1.0 - stretch);
    apply_world_fn(heights, &ctx.frame, |wx, wy, h| {
        let angle = wy.atan2(wx);
        let wobble = 1.0 + 0.18 * noise.get([angle.cos() * 1.7 + 3.1, angle.sin() * 1.7 - 2.3]);
        let d = ((wx / rx).powi(2) + (wy / ry).powi(2)).sqrt() / wobble;
        h * (1.0 - smoothstep(0.55, 1.15, d))
    });
}

/// A tongue of land running along +x with falloff to both sides.
fn peninsula_mask(heights: &mut Heightfield, ctx: &MaskContext) {
    let noise = ctx.shape_noise();
    let half_width = ctx.radius() * 0.5;
    let root = -ctx.radius();
    apply_world_fn(heights, &ctx.frame, |wx, wy, h| {
        let meander = noise.get([wx / (half_width * 4.0), 7.7]) * half_width * 0.4;
        let lateral = 1.0 - smoothstep(0.6, 1.3, (wy - meander).abs() / half_width);
        let mainland = smoothstep(root - half_width, root, -wx);
        h * lateral.max(mainland)
    });
}

/// Raises the field so most of the tile is land.
fn inland_mask(heights: &mut Heightfield, _ctx: &MaskContext) {
    for v in heights.values_mut() {
        *v = 0.35 + 0.65 * *v;
    }
}

/// A broad basin near the origin that fills as a lake.
fn lakefront_mask(heights: &mut Heightfield, ctx: &MaskContext) {
    let radius = ctx.radius() * 0.4;
    apply_world_fn(heights, &ctx.frame, |wx, wy, h| {
        let d2 = (wx * wx + wy * wy) / (radius * radius);
        0.25 + 0.75 * h - 0.3 * (-d2).exp()
    });
}

/// An elliptical harbor basin cut into the coast near the origin.
fn bay_harbor_mask(heights: &mut Heightfield, ctx: &MaskContext) {
    let rx = ctx.radius() * 0.35;
    let ry = ctx.radius() * 0.6;
    apply_world_fn(heights, &ctx.frame, |wx, wy, h| {
        let d2 = (wx / rx).powi(2) + ((wy + ry * 0.5) / ry).powi(2);
        h - 0.25 * (-d2).exp()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileCoord;

    fn ctx(tx: i32, ty: i32) -> MaskContext {
        MaskContext {
            frame: TileFrame::new(TileCoord::new(tx, ty), 1000.0, 16),
            seed: 9,
        }
    }

    #[test]
    fn test_identity_for_coastal() {
        let original = Heightfield::from_fn(16, |x, y| (x * y) as f64 / 225.0);
        let mut masked = original.clone();
        apply_mask(WorldType::Coastal, &mut masked, &ctx(0, 0));
        assert_eq!(original, masked);
    }

    #[test]
    fn test_island_sinks_far_tiles() {
        let mut far = Heightfield::filled(16, 0.8);
        apply_mask(WorldType::Island, &mut far, &ctx(6, 6));
        assert!(far.values().iter().all(|&v| v < 1e-9));

        let mut center = Heightfield::filled(16, 0.8);
        apply_mask(WorldType::Island, &mut center, &ctx(0, 0));
        assert!(center.get(0, 0) > 0.7, "origin keeps its height");
    }

    #[test]
    fn test_island_mask_is_continuous_across_tiles() {
        let mut left = Heightfield::filled(16, 0.8);
        let mut right = Heightfield::filled(16, 0.8);
        apply_mask(WorldType::Island, &mut left, &ctx(0, 0));
        apply_mask(WorldType::Island, &mut right, &ctx(1, 0));
        for y in 0..16 {
            assert!((left.get(15, y) - right.get(0, y)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_inland_raises_field() {
        let mut hf = Heightfield::filled(16, 0.0);
        apply_mask(WorldType::Inland, &mut hf, &ctx(0, 0));
        assert!(hf.values().iter().all(|&v| (v - 0.35).abs() < 1e-12));
    }

    #[test]
    fn test_every_world_type_has_a_mask() {
        for wt in WorldType::ALL {
            let mut hf = Heightfield::filled(16, 0.5);
            apply_mask(wt, &mut hf, &ctx(0, 0));
            assert!(hf.values().iter().all(|v| v.is_finite()));
        }
    }
}
