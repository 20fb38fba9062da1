//! Multi-octave fractal Brownian motion (fBm) heightfield synthesis.
//!
//! Noise is sampled in world space, so a world position has the same height
//! no matter which tile asks for it.

use noise::{NoiseFn, Simplex};
use tidewater_config::{NoiseConfig, TerrainConfig};

use crate::grid::{Heightfield, TileFrame};

/// fBm parameters resolved for one world seed.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightmapParams {
    pub seed: u64,
    pub octaves: u32,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Cycles per world unit of the lowest octave.
    pub base_frequency: f64,
}

impl HeightmapParams {
    pub fn from_config(seed: u64, noise: &NoiseConfig) -> Self {
        Self {
            seed,
            octaves: noise.octaves,
            lacunarity: noise.lacunarity,
            persistence: noise.persistence,
            base_frequency: 1.0 / noise.scale,
        }
    }

    /// `(frequency, amplitude)` of every octave, lowest first.
    fn octaves(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (0..self.octaves).scan((self.base_frequency, 1.0), |state, _| {
            let current = *state;
            state.0 *= self.lacunarity;
            state.1 *= self.persistence;
            Some(current)
        })
    }
}

/// Normalized fBm over simplex noise.
///
/// The octave sum is divided by the total amplitude, giving `[-1, 1]`, then
/// remapped to `[0, 1]`.
pub struct HeightmapSampler {
    noise: Simplex,
    params: HeightmapParams,
    total_amplitude: f64,
}

impl HeightmapSampler {
    pub fn new(params: HeightmapParams) -> Self {
        // Fold the high bits in so seeds differing only above bit 32 still diverge.
        let noise = Simplex::new((params.seed ^ (params.seed >> 32)) as u32);
        let total_amplitude = params.octaves().map(|(_, amp)| amp.abs()).sum();
        Self {
            noise,
            params,
            total_amplitude,
        }
    }

    /// Normalized height in `[0, 1]` at a world coordinate.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        if self.total_amplitude <= 0.0 {
            return 0.5;
        }
        let sum: f64 = self
            .params
            .octaves()
            .map(|(freq, amp)| self.noise.get([x * freq, y * freq]) * amp)
            .sum();
        ((sum / self.total_amplitude + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    pub fn params(&self) -> &HeightmapParams {
        &self.params
    }

    /// Samples every cell of a tile.
    pub fn fill(&self, frame: &TileFrame) -> Heightfield {
        Heightfield::from_fn(frame.resolution, |x, y| {
            let w = frame.cell_to_world(x, y);
            self.sample(w.x, w.y)
        })
    }
}

/// Heightfield for one tile. A pure function of its inputs.
pub fn generate_heightfield(config: &TerrainConfig, frame: &TileFrame) -> Heightfield {
    HeightmapSampler::new(HeightmapParams::from_config(config.seed, &config.noise)).fill(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileCoord;

    fn config(seed: u64) -> TerrainConfig {
        TerrainConfig {
            seed,
            resolution: 17,
            tile_size: 800.0,
            ..Default::default()
        }
    }

    fn tile(config: &TerrainConfig, tx: i32, ty: i32) -> Heightfield {
        let frame = TileFrame::new(TileCoord::new(tx, ty), config.tile_size, config.resolution);
        generate_heightfield(config, &frame)
    }

    #[test]
    fn test_tile_is_reproducible() {
        let a = tile(&config(42), 3, -7);
        let b = tile(&config(42), 3, -7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_changes_tile() {
        assert_ne!(tile(&config(1), 0, 0), tile(&config(999), 0, 0));
        // Seeds equal in their low 32 bits still diverge.
        assert_ne!(tile(&config(5), 0, 0), tile(&config(5 | (1 << 40)), 0, 0));
    }

    #[test]
    fn test_heights_in_unit_range() {
        for (tx, ty) in [(0, 0), (-4, 2), (9, 9)] {
            let hf = tile(&config(3), tx, ty);
            assert!(hf.values().iter().all(|h| (0.0..=1.0).contains(h)));
        }
    }

    #[test]
    fn test_shared_edge_samples_identical() {
        let cfg = config(5);
        let left = tile(&cfg, 0, 0);
        let right = tile(&cfg, 1, 0);
        let below = tile(&cfg, 0, 1);
        let n = cfg.resolution;
        for i in 0..n {
            assert_eq!(left.get(n - 1, i).to_bits(), right.get(0, i).to_bits());
            assert_eq!(left.get(i, n - 1).to_bits(), below.get(i, 0).to_bits());
        }
    }

    #[test]
    fn test_octave_schedule() {
        let params = HeightmapParams {
            seed: 0,
            octaves: 3,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.01,
        };
        let octaves: Vec<_> = params.octaves().collect();
        assert_eq!(octaves, vec![(0.01, 1.0), (0.02, 0.5), (0.04, 0.25)]);
        let sampler = HeightmapSampler::new(params);
        assert!((sampler.total_amplitude - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_octaves_is_flat() {
        let sampler = HeightmapSampler::new(HeightmapParams {
            seed: 1,
            octaves: 0,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.01,
        });
        assert_eq!(sampler.sample(12.0, 34.0), 0.5);
    }
}
