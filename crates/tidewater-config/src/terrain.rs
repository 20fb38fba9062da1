//! Terrain generation parameters.
//!
//! A [`TerrainConfig`] is built once by the caller (preset plus seed jitter) and
//! passed unchanged through every phase of a generation call. Lengths expressed
//! in `*_cells` are multiples of one grid cell and scale with `tile_size` and
//! `resolution`; heights are on the normalized `[0, 1]` scale.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// World archetype selecting the geographic mask applied after noise synthesis.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorldType {
    /// Open coastline, no reshaping.
    #[default]
    Coastal,
    /// Single landmass surrounded by ocean.
    Island,
    /// Landlocked terrain.
    Inland,
    /// Tongue of land reaching into the sea.
    Peninsula,
    /// Coast with a sheltered harbor basin.
    BayHarbor,
    /// Terrain organised around a river corridor.
    RiverValley,
    /// Land bordering a large lake.
    Lakefront,
    /// River mouth lowlands.
    Delta,
}

impl WorldType {
    /// Every known world type, in declaration order.
    pub const ALL: [WorldType; 8] = [
        WorldType::Coastal,
        WorldType::Island,
        WorldType::Inland,
        WorldType::Peninsula,
        WorldType::BayHarbor,
        WorldType::RiverValley,
        WorldType::Lakefront,
        WorldType::Delta,
    ];

    /// Snake-case tag used in config files and on the wire.
    pub fn tag(self) -> &'static str {
        match self {
            WorldType::Coastal => "coastal",
            WorldType::Island => "island",
            WorldType::Inland => "inland",
            WorldType::Peninsula => "peninsula",
            WorldType::BayHarbor => "bay_harbor",
            WorldType::RiverValley => "river_valley",
            WorldType::Lakefront => "lakefront",
            WorldType::Delta => "delta",
        }
    }

    /// Looks up a world type by tag. Unknown tags map to [`WorldType::Coastal`],
    /// whose mask is the identity.
    pub fn from_tag(tag: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|wt| wt.tag() == tag)
            .unwrap_or_default()
    }
}

/// Immutable parameters for one generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    /// World seed. Same seed and coordinates always give the same tile.
    pub seed: u64,
    /// Edge length of a tile in world units.
    pub tile_size: f64,
    /// Samples per tile edge. Adjacent tiles share their edge samples.
    pub resolution: usize,
    /// Fractal noise parameters.
    pub noise: NoiseConfig,
    /// Normalized land/water threshold shared by every extractor.
    pub water_level: f64,
    /// Geographic mask selector.
    pub world_type: WorldType,
    /// Hydraulic erosion pass.
    pub erosion: ErosionConfig,
    /// Coastline polygonisation.
    pub coastline: CoastlineConfig,
    /// Bay detection and carving.
    pub bay: BayConfig,
    /// Barrier island chains.
    pub barrier_island: BarrierIslandConfig,
    /// River tracing.
    pub river: RiverConfig,
    /// River mouth landforms.
    pub delta: DeltaConfig,
    /// Lake extraction.
    pub lake: LakeConfig,
    /// Beach extraction.
    pub beach: BeachConfig,
    /// Elevation contours.
    pub contour: ContourConfig,
}

/// Fractal Brownian motion parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NoiseConfig {
    /// Number of octaves summed.
    pub octaves: u32,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// World units covered by one period of the lowest octave.
    pub scale: f64,
}

/// Raindrop erosion parameters. `iterations * resolution` drops are simulated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ErosionConfig {
    /// Run the erosion pass at all.
    pub enabled: bool,
    /// Drops per grid row.
    pub iterations: u32,
    /// Maximum steps a single drop may take.
    pub max_steps: u32,
    /// Starting water volume of each drop.
    pub initial_water: f64,
    /// Fraction of the capacity deficit picked up per step.
    pub erosion_rate: f64,
    /// Fraction of the capacity surplus dropped per step.
    pub deposition_rate: f64,
    /// Fraction of water lost per step.
    pub evaporation: f64,
    /// Drops with less water than this stop.
    pub min_water: f64,
    /// Sediment capacity per unit of slope and water.
    pub capacity_factor: f64,
}

/// Coastline extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoastlineConfig {
    /// Land regions smaller than this are ignored.
    pub min_region_cells: usize,
    /// Simplification tolerance.
    pub simplify_cells: f64,
    /// Apply fractal midpoint displacement to every ring.
    pub fractal_detail: bool,
    /// Subdivision passes of the midpoint displacement.
    pub fractal_iterations: u32,
    /// Jitter amplitude of the first pass; halves every pass.
    pub fractal_amplitude_cells: f64,
}

/// Bay extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BayConfig {
    /// Run bay detection.
    pub enabled: bool,
    /// Ring points on each side used to estimate curvature.
    pub curvature_window: usize,
    /// Minimum signed curvature (sine of the turn) to count as concave.
    pub min_curvature: f64,
    /// Minimum bend at the apex, in degrees.
    pub min_concavity_angle: f64,
    /// Smallest accepted bay area.
    pub min_area_cells: f64,
    /// Upper bound of `depth / entrance_width`.
    pub max_depth_ratio: f64,
    /// Bays below this area are coves.
    pub cove_max_cells: f64,
    /// Bays below this area (and above a cove) are bays; larger ones are harbors.
    pub bay_max_cells: f64,
    /// River mouth detection: flow above `factor * resolution` near the apex.
    pub river_mouth_flow_factor: f64,
    /// Extra depth multiplier applied to river-mouth bays.
    pub river_mouth_bonus: f64,
    /// Maximum carve depth of a bay (normalized height).
    pub base_depth: f64,
    /// Perpendicular jitter as a fraction of the entrance width.
    pub jitter: f64,
    /// Points sampled along the bay outline.
    pub outline_points: usize,
    /// Samples in the entrance-to-apex depth profile.
    pub profile_samples: usize,
}

/// Barrier island parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BarrierIslandConfig {
    /// Run barrier island extraction.
    pub enabled: bool,
    /// Only shores with a gradient below this qualify.
    pub max_slope: f64,
    /// Minimum number of shore cells in a segment.
    pub min_segment_cells: usize,
    /// Distance from the shore to the lagoon side of the islands.
    pub offset_cells: f64,
    /// Island width.
    pub width_cells: f64,
    /// Random perturbation of both island sides.
    pub jitter_cells: f64,
    /// Longest fetch measured for the wave energy proxy.
    pub max_fetch_cells: usize,
    /// Minimum spacing between inlets, in shore cells.
    pub min_inlet_spacing: usize,
    /// Shortest island span, in shore cells.
    pub min_island_cells: usize,
    /// Inlet width at zero wave energy.
    pub min_inlet_width_cells: f64,
    /// Inlet width at full wave energy.
    pub max_inlet_width_cells: f64,
    /// Buffer around islands intersected with the lagoon to form tidal flats.
    pub tidal_flat_cells: f64,
}

/// River extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RiverConfig {
    /// Minimum flow accumulation of a river cell.
    pub flow_threshold: f64,
    /// Rivers with fewer cells are discarded.
    pub min_length: usize,
    /// Steps a river may continue downhill after leaving candidate cells.
    pub downhill_extension_steps: usize,
    /// Width at `flow_threshold`.
    pub min_width_cells: f64,
    /// Width at `20 * flow_threshold` and above.
    pub max_width_cells: f64,
    /// Douglas-Peucker tolerance applied before smoothing.
    pub simplify_cells: f64,
    /// Chaikin corner-cutting passes.
    pub smoothing_iterations: u32,
    /// Endpoints this close to a coastline are moved onto it.
    pub snap_distance_cells: f64,
}

/// Delta and estuary parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeltaConfig {
    /// Run delta/estuary generation.
    pub enabled: bool,
    /// Minimum flow at the river terminus.
    pub min_flow: f64,
    /// Offshore cells sampled along the flow direction.
    pub sample_cells: usize,
    /// Offshore depth that, together with a fast drop, makes an estuary.
    pub estuary_depth: f64,
    /// Average depth increase per cell that counts as fast-dropping.
    pub estuary_drop_rate: f64,
    /// Terminus flow at which a gentle shelf builds a bird's-foot delta.
    pub birds_foot_flow: f64,
    /// Offshore depth gain per cell still considered gentle.
    pub gentle_slope: f64,
    /// Length of estuary funnels and distributary channels.
    pub channel_length_cells: f64,
    /// Estuary mouth width as a multiple of the river width.
    pub estuary_widening: f64,
    /// Width of estuarine wetland strips.
    pub wetland_strip_cells: f64,
    /// Deltaic wetlands must average below `water_level` plus this.
    pub wetland_max_height: f64,
}

/// Lake parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LakeConfig {
    /// Minimum region size.
    pub min_area_cells: usize,
    /// Minimum average depth below water level.
    pub min_depth: f64,
    /// Concave hull concavity for lake outlines.
    pub concavity: f64,
    /// Lakes up to this size are ponds.
    pub pond_max_cells: usize,
    /// Bounding-box elongation that marks oxbow and rift lakes.
    pub elongated_ratio: f64,
    /// Rim height above water level that separates rifts from oxbows.
    pub rift_rim_height: f64,
    /// Rim height above water level required for a crater lake.
    pub crater_rim_height: f64,
    /// Circularity required for a crater lake.
    pub crater_circularity: f64,
    /// Circularity required for a kettle lake.
    pub kettle_circularity: f64,
}

/// Beach parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BeachConfig {
    /// Run beach extraction.
    pub enabled: bool,
    /// Height band above water level where sand can form.
    pub height_band: f64,
    /// Scales `height_band`.
    pub width_multiplier: f64,
    /// Steeper cells never become beach.
    pub max_slope: f64,
    /// Concave hull concavity for beach outlines.
    pub concavity: f64,
    /// Smallest region or segment kept.
    pub min_cells: usize,
    /// Upper bound of a single beach segment.
    pub max_segment_cells: usize,
    /// Smallest gap left between segments of one region.
    pub min_gap_cells: usize,
    /// Largest gap left between segments of one region.
    pub max_gap_cells: usize,
    /// Drop segments overlapping river buffers above this fraction.
    pub river_overlap_max: f64,
    /// Drop segments overlapping lagoons above this fraction.
    pub lagoon_overlap_max: f64,
    /// Drop segments overlapping bays above this fraction.
    pub bay_overlap_max: f64,
    /// Segments overlapping bays above this fraction (and under the max) are bay beaches.
    pub bay_overlap_min: f64,
    /// Segments overlapping lakes above this fraction are lake beaches.
    pub lake_overlap_min: f64,
    /// Lake beaches this close to a river buffer become river beaches.
    pub river_proximity_cells: f64,
    /// Share of a lake's perimeter that beaches may cover.
    pub lake_perimeter_cap: f64,
}

/// Contour parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContourConfig {
    /// Elevation levels traced.
    pub levels: Vec<f64>,
    /// Segment cap per level.
    pub max_segments_per_level: usize,
}

// --- Default implementations ---

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tile_size: 1000.0,
            resolution: 64,
            noise: NoiseConfig::default(),
            water_level: 0.45,
            world_type: WorldType::default(),
            erosion: ErosionConfig::default(),
            coastline: CoastlineConfig::default(),
            bay: BayConfig::default(),
            barrier_island: BarrierIslandConfig::default(),
            river: RiverConfig::default(),
            delta: DeltaConfig::default(),
            lake: LakeConfig::default(),
            beach: BeachConfig::default(),
            contour: ContourConfig::default(),
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            scale: 1600.0,
        }
    }
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            iterations: 8,
            max_steps: 48,
            initial_water: 1.0,
            erosion_rate: 0.3,
            deposition_rate: 0.3,
            evaporation: 0.05,
            min_water: 0.01,
            capacity_factor: 4.0,
        }
    }
}

impl Default for CoastlineConfig {
    fn default() -> Self {
        Self {
            min_region_cells: 4,
            simplify_cells: 1.2,
            fractal_detail: true,
            fractal_iterations: 3,
            fractal_amplitude_cells: 0.35,
        }
    }
}

impl Default for BayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            curvature_window: 3,
            min_curvature: 0.2,
            min_concavity_angle: 25.0,
            min_area_cells: 6.0,
            max_depth_ratio: 2.5,
            cove_max_cells: 20.0,
            bay_max_cells: 80.0,
            river_mouth_flow_factor: 0.5,
            river_mouth_bonus: 0.5,
            base_depth: 0.06,
            jitter: 0.08,
            outline_points: 12,
            profile_samples: 8,
        }
    }
}

impl Default for BarrierIslandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_slope: 0.02,
            min_segment_cells: 12,
            offset_cells: 2.5,
            width_cells: 1.2,
            jitter_cells: 0.25,
            max_fetch_cells: 20,
            min_inlet_spacing: 8,
            min_island_cells: 4,
            min_inlet_width_cells: 0.5,
            max_inlet_width_cells: 2.0,
            tidal_flat_cells: 0.6,
        }
    }
}

impl Default for RiverConfig {
    fn default() -> Self {
        Self {
            flow_threshold: 40.0,
            min_length: 8,
            downhill_extension_steps: 12,
            min_width_cells: 0.3,
            max_width_cells: 1.5,
            simplify_cells: 0.5,
            smoothing_iterations: 2,
            snap_distance_cells: 3.0,
        }
    }
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_flow: 80.0,
            sample_cells: 6,
            estuary_depth: 0.12,
            estuary_drop_rate: 0.02,
            birds_foot_flow: 200.0,
            gentle_slope: 0.01,
            channel_length_cells: 6.0,
            estuary_widening: 3.0,
            wetland_strip_cells: 1.0,
            wetland_max_height: 0.03,
        }
    }
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            min_area_cells: 6,
            min_depth: 0.01,
            concavity: 1.5,
            pond_max_cells: 20,
            elongated_ratio: 3.0,
            rift_rim_height: 0.15,
            crater_rim_height: 0.1,
            crater_circularity: 0.75,
            kettle_circularity: 0.6,
        }
    }
}

impl Default for BeachConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            height_band: 0.04,
            width_multiplier: 1.0,
            max_slope: 0.06,
            concavity: 1.5,
            min_cells: 4,
            max_segment_cells: 40,
            min_gap_cells: 2,
            max_gap_cells: 6,
            river_overlap_max: 0.3,
            lagoon_overlap_max: 0.5,
            bay_overlap_max: 0.4,
            bay_overlap_min: 0.1,
            lake_overlap_min: 0.3,
            river_proximity_cells: 2.0,
            lake_perimeter_cap: 0.2,
        }
    }
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            levels: vec![0.3, 0.4, 0.5, 0.6, 0.7, 0.8],
            max_segments_per_level: 2000,
        }
    }
}

impl TerrainConfig {
    /// Size of one grid cell in world units.
    pub fn cell_size(&self) -> f64 {
        self.tile_size / (self.resolution.max(2) - 1) as f64
    }

    /// Checks the parameters the pipeline cannot work around.
    ///
    /// Persistence and lacunarity are deliberately not range-checked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution < 8 {
            return Err(ConfigError::Invalid {
                field: "terrain.resolution",
                reason: format!("must be at least 8, got {}", self.resolution),
            });
        }
        if !self.tile_size.is_finite() || self.tile_size <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "terrain.tile_size",
                reason: format!("must be positive, got {}", self.tile_size),
            });
        }
        if !self.noise.scale.is_finite() || self.noise.scale <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "terrain.noise.scale",
                reason: format!("must be positive, got {}", self.noise.scale),
            });
        }
        if self.noise.octaves == 0 {
            return Err(ConfigError::Invalid {
                field: "terrain.noise.octaves",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.water_level) {
            return Err(ConfigError::Invalid {
                field: "terrain.water_level",
                reason: format!("must lie in [0, 1], got {}", self.water_level),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TerrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_cell_size_spans_tile() {
        let config = TerrainConfig {
            tile_size: 630.0,
            resolution: 64,
            ..Default::default()
        };
        assert!((config.cell_size() * 63.0 - 630.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_tiny_resolution() {
        let config = TerrainConfig {
            resolution: 4,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("terrain.resolution"));
    }

    #[test]
    fn test_rejects_water_level_out_of_range() {
        let config = TerrainConfig {
            water_level: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "terrain.water_level",
                ..
            })
        ));
    }

    #[test]
    fn test_accepts_unusual_persistence() {
        let mut config = TerrainConfig::default();
        config.noise.persistence = 1.7;
        config.noise.lacunarity = 0.3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_world_type_tags_round_trip() {
        for wt in WorldType::ALL {
            assert_eq!(WorldType::from_tag(wt.tag()), wt);
        }
    }

    #[test]
    fn test_unknown_world_type_falls_back_to_identity_mask() {
        assert_eq!(WorldType::from_tag("volcanic_archipelago"), WorldType::Coastal);
    }
}
