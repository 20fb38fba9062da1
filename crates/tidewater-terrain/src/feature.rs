//! Vector landform features emitted by the extractors.
//!
//! A [`TerrainFeature`] pairs a world-space geometry with a typed property
//! record. The property enum is internally tagged with `feature_type`, which is
//! exactly the discriminator the GeoJSON output carries.

use geo::{LineString, Point, Polygon};
use serde::Serialize;

/// Discriminator of a [`TerrainFeature`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// Landmass outline.
    Coastline,
    /// Concave coastal inlet.
    Bay,
    /// Landlocked water body.
    Lake,
    /// River centerline.
    River,
    /// Delta distributary.
    DeltaChannel,
    /// Marsh along an estuary or between distributaries.
    Wetland,
    /// Widening river mouth.
    Estuary,
    /// Offshore sand island.
    BarrierIsland,
    /// Water enclosed behind barrier islands.
    Lagoon,
    /// Shallow flats where islands meet the lagoon.
    TidalFlat,
    /// Crest line along the seaward side of an island.
    DuneRidge,
    /// Gap between two barrier islands.
    Inlet,
    /// Sandy shore segment.
    Beach,
    /// Elevation isoline segment.
    Contour,
}

impl FeatureKind {
    /// Wire tag of this kind.
    pub fn tag(self) -> &'static str {
        match self {
            FeatureKind::Coastline => "coastline",
            FeatureKind::Bay => "bay",
            FeatureKind::Lake => "lake",
            FeatureKind::River => "river",
            FeatureKind::DeltaChannel => "delta_channel",
            FeatureKind::Wetland => "wetland",
            FeatureKind::Estuary => "estuary",
            FeatureKind::BarrierIsland => "barrier_island",
            FeatureKind::Lagoon => "lagoon",
            FeatureKind::TidalFlat => "tidal_flat",
            FeatureKind::DuneRidge => "dune_ridge",
            FeatureKind::Inlet => "inlet",
            FeatureKind::Beach => "beach",
            FeatureKind::Contour => "contour",
        }
    }
}

/// Geometry of a feature, in world coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureGeometry {
    /// A single location.
    Point(Point<f64>),
    /// An open polyline.
    LineString(LineString<f64>),
    /// A polygon with optional holes.
    Polygon(Polygon<f64>),
}

/// Size class of a bay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BayType {
    /// Small sheltered inlet.
    Cove,
    /// Medium inlet.
    Bay,
    /// Large inlet.
    Harbor,
}

/// Shape class of a lake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LakeType {
    /// Small lake of any shape.
    Pond,
    /// Round depression with a low rim.
    Kettle,
    /// Round depression with a high rim.
    Crater,
    /// Elongated lake with a low rim.
    Oxbow,
    /// Elongated lake in a steep trough.
    Rift,
    /// Irregular large lake.
    Glacial,
}

/// River mouth morphology.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaType {
    /// Drowned, funnel-shaped mouth over deep water.
    Estuary,
    /// Few long distributaries on a gentle shelf.
    BirdsFoot,
    /// Many short distributaries spread wide.
    Fan,
}

/// Setting of a wetland.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WetlandType {
    /// Strip along an estuary bank.
    Estuarine,
    /// Patch between delta distributaries.
    Deltaic,
}

/// Water body a beach borders. Exactly one per beach.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeachType {
    /// Open coast.
    Ocean,
    /// Inside a bay.
    Bay,
    /// Lake shore.
    Lake,
    /// River bank.
    River,
}

/// Coastline properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CoastlineProperties {
    /// Enclosed land area.
    pub area: f64,
    /// Outline length.
    pub perimeter: f64,
    /// Index of the landmass within the tile.
    pub landmass_index: usize,
}

/// Bay properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BayProperties {
    /// Water area.
    pub area: f64,
    /// Size class.
    pub bay_type: BayType,
    /// Distance between the two entrance points.
    pub entrance_width: f64,
    /// Distance from the entrance chord to the apex.
    pub depth: f64,
    /// `depth / entrance_width`.
    pub depth_ratio: f64,
    /// Bend of the coast at the apex, degrees.
    pub concavity_angle: f64,
    /// Whether significant flow drains into the apex.
    pub is_river_mouth: bool,
    /// Deepest carve below the surrounding terrain (normalized height).
    pub max_depth: f64,
    /// Water depth sampled from the entrance to the apex.
    pub depth_profile: Vec<f64>,
}

/// Lake properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LakeProperties {
    /// Water area.
    pub area: f64,
    /// Shoreline length.
    pub perimeter: f64,
    /// Shape class.
    pub lake_type: LakeType,
    /// Average depth below water level.
    pub mean_depth: f64,
    /// Deepest point below water level.
    pub max_depth: f64,
    /// `4 * pi * area / perimeter^2`.
    pub circularity: f64,
    /// Long over short bounding-box side.
    pub elongation: f64,
    /// Average height of the surrounding rim above water level.
    pub rim_height: f64,
    /// Grid cells in the region.
    pub cell_count: usize,
}

/// River properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RiverProperties {
    /// Index of the river within the tile.
    pub river_id: usize,
    /// Centerline length.
    pub length: f64,
    /// Channel width.
    pub width: f64,
    /// Largest flow accumulation along the path.
    pub max_flow: f64,
    /// Flow accumulation at the terminus.
    pub mouth_flow: f64,
    /// Whether the river ends in water.
    pub reaches_water: bool,
    /// Strahler-style stream order.
    pub stream_order: u32,
    /// River this one joins, if it ends at a junction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tributary_of: Option<usize>,
}

/// Delta distributary properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DeltaChannelProperties {
    /// Parent river.
    pub river_id: usize,
    /// Delta morphology.
    pub delta_type: DeltaType,
    /// Channel length.
    pub length: f64,
    /// Width where the channel leaves the river mouth.
    pub width_start: f64,
    /// Width at the channel tip.
    pub width_end: f64,
}

/// Wetland properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WetlandProperties {
    /// Marsh area.
    pub area: f64,
    /// Setting.
    pub wetland_type: WetlandType,
    /// Parent river.
    pub river_id: usize,
}

/// Estuary properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EstuaryProperties {
    /// Parent river.
    pub river_id: usize,
    /// Water area.
    pub area: f64,
    /// Funnel length.
    pub length: f64,
    /// Width where the river enters.
    pub head_width: f64,
    /// Width at the seaward end.
    pub mouth_width: f64,
}

/// Barrier island properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BarrierIslandProperties {
    /// Island area.
    pub area: f64,
    /// Length along the shore.
    pub length: f64,
    /// Shore segment the chain belongs to.
    pub chain_id: usize,
    /// Position of the island within its chain.
    pub island_index: usize,
}

/// Lagoon properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LagoonProperties {
    /// Water area.
    pub area: f64,
    /// Shore segment the lagoon belongs to.
    pub chain_id: usize,
}

/// Tidal flat properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TidalFlatProperties {
    /// Flat area.
    pub area: f64,
    /// Shore segment.
    pub chain_id: usize,
}

/// Dune ridge properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DuneRidgeProperties {
    /// Crest length.
    pub length: f64,
    /// Shore segment.
    pub chain_id: usize,
    /// Island carrying the ridge.
    pub island_index: usize,
}

/// Inlet properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InletProperties {
    /// Gap width.
    pub width: f64,
    /// Wave energy proxy in `[0, 1]`.
    pub wave_energy: f64,
    /// Shore segment.
    pub chain_id: usize,
}

/// Beach properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BeachProperties {
    /// Sand area.
    pub area: f64,
    /// Outline length.
    pub perimeter: f64,
    /// `2 * area / perimeter`.
    pub avg_width: f64,
    /// Water body bordered.
    pub beach_type: BeachType,
    /// Grid cells in the segment.
    pub cell_count: usize,
}

/// Contour properties.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContourProperties {
    /// Iso-elevation of the segment.
    pub elevation: f64,
    /// Segment length.
    pub length: f64,
}

/// Type-specific properties, tagged with `feature_type` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "feature_type", rename_all = "snake_case")]
pub enum FeatureProperties {
    /// See [`CoastlineProperties`].
    Coastline(CoastlineProperties),
    /// See [`BayProperties`].
    Bay(BayProperties),
    /// See [`LakeProperties`].
    Lake(LakeProperties),
    /// See [`RiverProperties`].
    River(RiverProperties),
    /// See [`DeltaChannelProperties`].
    DeltaChannel(DeltaChannelProperties),
    /// See [`WetlandProperties`].
    Wetland(WetlandProperties),
    /// See [`EstuaryProperties`].
    Estuary(EstuaryProperties),
    /// See [`BarrierIslandProperties`].
    BarrierIsland(BarrierIslandProperties),
    /// See [`LagoonProperties`].
    Lagoon(LagoonProperties),
    /// See [`TidalFlatProperties`].
    TidalFlat(TidalFlatProperties),
    /// See [`DuneRidgeProperties`].
    DuneRidge(DuneRidgeProperties),
    /// See [`InletProperties`].
    Inlet(InletProperties),
    /// See [`BeachProperties`].
    Beach(BeachProperties),
    /// See [`ContourProperties`].
    Contour(ContourProperties),
}

impl FeatureProperties {
    /// Discriminator of these properties.
    pub fn kind(&self) -> FeatureKind {
        match self {
            FeatureProperties::Coastline(_) => FeatureKind::Coastline,
            FeatureProperties::Bay(_) => FeatureKind::Bay,
            FeatureProperties::Lake(_) => FeatureKind::Lake,
            FeatureProperties::River(_) => FeatureKind::River,
            FeatureProperties::DeltaChannel(_) => FeatureKind::DeltaChannel,
            FeatureProperties::Wetland(_) => FeatureKind::Wetland,
            FeatureProperties::Estuary(_) => FeatureKind::Estuary,
            FeatureProperties::BarrierIsland(_) => FeatureKind::BarrierIsland,
            FeatureProperties::Lagoon(_) => FeatureKind::Lagoon,
            FeatureProperties::TidalFlat(_) => FeatureKind::TidalFlat,
            FeatureProperties::DuneRidge(_) => FeatureKind::DuneRidge,
            FeatureProperties::Inlet(_) => FeatureKind::Inlet,
            FeatureProperties::Beach(_) => FeatureKind::Beach,
            FeatureProperties::Contour(_) => FeatureKind::Contour,
        }
    }

    /// Overwrites the area of polygonal features; no-op for others.
    pub fn set_area(&mut self, area: f64) {
        match self {
            FeatureProperties::Coastline(p) => p.area = area,
            FeatureProperties::Bay(p) => p.area = area,
            FeatureProperties::Lake(p) => p.area = area,
            FeatureProperties::Wetland(p) => p.area = area,
            FeatureProperties::Estuary(p) => p.area = area,
            FeatureProperties::BarrierIsland(p) => p.area = area,
            FeatureProperties::Lagoon(p) => p.area = area,
            FeatureProperties::TidalFlat(p) => p.area = area,
            FeatureProperties::Beach(p) => {
                p.area = area;
                if p.perimeter > 0.0 {
                    p.avg_width = 2.0 * area / p.perimeter;
                }
            }
            _ => {}
        }
    }

    /// Overwrites the length of linear features; no-op for others.
    pub fn set_length(&mut self, length: f64) {
        match self {
            FeatureProperties::River(p) => p.length = length,
            FeatureProperties::DeltaChannel(p) => p.length = length,
            FeatureProperties::DuneRidge(p) => p.length = length,
            FeatureProperties::Contour(p) => p.length = length,
            _ => {}
        }
    }
}

/// One emitted landform. Immutable once emitted.
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainFeature {
    /// World-space geometry.
    pub geometry: FeatureGeometry,
    /// Typed properties.
    pub properties: FeatureProperties,
}

impl TerrainFeature {
    /// A polygon feature.
    pub fn polygon(polygon: Polygon<f64>, properties: FeatureProperties) -> Self {
        Self {
            geometry: FeatureGeometry::Polygon(polygon),
            properties,
        }
    }

    /// A linestring feature.
    pub fn line(line: LineString<f64>, properties: FeatureProperties) -> Self {
        Self {
            geometry: FeatureGeometry::LineString(line),
            properties,
        }
    }

    /// A point feature.
    pub fn point(point: Point<f64>, properties: FeatureProperties) -> Self {
        Self {
            geometry: FeatureGeometry::Point(point),
            properties,
        }
    }

    /// Discriminator of this feature.
    pub fn kind(&self) -> FeatureKind {
        self.properties.kind()
    }

    /// The polygon, if this is a polygonal feature.
    pub fn as_polygon(&self) -> Option<&Polygon<f64>> {
        match &self.geometry {
            FeatureGeometry::Polygon(p) => Some(p),
            _ => None,
        }
    }

    /// The linestring, if this is a linear feature.
    pub fn as_line(&self) -> Option<&LineString<f64>> {
        match &self.geometry {
            FeatureGeometry::LineString(l) => Some(l),
            _ => None,
        }
    }
}

/// Polygons of all features of `kind`.
pub fn polygons_of(features: &[TerrainFeature], kind: FeatureKind) -> Vec<Polygon<f64>> {
    features
        .iter()
        .filter(|f| f.kind() == kind)
        .filter_map(|f| f.as_polygon().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_serialize_with_feature_type_tag() {
        let props = FeatureProperties::Beach(BeachProperties {
            area: 12.0,
            perimeter: 16.0,
            avg_width: 1.5,
            beach_type: BeachType::Ocean,
            cell_count: 6,
        });
        let value = serde_json::to_value(&props).unwrap();
        assert_eq!(value["feature_type"], "beach");
        assert_eq!(value["beach_type"], "ocean");
        assert_eq!(value["cell_count"], 6);
    }

    #[test]
    fn test_kind_tags_match_serde_tags() {
        let props = FeatureProperties::DeltaChannel(DeltaChannelProperties {
            river_id: 0,
            delta_type: DeltaType::BirdsFoot,
            length: 3.0,
            width_start: 2.0,
            width_end: 1.0,
        });
        let value = serde_json::to_value(&props).unwrap();
        assert_eq!(value["feature_type"], props.kind().tag());
        assert_eq!(value["delta_type"], "birds_foot");
    }

    #[test]
    fn test_set_area_updates_beach_width() {
        let mut props = FeatureProperties::Beach(BeachProperties {
            area: 10.0,
            perimeter: 20.0,
            avg_width: 1.0,
            beach_type: BeachType::Lake,
            cell_count: 4,
        });
        props.set_area(5.0);
        match props {
            FeatureProperties::Beach(p) => {
                assert_eq!(p.area, 5.0);
                assert_eq!(p.avg_width, 0.5);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_set_length_ignores_polygons() {
        let mut props = FeatureProperties::Lagoon(LagoonProperties {
            area: 3.0,
            chain_id: 0,
        });
        props.set_length(99.0);
        assert_eq!(
            props,
            FeatureProperties::Lagoon(LagoonProperties {
                area: 3.0,
                chain_id: 0
            })
        );
    }
}
