//! GeoJSON and heightfield JSON output.
//!
//! The `FeatureCollection` layout is consumed by external storage and the map
//! frontend, so its shape must stay stable:
//! `{type, features: [{type: "Feature", geometry, properties: {feature_type, ..}}]}`.

use std::fs;
use std::path::{Path, PathBuf};

use geo::{Coord, LineString};
use serde_json::{Value, json};

use crate::error::TerrainError;
use crate::feature::{FeatureGeometry, TerrainFeature};
use crate::generator::TileTerrainData;

fn position(c: Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn positions(line: &LineString<f64>) -> Value {
    Value::Array(line.0.iter().copied().map(position).collect())
}

/// GeoJSON geometry object.
pub fn geometry_value(geometry: &FeatureGeometry) -> Value {
    match geometry {
        FeatureGeometry::Point(p) => json!({ "type": "Point", "coordinates": position(p.0) }),
        FeatureGeometry::LineString(line) => {
            json!({ "type": "LineString", "coordinates": positions(line) })
        }
        FeatureGeometry::Polygon(poly) => {
            let rings: Vec<Value> = std::iter::once(poly.exterior())
                .chain(poly.interiors())
                .map(positions)
                .collect();
            json!({ "type": "Polygon", "coordinates": rings })
        }
    }
}

/// GeoJSON `Feature` with the typed properties flattened under `feature_type`.
pub fn feature_value(feature: &TerrainFeature) -> Result<Value, TerrainError> {
    Ok(json!({
        "type": "Feature",
        "geometry": geometry_value(&feature.geometry),
        "properties": serde_json::to_value(&feature.properties)?,
    }))
}

/// GeoJSON `FeatureCollection` of `features`, in order.
pub fn feature_collection(features: &[TerrainFeature]) -> Result<Value, TerrainError> {
    let features = features.iter().map(feature_value).collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "type": "FeatureCollection", "features": features }))
}

fn encode(value: &impl serde::Serialize, pretty: bool) -> Result<Vec<u8>, TerrainError> {
    Ok(if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    })
}

/// Writes `tile_{tx}_{ty}.geojson` and `tile_{tx}_{ty}.heightfield.json` into
/// `dir`, creating it if needed. Returns both paths.
pub fn write_tile_files(
    dir: &Path,
    tile: &TileTerrainData,
    pretty: bool,
) -> Result<(PathBuf, PathBuf), TerrainError> {
    fs::create_dir_all(dir)?;
    let stem = format!("tile_{}_{}", tile.tx, tile.ty);

    let geojson_path = dir.join(format!("{stem}.geojson"));
    fs::write(&geojson_path, encode(&tile.to_feature_collection()?, pretty)?)?;

    let heightfield_path = dir.join(format!("{stem}.heightfield.json"));
    fs::write(&heightfield_path, encode(&tile.heightfield_record(), pretty)?)?;

    tracing::debug!(
        tx = tile.tx,
        ty = tile.ty,
        features = tile.features.len(),
        path = %geojson_path.display(),
        "wrote tile files"
    );
    Ok((geojson_path, heightfield_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{
        ContourProperties, FeatureProperties, InletProperties, LagoonProperties,
    };
    use geo::{Point, Polygon};

    fn sample_tile() -> TileTerrainData {
        let square = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]),
            vec![],
        );
        TileTerrainData {
            tx: -1,
            ty: 2,
            heightfield: vec![vec![0.1, 0.2], vec![0.3, 0.4]],
            features: vec![
                TerrainFeature::polygon(
                    square,
                    FeatureProperties::Lagoon(LagoonProperties { area: 4.0, chain_id: 1 }),
                ),
                TerrainFeature::line(
                    LineString::from(vec![(0.0, 1.0), (1.0, 1.0)]),
                    FeatureProperties::Contour(ContourProperties { elevation: 0.5, length: 1.0 }),
                ),
                TerrainFeature::point(
                    Point::new(1.0, 0.5),
                    FeatureProperties::Inlet(InletProperties {
                        width: 3.0,
                        wave_energy: 0.4,
                        chain_id: 1,
                    }),
                ),
            ],
        }
    }

    #[test]
    fn test_feature_collection_shape() {
        let fc = sample_tile().to_feature_collection().unwrap();
        assert_eq!(fc["type"], "FeatureCollection");
        let features = fc["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        for f in features {
            assert_eq!(f["type"], "Feature");
            assert!(f["properties"]["feature_type"].is_string());
        }

        assert_eq!(features[0]["geometry"]["type"], "Polygon");
        assert_eq!(features[0]["properties"]["feature_type"], "lagoon");
        let ring = features[0]["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.first(), ring.last(), "rings are closed");

        assert_eq!(features[1]["geometry"]["type"], "LineString");
        assert_eq!(features[1]["properties"]["elevation"], 0.5);
        assert_eq!(features[2]["geometry"]["coordinates"], json!([1.0, 0.5]));
    }

    #[test]
    fn test_write_tile_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let (geojson, heights) = write_tile_files(&out, &sample_tile(), true).unwrap();
        assert_eq!(geojson.file_name().unwrap(), "tile_-1_2.geojson");
        assert_eq!(heights.file_name().unwrap(), "tile_-1_2.heightfield.json");

        let fc: Value = serde_json::from_slice(&fs::read(&geojson).unwrap()).unwrap();
        assert_eq!(fc["features"].as_array().unwrap().len(), 3);

        let record: Value = serde_json::from_slice(&fs::read(&heights).unwrap()).unwrap();
        assert_eq!(record["resolution"], 2);
        assert_eq!(record["heightfield"][1][0], 0.3);
        assert_eq!(record["tx"], -1);
    }
}
