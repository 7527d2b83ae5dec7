#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry transforms for the import pipeline.
//!
//! Whichever representation a source provides natively — local-projection
//! or WGS84 — the pipeline derives the other one plus a WGS84 centroid.
//! The local reference projection is RGF93 / Lambert-93 (EPSG:2154),
//! implemented in [`lambert`]; geometries travel as `GeoJSON` strings.

pub mod lambert;

use geo::{Centroid as _, Geometry, MapCoords as _, Point};
use geojson::GeoJson;
use lambert::LambertConformal;

/// SRID of the fixed local reference projection used for derivation.
pub const LOCAL_REFERENCE_SRID: i32 = 2154;

/// SRID of the global geographic representation.
pub const WGS84_SRID: i32 = 4326;

/// Errors raised while decoding or encoding geometries.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// The value is not a valid `GeoJSON` geometry.
    #[error("invalid GeoJSON geometry: {0}")]
    InvalidGeoJson(String),

    /// The `GeoJSON` document is not a bare geometry object.
    #[error("expected a GeoJSON geometry object, got {0}")]
    NotAGeometry(&'static str),
}

/// Reprojects a Lambert-93 geometry to WGS84.
#[must_use]
pub fn local_to_wgs84(geom: &Geometry<f64>) -> Geometry<f64> {
    let proj = LambertConformal::lambert93();
    geom.map_coords(|coord| {
        let (lon, lat) = proj.inverse(coord.x, coord.y);
        geo::Coord { x: lon, y: lat }
    })
}

/// Reprojects a WGS84 geometry to Lambert-93.
#[must_use]
pub fn wgs84_to_local(geom: &Geometry<f64>) -> Geometry<f64> {
    let proj = LambertConformal::lambert93();
    geom.map_coords(|coord| {
        let (x, y) = proj.project(coord.x, coord.y);
        geo::Coord { x, y }
    })
}

/// Computes the centroid of a geometry, in the same coordinate system as
/// its input. Returns `None` for empty geometries.
#[must_use]
pub fn centroid(geom: &Geometry<f64>) -> Option<Point<f64>> {
    geom.centroid()
}

/// Encodes a geometry as a `GeoJSON` string.
#[must_use]
pub fn to_geojson_string(geom: &Geometry<f64>) -> String {
    GeoJson::Geometry(geojson::Geometry::new(geojson::Value::from(geom))).to_string()
}

/// Decodes a geometry from a parsed JSON value holding a `GeoJSON`
/// geometry object.
///
/// # Errors
///
/// Returns [`GeometryError`] if the value is not a valid `GeoJSON`
/// geometry.
pub fn from_geojson_value(value: &serde_json::Value) -> Result<Geometry<f64>, GeometryError> {
    let geojson = GeoJson::from_json_value(value.clone())
        .map_err(|e| GeometryError::InvalidGeoJson(e.to_string()))?;
    match geojson {
        GeoJson::Geometry(geom) => geom
            .try_into()
            .map_err(|e: geojson::Error| GeometryError::InvalidGeoJson(e.to_string())),
        GeoJson::Feature(_) => Err(GeometryError::NotAGeometry("a feature")),
        GeoJson::FeatureCollection(_) => Err(GeometryError::NotAGeometry("a feature collection")),
    }
}

/// Decodes a geometry from a `GeoJSON` string.
///
/// # Errors
///
/// Returns [`GeometryError`] if the string is not a valid `GeoJSON`
/// geometry.
pub fn from_geojson_str(geojson_str: &str) -> Result<Geometry<f64>, GeometryError> {
    let value: serde_json::Value = serde_json::from_str(geojson_str)
        .map_err(|e| GeometryError::InvalidGeoJson(e.to_string()))?;
    from_geojson_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris_wgs84() -> Geometry<f64> {
        Geometry::Point(Point::new(2.3522, 48.8566))
    }

    #[test]
    fn reprojection_roundtrip_is_stable() {
        let original = paris_wgs84();
        let local = wgs84_to_local(&original);
        let back = local_to_wgs84(&local);

        let Geometry::Point(p0) = original else {
            unreachable!()
        };
        let Geometry::Point(p1) = back else {
            unreachable!()
        };
        assert!((p0.x() - p1.x()).abs() < 1e-9);
        assert!((p0.y() - p1.y()).abs() < 1e-9);
    }

    #[test]
    fn polygon_centroid_is_inside() {
        let polygon: Geometry<f64> = Geometry::Polygon(geo::Polygon::new(
            geo::LineString::from(vec![
                (2.0, 48.0),
                (3.0, 48.0),
                (3.0, 49.0),
                (2.0, 49.0),
                (2.0, 48.0),
            ]),
            vec![],
        ));
        let center = centroid(&polygon).unwrap();
        assert!((center.x() - 2.5).abs() < 1e-9);
        assert!((center.y() - 48.5).abs() < 1e-9);
    }

    #[test]
    fn geojson_codec_roundtrip() {
        let encoded = to_geojson_string(&paris_wgs84());
        let decoded = from_geojson_str(&encoded).unwrap();
        assert_eq!(decoded, paris_wgs84());
    }

    #[test]
    fn decoding_rejects_non_geometry() {
        let value = serde_json::json!({"type": "FeatureCollection", "features": []});
        assert!(matches!(
            from_geojson_value(&value),
            Err(GeometryError::NotAGeometry(_))
        ));
    }

    #[test]
    fn decoding_rejects_garbage() {
        let value = serde_json::json!({"hello": "world"});
        assert!(from_geojson_value(&value).is_err());
    }
}
