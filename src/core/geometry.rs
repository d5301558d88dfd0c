use geo::Intersects;
use geo_types::{Geometry, MultiPolygon, Point};
use geojson::{Geometry as GeoJsonGeometry, Value as GeoJsonValue};
use geozero::ToGeo;
use geozero::wkb::Wkb;

use crate::error::GeoconnexError;

// =============================================================================
// ToGeoJson Trait - Convert geo_types to GeoJSON
// =============================================================================

/// Trait for converting geo_types geometries to GeoJSON.
pub trait ToGeoJson {
    /// Converts this geometry to a GeoJSON Geometry, coordinates unchanged.
    fn to_geojson(&self) -> GeoJsonGeometry;
}

impl ToGeoJson for Geometry<f64> {
    fn to_geojson(&self) -> GeoJsonGeometry {
        GeoJsonGeometry::new(GeoJsonValue::from(self))
    }
}

// =============================================================================
// FromGeometry Trait - Narrow a decoded geometry
// =============================================================================

/// Trait for narrowing a generic geometry to a specific geo_types type.
pub trait FromGeometry: Sized {
    fn from_geometry(geometry: &Geometry<f64>) -> Result<Self, GeoconnexError>;
}

impl FromGeometry for MultiPolygon<f64> {
    fn from_geometry(geometry: &Geometry<f64>) -> Result<Self, GeoconnexError> {
        match geometry {
            Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon.clone()])),
            Geometry::MultiPolygon(mp) => Ok(mp.clone()),
            Geometry::Rect(rect) => Ok(MultiPolygon::new(vec![rect.to_polygon()])),
            other => Err(GeoconnexError::Geometry(format!(
                "Expected Polygon or MultiPolygon, got {}",
                geometry_type(other)
            ))),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Decodes an ISO/OGC WKB blob.
pub fn decode_wkb(bytes: &[u8]) -> Result<Geometry<f64>, GeoconnexError> {
    Ok(Wkb(bytes.to_vec()).to_geo()?)
}

/// Exact point-in-polygon test. Points on an edge count as inside.
pub fn polygon_contains(polygon: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
    polygon.intersects(point)
}

fn geometry_type(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
