use geo_types::Geometry;
use geojson::{Feature, FeatureCollection, JsonObject, JsonValue};

use super::geometry::ToGeoJson;
use super::projection::{ColumnName, Projection};

/// One row returned by a bbox scan.
///
/// Attribute fields are `None` both when the value is null and when the
/// column was not transferred; [`Projection`] decides which ones surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteRow {
    pub geometry: Option<Geometry<f64>>,
    pub id: Option<String>,
    pub geoconnex_sitemap: Option<String>,
    pub bbox: Option<[f64; 4]>,
}

impl RemoteRow {
    /// Value of a property column. Missing values become JSON `null`.
    pub fn property(&self, column: ColumnName) -> JsonValue {
        let value = match column {
            ColumnName::Id => self.id.as_deref(),
            ColumnName::GeoconnexSitemap => self.geoconnex_sitemap.as_deref(),
            ColumnName::Geometry | ColumnName::Bbox => None,
        };
        value.map_or(JsonValue::Null, |v| JsonValue::String(v.to_string()))
    }

    /// Converts the row into a GeoJSON feature.
    ///
    /// The properties object holds a key for every column in
    /// [`Projection::properties`] and nothing else. The geometry is carried
    /// over without reprojection or simplification.
    pub fn into_feature(self, projection: &Projection) -> Feature {
        let mut properties = JsonObject::new();
        for &column in projection.properties() {
            properties.insert(column.as_str().to_string(), self.property(column));
        }

        let bbox = if projection.include_bbox() {
            self.bbox.map(|b| b.to_vec())
        } else {
            None
        };

        Feature {
            bbox,
            geometry: self.geometry.as_ref().map(ToGeoJson::to_geojson),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Maps rows to features in order and attaches the caller's bbox as given.
pub fn assemble_collection(
    rows: Vec<RemoteRow>,
    projection: &Projection,
    echo_bbox: &[f64],
) -> FeatureCollection {
    let features = rows
        .into_iter()
        .map(|row| row.into_feature(projection))
        .collect();

    FeatureCollection {
        bbox: Some(echo_bbox.to_vec()),
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ColumnSelection;
    use geo_types::Point;

    fn row(id: &str, sitemap: Option<&str>) -> RemoteRow {
        RemoteRow {
            geometry: Some(Geometry::Point(Point::new(-73.1, 40.9))),
            id: Some(id.to_string()),
            geoconnex_sitemap: sitemap.map(str::to_string),
            bbox: Some([-73.1, 40.9, -73.1, 40.9]),
        }
    }

    #[test]
    fn test_default_columns_produce_id_and_sitemap() {
        let projection = ColumnSelection::default().resolve();
        let feature = row("a", Some("s.xml")).into_feature(&projection);

        let props = feature.properties.unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("id").unwrap(), "a");
        assert_eq!(props.get("geoconnex_sitemap").unwrap(), "s.xml");
        assert!(feature.bbox.is_none());
        assert!(feature.geometry.is_some());
    }

    #[test]
    fn test_presence_follows_selection() {
        let selections = [
            vec![],
            vec![ColumnName::Id],
            vec![ColumnName::GeoconnexSitemap],
            vec![ColumnName::Id, ColumnName::GeoconnexSitemap],
            vec![ColumnName::Bbox, ColumnName::Geometry],
        ];

        for columns in selections {
            let selection = ColumnSelection::new(columns.clone());
            let projection = selection.resolve();
            let props = row("a", Some("s.xml"))
                .into_feature(&projection)
                .properties
                .unwrap();

            for column in [ColumnName::Id, ColumnName::GeoconnexSitemap] {
                assert_eq!(
                    props.contains_key(column.as_str()),
                    selection.contains(column),
                    "{:?} with selection {:?}",
                    column,
                    columns
                );
            }
        }
    }

    #[test]
    fn test_requested_but_missing_value_is_null() {
        let projection = ColumnSelection::default().resolve();
        let feature = row("f", None).into_feature(&projection);
        let props = feature.properties.unwrap();
        assert_eq!(props.get("geoconnex_sitemap"), Some(&JsonValue::Null));
    }

    #[test]
    fn test_requested_bbox_sets_feature_bbox() {
        let projection = ColumnSelection::all().resolve();
        let feature = row("a", None).into_feature(&projection);
        assert_eq!(feature.bbox, Some(vec![-73.1, 40.9, -73.1, 40.9]));
        assert!(!feature.properties.unwrap().contains_key("bbox"));
    }

    #[test]
    fn test_null_geometry_is_kept() {
        let projection = ColumnSelection::default().resolve();
        let feature = RemoteRow {
            id: Some("x".into()),
            ..Default::default()
        }
        .into_feature(&projection);
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn test_collection_preserves_order_and_echoes_bbox() {
        let projection = ColumnSelection::default().resolve();
        let input = [-73.2, 40.5, -73.0, 41.0];
        let fc = assemble_collection(
            vec![row("b", None), row("a", None), row("c", None)],
            &projection,
            &input,
        );

        let ids: Vec<_> = fc
            .features
            .iter()
            .map(|f| f.property("id").unwrap().as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(fc.bbox, Some(input.to_vec()));
    }

    #[test]
    fn test_collection_serializes_as_geojson() {
        let projection = ColumnSelection::default().resolve();
        let fc = assemble_collection(vec![row("a", Some("s.xml"))], &projection, &[0.0, 0.0, 1.0, 1.0]);
        let json: serde_json::Value = serde_json::to_value(&fc).unwrap();

        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["bbox"], serde_json::json!([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(json["features"][0]["type"], "Feature");
        assert_eq!(json["features"][0]["geometry"]["type"], "Point");
        assert_eq!(json["features"][0]["properties"]["id"], "a");
    }
}
