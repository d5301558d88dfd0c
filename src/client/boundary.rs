use flatgeobuf::{FgbFeature, HttpFgbReader};
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream;
use geojson::{JsonObject, JsonValue};
use geozero::{ColumnValue, FeatureProperties, PropertyProcessor, ToGeo};
use serde_json::Number;
use tracing::debug;

use super::traits::{BoundarySource, CandidateStream};
use super::types::BBox;
use crate::core::CandidateFeature;
use crate::error::GeoconnexError;

/// Boundary features served from a remote FlatGeobuf file.
///
/// Each call opens the file, reads its header and spatial index for the
/// requested window, then pulls features one by one as the stream is polled.
#[derive(Debug, Clone)]
pub struct FgbBoundarySource {
    url: String,
}

impl FgbBoundarySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl BoundarySource for FgbBoundarySource {
    fn candidates(&self, window: BBox) -> BoxFuture<'_, Result<CandidateStream, GeoconnexError>> {
        async move {
            let reader = HttpFgbReader::open(&self.url).await.map_err(|e| {
                GeoconnexError::RemoteSourceUnavailable(format!("{}: {}", self.url, e))
            })?;
            let features = reader
                .select_bbox(window.xmin(), window.ymin(), window.xmax(), window.ymax())
                .await?;
            debug!(url = %self.url, window = ?window.to_array(), "streaming boundary candidates");

            let stream = stream::try_unfold(features, |mut features| async move {
                let next = match features.next().await {
                    Ok(Some(feature)) => candidate_from_fgb(feature).map(Some),
                    Ok(None) => Ok(None),
                    Err(e) => Err(GeoconnexError::from(e)),
                };
                next.map(|candidate| candidate.map(|c| (c, features)))
            });

            Ok(Box::pin(stream) as CandidateStream)
        }
        .boxed()
    }
}

fn candidate_from_fgb(feature: &FgbFeature) -> Result<CandidateFeature, GeoconnexError> {
    let geometry = feature.to_geo()?;
    let mut properties = JsonProperties::default();
    feature.process_properties(&mut properties)?;

    Ok(CandidateFeature {
        geometry: Some(geometry),
        properties: properties.0,
    })
}

/// Collects feature attributes into a GeoJSON properties object, keeping
/// numbers and booleans typed.
#[derive(Default)]
struct JsonProperties(JsonObject);

impl PropertyProcessor for JsonProperties {
    fn property(
        &mut self,
        _idx: usize,
        name: &str,
        value: &ColumnValue,
    ) -> geozero::error::Result<bool> {
        self.0.insert(name.to_string(), column_to_json(value));
        Ok(false)
    }
}

fn column_to_json(value: &ColumnValue) -> JsonValue {
    match value {
        ColumnValue::Bool(v) => JsonValue::Bool(*v),
        ColumnValue::Byte(v) => JsonValue::from(*v),
        ColumnValue::UByte(v) => JsonValue::from(*v),
        ColumnValue::Short(v) => JsonValue::from(*v),
        ColumnValue::UShort(v) => JsonValue::from(*v),
        ColumnValue::Int(v) => JsonValue::from(*v),
        ColumnValue::UInt(v) => JsonValue::from(*v),
        ColumnValue::Long(v) => JsonValue::from(*v),
        ColumnValue::ULong(v) => JsonValue::from(*v),
        // Non-finite floats have no JSON form.
        ColumnValue::Float(v) => {
            Number::from_f64(f64::from(*v)).map_or(JsonValue::Null, JsonValue::Number)
        }
        ColumnValue::Double(v) => Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
        ColumnValue::String(v) | ColumnValue::DateTime(v) => JsonValue::String(v.to_string()),
        ColumnValue::Json(v) => {
            serde_json::from_str(v).unwrap_or_else(|_| JsonValue::String(v.to_string()))
        }
        ColumnValue::Binary(v) => {
            JsonValue::Array(v.iter().map(|b| JsonValue::from(*b)).collect())
        }
    }
}
