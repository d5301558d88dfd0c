use futures::TryStreamExt;
use geo_types::{Geometry, MultiPolygon, Point};
use geojson::{Feature, JsonObject};
use tracing::{debug, trace};

use crate::client::{BBox, BoundarySource};
use crate::error::GeoconnexError;

use super::geometry::{FromGeometry, ToGeoJson, polygon_contains};

/// Half-width of the search window around a lookup point, in the point's
/// coordinate units (degrees for the reference catchments).
pub const DEFAULT_SEARCH_MARGIN: f64 = 0.1;

/// A boundary feature pulled from a [`BoundarySource`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFeature {
    pub geometry: Option<Geometry<f64>>,
    pub properties: JsonObject,
}

impl CandidateFeature {
    /// Exact point-in-polygon test. Non-polygonal candidates never contain
    /// a point.
    pub fn contains(&self, point: &Point<f64>) -> bool {
        self.geometry
            .as_ref()
            .and_then(|g| MultiPolygon::from_geometry(g).ok())
            .is_some_and(|mp| polygon_contains(&mp, point))
    }

    pub fn into_feature(self) -> Feature {
        Feature {
            bbox: None,
            geometry: self.geometry.as_ref().map(ToGeoJson::to_geojson),
            id: None,
            properties: Some(self.properties),
            foreign_members: None,
        }
    }
}

/// Returns the first candidate near `point` whose polygon contains it.
///
/// Candidates are streamed from a square window of half-width `margin`
/// around the point and tested one at a time; the stream is dropped as soon
/// as one matches. `Ok(None)` means nothing in the window contains the point.
pub async fn locate_catchment(
    source: &dyn BoundarySource,
    point: Point<f64>,
    margin: f64,
) -> Result<Option<Feature>, GeoconnexError> {
    let window = BBox::validate(&BBox::around(point, margin).to_array())?;
    let mut candidates = source.candidates(window).await?;

    let mut tested = 0usize;
    while let Some(candidate) = candidates.try_next().await? {
        tested += 1;
        if candidate.contains(&point) {
            debug!(tested, x = point.x(), y = point.y(), "catchment found");
            return Ok(Some(candidate.into_feature()));
        }
        trace!(tested, "candidate does not contain point");
    }

    debug!(tested, x = point.x(), y = point.y(), "no catchment contains point");
    Ok(None)
}
