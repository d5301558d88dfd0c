use std::sync::Arc;

use geo_types::Point;
use geojson::{Feature, FeatureCollection};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::boundary::FgbBoundarySource;
use super::buffer::{CachedBuffer, HttpOpener};
use super::traits::{BoundarySource, BufferOpener, RemoteBuffer};
use super::types::{BBox, ClientOptions};
use crate::core::{
    BBoxPredicate, ColumnSelection, DEFAULT_SEARCH_MARGIN, QueryMode, assemble_collection,
    locate_catchment, scan_rows,
};
use crate::error::GeoconnexError;

/// GeoParquet export of every geoconnex feature, with a per-row bbox column.
pub const GEOCONNEX_FEATURES_URL: &str =
    "https://storage.googleapis.com/metadata-geoconnex-us/exports/geoconnex_features.parquet";

/// FlatGeobuf of reference catchments carrying mainstem metadata.
pub const CATCHMENTS_URL: &str =
    "https://storage.googleapis.com/metadata-geoconnex-us/exports/catchments_with_mainstem_metadata.fgb";

/// Client for fetching geoconnex features as GeoJSON.
///
/// The remote GeoParquet file is opened on the first query and the handle is
/// reused for every later query on the same client. With
/// [`ClientOptions::cache`] set, every byte range read is also kept in memory,
/// so repeating a query costs no further network traffic.
///
/// # Example
///
/// ```no_run
/// use geoconnex_rs::GeoconnexClient;
///
/// # async fn example() -> Result<(), geoconnex_rs::GeoconnexError> {
/// let client = GeoconnexClient::new();
/// let fc = client
///     .get_features_inside_bbox(&[-73.2, 40.5, -73.0, 41.0], None)
///     .await?;
/// println!("{} features", fc.features.len());
/// # Ok(())
/// # }
/// ```
pub struct GeoconnexClient {
    options: ClientOptions,
    opener: Box<dyn BufferOpener>,
    boundary: Box<dyn BoundarySource>,
    search_margin: f64,
    buffer: OnceCell<Arc<dyn RemoteBuffer>>,
    cache: OnceCell<Arc<dyn RemoteBuffer>>,
}

impl GeoconnexClient {
    /// Creates a client with default options (no byte-range cache).
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    pub fn with_options(options: ClientOptions) -> Self {
        Self::with_sources(
            options,
            HttpOpener::new(GEOCONNEX_FEATURES_URL),
            FgbBoundarySource::new(CATCHMENTS_URL),
        )
    }

    /// Creates a client over custom sources.
    pub fn with_sources(
        options: ClientOptions,
        opener: impl BufferOpener + 'static,
        boundary: impl BoundarySource + 'static,
    ) -> Self {
        Self {
            options,
            opener: Box::new(opener),
            boundary: Box::new(boundary),
            search_margin: DEFAULT_SEARCH_MARGIN,
            buffer: OnceCell::new(),
            cache: OnceCell::new(),
        }
    }

    /// Overrides the catchment search window half-width.
    ///
    /// # Errors
    ///
    /// [`GeoconnexError::Config`] if `margin` is NaN or infinite.
    pub fn with_search_margin(mut self, margin: f64) -> Result<Self, GeoconnexError> {
        if !margin.is_finite() {
            return Err(GeoconnexError::Config(format!(
                "search margin must be finite, got {}",
                margin
            )));
        }
        self.search_margin = margin;
        Ok(self)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Returns the buffer queries read through, opening it on first use.
    ///
    /// A failed open leaves nothing memoized, so the next call retries.
    async fn acquire_buffer(&self) -> Result<Arc<dyn RemoteBuffer>, GeoconnexError> {
        let base = self
            .buffer
            .get_or_try_init(|| async {
                debug!("opening remote feature buffer");
                self.opener.open().await
            })
            .await?;

        if !self.options.cache {
            return Ok(base.clone());
        }

        let cached = self
            .cache
            .get_or_init(|| async {
                debug!("wrapping remote feature buffer in byte-range cache");
                Arc::new(CachedBuffer::new(base.clone())) as Arc<dyn RemoteBuffer>
            })
            .await;
        Ok(cached.clone())
    }

    async fn query(
        &self,
        bbox: &[f64],
        mode: QueryMode,
        columns: Option<ColumnSelection>,
    ) -> Result<FeatureCollection, GeoconnexError> {
        let validated = BBox::validate(bbox)?;
        let predicate = BBoxPredicate::new(&validated, mode);
        let projection = columns.unwrap_or_default().resolve();

        let buffer = self.acquire_buffer().await?;
        let rows = scan_rows(buffer, &predicate, &projection).await?;
        info!(mode = ?mode, bbox = ?bbox, features = rows.len(), "fetched geoconnex features");

        Ok(assemble_collection(rows, &projection, bbox))
    }

    /// Gets every feature whose stored bbox lies entirely within `bbox`.
    ///
    /// `bbox` is `[xmin, ymin, xmax, ymax]` and is echoed on the returned
    /// collection. `columns` defaults to id, geometry and geoconnex_sitemap.
    ///
    /// # Errors
    ///
    /// - [`GeoconnexError::InvalidBoundingBoxShape`] /
    ///   [`GeoconnexError::InvalidBoundingBoxOrdering`] before any network access
    /// - [`GeoconnexError::RemoteSourceUnavailable`] if the file cannot be read
    pub async fn get_features_inside_bbox(
        &self,
        bbox: &[f64],
        columns: Option<ColumnSelection>,
    ) -> Result<FeatureCollection, GeoconnexError> {
        self.query(bbox, QueryMode::Contained, columns).await
    }

    /// Gets every feature whose stored bbox overlaps `bbox`.
    ///
    /// This may return very large features such as administrative
    /// boundaries that extend far beyond the box.
    pub async fn get_features_intersecting_bbox(
        &self,
        bbox: &[f64],
        columns: Option<ColumnSelection>,
    ) -> Result<FeatureCollection, GeoconnexError> {
        self.query(bbox, QueryMode::Intersecting, columns).await
    }

    /// Finds the reference catchment containing `point`, if one lies within
    /// the search margin.
    pub async fn get_catchment_with_mainstem_metadata_at_point(
        &self,
        point: impl Into<Point<f64>>,
    ) -> Result<Option<Feature>, GeoconnexError> {
        locate_catchment(self.boundary.as_ref(), point.into(), self.search_margin).await
    }
}

impl Default for GeoconnexClient {
    fn default() -> Self {
        Self::new()
    }
}
