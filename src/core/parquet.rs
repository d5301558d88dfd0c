use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt};
use parquet::arrow::arrow_reader::{ArrowPredicateFn, ArrowReaderOptions, RowFilter};
use parquet::arrow::async_reader::{AsyncFileReader, MetadataFetch};
use parquet::arrow::{ParquetRecordBatchStreamBuilder, ProjectionMask};
use parquet::file::metadata::{ParquetMetaData, ParquetMetaDataReader};
use parquet::file::statistics::Statistics;
use parquet::schema::types::SchemaDescriptor;
use serde::Deserialize;
use tracing::debug;

use crate::client::RemoteBuffer;
use crate::error::GeoconnexError;

use super::arrow::{evaluate_predicate, rows_from_batch};
use super::features::RemoteRow;
use super::predicate::{BBoxField, BBoxPredicate};
use super::projection::{ColumnName, Projection};

/// Bytes fetched from the end of the file on the first footer read.
const METADATA_PREFETCH: usize = 512 * 1024;

// =============================================================================
// AsyncFileReader over a RemoteBuffer
// =============================================================================

/// Exposes a [`RemoteBuffer`] to the parquet async reader.
pub struct BufferReader {
    buffer: Arc<dyn RemoteBuffer>,
}

impl BufferReader {
    pub fn new(buffer: Arc<dyn RemoteBuffer>) -> Self {
        Self { buffer }
    }
}

fn read_range(
    buffer: &Arc<dyn RemoteBuffer>,
    range: Range<u64>,
) -> BoxFuture<'static, parquet::errors::Result<Bytes>> {
    let buffer = buffer.clone();
    async move {
        buffer
            .slice(range)
            .await
            .map_err(GeoconnexError::into_parquet)
    }
    .boxed()
}

struct FooterFetch<'a>(&'a Arc<dyn RemoteBuffer>);

impl MetadataFetch for FooterFetch<'_> {
    fn fetch(&mut self, range: Range<u64>) -> BoxFuture<'_, parquet::errors::Result<Bytes>> {
        read_range(self.0, range)
    }
}

impl AsyncFileReader for BufferReader {
    fn get_bytes(&mut self, range: Range<u64>) -> BoxFuture<'_, parquet::errors::Result<Bytes>> {
        read_range(&self.buffer, range)
    }

    fn get_metadata<'a>(
        &'a mut self,
        _options: Option<&'a ArrowReaderOptions>,
    ) -> BoxFuture<'a, parquet::errors::Result<Arc<ParquetMetaData>>> {
        async move {
            let file_size = self.buffer.byte_length();
            let metadata = ParquetMetaDataReader::new()
                .with_prefetch_hint(Some(METADATA_PREFETCH))
                .load_and_finish(FooterFetch(&self.buffer), file_size)
                .await?;
            Ok(Arc::new(metadata))
        }
        .boxed()
    }
}

// =============================================================================
// GeoParquet layout
// =============================================================================

#[derive(Debug, Deserialize)]
struct GeoMetadata {
    primary_column: String,
    #[serde(default)]
    columns: HashMap<String, GeoColumnMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeoColumnMetadata {
    encoding: String,
    #[serde(default)]
    covering: Option<CoveringMetadata>,
}

#[derive(Debug, Deserialize)]
struct CoveringMetadata {
    bbox: BBoxPaths,
}

#[derive(Debug, Deserialize)]
struct BBoxPaths {
    xmin: Vec<String>,
    ymin: Vec<String>,
    xmax: Vec<String>,
    ymax: Vec<String>,
}

/// Struct column holding the per-row bbox, and its field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BBoxCovering {
    pub column: String,
    fields: [String; 4],
}

impl BBoxCovering {
    pub fn field_name(&self, field: BBoxField) -> &str {
        match field {
            BBoxField::Xmin => &self.fields[0],
            BBoxField::Ymin => &self.fields[1],
            BBoxField::Xmax => &self.fields[2],
            BBoxField::Ymax => &self.fields[3],
        }
    }

    fn from_paths(paths: BBoxPaths) -> Result<Self, GeoconnexError> {
        let split = |path: Vec<String>| -> Result<(String, String), GeoconnexError> {
            match <[String; 2]>::try_from(path) {
                Ok([column, field]) => Ok((column, field)),
                Err(path) => Err(GeoconnexError::MalformedRemoteRow(format!(
                    "unsupported bbox covering path {:?}",
                    path
                ))),
            }
        };

        let (column, xmin) = split(paths.xmin)?;
        let mut fields = [xmin, String::new(), String::new(), String::new()];
        for (slot, path) in [paths.ymin, paths.xmax, paths.ymax].into_iter().enumerate() {
            let (other, field) = split(path)?;
            if other != column {
                return Err(GeoconnexError::MalformedRemoteRow(format!(
                    "bbox covering spans columns {} and {}",
                    column, other
                )));
            }
            fields[slot + 1] = field;
        }

        Ok(Self { column, fields })
    }
}

impl Default for BBoxCovering {
    fn default() -> Self {
        Self {
            column: ColumnName::Bbox.as_str().to_string(),
            fields: BBoxField::ALL.map(|f| f.name().to_string()),
        }
    }
}

/// Where geometry and row-bbox live in a particular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLayout {
    pub geometry_column: String,
    pub covering: BBoxCovering,
}

impl Default for ScanLayout {
    fn default() -> Self {
        Self {
            geometry_column: ColumnName::Geometry.as_str().to_string(),
            covering: BBoxCovering::default(),
        }
    }
}

impl ScanLayout {
    /// Reads the GeoParquet `geo` metadata, falling back to `geometry` /
    /// `bbox` when the file carries none.
    pub fn from_metadata(metadata: &ParquetMetaData) -> Result<Self, GeoconnexError> {
        let geo = metadata
            .file_metadata()
            .key_value_metadata()
            .and_then(|kvs| kvs.iter().find(|kv| kv.key == "geo"))
            .and_then(|kv| kv.value.as_deref());

        let Some(geo) = geo else {
            return Ok(Self::default());
        };

        let mut geo: GeoMetadata = serde_json::from_str(geo)?;
        let primary = geo.columns.remove(&geo.primary_column);

        let covering = match primary {
            Some(column) => {
                if !column.encoding.eq_ignore_ascii_case("wkb") {
                    return Err(GeoconnexError::MalformedRemoteRow(format!(
                        "geometry column {} uses unsupported encoding {}",
                        geo.primary_column, column.encoding
                    )));
                }
                match column.covering {
                    Some(c) => BBoxCovering::from_paths(c.bbox)?,
                    None => BBoxCovering::default(),
                }
            }
            None => BBoxCovering::default(),
        };

        Ok(Self {
            geometry_column: geo.primary_column,
            covering,
        })
    }

    fn column_name(&self, column: ColumnName) -> &str {
        match column {
            ColumnName::Geometry => &self.geometry_column,
            ColumnName::Bbox => &self.covering.column,
            other => other.as_str(),
        }
    }
}

fn root_index(schema: &SchemaDescriptor, name: &str) -> Option<usize> {
    schema
        .root_schema()
        .get_fields()
        .iter()
        .position(|f| f.name() == name)
}

// =============================================================================
// Row group pruning
// =============================================================================

fn stats_range(stats: &Statistics) -> Option<(f64, f64)> {
    match stats {
        Statistics::Double(s) => Some((*s.min_opt()?, *s.max_opt()?)),
        Statistics::Float(s) => Some((*s.min_opt()? as f64, *s.max_opt()? as f64)),
        _ => None,
    }
}

/// Row groups whose bbox column statistics admit a match, in file order.
pub fn prune_row_groups(
    metadata: &ParquetMetaData,
    covering: &BBoxCovering,
    predicate: &BBoxPredicate,
) -> Vec<usize> {
    metadata
        .row_groups()
        .iter()
        .enumerate()
        .filter(|(_, group)| {
            predicate.may_match(|field| {
                let path = [covering.column.as_str(), covering.field_name(field)];
                group
                    .columns()
                    .iter()
                    .find(|c| c.column_path().parts().iter().map(String::as_str).eq(path))
                    .and_then(|c| c.statistics())
                    .and_then(stats_range)
            })
        })
        .map(|(idx, _)| idx)
        .collect()
}

// =============================================================================
// Scan
// =============================================================================

/// Reads every row matching `predicate` from the GeoParquet file behind
/// `buffer`, decoding only the columns in `projection`.
///
/// Rows come back in file order.
pub async fn scan_rows(
    buffer: Arc<dyn RemoteBuffer>,
    predicate: &BBoxPredicate,
    projection: &Projection,
) -> Result<Vec<RemoteRow>, GeoconnexError> {
    let builder = ParquetRecordBatchStreamBuilder::new(BufferReader::new(buffer))
        .await
        .map_err(GeoconnexError::from_parquet)?;

    let layout = ScanLayout::from_metadata(builder.metadata())?;
    let schema = builder.metadata().file_metadata().schema_descr_ptr();

    let bbox_root = root_index(&schema, &layout.covering.column).ok_or_else(|| {
        GeoconnexError::MalformedRemoteRow(format!(
            "remote file has no bbox column {}",
            layout.covering.column
        ))
    })?;
    if root_index(&schema, &layout.geometry_column).is_none() {
        return Err(GeoconnexError::MalformedRemoteRow(format!(
            "remote file has no geometry column {}",
            layout.geometry_column
        )));
    }

    let mut roots = Vec::new();
    for column in projection.transfer() {
        let name = layout.column_name(column);
        match root_index(&schema, name) {
            Some(idx) => roots.push(idx),
            None => debug!(column = name, "requested column not in remote schema"),
        }
    }

    let row_groups = prune_row_groups(builder.metadata(), &layout.covering, predicate);
    debug!(
        mode = ?predicate.mode(),
        kept = row_groups.len(),
        total = builder.metadata().num_row_groups(),
        "pruned row groups on bbox statistics"
    );

    let filter_predicate = predicate.clone();
    let covering = layout.covering.clone();
    let filter = ArrowPredicateFn::new(
        ProjectionMask::roots(&schema, [bbox_root]),
        move |batch| evaluate_predicate(&filter_predicate, batch.column(0), &covering),
    );

    let stream = builder
        .with_row_groups(row_groups)
        .with_projection(ProjectionMask::roots(&schema, roots))
        .with_row_filter(RowFilter::new(vec![Box::new(filter)]))
        .build()
        .map_err(GeoconnexError::from_parquet)?;

    let batches: Vec<_> = stream
        .try_collect()
        .await
        .map_err(GeoconnexError::from_parquet)?;

    let mut rows = Vec::new();
    for batch in &batches {
        rows.extend(rows_from_batch(batch, &layout, projection)?);
    }
    debug!(rows = rows.len(), batches = batches.len(), "scanned remote rows");

    Ok(rows)
}
