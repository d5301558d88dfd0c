use arrow_array::cast::AsArray;
use arrow_array::types::Float64Type;
use arrow_array::{Array, ArrayRef, BinaryArray, BooleanArray, Float64Array, RecordBatch, StringArray};
use arrow_cast::cast;
use arrow_schema::{ArrowError, DataType};

use crate::error::GeoconnexError;

use super::features::RemoteRow;
use super::geometry::decode_wkb;
use super::parquet::{BBoxCovering, ScanLayout};
use super::predicate::{BBoxField, BBoxPredicate};
use super::projection::{ColumnName, Projection};

/// The four components of a bbox struct column, cast to `Float64`.
struct BBoxColumns {
    parent: ArrayRef,
    fields: [Float64Array; 4],
}

impl BBoxColumns {
    fn try_new(array: &ArrayRef, covering: &BBoxCovering) -> Result<Self, ArrowError> {
        let parent = array.as_struct_opt().ok_or_else(|| {
            ArrowError::SchemaError(format!(
                "bbox column {} is {}, expected a struct",
                covering.column,
                array.data_type()
            ))
        })?;

        let field = |f: BBoxField| -> Result<Float64Array, ArrowError> {
            let name = covering.field_name(f);
            let child = parent.column_by_name(name).ok_or_else(|| {
                ArrowError::SchemaError(format!(
                    "bbox column {} has no field {}",
                    covering.column, name
                ))
            })?;
            Ok(cast(child, &DataType::Float64)?
                .as_primitive::<Float64Type>()
                .clone())
        };

        Ok(Self {
            parent: array.clone(),
            fields: [
                field(BBoxField::Xmin)?,
                field(BBoxField::Ymin)?,
                field(BBoxField::Xmax)?,
                field(BBoxField::Ymax)?,
            ],
        })
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn get(&self, row: usize) -> Option<[f64; 4]> {
        if self.parent.is_null(row) || self.fields.iter().any(|f| f.is_null(row)) {
            return None;
        }
        Some([
            self.fields[0].value(row),
            self.fields[1].value(row),
            self.fields[2].value(row),
            self.fields[3].value(row),
        ])
    }
}

/// Evaluates `predicate` over a decoded bbox struct column. Rows with any
/// null component never match.
pub fn evaluate_predicate(
    predicate: &BBoxPredicate,
    bbox: &ArrayRef,
    covering: &BBoxCovering,
) -> Result<BooleanArray, ArrowError> {
    let columns = BBoxColumns::try_new(bbox, covering)?;
    let mask: Vec<bool> = (0..columns.len())
        .map(|row| columns.get(row).is_some_and(|b| predicate.matches(b)))
        .collect();
    Ok(BooleanArray::from(mask))
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<Option<StringArray>, GeoconnexError> {
    match batch.column_by_name(name) {
        Some(array) => {
            let array = cast(array, &DataType::Utf8)?;
            Ok(array.as_string_opt::<i32>().cloned())
        }
        None => Ok(None),
    }
}

fn binary_column(array: &ArrayRef) -> Result<BinaryArray, GeoconnexError> {
    let array = cast(array, &DataType::Binary)?;
    array.as_binary_opt::<i32>().cloned().ok_or_else(|| {
        GeoconnexError::MalformedRemoteRow("geometry column is not binary".to_string())
    })
}

/// Converts a filtered batch into rows.
///
/// Only the columns in `projection` are read. A transferred column that the
/// batch lacks yields `None` for every row.
pub fn rows_from_batch(
    batch: &RecordBatch,
    layout: &ScanLayout,
    projection: &Projection,
) -> Result<Vec<RemoteRow>, GeoconnexError> {
    let geometry_array = batch.column_by_name(&layout.geometry_column).ok_or_else(|| {
        GeoconnexError::MalformedRemoteRow(format!(
            "batch is missing geometry column {}",
            layout.geometry_column
        ))
    })?;
    let geometries = binary_column(geometry_array)?;

    let ids = if projection.properties().contains(&ColumnName::Id) {
        string_column(batch, ColumnName::Id.as_str())?
    } else {
        None
    };
    let sitemaps = if projection.properties().contains(&ColumnName::GeoconnexSitemap) {
        string_column(batch, ColumnName::GeoconnexSitemap.as_str())?
    } else {
        None
    };
    let bboxes = match batch.column_by_name(&layout.covering.column) {
        Some(array) if projection.include_bbox() => {
            Some(BBoxColumns::try_new(array, &layout.covering)?)
        }
        _ => None,
    };

    let text = |column: &Option<StringArray>, row: usize| {
        column
            .as_ref()
            .filter(|c| c.is_valid(row))
            .map(|c| c.value(row).to_string())
    };

    (0..batch.num_rows())
        .map(|row| {
            let geometry = if geometries.is_valid(row) {
                let geometry = decode_wkb(geometries.value(row)).map_err(|e| {
                    GeoconnexError::MalformedRemoteRow(format!("invalid WKB geometry: {}", e))
                })?;
                Some(geometry)
            } else {
                None
            };

            Ok(RemoteRow {
                geometry,
                id: text(&ids, row),
                geoconnex_sitemap: text(&sitemaps, row),
                bbox: bboxes.as_ref().and_then(|b| b.get(row)),
            })
        })
        .collect()
}
