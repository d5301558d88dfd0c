mod arrow;
mod catchment;
mod features;
mod geometry;
mod parquet;
mod predicate;
mod projection;

pub use arrow::{evaluate_predicate, rows_from_batch};
pub use catchment::{CandidateFeature, DEFAULT_SEARCH_MARGIN, locate_catchment};
pub use features::{RemoteRow, assemble_collection};
pub use geometry::{FromGeometry, ToGeoJson, decode_wkb, polygon_contains};
pub use self::parquet::{BBoxCovering, BufferReader, ScanLayout, prune_row_groups, scan_rows};
pub use predicate::{BBoxField, BBoxPredicate, QueryMode};
pub use projection::{ColumnName, ColumnSelection, Projection};
