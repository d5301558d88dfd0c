pub mod client;
pub mod core;
pub mod error;

#[cfg(test)]
mod test_fixtures;

pub use client::{
    BBox, BoundarySource, BufferOpener, CATCHMENTS_URL, CachedBuffer, ClientOptions,
    FgbBoundarySource, GEOCONNEX_FEATURES_URL, GeoconnexClient, HttpBuffer, HttpOpener,
    RemoteBuffer,
};
pub use core::{
    CandidateFeature, ColumnName, ColumnSelection, DEFAULT_SEARCH_MARGIN, QueryMode, ToGeoJson,
};
pub use error::{Axis, GeoconnexError};
