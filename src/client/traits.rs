use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use super::types::BBox;
use crate::core::CandidateFeature;
use crate::error::GeoconnexError;

/// Random-access byte source over one remote file.
///
/// Implementations are selected once when a client is built: the plain
/// [`HttpBuffer`](super::buffer::HttpBuffer) or the memoizing
/// [`CachedBuffer`](super::buffer::CachedBuffer) that wraps another buffer.
pub trait RemoteBuffer: Send + Sync {
    /// Total size of the remote file in bytes.
    fn byte_length(&self) -> u64;

    /// Reads `range` (end exclusive).
    fn slice(&self, range: Range<u64>) -> BoxFuture<'_, Result<Bytes, GeoconnexError>>;
}

/// Opens the base [`RemoteBuffer`] for a client. Called at most once per
/// successful acquisition.
pub trait BufferOpener: Send + Sync {
    fn open(&self) -> BoxFuture<'_, Result<Arc<dyn RemoteBuffer>, GeoconnexError>>;
}

/// Lazy, single-pass stream of boundary candidates.
pub type CandidateStream = BoxStream<'static, Result<CandidateFeature, GeoconnexError>>;

/// Spatial feature stream over a large vector-boundary file.
pub trait BoundarySource: Send + Sync {
    /// Opens a stream of every feature whose index entry overlaps `window`.
    fn candidates(&self, window: BBox) -> BoxFuture<'_, Result<CandidateStream, GeoconnexError>>;
}
