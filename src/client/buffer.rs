use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, trace};

use super::traits::{BufferOpener, RemoteBuffer};
use super::types::HttpClient;
use crate::error::GeoconnexError;

/// A remote file read over HTTP range requests.
///
/// Opening issues a single `HEAD` to learn the file size; nothing else is
/// downloaded until [`RemoteBuffer::slice`] is called.
#[derive(Debug)]
pub struct HttpBuffer {
    http: HttpClient,
    url: String,
    byte_length: u64,
}

impl HttpBuffer {
    pub async fn open(http: HttpClient, url: impl Into<String>) -> Result<Self, GeoconnexError> {
        let url = url.into();
        let byte_length = http.content_length(&url).await?;
        debug!(url = %url, byte_length, "opened remote buffer");
        Ok(Self {
            http,
            url,
            byte_length,
        })
    }
}

impl RemoteBuffer for HttpBuffer {
    fn byte_length(&self) -> u64 {
        self.byte_length
    }

    fn slice(&self, range: Range<u64>) -> BoxFuture<'_, Result<Bytes, GeoconnexError>> {
        async move {
            if range.end > self.byte_length {
                return Err(GeoconnexError::RemoteSourceUnavailable(format!(
                    "range {:?} exceeds remote size {}",
                    range, self.byte_length
                )));
            }
            trace!(start = range.start, end = range.end, "fetching byte range");
            self.http.fetch_range(&self.url, range).await
        }
        .boxed()
    }
}

/// Grow-only memo of byte ranges read through an inner buffer.
///
/// Entries are keyed by the exact `(start, end)` requested and never evicted;
/// the remote file is assumed not to change while the client is alive.
pub struct CachedBuffer {
    inner: Arc<dyn RemoteBuffer>,
    ranges: Mutex<HashMap<(u64, u64), Bytes>>,
}

impl CachedBuffer {
    pub fn new(inner: Arc<dyn RemoteBuffer>) -> Self {
        Self {
            inner,
            ranges: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct ranges held.
    pub fn len(&self) -> usize {
        self.ranges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: (u64, u64)) -> Option<Bytes> {
        self.ranges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

impl RemoteBuffer for CachedBuffer {
    fn byte_length(&self) -> u64 {
        self.inner.byte_length()
    }

    fn slice(&self, range: Range<u64>) -> BoxFuture<'_, Result<Bytes, GeoconnexError>> {
        async move {
            let key = (range.start, range.end);
            if let Some(bytes) = self.lookup(key) {
                trace!(start = key.0, end = key.1, "byte range cache hit");
                return Ok(bytes);
            }

            let bytes = self.inner.slice(range).await?;
            self.ranges
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, bytes.clone());
            Ok(bytes)
        }
        .boxed()
    }
}

/// Opens an [`HttpBuffer`] for a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpOpener {
    http: HttpClient,
    url: String,
}

impl HttpOpener {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            url: url.into(),
        }
    }
}

impl BufferOpener for HttpOpener {
    fn open(&self) -> BoxFuture<'_, Result<Arc<dyn RemoteBuffer>, GeoconnexError>> {
        async move {
            let buffer = HttpBuffer::open(self.http.clone(), self.url.clone()).await?;
            Ok(Arc::new(buffer) as Arc<dyn RemoteBuffer>)
        }
        .boxed()
    }
}
