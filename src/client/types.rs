use std::ops::Range;

use bytes::Bytes;
use geo_types::Point;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, RANGE};

use crate::error::{Axis, GeoconnexError};

/// A validated `[xmin, ymin, xmax, ymax]` bounding box.
///
/// Only [`BBox::validate`] and [`BBox::around`] construct one, so every value
/// satisfies `xmin <= xmax` and `ymin <= ymax`. No longitude/latitude range
/// checks are made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
}

impl BBox {
    /// Validates a caller-supplied bbox.
    ///
    /// # Errors
    ///
    /// - [`GeoconnexError::InvalidBoundingBoxShape`] unless there are exactly
    ///   four non-NaN components
    /// - [`GeoconnexError::InvalidBoundingBoxOrdering`] if `xmin > xmax` or
    ///   `ymin > ymax`
    ///
    /// # Example
    ///
    /// ```
    /// use geoconnex_rs::BBox;
    ///
    /// let bbox = BBox::validate(&[-73.2, 40.5, -73.0, 41.0]).unwrap();
    /// assert_eq!(bbox.xmin(), -73.2);
    /// assert!(BBox::validate(&[10.0, 5.0, 0.0, 0.0]).is_err());
    /// ```
    pub fn validate(bbox: &[f64]) -> Result<Self, GeoconnexError> {
        let [xmin, ymin, xmax, ymax] = <[f64; 4]>::try_from(bbox).map_err(|_| {
            GeoconnexError::InvalidBoundingBoxShape(format!("got {} components", bbox.len()))
        })?;

        if let Some(idx) = bbox.iter().position(|v| v.is_nan()) {
            return Err(GeoconnexError::InvalidBoundingBoxShape(format!(
                "component {} is NaN",
                idx
            )));
        }
        if xmin > xmax {
            return Err(GeoconnexError::InvalidBoundingBoxOrdering {
                axis: Axis::X,
                min: xmin,
                max: xmax,
            });
        }
        if ymin > ymax {
            return Err(GeoconnexError::InvalidBoundingBoxOrdering {
                axis: Axis::Y,
                min: ymin,
                max: ymax,
            });
        }

        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    /// Square window of half-width `margin` centred on `point`.
    pub fn around(point: Point<f64>, margin: f64) -> Self {
        let margin = margin.abs();
        Self {
            xmin: point.x() - margin,
            ymin: point.y() - margin,
            xmax: point.x() + margin,
            ymax: point.y() + margin,
        }
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// Client configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Keep every fetched byte range in memory for the lifetime of the client.
    pub cache: bool,
}

impl ClientOptions {
    pub const CACHE_ENV_VAR: &'static str = "GEOCONNEX_CACHE";

    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables the in-memory byte-range cache.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Reads options from the environment.
    ///
    /// `GEOCONNEX_CACHE` accepts `1`, `true`, `yes` (enable) or `0`, `false`,
    /// `no` (disable). Unset leaves the cache off.
    pub fn from_env() -> Result<Self, GeoconnexError> {
        match std::env::var(Self::CACHE_ENV_VAR) {
            Ok(value) => Ok(Self::new().with_cache(parse_flag(&value)?)),
            Err(std::env::VarError::NotPresent) => Ok(Self::new()),
            Err(e) => Err(GeoconnexError::Config(format!(
                "{} is not valid unicode: {}",
                Self::CACHE_ENV_VAR,
                e
            ))),
        }
    }
}

fn parse_flag(value: &str) -> Result<bool, GeoconnexError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(GeoconnexError::Config(format!(
            "{} must be a boolean flag, got {:?}",
            ClientOptions::CACHE_ENV_VAR,
            other
        ))),
    }
}

/// Thin wrapper over [`reqwest::Client`] for byte-range reads of one remote file.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Returns the size of the remote file from a `HEAD` request.
    pub async fn content_length(&self, url: &str) -> Result<u64, GeoconnexError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| unavailable(url, e))?;

        if !response.status().is_success() {
            return Err(GeoconnexError::RemoteSourceUnavailable(format!(
                "HEAD {} returned status {}",
                url,
                response.status()
            )));
        }

        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                GeoconnexError::RemoteSourceUnavailable(format!(
                    "HEAD {} returned no content length",
                    url
                ))
            })
    }

    /// Fetches `range` (end exclusive) from the remote file.
    pub async fn fetch_range(
        &self,
        url: &str,
        range: Range<u64>,
    ) -> Result<Bytes, GeoconnexError> {
        if range.start > range.end {
            return Err(GeoconnexError::RemoteSourceUnavailable(format!(
                "invalid byte range {:?} for {}",
                range, url
            )));
        }
        if range.is_empty() {
            return Ok(Bytes::new());
        }

        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={}-{}", range.start, range.end - 1))
            .send()
            .await
            .map_err(|e| unavailable(url, e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| unavailable(url, e))?;
        range_body(url, &range, status, body)
    }
}

/// Extracts `range` from a response to a range request.
fn range_body(
    url: &str,
    range: &Range<u64>,
    status: StatusCode,
    body: Bytes,
) -> Result<Bytes, GeoconnexError> {
    match status {
        StatusCode::PARTIAL_CONTENT => Ok(body),
        // Server ignored the range header and sent the whole file.
        StatusCode::OK => {
            tracing::warn!(url, "server ignored range request, slicing full body");
            let start = range.start as usize;
            let end = (range.end as usize).min(body.len());
            if start > end {
                return Err(GeoconnexError::RemoteSourceUnavailable(format!(
                    "range {:?} is beyond the {} byte body of {}",
                    range,
                    body.len(),
                    url
                )));
            }
            Ok(body.slice(start..end))
        }
        other => Err(GeoconnexError::RemoteSourceUnavailable(format!(
            "GET {} (range {:?}) returned status {}",
            url, range, other
        ))),
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn unavailable(url: &str, err: reqwest::Error) -> GeoconnexError {
    GeoconnexError::RemoteSourceUnavailable(format!("{}: {}", url, err))
}
