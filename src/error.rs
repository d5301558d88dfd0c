use std::fmt;

use thiserror::Error;

/// Coordinate axis named in an ordering error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
        }
    }
}

#[derive(Error, Debug)]
pub enum GeoconnexError {
    #[error("bbox must have exactly 4 numeric components: {0}")]
    InvalidBoundingBoxShape(String),

    #[error("bbox {axis}min ({min}) must not be greater than {axis}max ({max})")]
    InvalidBoundingBoxOrdering { axis: Axis, min: f64, max: f64 },

    #[error("Remote source unavailable: {0}")]
    RemoteSourceUnavailable(String),

    #[error("Malformed remote row: {0}")]
    MalformedRemoteRow(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Geometry decoding failed: {0}")]
    Geozero(#[from] geozero::error::GeozeroError),

    #[error("Boundary stream error: {0}")]
    Boundary(#[from] flatgeobuf::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl GeoconnexError {
    /// Recovers a crate error that was tunnelled through the parquet reader.
    ///
    /// Buffer reads inside the parquet decoder can only fail with a
    /// [`ParquetError`](parquet::errors::ParquetError), so transport failures are
    /// boxed into `ParquetError::External` on the way in and unwrapped here.
    pub fn from_parquet(err: parquet::errors::ParquetError) -> Self {
        match err {
            parquet::errors::ParquetError::External(inner) => {
                match inner.downcast::<GeoconnexError>() {
                    Ok(original) => *original,
                    Err(other) => GeoconnexError::Parquet(
                        parquet::errors::ParquetError::External(other),
                    ),
                }
            }
            other => GeoconnexError::Parquet(other),
        }
    }

    /// Boxes this error for transport through a parquet reader callback.
    pub fn into_parquet(self) -> parquet::errors::ParquetError {
        parquet::errors::ParquetError::External(Box::new(self))
    }
}
