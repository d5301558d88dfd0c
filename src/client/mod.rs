pub mod boundary;
pub mod buffer;
pub mod geoconnex;
pub mod traits;
pub mod types;

pub use boundary::FgbBoundarySource;
pub use buffer::{CachedBuffer, HttpBuffer, HttpOpener};
pub use geoconnex::{CATCHMENTS_URL, GEOCONNEX_FEATURES_URL, GeoconnexClient};
pub use traits::{BoundarySource, BufferOpener, CandidateStream, RemoteBuffer};
pub use types::{BBox, ClientOptions, HttpClient};
