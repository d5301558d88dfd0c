//! In-memory stand-ins for the remote sources, shared by unit tests.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arrow_array::{ArrayRef, BinaryArray, Float64Array, RecordBatch, StringArray, StructArray};
use arrow_schema::{DataType, Field, Fields, Schema};
use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use futures::future::BoxFuture;
use futures::stream;
use geo::BoundingRect;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::client::{BBox, BoundarySource, BufferOpener, CandidateStream, RemoteBuffer};
use crate::core::CandidateFeature;
use crate::error::GeoconnexError;

/// Byte buffer that counts reads and can be told to drop every read after
/// the first `n`.
pub struct MemoryBuffer {
    bytes: Bytes,
    reads: AtomicUsize,
    fail_after: Option<usize>,
}

impl MemoryBuffer {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            reads: AtomicUsize::new(0),
            fail_after: None,
        }
    }

    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl RemoteBuffer for MemoryBuffer {
    fn byte_length(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn slice(&self, range: Range<u64>) -> BoxFuture<'_, Result<Bytes, GeoconnexError>> {
        async move {
            let previous = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|n| previous >= n) {
                return Err(GeoconnexError::RemoteSourceUnavailable(
                    "connection dropped".into(),
                ));
            }
            if range.end > self.bytes.len() as u64 || range.start > range.end {
                return Err(GeoconnexError::RemoteSourceUnavailable(format!(
                    "range {:?} out of bounds",
                    range
                )));
            }
            Ok(self.bytes.slice(range.start as usize..range.end as usize))
        }
        .boxed()
    }
}

/// Opener over a fixed in-memory file that counts opens and can be told to
/// fail the first `n` attempts.
#[derive(Clone)]
pub struct MemoryOpener {
    bytes: Bytes,
    opens: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    buffers: Arc<Mutex<Vec<Arc<MemoryBuffer>>>>,
}

impl MemoryOpener {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            opens: Arc::new(AtomicUsize::new(0)),
            failures_left: Arc::new(AtomicUsize::new(0)),
            buffers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_first(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    /// Open attempts, including failed ones.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Byte-range reads across every buffer this opener produced.
    pub fn reads(&self) -> usize {
        self.buffers.lock().unwrap().iter().map(|b| b.reads()).sum()
    }
}

impl BufferOpener for MemoryOpener {
    fn open(&self) -> BoxFuture<'_, Result<Arc<dyn RemoteBuffer>, GeoconnexError>> {
        async move {
            self.opens.fetch_add(1, Ordering::SeqCst);
            let should_fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if should_fail {
                return Err(GeoconnexError::RemoteSourceUnavailable(
                    "simulated outage".into(),
                ));
            }
            let buffer = Arc::new(MemoryBuffer::new(self.bytes.clone()));
            self.buffers.lock().unwrap().push(buffer.clone());
            Ok(buffer as Arc<dyn RemoteBuffer>)
        }
        .boxed()
    }
}

/// One fixture row: id, WKB geometry, row-bbox, sitemap.
pub struct FixtureRow {
    pub id: &'static str,
    pub wkb: Vec<u8>,
    pub bbox: [f64; 4],
    pub sitemap: Option<&'static str>,
}

pub fn wkb_point(x: f64, y: f64) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&x.to_le_bytes());
    out.extend_from_slice(&y.to_le_bytes());
    out
}

pub fn wkb_line(coords: &[(f64, f64)]) -> Vec<u8> {
    let mut out = vec![1u8];
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(coords.len() as u32).to_le_bytes());
    for (x, y) in coords {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}

pub fn wkb_rect(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Vec<u8> {
    let ring = [
        (xmin, ymin),
        (xmax, ymin),
        (xmax, ymax),
        (xmin, ymax),
        (xmin, ymin),
    ];
    let mut out = vec![1u8];
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(ring.len() as u32).to_le_bytes());
    for (x, y) in ring {
        out.extend_from_slice(&x.to_le_bytes());
        out.extend_from_slice(&y.to_le_bytes());
    }
    out
}

/// The Long Island fixture, written in file order. Against the query box
/// `[-73.2, 40.5, -73.0, 41.0]`:
///
/// - contained: `a`, `b`, `f`
/// - intersecting only: `c` (sticks out west), `e` (covers the whole box)
/// - disjoint: `d`, `g`
pub fn long_island_rows() -> Vec<FixtureRow> {
    vec![
        FixtureRow {
            id: "a",
            wkb: wkb_point(-73.1, 40.9),
            bbox: [-73.1, 40.9, -73.1, 40.9],
            sitemap: Some("sitemap/a.xml"),
        },
        FixtureRow {
            id: "b",
            wkb: wkb_line(&[(-73.15, 40.6), (-73.05, 40.7)]),
            bbox: [-73.15, 40.6, -73.05, 40.7],
            sitemap: Some("sitemap/b.xml"),
        },
        FixtureRow {
            id: "c",
            wkb: wkb_line(&[(-73.3, 40.8), (-73.1, 40.85)]),
            bbox: [-73.3, 40.8, -73.1, 40.85],
            sitemap: Some("sitemap/c.xml"),
        },
        FixtureRow {
            id: "e",
            wkb: wkb_rect(-74.0, 40.0, -72.0, 42.0),
            bbox: [-74.0, 40.0, -72.0, 42.0],
            sitemap: Some("sitemap/e.xml"),
        },
        FixtureRow {
            id: "d",
            wkb: wkb_point(-72.0, 40.0),
            bbox: [-72.0, 40.0, -72.0, 40.0],
            sitemap: Some("sitemap/d.xml"),
        },
        FixtureRow {
            id: "g",
            wkb: wkb_point(-71.0, 39.0),
            bbox: [-71.0, 39.0, -71.0, 39.0],
            sitemap: Some("sitemap/g.xml"),
        },
        FixtureRow {
            id: "f",
            wkb: wkb_point(-73.05, 40.95),
            bbox: [-73.05, 40.95, -73.05, 40.95],
            sitemap: None,
        },
    ]
}

fn bbox_fields() -> Fields {
    Fields::from(vec![
        Field::new("xmin", DataType::Float64, false),
        Field::new("ymin", DataType::Float64, false),
        Field::new("xmax", DataType::Float64, false),
        Field::new("ymax", DataType::Float64, false),
    ])
}

const GEO_METADATA: &str = r#"{
    "version": "1.1.0",
    "primary_column": "geometry",
    "columns": {
        "geometry": {
            "encoding": "WKB",
            "geometry_types": [],
            "covering": {
                "bbox": {
                    "xmin": ["bbox", "xmin"],
                    "ymin": ["bbox", "ymin"],
                    "xmax": ["bbox", "xmax"],
                    "ymax": ["bbox", "ymax"]
                }
            }
        }
    }
}"#;

/// Writes `rows` as GeoParquet with two rows per row group.
pub fn geoparquet_bytes(rows: &[FixtureRow]) -> Bytes {
    let ids: StringArray = rows.iter().map(|r| Some(r.id)).collect();
    let geometries: BinaryArray = rows.iter().map(|r| Some(r.wkb.as_slice())).collect();
    let sitemaps: StringArray = rows.iter().map(|r| r.sitemap).collect();

    let column = |i: usize| -> ArrayRef {
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.bbox[i]).collect::<Vec<f64>>(),
        ))
    };
    let bbox = StructArray::new(
        bbox_fields(),
        vec![column(0), column(1), column(2), column(3)],
        None,
    );

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("geometry", DataType::Binary, true),
        Field::new("bbox", DataType::Struct(bbox_fields()), false),
        Field::new("geoconnex_sitemap", DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(ids),
            Arc::new(geometries),
            Arc::new(bbox),
            Arc::new(sitemaps),
        ],
    )
    .unwrap();

    let props = WriterProperties::builder()
        .set_max_row_group_size(2)
        .build();

    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema, Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.append_key_value_metadata(KeyValue::new("geo".to_string(), GEO_METADATA.to_string()));
    writer.close().unwrap();

    Bytes::from(buf)
}

pub fn long_island_parquet() -> Bytes {
    geoparquet_bytes(&long_island_rows())
}

/// Boundary source over a fixed list that filters by bounding-rect overlap
/// and counts how many candidates were pulled from its streams.
#[derive(Clone)]
pub struct MemoryBoundary {
    candidates: Vec<CandidateFeature>,
    pulled: Arc<AtomicUsize>,
    windows: Arc<Mutex<Vec<BBox>>>,
}

impl MemoryBoundary {
    pub fn new(candidates: Vec<CandidateFeature>) -> Self {
        Self {
            candidates,
            pulled: Arc::new(AtomicUsize::new(0)),
            windows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<BBox> {
        self.windows.lock().unwrap().clone()
    }
}

impl BoundarySource for MemoryBoundary {
    fn candidates(&self, window: BBox) -> BoxFuture<'_, Result<CandidateStream, GeoconnexError>> {
        async move {
            self.windows.lock().unwrap().push(window);
            let selected: Vec<CandidateFeature> = self
                .candidates
                .iter()
                .filter(|c| {
                    c.geometry
                        .as_ref()
                        .and_then(|g| g.bounding_rect())
                        .is_some_and(|r| {
                            r.min().x <= window.xmax()
                                && r.max().x >= window.xmin()
                                && r.min().y <= window.ymax()
                                && r.max().y >= window.ymin()
                        })
                })
                .cloned()
                .collect();

            let pulled = self.pulled.clone();
            let stream = stream::iter(selected).map(move |c| {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok(c)
            });
            Ok(Box::pin(stream) as CandidateStream)
        }
        .boxed()
    }
}
