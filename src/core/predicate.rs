use crate::client::BBox;

/// How a row's stored bbox must relate to the query box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Row bbox lies entirely inside the query box.
    Contained,
    /// Row bbox overlaps the query box at all, edges included.
    Intersecting,
}

/// One component of the per-row bbox column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BBoxField {
    Xmin,
    Ymin,
    Xmax,
    Ymax,
}

impl BBoxField {
    pub const ALL: [BBoxField; 4] = [
        BBoxField::Xmin,
        BBoxField::Ymin,
        BBoxField::Xmax,
        BBoxField::Ymax,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BBoxField::Xmin => "xmin",
            BBoxField::Ymin => "ymin",
            BBoxField::Xmax => "xmax",
            BBoxField::Ymax => "ymax",
        }
    }

    fn index(&self) -> usize {
        match self {
            BBoxField::Xmin => 0,
            BBoxField::Ymin => 1,
            BBoxField::Xmax => 2,
            BBoxField::Ymax => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Gte,
    Lte,
}

/// `row_bbox.field <op> value`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Bound {
    field: BBoxField,
    op: Comparison,
    value: f64,
}

impl Bound {
    fn holds(&self, v: f64) -> bool {
        match self.op {
            Comparison::Gte => v >= self.value,
            Comparison::Lte => v <= self.value,
        }
    }

    /// Whether any value in `[min, max]` can satisfy the bound.
    fn may_hold(&self, min: f64, max: f64) -> bool {
        match self.op {
            Comparison::Gte => max >= self.value,
            Comparison::Lte => min <= self.value,
        }
    }
}

/// Conjunction of four bounds over a row's precomputed bbox.
///
/// This only compares bounding boxes. For non-rectangular geometries it can
/// admit rows whose true shape is outside (contained mode) or does not touch
/// (intersecting mode) the query box.
#[derive(Debug, Clone, PartialEq)]
pub struct BBoxPredicate {
    mode: QueryMode,
    bounds: [Bound; 4],
}

impl BBoxPredicate {
    pub fn new(query: &BBox, mode: QueryMode) -> Self {
        use BBoxField::*;
        use Comparison::*;

        let bound = |field, op, value| Bound { field, op, value };
        let bounds = match mode {
            QueryMode::Contained => [
                bound(Xmin, Gte, query.xmin()),
                bound(Xmax, Lte, query.xmax()),
                bound(Ymin, Gte, query.ymin()),
                bound(Ymax, Lte, query.ymax()),
            ],
            QueryMode::Intersecting => [
                bound(Xmin, Lte, query.xmax()),
                bound(Xmax, Gte, query.xmin()),
                bound(Ymin, Lte, query.ymax()),
                bound(Ymax, Gte, query.ymin()),
            ],
        };

        Self { mode, bounds }
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Tests a row bbox given as `[xmin, ymin, xmax, ymax]`.
    pub fn matches(&self, row_bbox: [f64; 4]) -> bool {
        self.bounds.iter().all(|b| b.holds(row_bbox[b.field.index()]))
    }

    /// Whether a group of rows with per-field `(min, max)` statistics could
    /// hold a match. Fields without statistics never rule a group out.
    pub fn may_match<F>(&self, stats: F) -> bool
    where
        F: Fn(BBoxField) -> Option<(f64, f64)>,
    {
        self.bounds.iter().all(|b| match stats(b.field) {
            Some((min, max)) => b.may_hold(min, max),
            None => true,
        })
    }
}
