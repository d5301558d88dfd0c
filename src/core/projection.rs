use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GeoconnexError;

/// Columns a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnName {
    Id,
    Geometry,
    Bbox,
    GeoconnexSitemap,
}

impl ColumnName {
    pub const ALL: [ColumnName; 4] = [
        ColumnName::Id,
        ColumnName::Geometry,
        ColumnName::Bbox,
        ColumnName::GeoconnexSitemap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnName::Id => "id",
            ColumnName::Geometry => "geometry",
            ColumnName::Bbox => "bbox",
            ColumnName::GeoconnexSitemap => "geoconnex_sitemap",
        }
    }

    /// Whether the column surfaces as a feature property.
    pub fn is_property(&self) -> bool {
        matches!(self, ColumnName::Id | ColumnName::GeoconnexSitemap)
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnName {
    type Err = GeoconnexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| GeoconnexError::Config(format!("unknown column: {}", s)))
    }
}

/// A set of requested columns.
///
/// The default is every column except `bbox`, which is normally only a
/// filter input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection(BTreeSet<ColumnName>);

impl ColumnSelection {
    pub fn new(columns: impl IntoIterator<Item = ColumnName>) -> Self {
        Self(columns.into_iter().collect())
    }

    pub fn all() -> Self {
        Self::new(ColumnName::ALL)
    }

    pub fn contains(&self, column: ColumnName) -> bool {
        self.0.contains(&column)
    }

    pub fn iter(&self) -> impl Iterator<Item = ColumnName> + '_ {
        self.0.iter().copied()
    }

    /// Splits the selection into what to transfer and what to surface.
    pub fn resolve(&self) -> Projection {
        let mut transfer = self.0.clone();
        transfer.insert(ColumnName::Geometry);

        Projection {
            transfer,
            properties: self.iter().filter(ColumnName::is_property).collect(),
            include_bbox: self.contains(ColumnName::Bbox),
        }
    }
}

impl Default for ColumnSelection {
    fn default() -> Self {
        Self::new([
            ColumnName::Id,
            ColumnName::Geometry,
            ColumnName::GeoconnexSitemap,
        ])
    }
}

impl FromIterator<ColumnName> for ColumnSelection {
    fn from_iter<I: IntoIterator<Item = ColumnName>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<const N: usize> From<[ColumnName; N]> for ColumnSelection {
    fn from(columns: [ColumnName; N]) -> Self {
        Self::new(columns)
    }
}

/// Outcome of resolving a [`ColumnSelection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    transfer: BTreeSet<ColumnName>,
    properties: Vec<ColumnName>,
    include_bbox: bool,
}

impl Projection {
    /// Columns read from the remote file. Always includes geometry.
    pub fn transfer(&self) -> impl Iterator<Item = ColumnName> + '_ {
        self.transfer.iter().copied()
    }

    /// Property columns, in output order. A property key is emitted for
    /// exactly these columns.
    pub fn properties(&self) -> &[ColumnName] {
        &self.properties
    }

    /// Whether each feature carries its row bbox.
    pub fn include_bbox(&self) -> bool {
        self.include_bbox
    }
}
