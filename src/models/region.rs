//! Search requests and administrative region types.

use geo_types::{MultiPolygon, Polygon};

use super::place::Tags;

/// One entry of the parsed search line: a region name plus the requested
/// administrative level (default 4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub name: String,
    pub admin_level: u8,
}

impl SearchRequest {
    pub fn new(name: impl Into<String>, admin_level: u8) -> Self {
        Self {
            name: name.into(),
            admin_level,
        }
    }
}

/// An administrative relation returned by the spatial query.
///
/// Boundary geometry is resolved lazily in stage 3 through the name
/// resolver; the Overpass result only carries the relation id and tags.
#[derive(Debug, Clone)]
pub struct AdminRegion {
    pub id: i64,
    pub tags: Tags,
}

impl AdminRegion {
    /// Overpass area id of this relation.
    pub fn area_id(&self) -> i64 {
        super::place::RELATION_AREA_OFFSET + self.id
    }
}

/// Boundary geometry of a region, classified by ring count.
#[derive(Debug, Clone)]
pub enum BoundaryGeometry {
    Single(Polygon<f64>),
    Multi(MultiPolygon<f64>),
}

impl BoundaryGeometry {
    /// Number of exported shapes this geometry produces.
    pub fn shape_count(&self) -> usize {
        match self {
            BoundaryGeometry::Single(_) => 1,
            BoundaryGeometry::Multi(mp) => mp.0.len(),
        }
    }
}
