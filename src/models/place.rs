//! Place and candidate types returned by the name resolver.

use std::collections::HashMap;
use std::str::FromStr;

/// OSM tag mapping (`name`, `name:de`, `boundary`, ...).
pub type Tags = HashMap<String, String>;

/// Offset of Overpass areas derived from relations.
pub const RELATION_AREA_OFFSET: i64 = 3_600_000_000;

/// Offset of Overpass areas derived from closed ways.
pub const WAY_AREA_OFFSET: i64 = 2_400_000_000;

/// Type of OSM object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsmType {
    Node,
    Way,
    Relation,
}

impl OsmType {
    /// Nominatim's single-letter prefix, as used in `/lookup?osm_ids=R60189`.
    pub fn prefix(&self) -> char {
        match self {
            OsmType::Node => 'N',
            OsmType::Way => 'W',
            OsmType::Relation => 'R',
        }
    }

    /// Derive the Overpass area id for an object of this type.
    ///
    /// Overpass areas are synthetic: relations map to `3_600_000_000 + id`,
    /// closed ways to `2_400_000_000 + id`. Nodes have no area.
    pub fn area_id(&self, osm_id: i64) -> Option<i64> {
        match self {
            OsmType::Relation => Some(RELATION_AREA_OFFSET + osm_id),
            OsmType::Way => Some(WAY_AREA_OFFSET + osm_id),
            OsmType::Node => None,
        }
    }
}

impl std::fmt::Display for OsmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsmType::Node => write!(f, "node"),
            OsmType::Way => write!(f, "way"),
            OsmType::Relation => write!(f, "relation"),
        }
    }
}

impl FromStr for OsmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" | "n" | "N" => Ok(OsmType::Node),
            "way" | "w" | "W" => Ok(OsmType::Way),
            "relation" | "r" | "R" => Ok(OsmType::Relation),
            other => Err(format!("unknown osm type '{other}'")),
        }
    }
}

/// One candidate area returned by name resolution.
///
/// A search request may yield several of these; exactly one is selected
/// (first result, or user-chosen in interactive mode) before the pipeline
/// continues.
#[derive(Debug, Clone)]
pub struct AreaCandidate {
    pub osm_type: OsmType,
    pub osm_id: i64,
    pub display_name: String,
    pub lat: f64,
    pub lon: f64,
    /// Address tags from the resolver (`country`, `state`, ...).
    pub address: Tags,
}

impl AreaCandidate {
    /// Overpass area id for this candidate, if it has one.
    pub fn area_id(&self) -> Option<i64> {
        self.osm_type.area_id(self.osm_id)
    }
}

/// A populated place found inside an admin region.
#[derive(Debug, Clone)]
pub struct PlacePoint {
    pub osm_type: OsmType,
    pub osm_id: i64,
    pub lon: f64,
    pub lat: f64,
}

/// A place point enriched with reverse-lookup address data, ready for the
/// spreadsheet. Missing address components stay `None` and export as empty
/// cells.
#[derive(Debug, Clone)]
pub struct PlaceRecord {
    pub location: String,
    pub county: Option<String>,
    pub state: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub lon: f64,
    pub lat: f64,
}
