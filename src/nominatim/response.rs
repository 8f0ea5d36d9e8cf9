//! Wire types for Nominatim JSON responses.
//!
//! Nominatim serializes coordinates as strings and geometry as GeoJSON;
//! these types absorb that and convert into the crate's domain models.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;

use crate::error::ServiceError;
use crate::models::{AreaCandidate, BoundaryGeometry, OsmType, Tags};

use super::LookupResult;

#[derive(Debug, Deserialize)]
pub(super) struct SearchItem {
    osm_type: String,
    osm_id: i64,
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default)]
    address: Tags,
}

impl SearchItem {
    pub(super) fn into_candidate(self) -> Result<AreaCandidate, ServiceError> {
        let osm_type: OsmType = self.osm_type.parse().map_err(ServiceError::Decode)?;
        let lat = parse_coord(&self.lat)?;
        let lon = parse_coord(&self.lon)?;
        Ok(AreaCandidate {
            osm_type,
            osm_id: self.osm_id,
            display_name: self.display_name,
            lat,
            lon,
            address: self.address,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct LookupItem {
    display_name: String,
    #[serde(default)]
    address: Tags,
    #[serde(default)]
    geojson: Option<GeoJsonGeometry>,
}

impl LookupItem {
    pub(super) fn into_result(self) -> Result<LookupResult, ServiceError> {
        let geometry = self.geojson.and_then(GeoJsonGeometry::into_boundary);
        Ok(LookupResult {
            display_name: self.display_name,
            address: self.address,
            geometry,
        })
    }
}

fn parse_coord(value: &str) -> Result<f64, ServiceError> {
    value
        .parse()
        .map_err(|_| ServiceError::Decode(format!("bad coordinate '{value}'")))
}

/// Subset of GeoJSON we care about. Anything else (points, line strings)
/// carries no boundary and maps to `None`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(super) enum GeoJsonGeometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
    #[serde(other)]
    Other,
}

impl GeoJsonGeometry {
    /// Convert to a boundary, keeping only exterior rings. Interior rings
    /// (holes) are not exported as shapes.
    fn into_boundary(self) -> Option<BoundaryGeometry> {
        match self {
            GeoJsonGeometry::Polygon { coordinates } => {
                ring_to_polygon(coordinates.into_iter().next()?).map(BoundaryGeometry::Single)
            }
            GeoJsonGeometry::MultiPolygon { coordinates } => {
                let polygons: Vec<Polygon<f64>> = coordinates
                    .into_iter()
                    .filter_map(|rings| ring_to_polygon(rings.into_iter().next()?))
                    .collect();
                if polygons.is_empty() {
                    None
                } else {
                    Some(BoundaryGeometry::Multi(MultiPolygon(polygons)))
                }
            }
            GeoJsonGeometry::Other => None,
        }
    }
}

fn ring_to_polygon(ring: Vec<[f64; 2]>) -> Option<Polygon<f64>> {
    if ring.len() < 4 {
        return None;
    }
    let coords: Vec<Coord<f64>> = ring.into_iter().map(|[x, y]| Coord { x, y }).collect();
    Some(Polygon::new(LineString::new(coords), vec![]))
}
