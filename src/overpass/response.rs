//! Wire types for Overpass JSON responses.

use serde::Deserialize;

use crate::models::{AdminRegion, OsmType, PlacePoint, Tags};

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: i64,
    #[serde(default)]
    pub tags: Tags,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Present on ways/relations when the query uses `out center`.
    pub center: Option<Center>,
}

#[derive(Debug, Deserialize)]
pub struct Center {
    pub lat: f64,
    pub lon: f64,
}

impl OverpassElement {
    /// Coordinates of this element: its own for nodes, the computed
    /// center for ways and relations.
    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lon, self.lat) {
            (Some(lon), Some(lat)) => Some((lon, lat)),
            _ => self.center.as_ref().map(|c| (c.lon, c.lat)),
        }
    }
}

impl OverpassResponse {
    /// Administrative relations in the result.
    pub fn relations(&self) -> Vec<AdminRegion> {
        self.elements
            .iter()
            .filter(|e| e.element_type == "relation")
            .map(|e| AdminRegion {
                id: e.id,
                tags: e.tags.clone(),
            })
            .collect()
    }

    /// Place features with usable coordinates, in result order.
    /// Elements without coordinates or with an unknown type are dropped.
    pub fn points(&self) -> Vec<(PlacePoint, Tags)> {
        self.elements
            .iter()
            .filter_map(|e| {
                let (lon, lat) = e.coords()?;
                let osm_type: OsmType = e.element_type.parse().ok()?;
                Some((
                    PlacePoint {
                        osm_type,
                        osm_id: e.id,
                        lon,
                        lat,
                    },
                    e.tags.clone(),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relations_filtering() {
        let json = r#"{
            "elements": [
                {"type": "relation", "id": 79510,
                 "tags": {"name": "Leningrad Oblast", "admin_level": "4"}},
                {"type": "node", "id": 1, "lat": 59.9, "lon": 30.3,
                 "tags": {"place": "city"}}
            ]
        }"#;
        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        let relations = response.relations();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].id, 79510);
        assert_eq!(relations[0].tags.get("name").unwrap(), "Leningrad Oblast");
    }

    #[test]
    fn test_points_use_center_for_ways() {
        let json = r#"{
            "elements": [
                {"type": "node", "id": 1, "lat": 59.9, "lon": 30.3,
                 "tags": {"place": "city", "name": "Saint Petersburg"}},
                {"type": "way", "id": 2,
                 "center": {"lat": 60.0, "lon": 30.5},
                 "tags": {"place": "village"}},
                {"type": "relation", "id": 3, "tags": {"place": "town"}}
            ]
        }"#;
        let response: OverpassResponse = serde_json::from_str(json).unwrap();
        let points = response.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0.osm_type, OsmType::Node);
        assert_eq!(points[1].0.osm_type, OsmType::Way);
        assert_eq!(points[1].0.lat, 60.0);
        // Relation without center has no coordinates and is dropped.
    }

    #[test]
    fn test_empty_response() {
        let response: OverpassResponse = serde_json::from_str("{}").unwrap();
        assert!(response.relations().is_empty());
        assert!(response.points().is_empty());
    }
}
