//! Name resolver client for the Nominatim HTTP API.
//!
//! Two operations: free-text / structured search returning ranked area
//! candidates, and lookup by OSM id returning address details and (when
//! requested) boundary geometry as GeoJSON.

mod response;

use reqwest::Client;
use tracing::debug;

use crate::config::SearchScope;
use crate::error::ServiceError;
use crate::models::{AreaCandidate, BoundaryGeometry, OsmType, Tags};

use response::{LookupItem, SearchItem};

const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org";

/// Result of a lookup by OSM id.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub display_name: String,
    /// Address tags (`country`, `state`, `county`, place types, ...).
    pub address: Tags,
    /// Boundary geometry, present when requested and the object has one.
    pub geometry: Option<BoundaryGeometry>,
}

/// Thin wrapper around the Nominatim API. No retry logic; a bare failure
/// propagates as [`ServiceError`].
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_ENDPOINT)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .user_agent("earthcrawl/0.1 (https://github.com/example/earthcrawl)")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resolve a name to a ranked list of area candidates.
    ///
    /// `scope` selects between a free-text query and a structured
    /// country/state query; `lang` is passed as the `accept-language` hint.
    /// An empty result list is not an error at this layer.
    pub async fn search(
        &self,
        text: &str,
        scope: SearchScope,
        lang: &str,
    ) -> Result<Vec<AreaCandidate>, ServiceError> {
        let url = format!("{}/search", self.base_url);
        let mut params: Vec<(&str, &str)> = vec![
            ("format", "jsonv2"),
            ("addressdetails", "1"),
            ("accept-language", lang),
        ];
        match scope {
            SearchScope::World => params.push(("q", text)),
            SearchScope::Country => params.push(("country", text)),
            SearchScope::State => params.push(("state", text)),
        }

        debug!(text, ?scope, "nominatim search");
        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status()));
        }

        let items: Vec<SearchItem> = response.json().await?;
        items.into_iter().map(SearchItem::into_candidate).collect()
    }

    /// Look up a single object by type and id.
    ///
    /// `zoom` controls address detail granularity (4 for regions, 10 for
    /// settlements); `with_geometry` asks for the boundary as GeoJSON.
    /// Returns `None` when the service does not know the object.
    pub async fn lookup(
        &self,
        osm_type: OsmType,
        osm_id: i64,
        zoom: u8,
        lang: &str,
        with_geometry: bool,
    ) -> Result<Option<LookupResult>, ServiceError> {
        let url = format!("{}/lookup", self.base_url);
        let osm_ids = format!("{}{}", osm_type.prefix(), osm_id);
        let zoom_str = zoom.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("format", "jsonv2"),
            ("addressdetails", "1"),
            ("osm_ids", &osm_ids),
            ("zoom", &zoom_str),
            ("accept-language", lang),
        ];
        if with_geometry {
            params.push(("polygon_geojson", "1"));
        }

        debug!(%osm_ids, zoom, with_geometry, "nominatim lookup");
        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status()));
        }

        let mut items: Vec<LookupItem> = response.json().await?;
        if items.is_empty() {
            return Ok(None);
        }
        items.remove(0).into_result().map(Some)
    }
}

impl Default for NominatimClient {
    fn default() -> Self {
        Self::new()
    }
}
