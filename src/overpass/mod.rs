//! Spatial query client for the Overpass API.
//!
//! One operation: run an Overpass QL query with an explicit timeout. Query
//! text for the two shapes the pipeline needs (admin relations by level,
//! place features by type) is built by pure helpers so it can be tested
//! without a network.

mod response;

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::ServiceError;

pub use response::{OverpassElement, OverpassResponse};

const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";

/// Extra slack on the HTTP timeout over the server-side `[timeout:..]`,
/// so the server gets the chance to answer with its own timeout error.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Thin wrapper around the Overpass interpreter endpoint. No retry logic;
/// the pipeline's admin-level fallback loop is the only retry there is.
#[derive(Debug, Clone)]
pub struct OverpassClient {
    client: Client,
    endpoint: String,
}

impl OverpassClient {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: Client::builder()
                .user_agent("earthcrawl/0.1 (https://github.com/example/earthcrawl)")
                .build()
                .expect("Failed to create HTTP client"),
            endpoint: endpoint.to_string(),
        }
    }

    /// Run a query. `timeout` becomes the server-side `[timeout:..]`
    /// setting; the HTTP request itself is bounded slightly above it.
    pub async fn query(
        &self,
        ql: &str,
        timeout: Duration,
    ) -> Result<OverpassResponse, ServiceError> {
        let data = format!("[out:json][timeout:{}];{}", timeout.as_secs(), ql);
        debug!(query = %data, "overpass query");

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("data", &data)])
            .timeout(timeout + HTTP_TIMEOUT_SLACK)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status()));
        }

        let body: OverpassResponse = response.json().await?;
        Ok(body)
    }
}

impl Default for OverpassClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Query for administrative relations of one level inside an area.
pub fn admin_relations_ql(area_id: i64, level: u8) -> String {
    format!(
        "area({area_id})->.a;\
         relation[\"boundary\"=\"administrative\"][\"admin_level\"=\"{level}\"](area.a);\
         out body;"
    )
}

/// Query for place features of the given types inside an area, unioned.
pub fn places_ql(area_id: i64, place_types: &[String]) -> String {
    let clauses: String = place_types
        .iter()
        .map(|choice| format!("nwr[\"place\"=\"{choice}\"](area.a);"))
        .collect();
    format!("area({area_id})->.a;({clauses});out center;")
}
