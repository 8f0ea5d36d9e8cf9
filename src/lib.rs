//! earthcrawl - administrative boundaries and populated places from OSM.
//!
//! Queries Nominatim (name resolution) and Overpass (spatial queries) for
//! named regions, then exports the results as KML map overlays and CSV
//! spreadsheets. The library exposes the search pipeline and its event
//! surface; the bundled binary is one possible presentation layer.

pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod nominatim;
pub mod overpass;
pub mod pipeline;
pub mod progress;

pub use config::{Config, SearchScope};
pub use error::{CrawlError, ServiceError};
pub use models::{AdminRegion, AreaCandidate, OsmType, PlacePoint, PlaceRecord, SearchRequest};
pub use pipeline::SearchPipeline;
pub use progress::{PipelineEvent, ProgressReporter, Stage};
