//! Core data models shared by the clients, the pipeline and the exporters.

pub mod place;
pub mod region;

pub use place::{AreaCandidate, OsmType, PlacePoint, PlaceRecord, Tags};
pub use region::{AdminRegion, BoundaryGeometry, SearchRequest};
