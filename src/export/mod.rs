//! Export writers: KML map overlays and CSV spreadsheets.
//!
//! Both sinks accumulate in memory and write once per search request;
//! nothing is flushed incrementally.

pub mod kml;
pub mod sheet;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

pub use kml::{KmlDocument, KmlFolder, KmlStyle};
pub use sheet::write_spreadsheet;
