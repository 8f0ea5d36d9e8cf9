//! CSV spreadsheet writer for place records.
//!
//! One file per search request. Regions are written in processing order,
//! so the per-region grouping of the records survives as contiguous row
//! blocks; rows within a region keep point-discovery order.

use std::path::Path;

use csv::Writer;

use crate::models::PlaceRecord;

use super::ExportError;

/// Rows collected for one region, keyed by the region's display name.
pub type RegionSheet = (String, Vec<PlaceRecord>);

pub fn write_spreadsheet(path: &Path, sheets: &[RegionSheet]) -> Result<(), ExportError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["location", "county", "state", "region", "country", "lon", "lat"])?;
    for (_region, records) in sheets {
        for record in records {
            let lon = record.lon.to_string();
            let lat = record.lat.to_string();
            let row: [&str; 7] = [
                record.location.as_str(),
                record.county.as_deref().unwrap_or(""),
                record.state.as_deref().unwrap_or(""),
                record.region.as_deref().unwrap_or(""),
                record.country.as_deref().unwrap_or(""),
                lon.as_str(),
                lat.as_str(),
            ];
            writer.write_record(row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(location: &str, country: Option<&str>) -> PlaceRecord {
        PlaceRecord {
            location: location.to_string(),
            county: None,
            state: Some("Leningrad Oblast".to_string()),
            region: None,
            country: country.map(str::to_string),
            lon: 30.5,
            lat: 60.0,
        }
    }

    #[test]
    fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sheets = vec![(
            "Leningrad Oblast".to_string(),
            vec![record("Vyborg", Some("Russia"))],
        )];
        write_spreadsheet(&path, &sheets).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "location,county,state,region,country,lon,lat"
        );
        assert_eq!(
            lines.next().unwrap(),
            "Vyborg,,Leningrad Oblast,,Russia,30.5,60"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_partial_records_export_with_empty_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sheets = vec![("R".to_string(), vec![record("Somewhere", None)])];
        write_spreadsheet(&path, &sheets).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Somewhere,,Leningrad Oblast,,,30.5,60"));
    }

    #[test]
    fn test_regions_stay_grouped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let sheets = vec![
            ("B".to_string(), vec![record("b1", None), record("b2", None)]),
            ("A".to_string(), vec![record("a1", None)]),
        ];
        write_spreadsheet(&path, &sheets).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let order: Vec<&str> = content
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(order, vec!["b1", "b2", "a1"]);
    }
}
