//! The search pipeline.
//!
//! Orchestrates the name resolver and the spatial query client across four
//! stages per search request: area resolution, administrative-level
//! fallback search, per-region border/location search, and export. One
//! request at a time, one API call at a time; progress goes out through a
//! [`ProgressReporter`].

mod names;
mod parse;

use std::fs;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::CrawlError;
use crate::export::{sheet::RegionSheet, ExportError, KmlDocument, KmlFolder, KmlStyle};
use crate::models::{AdminRegion, AreaCandidate, PlaceRecord, SearchRequest};
use crate::nominatim::NominatimClient;
use crate::overpass::{admin_relations_ql, places_ql, OverpassClient};
use crate::progress::{ExportKind, ExportState, PipelineEvent, ProgressReporter, Stage};

pub use names::choose_name;
pub use parse::{admin_level_try_list, parse_search_line, DEFAULT_ADMIN_LEVEL, FALLBACK_ADMIN_LEVELS};

/// Server-side timeout for every Overpass query.
const OVERPASS_TIMEOUT: Duration = Duration::from_secs(60);

/// Nominatim zoom for region boundary lookups.
const BOUNDARY_ZOOM: u8 = 4;

/// Nominatim zoom for settlement address lookups.
const POINT_ZOOM: u8 = 10;

pub struct SearchPipeline {
    nominatim: NominatimClient,
    overpass: OverpassClient,
    config: Config,
    reporter: ProgressReporter,
    interactive: bool,
}

impl SearchPipeline {
    pub fn new(config: Config) -> Self {
        Self::with_clients(config, NominatimClient::new(), OverpassClient::new())
    }

    pub fn with_clients(
        config: Config,
        nominatim: NominatimClient,
        overpass: OverpassClient,
    ) -> Self {
        Self {
            nominatim,
            overpass,
            config,
            reporter: ProgressReporter::detached(),
            interactive: false,
        }
    }

    /// Attach an event channel for a presentation layer.
    pub fn reporter(mut self, reporter: ProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Suspend after area resolution and wait for an externally chosen
    /// candidate index instead of taking the first result.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Process a whole search line. Per-request failures are logged and
    /// skip that request's export; the batch continues. A `Finished` event
    /// is always emitted, also on the error paths.
    pub async fn run(&self, search_line: &str) -> Result<(), CrawlError> {
        let result = self.run_inner(search_line).await;
        self.reporter.publish(PipelineEvent::Finished);
        if let Err(err) = &result {
            error!(error = %err, "pipeline terminated");
        }
        result
    }

    async fn run_inner(&self, search_line: &str) -> Result<(), CrawlError> {
        let requests = parse_search_line(search_line)?;
        let count = requests.len();
        info!(count, "starting search batch");

        for (index, request) in requests.iter().enumerate() {
            self.reporter.object(index, count);
            match self.process_request(request).await {
                Ok(()) => {}
                // Cancellation comes from outside; stop the whole batch.
                Err(CrawlError::SelectionCancelled) => {
                    return Err(CrawlError::SelectionCancelled);
                }
                Err(err) => {
                    warn!(
                        request = %request.name,
                        error = %err,
                        "search request failed, skipping its export"
                    );
                    self.reporter.request_failed(index);
                }
            }
        }
        Ok(())
    }

    /// Stages 1-4 for one request. Any error skips export for this
    /// request only.
    async fn process_request(&self, request: &SearchRequest) -> Result<(), CrawlError> {
        let area = self.resolve_area(request).await?;
        info!(
            request = %request.name,
            resolved = %area.display_name,
            "area resolved"
        );

        let regions = self.find_admin_regions(&area, request).await?;

        let lang = &self.config.search.language;
        let style = KmlStyle {
            line_width: self.config.kml.line_width,
            line_color: self.config.kml.line_color.clone(),
        };
        let mut doc = KmlDocument::new(style, self.config.kml.polygons_to_lines);
        let mut sheets: Vec<RegionSheet> = Vec::new();

        let count = regions.len();
        for (index, region) in regions.iter().enumerate() {
            self.reporter.sub_object(index, count);

            let region_name = choose_name(&region.tags, lang).unwrap_or_else(|_| {
                warn!(relation = region.id, "region has no usable name tag");
                format!("relation/{}", region.id)
            });

            let mut folder = KmlFolder::named(&region_name);
            if self.config.search.borders {
                self.reporter.stage(Stage::RegionSearch);
                self.fetch_boundary(region, &region_name, &mut folder).await?;
            }
            if self.config.search.locations {
                self.reporter.stage(Stage::LocationSearch);
                let records = self.fetch_places(region, &mut folder).await?;
                sheets.push((region_name, records));
            }

            // Only group under a per-region folder when both searches ran;
            // a borders-only or locations-only export stays flat.
            if self.config.search.borders && self.config.search.locations {
                doc.root.add_folder(folder);
            } else {
                folder.merge_into(&mut doc.root);
            }
        }

        self.export(request, &doc, &sheets)
    }

    /// Stage 1: resolve the request's name to one area candidate.
    async fn resolve_area(&self, request: &SearchRequest) -> Result<AreaCandidate, CrawlError> {
        let mut candidates = self
            .nominatim
            .search(
                &request.name,
                self.config.search.scope,
                &self.config.search.language,
            )
            .await?;
        if candidates.is_empty() {
            return Err(CrawlError::Resolution(request.name.clone()));
        }

        let mut index = if self.interactive {
            self.await_selection(&candidates).await?
        } else {
            0
        };
        if index >= candidates.len() {
            warn!(index, count = candidates.len(), "selection out of range, using first");
            index = 0;
        }
        Ok(candidates.swap_remove(index))
    }

    /// Publish the candidate list and block until the presentation layer
    /// answers with an index. No timeout; dropping the reply sender is the
    /// cancellation path.
    async fn await_selection(&self, candidates: &[AreaCandidate]) -> Result<usize, CrawlError> {
        let (reply, chosen) = oneshot::channel();
        self.reporter.publish(PipelineEvent::CandidatesReady {
            candidates: candidates.to_vec(),
            reply,
        });
        chosen.await.map_err(|_| CrawlError::SelectionCancelled)
    }

    /// Stage 2: try administrative levels in fallback order until one
    /// yields relations.
    async fn find_admin_regions(
        &self,
        area: &AreaCandidate,
        request: &SearchRequest,
    ) -> Result<Vec<AdminRegion>, CrawlError> {
        let area_id = area.area_id().ok_or_else(|| {
            warn!(
                osm_type = %area.osm_type,
                osm_id = area.osm_id,
                "selected candidate has no enclosing area"
            );
            CrawlError::NoAdminLevel {
                name: request.name.clone(),
                tried: Vec::new(),
            }
        })?;

        let try_list = admin_level_try_list(request.admin_level, &FALLBACK_ADMIN_LEVELS);
        for &level in &try_list {
            let ql = admin_relations_ql(area_id, level);
            match self.overpass.query(&ql, OVERPASS_TIMEOUT).await {
                Ok(response) => {
                    let regions = response.relations();
                    if regions.is_empty() {
                        warn!(level, "no administrative level {level} found");
                        continue;
                    }
                    info!(level, count = regions.len(), "administrative level accepted");
                    return Ok(regions);
                }
                Err(err) if err.is_decode() => {
                    warn!(level, error = %err, "ill-typed response for level {level}");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(CrawlError::NoAdminLevel {
            name: request.name.clone(),
            tried: try_list,
        })
    }

    /// Stage 3a: re-resolve the region's boundary geometry and add it to
    /// the overlay.
    async fn fetch_boundary(
        &self,
        region: &AdminRegion,
        region_name: &str,
        folder: &mut KmlFolder,
    ) -> Result<(), CrawlError> {
        let lookup = self
            .nominatim
            .lookup(
                crate::models::OsmType::Relation,
                region.id,
                BOUNDARY_ZOOM,
                &self.config.search.language,
                true,
            )
            .await?;
        match lookup.and_then(|l| l.geometry) {
            Some(geometry) => {
                debug!(
                    region = region_name,
                    shapes = geometry.shape_count(),
                    "boundary resolved"
                );
                folder.add_boundary(region_name, &geometry);
            }
            None => warn!(region = region_name, "no boundary geometry returned"),
        }
        Ok(())
    }

    /// Stage 3b: find populated places inside the region and build the
    /// spreadsheet rows. Points without a usable name are skipped, not
    /// fatal.
    async fn fetch_places(
        &self,
        region: &AdminRegion,
        folder: &mut KmlFolder,
    ) -> Result<Vec<PlaceRecord>, CrawlError> {
        let lang = &self.config.search.language;
        let place_types = &self.config.search.place_types;
        // An empty union is not a valid query; nothing to search for.
        if place_types.is_empty() {
            warn!(relation = region.id, "no place types configured, skipping location search");
            return Ok(Vec::new());
        }
        let ql = places_ql(region.area_id(), place_types);
        let response = self.overpass.query(&ql, OVERPASS_TIMEOUT).await?;
        let points = response.points();
        let count = points.len();

        let mut records = Vec::with_capacity(count);
        for (index, (point, tags)) in points.into_iter().enumerate() {
            self.reporter.sub_object(index, count);

            let location = match choose_name(&tags, lang) {
                Ok(name) => name,
                Err(_) => {
                    debug!(
                        osm_type = %point.osm_type,
                        osm_id = point.osm_id,
                        "place has no usable name, skipping"
                    );
                    continue;
                }
            };

            let address = self
                .nominatim
                .lookup(point.osm_type, point.osm_id, POINT_ZOOM, lang, false)
                .await?
                .map(|l| l.address)
                .unwrap_or_default();

            folder.add_point(&location, point.lon, point.lat);
            records.push(PlaceRecord {
                location,
                county: address.get("county").cloned(),
                state: address.get("state").cloned(),
                region: address.get("region").cloned(),
                country: address.get("country").cloned(),
                lon: point.lon,
                lat: point.lat,
            });
        }
        Ok(records)
    }

    /// Stage 4: write the overlay and/or the spreadsheet, if enabled.
    fn export(
        &self,
        request: &SearchRequest,
        doc: &KmlDocument,
        sheets: &[RegionSheet],
    ) -> Result<(), CrawlError> {
        let export = &self.config.export;
        if !export.kml && !export.spreadsheet {
            return Ok(());
        }
        self.reporter.stage(Stage::Export);
        fs::create_dir_all(&export.directory).map_err(ExportError::Io)?;

        if export.kml {
            let suffix = if self.config.kml.polygons_to_lines {
                "lines"
            } else {
                "polygons"
            };
            let path = export
                .directory
                .join(format!("{} ({suffix}).kml", request.name));
            self.reporter.export(ExportKind::Kml, ExportState::Started);
            doc.save(&path)?;
            info!(path = %path.display(), "KML file saved");
            self.reporter.export(ExportKind::Kml, ExportState::Done);
        }

        if export.spreadsheet && self.config.search.locations {
            let path = export.directory.join(format!("{}.csv", request.name));
            self.reporter
                .export(ExportKind::Spreadsheet, ExportState::Started);
            crate::export::write_spreadsheet(&path, sheets)?;
            info!(path = %path.display(), "spreadsheet saved");
            self.reporter
                .export(ExportKind::Spreadsheet, ExportState::Done);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OsmType, Tags};
    use crate::progress::ProgressReporter;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Minimal HTTP server: one canned JSON body per connection, served in
    /// order, then the listener goes away.
    async fn stub_server(bodies: Vec<&'static str>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            for body in bodies {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request_complete(&request) {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\n\
                     content-type: application/json\r\n\
                     content-length: {}\r\n\
                     connection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        endpoint
    }

    /// True once the headers and any `Content-Length` body have arrived.
    fn request_complete(request: &[u8]) -> bool {
        let Some(split) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&request[..split]);
        let body_len = headers
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= split + 4 + body_len
    }

    fn russia_candidate() -> AreaCandidate {
        AreaCandidate {
            osm_type: OsmType::Relation,
            osm_id: 60_189,
            display_name: "Russia".to_string(),
            lat: 64.6863136,
            lon: 97.7453061,
            address: Tags::new(),
        }
    }

    const EMPTY_ELEMENTS: &str = r#"{"elements": []}"#;
    const OBLAST_ELEMENTS: &str = r#"{"elements": [{
        "type": "relation",
        "id": 102269,
        "tags": {"name": "Moscow Oblast", "admin_level": "5"}
    }]}"#;
    const RUSSIA_SEARCH: &str = r#"[{
        "osm_type": "relation",
        "osm_id": 60189,
        "lat": "64.6863136",
        "lon": "97.7453061",
        "display_name": "Russia"
    }]"#;

    #[tokio::test]
    async fn test_admin_fallback_advances_past_empty_level() {
        // Level 4 comes back empty; level 5 has a relation and is accepted
        // without consuming any further level.
        let overpass = stub_server(vec![EMPTY_ELEMENTS, OBLAST_ELEMENTS]).await;
        let pipeline = SearchPipeline::with_clients(
            Config::default(),
            NominatimClient::with_base_url("http://127.0.0.1:9"),
            OverpassClient::with_endpoint(&overpass),
        );

        let request = SearchRequest::new("Russia", 4);
        let regions = pipeline
            .find_admin_regions(&russia_candidate(), &request)
            .await
            .unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, 102_269);
        assert_eq!(regions[0].tags.get("name").unwrap(), "Moscow Oblast");
    }

    #[tokio::test]
    async fn test_admin_fallback_exhaustion_reports_tried_levels() {
        let overpass = stub_server(vec![EMPTY_ELEMENTS; 8]).await;
        let pipeline = SearchPipeline::with_clients(
            Config::default(),
            NominatimClient::with_base_url("http://127.0.0.1:9"),
            OverpassClient::with_endpoint(&overpass),
        );

        let request = SearchRequest::new("Russia", 4);
        let err = pipeline
            .find_admin_regions(&russia_candidate(), &request)
            .await
            .unwrap_err();
        match err {
            CrawlError::NoAdminLevel { name, tried } => {
                assert_eq!(name, "Russia");
                assert_eq!(tried, vec![4, 5, 6, 7, 8, 9, 10, 3]);
            }
            other => panic!("expected NoAdminLevel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_admin_exhaustion_skips_export_but_batch_continues() {
        // Both requests resolve, then run every admin level dry. Neither
        // must export anything and the run as a whole must still succeed.
        let nominatim = stub_server(vec![RUSSIA_SEARCH, RUSSIA_SEARCH]).await;
        let overpass = stub_server(vec![EMPTY_ELEMENTS; 16]).await;

        let dir = tempfile::tempdir().unwrap();
        let export_dir = dir.path().join("out");
        let mut config = Config::default();
        config.export.directory = export_dir.clone();

        let (reporter, mut rx) = ProgressReporter::channel();
        let pipeline = SearchPipeline::with_clients(
            config,
            NominatimClient::with_base_url(&nominatim),
            OverpassClient::with_endpoint(&overpass),
        )
        .reporter(reporter);
        pipeline.run("A; B").await.unwrap();
        drop(pipeline);

        assert!(!export_dir.exists());
        let mut failed = Vec::new();
        while let Some(event) = rx.recv().await {
            if let PipelineEvent::RequestFailed { index } = event {
                failed.push(index);
            }
        }
        assert_eq!(failed, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_empty_place_types_skips_location_search() {
        // One search response, one relations response, and nothing more:
        // with no place types configured the location query must never be
        // issued, so the request succeeds against a dead listener.
        let nominatim = stub_server(vec![RUSSIA_SEARCH]).await;
        let overpass = stub_server(vec![OBLAST_ELEMENTS]).await;

        let mut config = Config::default();
        config.search.borders = false;
        config.search.place_types = Vec::new();
        config.export.kml = false;
        config.export.spreadsheet = false;

        let (reporter, mut rx) = ProgressReporter::channel();
        let pipeline = SearchPipeline::with_clients(
            config,
            NominatimClient::with_base_url(&nominatim),
            OverpassClient::with_endpoint(&overpass),
        )
        .reporter(reporter);
        pipeline.run("Russia").await.unwrap();
        drop(pipeline);

        while let Some(event) = rx.recv().await {
            assert!(!matches!(event, PipelineEvent::RequestFailed { .. }));
        }
    }

    #[tokio::test]
    async fn test_empty_line_finishes_cleanly() {
        let (reporter, mut rx) = ProgressReporter::channel();
        let pipeline = SearchPipeline::new(Config::default()).reporter(reporter);
        pipeline.run(" ; ").await.unwrap();
        drop(pipeline);
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Finished)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_failed_request_skips_but_batch_continues() {
        let (reporter, mut rx) = ProgressReporter::channel();
        // Nothing listens on port 9; every request fails with a transport
        // error, which must skip the request but not the batch.
        let pipeline = SearchPipeline::with_clients(
            Config::default(),
            crate::nominatim::NominatimClient::with_base_url("http://127.0.0.1:9"),
            crate::overpass::OverpassClient::with_endpoint("http://127.0.0.1:9"),
        )
        .reporter(reporter);
        pipeline.run("A; B").await.unwrap();
        drop(pipeline);

        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::Object { index: 0, count: 2 })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::RequestFailed { index: 0 })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::Object { index: 1, count: 2 })
        ));
        assert!(matches!(
            rx.recv().await,
            Some(PipelineEvent::RequestFailed { index: 1 })
        ));
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Finished)));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_bad_line_errors_but_still_finishes() {
        let (reporter, mut rx) = ProgressReporter::channel();
        let pipeline = SearchPipeline::new(Config::default()).reporter(reporter);
        let result = pipeline.run("Russia=four").await;
        assert!(matches!(result, Err(CrawlError::BadSearchSegment(_))));
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Finished)));
    }
}
