//! Search line parsing and the administrative-level try list.

use crate::error::CrawlError;
use crate::models::SearchRequest;

/// Administrative level used when a search entry carries none.
pub const DEFAULT_ADMIN_LEVEL: u8 = 4;

/// Fallback order tried after the requested level yields nothing.
pub const FALLBACK_ADMIN_LEVELS: [u8; 8] = [4, 5, 6, 7, 8, 9, 10, 3];

/// Parse `"Name1[=level1]; Name2[=level2]; ..."` into search requests.
///
/// Segments are trimmed, empty segments dropped, and each segment split on
/// the first `=`. A non-numeric level rejects the whole line.
pub fn parse_search_line(line: &str) -> Result<Vec<SearchRequest>, CrawlError> {
    let mut requests = Vec::new();
    for segment in line.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let request = match segment.split_once('=') {
            Some((name, level)) => {
                let level = level
                    .trim()
                    .parse()
                    .map_err(|_| CrawlError::BadSearchSegment(segment.to_string()))?;
                SearchRequest::new(name.trim(), level)
            }
            None => SearchRequest::new(segment, DEFAULT_ADMIN_LEVEL),
        };
        requests.push(request);
    }
    Ok(requests)
}

/// Build the try order of administrative levels: the requested level
/// first, then the fallback sequence with that level removed.
pub fn admin_level_try_list(target: u8, fallback: &[u8]) -> Vec<u8> {
    let mut list = vec![target];
    list.extend(fallback.iter().copied().filter(|&level| level != target));
    list
}
