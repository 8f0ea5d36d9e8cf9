//! Display-name selection from OSM tag mappings.

use crate::error::CrawlError;
use crate::models::Tags;

/// Pick a display name by language preference: `name:<lang>`, then the
/// English fallback `name:en`, then the bare `name` tag.
///
/// An empty preference means "no preference" and goes straight to the bare
/// `name` tag.
pub fn choose_name(tags: &Tags, lang: &str) -> Result<String, CrawlError> {
    if !lang.is_empty() {
        if let Some(name) = tags.get(&format!("name:{lang}")) {
            return Ok(name.clone());
        }
        if let Some(name) = tags.get("name:en") {
            return Ok(name.clone());
        }
    }
    tags.get("name").cloned().ok_or_else(|| CrawlError::MissingName {
        lang: lang.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags() -> Tags {
        [
            ("name", "Int_name"),
            ("name:en", "En_name"),
            ("name:de", "De_name"),
            ("name:ru", "Ru_name"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_preferred_language_wins() {
        assert_eq!(choose_name(&tags(), "de").unwrap(), "De_name");
        assert_eq!(choose_name(&tags(), "ru").unwrap(), "Ru_name");
    }

    #[test]
    fn test_english_fallback_for_unknown_language() {
        assert_eq!(choose_name(&tags(), "fr").unwrap(), "En_name");
    }

    #[test]
    fn test_empty_preference_uses_bare_name() {
        assert_eq!(choose_name(&tags(), "").unwrap(), "Int_name");
    }

    #[test]
    fn test_bare_name_last_resort() {
        let mut t = tags();
        t.remove("name:en");
        assert_eq!(choose_name(&t, "fr").unwrap(), "Int_name");
    }

    #[test]
    fn test_missing_everything_errors() {
        let t = Tags::new();
        assert!(matches!(
            choose_name(&t, "de"),
            Err(CrawlError::MissingName { .. })
        ));
    }
}
