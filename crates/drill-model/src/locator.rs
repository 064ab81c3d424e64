//! Media locators.
//!
//! Catalog rows reference media in three shapes: absolute remote URLs,
//! `/media/...` paths served by the catalog's own static route, and plain
//! filesystem paths. Older rows also carry two known corruptions: a scheme
//! missing its colon (`https//host/...`) and the API host glued in front of
//! an absolute media-host URL.

use std::path::{Path, PathBuf};

const MEDIA_PREFIX: &str = "/media/";
const MEDIA_HOST: &str = "res.cloudinary.com";

/// A classified media reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// `http://` or `https://` URL.
    Remote(String),
    /// Path relative to the configured media root.
    Media(PathBuf),
    /// Filesystem path used as-is.
    Local(PathBuf),
}

impl Locator {
    /// Normalize and classify a raw locator. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_locator(raw)?;

        if normalized.starts_with("http://") || normalized.starts_with("https://") {
            return Some(Locator::Remote(normalized));
        }

        if let Some(rest) = normalized.strip_prefix(MEDIA_PREFIX) {
            return Some(Locator::Media(PathBuf::from(rest)));
        }

        Some(Locator::Local(PathBuf::from(normalized)))
    }

    /// Filesystem path for non-remote locators.
    pub fn local_path(&self, media_root: &Path) -> Option<PathBuf> {
        match self {
            Locator::Remote(_) => None,
            Locator::Media(relative) => Some(media_root.join(relative)),
            Locator::Local(path) => Some(path.clone()),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Locator::Remote(_))
    }
}

/// Repair known locator corruptions. Returns `None` for blank input.
pub fn normalize_locator(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut value = repair_scheme(trimmed);

    // Strip anything glued in front of an embedded media-host URL.
    if let Some(host_idx) = value.find(MEDIA_HOST) {
        let head = &value[..host_idx];
        let embedded_start = head
            .rfind("https://")
            .into_iter()
            .chain(head.rfind("http://"))
            .max();
        if let Some(start) = embedded_start {
            if start > 0 {
                value = value[start..].to_string();
            }
        }
    }

    Some(value)
}

fn repair_scheme(value: &str) -> String {
    let mut repaired = value.replace("https//", "https://");
    repaired = repaired.replace("http//", "http://");
    while repaired.contains(":://") {
        repaired = repaired.replace(":://", "://");
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_remote_url_is_kept() {
        let loc = Locator::parse("https://res.cloudinary.com/demo/image/upload/a.jpg").unwrap();
        assert_eq!(
            loc,
            Locator::Remote("https://res.cloudinary.com/demo/image/upload/a.jpg".to_string())
        );
        assert!(loc.is_remote());
    }

    #[test]
    fn test_missing_colon_is_repaired() {
        assert_eq!(
            normalize_locator("https//res.cloudinary.com/demo/a.mp3").unwrap(),
            "https://res.cloudinary.com/demo/a.mp3"
        );
        assert_eq!(
            normalize_locator("http//example.org/a.mp3").unwrap(),
            "http://example.org/a.mp3"
        );
    }

    #[test]
    fn test_api_host_prefix_is_stripped() {
        let raw = "https://tachelhit-drills-api.onrender.comhttps//res.cloudinary.com/demo/a.jpg";
        assert_eq!(
            normalize_locator(raw).unwrap(),
            "https://res.cloudinary.com/demo/a.jpg"
        );
    }

    #[test]
    fn test_media_path_resolves_under_root() {
        let loc = Locator::parse("/media/images/drill_3.jpg").unwrap();
        assert_eq!(loc, Locator::Media(PathBuf::from("images/drill_3.jpg")));
        assert_eq!(
            loc.local_path(Path::new("/srv/media")).unwrap(),
            PathBuf::from("/srv/media/images/drill_3.jpg")
        );
    }

    #[test]
    fn test_plain_path_is_local() {
        let loc = Locator::parse(" ./audio/a.mp3 ").unwrap();
        assert_eq!(loc, Locator::Local(PathBuf::from("./audio/a.mp3")));
        assert!(Locator::parse("   ").is_none());
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[a-z:/._]{0,40}") {
            if let Some(once) = normalize_locator(&raw) {
                let twice = normalize_locator(&once).unwrap();
                prop_assert_eq!(once, twice);
            }
        }
    }
}
