//! Asset loading.
//!
//! Photos and audio are optional decorations of a frame. A failure to load
//! one is never fatal: it is logged, recorded as a [`Degradation`], and the
//! render continues without the asset.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use drillreel_common::error::{DrillreelError, DrillreelResult};
use drillreel_drill_model::locator::Locator;
use serde::Serialize;

/// Why an asset could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum AssetLoadError {
    #[error("not found: {locator}")]
    NotFound { locator: String },

    #[error("unreadable {locator}: {message}")]
    Unreadable { locator: String, message: String },

    #[error("fetch failed for {locator}: {message}")]
    Fetch { locator: String, message: String },

    #[error("fetch timed out after {secs}s: {locator}")]
    Timeout { locator: String, secs: u64 },

    #[error("could not decode {locator}: {message}")]
    Decode { locator: String, message: String },
}

impl AssetLoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Unreadable { .. } => "unreadable",
            Self::Fetch { .. } => "fetch",
            Self::Timeout { .. } => "timeout",
            Self::Decode { .. } => "decode",
        }
    }

    pub fn decode(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            locator: locator.into(),
            message: message.into(),
        }
    }
}

/// Which slot of a frame an asset fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    Photo,
    Audio,
}

impl std::fmt::Display for AssetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetRole::Photo => f.write_str("photo"),
            AssetRole::Audio => f.write_str("audio"),
        }
    }
}

/// A recoverable asset failure, reported alongside the finished video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    /// Zero-based item position, when the failure belongs to an item.
    pub item: Option<usize>,
    pub role: AssetRole,
    pub locator: String,
    pub cause: &'static str,
    pub message: String,
}

impl Degradation {
    pub fn new(role: AssetRole, locator: impl Into<String>, error: &AssetLoadError) -> Self {
        Self {
            item: None,
            role,
            locator: locator.into(),
            cause: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn for_item(mut self, index: usize) -> Self {
        self.item = Some(index);
        self
    }
}

/// Raw bytes of a loaded asset and the locator they came from.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub locator: String,
    pub bytes: Vec<u8>,
}

impl LoadedAsset {
    /// File extension taken from the locator path, if it has a sane one.
    pub fn extension(&self) -> Option<&str> {
        let path = self.locator.split(['?', '#']).next().unwrap_or_default();
        let name = path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then_some(ext)
    }
}

/// Result of trying to load an optional asset.
#[derive(Debug, Clone)]
pub enum AssetOutcome<T> {
    /// No locator was supplied.
    Absent,
    Ready(T),
    /// A locator was supplied but the asset could not be used.
    Degraded(Degradation),
}

impl<T> AssetOutcome<T> {
    pub fn degradation(&self) -> Option<&Degradation> {
        match self {
            AssetOutcome::Degraded(d) => Some(d),
            _ => None,
        }
    }
}

/// Resolves a locator to bytes.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn load(&self, locator: &Locator) -> Result<Vec<u8>, AssetLoadError>;
}

/// Reads local and `/media/` paths from disk and fetches remote URLs over
/// HTTP with a bounded timeout.
pub struct DefaultAssetStore {
    media_root: PathBuf,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl DefaultAssetStore {
    pub fn new(media_root: impl Into<PathBuf>, timeout_secs: u64) -> DrillreelResult<Self> {
        let timeout_secs = timeout_secs.max(1);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DrillreelError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            media_root: media_root.into(),
            client,
            timeout_secs,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetLoadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_request_error(url, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AssetLoadError::NotFound {
                locator: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(AssetLoadError::Fetch {
                locator: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_request_error(url, e))?;
        Ok(bytes.to_vec())
    }

    fn map_request_error(&self, url: &str, err: reqwest::Error) -> AssetLoadError {
        if err.is_timeout() {
            AssetLoadError::Timeout {
                locator: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            AssetLoadError::Fetch {
                locator: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl AssetStore for DefaultAssetStore {
    async fn load(&self, locator: &Locator) -> Result<Vec<u8>, AssetLoadError> {
        match locator {
            Locator::Remote(url) => self.fetch(url).await,
            other => {
                let Some(path) = other.local_path(&self.media_root) else {
                    return Err(AssetLoadError::NotFound {
                        locator: format!("{other:?}"),
                    });
                };
                tokio::fs::read(&path).await.map_err(|e| {
                    let locator = path.display().to_string();
                    if e.kind() == std::io::ErrorKind::NotFound {
                        AssetLoadError::NotFound { locator }
                    } else {
                        AssetLoadError::Unreadable {
                            locator,
                            message: e.to_string(),
                        }
                    }
                })
            }
        }
    }
}

/// Load an optional asset, turning every failure into a degradation.
pub async fn load_optional(
    store: &dyn AssetStore,
    role: AssetRole,
    raw: Option<&str>,
) -> AssetOutcome<LoadedAsset> {
    let Some(raw) = raw else {
        return AssetOutcome::Absent;
    };
    let Some(locator) = Locator::parse(raw) else {
        return AssetOutcome::Absent;
    };

    match store.load(&locator).await {
        Ok(bytes) => {
            tracing::debug!(%role, locator = raw, bytes = bytes.len(), "Asset loaded");
            AssetOutcome::Ready(LoadedAsset {
                locator: raw.to_string(),
                bytes,
            })
        }
        Err(err) => {
            tracing::warn!(%role, locator = raw, cause = err.kind(), error = %err, "Asset unavailable, continuing without it");
            AssetOutcome::Degraded(Degradation::new(role, raw, &err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefaultAssetStore::new(dir.path(), 5).unwrap();
        let err = store
            .load(&Locator::Media("images/none.jpg".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_media_locator_reads_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("audio")).unwrap();
        std::fs::write(dir.path().join("audio/a.mp3"), b"ID3").unwrap();
        let store = DefaultAssetStore::new(dir.path(), 5).unwrap();

        let outcome = load_optional(&store, AssetRole::Audio, Some("/media/audio/a.mp3")).await;
        match outcome {
            AssetOutcome::Ready(asset) => {
                assert_eq!(asset.bytes, b"ID3");
                assert_eq!(asset.extension(), Some("mp3"));
            }
            other => panic!("expected ready asset, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_blank_and_missing_locators() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefaultAssetStore::new(dir.path(), 5).unwrap();

        assert!(matches!(
            load_optional(&store, AssetRole::Photo, None).await,
            AssetOutcome::Absent
        ));
        assert!(matches!(
            load_optional(&store, AssetRole::Photo, Some("  ")).await,
            AssetOutcome::Absent
        ));

        let outcome = load_optional(&store, AssetRole::Photo, Some("/media/gone.png")).await;
        let degradation = outcome.degradation().unwrap();
        assert_eq!(degradation.role, AssetRole::Photo);
        assert_eq!(degradation.cause, "not_found");
        assert_eq!(degradation.item, None);
    }

    #[test]
    fn test_extension_from_url() {
        let asset = |locator: &str| LoadedAsset {
            locator: locator.to_string(),
            bytes: Vec::new(),
        };
        assert_eq!(
            asset("https://res.cloudinary.com/x/video/upload/v1/tts_4.mp3?x=1").extension(),
            Some("mp3")
        );
        assert_eq!(asset("/media/audio/noext").extension(), None);
        assert_eq!(asset("a.with space").extension(), None);
    }
}
