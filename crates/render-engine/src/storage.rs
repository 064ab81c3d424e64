//! Durable object storage for finished videos.

use std::path::Path;

use async_trait::async_trait;
use drillreel_common::config::{SignatureAlgorithm, StorageConfig};
use drillreel_common::error::{DrillreelError, DrillreelResult};
use sha1::Sha1;
use sha2::{Digest, Sha256};

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";

/// Resource class of an uploaded object. Only finished videos are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Video,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Video => "video",
        }
    }

    fn mime(self) -> &'static str {
        match self {
            ResourceKind::Video => "video/mp4",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not read upload source: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload request failed: {0}")]
    Request(String),

    #[error("upload rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected upload response: {0}")]
    MalformedResponse(String),
}

/// Stores a local file remotely and returns its public URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        path: &Path,
        folder: &str,
        key: &str,
        kind: ResourceKind,
    ) -> Result<String, StorageError>;

    fn name(&self) -> &str;
}

/// Signed uploads to Cloudinary.
pub struct CloudinaryStore {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    algorithm: SignatureAlgorithm,
    client: reqwest::Client,
}

impl CloudinaryStore {
    pub fn new(config: &StorageConfig) -> DrillreelResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DrillreelError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            algorithm: config.signature_algorithm,
            client,
        })
    }

    fn endpoint(&self, kind: ResourceKind) -> String {
        format!("{CLOUDINARY_API}/{}/{}/upload", self.cloud_name, kind.as_str())
    }
}

/// Hex digest over the sorted `key=value` pairs joined by `&`, followed by
/// the API secret.
pub fn sign_params(
    params: &[(&str, String)],
    secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let payload = format!("{joined}{secret}");
    let digest = match algorithm {
        SignatureAlgorithm::Sha1 => Sha1::digest(payload.as_bytes()).to_vec(),
        SignatureAlgorithm::Sha256 => Sha256::digest(payload.as_bytes()).to_vec(),
    };
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait]
impl ObjectStore for CloudinaryStore {
    async fn upload(
        &self,
        path: &Path,
        folder: &str,
        key: &str,
        kind: ResourceKind,
    ) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [
            ("folder", folder.to_string()),
            ("public_id", key.to_string()),
            ("timestamp", timestamp.clone()),
        ];
        let signature = sign_params(&signed, &self.api_secret, self.algorithm);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(kind.mime())
            .map_err(|e| StorageError::Request(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("folder", folder.to_string())
            .text("public_id", key.to_string())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", self.algorithm.as_str())
            .part("file", part);

        tracing::info!(
            cloud = %self.cloud_name,
            folder,
            key,
            kind = kind.as_str(),
            algorithm = self.algorithm.as_str(),
            "Uploading to object storage"
        );

        let response = self
            .client
            .post(self.endpoint(kind))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StorageError::MalformedResponse(e.to_string()))?;

        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("no error message")
                .to_string();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        body.get("secure_url")
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .ok_or_else(|| StorageError::MalformedResponse("missing secure_url".to_string()))
    }

    fn name(&self) -> &str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_order_independent() {
        let a = sign_params(
            &[("timestamp", "1700000000".into()), ("folder", "f".into())],
            "secret",
            SignatureAlgorithm::Sha256,
        );
        let b = sign_params(
            &[("folder", "f".into()), ("timestamp", "1700000000".into())],
            "secret",
            SignatureAlgorithm::Sha256,
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_matches_known_digests() {
        let params = [("public_id", "x".to_string()), ("timestamp", "1".to_string())];
        assert_eq!(
            sign_params(&params, "abc", SignatureAlgorithm::Sha256),
            "8e418befa5524e15b48f86972a42b015059d34c720cc42c21c2e93604dd85a60"
        );
        assert_eq!(
            sign_params(&params, "abc", SignatureAlgorithm::Sha1),
            "5d6627b5deca34ed5fb7739d34b2f993fb62c5cb"
        );
    }

    #[test]
    fn test_upload_signature_for_video_params() {
        let params = [
            ("timestamp", "1700000000".to_string()),
            ("public_id", "short_12".to_string()),
            ("folder", "tachelhit/shorts".to_string()),
        ];
        assert_eq!(
            sign_params(&params, "secret", SignatureAlgorithm::Sha1),
            "9eae35d53d1491c47477971db22dedaab2872c6a"
        );
        assert_eq!(
            sign_params(&params, "secret", SignatureAlgorithm::Sha256),
            "373eb35a1f1d4d4dc9ac559197c20aa5fe5d69018d48fdbe31267d75349ae179"
        );
    }

    #[test]
    fn test_endpoint_targets_video_uploads() {
        let store = CloudinaryStore::new(&StorageConfig {
            cloud_name: "demo".into(),
            api_key: "k".into(),
            api_secret: "s".into(),
            folder: "tachelhit/shorts".into(),
            signature_algorithm: SignatureAlgorithm::default(),
        })
        .unwrap();
        assert_eq!(
            store.endpoint(ResourceKind::Video),
            "https://api.cloudinary.com/v1_1/demo/video/upload"
        );
        assert_eq!(store.algorithm, SignatureAlgorithm::Sha1);
        assert_eq!(store.name(), "cloudinary");
    }
}
