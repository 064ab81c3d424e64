//! Application configuration.
//!
//! Configuration is loaded once at process start and passed by value into
//! the components that need it. Storage credentials may also come from the
//! environment (`CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`,
//! `CLOUDINARY_API_SECRET`), which takes precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where encoded videos are written.
    pub output_dir: PathBuf,

    /// Root that `/media/...` locators resolve against.
    pub media_root: PathBuf,

    /// Font selection for frame text.
    pub fonts: FontConfig,

    /// Encoder defaults.
    pub render: RenderDefaults,

    /// Remote object storage. `None` keeps outputs on local disk.
    pub storage: Option<StorageConfig>,

    /// Timeout applied to each remote asset fetch.
    pub fetch_timeout_secs: u64,

    /// Branding line shown on the demo outro card.
    pub branding: String,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Font file locations. Unset entries fall back to well-known system fonts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub bold: Option<PathBuf>,
    pub regular: Option<PathBuf>,
}

/// Default encoder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output frame rate.
    pub fps: u32,

    /// x264 preset.
    pub preset: String,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Audio sample rate used for the mixed track.
    pub audio_sample_rate: u32,
}

/// Credentials and placement for the Cloudinary media host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,

    /// Folder that uploaded videos land in.
    #[serde(default = "default_storage_folder")]
    pub folder: String,

    /// Digest the account expects upload signatures in.
    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,
}

/// Upload signature digest. Cloudinary accounts default to SHA-1 unless
/// switched to SHA-256 in their security settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }
}

impl std::str::FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            other => Err(format!("unknown signature algorithm '{other}'")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "drillreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("media").join("shorts"),
            media_root: PathBuf::from("media"),
            fonts: FontConfig::default(),
            render: RenderDefaults::default(),
            storage: None,
            fetch_timeout_secs: 30,
            branding: "tachelhit-drills.vercel.app".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            fps: 24,
            preset: "medium".to_string(),
            video_bitrate_kbps: 4000,
            audio_bitrate_kbps: 192,
            audio_sample_rate: 44100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

fn default_storage_folder() -> String {
    "tachelhit/shorts".to_string()
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults,
    /// then apply environment overrides.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        let mut config = Self::default();
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(parsed) => config = parsed,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        config.apply_env_from(|key| std::env::var(key).ok());
        config
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Apply environment overrides using the given lookup.
    ///
    /// Remote storage is only enabled when all three Cloudinary credentials
    /// are present and non-empty.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(dir) = non_empty("DRILLREEL_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty("DRILLREEL_MEDIA_ROOT") {
            self.media_root = PathBuf::from(dir);
        }

        if let (Some(cloud_name), Some(api_key), Some(api_secret)) = (
            non_empty("CLOUDINARY_CLOUD_NAME"),
            non_empty("CLOUDINARY_API_KEY"),
            non_empty("CLOUDINARY_API_SECRET"),
        ) {
            let folder = non_empty("DRILLREEL_STORAGE_FOLDER")
                .or_else(|| self.storage.as_ref().map(|s| s.folder.clone()))
                .unwrap_or_else(default_storage_folder);
            let signature_algorithm = self
                .storage
                .as_ref()
                .map(|s| s.signature_algorithm)
                .unwrap_or_default();
            self.storage = Some(StorageConfig {
                cloud_name,
                api_key,
                api_secret,
                folder,
                signature_algorithm,
            });
        }

        if let (Some(storage), Some(raw)) = (
            self.storage.as_mut(),
            non_empty("CLOUDINARY_SIGNATURE_ALGORITHM"),
        ) {
            match raw.parse() {
                Ok(algorithm) => storage.signature_algorithm = algorithm,
                Err(e) => tracing::warn!("Ignoring CLOUDINARY_SIGNATURE_ALGORITHM: {}", e),
            }
        }
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("drillreel").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_keep_outputs_local() {
        let config = AppConfig::default();
        assert!(config.storage.is_none());
        assert_eq!(config.render.fps, 24);
        assert_eq!(config.output_dir, PathBuf::from("media/shorts"));
    }

    #[test]
    fn test_env_enables_storage_only_with_full_credentials() {
        let mut config = AppConfig::default();
        let partial = env(&[("CLOUDINARY_CLOUD_NAME", "demo")]);
        config.apply_env_from(|k| partial.get(k).cloned());
        assert!(config.storage.is_none());

        let full = env(&[
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
        ]);
        config.apply_env_from(|k| full.get(k).cloned());
        let storage = config.storage.expect("storage should be configured");
        assert_eq!(storage.cloud_name, "demo");
        assert_eq!(storage.folder, "tachelhit/shorts");
        assert_eq!(storage.signature_algorithm, SignatureAlgorithm::Sha1);
    }

    #[test]
    fn test_signature_algorithm_override() {
        let mut config = AppConfig::default();
        let vars = env(&[
            ("CLOUDINARY_CLOUD_NAME", "demo"),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
            ("CLOUDINARY_SIGNATURE_ALGORITHM", "SHA-256"),
        ]);
        config.apply_env_from(|k| vars.get(k).cloned());
        let storage = config.storage.as_ref().unwrap();
        assert_eq!(storage.signature_algorithm, SignatureAlgorithm::Sha256);

        let from_file: StorageConfig = serde_json::from_str(
            r#"{"cloud_name": "demo", "api_key": "k", "api_secret": "s", "signature_algorithm": "sha256"}"#,
        )
        .unwrap();
        assert_eq!(from_file.signature_algorithm, SignatureAlgorithm::Sha256);
        assert!("md5".parse::<SignatureAlgorithm>().is_err());
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = AppConfig::default();
        let vars = env(&[
            ("CLOUDINARY_CLOUD_NAME", "  "),
            ("CLOUDINARY_API_KEY", "key"),
            ("CLOUDINARY_API_SECRET", "secret"),
            ("DRILLREEL_OUTPUT_DIR", ""),
        ]);
        config.apply_env_from(|k| vars.get(k).cloned());
        assert!(config.storage.is_none());
        assert_eq!(config.output_dir, PathBuf::from("media/shorts"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"output_dir": "/srv/videos", "render": {"fps": 30}}"#).unwrap();

        let mut config: AppConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        config.apply_env_from(|_| None);
        assert_eq!(config.output_dir, PathBuf::from("/srv/videos"));
        assert_eq!(config.render.fps, 30);
        assert_eq!(config.render.preset, "medium");
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.branding = "example.org".to_string();
        config.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let reloaded: AppConfig = serde_json::from_str(&content).unwrap();
        assert_eq!(reloaded.branding, "example.org");
    }
}
