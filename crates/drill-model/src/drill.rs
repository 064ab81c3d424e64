//! Catalog drill records.
//!
//! A drill is owned by the catalog service. Drillreel only reads it, either
//! from a JSON export or from a request payload, using the catalog's field
//! names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A learning unit with parallel Catalan, Tachelhit and Arabic text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drill {
    pub id: i64,

    #[serde(default = "Utc::now")]
    pub date_created: DateTime<Utc>,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub text_catalan: Option<String>,

    #[serde(default)]
    pub text_tachelhit: Option<String>,

    #[serde(default)]
    pub text_arabic: Option<String>,

    /// Recorded pronunciation.
    #[serde(default)]
    pub audio_url: Option<String>,

    /// Synthesized speech for the Catalan text.
    #[serde(default)]
    pub audio_tts_url: Option<String>,

    #[serde(default)]
    pub video_url: Option<String>,

    #[serde(default)]
    pub image_url: Option<String>,
}

impl Drill {
    /// Create an empty drill with the given id, as the catalog does on insert.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            date_created: Utc::now(),
            tag: None,
            text_catalan: None,
            text_tachelhit: None,
            text_arabic: None,
            audio_url: None,
            audio_tts_url: None,
            video_url: None,
            image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_catalog_export_row() {
        let json = r#"{
            "id": 12,
            "date_created": "2025-03-01T10:00:00Z",
            "text_catalan": "Bon dia",
            "text_tachelhit": "Azul",
            "audio_tts_url": "https://res.cloudinary.com/demo/video/upload/tts_12.mp3"
        }"#;
        let drill: Drill = serde_json::from_str(json).unwrap();
        assert_eq!(drill.id, 12);
        assert_eq!(drill.text_catalan.as_deref(), Some("Bon dia"));
        assert!(drill.text_arabic.is_none());
        assert!(drill.audio_url.is_none());
        assert!(drill.audio_tts_url.is_some());
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let before = Utc::now();
        let drill: Drill = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert!(drill.date_created >= before);
    }
}
