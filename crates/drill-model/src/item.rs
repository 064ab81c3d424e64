//! Render items: the per-frame projection of a drill.

use serde::{Deserialize, Serialize};

use crate::drill::Drill;
use crate::job::JobMode;

/// The text/media fields needed to render one frame.
///
/// A render item has no identity of its own; within a job it is identified
/// by its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderItem {
    /// Top band text.
    #[serde(default)]
    pub text_catalan: Option<String>,

    /// Middle band text.
    #[serde(default)]
    pub text_arabic: Option<String>,

    /// Bottom band text.
    #[serde(default)]
    pub text_tachelhit: Option<String>,

    #[serde(default)]
    pub image_url: Option<String>,

    #[serde(default)]
    pub audio_url: Option<String>,
}

/// One of the three fixed text bands of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Top,
    Middle,
    Bottom,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Top, Band::Middle, Band::Bottom];
}

impl RenderItem {
    /// Project a drill into a render item.
    ///
    /// Shorts prefer the recorded pronunciation and fall back to TTS; demos
    /// prefer TTS and fall back to the recording.
    pub fn from_drill(drill: &Drill, mode: JobMode) -> Self {
        let audio = match mode {
            JobMode::Short => first_present(&drill.audio_url, &drill.audio_tts_url),
            JobMode::Demo => first_present(&drill.audio_tts_url, &drill.audio_url),
        };

        Self {
            text_catalan: present(&drill.text_catalan),
            text_arabic: present(&drill.text_arabic),
            text_tachelhit: present(&drill.text_tachelhit),
            image_url: present(&drill.image_url),
            audio_url: audio,
        }
    }

    /// Text for a band, or `None` when missing or blank.
    pub fn band_text(&self, band: Band) -> Option<&str> {
        let raw = match band {
            Band::Top => &self.text_catalan,
            Band::Middle => &self.text_arabic,
            Band::Bottom => &self.text_tachelhit,
        };
        raw.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    pub fn image_locator(&self) -> Option<&str> {
        self.image_url
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    pub fn audio_locator(&self) -> Option<&str> {
        self.audio_url
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }

    pub fn has_text(&self) -> bool {
        Band::ALL.iter().any(|band| self.band_text(*band).is_some())
    }

    /// True when the item has nothing to render at all.
    pub fn is_blank(&self) -> bool {
        !self.has_text() && self.image_locator().is_none() && self.audio_locator().is_none()
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        let text = Band::ALL
            .iter()
            .find_map(|band| self.band_text(*band))
            .unwrap_or("No text");
        text.chars().take(30).collect()
    }
}

/// An item as supplied on the wire: either a full catalog drill or an
/// already projected render item.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemSource {
    Drill(Drill),
    Item(RenderItem),
}

impl ItemSource {
    pub fn into_item(self, mode: JobMode) -> RenderItem {
        match self {
            ItemSource::Drill(drill) => RenderItem::from_drill(&drill, mode),
            ItemSource::Item(item) => item,
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn first_present(primary: &Option<String>, secondary: &Option<String>) -> Option<String> {
    present(primary).or_else(|| present(secondary))
}
