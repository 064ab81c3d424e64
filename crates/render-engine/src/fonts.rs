//! Font resolution.
//!
//! A [`FontSet`] is resolved once at startup and shared by every frame of
//! every job. Resolution tries the configured paths, then well-known system
//! font locations, and finally settles on the built-in bitmap font. Glyph
//! metrics of the bitmap font differ from any vector font, so layout code
//! always measures text through the set instead of assuming widths.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use drillreel_common::config::FontConfig;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::builtin_font;

const BOLD_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/msttcorefonts/Arial_Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

const REGULAR_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/msttcorefonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Font weight used by a text element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    Bold,
    Regular,
}

enum Faces {
    Vector { bold: FontVec, regular: FontVec },
    Builtin,
}

/// The resolved pair of faces used for all frame text.
pub struct FontSet {
    faces: Faces,
    source: String,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet")
            .field("fallback", &self.is_fallback())
            .field("source", &self.source)
            .finish()
    }
}

impl FontSet {
    /// Resolve fonts from configuration and the system, falling back to the
    /// built-in bitmap font.
    pub fn resolve(config: &FontConfig) -> Self {
        let bold = load_first(config.bold.as_deref(), BOLD_CANDIDATES);
        let regular = load_first(config.regular.as_deref(), REGULAR_CANDIDATES);

        let faces = match (bold, regular) {
            (Some(bold), Some(regular)) => Some((bold, regular)),
            // Only one weight available: use it for both slots.
            (Some((face, path)), None) | (None, Some((face, path))) => {
                load_face(&path).map(|twin| ((face, path.clone()), (twin, path)))
            }
            (None, None) => None,
        };

        match faces {
            Some(((bold, bold_path), (regular, regular_path))) => {
                tracing::info!(
                    bold = %bold_path.display(),
                    regular = %regular_path.display(),
                    "Loaded vector fonts"
                );
                Self {
                    faces: Faces::Vector { bold, regular },
                    source: format!("{} + {}", bold_path.display(), regular_path.display()),
                }
            }
            None => {
                tracing::warn!("No usable font files found, using built-in bitmap font");
                Self::builtin()
            }
        }
    }

    /// Build a set from in-memory font data.
    pub fn from_bytes(bold: Vec<u8>, regular: Vec<u8>) -> Result<Self, ab_glyph::InvalidFont> {
        Ok(Self {
            faces: Faces::Vector {
                bold: FontVec::try_from_vec(bold)?,
                regular: FontVec::try_from_vec(regular)?,
            },
            source: "memory".to_string(),
        })
    }

    /// The built-in bitmap font.
    pub fn builtin() -> Self {
        Self {
            faces: Faces::Builtin,
            source: "builtin 5x7 bitmap".to_string(),
        }
    }

    /// Whether the degraded bitmap font is active.
    pub fn is_fallback(&self) -> bool {
        matches!(self.faces, Faces::Builtin)
    }

    /// Human-readable description of where the faces came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Width and height of `text` rendered at `size_px`.
    pub fn measure(&self, weight: FontWeight, size_px: f32, text: &str) -> (u32, u32) {
        match &self.faces {
            Faces::Vector { bold, regular } => {
                let face = match weight {
                    FontWeight::Bold => bold,
                    FontWeight::Regular => regular,
                };
                text_size(PxScale::from(size_px), face, text)
            }
            Faces::Builtin => builtin_font::measure(size_px, text),
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        canvas: &mut RgbImage,
        weight: FontWeight,
        size_px: f32,
        x: i32,
        y: i32,
        color: Rgb<u8>,
        text: &str,
    ) {
        match &self.faces {
            Faces::Vector { bold, regular } => {
                let face = match weight {
                    FontWeight::Bold => bold,
                    FontWeight::Regular => regular,
                };
                draw_text_mut(canvas, color, x, y, PxScale::from(size_px), face, text);
            }
            Faces::Builtin => builtin_font::draw(canvas, color, x, y, size_px, text),
        }
    }
}

fn load_first(configured: Option<&Path>, candidates: &[&str]) -> Option<(FontVec, PathBuf)> {
    if let Some(path) = configured {
        match load_face(path) {
            Some(face) => return Some((face, path.to_path_buf())),
            None => tracing::warn!(path = %path.display(), "Configured font could not be loaded"),
        }
    }

    candidates.iter().map(PathBuf::from).find_map(|path| {
        let face = load_face(&path)?;
        Some((face, path))
    })
}

fn load_face(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(face) => Some(face),
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "Font file is not a valid font");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_set_reports_fallback() {
        let fonts = FontSet::builtin();
        assert!(fonts.is_fallback());
        let (w, h) = fonts.measure(FontWeight::Bold, 70.0, "Azul");
        assert!(w > 0 && h > 0);
    }

    #[test]
    fn test_invalid_configured_font_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(load_face(&bogus).is_none());
        assert!(load_first(Some(&bogus), &[]).is_none());
    }

    #[test]
    fn test_resolve_without_any_font_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = FontConfig {
            bold: Some(dir.path().join("missing-bold.ttf")),
            regular: Some(dir.path().join("missing.ttf")),
        };
        // System candidates may exist on the host; either outcome is valid,
        // but the set must always be usable.
        let fonts = FontSet::resolve(&config);
        let (w, _) = fonts.measure(FontWeight::Regular, 50.0, "Bon dia");
        assert!(w > 0);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(FontSet::from_bytes(vec![0; 16], vec![0; 16]).is_err());
    }
}
