//! Track synchronization: fit a still frame's duration to its audio.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use drillreel_drill_model::job::JobMode;

use crate::assets::{AssetLoadError, AssetOutcome, AssetRole, Degradation, LoadedAsset};
use crate::compositor::ComposedFrame;
use crate::sequence::{Clip, ClipKind};

/// Shortest clip a short may have.
pub const SHORT_MIN_SECS: f64 = 4.0;

/// Shortest item clip a demo may have.
pub const DEMO_MIN_SECS: f64 = 5.0;

/// Silence kept after the audio ends.
pub const AUDIO_TAIL_SECS: f64 = 0.5;

pub fn minimum_duration(mode: JobMode) -> f64 {
    match mode {
        JobMode::Short => SHORT_MIN_SECS,
        JobMode::Demo => DEMO_MIN_SECS,
    }
}

/// Clip length for a given minimum and optional audio length.
pub fn clip_duration(minimum: f64, audio_secs: Option<f64>) -> f64 {
    match audio_secs {
        Some(secs) if secs.is_finite() && secs >= 0.0 => minimum.max(secs + AUDIO_TAIL_SECS),
        _ => minimum,
    }
}

/// Measures the playback length of a media file.
pub trait MediaProbe: Send + Sync {
    fn duration_secs(&self, path: &Path) -> Result<f64, AssetLoadError>;
}

/// [`MediaProbe`] backed by the `ffprobe` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeProbe;

impl MediaProbe for FfprobeProbe {
    fn duration_secs(&self, path: &Path) -> Result<f64, AssetLoadError> {
        let locator = path.display().to_string();
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .map_err(|e| AssetLoadError::Unreadable {
                locator: locator.clone(),
                message: format!("failed to run ffprobe: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssetLoadError::decode(locator, stderr.trim()));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| AssetLoadError::decode(locator, "ffprobe reported no duration"))
    }
}

fn parse_duration(raw: &str) -> Option<f64> {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// An audio file bound to a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// Binds frames and audio into clips of the right length.
#[derive(Clone)]
pub struct TrackSynchronizer {
    probe: Arc<dyn MediaProbe>,
}

impl TrackSynchronizer {
    pub fn new(probe: Arc<dyn MediaProbe>) -> Self {
        Self { probe }
    }

    /// Build the clip for one item.
    ///
    /// Audio bytes are written into `scratch` so the encoder can read them.
    /// Any audio problem leaves the clip silent at the mode minimum.
    pub fn bind(
        &self,
        mode: JobMode,
        kind: ClipKind,
        frame: ComposedFrame,
        audio: AssetOutcome<LoadedAsset>,
        scratch: &Path,
    ) -> Clip {
        let minimum = minimum_duration(mode);
        let mut degradations = frame.degradations;

        let track = match audio {
            AssetOutcome::Absent => None,
            AssetOutcome::Degraded(degradation) => {
                degradations.push(degradation);
                None
            }
            AssetOutcome::Ready(asset) => match self.materialize(&asset, kind, scratch) {
                Ok(track) => Some(track),
                Err(err) => {
                    tracing::warn!(locator = %asset.locator, error = %err, "Audio unusable, clip stays silent");
                    degradations.push(Degradation::new(AssetRole::Audio, asset.locator, &err));
                    None
                }
            },
        };

        let duration_secs = clip_duration(minimum, track.as_ref().map(|t| t.duration_secs));
        if let ClipKind::Item(index) = kind {
            degradations = degradations
                .into_iter()
                .map(|d| d.for_item(index))
                .collect();
        }

        tracing::debug!(
            ?kind,
            duration_secs,
            has_audio = track.is_some(),
            "Clip bound"
        );

        Clip {
            kind,
            frame: frame.image,
            duration_secs,
            audio: track,
            degradations,
        }
    }

    fn materialize(
        &self,
        asset: &LoadedAsset,
        kind: ClipKind,
        scratch: &Path,
    ) -> Result<AudioTrack, AssetLoadError> {
        let slot = match kind {
            ClipKind::Intro => "intro".to_string(),
            ClipKind::Item(index) => format!("{index:03}"),
            ClipKind::Outro => "outro".to_string(),
        };
        let ext = asset.extension().unwrap_or("audio");
        let path = scratch.join(format!("audio_{slot}.{ext}"));

        std::fs::write(&path, &asset.bytes).map_err(|e| AssetLoadError::Unreadable {
            locator: asset.locator.clone(),
            message: format!("failed to stage audio at {}: {e}", path.display()),
        })?;

        let duration_secs = self.probe.duration_secs(&path)?;
        Ok(AudioTrack {
            path,
            duration_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use proptest::prelude::*;

    /// Reads the staged file back as a decimal duration.
    struct TextProbe;

    impl MediaProbe for TextProbe {
        fn duration_secs(&self, path: &Path) -> Result<f64, AssetLoadError> {
            let raw = std::fs::read_to_string(path).map_err(|e| AssetLoadError::Unreadable {
                locator: path.display().to_string(),
                message: e.to_string(),
            })?;
            parse_duration(&raw)
                .ok_or_else(|| AssetLoadError::decode(path.display().to_string(), "not a number"))
        }
    }

    fn frame() -> ComposedFrame {
        ComposedFrame {
            image: RgbImage::new(2, 2),
            photo: None,
            degradations: Vec::new(),
        }
    }

    fn audio(body: &str) -> AssetOutcome<LoadedAsset> {
        AssetOutcome::Ready(LoadedAsset {
            locator: "/media/audio/a.mp3".to_string(),
            bytes: body.as_bytes().to_vec(),
        })
    }

    #[test]
    fn test_short_durations() {
        assert_eq!(clip_duration(SHORT_MIN_SECS, None), 4.0);
        assert_eq!(clip_duration(SHORT_MIN_SECS, Some(2.0)), 4.0);
        assert_eq!(clip_duration(SHORT_MIN_SECS, Some(5.0)), 5.5);
        assert_eq!(clip_duration(DEMO_MIN_SECS, Some(f64::NAN)), 5.0);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("3.250000\n"), Some(3.25));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_bind_stages_audio_and_extends_clip() {
        let scratch = tempfile::tempdir().unwrap();
        let sync = TrackSynchronizer::new(Arc::new(TextProbe));

        let clip = sync.bind(JobMode::Short, ClipKind::Item(0), frame(), audio("5.0"), scratch.path());
        assert_eq!(clip.duration_secs, 5.5);
        let track = clip.audio.unwrap();
        assert!(track.path.starts_with(scratch.path()));
        assert_eq!(track.path.extension().unwrap(), "mp3");
        assert!(clip.degradations.is_empty());
    }

    #[test]
    fn test_unprobeable_audio_degrades_to_minimum() {
        let scratch = tempfile::tempdir().unwrap();
        let sync = TrackSynchronizer::new(Arc::new(TextProbe));

        let clip = sync.bind(JobMode::Demo, ClipKind::Item(2), frame(), audio("garbage"), scratch.path());
        assert_eq!(clip.duration_secs, DEMO_MIN_SECS);
        assert!(clip.audio.is_none());
        assert_eq!(clip.degradations.len(), 1);
        assert_eq!(clip.degradations[0].item, Some(2));
        assert_eq!(clip.degradations[0].role, AssetRole::Audio);
    }

    #[test]
    fn test_loader_degradation_is_carried() {
        let scratch = tempfile::tempdir().unwrap();
        let sync = TrackSynchronizer::new(Arc::new(TextProbe));
        let missing = AssetLoadError::NotFound {
            locator: "x.mp3".to_string(),
        };
        let outcome = AssetOutcome::Degraded(Degradation::new(AssetRole::Audio, "x.mp3", &missing));

        let clip = sync.bind(JobMode::Short, ClipKind::Item(0), frame(), outcome, scratch.path());
        assert_eq!(clip.duration_secs, SHORT_MIN_SECS);
        assert_eq!(clip.degradations[0].cause, "not_found");
    }

    proptest! {
        #[test]
        fn duration_never_below_minimum(audio in proptest::option::of(0.0f64..600.0), demo in any::<bool>()) {
            let mode = if demo { JobMode::Demo } else { JobMode::Short };
            let minimum = minimum_duration(mode);
            let secs = clip_duration(minimum, audio);
            prop_assert!(secs >= minimum);
            if let Some(a) = audio {
                prop_assert!(secs >= a + AUDIO_TAIL_SECS);
                prop_assert!(secs == minimum || secs == a + AUDIO_TAIL_SECS);
            } else {
                prop_assert_eq!(secs, minimum);
            }
        }
    }
}
