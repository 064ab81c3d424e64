//! Clips and timeline assembly.

use drillreel_common::error::{DrillreelError, DrillreelResult};
use drillreel_drill_model::job::JobMode;
use image::RgbImage;

use crate::assets::Degradation;
use crate::sync::AudioTrack;

/// Length of the demo intro and outro cards.
pub const TITLE_CARD_SECS: f64 = 3.0;

/// What a clip shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    Intro,
    /// Zero-based position of the item in the job.
    Item(usize),
    Outro,
}

/// A still frame held for a fixed duration, with at most one audio track.
#[derive(Debug, Clone)]
pub struct Clip {
    pub kind: ClipKind,
    pub frame: RgbImage,
    pub duration_secs: f64,
    pub audio: Option<AudioTrack>,
    pub degradations: Vec<Degradation>,
}

impl Clip {
    /// A silent clip with nothing degraded.
    pub fn still(kind: ClipKind, frame: RgbImage, duration_secs: f64) -> Self {
        Self {
            kind,
            frame,
            duration_secs,
            audio: None,
            degradations: Vec::new(),
        }
    }
}

/// Intro and outro cards bracketing a demo.
#[derive(Debug, Clone)]
pub struct TitleCards {
    pub intro: Clip,
    pub outro: Clip,
}

/// An ordered, gapless run of clips.
#[derive(Debug, Clone)]
pub struct Timeline {
    mode: JobMode,
    clips: Vec<Clip>,
}

impl Timeline {
    pub fn mode(&self) -> JobMode {
        self.mode
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.clips.iter().map(|c| c.duration_secs).sum()
    }

    pub fn has_audio(&self) -> bool {
        self.clips.iter().any(|c| c.audio.is_some())
    }

    /// Frame dimensions shared by every clip.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.clips.first().map(|c| c.frame.dimensions())
    }

    pub fn degradations(&self) -> impl Iterator<Item = &Degradation> {
        self.clips.iter().flat_map(|c| c.degradations.iter())
    }
}

/// Order clips into a timeline.
///
/// A short is exactly its one clip. A demo is the intro card, the item
/// clips in input order, then the outro card.
pub fn assemble(
    mode: JobMode,
    clips: Vec<Clip>,
    titles: Option<TitleCards>,
) -> DrillreelResult<Timeline> {
    match mode {
        JobMode::Short => {
            if clips.len() != 1 {
                return Err(DrillreelError::render_input(format!(
                    "A short timeline holds exactly one clip, got {}",
                    clips.len()
                )));
            }
            if titles.is_some() {
                return Err(DrillreelError::render_input(
                    "Shorts do not take title cards",
                ));
            }
            Ok(Timeline { mode, clips })
        }
        JobMode::Demo => {
            if clips.is_empty() {
                return Err(DrillreelError::render_input("A demo needs at least one clip"));
            }
            let Some(TitleCards { intro, outro }) = titles else {
                return Err(DrillreelError::render_input(
                    "A demo needs intro and outro cards",
                ));
            };

            let mut ordered = Vec::with_capacity(clips.len() + 2);
            ordered.push(intro);
            ordered.extend(clips);
            ordered.push(outro);
            Ok(Timeline {
                mode,
                clips: ordered,
            })
        }
    }
}
