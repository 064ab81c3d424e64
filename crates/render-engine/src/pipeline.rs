//! End-to-end render: compose, synchronize, assemble, persist.

use std::sync::Arc;

use drillreel_common::config::AppConfig;
use drillreel_common::error::DrillreelResult;
use drillreel_drill_model::item::RenderItem;
use drillreel_drill_model::job::{JobMode, RenderJob};
use serde::Serialize;

use crate::assets::{load_optional, AssetRole, AssetStore, DefaultAssetStore, Degradation};
use crate::compositor::{ComposedFrame, FrameComposer, FrameLayout};
use crate::export::{OutputSink, Persisted, ProgressCallback};
use crate::fonts::FontSet;
use crate::sequence::{assemble, Clip, ClipKind, TitleCards, TITLE_CARD_SECS};
use crate::sync::{FfprobeProbe, MediaProbe, TrackSynchronizer};

/// Result of a successful render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutcome {
    /// Public URL or local path of the video.
    pub locator: String,
    pub persisted: Persisted,
    pub duration_secs: f64,
    pub clip_count: usize,
    pub degradations: Vec<Degradation>,
}

/// Renders jobs with a fixed set of collaborators.
pub struct RenderPipeline {
    composer: FrameComposer,
    assets: Arc<dyn AssetStore>,
    synchronizer: TrackSynchronizer,
    sink: OutputSink,
    branding: String,
}

impl RenderPipeline {
    pub fn new(
        fonts: Arc<FontSet>,
        assets: Arc<dyn AssetStore>,
        probe: Arc<dyn MediaProbe>,
        sink: OutputSink,
    ) -> Self {
        Self {
            composer: FrameComposer::new(fonts),
            assets,
            synchronizer: TrackSynchronizer::new(probe),
            sink,
            branding: String::new(),
        }
    }

    /// Production wiring: disk/HTTP assets, ffprobe, ffmpeg, and optional
    /// Cloudinary upload.
    pub fn from_config(config: &AppConfig, fonts: Arc<FontSet>) -> DrillreelResult<Self> {
        let assets = DefaultAssetStore::new(config.media_root.clone(), config.fetch_timeout_secs)?;
        let sink = OutputSink::from_config(config)?;
        Ok(Self::new(fonts, Arc::new(assets), Arc::new(FfprobeProbe), sink)
            .with_branding(config.branding.clone()))
    }

    /// Second line of the demo outro card.
    pub fn with_branding(mut self, branding: impl Into<String>) -> Self {
        self.branding = branding.into();
        self
    }

    /// Render a job to a persisted video.
    pub async fn render(
        &self,
        job: &RenderJob,
        progress: Option<ProgressCallback>,
    ) -> DrillreelResult<RenderOutcome> {
        job.validate()?;
        let filename = job.output_filename()?;

        tracing::info!(
            job_id = job.job_id,
            mode = %job.mode,
            items = job.items.len(),
            output = %filename,
            fonts_fallback = self.composer.fonts().is_fallback(),
            "Starting render"
        );

        // Staged audio lives here until the encode finishes.
        let scratch = tempfile::Builder::new()
            .prefix("drillreel-job-")
            .tempdir()?;
        let layout = FrameLayout::for_mode(job.mode);

        let mut clips = Vec::with_capacity(job.items.len());
        for (index, item) in job.items.iter().enumerate() {
            let mut frame = self.compose_item(&layout, item).await;
            self.composer
                .draw_counter(&layout, &mut frame.image, index + 1, job.items.len());
            let audio = load_optional(self.assets.as_ref(), AssetRole::Audio, item.audio_locator()).await;
            let clip = self.synchronizer.bind(
                job.mode,
                ClipKind::Item(index),
                frame,
                audio,
                scratch.path(),
            );
            tracing::info!(
                index,
                label = %item.label(),
                duration_secs = clip.duration_secs,
                has_audio = clip.audio.is_some(),
                degradations = clip.degradations.len(),
                "Item clip ready"
            );
            clips.push(clip);
        }

        let titles = match job.mode {
            JobMode::Short => None,
            JobMode::Demo => Some(TitleCards {
                intro: Clip::still(
                    ClipKind::Intro,
                    self.composer.intro_card(job.job_id, job.items.len()),
                    TITLE_CARD_SECS,
                ),
                outro: Clip::still(
                    ClipKind::Outro,
                    self.composer.outro_card(&self.branding),
                    TITLE_CARD_SECS,
                ),
            }),
        };

        let timeline = assemble(job.mode, clips, titles)?;
        let duration_secs = timeline.total_duration();
        let clip_count = timeline.len();
        let degradations: Vec<Degradation> = timeline.degradations().cloned().collect();

        let persisted = self
            .sink
            .persist(&timeline, &filename, progress.as_ref())
            .await?;
        drop(scratch);

        tracing::info!(
            job_id = job.job_id,
            locator = %persisted.locator(),
            duration_secs,
            clip_count,
            degradations = degradations.len(),
            "Render finished"
        );

        Ok(RenderOutcome {
            locator: persisted.locator(),
            persisted,
            duration_secs,
            clip_count,
            degradations,
        })
    }

    /// Compose a single item frame without encoding anything.
    pub async fn preview_frame(&self, mode: JobMode, item: &RenderItem) -> ComposedFrame {
        self.compose_item(&FrameLayout::for_mode(mode), item).await
    }

    async fn compose_item(&self, layout: &FrameLayout, item: &RenderItem) -> ComposedFrame {
        let photo = load_optional(self.assets.as_ref(), AssetRole::Photo, item.image_locator()).await;
        self.composer.compose(layout, item, photo)
    }
}
