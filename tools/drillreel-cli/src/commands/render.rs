//! Shared plumbing for the render subcommands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use drillreel_common::config::AppConfig;
use drillreel_drill_model::item::{ItemSource, RenderItem};
use drillreel_drill_model::job::{JobMode, RenderJob};
use drillreel_render_engine::fonts::FontSet;
use drillreel_render_engine::{ExportProgress, ProgressCallback, RenderOutcome, RenderPipeline};

/// Read one drill or render item from a JSON file.
pub fn read_item(path: &Path, mode: JobMode) -> anyhow::Result<RenderItem> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let source: ItemSource = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid item JSON in {}: {e}", path.display()))?;
    Ok(source.into_item(mode))
}

/// Read an array of drills or render items from a JSON file.
pub fn read_items(path: &Path, mode: JobMode) -> anyhow::Result<Vec<RenderItem>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let sources: Vec<ItemSource> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid items JSON in {}: {e}", path.display()))?;
    Ok(sources
        .into_iter()
        .map(|source| source.into_item(mode))
        .collect())
}

/// Build the production pipeline for a config.
pub fn build_pipeline(config: &AppConfig) -> anyhow::Result<RenderPipeline> {
    let fonts = FontSet::resolve(&config.fonts);
    if fonts.is_fallback() {
        tracing::warn!("Rendering with the built-in bitmap font; non-Latin text will show as boxes");
    }
    Ok(RenderPipeline::from_config(config, Arc::new(fonts))?)
}

/// Render a job and print the JSON result on stdout.
pub async fn run_job(
    mut config: AppConfig,
    job: RenderJob,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let result = match build_pipeline(&config) {
        Ok(pipeline) => pipeline
            .render(&job, Some(progress_printer()))
            .await
            .map_err(|e| (e.kind(), e.to_string())),
        Err(e) => Err(("config", e.to_string())),
    };
    eprintln!();

    match result {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&success_payload(&outcome))?);
            Ok(())
        }
        Err((kind, message)) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "error": message,
                    "kind": kind,
                }))?
            );
            Err(anyhow::anyhow!("{kind} failure: {message}"))
        }
    }
}

fn success_payload(outcome: &RenderOutcome) -> serde_json::Value {
    serde_json::json!({
        "video_path": outcome.locator,
        "persisted": outcome.persisted,
        "duration_secs": outcome.duration_secs,
        "clips": outcome.clip_count,
        "degradations": outcome.degradations,
    })
}

fn progress_printer() -> ProgressCallback {
    Box::new(|p: ExportProgress| {
        eprint!(
            "\r  {:?}: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
            p.stage,
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_item_accepts_drill_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drill.json");
        std::fs::write(
            &path,
            r#"{"id": 5, "text_catalan": "Aigua", "audio_url": "/media/a.mp3", "audio_tts_url": "tts.mp3"}"#,
        )
        .unwrap();

        let item = read_item(&path, JobMode::Demo).unwrap();
        assert_eq!(item.text_catalan.as_deref(), Some("Aigua"));
        assert_eq!(item.audio_locator(), Some("tts.mp3"));
    }

    #[test]
    fn test_read_items_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            r#"[{"text_catalan": "u"}, {"id": 2, "text_catalan": "dos"}, {"text_catalan": "tres"}]"#,
        )
        .unwrap();

        let items = read_items(&path, JobMode::Demo).unwrap();
        let texts: Vec<_> = items.iter().map(|i| i.text_catalan.clone().unwrap()).collect();
        assert_eq!(texts, vec!["u", "dos", "tres"]);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();
        let err = read_items(&path, JobMode::Demo).unwrap_err();
        assert!(err.to_string().contains("Invalid items JSON"));
    }
}
