//! Renders through the real ffmpeg encoder and measures the results with
//! ffprobe. Skipped when either binary is missing from PATH.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use drillreel_drill_model::item::RenderItem;
use drillreel_drill_model::job::RenderJob;
use drillreel_render_engine::assets::DefaultAssetStore;
use drillreel_render_engine::fonts::FontSet;
use drillreel_render_engine::sync::{FfprobeProbe, MediaProbe};
use drillreel_render_engine::{
    command_exists, EncodeSettings, FfmpegBackend, OutputSink, Persisted, RenderPipeline,
};

const TOLERANCE_SECS: f64 = 0.15;

fn toolchain_available() -> bool {
    let found = command_exists("ffmpeg") && command_exists("ffprobe");
    if !found {
        eprintln!("ffmpeg/ffprobe not in PATH, skipping");
    }
    found
}

fn silent_wav(path: &Path, secs: f64) {
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(["-f", "lavfi", "-i", "anullsrc=r=44100:cl=mono"])
        .args(["-t", &format!("{secs}"), "-c:a", "pcm_s16le"])
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success(), "failed to generate {}", path.display());
}

fn item(text: &str, audio: Option<&Path>) -> RenderItem {
    RenderItem {
        text_catalan: Some(text.to_string()),
        text_tachelhit: Some("Azul".to_string()),
        audio_url: audio.map(|p| p.display().to_string()),
        ..Default::default()
    }
}

fn pipeline(media_root: &Path, output_dir: &Path) -> RenderPipeline {
    let sink = OutputSink::new(
        output_dir,
        EncodeSettings {
            preset: "ultrafast".to_string(),
            ..EncodeSettings::default()
        },
        Arc::new(FfmpegBackend::new()),
    );
    RenderPipeline::new(
        Arc::new(FontSet::builtin()),
        Arc::new(DefaultAssetStore::new(media_root, 5).unwrap()),
        Arc::new(FfprobeProbe),
        sink,
    )
}

fn local_path(persisted: &Persisted) -> &Path {
    match persisted {
        Persisted::Local(path) => path,
        Persisted::Remote(url) => panic!("expected a local file, got {url}"),
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= TOLERANCE_SECS,
        "duration {actual:.3}s, expected {expected:.3}s"
    );
}

#[test]
fn ffprobe_measures_generated_audio() {
    if !toolchain_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("five.wav");
    silent_wav(&wav, 5.0);

    assert_close(FfprobeProbe.duration_secs(&wav).unwrap(), 5.0);
    assert!(FfprobeProbe.duration_secs(&dir.path().join("missing.wav")).is_err());
}

#[tokio::test]
async fn short_lasts_audio_plus_tail() {
    if !toolchain_available() {
        return;
    }
    let media = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let wav = media.path().join("drill_1.wav");
    silent_wav(&wav, 5.0);

    let pipeline = pipeline(media.path(), out.path());
    let job = RenderJob::short(1, item("Hola", Some(&wav)), "short_1.mp4");
    let outcome = pipeline.render(&job, None).await.unwrap();

    assert_eq!(outcome.duration_secs, 5.5);
    assert!(outcome.degradations.is_empty());
    let video = local_path(&outcome.persisted);
    assert_eq!(video, out.path().join("short_1.mp4"));
    assert_close(FfprobeProbe.duration_secs(video).unwrap(), 5.5);
}

#[tokio::test]
async fn silent_demo_lasts_cards_plus_minimums() {
    if !toolchain_available() {
        return;
    }
    let media = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let pipeline = pipeline(media.path(), out.path());
    let job = RenderJob::demo(2, vec![item("u", None), item("sin", None)], "demo_2.mp4");
    let outcome = pipeline.render(&job, None).await.unwrap();

    assert_eq!(outcome.duration_secs, 16.0);
    assert_close(
        FfprobeProbe
            .duration_secs(local_path(&outcome.persisted))
            .unwrap(),
        16.0,
    );
}

#[tokio::test]
async fn demo_with_one_voiced_item_pads_the_silent_ones() {
    if !toolchain_available() {
        return;
    }
    let media = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let wav = media.path().join("drill_3.wav");
    silent_wav(&wav, 5.0);

    let pipeline = pipeline(media.path(), out.path());
    let job = RenderJob::demo(3, vec![item("u", Some(&wav)), item("sin", None)], "demo_3.mp4");
    let outcome = pipeline.render(&job, None).await.unwrap();

    // 3 + 5.5 + 5 + 3
    assert_eq!(outcome.duration_secs, 16.5);
    assert_close(
        FfprobeProbe
            .duration_secs(local_path(&outcome.persisted))
            .unwrap(),
        16.5,
    );
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
}
