//! Compose a single frame to PNG for layout checks.

use std::path::PathBuf;

use drillreel_common::config::AppConfig;
use drillreel_drill_model::job::JobMode;

use super::render::{build_pipeline, read_item};

pub async fn run(config: AppConfig, item: PathBuf, mode: JobMode, out: PathBuf) -> anyhow::Result<()> {
    let item = read_item(&item, mode)?;
    let pipeline = build_pipeline(&config)?;

    let frame = pipeline.preview_frame(mode, &item).await;
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out, frame.to_png_bytes()?)?;

    println!("Frame written: {}", out.display());
    println!("  Canvas: {}x{}", frame.image.width(), frame.image.height());
    match frame.photo {
        Some(p) => println!("  Photo: {}x{} at ({}, {})", p.width, p.height, p.x, p.y),
        None => println!("  Photo: none"),
    }
    for d in &frame.degradations {
        println!("  [WARN] {} {}: {}", d.role, d.locator, d.message);
    }

    Ok(())
}
