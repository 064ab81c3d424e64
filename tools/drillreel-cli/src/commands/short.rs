//! Render a single-item short.

use std::path::PathBuf;

use drillreel_common::config::AppConfig;
use drillreel_drill_model::job::{JobMode, RenderJob};

use super::render::{read_item, run_job};

pub async fn run(
    config: AppConfig,
    job_id: u64,
    item: PathBuf,
    output: Option<String>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let item = read_item(&item, JobMode::Short)?;
    let filename = output.unwrap_or_else(|| format!("short_{job_id}.mp4"));
    eprintln!("Rendering short {job_id}: {}", item.label());

    run_job(config, RenderJob::short(job_id, item, filename), output_dir).await
}
