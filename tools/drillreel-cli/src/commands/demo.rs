//! Render a multi-item demo.

use std::path::PathBuf;

use drillreel_common::config::AppConfig;
use drillreel_drill_model::job::{JobMode, RenderJob};

use super::render::{read_items, run_job};

pub async fn run(
    config: AppConfig,
    job_id: u64,
    items: PathBuf,
    output: Option<String>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let items = read_items(&items, JobMode::Demo)?;
    let filename = output.unwrap_or_else(|| format!("demo_{job_id}.mp4"));
    eprintln!("Rendering demo {job_id} with {} drills", items.len());

    run_job(config, RenderJob::demo(job_id, items, filename), output_dir).await
}
