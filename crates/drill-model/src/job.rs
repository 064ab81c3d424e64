//! Render jobs.

use std::fmt;
use std::str::FromStr;

use drillreel_common::error::{DrillreelError, DrillreelResult};
use serde::{Deserialize, Serialize};

use crate::item::RenderItem;

/// Which kind of video a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// One item, portrait, no title cards.
    Short,
    /// Ordered items, landscape, bracketed by intro/outro cards.
    Demo,
}

impl JobMode {
    pub fn as_str(self) -> &'static str {
        match self {
            JobMode::Short => "short",
            JobMode::Demo => "demo",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobMode {
    type Err = DrillreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(JobMode::Short),
            "demo" => Ok(JobMode::Demo),
            other => Err(DrillreelError::render_input(format!(
                "Unknown video type: {other}. Use: short, demo"
            ))),
        }
    }
}

/// One unit of render work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    /// Drill id for shorts, test id for demos. Shown on the demo intro card.
    pub job_id: u64,

    pub mode: JobMode,

    /// Items in presentation order. Order is significant.
    pub items: Vec<RenderItem>,

    /// Target file name (no directories).
    pub output_filename: String,
}

impl RenderJob {
    pub fn short(job_id: u64, item: RenderItem, output_filename: impl Into<String>) -> Self {
        Self {
            job_id,
            mode: JobMode::Short,
            items: vec![item],
            output_filename: output_filename.into(),
        }
    }

    pub fn demo(job_id: u64, items: Vec<RenderItem>, output_filename: impl Into<String>) -> Self {
        Self {
            job_id,
            mode: JobMode::Demo,
            items,
            output_filename: output_filename.into(),
        }
    }

    /// Check the job before any render work starts.
    pub fn validate(&self) -> DrillreelResult<()> {
        if self.items.is_empty() {
            return Err(DrillreelError::render_input(format!(
                "No items supplied for {} job {}",
                self.mode, self.job_id
            )));
        }

        if self.mode == JobMode::Short && self.items.len() != 1 {
            return Err(DrillreelError::render_input(format!(
                "A short renders exactly one item, got {}",
                self.items.len()
            )));
        }

        if let Some(index) = self.items.iter().position(RenderItem::is_blank) {
            return Err(DrillreelError::render_input(format!(
                "Item {} has no text, image, or audio",
                index + 1
            )));
        }

        normalize_output_filename(&self.output_filename)?;
        Ok(())
    }

    /// Output file name with the container extension applied.
    pub fn output_filename(&self) -> DrillreelResult<String> {
        normalize_output_filename(&self.output_filename)
    }
}

/// Validate a bare output file name and append `.mp4` when missing.
pub fn normalize_output_filename(raw: &str) -> DrillreelResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DrillreelError::render_input("Output filename is empty"));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(DrillreelError::render_input(format!(
            "Output filename must not contain directories: {name}"
        )));
    }

    if name.to_ascii_lowercase().ends_with(".mp4") {
        Ok(name.to_string())
    } else {
        Ok(format!("{name}.mp4"))
    }
}
