//! Write a default config file.

use std::path::PathBuf;

use drillreel_common::config::{config_file_path, AppConfig};

pub fn run(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config_file_path);
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let config = AppConfig::default();
    config
        .save_to(&path)
        .map_err(|e| anyhow::anyhow!("Failed to write config to {}: {e}", path.display()))?;

    println!("Config written: {}", path.display());
    println!("  Output dir: {}", config.output_dir.display());
    println!("  Media root: {}", config.media_root.display());
    println!("  Storage: local only");
    println!();
    println!("Set CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET");
    println!("to upload finished videos instead of keeping them on disk.");

    Ok(())
}
