//! Check encoder, probe, fonts, and storage.

use drillreel_common::config::{config_file_path, AppConfig};
use drillreel_render_engine::command_exists;
use drillreel_render_engine::fonts::FontSet;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Drillreel System Check");
    println!("{}", "=".repeat(50));

    let mut required_ok = true;
    for binary in ["ffmpeg", "ffprobe"] {
        if command_exists(binary) {
            println!("[OK] {binary} found in PATH");
        } else {
            println!("[FAIL] {binary} not found in PATH");
            required_ok = false;
        }
    }

    let fonts = FontSet::resolve(&config.fonts);
    if fonts.is_fallback() {
        println!("[WARN] Fonts: built-in bitmap fallback (set fonts.bold / fonts.regular)");
    } else {
        println!("[OK] Fonts: {}", fonts.source());
    }

    match &config.storage {
        Some(storage) => println!(
            "[OK] Storage: cloudinary ({}), folder {}, {} signatures",
            storage.cloud_name,
            storage.folder,
            storage.signature_algorithm.as_str()
        ),
        None => println!(
            "[OK] Storage: local only, videos kept in {}",
            config.output_dir.display()
        ),
    }
    println!("     Media root: {}", config.media_root.display());
    println!("     Config file: {}", config_file_path().display());

    println!();
    if required_ok {
        println!("All required tools are available. Drillreel is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg to render videos.");
    }

    Ok(())
}
