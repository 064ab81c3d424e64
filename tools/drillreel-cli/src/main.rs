//! Drillreel CLI: command-line interface for rendering drill videos.
//!
//! Usage:
//!   drillreel short --job-id N --item ITEM.json     Render a vertical short
//!   drillreel demo --job-id N --items ITEMS.json    Render a landscape demo
//!   drillreel frame --item ITEM.json --out F.png    Preview a single frame
//!   drillreel check                                 Check encoder, fonts, storage
//!   drillreel init                                  Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use drillreel_common::config::AppConfig;
use drillreel_drill_model::job::JobMode;

mod commands;

#[derive(Parser)]
#[command(
    name = "drillreel",
    about = "Render language-drill shorts and demo videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a single-item vertical short
    Short {
        /// Drill id
        #[arg(long)]
        job_id: u64,

        /// JSON file holding a drill or render item
        #[arg(long)]
        item: PathBuf,

        /// Output file name (defaults to short_<job-id>.mp4)
        #[arg(short, long)]
        output: Option<String>,

        /// Directory for local output, overriding the config
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Render a multi-item landscape demo
    Demo {
        /// Test id shown on the intro card
        #[arg(long)]
        job_id: u64,

        /// JSON file holding an array of drills or render items
        #[arg(long)]
        items: PathBuf,

        /// Output file name (defaults to demo_<job-id>.mp4)
        #[arg(short, long)]
        output: Option<String>,

        /// Directory for local output, overriding the config
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Compose one frame and write it as PNG
    Frame {
        /// JSON file holding a drill or render item
        #[arg(long)]
        item: PathBuf,

        /// Canvas kind: short or demo
        #[arg(long, default_value = "short")]
        mode: JobMode,

        /// PNG output path
        #[arg(long, default_value = "frame.png")]
        out: PathBuf,
    },

    /// Check encoder, probe, fonts, and storage configuration
    Check,

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    drillreel_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Short {
            job_id,
            item,
            output,
            output_dir,
        } => commands::short::run(config, job_id, item, output, output_dir).await,
        Commands::Demo {
            job_id,
            items,
            output,
            output_dir,
        } => commands::demo::run(config, job_id, items, output, output_dir).await,
        Commands::Frame { item, mode, out } => commands::frame::run(config, item, mode, out).await,
        Commands::Check => commands::check::run(&config),
        Commands::Init { force } => commands::init::run(cli.config, force),
    }
}
