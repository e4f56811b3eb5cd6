//! Delve: a turn-based dungeon crawl in the terminal.
//!
//! ```bash
//! cargo run -p delve -- --name "Vera" --class swordsman
//! ```
//!
//! Characters are saved under `--save-dir` and resumed by name.

mod headless;

use clap::Parser;
use delve_core::player::CLASSES;
use headless::HeadlessConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "delve", version, about = "Turn-based dungeon crawl")]
struct Args {
    /// Character name; an existing save with this name is resumed
    #[arg(long, default_value = "Adventurer")]
    name: String,

    /// Class for a new character
    #[arg(
        long,
        default_value = "swordsman",
        value_parser = clap::builder::PossibleValuesParser::new(CLASSES.iter().copied())
    )]
    class: String,

    /// Directory holding one JSON file per character
    #[arg(long, default_value = "saves")]
    save_dir: PathBuf,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Use fixed flavor text instead of asking Claude
    #[arg(long)]
    no_narrative: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = HeadlessConfig::quick_start(args.name);
    config.class = args.class;
    config.save_dir = args.save_dir;
    config.narration = !args.no_narrative;

    headless::run_headless(config).await
}
