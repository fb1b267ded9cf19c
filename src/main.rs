//! CGM Duo - glucose data normalizer and alert pipeline
//!
//! Polls a Nightscout server or the Dexcom Share cloud API for recent
//! glucose readings, normalizes them into one canonical shape, and emits
//! a compact display payload (JSON on stdout) for the watch collaborator.
//! History records are delivered as timeline pins on the side.
//!
//! Usage:
//!   cgmduo                - Run one refresh cycle
//!   cgmduo refresh [id]   - Same, with an advisory trigger id for logs
//!   cgmduo path           - Show data file locations
//!   cgmduo --help         - Show help
//!   CGMDUO_DBG=1 cgmduo   - Enable debug output

mod config;
mod cycle;
mod engine;
mod error;
mod nightscout;
mod payload;
mod raw;
mod readings;
mod share;
mod source;
mod storage;
mod timeline;
mod units;

use std::env;
use std::time::Duration;

use log::warn;

use crate::config::{config_file_path, default_state_path, ensure_data_dir, Config};
use crate::error::CgmError;
use crate::storage::StateStore;
use crate::timeline::TimelineClient;

/// Network timeout for every upstream call; a hung server must degrade
/// into the timeout payload, not stall the cycle.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), CgmError> {
    let args: Vec<String> = env::args().collect();

    // Check for debug mode
    let debug_mode = env::var("CGMDUO_DBG").is_ok();
    if debug_mode {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .format_timestamp(None)
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .format_timestamp(None)
            .init();
    }

    // Ensure data directory exists
    if let Err(e) = ensure_data_dir() {
        eprintln!("Warning: Could not create data directory: {}", e);
    }

    // Create default config if it doesn't exist
    let cfg_path = config_file_path();
    if !cfg_path.exists() {
        if let Err(e) = Config::create_default(&cfg_path) {
            warn!("Could not create default config: {}", e);
        }
    }

    match args.get(1).map(|s| s.as_str()) {
        Some("--help") | Some("-h") | Some("help") => {
            print_help();
        }
        Some("--version") | Some("-V") => {
            println!("cgmduo {}", env!("CARGO_PKG_VERSION"));
        }
        Some("path") | Some("paths") => {
            cmd_show_paths();
        }
        Some("refresh") | None => {
            let trigger_id = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
            cmd_refresh(trigger_id).await?;
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_help();
        }
    }

    Ok(())
}

/// Run one refresh cycle and print the display payload
async fn cmd_refresh(trigger_id: i64) -> Result<(), CgmError> {
    let config = config::load_or_default();

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| CgmError::Config(format!("HTTP client: {}", e)))?;

    let store = StateStore::new(default_state_path())?;
    let mut timeline = TimelineClient::new(http.clone(), timeline::API_URL_ROOT);

    let payload = cycle::refresh(&config, &store, &http, &mut timeline, trigger_id).await?;

    // The watch collaborator reads this line
    println!("{}", serde_json::to_string(&payload)?);
    Ok(())
}

/// Show data paths
fn cmd_show_paths() {
    use crate::config::get_data_dir;

    println!("CGM Duo Data Paths:");
    println!("  Data directory:  {}", get_data_dir().display());
    println!("  Alert state:     {}", default_state_path().display());
    println!("  Config file:     {}", config_file_path().display());
}

fn print_help() {
    eprintln!("CGM Duo v{}", env!("CARGO_PKG_VERSION"));
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  cgmduo                Run one refresh cycle");
    eprintln!("  cgmduo refresh [id]   Run one refresh cycle (advisory trigger id)");
    eprintln!("  cgmduo path           Show data file locations");
    eprintln!("  cgmduo help           Show this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("  CGMDUO_DBG=1          Enable debug output");
    eprintln!();
    eprintln!("DATA LOCATIONS:");
    eprintln!("  Alert state:  {}", default_state_path().display());
    eprintln!("  Config:       {}", config_file_path().display());
}
