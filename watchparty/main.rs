mod config;
mod content;
mod dbus;
mod error;
mod player;
mod session;
mod signal;
mod sync;
mod worker;

use crate::config::Options;
use crate::content::Progress;
use crate::error::App;
use crate::worker::Worker;
use clap::Parser;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

#[derive(Parser)]
#[command(
    name = "watchparty",
    about = "Keep a local player in sync with a watch party room.",
    version
)]
struct Args {
    #[arg(short = 'c', long = "config", help = "Path to the configuration file")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), App> {
    let args = Args::parse();

    let home_dir = std::env::var("HOME")
        .map_err(|e| App::Config(format!("Failed to get HOME environment variable: {e}")))?;
    let config_dir = PathBuf::from(&home_dir).join(".config/watchparty");
    let log_dir = config_dir.join("logs");
    fs::create_dir_all(&log_dir).await?;

    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let options = Options::load_from_file(&config_path).await?;

    let duplicate = if options.log_to_stderr {
        Duplicate::Info
    } else {
        Duplicate::None
    };
    let _logger = Logger::try_with_str(&options.log_level)?
        .log_to_file(FileSpec::default().directory(&log_dir))
        .rotate(
            Criterion::Size(1_000_000),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(3),
        )
        .duplicate_to_stderr(duplicate)
        .start()?;

    let client_id = sync::generate_client_id();
    info!(
        "watchparty starting, client {client_id}, relay {} ({:?}), room {}",
        options.server_address, options.transport, options.room_name
    );

    let progress = Progress::default();
    let worker = Arc::new(Worker::new(options, client_id.clone(), progress.clone()));
    if let Err(e) = dbus::run_dbus_server(worker, progress, client_id).await {
        error!("DBus server error: {e}");
        return Err(e);
    }
    info!("watchparty stopped");
    Ok(())
}
