use std::path::PathBuf;
use std::{env, process};

use configory::{Manager as ConfigManager, Options as ConfigOptions};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::batch::TileJob;
use crate::config::{Config, ConfigEventHandler};

mod batch;
mod config;

#[tokio::main]
async fn main() {
    // Setup logging.
    let directives =
        env::var("RUST_LOG").unwrap_or("warn,agntool=info,agn=info,configory=info".into());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    FmtSubscriber::builder().with_env_filter(env_filter).with_line_number(true).init();

    info!("Started Agntool");

    if let Err(err) = run().await {
        error!("[CRITICAL] {err}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    // Initialize configuration state.
    let config_options = ConfigOptions::new("agntool");
    let config_manager = ConfigManager::with_options(&config_options, ConfigEventHandler)?;
    let config = config_manager
        .get::<&str, Config>(&[])
        .inspect_err(|err| error!("Config error: {err}"))
        .ok()
        .flatten()
        .unwrap_or_default();

    // Default to the working directory without explicit tile folders.
    let mut folders: Vec<PathBuf> = env::args_os().skip(1).map(PathBuf::from).collect();
    if folders.is_empty() {
        folders.push(env::current_dir()?);
    }

    let job = TileJob::new(&config);
    let summary = batch::process_folders(job, &folders).await?;

    info!(
        "Processed {} tiles, {} vegetation polygons merged",
        summary.processed, summary.merged
    );

    if summary.failed > 0 {
        return Err(Error::FailedTiles(summary.failed));
    }

    Ok(())
}

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error("{0}")]
    TokioJoin(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Configory(#[from] configory::Error),
    #[error("{0}")]
    Tile(#[from] agn::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to process {0} tiles")]
    FailedTiles(usize),
}
