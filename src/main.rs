mod app;
mod aws;
mod credentials;
mod error;
#[cfg(test)]
mod fake;
mod gateway;
mod models;
mod refresh;
mod runtime;
mod tui;

use std::fs::{self, File};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use credentials::CredentialStore;
use runtime::{AwsConnector, Runtime};

const LOG_FILE: &str = "ecs-lookout.log";

/// The terminal belongs to the UI, so logs go to a file in the data directory.
fn init_logging() -> Result<PathBuf> {
    let dir = ProjectDirs::from("com", "ecs-lookout", "ecs-lookout")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ecs_lookout=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = init_logging()?;
    info!(log = %log_path.display(), "starting");

    let store = CredentialStore::new()?;
    info!(credentials = %store.path().display(), "using credential store");
    let mut runtime = Runtime::new(store, AwsConnector);

    if let Err(err) = tui::run(&mut runtime).await {
        eprintln!("Application error: {err:#}");
    }
    info!("exiting");
    Ok(())
}
