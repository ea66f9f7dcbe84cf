//! Unishot entry point.

mod actions;
mod app;
mod config;
mod startup;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting Unishot");

    let (config, path) = config::Config::load()?;
    tracing::info!(path = %path.display(), backend = ?config.backend, "configuration loaded");

    // The tray loop owns this thread until the user quits.
    app::run(config, path)?;

    tracing::info!("Unishot shut down cleanly");
    Ok(())
}
