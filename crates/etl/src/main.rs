use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use etl::config::Config;
use etl::logging;
use etl::services::manager::CoreManager;
use etl::settings::StaticConfigProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    logging::init_logging(&config.logging);

    info!("Starting data-sync engine v{}", env!("CARGO_PKG_VERSION"));

    let provider = Arc::new(StaticConfigProvider::new());

    // Build pools; a database that cannot be reached here is fatal.
    let manager = CoreManager::connect(config, provider).await?;

    // Run target migrations
    info!("Running target database migrations...");
    manager.migrate().await?;
    info!("Migrations completed");

    manager.initialize().await?;

    // Run until interrupted, then drain jobs and close pools.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    manager.stop().await;

    Ok(())
}
