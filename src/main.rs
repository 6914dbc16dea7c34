use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;

use swearjar::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables and initialize logging
    dotenv::dotenv().ok();

    let config_path = BotConfiguration::path_from_env();
    let mut config = BotConfiguration::load(&config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    config.apply_env_overrides();

    let level = if config.extended_log {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    info!("Starting swearjar v{}", swearjar::VERSION);
    info!("Using configuration from {}", config_path.display());

    let ledger = Arc::new(
        UsageLedger::open(&config.database_path)
            .with_context(|| format!("Failed to open ledger at {}", config.database_path.display()))?,
    );
    info!("Ledger schema version {}", ledger.schema_version()?);

    let mut bot = ChatBot::new(ledger, &config);
    bot.add_connection(Box::new(ConsoleConnection::new(config.admin_user_ids.clone())))
        .await;

    let handles = bot.start().await?;
    let message_loops = async {
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Message loop ended abnormally: {}", e);
            }
        }
    };

    tokio::select! {
        _ = message_loops => {
            info!("All chat connections closed");
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
        }
    }

    bot.shutdown().await
}
