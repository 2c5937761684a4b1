use std::sync::Arc;

use log::{error, info};
use trusty_tier::tasks::analytics_backfill::run_analytics_backfill;
use trusty_tier::{ChannelHub, Config, Database, TierService};

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    // Initialize database
    let database = match Database::new(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };
    info!("Database ready at {}", config.database_url);

    let hub = Arc::new(ChannelHub::new(config.broadcast_capacity));
    let service = Arc::new(TierService::new(database, hub));

    // Catch up on analytics missed while the service was down
    match service.backfill_analytics().await {
        Ok(generated) if generated > 0 => {
            info!("Backfilled analytics for {} tier list(s)", generated)
        }
        Ok(_) => {}
        Err(e) => error!("Initial analytics backfill failed: {}", e),
    }

    let backfill = tokio::spawn(run_analytics_backfill(
        Arc::clone(&service),
        config.backfill_interval,
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    backfill.abort();
}
