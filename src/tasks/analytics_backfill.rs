use std::sync::Arc;
use std::time::Duration;

use log::{error, info};
use tokio::time::interval;

use crate::handlers::TierService;

/// Periodically generates analytics for completed lists that are missing them.
///
/// Completion logs analytics failures instead of returning them; this loop is what repairs them.
pub async fn run_analytics_backfill(service: Arc<TierService>, every: Duration) {
    info!("Starting analytics backfill task, every {:?}", every);
    // tokio rejects a zero period
    let mut interval = interval(every.max(Duration::from_secs(1)));

    loop {
        interval.tick().await;

        match service.backfill_analytics().await {
            Ok(0) => {}
            Ok(generated) => info!("Backfilled analytics for {} tier list(s)", generated),
            Err(e) => error!("Failed to query lists missing analytics: {}", e),
        }
    }
}
