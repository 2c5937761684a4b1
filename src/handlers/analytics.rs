use chrono::Utc;
use log::{error, info};

use super::TierService;
use crate::error::Result;
use crate::lifecycle;
use crate::models::{AnalyticsRecord, ChannelSummary};
use crate::voting::{build_record, summarize_channel};

impl TierService {
    /// Recomputes and stores the analytics record of a completed list. Safe to repeat.
    pub async fn generate_analytics(&self, tier_list_id: &str) -> Result<AnalyticsRecord> {
        let list = self.load_list(tier_list_id).await?;
        lifecycle::ensure_analyzable(&list)?;

        let ballots = self.store.list_ballots(&list.id).await?;
        let completed_at = list.end_time.unwrap_or_else(Utc::now);
        let record = build_record(&list, &ballots, completed_at);

        self.store.upsert_analytics(&record).await?;
        info!(
            "Generated analytics for tier list {}: {} vote(s) from {} voter(s)",
            list.id, record.total_votes, record.total_voters
        );
        Ok(record)
    }

    /// Stored record if there is one, otherwise generated on the spot.
    pub async fn get_analytics(&self, tier_list_id: &str) -> Result<AnalyticsRecord> {
        if let Some(record) = self.store.get_analytics(tier_list_id).await? {
            return Ok(record);
        }
        self.generate_analytics(tier_list_id).await
    }

    pub async fn list_channel_analytics(&self, channel_id: &str) -> Result<Vec<AnalyticsRecord>> {
        self.store.list_analytics(channel_id).await
    }

    pub async fn get_channel_summary(&self, channel_id: &str) -> Result<ChannelSummary> {
        let records = self.store.list_analytics(channel_id).await?;
        Ok(summarize_channel(&records))
    }

    /// Generates analytics for completed lists that are missing them. Returns how many were made.
    pub async fn backfill_analytics(&self) -> Result<usize> {
        let pending = self.store.completed_without_analytics().await?;
        let mut generated = 0;

        for list in pending {
            match self.generate_analytics(&list.id).await {
                Ok(_) => generated += 1,
                Err(e) => error!("Backfill failed for tier list {}: {}", list.id, e),
            }
        }
        Ok(generated)
    }
}
