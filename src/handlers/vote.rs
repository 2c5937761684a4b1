use chrono::Utc;
use log::{info, warn};

use super::TierService;
use crate::error::{Result, TierError};
use crate::lifecycle;
use crate::models::{Ballot, ItemVote, TierList};
use crate::voting::{aggregate, merge_ballot, AggregateResults};

impl TierService {
    /// Records a (possibly partial) ballot for `user_id`, merging it into any earlier one.
    ///
    /// Every entry must name a current item and a tier on the list's scale; otherwise nothing is
    /// stored. The list is checked under the channel's shared lock, so completion or item removal
    /// waits for the write to land. If the user's ballot is created or deleted concurrently the
    /// merge is redone once against the fresh copy.
    pub async fn submit_ballot(
        &self,
        tier_list_id: &str,
        user_id: &str,
        entries: Vec<ItemVote>,
    ) -> Result<Ballot> {
        let list = self.load_list(tier_list_id).await?;
        lifecycle::ensure_accepting_ballots(&list)?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.read().await;
        let list = self.load_list(tier_list_id).await?;
        lifecycle::ensure_accepting_ballots(&list)?;
        validate_entries(&list, &entries)?;

        let mut retried = false;
        let ballot = loop {
            let existing = self.store.get_ballot(&list.id, user_id).await?;
            let merged = merge_ballot(
                existing.as_ref(),
                &list.id,
                &list.channel_id,
                user_id,
                &entries,
                Utc::now(),
            );

            let outcome = match existing {
                Some(_) => self.store.update_ballot(&merged).await,
                None => self.store.insert_ballot(&merged).await,
            };

            match outcome {
                Ok(()) => break merged,
                Err(TierError::Conflict(_)) | Err(TierError::NotFound(_)) if !retried => {
                    warn!(
                        "Ballot for user {} on {} changed underneath, merging again",
                        user_id, list.id
                    );
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            "Recorded {} vote(s) from user {} on tier list {}",
            entries.len(),
            user_id,
            list.id
        );
        self.publish_results(&list).await;
        Ok(ballot)
    }

    pub async fn get_user_ballot(&self, tier_list_id: &str, user_id: &str) -> Result<Ballot> {
        self.store
            .get_ballot(tier_list_id, user_id)
            .await?
            .ok_or_else(|| {
                TierError::NotFound(format!(
                    "no ballot from user {} on tier list {}",
                    user_id, tier_list_id
                ))
            })
    }

    /// Current consensus for a list in any status.
    pub async fn get_aggregate_results(&self, tier_list_id: &str) -> Result<AggregateResults> {
        let list = self.load_list(tier_list_id).await?;
        let ballots = self.store.list_ballots(&list.id).await?;

        let results = aggregate(&list, &ballots);
        if results.dropped_votes > 0 {
            warn!(
                "Ignored {} vote(s) on removed items or tiers for tier list {}",
                results.dropped_votes, list.id
            );
        }
        Ok(results)
    }
}

fn validate_entries(list: &TierList, entries: &[ItemVote]) -> Result<()> {
    if entries.is_empty() {
        return Err(TierError::Validation("ballot has no votes".to_string()));
    }

    for entry in entries {
        if !list.has_item(&entry.item_id) {
            return Err(TierError::Validation(format!(
                "item {} is not on tier list {}",
                entry.item_id, list.id
            )));
        }
        if !list.tiers.contains(&entry.tier) {
            return Err(TierError::Validation(format!(
                "tier {} is not on the scale of tier list {}",
                entry.tier, list.id
            )));
        }
    }
    Ok(())
}
