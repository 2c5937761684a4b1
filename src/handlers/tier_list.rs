use chrono::Utc;
use log::{error, info};
use serde::Deserialize;

use super::{clean_name, clean_optional, require_broadcaster, require_broadcaster_role, TierService};
use crate::broadcast::TierEvent;
use crate::error::{Result, TierError};
use crate::lifecycle;
use crate::models::{Caller, Item, NewItem, TierList, TierListStatus};
use crate::voting::TierScale;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTierList {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<NewItem>,
    // Defaults to S, A, B, C, D, F
    #[serde(default)]
    pub tiers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierListUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tiers: Option<Vec<String>>,
    pub allow_real_time_updates: Option<bool>,
}

impl TierService {
    pub async fn create_tier_list(&self, caller: &Caller, input: NewTierList) -> Result<TierList> {
        require_broadcaster_role(caller)?;

        let title = clean_name(&input.title, "title")?;
        let tiers = match input.tiers {
            Some(labels) => TierScale::new(labels)?,
            None => TierScale::default(),
        };
        let items = input
            .items
            .into_iter()
            .map(|item| -> Result<Item> {
                Ok(Item::new(clean_name(&item.name, "item name")?, clean_optional(item.image_url)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut list = TierList::new(caller.channel_id.clone(), title, items, tiers);
        list.description = clean_optional(input.description);

        self.store.create_tier_list(&list).await?;
        info!("Created tier list {} on channel {}", list.id, list.channel_id);
        Ok(list)
    }

    pub async fn get_tier_list(&self, tier_list_id: &str) -> Result<TierList> {
        self.load_list(tier_list_id).await
    }

    pub async fn list_tier_lists(&self, channel_id: &str) -> Result<Vec<TierList>> {
        self.store.list_tier_lists(channel_id).await
    }

    /// Edits title, description, live updates or the tier scale.
    ///
    /// Replacing the scale leaves ballots untouched; votes on removed tiers stop counting.
    pub async fn update_details(
        &self,
        caller: &Caller,
        tier_list_id: &str,
        update: TierListUpdate,
    ) -> Result<TierList> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let mut list = self.load_list(tier_list_id).await?;

        if let Some(title) = update.title {
            list.title = clean_name(&title, "title")?;
        }
        if let Some(description) = update.description {
            list.description = clean_optional(Some(description));
        }
        if let Some(labels) = update.tiers {
            list.tiers = TierScale::new(labels)?;
        }
        if let Some(allow) = update.allow_real_time_updates {
            list.allow_real_time_updates = allow;
        }

        self.store.save_tier_list(&list).await?;
        info!("Updated tier list {}", list.id);
        Ok(list)
    }

    /// Makes the list the channel's only active one.
    ///
    /// Any other active list on the channel is completed first, and gets its analytics generated.
    pub async fn activate(&self, caller: &Caller, tier_list_id: &str) -> Result<TierList> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let mut list = self.load_list(tier_list_id).await?;

        let reactivating = list.status == TierListStatus::Completed;
        let now = Utc::now();
        lifecycle::activate(&mut list, now)?;

        if reactivating {
            // Stale once new votes can arrive; regenerated on the next completion
            self.store.delete_analytics(&list.id).await?;
        }

        let force_completed = self.store.activate_exclusive(&list, now).await?;
        for sibling in &force_completed {
            info!("Completed tier list {} to activate {}", sibling.id, list.id);
            if let Err(e) = self.generate_analytics(&sibling.id).await {
                error!("Failed to generate analytics for {}: {}", sibling.id, e);
            }
            self.hub.publish(
                &sibling.channel_id,
                TierEvent::TierListCompleted {
                    tier_list_id: sibling.id.clone(),
                },
            );
        }

        info!(
            "{} tier list {} on channel {}",
            if reactivating { "Reactivated" } else { "Activated" },
            list.id,
            list.channel_id
        );
        self.hub.publish(
            &list.channel_id,
            TierEvent::TierListActivated {
                tier_list_id: list.id.clone(),
            },
        );
        Ok(list)
    }

    /// Closes voting. Ballots are kept and the analytics record is generated.
    pub async fn complete(&self, caller: &Caller, tier_list_id: &str) -> Result<TierList> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let mut list = self.load_list(tier_list_id).await?;

        lifecycle::complete(&mut list, Utc::now())?;
        self.store.save_tier_list(&list).await?;
        info!("Completed tier list {}", list.id);

        if let Err(e) = self.generate_analytics(&list.id).await {
            // The backfill task picks it up later
            error!("Failed to generate analytics for {}: {}", list.id, e);
        }

        self.hub.publish(
            &list.channel_id,
            TierEvent::TierListCompleted {
                tier_list_id: list.id.clone(),
            },
        );
        Ok(list)
    }

    /// Deletes a list that is not active, together with its ballots, analytics and suggestions.
    pub async fn delete_tier_list(&self, caller: &Caller, tier_list_id: &str) -> Result<TierList> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let list = self.load_list(tier_list_id).await?;

        lifecycle::ensure_deletable(&list)?;
        if !self.store.delete_tier_list(&list.id).await? {
            return Err(TierError::not_found("tier list", &list.id));
        }

        info!("Deleted tier list {} and its ballots", list.id);
        Ok(list)
    }

    pub async fn add_item(
        &self,
        caller: &Caller,
        tier_list_id: &str,
        item: NewItem,
    ) -> Result<Item> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let item = Item::new(clean_name(&item.name, "item name")?, clean_optional(item.image_url));

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let mut list = self.load_list(tier_list_id).await?;

        list.items.push(item.clone());
        self.store.save_tier_list(&list).await?;
        info!("Added item {} to tier list {}", item.id, list.id);

        self.items_changed(&list).await;
        Ok(item)
    }

    /// Renames an item or changes its image. The id never changes.
    pub async fn update_item(
        &self,
        caller: &Caller,
        tier_list_id: &str,
        item: Item,
    ) -> Result<Item> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let name = clean_name(&item.name, "item name")?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let mut list = self.load_list(tier_list_id).await?;

        let stored = list
            .items
            .iter_mut()
            .find(|stored| stored.id == item.id)
            .ok_or_else(|| TierError::not_found("item", &item.id))?;
        stored.name = name;
        stored.image_url = clean_optional(item.image_url);
        let updated = stored.clone();

        self.store.save_tier_list(&list).await?;
        self.items_changed(&list).await;
        Ok(updated)
    }

    /// Removes an item and strips it from every ballot.
    ///
    /// Ballots are cleaned before the list is saved, so a retry after a failed save repeats the
    /// cleanup safely.
    pub async fn remove_item(
        &self,
        caller: &Caller,
        tier_list_id: &str,
        item_id: &str,
    ) -> Result<TierList> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let mut list = self.load_list(tier_list_id).await?;

        if !list.has_item(item_id) {
            return Err(TierError::not_found("item", item_id));
        }

        let stripped = self.store.strip_item_from_ballots(&list.id, item_id).await?;
        list.items.retain(|item| item.id != item_id);
        self.store.save_tier_list(&list).await?;
        info!(
            "Removed item {} from tier list {}, stripped from {} ballot(s)",
            item_id, list.id, stripped
        );

        self.items_changed(&list).await;
        Ok(list)
    }

    /// Deletes every ballot of the list, in any status.
    pub async fn reset_votes(&self, caller: &Caller, tier_list_id: &str) -> Result<u64> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let list = self.load_list(tier_list_id).await?;

        let removed = self.store.delete_ballots(&list.id).await?;
        info!("Reset {} ballot(s) on tier list {}", removed, list.id);

        if list.status == TierListStatus::Completed {
            self.generate_analytics(&list.id).await?;
        }

        self.hub.publish(
            &list.channel_id,
            TierEvent::VotesReset {
                tier_list_id: list.id.clone(),
            },
        );
        Ok(removed)
    }

    pub(super) async fn items_changed(&self, list: &TierList) {
        self.hub.publish(
            &list.channel_id,
            TierEvent::ItemsChanged {
                tier_list_id: list.id.clone(),
            },
        );
        self.publish_results(list).await;
    }
}
