use log::info;

use super::{clean_name, clean_optional, require_broadcaster, TierService};
use crate::error::{Result, TierError};
use crate::lifecycle;
use crate::models::{Caller, Item, Suggestion, SuggestionStatus, TierList};

impl TierService {
    /// A viewer proposes a new item for an active list.
    pub async fn suggest_item(
        &self,
        caller: &Caller,
        tier_list_id: &str,
        item_name: &str,
        image_url: Option<String>,
    ) -> Result<Suggestion> {
        let item_name = clean_name(item_name, "item name")?;
        let list = self.load_list(tier_list_id).await?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.read().await;
        let list = self.load_list(tier_list_id).await?;
        lifecycle::ensure_accepting_suggestions(&list)?;

        let suggestion = Suggestion::new(
            list.id.clone(),
            list.channel_id.clone(),
            caller.user_id.clone(),
            item_name,
            clean_optional(image_url),
        );
        self.store.create_suggestion(&suggestion).await?;

        info!(
            "User {} suggested {} for tier list {}",
            caller.user_id, suggestion.item_name, list.id
        );
        Ok(suggestion)
    }

    pub async fn list_suggestions(
        &self,
        tier_list_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>> {
        let list = self.load_list(tier_list_id).await?;
        self.store.list_suggestions(&list.id, status).await
    }

    /// Adds the suggested item to its tier list and marks the suggestion approved.
    pub async fn approve_suggestion(
        &self,
        caller: &Caller,
        suggestion_id: &str,
    ) -> Result<(Suggestion, TierList)> {
        let (_, list) = self.pending_suggestion(caller, suggestion_id).await?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        // A concurrent review may have settled it while we waited
        let (mut suggestion, mut list) = self.pending_suggestion(caller, suggestion_id).await?;

        let item = Item::new(suggestion.item_name.clone(), suggestion.image_url.clone());
        list.items.push(item.clone());
        self.store.save_tier_list(&list).await?;

        self.store
            .set_suggestion_status(&suggestion.id, SuggestionStatus::Approved)
            .await?;
        suggestion.status = SuggestionStatus::Approved;

        info!(
            "Approved suggestion {} as item {} on tier list {}",
            suggestion.id, item.id, list.id
        );
        self.items_changed(&list).await;
        Ok((suggestion, list))
    }

    pub async fn reject_suggestion(
        &self,
        caller: &Caller,
        suggestion_id: &str,
    ) -> Result<Suggestion> {
        let (_, list) = self.pending_suggestion(caller, suggestion_id).await?;

        let lock = self.channel_lock(&list.channel_id);
        let _guard = lock.write().await;
        let (mut suggestion, _) = self.pending_suggestion(caller, suggestion_id).await?;

        self.store
            .set_suggestion_status(&suggestion.id, SuggestionStatus::Rejected)
            .await?;
        suggestion.status = SuggestionStatus::Rejected;

        info!("Rejected suggestion {}", suggestion.id);
        Ok(suggestion)
    }

    async fn pending_suggestion(
        &self,
        caller: &Caller,
        suggestion_id: &str,
    ) -> Result<(Suggestion, TierList)> {
        let suggestion = self
            .store
            .get_suggestion(suggestion_id)
            .await?
            .ok_or_else(|| TierError::not_found("suggestion", suggestion_id))?;
        let list = self.load_list(&suggestion.tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        if suggestion.status != SuggestionStatus::Pending {
            return Err(TierError::InvalidState(format!(
                "suggestion {} was already {}",
                suggestion.id,
                suggestion.status.as_str()
            )));
        }
        Ok((suggestion, list))
    }
}
