#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use trusty_tier::models::{
    AnalyticsRecord, Ballot, Suggestion, SuggestionStatus, Template, TemplateRating, TierList,
};
use trusty_tier::{MemoryStore, Result, TierError, TierStore};

/// `MemoryStore` with knobs for reproducing interleavings.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    // Ballot reads for this user stall, holding the caller mid-submission
    slow_user: Option<String>,
    // Stored just before the next ballot insert, which then reports a conflict
    competing_ballot: Mutex<Option<Ballot>>,
}

impl ScriptedStore {
    pub fn with_slow_user(user_id: &str) -> Self {
        Self {
            slow_user: Some(user_id.to_string()),
            ..Default::default()
        }
    }

    pub fn lose_next_insert_to(&self, ballot: Ballot) {
        *self.competing_ballot.lock().unwrap() = Some(ballot);
    }

    pub fn competing_ballot_pending(&self) -> bool {
        self.competing_ballot.lock().unwrap().is_some()
    }
}

#[async_trait]
impl TierStore for ScriptedStore {
    async fn create_tier_list(&self, list: &TierList) -> Result<()> {
        self.inner.create_tier_list(list).await
    }

    async fn get_tier_list(&self, id: &str) -> Result<Option<TierList>> {
        self.inner.get_tier_list(id).await
    }

    async fn list_tier_lists(&self, channel_id: &str) -> Result<Vec<TierList>> {
        self.inner.list_tier_lists(channel_id).await
    }

    async fn save_tier_list(&self, list: &TierList) -> Result<()> {
        self.inner.save_tier_list(list).await
    }

    async fn activate_exclusive(
        &self,
        list: &TierList,
        now: DateTime<Utc>,
    ) -> Result<Vec<TierList>> {
        self.inner.activate_exclusive(list, now).await
    }

    async fn delete_tier_list(&self, id: &str) -> Result<bool> {
        self.inner.delete_tier_list(id).await
    }

    async fn completed_without_analytics(&self) -> Result<Vec<TierList>> {
        self.inner.completed_without_analytics().await
    }

    async fn get_ballot(&self, tier_list_id: &str, user_id: &str) -> Result<Option<Ballot>> {
        if self.slow_user.as_deref() == Some(user_id) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        self.inner.get_ballot(tier_list_id, user_id).await
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> Result<()> {
        let competing = self.competing_ballot.lock().unwrap().take();
        if let Some(competing) = competing {
            self.inner.insert_ballot(&competing).await?;
            return Err(TierError::Conflict("ballot already exists".to_string()));
        }
        self.inner.insert_ballot(ballot).await
    }

    async fn update_ballot(&self, ballot: &Ballot) -> Result<()> {
        self.inner.update_ballot(ballot).await
    }

    async fn list_ballots(&self, tier_list_id: &str) -> Result<Vec<Ballot>> {
        self.inner.list_ballots(tier_list_id).await
    }

    async fn delete_ballots(&self, tier_list_id: &str) -> Result<u64> {
        self.inner.delete_ballots(tier_list_id).await
    }

    async fn strip_item_from_ballots(&self, tier_list_id: &str, item_id: &str) -> Result<u64> {
        self.inner.strip_item_from_ballots(tier_list_id, item_id).await
    }

    async fn upsert_analytics(&self, record: &AnalyticsRecord) -> Result<()> {
        self.inner.upsert_analytics(record).await
    }

    async fn get_analytics(&self, tier_list_id: &str) -> Result<Option<AnalyticsRecord>> {
        self.inner.get_analytics(tier_list_id).await
    }

    async fn delete_analytics(&self, tier_list_id: &str) -> Result<()> {
        self.inner.delete_analytics(tier_list_id).await
    }

    async fn list_analytics(&self, channel_id: &str) -> Result<Vec<AnalyticsRecord>> {
        self.inner.list_analytics(channel_id).await
    }

    async fn create_suggestion(&self, suggestion: &Suggestion) -> Result<()> {
        self.inner.create_suggestion(suggestion).await
    }

    async fn get_suggestion(&self, id: &str) -> Result<Option<Suggestion>> {
        self.inner.get_suggestion(id).await
    }

    async fn list_suggestions(
        &self,
        tier_list_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>> {
        self.inner.list_suggestions(tier_list_id, status).await
    }

    async fn set_suggestion_status(&self, id: &str, status: SuggestionStatus) -> Result<()> {
        self.inner.set_suggestion_status(id, status).await
    }

    async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        self.inner.get_template(id).await
    }

    async fn get_template_for_list(&self, tier_list_id: &str) -> Result<Option<Template>> {
        self.inner.get_template_for_list(tier_list_id).await
    }

    async fn save_template(&self, template: &Template) -> Result<()> {
        self.inner.save_template(template).await
    }

    async fn list_public_templates(&self) -> Result<Vec<Template>> {
        self.inner.list_public_templates().await
    }

    async fn record_template_use(&self, id: &str) -> Result<()> {
        self.inner.record_template_use(id).await
    }

    async fn rate_template(&self, rating: &TemplateRating) -> Result<Template> {
        self.inner.rate_template(rating).await
    }

    async fn get_template_rating(
        &self,
        template_id: &str,
        user_id: &str,
    ) -> Result<Option<TemplateRating>> {
        self.inner.get_template_rating(template_id, user_id).await
    }
}
