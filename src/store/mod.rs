pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    AnalyticsRecord, Ballot, Suggestion, SuggestionStatus, Template, TemplateRating, TierList,
};

pub use memory::MemoryStore;

/// Persistence collaborator for tier lists, ballots, analytics, suggestions and templates.
///
/// Ballots are unique per `(tier_list_id, user_id)` and analytics per `tier_list_id`.
/// Implementations must make `activate_exclusive` and the cascading deletes atomic with respect
/// to the records they touch.
#[async_trait]
pub trait TierStore: Send + Sync {
    async fn create_tier_list(&self, list: &TierList) -> Result<()>;

    async fn get_tier_list(&self, id: &str) -> Result<Option<TierList>>;

    /// Newest first.
    async fn list_tier_lists(&self, channel_id: &str) -> Result<Vec<TierList>>;

    /// Overwrites the stored list, including items, tiers and status. `NotFound` if missing.
    async fn save_tier_list(&self, list: &TierList) -> Result<()>;

    /// Completes every other active list on `list.channel_id` (end time `now`) and saves `list`
    /// in one step. Returns the lists that were force-completed.
    async fn activate_exclusive(
        &self,
        list: &TierList,
        now: DateTime<Utc>,
    ) -> Result<Vec<TierList>>;

    /// Removes the list with its ballots, analytics and suggestions.
    /// Returns false if it did not exist.
    async fn delete_tier_list(&self, id: &str) -> Result<bool>;

    /// Completed lists that have no analytics record yet.
    async fn completed_without_analytics(&self) -> Result<Vec<TierList>>;

    async fn get_ballot(&self, tier_list_id: &str, user_id: &str) -> Result<Option<Ballot>>;

    /// `Conflict` if the user already has a ballot for this list.
    async fn insert_ballot(&self, ballot: &Ballot) -> Result<()>;

    /// `NotFound` if the ballot does not exist.
    async fn update_ballot(&self, ballot: &Ballot) -> Result<()>;

    async fn list_ballots(&self, tier_list_id: &str) -> Result<Vec<Ballot>>;

    async fn delete_ballots(&self, tier_list_id: &str) -> Result<u64>;

    /// Removes `item_id` from every ballot of the list. Returns how many ballots changed.
    async fn strip_item_from_ballots(&self, tier_list_id: &str, item_id: &str) -> Result<u64>;

    async fn upsert_analytics(&self, record: &AnalyticsRecord) -> Result<()>;

    async fn get_analytics(&self, tier_list_id: &str) -> Result<Option<AnalyticsRecord>>;

    async fn delete_analytics(&self, tier_list_id: &str) -> Result<()>;

    /// Most recently completed first.
    async fn list_analytics(&self, channel_id: &str) -> Result<Vec<AnalyticsRecord>>;

    /// `Conflict` if the same user already suggested the same name for this list.
    async fn create_suggestion(&self, suggestion: &Suggestion) -> Result<()>;

    async fn get_suggestion(&self, id: &str) -> Result<Option<Suggestion>>;

    /// Newest first, optionally filtered by status.
    async fn list_suggestions(
        &self,
        tier_list_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>>;

    async fn set_suggestion_status(&self, id: &str, status: SuggestionStatus) -> Result<()>;

    async fn get_template(&self, id: &str) -> Result<Option<Template>>;

    /// The template published from `tier_list_id`, public or not.
    async fn get_template_for_list(&self, tier_list_id: &str) -> Result<Option<Template>>;

    /// Inserts or updates by id. Usage and rating counters of an existing template are kept.
    /// `Conflict` if a different template already snapshots the same tier list.
    async fn save_template(&self, template: &Template) -> Result<()>;

    async fn list_public_templates(&self) -> Result<Vec<Template>>;

    /// Bumps the usage count. `NotFound` if the template does not exist.
    async fn record_template_use(&self, id: &str) -> Result<()>;

    /// Replaces the user's rating and refreshes the template's average in one step.
    /// Returns the updated template; `NotFound` if it does not exist.
    async fn rate_template(&self, rating: &TemplateRating) -> Result<Template>;

    async fn get_template_rating(
        &self,
        template_id: &str,
        user_id: &str,
    ) -> Result<Option<TemplateRating>>;
}
