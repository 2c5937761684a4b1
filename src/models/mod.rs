use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::voting::scale::TierScale;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Item {
    pub fn new(name: String, image_url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            image_url,
        }
    }
}

// Input shape for items created by the broadcaster or approved from a suggestion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierListStatus {
    Draft,
    Active,
    Completed,
}

impl TierListStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierListStatus::Draft => "draft",
            TierListStatus::Active => "active",
            TierListStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(TierListStatus::Draft),
            "active" => Some(TierListStatus::Active),
            "completed" => Some(TierListStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierList {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Vec<Item>,
    pub tiers: TierScale,
    pub status: TierListStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub allow_real_time_updates: bool,
    pub created_at: DateTime<Utc>,
}

impl TierList {
    pub fn new(channel_id: String, title: String, items: Vec<Item>, tiers: TierScale) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel_id,
            title,
            description: None,
            items,
            tiers,
            status: TierListStatus::Draft,
            start_time: None,
            end_time: None,
            allow_real_time_updates: true,
            created_at: Utc::now(),
        }
    }

    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == item_id)
    }

    pub fn has_item(&self, item_id: &str) -> bool {
        self.item(item_id).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemVote {
    pub item_id: String,
    pub tier: String,
}

impl ItemVote {
    pub fn new(item_id: impl Into<String>, tier: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            tier: tier.into(),
        }
    }
}

/// One user's current tier assignments for one tier list.
///
/// `entries` holds at most one vote per item and is kept sorted by item id, so two
/// ballots with the same assignments compare equal regardless of submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ballot {
    pub tier_list_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub entries: Vec<ItemVote>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ballot {
    pub fn tier_for(&self, item_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.item_id == item_id)
            .map(|entry| entry.tier.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierShare {
    pub tier: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopItem {
    pub item_name: String,
    pub average_tier: String,
    pub vote_count: u32,
}

/// Snapshot of a completed tier list's statistics, one per tier list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    pub tier_list_id: String,
    pub channel_id: String,
    pub title: String,
    pub total_votes: u32,
    pub total_voters: u32,
    pub item_count: u32,
    pub completed_at: DateTime<Utc>,
    // Ordered by the tier list's scale, most favorable first
    pub average_tier_distribution: Vec<TierShare>,
    pub top_items: Vec<TopItem>,
}

impl AnalyticsRecord {
    pub fn percent_for(&self, tier: &str) -> Option<f64> {
        self.average_tier_distribution
            .iter()
            .find(|share| share.tier == tier)
            .map(|share| share.percent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSummary {
    pub total_tier_lists: u32,
    pub total_votes: u64,
    pub total_voters: u64,
    pub average_votes_per_list: f64,
    pub average_voters_per_list: f64,
    pub most_popular_tier: Option<String>,
    pub tier_distribution: Vec<TierShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Broadcaster,
    Moderator,
    Viewer,
}

/// Identity of whoever is calling into the service, already verified by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user_id: String,
    pub channel_id: String,
    pub role: Role,
}

impl Caller {
    pub fn broadcaster(channel_id: impl Into<String>) -> Self {
        let channel_id = channel_id.into();
        Self {
            user_id: channel_id.clone(),
            channel_id,
            role: Role::Broadcaster,
        }
    }

    pub fn viewer(user_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            role: Role::Viewer,
        }
    }

    pub fn is_broadcaster(&self) -> bool {
        self.role == Role::Broadcaster
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Approved => "approved",
            SuggestionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SuggestionStatus::Pending),
            "approved" => Some(SuggestionStatus::Approved),
            "rejected" => Some(SuggestionStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub tier_list_id: String,
    pub channel_id: String,
    pub user_id: String,
    pub item_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
}

impl Suggestion {
    pub fn new(
        tier_list_id: String,
        channel_id: String,
        user_id: String,
        item_name: String,
        image_url: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tier_list_id,
            channel_id,
            user_id,
            item_name,
            image_url,
            status: SuggestionStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// A published snapshot of a tier list's items and scale that any channel can clone.
///
/// `usage_count`, `average_rating` and `total_ratings` are maintained by the store; saving a
/// template never overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub tier_list_id: String,
    pub channel_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Vec<Item>,
    pub tiers: TierScale,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_public: bool,
    pub usage_count: u32,
    pub average_rating: f64,
    pub total_ratings: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn from_tier_list(list: &TierList, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tier_list_id: list.id.clone(),
            channel_id: list.channel_id.clone(),
            title: list.title.clone(),
            description: list.description.clone(),
            items: list.items.clone(),
            tiers: list.tiers.clone(),
            category: None,
            tags: Vec::new(),
            is_public: true,
            usage_count: 0,
            average_rating: 0.0,
            total_ratings: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One user's 1 to 5 star rating of a template. A user has at most one per template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRating {
    pub template_id: String,
    pub user_id: String,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
}
