use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::TierStore;
use crate::error::{Result, TierError};
use crate::models::{
    AnalyticsRecord, Ballot, Suggestion, SuggestionStatus, Template, TemplateRating, TierList,
    TierListStatus,
};
use crate::templates::rating_summary;

#[derive(Default)]
struct Inner {
    // insertion order
    tier_lists: Vec<TierList>,
    ballots: HashMap<(String, String), Ballot>,
    analytics: HashMap<String, AnalyticsRecord>,
    suggestions: Vec<Suggestion>,
    templates: Vec<Template>,
    template_ratings: HashMap<(String, String), TemplateRating>,
}

/// `TierStore` held entirely in memory behind one lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(mut rows: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    // Later inserts win ties, then the stable sort orders by timestamp
    rows.reverse();
    rows.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    rows
}

#[async_trait]
impl TierStore for MemoryStore {
    async fn create_tier_list(&self, list: &TierList) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.tier_lists.iter().any(|l| l.id == list.id) {
            return Err(TierError::Conflict(format!("tier list {} already exists", list.id)));
        }
        inner.tier_lists.push(list.clone());
        Ok(())
    }

    async fn get_tier_list(&self, id: &str) -> Result<Option<TierList>> {
        let inner = self.inner.read().await;
        Ok(inner.tier_lists.iter().find(|l| l.id == id).cloned())
    }

    async fn list_tier_lists(&self, channel_id: &str) -> Result<Vec<TierList>> {
        let inner = self.inner.read().await;
        let lists = inner
            .tier_lists
            .iter()
            .filter(|l| l.channel_id == channel_id)
            .cloned()
            .collect();
        Ok(newest_first(lists, |l| l.created_at))
    }

    async fn save_tier_list(&self, list: &TierList) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.tier_lists.iter_mut().find(|l| l.id == list.id) {
            Some(stored) => {
                *stored = list.clone();
                Ok(())
            }
            None => Err(TierError::not_found("tier list", &list.id)),
        }
    }

    async fn activate_exclusive(
        &self,
        list: &TierList,
        now: DateTime<Utc>,
    ) -> Result<Vec<TierList>> {
        let mut inner = self.inner.write().await;
        if !inner.tier_lists.iter().any(|l| l.id == list.id) {
            return Err(TierError::not_found("tier list", &list.id));
        }

        let mut completed = Vec::new();
        for stored in inner.tier_lists.iter_mut() {
            if stored.id == list.id {
                *stored = list.clone();
            } else if stored.channel_id == list.channel_id
                && stored.status == TierListStatus::Active
            {
                stored.status = TierListStatus::Completed;
                stored.end_time = Some(now);
                completed.push(stored.clone());
            }
        }
        Ok(completed)
    }

    async fn delete_tier_list(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.tier_lists.len();
        inner.tier_lists.retain(|l| l.id != id);
        if inner.tier_lists.len() == before {
            return Ok(false);
        }

        inner.ballots.retain(|(list_id, _), _| list_id != id);
        inner.analytics.remove(id);
        inner.suggestions.retain(|s| s.tier_list_id != id);
        Ok(true)
    }

    async fn completed_without_analytics(&self) -> Result<Vec<TierList>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tier_lists
            .iter()
            .filter(|l| {
                l.status == TierListStatus::Completed && !inner.analytics.contains_key(&l.id)
            })
            .cloned()
            .collect())
    }

    async fn get_ballot(&self, tier_list_id: &str, user_id: &str) -> Result<Option<Ballot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ballots
            .get(&(tier_list_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn insert_ballot(&self, ballot: &Ballot) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (ballot.tier_list_id.clone(), ballot.user_id.clone());
        if inner.ballots.contains_key(&key) {
            return Err(TierError::Conflict(format!(
                "ballot for user {} on tier list {} already exists",
                ballot.user_id, ballot.tier_list_id
            )));
        }
        inner.ballots.insert(key, ballot.clone());
        Ok(())
    }

    async fn update_ballot(&self, ballot: &Ballot) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (ballot.tier_list_id.clone(), ballot.user_id.clone());
        match inner.ballots.get_mut(&key) {
            Some(stored) => {
                *stored = ballot.clone();
                Ok(())
            }
            None => Err(TierError::not_found("ballot for user", &ballot.user_id)),
        }
    }

    async fn list_ballots(&self, tier_list_id: &str) -> Result<Vec<Ballot>> {
        let inner = self.inner.read().await;
        let mut ballots: Vec<Ballot> = inner
            .ballots
            .values()
            .filter(|b| b.tier_list_id == tier_list_id)
            .cloned()
            .collect();
        ballots.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(ballots)
    }

    async fn delete_ballots(&self, tier_list_id: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.ballots.len();
        inner.ballots.retain(|(list_id, _), _| list_id != tier_list_id);
        Ok((before - inner.ballots.len()) as u64)
    }

    async fn strip_item_from_ballots(&self, tier_list_id: &str, item_id: &str) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut changed = 0;
        for ballot in inner.ballots.values_mut().filter(|b| b.tier_list_id == tier_list_id) {
            let before = ballot.entries.len();
            ballot.entries.retain(|entry| entry.item_id != item_id);
            if ballot.entries.len() != before {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn upsert_analytics(&self, record: &AnalyticsRecord) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.analytics.insert(record.tier_list_id.clone(), record.clone());
        Ok(())
    }

    async fn get_analytics(&self, tier_list_id: &str) -> Result<Option<AnalyticsRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.analytics.get(tier_list_id).cloned())
    }

    async fn delete_analytics(&self, tier_list_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.analytics.remove(tier_list_id);
        Ok(())
    }

    async fn list_analytics(&self, channel_id: &str) -> Result<Vec<AnalyticsRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<AnalyticsRecord> = inner
            .analytics
            .values()
            .filter(|r| r.channel_id == channel_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| a.tier_list_id.cmp(&b.tier_list_id))
        });
        Ok(records)
    }

    async fn create_suggestion(&self, suggestion: &Suggestion) -> Result<()> {
        let mut inner = self.inner.write().await;
        let duplicate = inner.suggestions.iter().any(|s| {
            s.tier_list_id == suggestion.tier_list_id
                && s.user_id == suggestion.user_id
                && s.item_name == suggestion.item_name
        });
        if duplicate {
            return Err(TierError::Conflict(format!(
                "suggestion {} already made by this user",
                suggestion.item_name
            )));
        }
        inner.suggestions.push(suggestion.clone());
        Ok(())
    }

    async fn get_suggestion(&self, id: &str) -> Result<Option<Suggestion>> {
        let inner = self.inner.read().await;
        Ok(inner.suggestions.iter().find(|s| s.id == id).cloned())
    }

    async fn list_suggestions(
        &self,
        tier_list_id: &str,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>> {
        let inner = self.inner.read().await;
        let rows = inner
            .suggestions
            .iter()
            .filter(|s| s.tier_list_id == tier_list_id)
            .filter(|s| status.map_or(true, |wanted| s.status == wanted))
            .cloned()
            .collect();
        Ok(newest_first(rows, |s| s.created_at))
    }

    async fn set_suggestion_status(&self, id: &str, status: SuggestionStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.suggestions.iter_mut().find(|s| s.id == id) {
            Some(suggestion) => {
                suggestion.status = status;
                Ok(())
            }
            None => Err(TierError::not_found("suggestion", id)),
        }
    }

    async fn get_template(&self, id: &str) -> Result<Option<Template>> {
        let inner = self.inner.read().await;
        Ok(inner.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn get_template_for_list(&self, tier_list_id: &str) -> Result<Option<Template>> {
        let inner = self.inner.read().await;
        Ok(inner
            .templates
            .iter()
            .find(|t| t.tier_list_id == tier_list_id)
            .cloned())
    }

    async fn save_template(&self, template: &Template) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner
            .templates
            .iter()
            .any(|t| t.tier_list_id == template.tier_list_id && t.id != template.id)
        {
            return Err(TierError::Conflict(format!(
                "tier list {} already has a template",
                template.tier_list_id
            )));
        }

        match inner.templates.iter().position(|t| t.id == template.id) {
            Some(i) => {
                let stored = &mut inner.templates[i];
                let (usage_count, average_rating, total_ratings) =
                    (stored.usage_count, stored.average_rating, stored.total_ratings);
                *stored = template.clone();
                stored.usage_count = usage_count;
                stored.average_rating = average_rating;
                stored.total_ratings = total_ratings;
            }
            None => inner.templates.push(template.clone()),
        }
        Ok(())
    }

    async fn list_public_templates(&self) -> Result<Vec<Template>> {
        let inner = self.inner.read().await;
        Ok(inner.templates.iter().filter(|t| t.is_public).cloned().collect())
    }

    async fn record_template_use(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.templates.iter_mut().find(|t| t.id == id) {
            Some(template) => {
                template.usage_count += 1;
                Ok(())
            }
            None => Err(TierError::not_found("template", id)),
        }
    }

    async fn rate_template(&self, rating: &TemplateRating) -> Result<Template> {
        let mut inner = self.inner.write().await;
        if !inner.templates.iter().any(|t| t.id == rating.template_id) {
            return Err(TierError::not_found("template", &rating.template_id));
        }

        inner.template_ratings.insert(
            (rating.template_id.clone(), rating.user_id.clone()),
            rating.clone(),
        );
        let ratings: Vec<u8> = inner
            .template_ratings
            .values()
            .filter(|r| r.template_id == rating.template_id)
            .map(|r| r.rating)
            .collect();
        let (average, total) = rating_summary(&ratings);

        let template = inner
            .templates
            .iter_mut()
            .find(|t| t.id == rating.template_id)
            .ok_or_else(|| TierError::not_found("template", &rating.template_id))?;
        template.average_rating = average;
        template.total_ratings = total;
        Ok(template.clone())
    }

    async fn get_template_rating(
        &self,
        template_id: &str,
        user_id: &str,
    ) -> Result<Option<TemplateRating>> {
        let inner = self.inner.read().await;
        Ok(inner
            .template_ratings
            .get(&(template_id.to_string(), user_id.to_string()))
            .cloned())
    }
}
