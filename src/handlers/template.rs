use chrono::Utc;
use log::info;
use serde::Deserialize;

use super::{clean_optional, require_broadcaster, require_broadcaster_role, TierService};
use crate::error::{Result, TierError};
use crate::models::{Caller, Template, TemplateRating, TierList};
use crate::templates::{self, TemplatePage, TemplateQuery};

/// Listing details given when publishing. Omitted fields keep what an earlier publish set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePublish {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl TierService {
    /// Publishes the list's current items and scale as a public template.
    ///
    /// Republishing refreshes the existing template; its usage count and ratings carry over.
    pub async fn publish_template(
        &self,
        caller: &Caller,
        tier_list_id: &str,
        publish: TemplatePublish,
    ) -> Result<Template> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let now = Utc::now();
        let mut template = match self.store.get_template_for_list(&list.id).await? {
            Some(mut existing) => {
                existing.title = list.title.clone();
                existing.items = list.items.clone();
                existing.tiers = list.tiers.clone();
                existing.updated_at = now;
                existing
            }
            None => Template::from_tier_list(&list, now),
        };

        if let Some(description) = clean_optional(publish.description) {
            template.description = Some(description);
        }
        if let Some(category) = clean_optional(publish.category) {
            template.category = Some(category);
        }
        if let Some(tags) = publish.tags {
            template.tags = clean_tags(tags);
        }
        template.is_public = true;

        self.store.save_template(&template).await?;
        info!("Published tier list {} as template {}", list.id, template.id);
        Ok(template)
    }

    /// Hides the list's template from browsing and cloning. `None` if it was never published.
    pub async fn unpublish_template(
        &self,
        caller: &Caller,
        tier_list_id: &str,
    ) -> Result<Option<Template>> {
        let list = self.load_list(tier_list_id).await?;
        require_broadcaster(caller, &list)?;

        let Some(mut template) = self.store.get_template_for_list(&list.id).await? else {
            return Ok(None);
        };
        template.is_public = false;
        template.updated_at = Utc::now();

        self.store.save_template(&template).await?;
        info!("Unpublished template {}", template.id);
        Ok(Some(template))
    }

    pub async fn get_template(&self, template_id: &str) -> Result<Template> {
        self.public_template(template_id).await
    }

    pub async fn browse_templates(&self, query: &TemplateQuery) -> Result<TemplatePage> {
        let templates = self.store.list_public_templates().await?;
        Ok(templates::browse(templates, query))
    }

    /// Creates a Draft tier list on the caller's channel from a public template.
    pub async fn clone_template(&self, caller: &Caller, template_id: &str) -> Result<TierList> {
        require_broadcaster_role(caller)?;
        let template = self.public_template(template_id).await?;

        let list = templates::instantiate(&template, &caller.channel_id);
        self.store.create_tier_list(&list).await?;
        self.store.record_template_use(&template.id).await?;

        info!(
            "Cloned template {} into tier list {} on channel {}",
            template.id, list.id, list.channel_id
        );
        Ok(list)
    }

    /// Records the caller's 1 to 5 rating, replacing any earlier one.
    pub async fn rate_template(
        &self,
        caller: &Caller,
        template_id: &str,
        rating: u8,
    ) -> Result<Template> {
        templates::validate_rating(rating)?;
        let template = self.public_template(template_id).await?;

        let rating = TemplateRating {
            template_id: template.id.clone(),
            user_id: caller.user_id.clone(),
            rating,
            created_at: Utc::now(),
        };
        let template = self.store.rate_template(&rating).await?;

        info!(
            "User {} rated template {} {}; average now {:.2} over {}",
            caller.user_id,
            template.id,
            rating.rating,
            template.average_rating,
            template.total_ratings
        );
        Ok(template)
    }

    pub async fn get_template_rating(
        &self,
        template_id: &str,
        user_id: &str,
    ) -> Result<Option<u8>> {
        Ok(self
            .store
            .get_template_rating(template_id, user_id)
            .await?
            .map(|rating| rating.rating))
    }

    async fn public_template(&self, template_id: &str) -> Result<Template> {
        let template = self
            .store
            .get_template(template_id)
            .await?
            .ok_or_else(|| TierError::not_found("template", template_id))?;
        if !template.is_public {
            return Err(TierError::Forbidden(format!("template {} is private", template.id)));
        }
        Ok(template)
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !cleaned.contains(&tag) {
            cleaned.push(tag);
        }
    }
    cleaned
}
