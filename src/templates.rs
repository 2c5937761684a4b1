use serde::{Deserialize, Serialize};

use crate::error::{Result, TierError};
use crate::models::{Item, Template, TierList};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateSort {
    // Best rated first, more clones breaking ties
    #[default]
    Rating,
    Usage,
    Recent,
}

/// Filters for browsing public templates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateQuery {
    #[serde(default)]
    pub category: Option<String>,
    // Matches templates carrying any of these tags
    #[serde(default)]
    pub tags: Vec<String>,
    // Case-insensitive, against title and description
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub sort: TemplateSort,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePage {
    pub templates: Vec<Template>,
    pub total: usize,
    pub has_more: bool,
}

/// Filters, orders and pages `templates`. Private templates never appear.
pub fn browse(templates: Vec<Template>, query: &TemplateQuery) -> TemplatePage {
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut matching: Vec<Template> = templates
        .into_iter()
        .filter(|t| t.is_public)
        .filter(|t| match &query.category {
            Some(category) => t.category.as_deref() == Some(category.as_str()),
            None => true,
        })
        .filter(|t| query.tags.is_empty() || t.tags.iter().any(|tag| query.tags.contains(tag)))
        .filter(|t| match &search {
            Some(needle) => {
                t.title.to_lowercase().contains(needle)
                    || t.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(needle))
            }
            None => true,
        })
        .collect();

    // Newest first as the base order, so every sort breaks ties the same way
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    match query.sort {
        TemplateSort::Rating => matching.sort_by(|a, b| {
            b.average_rating
                .total_cmp(&a.average_rating)
                .then_with(|| b.usage_count.cmp(&a.usage_count))
        }),
        TemplateSort::Usage => matching.sort_by(|a, b| b.usage_count.cmp(&a.usage_count)),
        TemplateSort::Recent => {}
    }

    let total = matching.len();
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let templates: Vec<Template> = matching.into_iter().skip(query.skip).take(limit).collect();
    let has_more = query.skip + templates.len() < total;

    TemplatePage {
        templates,
        total,
        has_more,
    }
}

pub fn validate_rating(rating: u8) -> Result<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(TierError::Validation(format!(
            "rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )));
    }
    Ok(())
}

/// Mean of the ratings and how many there are; `(0.0, 0)` when unrated.
pub fn rating_summary(ratings: &[u8]) -> (f64, u32) {
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let sum: u32 = ratings.iter().map(|r| *r as u32).sum();
    (sum as f64 / ratings.len() as f64, ratings.len() as u32)
}

/// A new Draft tier list for `channel_id` with the template's items and scale.
///
/// Items get fresh ids so ballots on the source list never match the copy.
pub fn instantiate(template: &Template, channel_id: &str) -> TierList {
    let items = template
        .items
        .iter()
        .map(|item| Item::new(item.name.clone(), item.image_url.clone()))
        .collect();

    let mut list = TierList::new(
        channel_id.to_string(),
        format!("{} (Copy)", template.title),
        items,
        template.tiers.clone(),
    );
    list.description = template.description.clone();
    list
}
