use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::{Ballot, Item, TierList};

/// Consensus for a single item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub item: Item,
    pub tier_counts: BTreeMap<String, u32>,
    pub total_votes: u32,
    pub average_tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_rank: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResults {
    pub tier_list_id: String,
    // Same order as the tier list's items
    pub results: Vec<ItemResult>,
    pub total_voters: u32,
    // Entries naming a removed item or a tier no longer on the scale
    pub dropped_votes: u32,
}

impl AggregateResults {
    pub fn result_for(&self, item_id: &str) -> Option<&ItemResult> {
        self.results.iter().find(|result| result.item.id == item_id)
    }

    pub fn total_item_votes(&self) -> u32 {
        self.results.iter().map(|result| result.total_votes).sum()
    }
}

/// Folds every ballot into per-item tier counts and a consensus tier.
///
/// Pure: the same tier list and ballots always produce the same output.
pub fn aggregate(tier_list: &TierList, ballots: &[Ballot]) -> AggregateResults {
    let tiers = &tier_list.tiers;

    let mut counts: Vec<BTreeMap<String, u32>> = vec![BTreeMap::new(); tier_list.items.len()];
    let index: HashMap<&str, usize> = tier_list
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.as_str(), i))
        .collect();

    let mut dropped_votes = 0;
    for ballot in ballots {
        for entry in &ballot.entries {
            match index.get(entry.item_id.as_str()) {
                Some(&i) if tiers.contains(&entry.tier) => {
                    *counts[i].entry(entry.tier.clone()).or_insert(0) += 1;
                }
                _ => dropped_votes += 1,
            }
        }
    }

    let results = tier_list
        .items
        .iter()
        .zip(counts)
        .map(|(item, tier_counts)| {
            let total_votes: u32 = tier_counts.values().sum();

            let (average_tier, mean_rank) = if total_votes > 0 {
                let weighted_sum: u64 = tier_counts
                    .iter()
                    .map(|(tier, count)| tiers.rank_of(tier).unwrap_or(0) as u64 * *count as u64)
                    .sum();
                let mean = weighted_sum as f64 / total_votes as f64;
                (tiers.nearest_label(mean).to_string(), Some(mean))
            } else {
                (tiers.neutral_label().to_string(), None)
            };

            ItemResult {
                item: item.clone(),
                tier_counts,
                total_votes,
                average_tier,
                mean_rank,
            }
        })
        .collect();

    AggregateResults {
        tier_list_id: tier_list.id.clone(),
        results,
        total_voters: ballots.len() as u32,
        dropped_votes,
    }
}
