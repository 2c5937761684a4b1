use chrono::{DateTime, Utc};

use crate::models::{AnalyticsRecord, Ballot, ChannelSummary, TierList, TierShare, TopItem};
use crate::voting::aggregate::{aggregate, AggregateResults};

pub const TOP_ITEM_LIMIT: usize = 10;

/// Builds the analytics snapshot for a tier list from its ballots.
///
/// Only votes that count toward aggregation (known item, tier on the scale) enter the totals and
/// the distribution.
pub fn build_record(
    tier_list: &TierList,
    ballots: &[Ballot],
    completed_at: DateTime<Utc>,
) -> AnalyticsRecord {
    let results = aggregate(tier_list, ballots);

    AnalyticsRecord {
        tier_list_id: tier_list.id.clone(),
        channel_id: tier_list.channel_id.clone(),
        title: tier_list.title.clone(),
        total_votes: results.total_item_votes(),
        total_voters: results.total_voters,
        item_count: tier_list.items.len() as u32,
        completed_at,
        average_tier_distribution: tier_distribution(tier_list, &results),
        top_items: top_items(tier_list, &results, TOP_ITEM_LIMIT),
    }
}

/// Share of all item votes cast at each tier, in scale order. Tiers nobody picked are omitted.
pub fn tier_distribution(tier_list: &TierList, results: &AggregateResults) -> Vec<TierShare> {
    let total = results.total_item_votes();
    if total == 0 {
        return Vec::new();
    }

    tier_list
        .tiers
        .labels()
        .iter()
        .filter_map(|tier| {
            let count: u32 = results
                .results
                .iter()
                .filter_map(|result| result.tier_counts.get(tier))
                .sum();
            (count > 0).then(|| TierShare {
                tier: tier.clone(),
                percent: count as f64 / total as f64 * 100.0,
            })
        })
        .collect()
}

/// Highest consensus tiers first, more votes breaking ties, then tier list order.
pub fn top_items(tier_list: &TierList, results: &AggregateResults, limit: usize) -> Vec<TopItem> {
    let tiers = &tier_list.tiers;

    let mut voted: Vec<_> = results
        .results
        .iter()
        .filter(|result| result.total_votes > 0)
        .collect();

    // sort_by is stable, so equal keys keep item order
    voted.sort_by(|a, b| {
        let rank_a = tiers.rank_of(&a.average_tier).unwrap_or(0);
        let rank_b = tiers.rank_of(&b.average_tier).unwrap_or(0);
        rank_b
            .cmp(&rank_a)
            .then_with(|| b.total_votes.cmp(&a.total_votes))
    });

    voted
        .into_iter()
        .take(limit)
        .map(|result| TopItem {
            item_name: result.item.name.clone(),
            average_tier: result.average_tier.clone(),
            vote_count: result.total_votes,
        })
        .collect()
}

/// Averages a channel's analytics history.
///
/// A tier's channel-wide percentage is the mean over the lists that recorded that tier; lists
/// where nobody used it are left out of that tier's denominator. Tiers are reported in order of
/// first appearance across records sorted by completion time, and that order breaks ties for
/// the most popular tier.
pub fn summarize_channel(records: &[AnalyticsRecord]) -> ChannelSummary {
    let total_tier_lists = records.len() as u32;
    let total_votes: u64 = records.iter().map(|r| r.total_votes as u64).sum();
    let total_voters: u64 = records.iter().map(|r| r.total_voters as u64).sum();

    if records.is_empty() {
        return ChannelSummary {
            total_tier_lists,
            total_votes,
            total_voters,
            average_votes_per_list: 0.0,
            average_voters_per_list: 0.0,
            most_popular_tier: None,
            tier_distribution: Vec::new(),
        };
    }

    let mut ordered: Vec<&AnalyticsRecord> = records.iter().collect();
    ordered.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then_with(|| a.tier_list_id.cmp(&b.tier_list_id))
    });

    // (tier, percent sum, lists that recorded it)
    let mut sums: Vec<(String, f64, u32)> = Vec::new();
    for record in ordered {
        for share in &record.average_tier_distribution {
            match sums.iter_mut().find(|(tier, _, _)| *tier == share.tier) {
                Some((_, sum, seen)) => {
                    *sum += share.percent;
                    *seen += 1;
                }
                None => sums.push((share.tier.clone(), share.percent, 1)),
            }
        }
    }

    let tier_distribution: Vec<TierShare> = sums
        .into_iter()
        .map(|(tier, sum, seen)| TierShare {
            tier,
            percent: sum / seen as f64,
        })
        .collect();

    let mut most_popular: Option<&TierShare> = None;
    for share in &tier_distribution {
        if most_popular.map_or(true, |best| share.percent > best.percent) {
            most_popular = Some(share);
        }
    }

    ChannelSummary {
        total_tier_lists,
        total_votes,
        total_voters,
        average_votes_per_list: total_votes as f64 / total_tier_lists as f64,
        average_voters_per_list: total_voters as f64 / total_tier_lists as f64,
        most_popular_tier: most_popular.map(|share| share.tier.clone()),
        tier_distribution,
    }
}
