use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::models::{Ballot, ItemVote};

/// Folds `incoming` over `existing`, last tier wins per item.
///
/// Items absent from `incoming` keep their previous tier. Duplicates inside `incoming` resolve to
/// the later entry. The result is sorted by item id.
pub fn merge_entries(existing: &[ItemVote], incoming: &[ItemVote]) -> Vec<ItemVote> {
    let mut by_item: BTreeMap<&str, &str> = BTreeMap::new();

    for entry in existing.iter().chain(incoming) {
        by_item.insert(entry.item_id.as_str(), entry.tier.as_str());
    }

    by_item
        .into_iter()
        .map(|(item_id, tier)| ItemVote::new(item_id, tier))
        .collect()
}

/// Produces the user's ballot after a submission.
///
/// With no prior ballot the result holds exactly the incoming entries.
pub fn merge_ballot(
    existing: Option<&Ballot>,
    tier_list_id: &str,
    channel_id: &str,
    user_id: &str,
    incoming: &[ItemVote],
    now: DateTime<Utc>,
) -> Ballot {
    match existing {
        Some(prior) => Ballot {
            entries: merge_entries(&prior.entries, incoming),
            updated_at: now,
            ..prior.clone()
        },
        None => Ballot {
            tier_list_id: tier_list_id.to_string(),
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            entries: merge_entries(&[], incoming),
            created_at: now,
            updated_at: now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(pairs: &[(&str, &str)]) -> Vec<ItemVote> {
        pairs.iter().map(|(item, tier)| ItemVote::new(*item, *tier)).collect()
    }

    #[test]
    fn partial_submission_keeps_untouched_items() {
        let merged = merge_entries(&votes(&[("cat", "S")]), &votes(&[("dog", "A")]));
        assert_eq!(merged, votes(&[("cat", "S"), ("dog", "A")]));
    }

    #[test]
    fn resubmitting_an_item_replaces_its_tier() {
        let merged = merge_entries(&votes(&[("cat", "S"), ("dog", "B")]), &votes(&[("cat", "F")]));
        assert_eq!(merged, votes(&[("cat", "F"), ("dog", "B")]));
    }

    #[test]
    fn duplicates_in_one_submission_keep_the_last() {
        let merged = merge_entries(&[], &votes(&[("cat", "S"), ("cat", "C")]));
        assert_eq!(merged, votes(&[("cat", "C")]));
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let existing = votes(&[("cat", "S"), ("dog", "B")]);
        let incoming = votes(&[("dog", "A"), ("eel", "F")]);

        let once = merge_entries(&existing, &incoming);
        let twice = merge_entries(&once, &incoming);
        assert_eq!(once, twice);
    }

    #[test]
    fn different_items_commute() {
        let a = votes(&[("cat", "S")]);
        let b = votes(&[("dog", "A")]);

        let ab = merge_entries(&merge_entries(&[], &a), &b);
        let ba = merge_entries(&merge_entries(&[], &b), &a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn first_ballot_is_exactly_the_incoming_set() {
        let now = Utc::now();
        let entries = votes(&[("dog", "A"), ("cat", "S")]);
        let ballot = merge_ballot(None, "list", "chan", "user", &entries, now);

        assert_eq!(ballot.entries, votes(&[("cat", "S"), ("dog", "A")]));
        assert_eq!(ballot.created_at, now);
        assert_eq!(ballot.user_id, "user");
    }

    #[test]
    fn merged_ballot_keeps_creation_time() {
        let first = Utc::now();
        let prior = merge_ballot(None, "list", "chan", "user", &votes(&[("cat", "S")]), first);
        let later = first + chrono::Duration::seconds(30);

        let entries = votes(&[("dog", "A")]);
        let ballot = merge_ballot(Some(&prior), "list", "chan", "user", &entries, later);
        assert_eq!(ballot.created_at, first);
        assert_eq!(ballot.updated_at, later);
        assert_eq!(ballot.tier_for("cat"), Some("S"));
        assert_eq!(ballot.tier_for("dog"), Some("A"));
    }
}
