mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::ScriptedStore;
use trusty_tier::handlers::NewTierList;
use trusty_tier::models::{Ballot, Caller, ItemVote, NewItem, SuggestionStatus, TierListStatus};
use trusty_tier::{ChannelHub, MemoryStore, TierError, TierService, TierStore};

const CHANNEL: &str = "chan1";

fn broadcaster() -> Caller {
    Caller::broadcaster(CHANNEL)
}

fn pets() -> NewTierList {
    NewTierList {
        title: "Pets".to_string(),
        items: ["Cat", "Dog"]
            .iter()
            .map(|name| NewItem {
                name: name.to_string(),
                image_url: None,
            })
            .collect(),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_activations_leave_one_active_list() {
    let service = Arc::new(TierService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ChannelHub::default()),
    ));

    let mut ids = Vec::new();
    for _ in 0..8 {
        ids.push(service.create_tier_list(&broadcaster(), pets()).await.unwrap().id);
    }

    let handles: Vec<_> = ids
        .iter()
        .cloned()
        .map(|id| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.activate(&broadcaster(), &id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let lists = service.list_tier_lists(CHANNEL).await.unwrap();
    let active = lists
        .iter()
        .filter(|list| list.status == TierListStatus::Active)
        .count();
    let completed = lists
        .iter()
        .filter(|list| list.status == TierListStatus::Completed)
        .count();
    assert_eq!(active, 1);
    assert_eq!(completed, 7);
}

#[tokio::test]
async fn in_flight_ballot_is_cleaned_by_item_removal_and_completion() {
    let store = Arc::new(ScriptedStore::with_slow_user("slow"));
    let service = Arc::new(TierService::new(store.clone(), Arc::new(ChannelHub::default())));

    let list = service.create_tier_list(&broadcaster(), pets()).await.unwrap();
    let list = service.activate(&broadcaster(), &list.id).await.unwrap();
    let dog = list.items[1].id.clone();

    let submission = {
        let service = Arc::clone(&service);
        let (list_id, dog) = (list.id.clone(), dog.clone());
        tokio::spawn(async move {
            service
                .submit_ballot(&list_id, "slow", vec![ItemVote::new(dog, "S")])
                .await
        })
    };
    // Let the submission reach its stalled ballot read
    tokio::time::sleep(Duration::from_millis(50)).await;

    service.remove_item(&broadcaster(), &list.id, &dog).await.unwrap();
    let completed = service.complete(&broadcaster(), &list.id).await.unwrap();
    assert_eq!(completed.status, TierListStatus::Completed);

    // The submission landed before the removal, which then stripped it
    let ballot = submission.await.unwrap().unwrap();
    assert_eq!(ballot.entries, vec![ItemVote::new(&dog, "S")]);

    let stored = store.get_ballot(&list.id, "slow").await.unwrap().unwrap();
    assert!(stored.entries.is_empty());

    let record = store.get_analytics(&list.id).await.unwrap().unwrap();
    assert_eq!(record.total_votes, 0);
    assert_eq!(record.item_count, 1);
}

#[tokio::test]
async fn ballot_created_concurrently_is_merged_not_overwritten() {
    let store = Arc::new(ScriptedStore::default());
    let service = TierService::new(store.clone(), Arc::new(ChannelHub::default()));

    let list = service.create_tier_list(&broadcaster(), pets()).await.unwrap();
    let list = service.activate(&broadcaster(), &list.id).await.unwrap();
    let (cat, dog) = (list.items[0].id.clone(), list.items[1].id.clone());

    // Another request for the same user wins the insert
    let now = Utc::now();
    store.lose_next_insert_to(Ballot {
        tier_list_id: list.id.clone(),
        channel_id: CHANNEL.to_string(),
        user_id: "u1".to_string(),
        entries: vec![ItemVote::new(&cat, "S")],
        created_at: now,
        updated_at: now,
    });

    let ballot = service
        .submit_ballot(&list.id, "u1", vec![ItemVote::new(&dog, "A")])
        .await
        .unwrap();
    assert!(!store.competing_ballot_pending());

    assert_eq!(ballot.tier_for(&cat), Some("S"));
    assert_eq!(ballot.tier_for(&dog), Some("A"));
    assert_eq!(ballot.created_at, now);

    let stored = service.get_user_ballot(&list.id, "u1").await.unwrap();
    assert_eq!(stored.entries, ballot.entries);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_approvals_add_the_item_once() {
    let service = Arc::new(TierService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ChannelHub::default()),
    ));

    let list = service.create_tier_list(&broadcaster(), pets()).await.unwrap();
    service.activate(&broadcaster(), &list.id).await.unwrap();
    let suggestion = service
        .suggest_item(&Caller::viewer("u1", CHANNEL), &list.id, "Ferret", None)
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = Arc::clone(&service);
            let id = suggestion.id.clone();
            tokio::spawn(async move {
                if i % 2 == 0 {
                    service.approve_suggestion(&broadcaster(), &id).await.map(|_| ())
                } else {
                    service.reject_suggestion(&broadcaster(), &id).await.map(|_| ())
                }
            })
        })
        .collect();

    let mut settled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => settled += 1,
            Err(err) => assert!(matches!(err, TierError::InvalidState(_)), "{:?}", err),
        }
    }
    assert_eq!(settled, 1);

    let list = service.get_tier_list(&list.id).await.unwrap();
    let ferrets = list.items.iter().filter(|item| item.name == "Ferret").count();
    let stored = service.list_suggestions(&list.id, None).await.unwrap();
    match stored[0].status {
        SuggestionStatus::Approved => assert_eq!(ferrets, 1),
        SuggestionStatus::Rejected => assert_eq!(ferrets, 0),
        SuggestionStatus::Pending => panic!("suggestion left pending"),
    }
}
