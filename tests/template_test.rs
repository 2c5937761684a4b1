use std::sync::Arc;

use trusty_tier::handlers::{NewTierList, TemplatePublish};
use trusty_tier::models::{Caller, NewItem, TierListStatus};
use trusty_tier::templates::{TemplateQuery, TemplateSort};
use trusty_tier::{ChannelHub, MemoryStore, TierError, TierService};

fn service() -> TierService {
    TierService::new(Arc::new(MemoryStore::new()), Arc::new(ChannelHub::default()))
}

fn games() -> NewTierList {
    NewTierList {
        title: "Games".to_string(),
        description: Some("All time greats".to_string()),
        items: ["Tetris", "Doom"]
            .iter()
            .map(|name| NewItem {
                name: name.to_string(),
                image_url: None,
            })
            .collect(),
        tiers: Some(vec!["Top".to_string(), "Mid".to_string(), "Low".to_string()]),
    }
}

fn listing(category: &str, tags: &[&str]) -> TemplatePublish {
    TemplatePublish {
        description: None,
        category: Some(category.to_string()),
        tags: Some(tags.iter().map(|tag| tag.to_string()).collect()),
    }
}

#[tokio::test]
async fn publishing_and_cloning() {
    let service = service();
    let owner = Caller::broadcaster("chan1");
    let list = service.create_tier_list(&owner, games()).await.unwrap();

    let template = service
        .publish_template(&owner, &list.id, listing("games", &[" Retro ", "retro", "PC"]))
        .await
        .unwrap();
    assert!(template.is_public);
    assert_eq!(template.title, "Games");
    assert_eq!(template.description.as_deref(), Some("All time greats"));
    assert_eq!(template.tags, vec!["retro", "pc"]);

    let other = Caller::broadcaster("chan2");
    let copy = service.clone_template(&other, &template.id).await.unwrap();
    assert_eq!(copy.channel_id, "chan2");
    assert_eq!(copy.title, "Games (Copy)");
    assert_eq!(copy.status, TierListStatus::Draft);
    assert_eq!(copy.tiers, list.tiers);
    let names: Vec<_> = copy.items.iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["Tetris", "Doom"]);
    assert!(copy.items.iter().all(|item| !list.has_item(&item.id)));

    // The copy is a real list on the cloning channel
    let stored = service.get_tier_list(&copy.id).await.unwrap();
    assert_eq!(stored.items, copy.items);
    assert_eq!(service.get_template(&template.id).await.unwrap().usage_count, 1);
}

#[tokio::test]
async fn republishing_refreshes_the_snapshot() {
    let service = service();
    let owner = Caller::broadcaster("chan1");
    let list = service.create_tier_list(&owner, games()).await.unwrap();

    let first = service
        .publish_template(&owner, &list.id, listing("games", &["retro"]))
        .await
        .unwrap();
    service
        .clone_template(&Caller::broadcaster("chan2"), &first.id)
        .await
        .unwrap();
    service
        .add_item(
            &owner,
            &list.id,
            NewItem {
                name: "Zelda".to_string(),
                image_url: None,
            },
        )
        .await
        .unwrap();

    let second = service
        .publish_template(&owner, &list.id, TemplatePublish::default())
        .await
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.items.len(), 3);
    assert_eq!(second.category.as_deref(), Some("games"));
    assert_eq!(second.tags, vec!["retro"]);
    assert_eq!(service.get_template(&first.id).await.unwrap().usage_count, 1);
}

#[tokio::test]
async fn private_templates_are_hidden() {
    let service = service();
    let owner = Caller::broadcaster("chan1");
    let list = service.create_tier_list(&owner, games()).await.unwrap();

    assert!(service.unpublish_template(&owner, &list.id).await.unwrap().is_none());

    let template = service
        .publish_template(&owner, &list.id, TemplatePublish::default())
        .await
        .unwrap();
    let hidden = service
        .unpublish_template(&owner, &list.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!hidden.is_public);

    let other = Caller::broadcaster("chan2");
    assert!(matches!(
        service.get_template(&template.id).await,
        Err(TierError::Forbidden(_))
    ));
    assert!(matches!(
        service.clone_template(&other, &template.id).await,
        Err(TierError::Forbidden(_))
    ));
    assert!(matches!(
        service.rate_template(&Caller::viewer("u1", "chan2"), &template.id, 4).await,
        Err(TierError::Forbidden(_))
    ));

    let page = service.browse_templates(&TemplateQuery::default()).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn only_the_owner_publishes() {
    let service = service();
    let owner = Caller::broadcaster("chan1");
    let list = service.create_tier_list(&owner, games()).await.unwrap();

    for caller in [Caller::viewer("u1", "chan1"), Caller::broadcaster("chan2")] {
        assert!(matches!(
            service.publish_template(&caller, &list.id, TemplatePublish::default()).await,
            Err(TierError::Forbidden(_))
        ));
    }

    let template = service
        .publish_template(&owner, &list.id, TemplatePublish::default())
        .await
        .unwrap();
    assert!(matches!(
        service.clone_template(&Caller::viewer("u1", "chan2"), &template.id).await,
        Err(TierError::Forbidden(_))
    ));
    assert!(matches!(
        service.clone_template(&owner, "missing").await,
        Err(TierError::NotFound(_))
    ));
}

#[tokio::test]
async fn ratings_are_one_per_user() {
    let service = service();
    let owner = Caller::broadcaster("chan1");
    let list = service.create_tier_list(&owner, games()).await.unwrap();
    let template = service
        .publish_template(&owner, &list.id, TemplatePublish::default())
        .await
        .unwrap();

    let alice = Caller::viewer("alice", "chan9");
    let bob = Caller::viewer("bob", "chan9");

    service.rate_template(&alice, &template.id, 2).await.unwrap();
    service.rate_template(&bob, &template.id, 4).await.unwrap();
    let rated = service.rate_template(&alice, &template.id, 5).await.unwrap();

    assert_eq!(rated.total_ratings, 2);
    assert_eq!(rated.average_rating, 4.5);
    assert_eq!(
        service.get_template_rating(&template.id, "alice").await.unwrap(),
        Some(5)
    );
    assert_eq!(service.get_template_rating(&template.id, "carol").await.unwrap(), None);

    for bad in [0, 6] {
        assert!(matches!(
            service.rate_template(&bob, &template.id, bad).await,
            Err(TierError::Validation(_))
        ));
    }

    // Republishing keeps the ratings
    let republished = service
        .publish_template(&owner, &list.id, TemplatePublish::default())
        .await
        .unwrap();
    let stored = service.get_template(&republished.id).await.unwrap();
    assert_eq!(stored.total_ratings, 2);
    assert_eq!(stored.average_rating, 4.5);
}

#[tokio::test]
async fn browsing_filters_and_sorts() {
    let service = service();
    let owner = Caller::broadcaster("chan1");

    let mut ids = Vec::new();
    for (title, category) in [("Games", "games"), ("Snacks", "food"), ("Consoles", "games")] {
        let list = service
            .create_tier_list(
                &owner,
                NewTierList {
                    title: title.to_string(),
                    ..games()
                },
            )
            .await
            .unwrap();
        let template = service
            .publish_template(&owner, &list.id, listing(category, &[]))
            .await
            .unwrap();
        ids.push(template.id);
    }

    let fan = Caller::viewer("fan", "chan2");
    service.rate_template(&fan, &ids[2], 5).await.unwrap();
    service.rate_template(&fan, &ids[0], 3).await.unwrap();

    let page = service
        .browse_templates(&TemplateQuery {
            category: Some("games".to_string()),
            sort: TemplateSort::Rating,
            ..Default::default()
        })
        .await
        .unwrap();
    let titles: Vec<_> = page.templates.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Consoles", "Games"]);

    let page = service
        .browse_templates(&TemplateQuery {
            search: Some("snack".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.templates[0].id, ids[1]);
}
