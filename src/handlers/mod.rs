mod analytics;
mod suggestion;
mod template;
mod tier_list;
mod vote;

pub use template::TemplatePublish;
pub use tier_list::{NewTierList, TierListUpdate};

use log::warn;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock as AsyncRwLock;

use crate::broadcast::{ChannelHub, TierEvent};
use crate::error::{Result, TierError};
use crate::models::{Caller, TierList};
use crate::store::TierStore;
use crate::voting::aggregate;

/// Entry point for every tier list operation the transport layer exposes.
///
/// Each channel has a lock. Broadcaster operations take it exclusively, which keeps at most one
/// list active per channel when activations race. Ballot submissions share it, so a ballot is
/// only ever written against a list that is still active and still has the voted items.
pub struct TierService {
    store: Arc<dyn TierStore>,
    hub: Arc<ChannelHub>,
    channel_locks: Mutex<HashMap<String, Arc<AsyncRwLock<()>>>>,
}

impl TierService {
    pub fn new(store: Arc<dyn TierStore>, hub: Arc<ChannelHub>) -> Self {
        Self {
            store,
            hub,
            channel_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn TierStore> {
        &self.store
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }

    async fn load_list(&self, tier_list_id: &str) -> Result<TierList> {
        self.store
            .get_tier_list(tier_list_id)
            .await?
            .ok_or_else(|| TierError::not_found("tier list", tier_list_id))
    }

    fn channel_lock(&self, channel_id: &str) -> Arc<AsyncRwLock<()>> {
        let mut locks = self
            .channel_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Locks nobody else holds a handle to can be recreated on demand
        locks.retain(|channel, lock| channel == channel_id || Arc::strong_count(lock) > 1);
        locks
            .entry(channel_id.to_string())
            .or_insert_with(|| Arc::new(AsyncRwLock::new(())))
            .clone()
    }

    // Publishes fresh results when someone is listening and the list allows live updates
    async fn publish_results(&self, list: &TierList) {
        if !list.allow_real_time_updates || self.hub.listener_count(&list.channel_id) == 0 {
            return;
        }

        match self.store.list_ballots(&list.id).await {
            Ok(ballots) => {
                let results = aggregate(list, &ballots);
                self.hub
                    .publish(&list.channel_id, TierEvent::ResultsUpdated { results });
            }
            Err(e) => warn!("Failed to load ballots for live update of {}: {}", list.id, e),
        }
    }
}

fn require_broadcaster_role(caller: &Caller) -> Result<()> {
    if !caller.is_broadcaster() {
        return Err(TierError::Forbidden("broadcaster access required".to_string()));
    }
    Ok(())
}

fn require_broadcaster(caller: &Caller, list: &TierList) -> Result<()> {
    require_broadcaster_role(caller)?;
    if caller.channel_id != list.channel_id {
        return Err(TierError::Forbidden(format!(
            "tier list {} does not belong to channel {}",
            list.id, caller.channel_id
        )));
    }
    Ok(())
}

fn clean_name(raw: &str, what: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(TierError::Validation(format!("{} is required", what)));
    }
    Ok(name.to_string())
}

fn clean_optional(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
