use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

use crate::voting::AggregateResults;

/// Notification pushed to everyone watching a channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TierEvent {
    ResultsUpdated { results: AggregateResults },
    TierListActivated { tier_list_id: String },
    TierListCompleted { tier_list_id: String },
    ItemsChanged { tier_list_id: String },
    VotesReset { tier_list_id: String },
}

/// Channel-keyed multicast groups.
///
/// Joining subscribes to a channel's group; dropping the receiver leaves it. Groups with no
/// receivers left are pruned on the next publish or listener count.
pub struct ChannelHub {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<TierEvent>>>,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn join(&self, channel_id: &str) -> broadcast::Receiver<TierEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        channels
            .entry(channel_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Live receivers on the channel. A group whose receivers are all gone is dropped here.
    pub fn listener_count(&self, channel_id: &str) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = channels
            .get(channel_id)
            .map_or(0, |sender| sender.receiver_count());
        if count == 0 {
            channels.remove(channel_id);
        }
        count
    }

    /// Sends `event` to the channel's listeners and returns how many received it.
    pub fn publish(&self, channel_id: &str, event: TierEvent) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = channels.get(channel_id) else {
            return 0;
        };

        match sender.send(event) {
            Ok(delivered) => {
                debug!("Broadcast to {} listener(s) on channel {}", delivered, channel_id);
                delivered
            }
            Err(_) => {
                // Every receiver is gone
                channels.remove(channel_id);
                0
            }
        }
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new(64)
    }
}
