use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::frame::Frame;

/// A single subscriber's outbound channel, keyed by an opaque connection id
/// so one dead send can be pruned from every topic it occupies.
#[derive(Debug, Clone)]
struct Subscriber {
    id: u64,
    tx: UnboundedSender<Frame>,
}

/// `topic -> subscribers`. Purely local to one broker: a subscriber is
/// only reachable through the broker it connected to.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    by_topic: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(topic: &str) -> String {
        topic.to_lowercase()
    }

    pub fn add(&self, topic: &str, id: u64, tx: UnboundedSender<Frame>) {
        let topic = Self::normalize(topic);
        let mut by_topic = self.by_topic.lock().expect("subscriber registry mutex poisoned");
        by_topic.entry(topic).or_default().push(Subscriber { id, tx });
    }

    /// Remove `id` from every topic it subscribed to, e.g. after its
    /// connection closes or a send to it fails.
    pub fn remove(&self, id: u64) {
        let mut by_topic = self.by_topic.lock().expect("subscriber registry mutex poisoned");
        for subs in by_topic.values_mut() {
            subs.retain(|s| s.id != id);
        }
    }

    /// Send a publish update to every subscriber of `topic`. Subscribers
    /// whose channel is closed are dropped from the registry entirely.
    pub fn fan_out(&self, topic: &str, message: &str, lamport_timestamp: u64) {
        let topic_key = Self::normalize(topic);
        let frame = Frame::Publish {
            topic: topic.to_string(),
            message: message.to_string(),
            lamport_timestamp,
        };

        let mut dead = Vec::new();
        {
            let by_topic = self.by_topic.lock().expect("subscriber registry mutex poisoned");
            if let Some(subs) = by_topic.get(&topic_key) {
                for sub in subs {
                    if sub.tx.send(frame.clone()).is_err() {
                        dead.push(sub.id);
                    }
                }
            }
        }
        for id in dead {
            self.remove(id);
        }
    }
}
