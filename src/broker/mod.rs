//! Broker core: shared state plus the listener, router, gossip, and
//! election tasks that operate on it.
//!
//! ```text
//!          +-----------+        publish/subscribe        +------------+
//! client ->| listener  |--------------------------------->| router    |
//!          +-----------+                                  +-----+-----+
//!                                                                |
//!                  +---------------------------+---------------+
//!                  v                            v               v
//!            topic store                subscriber reg.   gossip engine
//!           (sqlite-backed)              (local fan-out)  (peer fan-out)
//! ```
//! Election runs alongside as its own task, mutating the same
//! coordinator state the router reports against.

mod election;
mod gossip;
mod listener;
mod router;

use crate::clock::LamportClock;
use crate::identity::PeerId;
use crate::store::TopicStore;
use crate::subscribers::SubscriberRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub use listener::run_listener;

/// Coordinator/leader state, mutated only by the election engine. Both
/// fields live behind one lock so a reader never observes a coordinator
/// id paired with a stale `is_coordinator` flag.
#[derive(Debug, Default)]
pub struct CoordinatorState {
    inner: Mutex<(Option<PeerId>, bool)>,
}

impl CoordinatorState {
    pub fn set(&self, coordinator: PeerId, is_self: bool) {
        let mut inner = self.inner.lock().expect("coordinator mutex poisoned");
        *inner = (Some(coordinator), is_self);
    }

    pub fn current(&self) -> Option<PeerId> {
        self.inner.lock().expect("coordinator mutex poisoned").0.clone()
    }

    pub fn is_self(&self) -> bool {
        self.inner.lock().expect("coordinator mutex poisoned").1
    }
}

/// Shared state every connection handler, gossip attempt, and election
/// round operates on.
#[derive(Debug)]
pub struct BrokerState {
    pub self_id: PeerId,
    pub peers: Vec<PeerId>,
    pub clock: LamportClock,
    pub store: TopicStore,
    pub subscribers: SubscriberRegistry,
    pub coordinator: CoordinatorState,
    next_subscriber_id: AtomicU64,
}

impl BrokerState {
    pub fn new(self_id: PeerId, peers: Vec<PeerId>, store: TopicStore) -> Self {
        Self {
            self_id,
            peers,
            clock: LamportClock::new(),
            store,
            subscribers: SubscriberRegistry::new(),
            coordinator: CoordinatorState::default(),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    pub fn next_subscriber_id(&self) -> u64 {
        self.next_subscriber_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Peers strictly higher priority than this broker, per the bully rule.
    pub fn higher_priority_peers(&self) -> Vec<PeerId> {
        self.peers.iter().filter(|p| **p > self.self_id).cloned().collect()
    }
}

pub use election::initiate_election;
pub use router::dispatch;
