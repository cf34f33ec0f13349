use super::{election, gossip, BrokerState};
use crate::frame::Frame;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Classify one inbound frame and route it to its handler.
///
/// `conn_id` identifies the connection this frame arrived on (used to
/// register subscribers); `reply_tx` is that connection's outbound
/// channel (used for `election_ack` replies and subscriber fan-out).
pub async fn dispatch(
    state: Arc<BrokerState>,
    frame: Frame,
    conn_id: u64,
    reply_tx: UnboundedSender<Frame>,
) {
    match frame {
        Frame::Publish {
            topic,
            message,
            lamport_timestamp,
        } => handle_publish(&state, topic, message, lamport_timestamp).await,

        Frame::Subscribe {
            topic,
            lamport_timestamp: _,
        } => {
            state.clock.tick();
            state.subscribers.add(&topic, conn_id, reply_tx);
            log::info!("[router] subscriber added for topic {topic}");
        }

        Frame::Gossip {
            topic,
            message,
            lamport_timestamp,
        } => handle_gossip(&state, topic, message, lamport_timestamp).await,

        Frame::Election {
            sender,
            lamport_timestamp,
        } => {
            let ack = election::handle_election(&state, sender, lamport_timestamp).await;
            let _ = reply_tx.send(ack);
        }

        Frame::Coordinator {
            sender,
            lamport_timestamp,
        } => election::handle_coordinator(&state, sender, lamport_timestamp),

        Frame::ElectionAck { .. } => {
            log::warn!("[router] unexpected election_ack on a non-election connection, ignoring");
        }
    }
}

async fn handle_publish(state: &Arc<BrokerState>, topic: String, message: String, lamport_timestamp: u64) {
    let ts = state.clock.merge(lamport_timestamp);
    log::info!("[router] publish on {topic}, initiating gossip");

    if let Err(err) = state.store.put(&topic, &message).await {
        log::error!("[router] store write failed for {topic}: {err}");
    }
    state.subscribers.fan_out(&topic, &message, ts);

    gossip::gossip_to_all(&state.peers, &topic, &message, ts).await;
}

async fn handle_gossip(state: &Arc<BrokerState>, topic: String, message: String, lamport_timestamp: u64) {
    let already_seen = match state.store.seen(&topic, &message).await {
        Ok(seen) => seen,
        Err(err) => {
            log::error!("[router] store lookup failed for {topic}: {err}");
            false
        }
    };
    if already_seen {
        log::debug!("[router] gossip for {topic} already applied, dropping");
        return;
    }

    let ts = state.clock.merge(lamport_timestamp);
    log::info!("[router] new gossip for {topic}, forwarding");

    if let Err(err) = state.store.put(&topic, &message).await {
        log::error!("[router] store write failed for {topic}: {err}");
    }
    state.subscribers.fan_out(&topic, &message, ts);

    gossip::gossip_to_all(&state.peers, &topic, &message, ts).await;
}
