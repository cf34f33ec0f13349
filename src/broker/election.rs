use super::BrokerState;
use crate::frame::{read_frame, write_frame, Frame};
use crate::identity::PeerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Run one round of the bully election: ping every higher-priority peer
/// and self-promote if none answer.
///
/// Invoked once at start-up and again whenever an election frame arrives
/// from a lower-priority peer.
pub async fn initiate_election(state: Arc<BrokerState>) {
    state.clock.tick();
    let higher = state.higher_priority_peers();
    log::info!(
        "[election] {} initiating election against {} higher-priority peer(s)",
        state.self_id,
        higher.len()
    );

    let attempts = higher.iter().map(|peer| {
        let state = Arc::clone(&state);
        let peer = peer.clone();
        async move { probe_peer(&state, &peer).await }
    });
    let results = futures_util::future::join_all(attempts).await;
    let any_response = results.into_iter().any(|ok| ok);

    if any_response {
        log::info!("[election] {} waiting for a coordinator", state.self_id);
    } else {
        announce_coordinator(&state).await;
    }
}

async fn probe_peer(state: &Arc<BrokerState>, peer: &PeerId) -> bool {
    let ts = state.clock.tick();
    match try_probe(state, peer, ts).await {
        Ok(ack) => ack,
        Err(err) => {
            log::debug!("[election] peer {peer} unreachable: {err}");
            false
        }
    }
}

async fn try_probe(state: &Arc<BrokerState>, peer: &PeerId, ts: u64) -> anyhow::Result<bool> {
    let addr = format!("{}:{}", peer.host, peer.port);
    let mut stream = timeout(PEER_TIMEOUT, TcpStream::connect(&addr)).await??;

    let frame = Frame::Election {
        sender: state.self_id.clone(),
        lamport_timestamp: ts,
    };
    write_frame(&mut stream, &frame).await?;

    let response = timeout(PEER_TIMEOUT, read_frame(&mut stream)).await??;
    Ok(matches!(response, Frame::ElectionAck { ack: true }))
}

/// Self-promote to coordinator and notify every peer.
pub async fn announce_coordinator(state: &Arc<BrokerState>) {
    log::info!("[election] {} is the new coordinator", state.self_id);
    state.coordinator.set(state.self_id.clone(), true);

    let sends = state.peers.iter().map(|peer| {
        let state = Arc::clone(state);
        let peer = peer.clone();
        async move {
            let ts = state.clock.tick();
            let frame = Frame::Coordinator {
                sender: state.self_id.clone(),
                lamport_timestamp: ts,
            };
            let addr = format!("{}:{}", peer.host, peer.port);
            if let Ok(Ok(mut stream)) = timeout(PEER_TIMEOUT, TcpStream::connect(&addr)).await {
                let _ = write_frame(&mut stream, &frame).await;
            }
        }
    });
    futures_util::future::join_all(sends).await;
}

/// Handle an inbound election frame: merge clock, ack, and defer to a new
/// election only if the sender is lower priority (classical bully rule).
pub async fn handle_election(
    state: &Arc<BrokerState>,
    sender: PeerId,
    lamport_timestamp: u64,
) -> Frame {
    state.clock.merge(lamport_timestamp);
    log::info!("[election] received election from {sender}");

    if sender < state.self_id {
        let state = Arc::clone(state);
        tokio::spawn(async move { initiate_election(state).await });
    }

    Frame::ElectionAck { ack: true }
}

/// Handle an inbound coordinator announcement.
pub fn handle_coordinator(state: &Arc<BrokerState>, sender: PeerId, lamport_timestamp: u64) {
    state.clock.merge(lamport_timestamp);
    let is_self = sender == state.self_id;
    log::info!("[election] new coordinator is {sender}");
    state.coordinator.set(sender, is_self);
}
