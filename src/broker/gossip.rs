use crate::frame::{write_frame, Frame};
use crate::identity::PeerId;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort single gossip send: open a connection, send one frame,
/// close. Failures are swallowed — gossip is eventual, not guaranteed.
pub async fn send_gossip(peer: &PeerId, topic: &str, message: &str, lamport_timestamp: u64) {
    let frame = Frame::Gossip {
        topic: topic.to_string(),
        message: message.to_string(),
        lamport_timestamp,
    };
    if let Err(err) = send_best_effort(peer, &frame).await {
        log::debug!("[gossip] peer {peer} unreachable: {err}");
    }
}

async fn send_best_effort(peer: &PeerId, frame: &Frame) -> anyhow::Result<()> {
    let addr = format!("{}:{}", peer.host, peer.port);
    let mut stream = timeout(PEER_TIMEOUT, TcpStream::connect(&addr)).await??;
    write_frame(&mut stream, frame).await?;
    Ok(())
}

/// Fan out a gossip frame to every peer concurrently.
pub async fn gossip_to_all(peers: &[PeerId], topic: &str, message: &str, lamport_timestamp: u64) {
    let sends = peers
        .iter()
        .map(|peer| send_gossip(peer, topic, message, lamport_timestamp));
    futures_util::future::join_all(sends).await;
}
