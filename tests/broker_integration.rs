use meshbus::broker::{self, BrokerState};
use meshbus::frame::Frame;
use meshbus::identity::PeerId;
use meshbus::store::TopicStore;
use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

fn free_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn spawn_broker(port: u16, peers: Vec<PeerId>) -> Arc<BrokerState> {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("store.db");
    // leak the tempdir so the file survives for the broker's lifetime in this test process
    std::mem::forget(dir);

    let store = TopicStore::open(db_path.to_str().unwrap()).await.unwrap();
    let self_id = PeerId::new("127.0.0.1", port);
    let state = Arc::new(BrokerState::new(self_id, peers, store));

    let listener_state = Arc::clone(&state);
    tokio::spawn(async move {
        let _ = broker::run_listener(listener_state).await;
    });

    // give the listener a moment to bind before callers connect
    tokio::time::sleep(Duration::from_millis(50)).await;
    state
}

async fn send_json(stream: &mut TcpStream, frame: &Frame) {
    let bytes = serde_json::to_vec(frame).unwrap();
    stream.write_all(&bytes).await.unwrap();
}

async fn recv_json(stream: &mut TcpStream) -> Frame {
    let mut buf = vec![0u8; 64 * 1024];
    let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("timed out waiting for frame")
        .unwrap();
    serde_json::from_slice(&buf[..n]).unwrap()
}

/// Like `recv_json`, but returns `None` on a short timeout instead of
/// panicking — used to assert that no further fan-out happened.
async fn recv_json_within(stream: &mut TcpStream, duration: Duration) -> Option<Frame> {
    let mut buf = vec![0u8; 64 * 1024];
    let n = timeout(duration, stream.read(&mut buf)).await.ok()?.ok()?;
    serde_json::from_slice(&buf[..n]).ok()
}

#[tokio::test]
async fn single_broker_self_elects_with_no_peers() {
    let port = free_port();
    let state = spawn_broker(port, Vec::new()).await;

    broker::initiate_election(Arc::clone(&state)).await;

    assert!(state.coordinator.is_self());
    assert_eq!(state.coordinator.current(), Some(state.self_id.clone()));
}

#[tokio::test]
async fn publish_reaches_local_subscriber() {
    let port = free_port();
    let state = spawn_broker(port, Vec::new()).await;
    let addr = format!("127.0.0.1:{port}");

    let mut subscriber = TcpStream::connect(&addr).await.unwrap();
    send_json(
        &mut subscriber,
        &Frame::Subscribe {
            topic: "Stocks".into(),
            lamport_timestamp: 0,
        },
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut publisher = TcpStream::connect(&addr).await.unwrap();
    send_json(
        &mut publisher,
        &Frame::Publish {
            topic: "STOCKS".into(),
            message: "42".into(),
            lamport_timestamp: 1,
        },
    )
    .await;

    let update = recv_json(&mut subscriber).await;
    match update {
        Frame::Publish { topic, message, .. } => {
            assert_eq!(topic.to_lowercase(), "stocks");
            assert_eq!(message, "42");
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    assert_eq!(state.store.get("stocks"), Some("42".to_string()));
}

#[tokio::test]
async fn three_brokers_converge_on_highest_priority_coordinator() {
    let mut ports = [free_port(), free_port(), free_port()];
    ports.sort_unstable();
    let [port_a, port_b, port_c] = ports;

    let a_id = PeerId::new("127.0.0.1", port_a);
    let b_id = PeerId::new("127.0.0.1", port_b);
    let c_id = PeerId::new("127.0.0.1", port_c);

    let state_a = spawn_broker(port_a, vec![b_id.clone(), c_id.clone()]).await;
    let state_b = spawn_broker(port_b, vec![a_id.clone(), c_id.clone()]).await;
    let state_c = spawn_broker(port_c, vec![a_id.clone(), b_id.clone()]).await;

    tokio::spawn(broker::initiate_election(Arc::clone(&state_a)));
    tokio::spawn(broker::initiate_election(Arc::clone(&state_b)));
    tokio::spawn(broker::initiate_election(Arc::clone(&state_c)));

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(state_a.coordinator.current(), Some(c_id.clone()));
    assert_eq!(state_b.coordinator.current(), Some(c_id.clone()));
    assert!(state_c.coordinator.is_self());
}

#[tokio::test]
async fn publish_propagates_via_gossip_and_dedups_redelivery() {
    let port_a = free_port();
    let port_b = free_port();
    let b_id = PeerId::new("127.0.0.1", port_b);
    let a_id = PeerId::new("127.0.0.1", port_a);

    let state_a = spawn_broker(port_a, vec![b_id.clone()]).await;
    let state_b = spawn_broker(port_b, vec![a_id.clone()]).await;

    let addr_a = format!("127.0.0.1:{port_a}");
    let addr_b = format!("127.0.0.1:{port_b}");

    // subscribe on B before publishing to A, so gossip-driven fan-out on
    // B has somewhere to land.
    let mut subscriber_b = TcpStream::connect(&addr_b).await.unwrap();
    send_json(
        &mut subscriber_b,
        &Frame::Subscribe {
            topic: "stocks".into(),
            lamport_timestamp: 0,
        },
    )
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut publisher = TcpStream::connect(&addr_a).await.unwrap();
    send_json(
        &mut publisher,
        &Frame::Publish {
            topic: "stocks".into(),
            message: "99".into(),
            lamport_timestamp: 1,
        },
    )
    .await;

    // the update reaches B's subscriber over real TCP gossip, not a
    // local-only fan-out.
    let update = recv_json(&mut subscriber_b).await;
    match update {
        Frame::Publish { topic, message, .. } => {
            assert_eq!(topic, "stocks");
            assert_eq!(message, "99");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
    assert_eq!(state_b.store.get("stocks"), Some("99".to_string()));
    assert_eq!(state_a.store.get("stocks"), Some("99".to_string()));

    // redeliver the same gossip payload directly to B: already-seen, so
    // no further subscriber fan-out should occur.
    let mut redelivered = TcpStream::connect(&addr_b).await.unwrap();
    send_json(
        &mut redelivered,
        &Frame::Gossip {
            topic: "stocks".into(),
            message: "99".into(),
            lamport_timestamp: state_b.clock.current(),
        },
    )
    .await;

    let extra = recv_json_within(&mut subscriber_b, Duration::from_millis(300)).await;
    assert!(extra.is_none(), "dedup should suppress re-fan-out of an already-seen payload, got {extra:?}");
}
