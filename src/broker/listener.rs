use super::{dispatch, BrokerState};
use crate::frame::{Frame, FrameError};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::unbounded_channel;

/// Bind `0.0.0.0:{state.self_id.port}` and serve connections until the
/// listener fails. Each connection runs on its own spawned task and a
/// failure there never affects another connection.
pub async fn run_listener(state: Arc<BrokerState>) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", state.self_id.port);
    let listener = TcpListener::bind(&addr).await?;
    log::info!("[listener] broker {} listening on {addr}", state.self_id);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = Arc::clone(&state);
        let conn_id = state.next_subscriber_id();
        tokio::spawn(async move {
            log::debug!("[listener] accepted connection {conn_id} from {peer_addr}");
            if let Err(err) = handle_connection(state, conn_id, stream).await {
                log::debug!("[listener] connection {conn_id} closed: {err}");
            }
        });
    }
}

async fn handle_connection(
    state: Arc<BrokerState>,
    conn_id: u64,
    mut stream: TcpStream,
) -> Result<(), FrameError> {
    let (frame_tx, mut frame_rx) = unbounded_channel::<Frame>();

    let (mut read_half, mut write_half) = stream.split();

    let write_task = async {
        while let Some(frame) = frame_rx.recv().await {
            let bytes = match serde_json::to_vec(&frame) {
                Ok(bytes) => bytes,
                Err(err) => {
                    log::warn!("[listener] failed to encode outbound frame: {err}");
                    continue;
                }
            };
            if write_half.write_all(&bytes).await.is_err() {
                break;
            }
        }
    };

    let read_task = async {
        loop {
            let mut buf = vec![0u8; crate::frame::MAX_FRAME_SIZE];
            let n = match read_half.read(&mut buf).await {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(err) => return Err(FrameError::Io(err)),
            };
            let frame: Frame = match serde_json::from_slice(&buf[..n]) {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!("[listener] malformed frame on connection {conn_id}: {err}");
                    return Err(FrameError::Malformed(err));
                }
            };
            dispatch(Arc::clone(&state), frame, conn_id, frame_tx.clone()).await;
        }
    };

    tokio::select! {
        result = read_task => {
            state.subscribers.remove(conn_id);
            result
        }
        () = write_task => {
            state.subscribers.remove(conn_id);
            Ok(())
        }
    }
}
