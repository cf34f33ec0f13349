use crate::identity::PeerId;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Bound on a single read: the codec is length-less, so one `read` must
/// produce one complete JSON object.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// A single wire frame. Every variant round-trips through `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Publish {
        topic: String,
        message: String,
        lamport_timestamp: u64,
    },
    Subscribe {
        topic: String,
        lamport_timestamp: u64,
    },
    Gossip {
        topic: String,
        message: String,
        lamport_timestamp: u64,
    },
    Election {
        sender: PeerId,
        lamport_timestamp: u64,
    },
    ElectionAck {
        ack: bool,
    },
    Coordinator {
        sender: PeerId,
        lamport_timestamp: u64,
    },
}

/// Error reading or decoding a frame off the wire.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("connection closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Read exactly one frame from a single bounded TCP receive. Does not
/// buffer partial reads across calls — each protocol message is expected
/// to arrive in one `read`.
pub async fn read_frame(stream: &mut TcpStream) -> Result<Frame, FrameError> {
    let mut buf = vec![0u8; MAX_FRAME_SIZE];
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Err(FrameError::Closed);
    }
    let frame = serde_json::from_slice(&buf[..n])?;
    Ok(frame)
}

/// Serialize and write one frame in a single write call.
pub async fn write_frame(stream: &mut TcpStream, frame: &Frame) -> Result<(), FrameError> {
    let bytes = serde_json::to_vec(frame)?;
    stream.write_all(&bytes).await?;
    Ok(())
}
