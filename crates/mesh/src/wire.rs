//! Frame I/O over TCP.
//!
//! Every frame travels on its own short-lived connection: the sender
//! connects, writes one JSON-encoded [`TransportFrame`] and closes its write
//! side. The receiver reads until end of stream and decodes the frame.

use crate::error::{MeshError, MeshResult};
use crate::frame::TransportFrame;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Upper bound on the bytes accepted for a single inbound frame.
pub const MAX_FRAME_BYTES: u64 = 64 * 1024;

/// Deliver one frame to `addr`.
pub async fn send_frame(addr: &str, frame: &TransportFrame) -> MeshResult<()> {
    let encoded = serde_json::to_vec(frame)?;
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(&encoded).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Read one frame from `reader`, consuming it to end of stream.
pub async fn read_frame<R>(reader: R) -> MeshResult<TransportFrame>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(MAX_FRAME_BYTES + 1);
    limited.read_to_end(&mut buf).await?;
    if buf.len() as u64 > MAX_FRAME_BYTES {
        return Err(MeshError::InvalidFrame(format!(
            "frame exceeds {} bytes",
            MAX_FRAME_BYTES
        )));
    }
    Ok(serde_json::from_slice(&buf)?)
}
