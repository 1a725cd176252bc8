//! Length-prefixed frames: `[len: u32 LE][payload]`.
//!
//! Handshake and acknowledgement frames additionally start with a one-byte
//! status, see [`write_status`] and [`read_status`].

use std::future::Future;
use std::io;
use std::time::Duration;

use parley_shared::constants::MAX_FRAME_SIZE;
use parley_shared::error::ProtocolError;
use parley_shared::protocol::{STATUS_ERROR, STATUS_OK};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{NetError, Result};

/// Run an I/O future under an optional deadline. A peer hanging up mid-frame
/// surfaces as [`NetError::Closed`].
async fn bounded<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = io::Result<T>>,
) -> Result<T> {
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| NetError::Timeout(limit))?,
        None => fut.await,
    };
    result.map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => NetError::Closed,
        _ => NetError::Io(e),
    })
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
    timeout: Option<Duration>,
) -> Result<()> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        }
        .into());
    }

    let mut buf = Vec::with_capacity(4 + data.len());
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);

    bounded(timeout, async {
        writer.write_all(&buf).await?;
        writer.flush().await
    })
    .await
}

pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    bounded(timeout, reader.read_exact(&mut len_bytes)).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        }
        .into());
    }

    let mut data = vec![0u8; len];
    bounded(timeout, reader.read_exact(&mut data)).await?;
    Ok(data)
}

/// Write `[status] ‖ body` as one frame.
pub async fn write_status<W: AsyncWrite + Unpin>(
    writer: &mut W,
    status: u8,
    body: &[u8],
    timeout: Option<Duration>,
) -> Result<()> {
    let mut frame = Vec::with_capacity(1 + body.len());
    frame.push(status);
    frame.extend_from_slice(body);
    write_frame(writer, &frame, timeout).await
}

/// Read a status frame and return its body. Anything but `STATUS_OK` is
/// an error.
pub async fn read_status<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    let mut frame = read_frame(reader, timeout).await?;
    match frame.first() {
        Some(&STATUS_OK) => {
            frame.remove(0);
            Ok(frame)
        }
        Some(&status) => Err(ProtocolError::UnexpectedStatus(status).into()),
        None => Err(ProtocolError::Truncated { min: 1, got: 0 }.into()),
    }
}

/// Best-effort `[ERROR]` frame before abandoning a connection.
pub async fn send_error<W: AsyncWrite + Unpin>(writer: &mut W, timeout: Option<Duration>) {
    if let Err(e) = write_status(writer, STATUS_ERROR, &[], timeout).await {
        tracing::warn!(error = %e, "Failed to send error status");
    }
}
