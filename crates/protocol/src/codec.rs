//! Handshake framing: a big-endian `u32` payload length, then that many
//! bytes of JSON. The header is not counted in the length.

use serde::{Serialize, de::DeserializeOwned};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted payload. Handshake frames never approach this.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Payload length over [`MAX_FRAME_SIZE`], on either side.
    #[error("frame of {size} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    TooLarge { size: u32 },
    #[error("invalid frame payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The peer closed the stream before a frame header arrived.
    #[error("connection closed")]
    ConnectionClosed,
}

fn checked_len(size: usize) -> Result<u32, FrameError> {
    match u32::try_from(size) {
        Ok(len) if len <= MAX_FRAME_SIZE => Ok(len),
        Ok(len) => Err(FrameError::TooLarge { size: len }),
        Err(_) => Err(FrameError::TooLarge { size: u32::MAX }),
    }
}

/// Write one raw frame and flush.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = checked_len(payload.len())?;
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one raw frame. The length is checked before the payload buffer is
/// allocated.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(FrameError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    };
    checked_len(len as usize)?;

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Serialize `msg` and write it as one frame.
pub async fn write_message<W, T>(writer: &mut W, msg: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    write_frame(writer, &serde_json::to_vec(msg)?).await
}

/// Read one frame and deserialize it.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = read_frame(reader).await?;
    Ok(serde_json::from_slice(&payload)?)
}
