//! Framing: a 4-byte big-endian length followed by a JSON ping.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use votechain_messages::Ping;

use crate::NetworkError;

/// Maximum frame body size in bytes.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `Ok(None)` on a clean end of stream before a new frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let size = u32::from_be_bytes(len_buf) as usize;
    if size > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

pub async fn write_ping<W>(writer: &mut W, ping: &Ping) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    write_frame(writer, &ping.to_bytes()?).await
}

/// Read and parse one ping; a malformed frame is an error.
pub async fn read_ping<R>(reader: &mut R) -> Result<Option<Ping>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(bytes) => Ok(Some(Ping::from_slice(&bytes)?)),
        None => Ok(None),
    }
}
