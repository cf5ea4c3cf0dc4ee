//! Length-prefixed frame codec over any `AsyncRead`/`AsyncWrite` stream.
//!
//! Each frame is: `[u32 big-endian length][postcard payload]`.

use std::io;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum allowed frame payload (16 MiB).
pub const MAX_FRAME: u32 = 16 * 1024 * 1024;

/// Encodes `msg` as a length-prefixed postcard frame and writes it to `w`.
///
/// The writer is not flushed; callers batching frames behind a
/// `BufWriter` flush once they are done.
pub async fn send<W>(w: &mut W, msg: &impl Serialize) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let payload =
        postcard::to_allocvec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "frame exceeds 16 MiB limit"))?;
    w.write_all(&len.to_be_bytes()).await?;
    w.write_all(&payload).await
}

/// Reads a length-prefixed postcard frame from `r` and decodes it.
///
/// A stream that ends cleanly before the length prefix yields
/// [`io::ErrorKind::UnexpectedEof`].
pub async fn recv<T, R>(r: &mut R) -> io::Result<T>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).await?;
    let len = u32::from_be_bytes(buf);
    if len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds 16 MiB limit",
        ));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).await?;
    postcard::from_bytes(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Serializes a typed request or response into a frame body.
pub fn to_body(value: &impl Serialize) -> postcard::Result<Vec<u8>> {
    postcard::to_allocvec(value)
}

/// Deserializes a frame body into a typed request or response.
pub fn from_body<T: DeserializeOwned>(body: &[u8]) -> postcard::Result<T> {
    postcard::from_bytes(body)
}
