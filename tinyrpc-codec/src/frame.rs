//! Framing: `[magic: u32 LE][length: u32 LE][payload]` over an async stream.
//!
//! Generic over any `AsyncRead`/`AsyncWrite` half, so the same functions
//! serve a plain TCP stream or an in-memory duplex in tests alike.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::{HEADER_LEN, MAGIC};
use crate::errors::CodecError;

/// Transport-level failure reading or writing a frame.
///
/// Distinct from [`CodecError`]: frame errors are never stored sticky on a
/// `Reader`/`Writer` and `std::io::Error` is not `Clone`, so this type isn't
/// either. Each call to [`read_frame`]/[`write_frame`] either succeeds or
/// fails on its own.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("frame payload of {declared} bytes exceeds the {limit}-byte ceiling")]
    TooLarge { declared: u32, limit: u32 },
}

/// Reads one complete frame's payload off `stream`.
///
/// Returns `Ok(None)` on a clean EOF at the very start of a header (the peer
/// closed the connection between messages). An EOF that lands mid-header or
/// mid-payload is a truncated frame, not a clean close, and is reported as
/// [`CodecError::FrameLengthMismatch`] rather than a bare I/O error.
/// `max_length` enforces the reply-size ceiling the client applies to server
/// responses; the server imposes no such ceiling on incoming requests, so it
/// passes `None`.
pub async fn read_frame<S: AsyncRead + Unpin>(
    stream: &mut S,
    max_length: Option<u32>,
) -> Result<Option<Vec<u8>>, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    match read_fill(stream, &mut header).await? {
        Filled::Full => {}
        Filled::Eof { filled: 0 } => return Ok(None),
        Filled::Eof { filled } => {
            return Err(CodecError::FrameLengthMismatch {
                declared: HEADER_LEN as u32,
                actual: filled,
            }
            .into())
        }
    }

    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if magic != MAGIC {
        return Err(CodecError::UnsupportedMessage(magic).into());
    }

    let length = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if let Some(limit) = max_length {
        if length > limit {
            return Err(FrameError::TooLarge {
                declared: length,
                limit,
            });
        }
    }

    let mut payload = vec![0u8; length as usize];
    if !payload.is_empty() {
        if let Filled::Eof { filled } = read_fill(stream, &mut payload).await? {
            return Err(CodecError::FrameLengthMismatch {
                declared: length,
                actual: filled,
            }
            .into());
        }
    }

    Ok(Some(payload))
}

enum Filled {
    Full,
    Eof { filled: usize },
}

/// Fills `buf` completely, or reports how many bytes arrived before EOF.
///
/// Unlike [`tokio::io::AsyncReadExt::read_exact`], this distinguishes a
/// clean EOF with zero bytes read from one that landed partway through —
/// the latter is a truncated frame, the former is a closed connection.
async fn read_fill<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
) -> Result<Filled, FrameError> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(Filled::Eof { filled });
        }
        filled += n;
    }
    Ok(Filled::Full)
}

/// Writes one complete frame (header + payload) to `stream`.
pub async fn write_frame<S: AsyncWrite + Unpin>(
    stream: &mut S,
    payload: &[u8],
) -> Result<(), FrameError> {
    let length = payload.len() as u32;
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    header[4..8].copy_from_slice(&length.to_le_bytes());

    stream.write_all(&header).await?;
    if !payload.is_empty() {
        stream.write_all(payload).await?;
    }
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_a_frame() {
        let (mut a, mut b) = duplex(1024);
        write_frame(&mut a, b"hello").await.unwrap();
        let payload = read_frame(&mut b, None).await.unwrap().unwrap();
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn empty_payload_round_trips() {
        let (mut a, mut b) = duplex(1024);
        write_frame(&mut a, b"").await.unwrap();
        let payload = read_frame(&mut b, None).await.unwrap().unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn eof_before_header_returns_none() {
        let (a, mut b) = duplex(1024);
        drop(a);
        let result = read_frame(&mut b, None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn bad_magic_is_rejected() {
        let (mut a, mut b) = duplex(1024);
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&0xdead_beefu32.to_le_bytes());
        a.write_all(&header).await.unwrap();
        let err = read_frame(&mut b, None).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::Codec(CodecError::UnsupportedMessage(0xdead_beef))
        ));
    }

    #[tokio::test]
    async fn oversized_reply_is_rejected_when_capped() {
        let (mut a, mut b) = duplex(8192);
        let payload = vec![0u8; 100];
        write_frame(&mut a, &payload).await.unwrap();
        let err = read_frame(&mut b, Some(10)).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::TooLarge {
                declared: 100,
                limit: 10
            }
        ));
    }

    #[tokio::test]
    async fn truncated_payload_is_a_frame_length_mismatch() {
        let (mut a, mut b) = duplex(1024);
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
        header[4..8].copy_from_slice(&10u32.to_le_bytes());
        a.write_all(&header).await.unwrap();
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        let err = read_frame(&mut b, None).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::Codec(CodecError::FrameLengthMismatch {
                declared: 10,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn truncated_header_is_a_frame_length_mismatch() {
        let (mut a, mut b) = duplex(1024);
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        let err = read_frame(&mut b, None).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::Codec(CodecError::FrameLengthMismatch {
                declared: 8,
                actual: 3
            })
        ));
    }
}
