//! Line framing shared by the registry and node protocols.
//!
//! Every request is one `\n`-terminated UTF-8 line. Replies are either one
//! line or, for peer lists, everything up to the peer closing the stream.
//! Reads accumulate chunks until the delimiter, bounded in size and in time;
//! when the time runs out, whatever arrived so far is handed back so the
//! caller can still try to parse it.

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::debug;

const CHUNK_SIZE: usize = 8192;

/// Bounds applied to every inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Largest accepted message, in bytes.
    pub max_frame_bytes: usize,
    /// Time allowed for the whole message to arrive.
    pub read_timeout: Duration,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: 64 * 1024 * 1024,
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Read one line, without its terminator.
///
/// Returns `Ok(None)` if the peer sent nothing before closing or timing out.
pub async fn read_line<R>(reader: &mut R, limits: &FrameLimits) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    read_message(reader, limits, true).await
}

/// Read until the peer closes its side of the stream.
pub async fn read_to_close<R>(reader: &mut R, limits: &FrameLimits) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    read_message(reader, limits, false).await
}

/// Write `line` followed by a newline and flush.
pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = Vec::with_capacity(line.len() + 1);
    frame.extend_from_slice(line.as_bytes());
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await
}

async fn read_message<R>(
    reader: &mut R,
    limits: &FrameLimits,
    stop_at_newline: bool,
) -> io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let deadline = Instant::now() + limits.read_timeout;
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match tokio::time::timeout_at(deadline, reader.read(&mut chunk)).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(received = buf.len(), "read timed out, keeping partial data");
                break;
            }
        };
        if n == 0 {
            break;
        }

        let received = &chunk[..n];
        if stop_at_newline {
            if let Some(pos) = received.iter().position(|b| *b == b'\n') {
                buf.extend_from_slice(&received[..pos]);
                check_size(buf.len(), limits)?;
                break;
            }
        }
        buf.extend_from_slice(received);
        check_size(buf.len(), limits)?;
    }

    if buf.is_empty() {
        return Ok(None);
    }

    let text = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(text.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

fn check_size(len: usize, limits: &FrameLimits) -> io::Result<()> {
    if len > limits.max_frame_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message exceeds {} bytes", limits.max_frame_bytes),
        ));
    }
    Ok(())
}
