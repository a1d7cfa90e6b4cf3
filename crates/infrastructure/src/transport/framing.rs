use std::time::Duration;

use domain::DomainError;
use domain::protocol::PROMPT;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Replies longer than this are not ESC/VP21 and are rejected
pub const MAX_FRAME_LEN: usize = 1024;

/// Accumulate reads until the `:` prompt arrives.
///
/// The whole frame must arrive within `timeout`; partial reads are stitched
/// together. Bytes after the prompt are discarded.
pub async fn read_frame<R>(reader: &mut R, timeout: Duration) -> Result<Vec<u8>, DomainError>
where
    R: AsyncRead + Unpin,
{
    let deadline = tokio::time::Instant::now() + timeout;
    let mut frame = Vec::with_capacity(64);
    let mut chunk = [0u8; 256];

    loop {
        let n = match tokio::time::timeout_at(deadline, reader.read(&mut chunk)).await {
            Err(_) => return Err(DomainError::IoTimeout(timeout.as_millis() as u64)),
            Ok(Err(e)) => return Err(DomainError::IoClosed(format!("Read error: {}", e))),
            Ok(Ok(0)) => {
                return Err(DomainError::IoClosed(
                    "Peer closed the connection before the prompt".to_string(),
                ));
            }
            Ok(Ok(n)) => n,
        };

        frame.extend_from_slice(&chunk[..n]);

        if let Some(pos) = frame.iter().position(|b| *b == PROMPT) {
            if pos + 1 < frame.len() {
                tracing::debug!(
                    discarded = frame.len() - pos - 1,
                    "Discarding bytes after prompt"
                );
            }
            frame.truncate(pos + 1);
            return Ok(frame);
        }

        if frame.len() > MAX_FRAME_LEN {
            return Err(DomainError::MalformedResponse(format!(
                "No prompt within {} bytes",
                MAX_FRAME_LEN
            )));
        }
    }
}

/// Write a whole request and flush it
pub async fn write_request<W>(writer: &mut W, request: &[u8]) -> Result<(), DomainError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(request)
        .await
        .map_err(|e| DomainError::IoClosed(format!("Write error: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| DomainError::IoClosed(format!("Flush error: {}", e)))?;
    Ok(())
}
