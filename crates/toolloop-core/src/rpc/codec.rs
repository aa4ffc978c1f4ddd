//! LSP-style `Content-Length` framing
//!
//! ```text
//! Content-Length: 52\r\n
//! \r\n
//! {"jsonrpc":"2.0","id":1,"method":"lifecycle/ping"}
//! ```

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{RpcError, RpcResult};

/// Upper bound on a single frame body
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Serialize a message into a complete frame
pub fn encode_frame<T: Serialize>(message: &T) -> RpcResult<Vec<u8>> {
    let content = serde_json::to_vec(message)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", content.len()).into_bytes();
    frame.extend_from_slice(&content);
    Ok(frame)
}

/// Write one framed message and flush
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> RpcResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one framed message
///
/// Returns `Ok(None)` when the peer closed the stream between frames.
pub async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> RpcResult<Option<Value>> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();
    let mut saw_header = false;

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if saw_header {
                return Err(RpcError::InvalidResponse("Connection closed mid-frame".to_string()));
            }
            return Ok(None);
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            if saw_header {
                break;
            }
            // Stray blank line between frames
            continue;
        }
        saw_header = true;

        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(
                len_str
                    .trim()
                    .parse()
                    .map_err(|_| RpcError::InvalidResponse("Invalid Content-Length".to_string()))?,
            );
        }
    }

    let length = content_length
        .ok_or_else(|| RpcError::InvalidResponse("Missing Content-Length header".to_string()))?;
    if length > MAX_FRAME_LEN {
        return Err(RpcError::InvalidResponse(format!("Frame of {} bytes exceeds limit", length)));
    }

    let mut content = vec![0u8; length];
    reader.read_exact(&mut content).await?;

    Ok(Some(serde_json::from_slice(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[test]
    fn test_encode_frame() {
        let frame = encode_frame(&json!({"ok": true})).unwrap();
        assert_eq!(frame, b"Content-Length: 11\r\n\r\n{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_read_consecutive_frames() {
        let mut bytes = encode_frame(&json!({"id": 1})).unwrap();
        bytes.extend(b"Content-Type: application/json\r\n");
        bytes.extend(encode_frame(&json!({"id": 2})).unwrap());

        let mut reader = BufReader::new(&bytes[..]);
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(json!({"id": 1})));
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(json!({"id": 2})));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let mut reader = BufReader::new(&b"X-Other: 1\r\n\r\n{}"[..]);
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(RpcError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let mut reader = BufReader::new(&b"Content-Length: 40\r\n\r\n{\"id\":"[..]);
        assert!(matches!(read_frame(&mut reader).await, Err(RpcError::Io(_))));
    }

    #[tokio::test]
    async fn test_write_frame_round_trip() {
        let (mut client, server) = tokio::io::duplex(1024);
        write_frame(&mut client, &json!({"method": "lifecycle/ping"})).await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        assert_eq!(
            read_frame(&mut reader).await.unwrap(),
            Some(json!({"method": "lifecycle/ping"}))
        );
    }
}
