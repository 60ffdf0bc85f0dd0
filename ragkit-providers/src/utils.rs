//! Utilities for streaming HTTP providers

use crate::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Byte buffer for streamed response bodies.
///
/// Network chunks may split UTF-8 characters and protocol frames. The buffer
/// accumulates bytes and only hands out complete frames: SSE messages
/// (terminated by a blank line) or NDJSON lines.
#[derive(Debug)]
pub struct StreamBuffer {
    buffer: BytesMut,
    max_capacity: usize,
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self {
            buffer: BytesMut::new(),
            max_capacity: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl StreamBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom capacity limit
    pub fn with_capacity_limit(max_capacity: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_capacity,
        }
    }

    /// Bytes currently held
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Add bytes to the buffer
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buffer.len() + bytes.len() > self.max_capacity {
            return Err(Error::StreamInterrupted(format!(
                "stream buffer exceeded max capacity of {} bytes",
                self.max_capacity
            )));
        }
        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Extract all complete SSE messages, without their trailing blank line.
    ///
    /// `\r\n` line endings are normalized to `\n`.
    pub fn extract_sse_messages(&mut self) -> Result<Vec<String>> {
        let mut messages = Vec::new();
        while let Some((pos, delimiter)) = self.find_sse_delimiter() {
            let frame = self.buffer.split_to(pos + delimiter);
            let text = decode(&frame[..pos])?;
            messages.push(text.replace("\r\n", "\n"));
        }
        Ok(messages)
    }

    /// Extract all complete, non-empty lines (NDJSON framing)
    pub fn extract_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let frame = self.buffer.split_to(pos + 1);
            let line = decode(&frame[..pos])?;
            let line = line.trim();
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        Ok(lines)
    }

    /// Take whatever is left once the body has ended
    pub fn take_remainder(&mut self) -> Result<Option<String>> {
        let rest = self.buffer.split();
        let text = decode(&rest)?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    fn find_sse_delimiter(&self) -> Option<(usize, usize)> {
        let bytes = self.buffer.as_ref();
        (0..bytes.len()).find_map(|i| {
            if bytes[i..].starts_with(b"\n\n") {
                Some((i, 2))
            } else if bytes[i..].starts_with(b"\r\n\r\n") {
                Some((i, 4))
            } else {
                None
            }
        })
    }
}

// Frames end on ASCII delimiters, which never occur inside a multi-byte
// sequence, so a complete frame is always valid UTF-8 if the body is.
fn decode(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::StreamInterrupted(format!("Invalid UTF-8 in stream: {}", e)))
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> Error {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Error::ProviderAuth(format!("{} rejected credentials ({}): {}", provider, status, body))
    } else {
        Error::ProviderApi(format!("{} API error {}: {}", provider, status, body))
    }
}
