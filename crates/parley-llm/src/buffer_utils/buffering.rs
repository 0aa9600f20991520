use anyhow::Result;
use std::collections::VecDeque;

/// Byte buffer that hands out complete SSE lines
///
/// Network chunks split lines (and multi-byte characters) arbitrarily, so
/// bytes are only decoded once a full line is present.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract next line (up to \n), trimmed
    ///
    /// Returns None if no complete line is available
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();

        match String::from_utf8(line_bytes) {
            Ok(line) => Some(Ok(line.trim().to_string())),
            Err(e) => Some(Err(crate::ProviderError::Decode(format!("invalid UTF-8 in stream: {}", e)).into())),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
