use std::sync::Arc;

use parley_persist::{DeltaPart, PersistenceClient, StreamDelta};

/// Accumulates streamed text and writes it to a stream as deltas
///
/// Cursors count characters, so `end - start` of a delta equals the number
/// of chars in its text. Deltas are contiguous and never overlap.
pub struct DeltaWriter {
    db: Arc<dyn PersistenceClient>,
    stream_id: String,
    flush_chars: usize,
    cursor: u64,
    pending: String,
    pending_chars: usize,
    text: String,
}

impl DeltaWriter {
    pub fn new(db: Arc<dyn PersistenceClient>, stream_id: impl Into<String>, flush_chars: usize) -> Self {
        Self {
            db,
            stream_id: stream_id.into(),
            flush_chars: flush_chars.max(1),
            cursor: 0,
            pending: String::new(),
            pending_chars: 0,
            text: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.pending.push_str(chunk);
        self.pending_chars += chunk.chars().count();
        self.text.push_str(chunk);
    }

    pub fn should_flush(&self) -> bool {
        self.pending_chars >= self.flush_chars
    }

    /// Write pending text as one delta; no-op when nothing is pending
    ///
    /// On a failed write the text stays pending and goes out with the next
    /// flush.
    pub async fn flush(&mut self) -> parley_persist::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let start = self.cursor;
        let end = start + self.pending_chars as u64;
        let delta = StreamDelta {
            stream_id: self.stream_id.clone(),
            start,
            end,
            parts: vec![DeltaPart::TextDelta {
                text: self.pending.clone(),
            }],
        };
        self.db.append_delta(delta).await?;
        self.pending.clear();
        self.pending_chars = 0;
        self.cursor = end;
        Ok(())
    }

    /// Nothing has been streamed yet
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Full text seen so far, flushed or not
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_persist::{MemoryPersistenceClient, StreamRecord};

    #[tokio::test]
    async fn test_deltas_are_contiguous_char_ranges() {
        let db = Arc::new(MemoryPersistenceClient::new());
        let stream = StreamRecord::new("a1", 1, "gpt-4o-mini");
        db.create_stream(stream.clone()).await.unwrap();

        let mut writer = DeltaWriter::new(db.clone(), &stream.stream_id, 4);
        writer.push("héllo");
        assert!(writer.should_flush());
        writer.flush().await.unwrap();
        writer.push(" wö");
        assert!(!writer.should_flush());
        writer.flush().await.unwrap();
        writer.flush().await.unwrap();

        let deltas = db.list_deltas(&stream.stream_id, 0).await.unwrap();
        let ranges: Vec<(u64, u64)> = deltas.iter().map(|d| (d.start, d.end)).collect();
        assert_eq!(ranges, vec![(0, 5), (5, 8)]);
        assert_eq!(writer.text(), "héllo wö");
    }

    #[tokio::test]
    async fn test_failed_flush_keeps_pending_text() {
        let db = Arc::new(MemoryPersistenceClient::new());
        let stream = StreamRecord::new("a1", 1, "gpt-4o-mini");

        // the stream does not exist yet, so the first write is rejected
        let mut writer = DeltaWriter::new(db.clone(), &stream.stream_id, 4);
        writer.push("abc");
        assert!(writer.flush().await.is_err());

        db.create_stream(stream.clone()).await.unwrap();
        writer.push("dé");
        writer.flush().await.unwrap();
        writer.push("f");
        writer.flush().await.unwrap();

        let deltas = db.list_deltas(&stream.stream_id, 0).await.unwrap();
        let ranges: Vec<(u64, u64)> = deltas.iter().map(|d| (d.start, d.end)).collect();
        assert_eq!(ranges, vec![(0, 5), (5, 6)]);
        assert_eq!(deltas[0].parts[0].text(), "abcdé");
    }
}
