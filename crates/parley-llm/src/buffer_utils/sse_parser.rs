use futures::StreamExt;
use reqwest::Response;

use super::buffering::CircularLineBuffer;
use crate::traits::EventStream;
use crate::{ProviderError, StreamEvent};

/// Strategy for turning SSE `data:` payloads into stream events
///
/// OpenAI-compatible and Anthropic streams share the framing but not the payloads.
pub trait SseLineParser: Send {
    /// Parse a data line into stream events
    fn parse_data_line(&self, data: &str) -> anyhow::Result<Vec<StreamEvent>>;

    /// Check if this line signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

/// Generic SSE stream parser
///
/// `event:` lines are ignored; every provider we speak to repeats the event
/// type inside the JSON payload.
pub fn parse_sse_stream<P: SseLineParser + 'static>(response: Response, parser: P) -> EventStream {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = CircularLineBuffer::with_capacity(4096);

        'outer: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(&bytes);

                    while let Some(line_result) = buffer.next_line() {
                        match line_result {
                            Ok(line) => {
                                let Some(data) = line.strip_prefix("data:") else {
                                    continue;
                                };
                                let data = data.trim_start();

                                if parser.is_done_marker(data) {
                                    yield Ok(StreamEvent::Done { finish_reason: None });
                                    break 'outer;
                                }

                                match parser.parse_data_line(data) {
                                    Ok(events) => {
                                        for event in events {
                                            yield Ok(event);
                                        }
                                    }
                                    Err(e) => yield Err(e),
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
                Err(e) => {
                    yield Err(anyhow::Error::from(ProviderError::Stream(e.to_string())));
                    break;
                }
            }
        }
    })
}
