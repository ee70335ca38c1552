//! SSE encoding of engine stream events

use std::convert::Infallible;

use axum::response::sse::{Event, Sse};
use futures::stream::Stream;

use super::types::ChatStreamChunk;
use crate::engine::{StreamEvent, StreamHandle};

/// Wire sentinel closing every stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Create SSE stream for chat completions.
///
/// Dropping the returned body (client disconnect) closes the event
/// channel, which the engine sees before emitting its next chunk.
pub fn create_chat_stream(
    handle: StreamHandle,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let StreamHandle {
        model, mut events, ..
    } = handle;

    let stream = async_stream::stream! {
        let mut first = true;

        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Chunk(chunk) => {
                    let chunk = ChatStreamChunk::from_chunk(chunk, &model, first);
                    first = false;
                    let data = serde_json::to_string(&chunk).unwrap_or_default();
                    yield Ok(Event::default().data(data));
                }
                StreamEvent::Error(err) => {
                    let data = serde_json::to_string(&err.to_body()).unwrap_or_default();
                    yield Ok(Event::default().data(data));
                }
                StreamEvent::Done => {
                    yield Ok(Event::default().data(DONE_SENTINEL));
                    break;
                }
            }
        }
    };

    Sse::new(stream)
}
