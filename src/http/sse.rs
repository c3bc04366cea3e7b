//! Server-Sent Events encoding for streamed chat completions (§6).

use crate::error::GatewayError;
use crate::messages::ChatCompletionChunk;
use crate::providers::ChunkStream;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;
use std::convert::Infallible;

pub fn sse_response(
    chunks: ChunkStream,
) -> Sse<impl futures_util::Stream<Item = Result<Event, Infallible>>> {
    let events = chunks.map(|item| {
        let event = match item {
            Ok(chunk) => encode_chunk(&chunk),
            Err(err) => encode_error(&err),
        };
        Ok(event)
    });
    let terminated = events.chain(futures_util::stream::once(async { Ok(Event::default().data("[DONE]")) }));
    Sse::new(terminated).keep_alive(KeepAlive::default())
}

fn encode_chunk(chunk: &ChatCompletionChunk) -> Event {
    Event::default().json_data(chunk).unwrap_or_else(|_| Event::default().data("{}"))
}

fn encode_error(err: &GatewayError) -> Event {
    Event::default().event("error").data(err.to_string())
}
