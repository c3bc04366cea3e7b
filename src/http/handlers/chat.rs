//! POST /v1/chat/completions (§6).

use crate::error::GatewayError;
use crate::http::sse::sse_response;
use crate::http::state::SharedState;
use crate::messages::{ChatCompletionRequest, Message};
use crate::providers::ChunkStream;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;

pub async fn chat_completions(
    State(state): State<SharedState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    if let Err(msg) = request.validate() {
        return GatewayError::Validation(msg).into_response();
    }

    if request.stream {
        return stream_completion(state, request).await;
    }

    match state.orchestrator.complete(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Streaming runs the same session-assembly and context-budget steps as the
/// non-streaming path before dispatching to the provider, then persists the
/// reconstructed final message once the stream completes — the tool-call loop is
/// the one stage genuinely specific to `complete`'s non-lazy contract, so it is the
/// only one skipped here.
async fn stream_completion(state: SharedState, request: ChatCompletionRequest) -> Response {
    let prepared = match state.orchestrator.prepare_stream(request).await {
        Ok(prepared) => prepared,
        Err(e) => return e.into_response(),
    };

    let upstream = match prepared.provider.stream(&prepared.working).await {
        Ok(chunks) => chunks,
        Err(e) => return e.into_response(),
    };

    let orchestrator = state.orchestrator.clone();
    let wrapped: ChunkStream = Box::pin(async_stream::stream! {
        futures_util::pin_mut!(upstream);
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        while let Some(item) = upstream.next().await {
            let is_err = item.is_err();
            if let Ok(chunk) = &item {
                if let Some(choice) = chunk.choices.first() {
                    if let Some(piece) = &choice.delta.content {
                        content.push_str(piece);
                    }
                    tool_calls.extend(choice.delta.tool_calls.iter().cloned());
                }
            }
            yield item;
            if is_err {
                return;
            }
        }

        let final_message = if tool_calls.is_empty() {
            Message::assistant(content)
        } else {
            Message::assistant_with_tool_calls(content, tool_calls)
        };
        if let Err(e) = orchestrator.persist_stream_completion(&prepared, final_message).await {
            log::warn!("failed to persist streamed completion: {e}");
        }
    });

    sse_response(wrapped).into_response()
}
