//! Anthropic-shape adapter: `function.parameters` → `input_schema` on request,
//! `tool_use` content blocks → synthesized `tool_calls[]` on response, `role=tool`
//! follow-ups re-encoded as `role=user` with `tool_result` content blocks.

use super::common::{get_or_create_client, is_retryable_status, retry_with_backoff, RetryOutcome};
use super::{ChunkStream, ProviderAdapter};
use crate::error::GatewayError;
use crate::messages::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Choice, ChunkChoice,
    ChunkDelta, Message, Role, ToolCall, ToolCallFunction, Usage,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

pub struct AnthropicAdapter {
    name: String,
    base_url: String,
    api_key: String,
    supported_models: Vec<String>,
    max_retries: u32,
}

impl AnthropicAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        supported_models: Vec<String>,
        max_retries: u32,
    ) -> Self {
        AnthropicAdapter {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            supported_models,
            max_retries,
        }
    }

    /// Splits off the system message (Anthropic carries it as a top-level field) and
    /// converts the remaining history, re-encoding `role=tool` as `role=user` with a
    /// `tool_result` content block per §4.2.
    fn build_payload(&self, request: &ChatCompletionRequest) -> Value {
        let mut system = String::new();
        let mut messages = Vec::new();

        for message in &request.messages {
            match message.role {
                Role::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(&message.content);
                }
                Role::Tool => {
                    messages.push(json!({
                        "role": "user",
                        "content": [{
                            "type": "tool_result",
                            "tool_use_id": message.tool_call_id,
                            "content": message.content,
                        }],
                    }));
                }
                Role::Assistant if !message.tool_calls.is_empty() => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(json!({ "type": "text", "text": message.content }));
                    }
                    for tc in &message.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.function.name,
                            "input": tc.parsed_arguments(),
                        }));
                    }
                    messages.push(json!({ "role": "assistant", "content": blocks }));
                }
                Role::Assistant => messages.push(json!({ "role": "assistant", "content": message.content })),
                Role::User => messages.push(json!({ "role": "user", "content": message.content })),
            }
        }

        let mut payload = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });
        let obj = payload.as_object_mut().unwrap();
        if !system.is_empty() {
            obj.insert("system".into(), json!(system));
        }
        if let Some(t) = request.temperature {
            obj.insert("temperature".into(), json!(t));
        }
        if let Some(tools) = &request.tools {
            obj.insert(
                "tools".into(),
                json!(tools
                    .iter()
                    .map(|t| json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters,
                    }))
                    .collect::<Vec<_>>()),
            );
        }
        payload
    }

    /// Synthesizes `tool_calls[]` from `tool_use` content blocks, matching §4.2.
    fn parse_message(raw: &Value) -> (Message, Option<String>) {
        let blocks = raw.get("content").and_then(Value::as_array).cloned().unwrap_or_default();
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in &blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        content.push_str(text);
                    }
                }
                Some("tool_use") => {
                    let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                    let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                    let arguments = block.get("input").cloned().unwrap_or(Value::Object(Default::default()));
                    tool_calls.push(ToolCall {
                        id: if id.is_empty() { format!("toolu_{}", Uuid::new_v4()) } else { id },
                        call_type: "function".to_string(),
                        function: ToolCallFunction { name, arguments: arguments.to_string() },
                    });
                }
                _ => {}
            }
        }

        let stop_reason = raw.get("stop_reason").and_then(Value::as_str).map(|r| match r {
            "tool_use" => "tool_calls".to_string(),
            "max_tokens" => "length".to_string(),
            _ => "stop".to_string(),
        });

        (Message { role: Role::Assistant, content, tool_calls, tool_call_id: None }, stop_reason)
    }
}

fn content_chunk(message_id: &str, model: &str, text: &str) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: message_id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta { role: None, content: Some(text.to_string()), tool_calls: vec![] },
            finish_reason: None,
        }],
        usage: None,
    }
}

fn tool_call_chunk(message_id: &str, model: &str, id: String, name: String, arguments: String) -> ChatCompletionChunk {
    let tool_call = ToolCall { id, call_type: "function".to_string(), function: ToolCallFunction { name, arguments } };
    ChatCompletionChunk {
        id: message_id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta { role: None, content: None, tool_calls: vec![tool_call] },
            finish_reason: None,
        }],
        usage: None,
    }
}

fn terminal_chunk(message_id: &str, model: &str, finish_reason: Option<String>) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: message_id.to_string(),
        object: "chat.completion.chunk".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: model.to_string(),
        choices: vec![ChunkChoice { index: 0, delta: ChunkDelta::default(), finish_reason }],
        usage: None,
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, GatewayError> {
        let client = get_or_create_client(&self.base_url);
        let url = format!("{}/messages", self.base_url);
        let payload = self.build_payload(request);

        let body = retry_with_backoff(self.max_retries, |_attempt| {
            let client = client.clone();
            let url = url.clone();
            let payload = payload.clone();
            async move {
                let resp = client
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| RetryOutcome::Retryable(GatewayError::Provider(e.to_string())))?;
                let status = resp.status();
                if status == 401 || status == 403 {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(RetryOutcome::Terminal(GatewayError::Authentication(text)));
                }
                if is_retryable_status(status.as_u16()) {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(RetryOutcome::Retryable(GatewayError::Provider(format!(
                        "status {status}: {text}"
                    ))));
                }
                if !status.is_success() {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(RetryOutcome::Terminal(GatewayError::Provider(format!(
                        "status {status}: {text}"
                    ))));
                }
                resp.json::<Value>()
                    .await
                    .map_err(|e| RetryOutcome::Terminal(GatewayError::Provider(e.to_string())))
            }
        })
        .await?;

        let (message, finish_reason) = Self::parse_message(&body);
        let usage = body.get("usage").map(|u| Usage {
            prompt_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            completion_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
            total_tokens: (u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0)
                + u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0)) as u32,
        });

        Ok(ChatCompletionResponse {
            id: body.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: request.model.clone(),
            choices: vec![Choice { index: 0, message, finish_reason }],
            usage,
        })
    }

    /// Issues the request with `stream: true` and decodes Anthropic's SSE event
    /// sequence (`content_block_delta`, `message_delta`, …) incrementally, so
    /// dropping the returned stream aborts the in-flight upstream request.
    async fn stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, GatewayError> {
        let client = get_or_create_client(&self.base_url);
        let url = format!("{}/messages", self.base_url);
        let mut payload = self.build_payload(request);
        payload["stream"] = json!(true);

        let response = client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Provider(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Authentication(text));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider(format!("status {status}: {text}")));
        }

        let fallback_model = request.model.clone();
        let event_stream = response.bytes_stream().eventsource();

        let chunks = async_stream::stream! {
            futures_util::pin_mut!(event_stream);
            let mut message_id = String::new();
            let mut tool_blocks: HashMap<u64, (String, String, String)> = HashMap::new();

            while let Some(event_result) = event_stream.next().await {
                let event = match event_result {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(GatewayError::Provider(format!("stream error: {e}")));
                        break;
                    }
                };
                let raw: Value = match serde_json::from_str(&event.data) {
                    Ok(v) => v,
                    Err(_) => continue,
                };

                match raw.get("type").and_then(Value::as_str) {
                    Some("message_start") => {
                        message_id = raw.pointer("/message/id").and_then(Value::as_str).unwrap_or_default().to_string();
                    }
                    Some("content_block_start") => {
                        let index = raw.get("index").and_then(Value::as_u64).unwrap_or(0);
                        if let Some(block) = raw.get("content_block") {
                            if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                                let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                                tool_blocks.insert(index, (id, name, String::new()));
                            }
                        }
                    }
                    Some("content_block_delta") => {
                        let Some(delta) = raw.get("delta") else { continue };
                        match delta.get("type").and_then(Value::as_str) {
                            Some("text_delta") => {
                                if let Some(text) = delta.get("text").and_then(Value::as_str) {
                                    yield Ok(content_chunk(&message_id, &fallback_model, text));
                                }
                            }
                            Some("input_json_delta") => {
                                let index = raw.get("index").and_then(Value::as_u64).unwrap_or(0);
                                if let Some(entry) = tool_blocks.get_mut(&index) {
                                    if let Some(partial) = delta.get("partial_json").and_then(Value::as_str) {
                                        entry.2.push_str(partial);
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                    Some("content_block_stop") => {
                        let index = raw.get("index").and_then(Value::as_u64).unwrap_or(0);
                        if let Some((id, name, arguments)) = tool_blocks.remove(&index) {
                            yield Ok(tool_call_chunk(&message_id, &fallback_model, id, name, arguments));
                        }
                    }
                    Some("message_delta") => {
                        let stop_reason = raw.pointer("/delta/stop_reason").and_then(Value::as_str).map(|r| match r {
                            "tool_use" => "tool_calls".to_string(),
                            "max_tokens" => "length".to_string(),
                            _ => "stop".to_string(),
                        });
                        yield Ok(terminal_chunk(&message_id, &fallback_model, stop_reason));
                    }
                    Some("error") => {
                        let msg = raw.pointer("/error/message").and_then(Value::as_str).unwrap_or("stream error").to_string();
                        yield Err(GatewayError::Provider(msg));
                        break;
                    }
                    _ => {}
                }
            }
        };

        Ok(Box::pin(chunks))
    }

    fn get_supported_models(&self) -> Vec<String> {
        self.supported_models.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_use_block_round_trips_to_tool_call() {
        let raw = json!({
            "id": "msg_1",
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "echo", "input": {"message": "ok"}}],
            "stop_reason": "tool_use",
        });
        let (message, finish_reason) = AnthropicAdapter::parse_message(&raw);
        assert_eq!(finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].function.name, "echo");
        assert_eq!(message.tool_calls[0].parsed_arguments().get("message").unwrap(), "ok");
    }
}
