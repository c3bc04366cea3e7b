//! OpenAI-shape adapter: passthrough `tools[*].function.parameters`, `tool_calls[]`
//! responses, `role=tool` follow-ups. Also backs the local-inference-service provider
//! (§3.1 of the expanded spec), which speaks the same envelope against a different
//! base URL.
//!
//! Wire serialization mirrors the inherited `send_with_native_tools` helper: messages
//! map 1:1 onto `{role, content}` except assistant messages carrying tool calls (which
//! go out with `content: null` and an OpenAI-shaped `tool_calls[]` array) and tool
//! messages (which carry `tool_call_id`).

use super::common::{get_or_create_client, is_retryable_status, retry_with_backoff, RetryOutcome};
use super::{ChunkStream, ProviderAdapter};
use crate::error::GatewayError;
use crate::messages::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Choice, ChunkChoice,
    ChunkDelta, Message, Role, ToolCall, Usage,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::{json, Value};

pub struct OpenAiAdapter {
    name: String,
    base_url: String,
    api_key: String,
    supported_models: Vec<String>,
    max_retries: u32,
}

impl OpenAiAdapter {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        supported_models: Vec<String>,
        max_retries: u32,
    ) -> Self {
        OpenAiAdapter {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            supported_models,
            max_retries,
        }
    }

    fn to_wire_message(message: &Message) -> Value {
        match message.role {
            Role::Assistant if !message.tool_calls.is_empty() => json!({
                "role": "assistant",
                "content": Value::Null,
                "tool_calls": message.tool_calls.iter().map(|tc| json!({
                    "id": tc.id,
                    "type": "function",
                    "function": { "name": tc.function.name, "arguments": tc.function.arguments },
                })).collect::<Vec<_>>(),
            }),
            Role::Tool => json!({
                "role": "tool",
                "tool_call_id": message.tool_call_id,
                "content": message.content,
            }),
            role => json!({ "role": role_str(role), "content": message.content }),
        }
    }

    fn build_payload(&self, request: &ChatCompletionRequest, stream: bool) -> Value {
        let mut payload = json!({
            "model": request.model,
            "messages": request.messages.iter().map(Self::to_wire_message).collect::<Vec<_>>(),
            "stream": stream,
        });
        let obj = payload.as_object_mut().unwrap();
        if let Some(t) = request.temperature {
            obj.insert("temperature".into(), json!(t));
        }
        if let Some(mt) = request.max_tokens {
            obj.insert("max_tokens".into(), json!(mt));
        }
        if let Some(tp) = request.top_p {
            obj.insert("top_p".into(), json!(tp));
        }
        if let Some(stop) = &request.stop {
            obj.insert("stop".into(), json!(stop));
        }
        if let Some(tools) = &request.tools {
            obj.insert(
                "tools".into(),
                json!(tools
                    .iter()
                    .map(|t| json!({
                        "type": "function",
                        "function": { "name": t.name, "description": t.description, "parameters": t.parameters },
                    }))
                    .collect::<Vec<_>>()),
            );
        }
        payload
    }

    fn parse_message(raw: &Value) -> Message {
        let content = raw.get("content").and_then(Value::as_str).unwrap_or("").to_string();
        let tool_calls = raw
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        Some(ToolCall {
                            id: tc.get("id")?.as_str()?.to_string(),
                            call_type: "function".to_string(),
                            function: crate::messages::ToolCallFunction {
                                name: tc.get("function")?.get("name")?.as_str()?.to_string(),
                                arguments: tc.get("function")?.get("arguments")?.as_str()?.to_string(),
                            },
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Message { role: Role::Assistant, content, tool_calls, tool_call_id: None }
    }

    /// Parses one native OpenAI streaming delta object (`choices[0].delta`) into a
    /// [`ChatCompletionChunk`]. `fallback_model` covers chunks that omit `model`.
    fn parse_chunk(raw: &Value, fallback_model: &str) -> ChatCompletionChunk {
        let choice_raw = raw.get("choices").and_then(Value::as_array).and_then(|c| c.first());
        let delta_raw = choice_raw.and_then(|c| c.get("delta"));

        let role = delta_raw.and_then(|d| d.get("role")).and_then(Value::as_str).map(|r| match r {
            "system" => Role::System,
            "user" => Role::User,
            "tool" => Role::Tool,
            _ => Role::Assistant,
        });
        let content = delta_raw.and_then(|d| d.get("content")).and_then(Value::as_str).map(str::to_string);
        let tool_calls = delta_raw
            .and_then(|d| d.get("tool_calls"))
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .map(|tc| ToolCall {
                        id: tc.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                        call_type: "function".to_string(),
                        function: crate::messages::ToolCallFunction {
                            name: tc
                                .get("function")
                                .and_then(|f| f.get("name"))
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            arguments: tc
                                .get("function")
                                .and_then(|f| f.get("arguments"))
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default();
        let finish_reason = choice_raw.and_then(|c| c.get("finish_reason")).and_then(Value::as_str).map(str::to_string);
        let usage = raw
            .get("usage")
            .filter(|u| !u.is_null())
            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

        ChatCompletionChunk {
            id: raw.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            object: "chat.completion.chunk".to_string(),
            created: raw.get("created").and_then(Value::as_i64).unwrap_or(0),
            model: raw.get("model").and_then(Value::as_str).unwrap_or(fallback_model).to_string(),
            choices: vec![ChunkChoice { index: 0, delta: ChunkDelta { role, content, tool_calls }, finish_reason }],
            usage,
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, GatewayError> {
        let client = get_or_create_client(&self.base_url);
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.build_payload(request, false);

        let body = retry_with_backoff(self.max_retries, |_attempt| {
            let client = client.clone();
            let url = url.clone();
            let payload = payload.clone();
            async move {
                let resp = client
                    .post(&url)
                    .bearer_auth(&self.api_key)
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

        let choice_raw = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .ok_or_else(|| GatewayError::Provider("missing choices[0] in provider response".to_string()))?;
        let message = Self::parse_message(choice_raw.get("message").unwrap_or(&Value::Null));
        let finish_reason = choice_raw.get("finish_reason").and_then(Value::as_str).map(str::to_string);
        let usage = body.get("usage").and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

        Ok(ChatCompletionResponse {
            id: body.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
            object: "chat.completion".to_string(),
            created: body.get("created").and_then(Value::as_i64).unwrap_or(0),
            model: request.model.clone(),
            choices: vec![Choice { index: 0, message, finish_reason }],
            usage,
        })
    }

    /// Issues the request with `stream: true` and decodes the response body as it
    /// arrives, so dropping the returned stream aborts the in-flight upstream request
    /// instead of merely discarding an already-complete buffer.
    async fn stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, GatewayError> {
        let client = get_or_create_client(&self.base_url);
        let url = format!("{}/chat/completions", self.base_url);
        let payload = self.build_payload(request, true);

        let response = client
            .post(&url)
            .bearer_auth(&self.api_key)
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
            while let Some(event_result) = event_stream.next().await {
                let event = match event_result {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(GatewayError::Provider(format!("stream error: {e}")));
                        break;
                    }
                };
                if event.data == "[DONE]" {
                    break;
                }
                match serde_json::from_str::<Value>(&event.data) {
                    Ok(raw) => yield Ok(Self::parse_chunk(&raw, &fallback_model)),
                    Err(e) => {
                        yield Err(GatewayError::Provider(format!("malformed stream chunk: {e}")));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(chunks))
    }

    fn get_supported_models(&self) -> Vec<String> {
        self.supported_models.clone()
    }
}
