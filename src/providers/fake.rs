//! Deterministic, no-network test double. Grounded on the original deployment's
//! `FakeProvider`: a proper test double (not a mock) that implements the full
//! adapter contract, tracks invocation counts, and can be scripted with either a
//! fixed response or a queue of scripted responses consumed in order.

use super::{ChunkStream, ProviderAdapter};
use crate::error::GatewayError;
use crate::messages::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Choice, ChunkChoice,
    ChunkDelta, Message, Role, Usage,
};
use async_trait::async_trait;
use futures_util::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Clone)]
pub enum ScriptedResponse {
    Content(String),
    ToolCalls(Vec<crate::messages::ToolCall>),
    TruncatedThinking { reasoning: String },
    Error(String),
}

pub struct FakeAdapter {
    name: String,
    supported_models: Vec<String>,
    script: Mutex<Vec<ScriptedResponse>>,
    call_count: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(supported_models: Vec<String>) -> Self {
        FakeAdapter {
            name: "fake".to_string(),
            supported_models,
            script: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_script(supported_models: Vec<String>, script: Vec<ScriptedResponse>) -> Self {
        FakeAdapter {
            name: "fake".to_string(),
            supported_models,
            script: Mutex::new(script),
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn last_user_content(request: &ChatCompletionRequest) -> Option<&str> {
        request.messages.iter().rev().find(|m| m.role == Role::User).map(|m| m.content.as_str())
    }

    fn next_step(&self) -> Option<ScriptedResponse> {
        let mut script = self.script.lock().expect("fake adapter script lock poisoned");
        if script.is_empty() {
            None
        } else {
            Some(script.remove(0))
        }
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, GatewayError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let id = format!("chatcmpl-fake-{}", uuid::Uuid::new_v4().simple());
        let created = chrono::Utc::now().timestamp();

        let (message, finish_reason) = match self.next_step() {
            Some(ScriptedResponse::Error(msg)) => return Err(GatewayError::Provider(msg)),
            Some(ScriptedResponse::Content(content)) => (Message::assistant(content), "stop".to_string()),
            Some(ScriptedResponse::ToolCalls(tool_calls)) => {
                (Message::assistant_with_tool_calls("", tool_calls), "tool_calls".to_string())
            }
            Some(ScriptedResponse::TruncatedThinking { reasoning }) => {
                (Message::assistant(reasoning), "length".to_string())
            }
            None => {
                let echoed = Self::last_user_content(request).unwrap_or("");
                let truncated: String = echoed.chars().take(50).collect();
                (Message::assistant(format!("Fake response for testing: {truncated}")), "stop".to_string())
            }
        };

        let prompt_tokens: u32 = request
            .messages
            .iter()
            .map(|m| (m.content.split_whitespace().count() as u32) * 2)
            .sum();
        let completion_tokens = (message.content.split_whitespace().count() as u32) * 2;

        Ok(ChatCompletionResponse {
            id,
            object: "chat.completion".to_string(),
            created,
            model: request.model.clone(),
            choices: vec![Choice { index: 0, message, finish_reason: Some(finish_reason) }],
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    async fn stream(&self, request: &ChatCompletionRequest) -> Result<ChunkStream, GatewayError> {
        let response = self.complete(request).await?;
        let id = response.id.clone();
        let message = response.first_message().cloned().unwrap_or_else(|| Message::assistant(""));
        let finish_reason = response.first_finish_reason().map(str::to_string);

        let mut chunks = vec![ChatCompletionChunk {
            id: id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: response.created,
            model: response.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta { role: Some(Role::Assistant), content: None, tool_calls: vec![] },
                finish_reason: None,
            }],
            usage: None,
        }];

        for (i, word) in message.content.split(' ').filter(|w| !w.is_empty()).enumerate() {
            let piece = if i == 0 { word.to_string() } else { format!(" {word}") };
            chunks.push(ChatCompletionChunk {
                id: id.clone(),
                object: "chat.completion.chunk".to_string(),
                created: response.created,
                model: response.model.clone(),
                choices: vec![ChunkChoice {
                    index: 0,
                    delta: ChunkDelta { role: None, content: Some(piece), tool_calls: vec![] },
                    finish_reason: None,
                }],
                usage: None,
            });
        }

        chunks.push(ChatCompletionChunk {
            id,
            object: "chat.completion.chunk".to_string(),
            created: response.created,
            model: response.model,
            choices: vec![ChunkChoice { index: 0, delta: ChunkDelta::default(), finish_reason }],
            usage: None,
        });

        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    fn get_supported_models(&self) -> Vec<String> {
        self.supported_models.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn req(model: &str, content: &str, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user(content)],
            temperature: None,
            max_tokens: None,
            top_p: None,
            n: None,
            stream,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            tools: None,
            tool_choice: None,
            user: None,
            seed: None,
            session_id: None,
        }
    }

    #[tokio::test]
    async fn streaming_terminator_matches_scenario_b() {
        let adapter = FakeAdapter::with_script(
            vec!["fake-model".into()],
            vec![ScriptedResponse::Content("hello world".into())],
        );
        let mut s = adapter.stream(&req("fake-model", "hi", true)).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(c) = s.next().await {
            chunks.push(c.unwrap());
        }
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].choices[0].delta.role, Some(Role::Assistant));
        assert_eq!(chunks[1].choices[0].delta.content.as_deref(), Some("hello"));
        assert_eq!(chunks[2].choices[0].delta.content.as_deref(), Some(" world"));
        assert_eq!(chunks[3].choices[0].finish_reason.as_deref(), Some("stop"));
        let id = chunks[0].id.clone();
        assert!(chunks.iter().all(|c| c.id == id));
    }

    #[tokio::test]
    async fn tracks_invocation_count() {
        let adapter = FakeAdapter::new(vec!["fake-model".into()]);
        adapter.complete(&req("fake-model", "hi", false)).await.unwrap();
        adapter.complete(&req("fake-model", "hi", false)).await.unwrap();
        assert_eq!(adapter.call_count(), 2);
    }
}
