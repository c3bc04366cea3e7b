//! Chat Orchestrator (§4.3): the per-request pipeline that turns an incoming
//! `ChatCompletionRequest` into a `ChatCompletionResponse`, coordinating routing,
//! context-budget management, truncated-thinking recovery, the tool-call loop, and
//! session persistence. Generalizes the inherited session/orchestration layer's
//! single-pass `send_message` loop into these explicit, independently-testable
//! stages.

pub mod context_budget;
pub mod truncated_thinking;

use crate::downstream::CmsClient;
use crate::error::GatewayError;
use crate::messages::{ChatCompletionRequest, ChatCompletionResponse, Message};
use crate::observability::InfraStatus;
use crate::providers::ProviderAdapter;
use crate::router::ProviderRouter;
use crate::session::SessionManager;
use crate::tools::ToolExecutor;
use std::sync::Arc;

pub struct OrchestratorConfig {
    pub max_tool_iterations: u32,
    pub cms_proxy_mode: bool,
}

pub struct ChatOrchestrator {
    router: Arc<ProviderRouter>,
    sessions: Option<Arc<SessionManager>>,
    tool_executor: Arc<ToolExecutor>,
    cms: Option<Arc<CmsClient>>,
    infra_status: Arc<InfraStatus>,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    pub fn new(
        router: Arc<ProviderRouter>,
        sessions: Option<Arc<SessionManager>>,
        tool_executor: Arc<ToolExecutor>,
        cms: Option<Arc<CmsClient>>,
        infra_status: Arc<InfraStatus>,
        config: OrchestratorConfig,
    ) -> Self {
        ChatOrchestrator { router, sessions, tool_executor, cms, infra_status, config }
    }

    pub async fn complete(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse, GatewayError> {
        // Step 1: resolve alias, rebuild with canonical model name.
        let canonical_model = self.router.resolve_alias(&request.model);
        let mut working = request.clone();
        working.model = canonical_model.clone();

        // Step 2: select provider.
        let provider = self.router.get_provider(&canonical_model)?;

        // Step 3: assemble messages (session history ++ request messages).
        let original_first_new_message = working.messages.first().cloned();
        if let Some(session_id) = working.session_id.clone() {
            if let Some(sessions) = &self.sessions {
                let session = sessions.get(&session_id).await?;
                let mut assembled = session.messages.clone();
                assembled.extend(working.messages.drain(..));
                working.messages = assembled;
            } else {
                return Err(GatewayError::SessionStore("no session manager configured".to_string()));
            }
        }

        // Step 4-5: context-budget check and compression.
        let context_limit = self.router.context_window_for(&canonical_model);
        let estimated = context_budget::estimate_tokens(&working.messages);
        if context_budget::exceeds_budget(estimated, context_limit) {
            context_budget::compress(
                &mut working.messages,
                &canonical_model,
                context_limit,
                self.cms.as_deref(),
                self.config.cms_proxy_mode,
                &self.infra_status,
            )
            .await;
        }

        // Step 6: provider call.
        let mut response = provider.complete(&working).await?;

        // Step 7: truncated-thinking recovery, single retry.
        if truncated_thinking::is_truncated_thinking(&response) {
            truncated_thinking::recover(&mut working, &response);
            response = provider.complete(&working).await?;
        }

        // Step 8: tool-call loop.
        let mut iteration = 0;
        while response.first_finish_reason() == Some("tool_calls") {
            let Some(message) = response.first_message() else { break };
            if message.tool_calls.is_empty() {
                break;
            }
            if iteration >= self.config.max_tool_iterations {
                log::warn!("tool-call loop exhausted {} iterations; returning last response as-is", self.config.max_tool_iterations);
                break;
            }

            working.messages.push(message.clone());

            let results = self.tool_executor.execute_batch(&message.tool_calls).await;
            for result in results {
                working.messages.push(Message::tool(result.tool_call_id, result.content));
            }

            response = provider.complete(&working).await?;
            iteration += 1;
        }

        // Step 9: session persistence.
        if let Some(session_id) = request.session_id.clone() {
            if let Some(sessions) = &self.sessions {
                let history_count = original_first_new_message
                    .as_ref()
                    .and_then(|first| working.messages.iter().position(|m| m.matches_role_content(first)))
                    .unwrap_or(0);

                let mut to_persist: Vec<Message> = working.messages[history_count..].to_vec();
                if let Some(final_message) = response.first_message() {
                    to_persist.push(final_message.clone());
                }
                sessions.add_messages(&session_id, to_persist).await?;
            }
        }

        Ok(response)
    }

    /// Runs the same assembly steps as [`Self::complete`] (alias resolution, provider
    /// selection, session-history assembly, context-budget check and compression)
    /// without dispatching to the provider, so a streaming request gets the same
    /// pipeline a non-streaming one does before the caller opens the SSE response.
    pub async fn prepare_stream(&self, request: ChatCompletionRequest) -> Result<PreparedStream, GatewayError> {
        let canonical_model = self.router.resolve_alias(&request.model);
        let mut working = request.clone();
        working.model = canonical_model.clone();

        let provider = self.router.get_provider(&canonical_model)?;

        let original_first_new_message = working.messages.first().cloned();
        if let Some(session_id) = working.session_id.clone() {
            if let Some(sessions) = &self.sessions {
                let session = sessions.get(&session_id).await?;
                let mut assembled = session.messages.clone();
                assembled.extend(working.messages.drain(..));
                working.messages = assembled;
            } else {
                return Err(GatewayError::SessionStore("no session manager configured".to_string()));
            }
        }

        let context_limit = self.router.context_window_for(&canonical_model);
        let estimated = context_budget::estimate_tokens(&working.messages);
        if context_budget::exceeds_budget(estimated, context_limit) {
            context_budget::compress(
                &mut working.messages,
                &canonical_model,
                context_limit,
                self.cms.as_deref(),
                self.config.cms_proxy_mode,
                &self.infra_status,
            )
            .await;
        }

        let history_count = original_first_new_message
            .as_ref()
            .and_then(|first| working.messages.iter().position(|m| m.matches_role_content(first)))
            .unwrap_or(0);

        Ok(PreparedStream { provider, working, session_id: request.session_id, history_count })
    }

    /// Persists the reconstructed final assistant message once a streamed response
    /// has finished, mirroring step 9 of [`Self::complete`].
    pub async fn persist_stream_completion(
        &self,
        prepared: &PreparedStream,
        final_message: Message,
    ) -> Result<(), GatewayError> {
        let Some(session_id) = &prepared.session_id else { return Ok(()) };
        let Some(sessions) = &self.sessions else { return Ok(()) };

        let mut to_persist: Vec<Message> = prepared.working.messages[prepared.history_count..].to_vec();
        to_persist.push(final_message);
        sessions.add_messages(session_id, to_persist).await
    }
}

/// Output of [`ChatOrchestrator::prepare_stream`]: the resolved provider and the
/// fully-assembled request it should be streamed against.
pub struct PreparedStream {
    pub provider: Arc<dyn ProviderAdapter>,
    pub working: ChatCompletionRequest,
    session_id: Option<String>,
    history_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_registry::ModelRegistry;
    use crate::providers::fake::{FakeAdapter, ScriptedResponse};
    use crate::providers::ProviderAdapter;
    use crate::session::InMemorySessionStore;
    use std::collections::HashMap;

    fn request(model: &str, content: &str, session_id: Option<String>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![Message::user(content)],
            temperature: None,
            max_tokens: None,
            top_p: None,
            n: None,
            stream: false,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            tools: None,
            tool_choice: None,
            user: None,
            seed: None,
            session_id,
        }
    }

    fn router_with(adapter: Arc<dyn ProviderAdapter>) -> Arc<ProviderRouter> {
        let yaml = r#"
providers:
  fake:
    models: ["fake-model"]
"#;
        let registry = ModelRegistry::from_file(serde_yaml::from_str(yaml).unwrap());
        let mut loaded: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        loaded.insert("fake".to_string(), adapter);
        Arc::new(ProviderRouter::new(registry, loaded))
    }

    fn orchestrator(
        adapter: Arc<dyn ProviderAdapter>,
        sessions: Option<Arc<SessionManager>>,
    ) -> ChatOrchestrator {
        ChatOrchestrator::new(
            router_with(adapter),
            sessions,
            Arc::new(ToolExecutor::new(Arc::new(crate::tools::ToolRegistry::new()), std::time::Duration::from_secs(5))),
            None,
            Arc::new(InfraStatus::default()),
            OrchestratorConfig { max_tool_iterations: 10, cms_proxy_mode: false },
        )
    }

    #[tokio::test]
    async fn plain_completion_round_trips() {
        let adapter = Arc::new(FakeAdapter::with_script(
            vec!["fake-model".into()],
            vec![ScriptedResponse::Content("hello".into())],
        ));
        let orch = orchestrator(adapter, None);
        let resp = orch.complete(request("fake-model", "hi", None)).await.unwrap();
        assert_eq!(resp.first_message().unwrap().content, "hello");
    }

    #[tokio::test]
    async fn scenario_c_tool_loop_resolves_to_final_answer() {
        use crate::messages::{ToolCall, ToolCallFunction};

        let tool_call = ToolCall {
            id: "call1".into(),
            call_type: "function".into(),
            function: ToolCallFunction { name: "echo".into(), arguments: "{}".into() },
        };
        let adapter = Arc::new(FakeAdapter::with_script(
            vec!["fake-model".into()],
            vec![ScriptedResponse::ToolCalls(vec![tool_call]), ScriptedResponse::Content("final answer".into())],
        ));
        let orch = orchestrator(adapter, None);
        let resp = orch.complete(request("fake-model", "hi", None)).await.unwrap();
        assert_eq!(resp.first_message().unwrap().content, "final answer");
    }

    #[tokio::test]
    async fn tool_loop_exhaustion_returns_last_response_as_is() {
        use crate::messages::{ToolCall, ToolCallFunction};

        let tool_call = ToolCall {
            id: "call1".into(),
            call_type: "function".into(),
            function: ToolCallFunction { name: "echo".into(), arguments: "{}".into() },
        };
        let script: Vec<ScriptedResponse> =
            (0..5).map(|_| ScriptedResponse::ToolCalls(vec![tool_call.clone()])).collect();
        let adapter = Arc::new(FakeAdapter::with_script(vec!["fake-model".into()], script));

        let orch = ChatOrchestrator::new(
            router_with(adapter),
            None,
            Arc::new(ToolExecutor::new(Arc::new(crate::tools::ToolRegistry::new()), std::time::Duration::from_secs(5))),
            None,
            Arc::new(InfraStatus::default()),
            OrchestratorConfig { max_tool_iterations: 2, cms_proxy_mode: false },
        );
        let resp = orch.complete(request("fake-model", "hi", None)).await.unwrap();
        assert_eq!(resp.first_finish_reason(), Some("tool_calls"));
    }

    #[tokio::test]
    async fn session_history_is_persisted_across_turns() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = Arc::new(SessionManager::new(store, 3600));
        let session = manager.create(None).await.unwrap();

        let adapter = Arc::new(FakeAdapter::with_script(
            vec!["fake-model".into()],
            vec![ScriptedResponse::Content("first reply".into())],
        ));
        let orch = orchestrator(adapter, Some(manager.clone()));
        orch.complete(request("fake-model", "hi", Some(session.id.clone()))).await.unwrap();

        let history = manager.get_history(&session.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].content, "first reply");
    }

    #[tokio::test]
    async fn prepare_stream_assembles_session_history_before_dispatch() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = Arc::new(SessionManager::new(store, 3600));
        let session = manager.create(None).await.unwrap();
        manager.add_message(&session.id, Message::user("earlier turn")).await.unwrap();

        let adapter = Arc::new(FakeAdapter::new(vec!["fake-model".into()]));
        let orch = orchestrator(adapter, Some(manager.clone()));
        let prepared = orch
            .prepare_stream(request("fake-model", "hi", Some(session.id.clone())))
            .await
            .unwrap();

        assert_eq!(prepared.working.messages.len(), 2);
        assert_eq!(prepared.working.messages[0].content, "earlier turn");

        orch.persist_stream_completion(&prepared, Message::assistant("streamed reply")).await.unwrap();
        let history = manager.get_history(&session.id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.last().unwrap().content, "streamed reply");
    }

    #[tokio::test]
    async fn missing_session_errors_before_dispatch() {
        let adapter = Arc::new(FakeAdapter::new(vec!["fake-model".into()]));
        let store = Arc::new(InMemorySessionStore::new());
        let manager = Arc::new(SessionManager::new(store, 3600));
        let orch = orchestrator(adapter, Some(manager));
        let result = orch.complete(request("fake-model", "hi", Some("missing".into()))).await;
        assert!(matches!(result, Err(GatewayError::SessionNotFound(_))));
    }
}
