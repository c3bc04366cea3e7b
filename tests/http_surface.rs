//! End-to-end exercise of the HTTP surface against the Fake provider adapter (§1.1
//! ambient test tooling: integration tests live under `tests/`, unit tests inline).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use llm_gateway::circuit_breaker::CircuitBreakerRegistry;
use llm_gateway::config::GatewayConfig;
use llm_gateway::http::{build_router, GatewayState};
use llm_gateway::model_registry::ModelRegistry;
use llm_gateway::observability::{InfraStatus, NoopMetricsSink};
use llm_gateway::orchestrator::{ChatOrchestrator, OrchestratorConfig};
use llm_gateway::providers::fake::{FakeAdapter, ScriptedResponse};
use llm_gateway::providers::ProviderAdapter;
use llm_gateway::rate_limiter::RateLimiter;
use llm_gateway::router::ProviderRouter;
use llm_gateway::session::{InMemorySessionStore, SessionManager, SessionStore};
use llm_gateway::tools::{ToolExecutor, ToolRegistry};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn test_state(adapter: Arc<dyn ProviderAdapter>) -> Arc<GatewayState> {
    let yaml = r#"
providers:
  fake:
    models: ["fake-model"]
aliases:
  default-model: fake-model
"#;
    let registry = ModelRegistry::from_file(serde_yaml::from_str(yaml).unwrap());
    let mut loaded: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
    loaded.insert("fake".to_string(), adapter);
    let router = Arc::new(ProviderRouter::new(registry, loaded));

    let session_store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let sessions = Arc::new(SessionManager::new(session_store, 3600));
    let tools = Arc::new(ToolRegistry::new());
    let tool_executor = Arc::new(ToolExecutor::new(tools.clone(), Duration::from_secs(5)));
    let infra_status = Arc::new(InfraStatus::default());

    let orchestrator = Arc::new(ChatOrchestrator::new(
        router.clone(),
        Some(sessions.clone()),
        tool_executor,
        None,
        infra_status.clone(),
        OrchestratorConfig { max_tool_iterations: 10, cms_proxy_mode: false },
    ));

    Arc::new(GatewayState {
        config: GatewayConfig::default(),
        router,
        orchestrator,
        rate_limiter: Arc::new(RateLimiter::new(6000.0, 100.0)),
        circuit_breakers: Arc::new(CircuitBreakerRegistry::new(5, Duration::from_secs(30), 1, Arc::new(NoopMetricsSink))),
        sessions,
        tools,
        semantic_search: None,
        ai_agents: None,
        cms: None,
        infra_status,
    })
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, body)
}

#[tokio::test]
async fn chat_completion_round_trips_through_the_fake_provider() {
    let adapter = Arc::new(FakeAdapter::with_script(
        vec!["fake-model".into()],
        vec![ScriptedResponse::Content("hello from the gateway".into())],
    ));
    let app = build_router(test_state(adapter));

    let body = json!({
        "model": "fake-model",
        "messages": [{"role": "user", "content": "hi"}],
    });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, payload) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["choices"][0]["message"]["content"], "hello from the gateway");
}

#[tokio::test]
async fn unroutable_model_yields_400() {
    let adapter = Arc::new(FakeAdapter::new(vec!["fake-model".into()]));
    let app = build_router(test_state(adapter));

    let body = json!({ "model": "nonexistent-model", "messages": [{"role": "user", "content": "hi"}] });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_messages_yields_422() {
    let adapter = Arc::new(FakeAdapter::new(vec!["fake-model".into()]));
    let app = build_router(test_state(adapter));

    let body = json!({ "model": "fake-model", "messages": [] });
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn session_lifecycle_create_get_delete() {
    let adapter = Arc::new(FakeAdapter::new(vec!["fake-model".into()]));
    let app = build_router(test_state(adapter));

    let (status, created) =
        send(app.clone(), Request::builder().method("POST").uri("/v1/sessions").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(
        app.clone(),
        Request::builder().method("GET").uri(format!("/v1/sessions/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], id);

    let (status, _) = send(
        app.clone(),
        Request::builder().method("DELETE").uri(format!("/v1/sessions/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) =
        send(app, Request::builder().method("GET").uri(format!("/v1/sessions/{id}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn models_endpoint_lists_loaded_models() {
    let adapter = Arc::new(FakeAdapter::new(vec!["fake-model".into()]));
    let app = build_router(test_state(adapter));

    let (status, payload) =
        send(app, Request::builder().method("GET").uri("/v1/models").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = payload["data"].as_array().unwrap().iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"fake-model"));
}

#[tokio::test]
async fn liveness_and_readiness_report_healthy() {
    let adapter = Arc::new(FakeAdapter::new(vec!["fake-model".into()]));
    let app = build_router(test_state(adapter));

    let (status, _) = send(app.clone(), Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(app, Request::builder().uri("/health/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
}
