//! Tool Registry + Executor (§4.5).
//!
//! Generalizes the inherited tool-protocol trait (`execute(name, params) -> ToolResult`,
//! `list_tools`, `get_tool_metadata`) into a registry of named, schema-validated
//! handlers plus a batch executor with per-call timeout and bounded concurrency.

pub mod proxies;

use crate::messages::{ToolCall, ToolDefinition, ToolResult};
use async_trait::async_trait;
use dashmap::DashMap;
use jsonschema::Validator;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, String>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, String>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value, String> {
        (self)(arguments).await
    }
}

pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
    schema: Option<Validator>,
}

impl RegisteredTool {
    pub fn new(definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Self {
        let schema = jsonschema::validator_for(&definition.parameters).ok();
        if schema.is_none() {
            log::warn!("tool '{}' has a parameters schema that failed to compile; argument validation will be skipped", definition.name);
        }
        RegisteredTool { definition, handler, schema }
    }

    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        match &self.schema {
            Some(schema) => schema.validate(arguments).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<RegisteredTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    /// Names are unique; re-registration replaces the existing entry.
    pub fn register(&self, tool: RegisteredTool) {
        self.tools.insert(tool.definition.name.clone(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition.clone()).collect()
    }

    /// Seeds the registry from a JSON file of `[{name, description, parameters}]`
    /// entries, each wired to a stub handler that must be overwritten via `register`
    /// before it can actually execute; used for advertising tool shapes read from
    /// disk ahead of the concrete in-process or proxy handler being wired up.
    pub fn seed_definitions_from_path(&self, path: impl AsRef<std::path::Path>) -> Result<usize, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let definitions: Vec<ToolDefinition> = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
        let count = definitions.len();
        for definition in definitions {
            let name = definition.name.clone();
            self.register(RegisteredTool::new(
                definition,
                Arc::new(move |_args: Value| {
                    let name = name.clone();
                    async move { Err(format!("tool '{name}' has no handler registered")) }
                }),
            ));
        }
        Ok(count)
    }
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        ToolExecutor { registry, timeout }
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let tool = match self.registry.get(&call.function.name) {
            Some(tool) => tool,
            None => return ToolResult::failure(&call.id, format!("unknown tool '{}'", call.function.name)),
        };

        let arguments = match serde_json::from_str::<Value>(&call.function.arguments) {
            Ok(v) => v,
            Err(_) => Value::Object(Default::default()),
        };

        if let Err(msg) = tool.validate(&arguments) {
            return ToolResult::failure(&call.id, format!("arguments failed validation: {msg}"));
        }

        match tokio::time::timeout(self.timeout, tool.handler.call(arguments)).await {
            Ok(Ok(value)) => ToolResult::success(&call.id, value.to_string()),
            Ok(Err(msg)) => ToolResult::failure(&call.id, msg),
            Err(_) => ToolResult::failure(&call.id, format!("tool '{}' timed out after {:?}", call.function.name, self.timeout)),
        }
    }

    /// Executes all calls concurrently, preserving input order in the result.
    pub async fn execute_batch(&self, calls: &[ToolCall]) -> Vec<ToolResult> {
        let futures = calls.iter().map(|call| self.execute(call));
        futures_util::future::join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ToolCallFunction;
    use serde_json::json;

    fn echo_tool() -> RegisteredTool {
        RegisteredTool::new(
            ToolDefinition {
                name: "echo".to_string(),
                description: "echoes the message".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": { "message": { "type": "string" } },
                    "required": ["message"],
                }),
            },
            Arc::new(|args: Value| async move {
                Ok(json!(args.get("message").and_then(Value::as_str).unwrap_or("").to_string()))
            }),
        )
    }

    fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: ToolCallFunction { name: name.to_string(), arguments: arguments.to_string() },
        }
    }

    #[tokio::test]
    async fn scenario_c_tool_loop_execution() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_tool());
        let executor = ToolExecutor::new(registry, Duration::from_secs(5));

        let call = tool_call("t1", "echo", json!({"message": "ok"}));
        let result = executor.execute(&call).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "\"ok\"");
        assert_eq!(result.tool_call_id, "t1");
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result_not_failure() {
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()), Duration::from_secs(5));
        let call = tool_call("t1", "missing", json!({}));
        let result = executor.execute(&call).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn invalid_arguments_yield_error_result() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_tool());
        let executor = ToolExecutor::new(registry, Duration::from_secs(5));

        let call = tool_call("t1", "echo", json!({}));
        let result = executor.execute(&call).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(echo_tool());
        let executor = ToolExecutor::new(registry, Duration::from_secs(5));

        let calls = vec![
            tool_call("a", "echo", json!({"message": "1"})),
            tool_call("b", "echo", json!({"message": "2"})),
            tool_call("c", "echo", json!({"message": "3"})),
        ];
        let results = executor.execute_batch(&calls).await;
        assert_eq!(results.iter().map(|r| r.tool_call_id.clone()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn timeout_yields_error_result() {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(RegisteredTool::new(
            ToolDefinition { name: "slow".into(), description: "".into(), parameters: json!({}) },
            Arc::new(|_args: Value| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(json!("done"))
            }),
        ));
        let executor = ToolExecutor::new(registry, Duration::from_millis(5));
        let result = executor.execute(&tool_call("t1", "slow", json!({}))).await;
        assert!(result.is_error);
    }
}
