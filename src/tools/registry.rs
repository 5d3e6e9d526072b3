//! Tool catalog and dispatch.
//!
//! Every tool is a [`FloatTool`]: a typed input, a typed output and an async
//! `run`. The [`ToolRegistry`] erases those types behind a JSON-in/JSON-out
//! call and keeps the manifest in registration order. The [`Dispatcher`] is
//! the only path from a tool name plus raw arguments to a response; it never
//! lets an error or a panic escape.

use crate::db::QueryExecutor;
use crate::error::{ToolError, ToolResult};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// A named, schema-described operation over the profile store.
pub trait FloatTool: Send + Sync + 'static {
    type Input: DeserializeOwned + JsonSchema + Send;
    type Output: Serialize + Send;

    const NAME: &'static str;
    const TITLE: &'static str;
    const DESCRIPTION: &'static str;

    /// Validate and clamp a parsed input before it reaches `run`.
    fn sanitize(&self, input: Self::Input) -> ToolResult<Self::Input> {
        Ok(input)
    }

    fn run(
        &self,
        input: Self::Input,
        executor: &QueryExecutor,
    ) -> impl Future<Output = ToolResult<Self::Output>> + Send;
}

/// Manifest entry for one tool.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Arc<JsonObject>,
}

impl ToolDescriptor {
    fn of<T: FloatTool>() -> Self {
        Self {
            name: T::NAME,
            title: T::TITLE,
            description: T::DESCRIPTION,
            input_schema: input_schema_for::<T::Input>(),
        }
    }

    /// MCP tool definition.
    pub fn to_mcp_tool(&self) -> Tool {
        let mut tool = Tool::new(self.name, self.description, Arc::clone(&self.input_schema));
        tool.title = Some(self.title.to_string());
        tool
    }
}

/// JSON Schema of a tool input as a JSON object.
pub fn input_schema_for<T: JsonSchema>() -> Arc<JsonObject> {
    let schema = schemars::schema_for!(T);
    match serde_json::to_value(schema) {
        Ok(JsonValue::Object(map)) => Arc::new(map),
        _ => {
            let mut map = JsonObject::new();
            map.insert("type".to_string(), JsonValue::String("object".to_string()));
            Arc::new(map)
        }
    }
}

/// Type-erased tool.
trait DynTool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    fn call<'a>(
        &'a self,
        arguments: JsonObject,
        executor: &'a QueryExecutor,
    ) -> BoxFuture<'a, ToolResult<JsonValue>>;
}

struct Registered<T: FloatTool> {
    tool: T,
    descriptor: ToolDescriptor,
}

impl<T: FloatTool> DynTool for Registered<T> {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call<'a>(
        &'a self,
        arguments: JsonObject,
        executor: &'a QueryExecutor,
    ) -> BoxFuture<'a, ToolResult<JsonValue>> {
        async move {
            let input: T::Input = serde_json::from_value(JsonValue::Object(arguments))
                .map_err(|e| ToolError::invalid_input(e.to_string()))?;
            let input = self.tool.sanitize(input)?;
            let output = self.tool.run(input, executor).await?;
            serde_json::to_value(output)
                .map_err(|e| ToolError::internal(format!("Failed to serialize result: {}", e)))
        }
        .boxed()
    }
}

/// Catalog of tools, append-only until handed to a [`Dispatcher`].
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn DynTool>>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names must be unique.
    pub fn register<T: FloatTool>(&mut self, tool: T) -> ToolResult<()> {
        if self.index.contains_key(T::NAME) {
            return Err(ToolError::duplicate_tool(T::NAME));
        }
        self.index.insert(T::NAME, self.tools.len());
        self.tools.push(Arc::new(Registered {
            tool,
            descriptor: ToolDescriptor::of::<T>(),
        }));
        Ok(())
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn DynTool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Manifest as MCP tool definitions.
    pub fn mcp_tools(&self) -> Vec<Tool> {
        self.tools
            .iter()
            .map(|t| t.descriptor().to_mcp_tool())
            .collect()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.tools.iter().map(|t| t.descriptor().name).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

/// What a tool call returns: either the tool's payload or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success(JsonValue),
    Failure { error: String },
}

impl ResponseEnvelope {
    pub fn failure(err: &ToolError) -> Self {
        Self::Failure {
            error: err.user_message(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure { error } => Some(error),
            Self::Success(_) => None,
        }
    }

    /// Wire shape of the envelope.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Success(payload) => payload.clone(),
            Self::Failure { error } => serde_json::json!({ "error": error }),
        }
    }
}

/// Routes tool calls by name. Cheap to clone; shares the registry and pool.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    executor: QueryExecutor,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, executor: QueryExecutor) -> Self {
        Self {
            registry: Arc::new(registry),
            executor,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Run one tool call to completion and wrap the outcome.
    pub async fn dispatch(&self, name: &str, arguments: JsonObject) -> ResponseEnvelope {
        let start = Instant::now();

        let Some(tool) = self.registry.get(name) else {
            let err = ToolError::unknown_tool(name);
            warn!(tool = %name, "Unknown tool requested");
            return ResponseEnvelope::failure(&err);
        };

        let outcome = AssertUnwindSafe(tool.call(arguments, &self.executor))
            .catch_unwind()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(payload)) => {
                info!(tool = %name, elapsed_ms, "Tool call succeeded");
                ResponseEnvelope::Success(payload)
            }
            Ok(Err(err)) => {
                match &err {
                    ToolError::UnsafeQuery { reason } => {
                        warn!(tool = %name, elapsed_ms, reason = %reason, "Query rejected by safety gate");
                    }
                    ToolError::InvalidInput { .. } | ToolError::Handler { .. } => {
                        info!(tool = %name, elapsed_ms, error = %err, "Tool call failed");
                    }
                    _ => {
                        error!(
                            tool = %name,
                            elapsed_ms,
                            error = %err,
                            retryable = err.is_retryable(),
                            fatal_network = err.is_fatal_network(),
                            suggestion = ?err.suggestion(),
                            "Tool call failed"
                        );
                    }
                }
                ResponseEnvelope::failure(&err)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tool = %name, elapsed_ms, panic = %message, "Tool handler panicked");
                ResponseEnvelope::failure(&ToolError::internal(format!(
                    "tool '{}' failed unexpectedly",
                    name
                )))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionManager, PoolSettings};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    #[serde(deny_unknown_fields)]
    struct EchoInput {
        text: String,
        #[serde(default)]
        repeat: Option<u32>,
    }

    struct EchoTool;

    impl FloatTool for EchoTool {
        type Input = EchoInput;
        type Output = JsonValue;

        const NAME: &'static str = "echo";
        const TITLE: &'static str = "Echo";
        const DESCRIPTION: &'static str = "Echo the text back.";

        fn sanitize(&self, input: EchoInput) -> ToolResult<EchoInput> {
            if input.text.is_empty() {
                return Err(ToolError::invalid_input("text must not be empty"));
            }
            Ok(input)
        }

        async fn run(&self, input: EchoInput, _executor: &QueryExecutor) -> ToolResult<JsonValue> {
            Ok(json!({ "text": input.text.repeat(input.repeat.unwrap_or(1) as usize) }))
        }
    }

    struct PanicTool;

    impl FloatTool for PanicTool {
        type Input = JsonObject;
        type Output = JsonValue;

        const NAME: &'static str = "boom";
        const TITLE: &'static str = "Boom";
        const DESCRIPTION: &'static str = "Always panics.";

        async fn run(&self, _input: JsonObject, _executor: &QueryExecutor) -> ToolResult<JsonValue> {
            panic!("handler bug");
        }
    }

    async fn dispatcher() -> Dispatcher {
        let manager = ConnectionManager::connect("sqlite::memory:", PoolSettings::default())
            .await
            .unwrap();
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        registry.register(PanicTool).unwrap();
        Dispatcher::new(registry, QueryExecutor::new(Arc::new(manager)))
    }

    fn args(value: JsonValue) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let err = registry.register(EchoTool).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateTool { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_descriptor_schema_is_object() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool).unwrap();
        let tools = registry.mcp_tools();
        assert_eq!(tools[0].input_schema["type"], json!("object"));
        assert!(tools[0].input_schema["properties"]["text"].is_object());
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].title.as_deref(), Some("Echo"));
    }

    #[test]
    fn test_envelope_wire_shape() {
        let ok = ResponseEnvelope::Success(json!({"rows": []}));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"rows": []}));

        let err = ResponseEnvelope::failure(&ToolError::handler("no rows"));
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({"error": "no rows"}));
        assert_eq!(err.to_json(), json!({"error": "no rows"}));
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let dispatcher = dispatcher().await;
        let response = dispatcher
            .dispatch("echo", args(json!({"text": "ab", "repeat": 2})))
            .await;
        assert_eq!(response, ResponseEnvelope::Success(json!({"text": "abab"})));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let dispatcher = dispatcher().await;
        let response = dispatcher.dispatch("nope", JsonObject::new()).await;
        assert!(response.error_message().unwrap().contains("Unknown tool"));

        // Later calls are unaffected
        let response = dispatcher.dispatch("echo", args(json!({"text": "x"}))).await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_dispatch_validation_errors() {
        let dispatcher = dispatcher().await;

        let missing = dispatcher.dispatch("echo", JsonObject::new()).await;
        assert!(missing.error_message().unwrap().contains("Invalid input"));

        let unknown_field = dispatcher
            .dispatch("echo", args(json!({"text": "x", "extra": 1})))
            .await;
        assert!(unknown_field.error_message().unwrap().contains("extra"));

        let wrong_type = dispatcher
            .dispatch("echo", args(json!({"text": "x", "repeat": "2"})))
            .await;
        assert!(!wrong_type.is_success());

        let sanitized = dispatcher.dispatch("echo", args(json!({"text": ""}))).await;
        assert!(sanitized.error_message().unwrap().contains("must not be empty"));
    }

    #[tokio::test]
    async fn test_dispatch_contains_panics() {
        let dispatcher = dispatcher().await;
        let response = dispatcher.dispatch("boom", JsonObject::new()).await;
        assert!(response.error_message().unwrap().contains("boom"));

        let response = dispatcher.dispatch("echo", args(json!({"text": "ok"}))).await;
        assert!(response.is_success());
    }
}
