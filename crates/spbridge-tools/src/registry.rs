use crate::lazy::LazyLibrary;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use spbridge_core::{BridgeError, ToolDefinition};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error(transparent)]
    Failed(#[from] BridgeError),
}

type ToolFuture = BoxFuture<'static, Result<Value, ToolError>>;
type ToolHandler = Arc<dyn Fn(Arc<LazyLibrary>, Value) -> ToolFuture + Send + Sync>;

struct RegisteredTool {
    definition: ToolDefinition,
    handler: ToolHandler,
}

/// Maps tool names to their definitions and handlers. Every handler receives
/// the shared library handle and its arguments decoded into a typed struct.
pub struct ToolRegistry {
    library: Arc<LazyLibrary>,
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new(library: Arc<LazyLibrary>) -> Self {
        Self {
            library,
            tools: BTreeMap::new(),
        }
    }

    pub fn register<A, R, F, Fut>(&mut self, definition: ToolDefinition, run: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Arc<LazyLibrary>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = spbridge_core::Result<R>> + Send + 'static,
    {
        let name = definition.name.clone();
        let tool_name = name.clone();

        let handler: ToolHandler = Arc::new(move |library, arguments| {
            let args = match serde_json::from_value::<A>(arguments) {
                Ok(args) => args,
                Err(err) => {
                    return future::ready(Err(ToolError::InvalidArguments {
                        tool: tool_name.clone(),
                        message: err.to_string(),
                    }))
                    .boxed();
                }
            };

            let pending = run(library, args);
            async move {
                let output = pending.await?;
                serde_json::to_value(output).map_err(|e| ToolError::Failed(e.into()))
            }
            .boxed()
        });

        if self
            .tools
            .insert(name.clone(), RegisteredTool { definition, handler })
            .is_some()
        {
            tracing::warn!(tool = %name, "tool registered twice; keeping the later handler");
        }
    }

    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        tracing::debug!(tool = %name, "calling tool");
        (tool.handler)(Arc::clone(&self.library), arguments).await
    }

    /// Definitions in name order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.values().map(|tool| &tool.definition)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("library", &self.library)
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{counting_library, MemoryLibrary};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct EchoArgs {
        word: String,
    }

    fn echo_registry() -> ToolRegistry {
        let (library, _) = counting_library(Arc::new(MemoryLibrary::new()));
        let mut registry = ToolRegistry::new(Arc::new(library));
        registry.register(
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echo a word".to_string(),
                parameters: json!({"type": "object"}),
            },
            |_library, args: EchoArgs| async move { Ok::<_, BridgeError>(json!({ "word": args.word })) },
        );
        registry
    }

    #[tokio::test]
    async fn test_call_decodes_arguments() {
        let registry = echo_registry();
        let output = registry.call("echo", json!({"word": "hi"})).await.unwrap();
        assert_eq!(output, json!({"word": "hi"}));
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments() {
        let registry = echo_registry();

        assert!(matches!(
            registry.call("missing", json!({})).await,
            Err(ToolError::UnknownTool(_))
        ));
        assert!(matches!(
            registry.call("echo", json!({"word": "hi", "extra": 1})).await,
            Err(ToolError::InvalidArguments { .. })
        ));
        assert!(matches!(
            registry.call("echo", json!({})).await,
            Err(ToolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_handlers_share_one_library() {
        let memory = Arc::new(MemoryLibrary::new());
        let (library, constructed) = counting_library(Arc::clone(&memory));
        let mut registry = ToolRegistry::new(Arc::new(library));
        registry.register(
            ToolDefinition {
                name: "root".to_string(),
                description: "Default library".to_string(),
                parameters: json!({"type": "object"}),
            },
            |library: Arc<LazyLibrary>, _args: serde_json::Map<String, Value>| async move {
                let svc = library.get().await?;
                Ok::<_, BridgeError>(svc.default_library().to_string())
            },
        );

        registry.call("root", json!({})).await.unwrap();
        registry.call("root", json!({})).await.unwrap();

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert_eq!(registry.definitions().count(), 1);
    }
}
