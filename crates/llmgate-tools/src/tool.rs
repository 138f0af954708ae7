use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use llmgate_common::ToolDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum ToolFailure {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0}")]
    Execution(String),
}

/// One callable tool: a declared descriptor plus an async JSON-in/JSON-out
/// implementation.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolFailure>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.descriptor().name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Descriptor list, sorted by name for a stable metadata surface.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|tool| tool.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llmgate_common::ToolParam;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn descriptor(&self) -> ToolDescriptor {
            ToolDescriptor {
                name: "echo".into(),
                summary: "Echo the arguments back.".into(),
                parameters: vec![ToolParam {
                    name: "value".into(),
                    semantic_type: "string".into(),
                    required: true,
                    description: "Value to echo.".into(),
                }],
            }
        }

        async fn invoke(&self, arguments: Value) -> Result<Value, ToolFailure> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn register_lookup_and_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let tool = registry.get("echo").unwrap();
        let out = tool.invoke(json!({"value": "hi"})).await.unwrap();
        assert_eq!(out, json!({"value": "hi"}));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn descriptors_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "echo");
    }
}
