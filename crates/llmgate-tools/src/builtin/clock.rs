use async_trait::async_trait;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use llmgate_common::ToolDescriptor;

use crate::tool::{Tool, ToolFailure};

/// Wall-clock lookup; mostly useful for grounding "now" in reasoning
/// sessions.
#[derive(Debug, Default)]
pub struct CurrentTimeTool;

impl CurrentTimeTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "current_time".into(),
            summary: "Return the current UTC date and time.".into(),
            parameters: Vec::new(),
        }
    }

    async fn invoke(&self, _arguments: Value) -> Result<Value, ToolFailure> {
        let now = OffsetDateTime::now_utc();
        let formatted = now
            .format(&Rfc3339)
            .map_err(|err| ToolFailure::Execution(err.to_string()))?;
        Ok(json!({ "utc": formatted, "unix": now.unix_timestamp() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_rfc3339_utc() {
        let out = CurrentTimeTool::new().invoke(Value::Null).await.unwrap();
        let utc = out["utc"].as_str().unwrap();
        assert!(utc.contains('T'));
        assert!(out["unix"].as_i64().unwrap() > 0);
    }
}
