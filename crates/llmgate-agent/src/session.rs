use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parsed `<ACTION>` body: which tool to call and with what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One completed reasoning step. A pause step carries neither action nor
/// observation.
#[derive(Debug, Clone, Serialize)]
pub struct ScratchpadEntry {
    pub step_index: u32,
    pub thought: String,
    pub action: Option<ToolCall>,
    pub observation: Option<Value>,
}

/// Append-only record of a session's steps.
#[derive(Debug, Default)]
pub struct Scratchpad {
    entries: Vec<ScratchpadEntry>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        step_index: u32,
        thought: String,
        action: Option<ToolCall>,
        observation: Option<Value>,
    ) {
        self.entries.push(ScratchpadEntry {
            step_index,
            thought,
            action,
            observation,
        });
    }

    pub fn entries(&self) -> &[ScratchpadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a session currently is in its lifecycle; logged, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Planning,
    Acting,
    Observing,
    Synthesizing,
    Done,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_parses_with_and_without_arguments() {
        let call: ToolCall =
            serde_json::from_str(r#"{"tool_name":"web_search","arguments":{"query":"x"}}"#)
                .unwrap();
        assert_eq!(call.tool_name, "web_search");
        assert_eq!(call.arguments["query"], "x");

        let bare: ToolCall = serde_json::from_str(r#"{"tool_name":"current_time"}"#).unwrap();
        assert_eq!(bare.arguments, Value::Null);
    }

    #[test]
    fn scratchpad_appends_in_order() {
        let mut pad = Scratchpad::new();
        pad.push(0, "first".into(), None, None);
        pad.push(
            1,
            "second".into(),
            Some(ToolCall {
                tool_name: "web_search".into(),
                arguments: json!({}),
            }),
            Some(json!({"result": 1})),
        );
        assert_eq!(pad.len(), 2);
        assert_eq!(pad.entries()[0].thought, "first");
        assert!(pad.entries()[1].action.is_some());
    }
}
