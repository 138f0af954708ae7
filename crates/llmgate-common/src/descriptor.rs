use serde::{Deserialize, Serialize};

/// Metadata for one callable tool, as served by the tool gateway and as
/// rendered into reasoning prompts.
///
/// Descriptors are declared beside each tool implementation; there is no
/// runtime reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub summary: String,
    #[serde(default)]
    pub parameters: Vec<ToolParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    /// Loose semantic type shown to the model ("string", "integer", ...).
    pub semantic_type: String,
    pub required: bool,
    pub description: String,
}

impl ToolDescriptor {
    /// One-block plain-text rendering used inside the system prompt.
    pub fn render(&self) -> String {
        let mut out = format!("- {}: {}", self.name, self.summary);
        for param in &self.parameters {
            let requirement = if param.required { "required" } else { "optional" };
            out.push_str(&format!(
                "\n    {} ({}, {}): {}",
                param.name, param.semantic_type, requirement, param.description
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_name_summary_and_params() {
        let descriptor = ToolDescriptor {
            name: "web_search".into(),
            summary: "Search the web.".into(),
            parameters: vec![ToolParam {
                name: "query".into(),
                semantic_type: "string".into(),
                required: true,
                description: "Search terms.".into(),
            }],
        };
        let text = descriptor.render();
        assert!(text.starts_with("- web_search: Search the web."));
        assert!(text.contains("query (string, required): Search terms."));
    }
}
