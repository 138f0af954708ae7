use std::collections::HashMap;
use std::path::Path;

use llmgate_common::ToolDescriptor;

const TOOLS_PLACEHOLDER: &str = "{{TOOLS}}";

/// Fixed preamble establishing the priority contract between sections.
const META_INSTRUCTION: &str = "The instruction sections below are ordered by descending priority. \
When sections conflict, an earlier section overrides a later one.";

const CLIENT_HEADER: &str = "### CLIENT INSTRUCTIONS (HIGHEST PRIORITY)";
const FRAMEWORK_HEADER: &str = "### CORE REASONING FRAMEWORK";
const SERVER_HEADER: &str = "### GLOBAL SERVER INSTRUCTIONS (LOWEST PRIORITY)";

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("failed to read patterns from {dir}: {source}")]
    Io {
        dir: String,
        source: std::io::Error,
    },
}

/// A reasoning template: the system text framing the tag vocabulary the
/// model is expected to emit.
#[derive(Debug, Clone)]
pub struct ReasoningPattern {
    pub name: String,
    text: String,
}

impl ReasoningPattern {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Produce the framework block with the tool catalog spliced in. A
    /// `{{TOOLS}}` placeholder is replaced in place; without one the
    /// catalog is appended.
    pub fn render(&self, tools: &[ToolDescriptor]) -> String {
        let catalog = if tools.is_empty() {
            "(no tools available)".to_string()
        } else {
            tools
                .iter()
                .map(ToolDescriptor::render)
                .collect::<Vec<_>>()
                .join("\n")
        };
        if self.text.contains(TOOLS_PLACEHOLDER) {
            self.text.replace(TOOLS_PLACEHOLDER, &catalog)
        } else if tools.is_empty() {
            self.text.clone()
        } else {
            format!("{}\n\nAvailable tools:\n{catalog}", self.text.trim_end())
        }
    }
}

/// Patterns discovered at startup from a directory of `*.txt` files; the
/// file stem is the pattern name.
#[derive(Debug, Default)]
pub struct PatternSet {
    patterns: HashMap<String, ReasoningPattern>,
}

impl PatternSet {
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, PatternError> {
        let dir = dir.as_ref();
        let io_err = |source| PatternError::Io {
            dir: dir.display().to_string(),
            source,
        };
        let mut patterns = HashMap::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let text = std::fs::read_to_string(&path).map_err(io_err)?;
            patterns.insert(name.to_string(), ReasoningPattern::new(name, text));
        }
        tracing::info!(dir = %dir.display(), count = patterns.len(), "reasoning patterns loaded");
        Ok(Self { patterns })
    }

    pub fn from_patterns(list: impl IntoIterator<Item = ReasoningPattern>) -> Self {
        Self {
            patterns: list
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ReasoningPattern> {
        self.patterns.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.patterns.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptInputs<'a> {
    pub pattern_prompt: &'a str,
    pub client_system_instruction: Option<&'a str>,
    pub client_manifests: &'a [String],
    pub server_system_instruction: Option<&'a str>,
    pub server_manifests: &'a [String],
}

/// Deterministic system-prompt assembly: meta instruction, then client,
/// framework and server sections. Client and server sections disappear
/// entirely when they have no content.
pub fn build_system_prompt(inputs: &PromptInputs) -> String {
    let mut sections = vec![META_INSTRUCTION.to_string()];

    let client = join_block(inputs.client_system_instruction, inputs.client_manifests);
    if let Some(client) = client {
        sections.push(format!("{CLIENT_HEADER}\n{client}"));
    }

    sections.push(format!("{FRAMEWORK_HEADER}\n{}", inputs.pattern_prompt));

    let server = join_block(inputs.server_system_instruction, inputs.server_manifests);
    if let Some(server) = server {
        sections.push(format!("{SERVER_HEADER}\n{server}"));
    }

    sections.join("\n\n")
}

fn join_block(instruction: Option<&str>, manifests: &[String]) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    if let Some(instruction) = instruction
        && !instruction.trim().is_empty()
    {
        parts.push(instruction);
    }
    for manifest in manifests {
        if !manifest.trim().is_empty() {
            parts.push(manifest);
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Server-side prompt material: `system.txt` plus `manifest_*.txt` files
/// under the prompts directory, lexicographic order. All optional.
pub fn load_server_prompts(dir: impl AsRef<Path>) -> (Option<String>, Vec<String>) {
    let dir = dir.as_ref();
    let instruction = std::fs::read_to_string(dir.join("system.txt")).ok();
    let mut manifests = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("manifest_") && n.ends_with(".txt"))
            })
            .collect();
        paths.sort();
        for path in paths {
            if let Ok(text) = std::fs::read_to_string(&path) {
                manifests.push(text);
            }
        }
    }
    (instruction, manifests)
}
