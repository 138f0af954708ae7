use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("duplicate profile id: {0}")]
    DuplicateProfile(String),
    #[error("alias {alias} has an empty profile chain")]
    EmptyChain { alias: String },
    #[error("alias {alias} references unknown profile {profile}")]
    UnknownProfile { alias: String, profile: String },
}

/// Full gateway configuration as loaded from the YAML file.
///
/// The running process holds this behind an `ArcSwap`; admin reload parses a
/// fresh copy and swaps the pointer, so in-flight requests keep the snapshot
/// they started with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub model_list: Vec<ModelProfile>,
    #[serde(default)]
    pub router_settings: RouterSettings,
    #[serde(default)]
    pub agent_settings: AgentSettings,
    #[serde(default)]
    pub cache_settings: CacheSettings,
    #[serde(default)]
    pub key_management_settings: KeyManagementSettings,
    #[serde(default)]
    pub streaming_settings: StreamingSettings,
}

/// One concrete way of calling one upstream model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    #[serde(rename = "model_name")]
    pub profile_id: String,
    pub provider: String,
    pub model_params: ModelParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    /// Upstream model name sent to the provider.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_settings: Option<ProfileAgentSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileAgentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Client-facing alias -> ordered profile chain. Map keys give alias
    /// uniqueness for free; chains are validated non-empty and resolvable.
    #[serde(default)]
    pub model_group_alias: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_server_url: Option<String>,
    /// Global default reasoning pattern, overridable per profile and per
    /// session request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_mode: Option<String>,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_patterns_dir")]
    pub patterns_dir: String,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            mcp_server_url: None,
            reasoning_mode: None,
            max_steps: default_max_steps(),
            workers: default_workers(),
            patterns_dir: default_patterns_dir(),
            prompts_dir: default_prompts_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default)]
    pub rules: Vec<CacheRule>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            key_prefix: default_key_prefix(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRule {
    /// Profile ids this rule applies to.
    pub model_names: Vec<String>,
    /// Request body fields hashed into the fingerprint.
    pub include_in_key: Vec<String>,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyManagementSettings {
    #[serde(default = "default_true")]
    pub enable_quarantine: bool,
    #[serde(default = "default_quarantine_seconds")]
    pub quarantine_seconds: u64,
}

impl Default for KeyManagementSettings {
    fn default() -> Self {
        Self {
            enable_quarantine: true,
            quarantine_seconds: default_quarantine_seconds(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypewriterMode {
    /// The gateway re-chunks thought/answer text character by character.
    #[default]
    Proxy,
    /// Whole parsed chunks are forwarded; the client animates.
    Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingSettings {
    #[serde(default)]
    pub typewriter_mode: TypewriterMode,
    /// Per-message read timeout of the SSE delivery stream.
    #[serde(default = "default_sse_read_timeout_seconds")]
    pub sse_read_timeout_seconds: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            typewriter_mode: TypewriterMode::default(),
            sse_read_timeout_seconds: default_sse_read_timeout_seconds(),
        }
    }
}

fn default_max_steps() -> u32 {
    12
}

fn default_workers() -> usize {
    4
}

fn default_patterns_dir() -> String {
    "patterns".to_string()
}

fn default_prompts_dir() -> String {
    "prompts".to_string()
}

fn default_key_prefix() -> String {
    "llmgate:".to_string()
}

fn default_true() -> bool {
    true
}

fn default_quarantine_seconds() -> u64 {
    60
}

fn default_sse_read_timeout_seconds() -> u64 {
    60
}

impl GatewayConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for profile in &self.model_list {
            if !seen.insert(profile.profile_id.as_str()) {
                return Err(ConfigError::DuplicateProfile(profile.profile_id.clone()));
            }
        }
        for (alias, chain) in &self.router_settings.model_group_alias {
            if chain.is_empty() {
                return Err(ConfigError::EmptyChain {
                    alias: alias.clone(),
                });
            }
            for profile in chain {
                if !seen.contains(profile.as_str()) {
                    return Err(ConfigError::UnknownProfile {
                        alias: alias.clone(),
                        profile: profile.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn profile(&self, id: &str) -> Option<&ModelProfile> {
        self.model_list.iter().find(|p| p.profile_id == id)
    }

    pub fn chain(&self, alias: &str) -> Option<&[String]> {
        self.router_settings
            .model_group_alias
            .get(alias)
            .map(Vec::as_slice)
    }

    /// Distinct provider tags, in first-appearance order (key files are
    /// loaded per tag).
    pub fn provider_tags(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for profile in &self.model_list {
            if seen.insert(profile.provider.as_str()) {
                tags.push(profile.provider.clone());
            }
        }
        tags
    }

    /// Provider -> upstream model names, for the admin UI.
    pub fn provider_models(&self) -> BTreeMap<String, Vec<String>> {
        let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for profile in &self.model_list {
            let models = out.entry(profile.provider.clone()).or_default();
            if !models.contains(&profile.model_params.model) {
                models.push(profile.model_params.model.clone());
            }
        }
        out
    }

    /// An alias is agent-capable when any profile in its chain carries
    /// agent settings.
    pub fn alias_is_agent(&self, alias: &str) -> bool {
        let Some(chain) = self.chain(alias) else {
            return false;
        };
        chain.iter().any(|id| {
            self.profile(id)
                .is_some_and(|p| p.model_params.agent_settings.is_some())
        })
    }

    /// Pattern name for a session: request override > profile > global.
    pub fn reasoning_mode_for(&self, alias: &str, requested: Option<&str>) -> Option<String> {
        if let Some(mode) = requested {
            return Some(mode.to_string());
        }
        if let Some(chain) = self.chain(alias) {
            for id in chain {
                if let Some(mode) = self
                    .profile(id)
                    .and_then(|p| p.model_params.agent_settings.as_ref())
                    .and_then(|a| a.reasoning_mode.clone())
                {
                    return Some(mode);
                }
            }
        }
        self.agent_settings.reasoning_mode.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
model_list:
  - model_name: gpt4-primary
    provider: openai
    model_params:
      model: gpt-4o
      temperature: 0.2
      max_tokens: 4096
  - model_name: gemini-backup
    provider: gemini
    model_params:
      model: gemini-2.0-flash
      api_base: https://generativelanguage.googleapis.com
      agent_settings:
        reasoning_mode: basic_react
router_settings:
  model_group_alias:
    smart: [gpt4-primary, gemini-backup]
    agent: [gemini-backup]
agent_settings:
  mcp_server_url: http://127.0.0.1:8101
  reasoning_mode: basic_react
cache_settings:
  enabled: true
  key_prefix: "llmgate:"
  rules:
    - model_names: [gpt4-primary]
      include_in_key: [messages, temperature]
      ttl_seconds: 60
key_management_settings:
  enable_quarantine: true
streaming_settings:
  typewriter_mode: proxy
"#;

    #[test]
    fn parses_sample_config() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.model_list.len(), 2);
        assert_eq!(
            config.chain("smart").unwrap(),
            &["gpt4-primary".to_string(), "gemini-backup".to_string()]
        );
        assert_eq!(config.profile("gpt4-primary").unwrap().provider, "openai");
        assert_eq!(config.agent_settings.max_steps, 12);
        assert_eq!(
            config.streaming_settings.typewriter_mode,
            TypewriterMode::Proxy
        );
        assert!(config.cache_settings.enabled);
    }

    #[test]
    fn provider_tags_are_distinct_and_ordered() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.provider_tags(), vec!["openai", "gemini"]);
    }

    #[test]
    fn alias_agent_detection() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert!(config.alias_is_agent("agent"));
        assert!(config.alias_is_agent("smart"));
        assert!(!config.alias_is_agent("missing"));
    }

    #[test]
    fn reasoning_mode_precedence() {
        let config = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(
            config.reasoning_mode_for("agent", Some("deep_plan")).as_deref(),
            Some("deep_plan")
        );
        assert_eq!(
            config.reasoning_mode_for("agent", None).as_deref(),
            Some("basic_react")
        );
    }

    #[test]
    fn rejects_unknown_profile_in_chain() {
        let yaml = r#"
model_list:
  - model_name: a
    provider: openai
    model_params:
      model: gpt-4o
router_settings:
  model_group_alias:
    broken: [a, nope]
"#;
        let err = GatewayConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { .. }));
    }

    #[test]
    fn rejects_empty_chain() {
        let yaml = r#"
model_list:
  - model_name: a
    provider: openai
    model_params:
      model: gpt-4o
router_settings:
  model_group_alias:
    empty: []
"#;
        let err = GatewayConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyChain { .. }));
    }

    #[test]
    fn rejects_duplicate_profiles() {
        let yaml = r#"
model_list:
  - model_name: a
    provider: openai
    model_params:
      model: gpt-4o
  - model_name: a
    provider: gemini
    model_params:
      model: gemini-2.0-flash
"#;
        let err = GatewayConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateProfile(_)));
    }
}
