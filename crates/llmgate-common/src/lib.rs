//! Shared configuration and wire types for llmgate.
//!
//! This crate carries no IO beyond reading the config file; everything here
//! is plain data shared by the gateway, the agent workers and the tool
//! server.

pub mod config;
pub mod descriptor;

pub use config::{
    AgentSettings, CacheRule, CacheSettings, ConfigError, GatewayConfig, KeyManagementSettings,
    ModelParams, ModelProfile, ProfileAgentSettings, RouterSettings, StreamingSettings,
    TypewriterMode,
};
pub use descriptor::{ToolDescriptor, ToolParam};
