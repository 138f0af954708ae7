//! Concrete provider adapters.
//!
//! Adapters only describe upstream HTTP requests and reshape response
//! bodies; IO and credential handling live in `llmgate-core`.

mod gemini;
mod http;
mod openai;

use llmgate_provider_core::AdapterRegistry;

pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

/// Register every builtin adapter.
pub fn register_builtin_adapters(registry: &mut AdapterRegistry) {
    registry.register(std::sync::Arc::new(OpenAiAdapter::new()));
    registry.register(std::sync::Arc::new(GeminiAdapter::new()));
}
