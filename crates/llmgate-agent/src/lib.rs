//! Reasoning sessions: worker pool, iterative agent loop, session event
//! bus and the SSE delivery bridge.

pub mod backend;
pub mod bus;
pub mod engine;
pub mod events;
pub mod parse;
pub mod prompt;
pub mod queue;
pub mod session;
pub mod sse;
pub mod tools;

pub use backend::{BackendError, ChatBackend, RouterChatBackend};
pub use bus::SessionBus;
pub use engine::{EngineConfig, ReasoningEngine};
pub use events::{AgentEvent, SessionErrorKind};
pub use parse::{StepAccumulator, StepOutcome, TagEvent, TagStreamParser};
pub use prompt::{
    PatternError, PatternSet, PromptInputs, ReasoningPattern, build_system_prompt,
    load_server_prompts,
};
pub use queue::{TaskEnvelope, TaskQueue};
pub use session::{Scratchpad, ScratchpadEntry, SessionPhase, ToolCall};
pub use sse::{HANDSHAKE_TIMEOUT, SseBridge, StreamError, frame};
pub use tools::{HttpToolGateway, ToolError, ToolInvoker};
