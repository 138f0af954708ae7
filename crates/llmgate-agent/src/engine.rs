use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::Instrument;

use llmgate_common::TypewriterMode;
use llmgate_provider_core::{ChatMessage, ChatRequest};

use crate::backend::{BackendError, ChatBackend};
use crate::bus::SessionBus;
use crate::events::{AgentEvent, SessionErrorKind};
use crate::parse::{StepAccumulator, StepOutcome, TagEvent, TagStreamParser};
use crate::prompt::{PatternSet, PromptInputs, build_system_prompt};
use crate::queue::{TaskEnvelope, TaskQueue};
use crate::session::{Scratchpad, SessionPhase, ToolCall};
use crate::tools::ToolInvoker;

#[derive(Clone)]
pub struct EngineConfig {
    pub max_steps: u32,
    pub tool_timeout: Duration,
    pub typewriter: TypewriterMode,
    pub server_system_instruction: Option<String>,
    pub server_manifests: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 12,
            tool_timeout: Duration::from_secs(300),
            typewriter: TypewriterMode::Proxy,
            server_system_instruction: None,
            server_manifests: Vec::new(),
        }
    }
}

/// Worker-pool driven iterative agent. A single worker owns a session from
/// dequeue to terminal event; all output flows through the session bus.
pub struct ReasoningEngine {
    backend: Arc<dyn ChatBackend>,
    tools: Arc<dyn ToolInvoker>,
    bus: Arc<SessionBus>,
    patterns: Arc<PatternSet>,
    config: EngineConfig,
}

impl ReasoningEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        tools: Arc<dyn ToolInvoker>,
        bus: Arc<SessionBus>,
        patterns: Arc<PatternSet>,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            tools,
            bus,
            patterns,
            config,
        }
    }

    pub fn bus(&self) -> &Arc<SessionBus> {
        &self.bus
    }

    /// Spawn `count` competing workers over the task queue.
    pub fn spawn_workers(self: &Arc<Self>, queue: Arc<TaskQueue>, count: usize) {
        for worker_id in 0..count {
            let engine = self.clone();
            let queue = queue.clone();
            tokio::spawn(async move {
                tracing::info!(worker_id, "reasoning worker started");
                while let Some(task) = queue.dequeue().await {
                    let span = tracing::info_span!(
                        "reasoning_session",
                        worker_id,
                        session_id = %task.session_id,
                        trace_id = task.trace_id.as_deref().unwrap_or(""),
                    );
                    engine.run_session(task).instrument(span).await;
                    // Terminal event published: the task is done for good.
                    queue.ack();
                }
                tracing::info!(worker_id, "reasoning worker stopped");
            });
        }
    }

    /// Drive one session to its terminal event, then drop its channel.
    pub async fn run_session(&self, task: TaskEnvelope) {
        let session_id = task.session_id.clone();
        self.drive(&task).await;
        self.bus.close(&session_id).await;
    }

    async fn drive(&self, task: &TaskEnvelope) {
        let session_id = task.session_id.as_str();
        self.bus
            .publish(
                session_id,
                AgentEvent::WorkerAck {
                    session_id: session_id.to_string(),
                },
            )
            .await;

        let Some(pattern_name) = task.reasoning_mode.as_deref() else {
            self.fail(
                session_id,
                SessionErrorKind::UnknownPattern,
                "no reasoning pattern configured for this alias",
            )
            .await;
            return;
        };
        let Some(pattern) = self.patterns.get(pattern_name) else {
            self.fail(
                session_id,
                SessionErrorKind::UnknownPattern,
                &format!("unknown reasoning pattern: {pattern_name}"),
            )
            .await;
            return;
        };

        // A dead tool gateway degrades the session to tool-less reasoning
        // instead of failing it.
        let descriptors = match self.tools.descriptors().await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                tracing::warn!(session_id, %err, "tool metadata unavailable");
                Vec::new()
            }
        };

        let framework = pattern.render(&descriptors);
        let system_prompt = build_system_prompt(&PromptInputs {
            pattern_prompt: &framework,
            client_system_instruction: task.client_system_instruction.as_deref(),
            client_manifests: &task.client_manifests,
            server_system_instruction: self.config.server_system_instruction.as_deref(),
            server_manifests: &self.config.server_manifests,
        });

        let mut scratchpad = Scratchpad::new();
        let mut phase = SessionPhase::Planning;

        for step in 0..self.config.max_steps {
            tracing::debug!(session_id, step, ?phase, "reasoning step");

            let request = ChatRequest {
                model: task.alias.clone(),
                messages: transcript(&system_prompt, &task.user_query, &scratchpad),
                stream: None,
                temperature: None,
                max_tokens: None,
                extra: serde_json::Map::new(),
            };

            let text = match self
                .backend
                .complete(task.trace_id.as_deref(), request)
                .await
            {
                Ok(text) => text,
                Err(BackendError::Unavailable) => {
                    self.fail(
                        session_id,
                        SessionErrorKind::LlmUnavailable,
                        "all providers in the chain are exhausted",
                    )
                    .await;
                    return;
                }
                Err(err) => {
                    self.fail(session_id, SessionErrorKind::LlmUnavailable, &err.to_string())
                        .await;
                    return;
                }
            };

            let mut parser = TagStreamParser::new();
            let mut accumulator = StepAccumulator::default();
            let mut events = parser.push(&text);
            events.extend(parser.finish());
            for event in &events {
                accumulator.absorb(event);
                match event {
                    TagEvent::ThoughtDelta(delta) => {
                        self.stream_text(session_id, delta, StreamKind::Thought).await;
                    }
                    TagEvent::ThoughtEnd => {
                        self.bus.publish(session_id, AgentEvent::ThoughtEnd {}).await;
                    }
                    TagEvent::FinalDelta(delta) => {
                        self.stream_text(session_id, delta, StreamKind::Final).await;
                    }
                    TagEvent::FinalEnd | TagEvent::ActionRaw(_) => {}
                }
            }

            match accumulator.outcome() {
                StepOutcome::Final { .. } => {
                    phase = SessionPhase::Synthesizing;
                    tracing::debug!(session_id, step, ?phase, "final answer streamed");
                    self.bus
                        .publish(session_id, AgentEvent::FinalAnswerStreamEnd {})
                        .await;
                    phase = SessionPhase::Done;
                    tracing::info!(session_id, steps = step + 1, ?phase, "session done");
                    return;
                }
                StepOutcome::Action { thought, call } => {
                    phase = SessionPhase::Acting;
                    tracing::debug!(session_id, step, ?phase, tool = %call.tool_name, "invoking tool");
                    let observation = self.call_tool(session_id, &call).await;
                    phase = SessionPhase::Observing;
                    scratchpad.push(step, thought, Some(call.clone()), Some(observation));
                    self.bus
                        .publish(
                            session_id,
                            AgentEvent::ToolCallEnd {
                                tool_name: call.tool_name,
                            },
                        )
                        .await;
                }
                StepOutcome::Pause { thought } => {
                    // Reflective pause: the thought goes on record, no tool
                    // runs, the loop continues.
                    scratchpad.push(step, thought, None, None);
                }
                StepOutcome::Unparsable => {
                    self.fail(
                        session_id,
                        SessionErrorKind::ParseFailure,
                        "model output had neither a parsable action nor a final answer",
                    )
                    .await;
                    return;
                }
            }
        }

        self.fail(
            session_id,
            SessionErrorKind::StepLimitExceeded,
            &format!("no final answer after {} steps", self.config.max_steps),
        )
        .await;
    }

    async fn call_tool(&self, session_id: &str, call: &ToolCall) -> Value {
        self.bus
            .publish(
                session_id,
                AgentEvent::ToolCallStart {
                    tool_name: call.tool_name.clone(),
                    arguments: call.arguments.clone(),
                },
            )
            .await;

        let invoked = tokio::time::timeout(
            self.config.tool_timeout,
            self.tools.invoke(&call.tool_name, &call.arguments),
        )
        .await;
        // Tool failures are observations, never session failures.
        let observation = match invoked {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                tracing::warn!(session_id, tool = %call.tool_name, %err, "tool call failed");
                json!({ "error": err.status, "detail": err.detail })
            }
            Err(_) => {
                tracing::warn!(session_id, tool = %call.tool_name, "tool call timed out");
                json!({ "error": 504, "detail": "tool call timed out" })
            }
        };

        self.bus
            .publish(
                session_id,
                AgentEvent::Observation {
                    content: observation.clone(),
                },
            )
            .await;
        observation
    }

    async fn stream_text(&self, session_id: &str, text: &str, kind: StreamKind) {
        match self.config.typewriter {
            TypewriterMode::Proxy => {
                for ch in text.chars() {
                    self.bus
                        .publish(session_id, kind.event(ch.to_string()))
                        .await;
                }
            }
            TypewriterMode::Client => {
                self.bus
                    .publish(session_id, kind.event(text.to_string()))
                    .await;
            }
        }
    }

    async fn fail(&self, session_id: &str, kind: SessionErrorKind, message: &str) {
        tracing::warn!(
            session_id,
            ?kind,
            message,
            phase = ?SessionPhase::Failed,
            "session failed"
        );
        self.bus
            .publish(
                session_id,
                AgentEvent::Error {
                    kind,
                    message: message.to_string(),
                },
            )
            .await;
    }
}

#[derive(Clone, Copy)]
enum StreamKind {
    Thought,
    Final,
}

impl StreamKind {
    fn event(self, text: String) -> AgentEvent {
        match self {
            StreamKind::Thought => AgentEvent::ThoughtStream { text },
            StreamKind::Final => AgentEvent::FinalAnswerStream { text },
        }
    }
}

/// Render the conversation for the next LLM call: system prompt, the user
/// query, then one assistant/user exchange per completed step.
fn transcript(system_prompt: &str, user_query: &str, scratchpad: &Scratchpad) -> Vec<ChatMessage> {
    let mut messages = vec![
        ChatMessage::new("system", system_prompt),
        ChatMessage::new("user", user_query),
    ];
    for entry in scratchpad.entries() {
        let action = entry
            .action
            .as_ref()
            .and_then(|call| serde_json::to_string(call).ok())
            .unwrap_or_default();
        messages.push(ChatMessage::new(
            "assistant",
            format!("<THOUGHT>{}</THOUGHT><ACTION>{action}</ACTION>", entry.thought),
        ));
        if let Some(observation) = &entry.observation {
            messages.push(ChatMessage::new(
                "user",
                format!("<OBSERVATION>{observation}</OBSERVATION>"),
            ));
        }
    }
    messages
}
