use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::Mutex;

use llmgate_agent::{
    AgentEvent, BackendError, ChatBackend, EngineConfig, PatternSet, ReasoningEngine,
    ReasoningPattern, SessionBus, SessionErrorKind, TaskEnvelope, ToolError, ToolInvoker,
};
use llmgate_common::{ToolDescriptor, ToolParam, TypewriterMode};
use llmgate_provider_core::ChatRequest;

struct ScriptedBackend {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedBackend {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        })
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(
        &self,
        _trace_id: Option<&str>,
        _req: ChatRequest,
    ) -> Result<String, BackendError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .ok_or(BackendError::Unavailable)
    }
}

struct ScriptedTools {
    /// Error statuses to return before succeeding.
    failures: Mutex<VecDeque<u16>>,
    result: Value,
}

impl ScriptedTools {
    fn ok(result: Value) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(VecDeque::new()),
            result,
        })
    }

    fn failing_first(status: u16, result: Value) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(VecDeque::from([status])),
            result,
        })
    }
}

#[async_trait]
impl ToolInvoker for ScriptedTools {
    async fn descriptors(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(vec![ToolDescriptor {
            name: "web_search".into(),
            summary: "Search the web.".into(),
            parameters: vec![ToolParam {
                name: "query".into(),
                semantic_type: "string".into(),
                required: true,
                description: "Search terms.".into(),
            }],
        }])
    }

    async fn invoke(&self, _tool_name: &str, _arguments: &Value) -> Result<Value, ToolError> {
        if let Some(status) = self.failures.lock().await.pop_front() {
            return Err(ToolError {
                status,
                detail: "upstream tool broke".into(),
            });
        }
        Ok(self.result.clone())
    }
}

fn task(session_id: &str) -> TaskEnvelope {
    TaskEnvelope {
        session_id: session_id.into(),
        alias: "agent".into(),
        user_query: "capital of France and weather there".into(),
        client_system_instruction: None,
        client_manifests: Vec::new(),
        safety_flags: Vec::new(),
        reasoning_mode: Some("basic_react".into()),
        trace_id: Some("trace-1".into()),
        enqueued_at: OffsetDateTime::now_utc(),
    }
}

fn patterns() -> Arc<PatternSet> {
    Arc::new(PatternSet::from_patterns([ReasoningPattern::new(
        "basic_react",
        "Think, then act.\n{{TOOLS}}",
    )]))
}

fn engine(
    backend: Arc<dyn ChatBackend>,
    tools: Arc<dyn ToolInvoker>,
    bus: Arc<SessionBus>,
    max_steps: u32,
) -> ReasoningEngine {
    ReasoningEngine::new(
        backend,
        tools,
        bus,
        patterns(),
        EngineConfig {
            max_steps,
            tool_timeout: Duration::from_secs(5),
            // Whole-chunk events keep the assertions readable.
            typewriter: TypewriterMode::Client,
            server_system_instruction: Some("server rules".into()),
            server_manifests: Vec::new(),
        },
    )
}

async fn run_and_collect(
    backend: Arc<dyn ChatBackend>,
    tools: Arc<dyn ToolInvoker>,
    task: TaskEnvelope,
    max_steps: u32,
) -> Vec<AgentEvent> {
    let bus = Arc::new(SessionBus::new());
    let mut rx = bus.subscribe(&task.session_id).await;
    let engine = engine(backend, tools, bus.clone(), max_steps);
    engine.run_session(task).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn full_session_emits_events_in_order() {
    let backend = ScriptedBackend::new(&[
        "<THOUGHT>I should look this up.</THOUGHT><ACTION>{\"tool_name\":\"web_search\",\"arguments\":{\"query\":\"capital of France\"}}</ACTION>",
        "<THOUGHT>Now I can answer.</THOUGHT><FINAL_ANSWER>Paris; sunny, 21°C.</FINAL_ANSWER>",
    ]);
    let tools = ScriptedTools::ok(json!({"top_result": "Paris is the capital of France"}));

    let events = run_and_collect(backend, tools, task("s-ok"), 12).await;

    assert!(matches!(&events[0], AgentEvent::WorkerAck { session_id } if session_id == "s-ok"));
    assert!(matches!(
        &events[1],
        AgentEvent::ThoughtStream { text } if text == "I should look this up."
    ));
    assert!(matches!(&events[2], AgentEvent::ThoughtEnd {}));
    assert!(matches!(
        &events[3],
        AgentEvent::ToolCallStart { tool_name, arguments }
            if tool_name == "web_search" && arguments["query"] == "capital of France"
    ));
    assert!(matches!(
        &events[4],
        AgentEvent::Observation { content } if content["top_result"].is_string()
    ));
    assert!(matches!(
        &events[5],
        AgentEvent::ToolCallEnd { tool_name } if tool_name == "web_search"
    ));
    assert!(matches!(&events[6], AgentEvent::ThoughtStream { .. }));
    assert!(matches!(&events[7], AgentEvent::ThoughtEnd {}));
    assert!(matches!(
        &events[8],
        AgentEvent::FinalAnswerStream { text } if text == "Paris; sunny, 21°C."
    ));
    assert!(matches!(&events[9], AgentEvent::FinalAnswerStreamEnd {}));
    assert_eq!(events.len(), 10);
}

#[tokio::test]
async fn tool_error_becomes_observation_and_session_completes() {
    let backend = ScriptedBackend::new(&[
        "<THOUGHT>search</THOUGHT><ACTION>{\"tool_name\":\"web_search\",\"arguments\":{\"query\":\"x\"}}</ACTION>",
        "<THOUGHT>retry</THOUGHT><ACTION>{\"tool_name\":\"web_search\",\"arguments\":{\"query\":\"x\"}}</ACTION>",
        "<FINAL_ANSWER>best effort answer</FINAL_ANSWER>",
    ]);
    let tools = ScriptedTools::failing_first(500, json!({"ok": true}));

    let events = run_and_collect(backend, tools, task("s-toolerr"), 12).await;

    let observations: Vec<&Value> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::Observation { content } => Some(content),
            _ => None,
        })
        .collect();
    assert_eq!(observations.len(), 2);
    assert_eq!(observations[0]["error"], json!(500));
    assert!(observations[0]["detail"].is_string());
    assert_eq!(observations[1]["ok"], json!(true));

    assert!(matches!(
        events.last().unwrap(),
        AgentEvent::FinalAnswerStreamEnd {}
    ));
}

#[tokio::test]
async fn empty_action_pauses_and_loop_continues() {
    let backend = ScriptedBackend::new(&[
        "<THOUGHT>let me think more</THOUGHT><ACTION></ACTION>",
        "<FINAL_ANSWER>done</FINAL_ANSWER>",
    ]);
    let tools = ScriptedTools::ok(json!({}));

    let events = run_and_collect(backend, tools, task("s-pause"), 12).await;

    // The pause step emits the thought but neither tool events nor errors.
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, AgentEvent::ToolCallStart { .. }))
    );
    assert!(events.iter().all(|e| !matches!(e, AgentEvent::Error { .. })));
    assert!(matches!(
        events.last().unwrap(),
        AgentEvent::FinalAnswerStreamEnd {}
    ));
}

#[tokio::test]
async fn untagged_output_fails_with_parse_failure() {
    let backend = ScriptedBackend::new(&["The capital is Paris."]);
    let tools = ScriptedTools::ok(json!({}));

    let events = run_and_collect(backend, tools, task("s-parse"), 12).await;
    assert!(matches!(
        events.last().unwrap(),
        AgentEvent::Error {
            kind: SessionErrorKind::ParseFailure,
            ..
        }
    ));
}

#[tokio::test]
async fn step_limit_exhaustion_emits_error() {
    let backend = ScriptedBackend::new(&[
        "<THOUGHT>a</THOUGHT><ACTION>{\"tool_name\":\"web_search\",\"arguments\":{}}</ACTION>",
        "<THOUGHT>b</THOUGHT><ACTION>{\"tool_name\":\"web_search\",\"arguments\":{}}</ACTION>",
    ]);
    let tools = ScriptedTools::ok(json!({}));

    let events = run_and_collect(backend, tools, task("s-limit"), 2).await;
    assert!(matches!(
        events.last().unwrap(),
        AgentEvent::Error {
            kind: SessionErrorKind::StepLimitExceeded,
            ..
        }
    ));
}

#[tokio::test]
async fn llm_exhaustion_emits_llm_unavailable() {
    // No scripted responses: the backend reports exhaustion immediately.
    let backend = ScriptedBackend::new(&[]);
    let tools = ScriptedTools::ok(json!({}));

    let events = run_and_collect(backend, tools, task("s-nollm"), 12).await;
    assert!(matches!(
        events.last().unwrap(),
        AgentEvent::Error {
            kind: SessionErrorKind::LlmUnavailable,
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_pattern_fails_session() {
    let backend = ScriptedBackend::new(&["<FINAL_ANSWER>unused</FINAL_ANSWER>"]);
    let tools = ScriptedTools::ok(json!({}));
    let mut bad_task = task("s-pattern");
    bad_task.reasoning_mode = Some("does_not_exist".into());

    let events = run_and_collect(backend, tools, bad_task, 12).await;
    assert!(matches!(&events[0], AgentEvent::WorkerAck { .. }));
    assert!(matches!(
        events.last().unwrap(),
        AgentEvent::Error {
            kind: SessionErrorKind::UnknownPattern,
            ..
        }
    ));
}

#[tokio::test]
async fn proxy_typewriter_streams_character_by_character() {
    let backend = ScriptedBackend::new(&["<FINAL_ANSWER>héllo</FINAL_ANSWER>"]);
    let tools = ScriptedTools::ok(json!({}));

    let bus = Arc::new(SessionBus::new());
    let t = task("s-typewriter");
    let mut rx = bus.subscribe(&t.session_id).await;
    let engine = ReasoningEngine::new(
        backend,
        tools,
        bus.clone(),
        patterns(),
        EngineConfig {
            typewriter: TypewriterMode::Proxy,
            ..EngineConfig::default()
        },
    );
    engine.run_session(t).await;

    let mut chunks = Vec::new();
    while let Some(event) = rx.recv().await {
        if let AgentEvent::FinalAnswerStream { text } = event {
            chunks.push(text);
        }
    }
    // One event per character, multibyte included, reassembling verbatim.
    assert_eq!(chunks.len(), "héllo".chars().count());
    assert!(chunks.iter().all(|c| c.chars().count() == 1));
    assert_eq!(chunks.concat(), "héllo");
}
