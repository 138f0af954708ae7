use crate::session::ToolCall;

const OPEN_THOUGHT: &str = "<THOUGHT>";
const CLOSE_THOUGHT: &str = "</THOUGHT>";
const OPEN_ACTION: &str = "<ACTION>";
const CLOSE_ACTION: &str = "</ACTION>";
const OPEN_FINAL: &str = "<FINAL_ANSWER>";
const CLOSE_FINAL: &str = "</FINAL_ANSWER>";

// Longest open tag; the text state holds back this many bytes minus one in
// case a tag straddles two chunks.
const MAX_OPEN_LEN: usize = OPEN_FINAL.len();

/// Incremental parse output. Thought and final-answer content arrives as
/// deltas so the engine can re-stream it; action bodies are only useful
/// whole.
#[derive(Debug, Clone, PartialEq)]
pub enum TagEvent {
    ThoughtDelta(String),
    ThoughtEnd,
    FinalDelta(String),
    FinalEnd,
    ActionRaw(String),
}

/// What one reasoning step resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Final { answer: String },
    Action { thought: String, call: ToolCall },
    /// Empty `<ACTION>`: a deliberate reflective pause, not an error.
    Pause { thought: String },
    Unparsable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    Thought,
    Action,
    Final,
}

/// Streaming parser for the `<THOUGHT>`/`<ACTION>`/`<FINAL_ANSWER>` tag
/// vocabulary. Feed chunks with `push`, then `finish` once the model
/// stream ends; content outside any tag is discarded.
#[derive(Debug)]
pub struct TagStreamParser {
    buffer: String,
    state: State,
    action_buf: String,
}

impl Default for TagStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TagStreamParser {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            state: State::Text,
            action_buf: String::new(),
        }
    }

    pub fn push(&mut self, chunk: &str) -> Vec<TagEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        loop {
            let progressed = match self.state {
                State::Text => self.scan_text(),
                State::Thought => self.scan_section(
                    CLOSE_THOUGHT,
                    &mut events,
                    Section::Thought,
                ),
                State::Action => self.scan_section(CLOSE_ACTION, &mut events, Section::Action),
                State::Final => self.scan_section(CLOSE_FINAL, &mut events, Section::Final),
            };
            if !progressed {
                break;
            }
        }
        events
    }

    /// Flush after end-of-stream. Unterminated thought/final sections are
    /// closed leniently; an unterminated action is dropped (the step will
    /// resolve to `Unparsable`).
    pub fn finish(&mut self) -> Vec<TagEvent> {
        let mut events = Vec::new();
        match self.state {
            State::Text => {}
            State::Thought => {
                if !self.buffer.is_empty() {
                    events.push(TagEvent::ThoughtDelta(std::mem::take(&mut self.buffer)));
                }
                events.push(TagEvent::ThoughtEnd);
            }
            State::Final => {
                if !self.buffer.is_empty() {
                    events.push(TagEvent::FinalDelta(std::mem::take(&mut self.buffer)));
                }
                events.push(TagEvent::FinalEnd);
            }
            State::Action => {
                self.action_buf.clear();
            }
        }
        self.buffer.clear();
        self.state = State::Text;
        events
    }

    fn scan_text(&mut self) -> bool {
        let next_open = [
            (OPEN_THOUGHT, State::Thought),
            (OPEN_ACTION, State::Action),
            (OPEN_FINAL, State::Final),
        ]
        .iter()
        .filter_map(|(tag, state)| self.buffer.find(tag).map(|at| (at, tag.len(), *state)))
        .min_by_key(|(at, _, _)| *at);

        match next_open {
            Some((at, tag_len, state)) => {
                self.buffer.drain(..at + tag_len);
                self.state = state;
                true
            }
            None => {
                let hold = MAX_OPEN_LEN - 1;
                if self.buffer.len() > hold {
                    let cut = boundary_at_most(&self.buffer, self.buffer.len() - hold);
                    self.buffer.drain(..cut);
                }
                false
            }
        }
    }

    fn scan_section(
        &mut self,
        close_tag: &str,
        events: &mut Vec<TagEvent>,
        section: Section,
    ) -> bool {
        match self.buffer.find(close_tag) {
            Some(at) => {
                let content: String = self.buffer.drain(..at).collect();
                self.buffer.drain(..close_tag.len());
                match section {
                    Section::Thought => {
                        if !content.is_empty() {
                            events.push(TagEvent::ThoughtDelta(content));
                        }
                        events.push(TagEvent::ThoughtEnd);
                    }
                    Section::Final => {
                        if !content.is_empty() {
                            events.push(TagEvent::FinalDelta(content));
                        }
                        events.push(TagEvent::FinalEnd);
                    }
                    Section::Action => {
                        self.action_buf.push_str(&content);
                        events.push(TagEvent::ActionRaw(std::mem::take(&mut self.action_buf)));
                    }
                }
                self.state = State::Text;
                true
            }
            None => {
                // Emit/stash everything except a tail that could be the
                // start of the close tag.
                let hold = close_tag.len() - 1;
                if self.buffer.len() > hold {
                    let cut = boundary_at_most(&self.buffer, self.buffer.len() - hold);
                    if cut > 0 {
                        let content: String = self.buffer.drain(..cut).collect();
                        match section {
                            Section::Thought => events.push(TagEvent::ThoughtDelta(content)),
                            Section::Final => events.push(TagEvent::FinalDelta(content)),
                            Section::Action => self.action_buf.push_str(&content),
                        }
                    }
                }
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Thought,
    Action,
    Final,
}

fn boundary_at_most(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Folds parse events into the step's outcome while the engine re-streams
/// the deltas.
#[derive(Debug, Default)]
pub struct StepAccumulator {
    thought: String,
    final_answer: String,
    saw_final_end: bool,
    action_raw: Option<String>,
}

impl StepAccumulator {
    pub fn absorb(&mut self, event: &TagEvent) {
        match event {
            TagEvent::ThoughtDelta(delta) => self.thought.push_str(delta),
            TagEvent::ThoughtEnd => {}
            TagEvent::FinalDelta(delta) => self.final_answer.push_str(delta),
            TagEvent::FinalEnd => self.saw_final_end = true,
            TagEvent::ActionRaw(raw) => self.action_raw = Some(raw.clone()),
        }
    }

    pub fn outcome(self) -> StepOutcome {
        if self.saw_final_end {
            return StepOutcome::Final {
                answer: self.final_answer,
            };
        }
        match self.action_raw {
            Some(raw) if raw.trim().is_empty() => StepOutcome::Pause {
                thought: self.thought,
            },
            Some(raw) => match serde_json::from_str::<ToolCall>(raw.trim()) {
                Ok(call) => StepOutcome::Action {
                    thought: self.thought,
                    call,
                },
                Err(_) => StepOutcome::Unparsable,
            },
            None => StepOutcome::Unparsable,
        }
    }
}
