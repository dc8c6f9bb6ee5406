//! Text strategy — the free-text line convention.
//!
//! Each iteration issues a completion request whose system instructions
//! define the `THOUGHT:` / `ACTION:` / `FINAL:` line convention; the raw
//! text response is handed to the action parser. This mode must tolerate
//! providers that prefix tool identifiers with a namespace
//! (`functions.math`); the grammar captures the qualified name whole and
//! the executor strips recognized prefixes before lookup.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use cogwork_core::context::ExecContext;
use cogwork_core::error::Error;
use cogwork_core::message::Message;
use cogwork_core::service::{CompletionRequest, CompletionService, ToolChoice};
use cogwork_core::step::{Step, Transcript};
use cogwork_core::tool::ToolRegistry;

use crate::config::ExecutionMode;
use crate::parser::{self, ParsedLine, ACTION_KEYWORD, FINAL_KEYWORD, THOUGHT_KEYWORD};
use crate::strategy::{NextStep, Strategy};

/// The Text execution strategy.
pub struct TextStrategy {
    service: Arc<dyn CompletionService>,
    registry: Arc<ToolRegistry>,
    tool_choice: ToolChoice,
}

impl TextStrategy {
    pub fn new(
        service: Arc<dyn CompletionService>,
        registry: Arc<ToolRegistry>,
        tool_choice: ToolChoice,
    ) -> Self {
        Self {
            service,
            registry,
            tool_choice,
        }
    }

    /// System instructions defining the line convention, with one line per
    /// available tool. With `ToolChoice::None` the tool listing (and the
    /// `ACTION` form) is withheld.
    fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are a reasoning agent that solves tasks step by step.\n\
             Respond with exactly one line per turn, in one of these forms:\n\
             THOUGHT: <your reasoning about what to do next>\n",
        );

        let offer_tools = self.tool_choice != ToolChoice::None && !self.registry.is_empty();
        if offer_tools {
            prompt.push_str("ACTION: <tool_name>(<param=\"value\", ...>)\n");
        }
        prompt.push_str("FINAL: <your answer to the task>\n");

        if offer_tools {
            prompt.push_str("\nAvailable tools:\n");
            for name in self.registry.names() {
                if let Some(desc) = self.registry.descriptor(name) {
                    let params: Vec<String> = desc
                        .parameters
                        .iter()
                        .map(|(p, spec)| {
                            if spec.required {
                                p.clone()
                            } else {
                                format!("{p}?")
                            }
                        })
                        .collect();
                    prompt.push_str(&format!(
                        "- {}({}): {}\n",
                        name,
                        params.join(", "),
                        desc.description
                    ));
                }
            }
            prompt.push_str(
                "\nAfter an ACTION you will receive an OBSERVATION with the result. \
                 Use FINAL only when you can answer the task.",
            );
        }

        prompt
    }

    /// Render the transcript as alternating turns: the model's own
    /// thought/action lines as assistant messages, observations as user
    /// messages.
    fn render_messages(&self, task: &str, transcript: &Transcript) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_prompt()), Message::user(task)];
        for entry in transcript.entries() {
            match &entry.step {
                Step::Thought { text } => {
                    messages.push(Message::assistant(format!("{THOUGHT_KEYWORD} {text}")));
                }
                Step::Action { tool, arguments } => {
                    messages.push(Message::assistant(format!(
                        "{ACTION_KEYWORD} {tool}({arguments})"
                    )));
                }
                Step::Observation {
                    tool,
                    output,
                    is_error,
                } => {
                    let line = if *is_error {
                        format!("OBSERVATION (error from {tool}): {output}")
                    } else {
                        format!("OBSERVATION ({tool}): {output}")
                    };
                    messages.push(Message::user(line));
                }
                Step::Final { .. } => {}
            }
        }
        messages
    }
}

#[async_trait]
impl Strategy for TextStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Text
    }

    async fn next_step(
        &self,
        task: &str,
        transcript: &Transcript,
        ctx: &ExecContext,
    ) -> Result<NextStep, Error> {
        let request = CompletionRequest {
            messages: self.render_messages(task, transcript),
            // No structured callables in text mode; the convention lives
            // in the system instructions.
            tools: Vec::new(),
            tool_choice: self.tool_choice,
        };

        let turn = self.service.complete(request, ctx).await?;
        debug!(
            chars = turn.message.content.len(),
            "text strategy received model turn"
        );
        Ok(NextStep {
            step: decode_content(&turn.message.content)?,
            usage: turn.usage,
        })
    }
}

/// Decode a raw text response into exactly one step.
///
/// Precedence mirrors native mode: a `FINAL` line wins over everything
/// else in the same response, then the first `ACTION` line, then the
/// first `THOUGHT` line. A response with no convention lines at all is
/// taken as a plain final answer.
pub fn decode_content(content: &str) -> Result<Step, Error> {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    for line in &lines {
        if line.starts_with(FINAL_KEYWORD) {
            if let ParsedLine::Final(answer) = parser::parse_line(line) {
                return Ok(Step::Final {
                    answer,
                    confidence: None,
                });
            }
        }
    }

    for line in &lines {
        if line.starts_with(ACTION_KEYWORD) {
            return match parser::parse_line(line) {
                ParsedLine::Action { name, arguments } => Ok(Step::Action {
                    tool: name,
                    arguments,
                }),
                ParsedLine::Unparseable(reason) => Err(Error::Parse(reason)),
                // parse_line on an ACTION-prefixed line only returns
                // Action or Unparseable.
                other => Err(Error::Parse(format!(
                    "unexpected parse of action line: {other:?}"
                ))),
            };
        }
    }

    for line in &lines {
        if line.starts_with(THOUGHT_KEYWORD) {
            if let ParsedLine::Thought(text) = parser::parse_line(line) {
                return Ok(Step::Thought { text });
            }
        }
    }

    Ok(Step::Final {
        answer: content.trim().to_string(),
        confidence: None,
    })
}
