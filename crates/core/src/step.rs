//! Steps and the transcript — the record of one loop execution.
//!
//! A `Transcript` is the ordered, append-only sequence of every step the
//! engine produced while working on one task: the model's reasoning, the
//! tools it invoked, what those tools returned, and the final answer. It is
//! owned exclusively by one loop execution and never shared across
//! concurrent runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of loop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Intermediate reasoning emitted by the model.
    Thought { text: String },

    /// A request to invoke a registered tool.
    Action {
        tool: String,
        arguments: serde_json::Value,
    },

    /// The result (or error) produced by executing a requested tool.
    Observation {
        tool: String,
        output: String,
        is_error: bool,
    },

    /// The final answer. Always the last step of a transcript.
    Final {
        answer: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
    },
}

/// Discriminant-only view of a [`Step`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepKind {
    Thought,
    Action,
    Observation,
    Final,
}

impl Step {
    /// The kind of this step.
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Thought { .. } => StepKind::Thought,
            Step::Action { .. } => StepKind::Action,
            Step::Observation { .. } => StepKind::Observation,
            Step::Final { .. } => StepKind::Final,
        }
    }

    /// Uppercase label used in text-mode transcripts and diagnostics.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            StepKind::Thought => "THOUGHT",
            StepKind::Action => "ACTION",
            StepKind::Observation => "OBSERVATION",
            StepKind::Final => "FINAL",
        }
    }
}

/// A step plus the moment it was appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEntry {
    pub step: Step,
    pub timestamp: DateTime<Utc>,
}

/// The enumerated cause for ending a loop execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// A final answer was produced.
    Success,
    /// The iteration budget ran out before a final answer.
    Exhausted,
    /// The deadline elapsed or the run was cancelled mid-flight.
    TimedOut,
    /// An unrecoverable error ended the run.
    Fatal,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TerminationReason::Success => "success",
            TerminationReason::Exhausted => "exhausted",
            TerminationReason::TimedOut => "timed_out",
            TerminationReason::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

/// Ordered, append-only record of all steps in one loop execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<StepEntry>,
}

impl Transcript {
    /// Create a new empty transcript.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a step, stamped with the current time.
    pub fn push(&mut self, step: Step) {
        self.entries.push(StepEntry {
            step,
            timestamp: Utc::now(),
        });
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[StepEntry] {
        &self.entries
    }

    /// Number of steps recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently appended step.
    pub fn last(&self) -> Option<&Step> {
        self.entries.last().map(|e| &e.step)
    }

    /// Whether a final answer has been recorded. When it has, it is the
    /// last entry and nothing may be appended after it.
    pub fn is_final(&self) -> bool {
        matches!(self.last(), Some(Step::Final { .. }))
    }

    /// The outstanding `Action` that has not yet received its
    /// `Observation`, if any. At most one can be pending.
    pub fn pending_action(&self) -> Option<&Step> {
        match self.last() {
            Some(step @ Step::Action { .. }) => Some(step),
            _ => None,
        }
    }

    /// The final answer, if the transcript ended in one.
    pub fn final_answer(&self) -> Option<(&str, Option<f32>)> {
        match self.last() {
            Some(Step::Final { answer, confidence }) => Some((answer.as_str(), *confidence)),
            _ => None,
        }
    }

    /// Count steps of a given kind.
    pub fn count(&self, kind: StepKind) -> usize {
        self.entries.iter().filter(|e| e.step.kind() == kind).count()
    }

    /// Render the transcript as labelled lines, one step per line.
    /// Used for diagnostics and the text-mode prompt.
    pub fn render_lines(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match &entry.step {
                Step::Thought { text } => {
                    out.push_str(&format!("THOUGHT: {text}\n"));
                }
                Step::Action { tool, arguments } => {
                    out.push_str(&format!("ACTION: {tool}({arguments})\n"));
                }
                Step::Observation {
                    tool,
                    output,
                    is_error,
                } => {
                    if *is_error {
                        out.push_str(&format!("OBSERVATION (error from {tool}): {output}\n"));
                    } else {
                        out.push_str(&format!("OBSERVATION ({tool}): {output}\n"));
                    }
                }
                Step::Final { answer, .. } => {
                    out.push_str(&format!("FINAL: {answer}\n"));
                }
            }
        }
        out
    }

    /// One-line summary of transcript state, for fatal-error messages.
    pub fn diagnostic(&self) -> String {
        let mut summary = format!(
            "{} steps ({} thoughts, {} actions, {} observations)",
            self.len(),
            self.count(StepKind::Thought),
            self.count(StepKind::Action),
            self.count(StepKind::Observation),
        );
        if let Some(step) = self.last() {
            let detail = match step {
                Step::Thought { text } => text.clone(),
                Step::Action { tool, .. } => tool.clone(),
                Step::Observation { tool, output, .. } => format!("{tool}: {output}"),
                Step::Final { answer, .. } => answer.clone(),
            };
            let detail: String = detail.chars().take(120).collect();
            summary.push_str(&format!("; last: {} {}", step.label(), detail));
        }
        summary
    }
}
