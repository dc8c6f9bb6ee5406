//! Execution results and the aggregation of loop state into them.

use serde::{Deserialize, Serialize};

use cogwork_core::service::Usage;
use cogwork_core::step::{TerminationReason, Transcript};

/// The outcome of one loop execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The final answer. Populated only on `Success`.
    pub final_answer: Option<String>,

    /// Model-reported confidence in the final answer, when given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// Iterations consumed (tool dispatches and degraded failures).
    pub iterations_used: u32,

    /// Total tool invocations, successful and failed.
    pub tool_call_count: usize,

    /// Whether the run produced a final answer.
    pub success: bool,

    /// Why the run ended.
    pub termination_reason: TerminationReason,

    /// The full transcript as built up to termination. On timeout or
    /// fatal error this is the partial transcript, preserved for
    /// diagnostics.
    pub transcript: Transcript,

    /// Human-readable description of the fatal cause, when the run ended
    /// `Fatal`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Accumulated token usage across all completion calls, when the
    /// service reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Accumulates counters over the life of one loop execution and folds
/// them into the final result.
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    pub iterations: u32,
    pub tool_calls: usize,
    usage: Option<Usage>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one turn's token usage.
    pub fn record_usage(&mut self, usage: Option<&Usage>) {
        if let Some(delta) = usage {
            self.usage.get_or_insert_with(Usage::default).absorb(delta);
        }
    }

    /// Fold the accumulated state into an [`ExecutionResult`].
    pub fn finish(
        self,
        reason: TerminationReason,
        transcript: Transcript,
        error: Option<String>,
    ) -> ExecutionResult {
        let success = reason == TerminationReason::Success;
        let (final_answer, confidence) = if success {
            match transcript.final_answer() {
                Some((answer, confidence)) => (Some(answer.to_string()), confidence),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        ExecutionResult {
            final_answer,
            confidence,
            iterations_used: self.iterations,
            tool_call_count: self.tool_calls,
            success,
            termination_reason: reason,
            transcript,
            error,
            usage: self.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogwork_core::step::Step;

    #[test]
    fn success_populates_final_answer() {
        let mut transcript = Transcript::new();
        transcript.push(Step::Final {
            answer: "42".into(),
            confidence: Some(0.8),
        });

        let mut agg = Aggregator::new();
        agg.iterations = 2;
        agg.tool_calls = 2;
        let result = agg.finish(TerminationReason::Success, transcript, None);

        assert!(result.success);
        assert_eq!(result.final_answer.as_deref(), Some("42"));
        assert_eq!(result.confidence, Some(0.8));
        assert_eq!(result.iterations_used, 2);
        assert_eq!(result.tool_call_count, 2);
    }

    #[test]
    fn non_success_carries_no_answer_but_keeps_transcript() {
        let mut transcript = Transcript::new();
        transcript.push(Step::Thought {
            text: "working on it".into(),
        });

        let agg = Aggregator::new();
        let result = agg.finish(
            TerminationReason::TimedOut,
            transcript,
            None,
        );

        assert!(!result.success);
        assert!(result.final_answer.is_none());
        assert_eq!(result.termination_reason, TerminationReason::TimedOut);
        assert_eq!(result.transcript.len(), 1);
    }

    #[test]
    fn fatal_carries_error_message() {
        let agg = Aggregator::new();
        let result = agg.finish(
            TerminationReason::Fatal,
            Transcript::new(),
            Some("completion service unreachable".into()),
        );
        assert_eq!(result.termination_reason, TerminationReason::Fatal);
        assert!(result.error.as_deref().unwrap().contains("unreachable"));
    }

    #[test]
    fn usage_accumulates_across_turns() {
        let mut agg = Aggregator::new();
        agg.record_usage(Some(&Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }));
        agg.record_usage(None);
        agg.record_usage(Some(&Usage {
            prompt_tokens: 7,
            completion_tokens: 3,
            total_tokens: 10,
        }));
        let result = agg.finish(TerminationReason::Success, Transcript::new(), None);
        let usage = result.usage.unwrap();
        assert_eq!(usage.total_tokens, 25);
    }
}
