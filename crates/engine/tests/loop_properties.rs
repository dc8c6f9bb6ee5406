//! End-to-end loop behaviour over the built-in tools.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use cogwork_core::context::ExecContext;
use cogwork_core::error::ServiceError;
use cogwork_core::message::{Message, ModelToolCall};
use cogwork_core::service::{CompletionRequest, CompletionService, ModelTurn};
use cogwork_core::step::{Step, StepKind, TerminationReason};
use cogwork_core::tool::ToolRegistry;
use cogwork_engine::{Engine, ExecutionConfig};
use cogwork_tools::default_registry;

/// Scripted completion service: returns each queued turn once, in order.
struct ScriptedService {
    turns: Mutex<Vec<ModelTurn>>,
}

impl ScriptedService {
    fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns),
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
        _ctx: &ExecContext,
    ) -> Result<ModelTurn, ServiceError> {
        let mut turns = self.turns.lock().unwrap();
        if turns.is_empty() {
            return Err(ServiceError::Interrupted("script exhausted".into()));
        }
        Ok(turns.remove(0))
    }
}

fn text_turn(content: &str) -> ModelTurn {
    ModelTurn {
        message: Message::assistant(content),
        usage: None,
    }
}

fn call_turn(name: &str, args: serde_json::Value) -> ModelTurn {
    ModelTurn {
        message: Message::assistant("").with_tool_calls(vec![ModelToolCall::new(
            "call_1", name, &args,
        )]),
        usage: None,
    }
}

fn text_engine(turns: Vec<ModelTurn>) -> Engine {
    Engine::new(
        Arc::new(ScriptedService::new(turns)),
        Arc::new(default_registry()),
        ExecutionConfig::text(),
    )
}

#[tokio::test]
async fn namespaced_action_line_resolves_to_registered_math_tool() {
    let engine = text_engine(vec![
        text_turn(r#"ACTION: functions.math(operation="evaluate", expression="2+2")"#),
        text_turn("FINAL: The result is 4"),
    ]);

    let result = engine.ask("What is 2+2?").await.unwrap();

    assert!(result.success);
    assert_eq!(result.final_answer.as_deref(), Some("The result is 4"));

    // The qualified identifier was captured whole, the `functions` prefix
    // stripped, and the bare `math` tool invoked with both arguments.
    let (tool, output) = result
        .transcript
        .entries()
        .iter()
        .find_map(|e| match &e.step {
            Step::Observation {
                tool,
                output,
                is_error: false,
            } => Some((tool.clone(), output.clone())),
            _ => None,
        })
        .expect("successful observation present");
    assert_eq!(tool, "math");
    assert_eq!(output, "4");
}

#[tokio::test]
async fn unregistered_suffix_fails_lookup_even_with_recognized_prefix() {
    let engine = text_engine(vec![
        text_turn(r#"ACTION: functions.calculus(operation="evaluate", expression="2+2")"#),
        text_turn("FINAL: never mind"),
    ]);

    let result = engine.ask("integrate something").await.unwrap();

    assert!(result.success);
    let error_obs = result
        .transcript
        .entries()
        .iter()
        .find_map(|e| match &e.step {
            Step::Observation {
                tool,
                output,
                is_error: true,
            } => Some((tool.clone(), output.clone())),
            _ => None,
        })
        .expect("error observation present");
    assert_eq!(error_obs.0, "functions.calculus");
    assert!(error_obs.1.contains("calculus"));
}

#[tokio::test]
async fn native_flow_over_builtin_tools() {
    let engine = Engine::new(
        Arc::new(ScriptedService::new(vec![
            call_turn("think", serde_json::json!({"reasoning": "use the math tool"})),
            call_turn(
                "use_tool",
                serde_json::json!({
                    "tool_name": "math",
                    "tool_arguments": {"operation": "evaluate", "expression": "3*7"}
                }),
            ),
            call_turn("final_answer", serde_json::json!({"answer": "21", "confidence": 1.0})),
        ])),
        Arc::new(default_registry()),
        ExecutionConfig::default(),
    );

    let result = engine.ask("What is 3*7?").await.unwrap();

    assert!(result.success);
    assert_eq!(result.final_answer.as_deref(), Some("21"));
    assert_eq!(result.tool_call_count, 1);

    let kinds: Vec<StepKind> = result
        .transcript
        .entries()
        .iter()
        .map(|e| e.step.kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            StepKind::Thought,
            StepKind::Action,
            StepKind::Observation,
            StepKind::Final
        ]
    );
}

#[tokio::test]
async fn transcript_grows_monotonically_and_final_is_last() {
    let engine = text_engine(vec![
        text_turn("THOUGHT: echo twice"),
        text_turn(r#"ACTION: echo(text="hi", repeat=2)"#),
        text_turn("FINAL: hi hi"),
    ]);

    let mut rx = engine.stream("say hi twice").await.unwrap();
    let mut seen = 0usize;
    let mut last_type = "";
    while let Some(event) = rx.recv().await {
        // Each delivered event only ever extends what came before.
        seen += 1;
        last_type = event.event_type();
    }
    assert_eq!(seen, 5); // thought, action, observation, final, done
    assert_eq!(last_type, "done");
}

#[tokio::test]
async fn exhaustion_reports_partial_work_without_an_answer() {
    let turns: Vec<ModelTurn> = (0..4)
        .map(|_| text_turn(r#"ACTION: math(operation="evaluate", expression="1+1")"#))
        .collect();
    let engine = Engine::new(
        Arc::new(ScriptedService::new(turns)),
        Arc::new(default_registry()),
        ExecutionConfig::text().with_max_iterations(2),
    );

    let result = engine.ask("keep calculating").await.unwrap();

    assert!(!result.success);
    assert_eq!(result.termination_reason, TerminationReason::Exhausted);
    assert!(result.final_answer.is_none());
    assert_eq!(result.iterations_used, 2);
    assert_eq!(result.transcript.count(StepKind::Observation), 2);
}

#[tokio::test]
async fn concurrent_executions_share_the_registry_without_interference() {
    let registry = Arc::new(default_registry());
    let first = Engine::new(
        Arc::new(ScriptedService::new(vec![
            text_turn(r#"ACTION: math(operation="evaluate", expression="2+2")"#),
            text_turn("FINAL: 4"),
        ])),
        registry.clone(),
        ExecutionConfig::text(),
    );
    let second = Engine::new(
        Arc::new(ScriptedService::new(vec![
            text_turn(r#"ACTION: math(operation="evaluate", expression="5*5")"#),
            text_turn("FINAL: 25"),
        ])),
        registry,
        ExecutionConfig::text(),
    );

    let (a, b) = tokio::join!(first.ask("2+2?"), second.ask("5*5?"));
    let a = a.unwrap();
    let b = b.unwrap();

    // Private transcripts, shared read-only registry.
    assert_eq!(a.final_answer.as_deref(), Some("4"));
    assert_eq!(b.final_answer.as_deref(), Some("25"));
    assert_eq!(a.transcript.count(StepKind::Observation), 1);
    assert_eq!(b.transcript.count(StepKind::Observation), 1);
}

#[tokio::test]
async fn empty_registry_with_auto_choice_still_answers() {
    let engine = Engine::new(
        Arc::new(ScriptedService::new(vec![text_turn(
            "FINAL: no tools needed",
        )])),
        Arc::new(ToolRegistry::new()),
        ExecutionConfig::text(),
    );

    let result = engine.ask("just answer").await.unwrap();
    assert!(result.success);
    assert_eq!(result.final_answer.as_deref(), Some("no tools needed"));
}
