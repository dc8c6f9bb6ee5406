//! The loop controller — the heart of Cogwork.
//!
//! One execution moves through `Init → Reasoning → (ToolDispatch →
//! Reasoning)* → Terminated`. On each pass the controller asks the active
//! strategy for the next step: a `Final` terminates the run successfully
//! (winning over any tool intent bundled in the same turn), an `Action`
//! goes to the tool executor and its observation is appended, a `Thought`
//! is recorded and the loop asks again.
//!
//! The run ends when a final answer is produced, the iteration budget is
//! exhausted, the deadline elapses (or the caller cancels), or a fatal
//! error occurs. The transcript built so far is preserved on every path.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cogwork_core::context::ExecContext;
use cogwork_core::error::Error;
use cogwork_core::event::{EventBus, LoopEvent};
use cogwork_core::service::CompletionService;
use cogwork_core::step::{Step, TerminationReason, Transcript};
use cogwork_core::tool::ToolRegistry;

use crate::config::ExecutionConfig;
use crate::executor::ToolExecutor;
use crate::result::{Aggregator, ExecutionResult};
use crate::strategy;
use crate::stream_event::StepEvent;
use crate::validator;

/// Observation source name used when a degraded failure did not come from
/// a tool (e.g. an unparseable action line).
const PARSER_SOURCE: &str = "action_parser";

/// The reasoning-and-tool-execution engine.
///
/// One `Engine` may serve many concurrent executions: each run owns a
/// private transcript, and the shared tool registry is immutable after
/// construction, so no locking is needed.
#[derive(Clone)]
pub struct Engine {
    service: Arc<dyn CompletionService>,
    registry: Arc<ToolRegistry>,
    config: ExecutionConfig,
    event_bus: Arc<EventBus>,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        service: Arc<dyn CompletionService>,
        registry: Arc<ToolRegistry>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            service,
            registry,
            config,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Attach a shared event bus.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Synchronous single-shot execution.
    ///
    /// Returns `Err` only for pre-flight configuration violations; every
    /// loop-time failure folds into the result's termination reason.
    pub async fn ask(&self, task: &str) -> Result<ExecutionResult, Error> {
        self.ask_cancellable(task, CancellationToken::new()).await
    }

    /// Like [`ask`](Self::ask), with a caller-supplied cancellation token.
    /// Cancellation terminates the run `TimedOut` with the transcript as
    /// last observed.
    pub async fn ask_cancellable(
        &self,
        task: &str,
        token: CancellationToken,
    ) -> Result<ExecutionResult, Error> {
        validator::validate(&self.config, &self.registry).map_err(Error::Config)?;
        let ctx = ExecContext::with_timeout(self.config.timeout).with_cancellation(token);
        Ok(self.run_inner(task, ctx, None).await)
    }

    /// Streaming execution: the same state machine, delivering each
    /// produced step through the returned receiver as it occurs, in
    /// transcript order, followed by a terminal `Done` (or `Error`) event.
    pub async fn stream(&self, task: &str) -> Result<mpsc::Receiver<StepEvent>, Error> {
        self.stream_cancellable(task, CancellationToken::new()).await
    }

    /// Like [`stream`](Self::stream), with a caller-supplied cancellation
    /// token.
    pub async fn stream_cancellable(
        &self,
        task: &str,
        token: CancellationToken,
    ) -> Result<mpsc::Receiver<StepEvent>, Error> {
        validator::validate(&self.config, &self.registry).map_err(Error::Config)?;

        let (tx, rx) = mpsc::channel::<StepEvent>(128);
        let engine = self.clone();
        let task = task.to_string();
        let ctx = ExecContext::with_timeout(self.config.timeout).with_cancellation(token);

        tokio::spawn(async move {
            engine.run_inner(&task, ctx, Some(tx)).await;
        });

        Ok(rx)
    }

    /// The state machine shared by `ask` and `stream`.
    async fn run_inner(
        &self,
        task: &str,
        ctx: ExecContext,
        sink: Option<mpsc::Sender<StepEvent>>,
    ) -> ExecutionResult {
        let strategy =
            strategy::for_config(&self.config, self.service.clone(), self.registry.clone());
        let executor = ToolExecutor::new(
            self.registry.clone(),
            self.config.namespace_prefixes.clone(),
        );
        let mut transcript = Transcript::new();
        let mut agg = Aggregator::new();

        info!(
            mode = self.config.mode.as_str(),
            max_iterations = self.config.max_iterations,
            "loop starting"
        );

        loop {
            // Reasoning: ask the strategy for the next step.
            self.event_bus.publish(LoopEvent::CompletionIssued {
                mode: self.config.mode.as_str().to_string(),
                iteration: agg.iterations,
                timestamp: Utc::now(),
            });

            let next = match guard(&ctx, strategy.next_step(task, &transcript, &ctx)).await {
                None => {
                    warn!("deadline or cancellation fired while awaiting the model");
                    return self
                        .finish(agg, transcript, TerminationReason::TimedOut, None, &sink)
                        .await;
                }
                Some(Ok(next)) => next,
                Some(Err(err)) => {
                    match self.degrade(err, &mut transcript, &mut agg, &sink).await {
                        Flow::Fatal(message) => {
                            return self
                                .finish(
                                    agg,
                                    transcript,
                                    TerminationReason::Fatal,
                                    Some(message),
                                    &sink,
                                )
                                .await;
                        }
                        Flow::Exhausted => {
                            return self
                                .finish(agg, transcript, TerminationReason::Exhausted, None, &sink)
                                .await;
                        }
                        Flow::Continue => continue,
                    }
                }
            };

            agg.record_usage(next.usage.as_ref());

            match next.step {
                step @ Step::Final { .. } => {
                    self.emit(&sink, StepEvent::from(&step)).await;
                    transcript.push(step);
                    return self
                        .finish(agg, transcript, TerminationReason::Success, None, &sink)
                        .await;
                }

                step @ Step::Thought { .. } => {
                    debug!("thought recorded");
                    self.emit(&sink, StepEvent::from(&step)).await;
                    transcript.push(step);
                }

                Step::Action { tool, arguments } => {
                    let action = Step::Action {
                        tool: tool.clone(),
                        arguments: arguments.clone(),
                    };
                    self.emit(&sink, StepEvent::from(&action)).await;
                    transcript.push(action);

                    // ToolDispatch: the second suspension point.
                    let outcome =
                        match guard(&ctx, executor.dispatch(&tool, &arguments, &ctx)).await {
                            None => {
                                warn!(%tool, "deadline or cancellation fired mid-dispatch");
                                return self
                                    .finish(
                                        agg,
                                        transcript,
                                        TerminationReason::TimedOut,
                                        None,
                                        &sink,
                                    )
                                    .await;
                            }
                            Some(outcome) => outcome,
                        };

                    agg.tool_calls += 1;
                    let success = outcome.error.is_none();
                    if let Step::Observation { tool: observed, .. } = &outcome.observation {
                        self.event_bus.publish(LoopEvent::ToolExecuted {
                            tool_name: observed.clone(),
                            success,
                            duration_ms: outcome.duration_ms,
                            timestamp: Utc::now(),
                        });
                    }

                    self.emit(&sink, StepEvent::from(&outcome.observation)).await;
                    transcript.push(outcome.observation);

                    if let Some(error) = outcome.error {
                        if self.config.strict {
                            let message = fatal_message(&Error::Tool(error), &transcript);
                            return self
                                .finish(
                                    agg,
                                    transcript,
                                    TerminationReason::Fatal,
                                    Some(message),
                                    &sink,
                                )
                                .await;
                        }
                    }

                    agg.iterations += 1;
                    if agg.iterations >= self.config.max_iterations {
                        warn!(max = self.config.max_iterations, "iteration budget exhausted");
                        return self
                            .finish(agg, transcript, TerminationReason::Exhausted, None, &sink)
                            .await;
                    }
                }

                // Strategies never return observations; they are produced
                // by the executor above.
                Step::Observation { .. } => {
                    let message = fatal_message(
                        &Error::Internal("strategy returned an observation".into()),
                        &transcript,
                    );
                    return self
                        .finish(agg, transcript, TerminationReason::Fatal, Some(message), &sink)
                        .await;
                }
            }
        }
    }

    /// Handle a strategy-level failure: recoverable errors degrade to an
    /// error observation and consume one iteration unless the
    /// configuration is strict; everything else is fatal.
    async fn degrade(
        &self,
        err: Error,
        transcript: &mut Transcript,
        agg: &mut Aggregator,
        sink: &Option<mpsc::Sender<StepEvent>>,
    ) -> Flow {
        if !err.is_recoverable() || self.config.strict {
            return Flow::Fatal(fatal_message(&err, transcript));
        }

        let source = match &err {
            Error::Tool(tool_error) => tool_error.tool_name().to_string(),
            _ => PARSER_SOURCE.to_string(),
        };
        let observation = Step::Observation {
            tool: source,
            output: format!("Error: {err}"),
            is_error: true,
        };
        debug!(%err, "degrading recoverable failure to an error observation");
        self.emit(sink, StepEvent::from(&observation)).await;
        transcript.push(observation);

        agg.iterations += 1;
        if agg.iterations >= self.config.max_iterations {
            Flow::Exhausted
        } else {
            Flow::Continue
        }
    }

    /// Fold terminal state into the result, publish the termination event,
    /// and deliver the terminal stream event.
    async fn finish(
        &self,
        agg: Aggregator,
        transcript: Transcript,
        reason: TerminationReason,
        error: Option<String>,
        sink: &Option<mpsc::Sender<StepEvent>>,
    ) -> ExecutionResult {
        self.event_bus.publish(LoopEvent::LoopTerminated {
            reason: reason.to_string(),
            iterations: agg.iterations,
            tool_calls: agg.tool_calls,
            timestamp: Utc::now(),
        });

        info!(
            %reason,
            iterations = agg.iterations,
            tool_calls = agg.tool_calls,
            "loop terminated"
        );

        let result = agg.finish(reason, transcript, error);

        match (&result.error, sink) {
            (Some(message), Some(_)) => {
                self.emit(sink, StepEvent::Error {
                    message: message.clone(),
                })
                .await;
            }
            _ => {
                self.emit(sink, StepEvent::Done {
                    termination_reason: result.termination_reason,
                    iterations_used: result.iterations_used,
                    tool_call_count: result.tool_call_count,
                    success: result.success,
                })
                .await;
            }
        }

        result
    }

    async fn emit(&self, sink: &Option<mpsc::Sender<StepEvent>>, event: StepEvent) {
        if let Some(tx) = sink {
            let _ = tx.send(event).await;
        }
    }
}

/// Control-flow outcome of degrading a strategy-level failure.
enum Flow {
    Continue,
    Exhausted,
    Fatal(String),
}

/// Await a suspension point under the run's deadline and cancellation
/// signal. `None` means the work was abandoned cooperatively.
async fn guard<T>(ctx: &ExecContext, fut: impl Future<Output = T>) -> Option<T> {
    let deadline = ctx
        .deadline
        .unwrap_or_else(|| Instant::now() + std::time::Duration::from_secs(3600));
    tokio::select! {
        biased;
        _ = ctx.cancellation.cancelled() => None,
        result = tokio::time::timeout_at(deadline, fut) => result.ok(),
    }
}

/// Bundle the root cause with a short diagnostic of transcript state.
fn fatal_message(err: &Error, transcript: &Transcript) -> String {
    format!("{err}; transcript state: {}", transcript.diagnostic())
}
