//! Execution strategies — the two ways of obtaining the next step.
//!
//! A strategy owns the mode-specific halves of the loop: assembling the
//! completion request from the transcript and decoding the model's turn
//! into exactly one [`Step`]. The variant is chosen once at configuration
//! time and never switched mid-execution.

pub mod native;
pub mod text;

use async_trait::async_trait;
use std::sync::Arc;

use cogwork_core::context::ExecContext;
use cogwork_core::error::Error;
use cogwork_core::service::{CompletionService, Usage};
use cogwork_core::step::{Step, Transcript};
use cogwork_core::tool::ToolRegistry;

use crate::config::{ExecutionConfig, ExecutionMode};

pub use native::NativeStrategy;
pub use text::TextStrategy;

/// One decoded step plus the turn's reported token usage.
#[derive(Debug, Clone)]
pub struct NextStep {
    pub step: Step,
    pub usage: Option<Usage>,
}

/// Obtains the next step for a running loop.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Which mode this strategy implements.
    fn mode(&self) -> ExecutionMode;

    /// Issue one completion request for the current transcript and decode
    /// the response into exactly one step.
    async fn next_step(
        &self,
        task: &str,
        transcript: &Transcript,
        ctx: &ExecContext,
    ) -> Result<NextStep, Error>;
}

/// Select the strategy for a configuration. Called once per execution.
pub fn for_config(
    config: &ExecutionConfig,
    service: Arc<dyn CompletionService>,
    registry: Arc<ToolRegistry>,
) -> Box<dyn Strategy> {
    match config.mode {
        ExecutionMode::Native => Box::new(NativeStrategy::new(service, registry, config.tool_choice)),
        ExecutionMode::Text => Box::new(TextStrategy::new(service, registry, config.tool_choice)),
    }
}
