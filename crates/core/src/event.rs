//! Loop event system — decoupled observation of running executions.
//!
//! Events are published when something interesting happens in the loop.
//! Embedders can subscribe to react without coupling to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All observable loop events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LoopEvent {
    /// A completion request was issued to the model.
    CompletionIssued {
        mode: String,
        iteration: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed.
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A loop execution ended.
    LoopTerminated {
        reason: String,
        iterations: u32,
        tool_calls: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for loop events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub. Subscribers
/// receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<LoopEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: LoopEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LoopEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
