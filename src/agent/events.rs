//! Agent events and result types.

use super::state::AgentMetrics;
use crate::session::ThreadId;
use crate::types::{Message, Usage};

/// Events emitted during a turn.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Text fragment of the answer, in generation order
    Text(String),
    ToolComplete {
        id: String,
        name: String,
        output: String,
        is_error: bool,
        duration_ms: u64,
    },
    Complete(Box<TurnResult>),
}

/// Outcome of one completed turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub thread: ThreadId,
    pub text: String,
    pub usage: Usage,
    pub metrics: AgentMetrics,
    /// Messages appended to the thread during this turn, in order
    pub messages: Vec<Message>,
}

impl TurnResult {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn cycles(&self) -> usize {
        self.metrics.cycles
    }

    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.usage.total()
    }

    #[must_use]
    pub fn metrics(&self) -> &AgentMetrics {
        &self.metrics
    }

    /// The committed final assistant message.
    pub fn final_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
