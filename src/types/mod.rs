//! Conversation data model shared by the agent loop, the tool layer and the store.

pub mod content;
mod message;
mod tool;

pub use content::ContentItem;
pub use message::{Message, Role};
pub use tool::{Arguments, ToolCallRequest, ToolDescriptor, ToolResult};

use serde::{Deserialize, Serialize};

/// Token usage reported by a model provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}
