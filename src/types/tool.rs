//! Tool descriptors, call requests and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ContentItem;

/// Argument mapping passed to a tool, keyed by parameter name.
pub type Arguments = Map<String, Value>;

/// Metadata for one callable remote tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A structured instruction from the model naming a tool and its arguments.
///
/// Only the reasoning step creates these; the fields are read-only elsewhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    id: String,
    name: String,
    #[serde(default)]
    arguments: Arguments,
}

impl ToolCallRequest {
    pub(crate) fn new(id: impl Into<String>, name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }
}

/// Outcome of one tool call, linked back to the request by `call_id`.
///
/// Only the tool executor creates these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    call_id: String,
    content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    is_error: bool,
}

impl ToolResult {
    pub(crate) fn success(call_id: impl Into<String>, content: Vec<ContentItem>) -> Self {
        Self {
            call_id: call_id.into(),
            content,
            is_error: false,
        }
    }

    pub(crate) fn error(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: vec![ContentItem::text(message)],
            is_error: true,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn content(&self) -> &[ContentItem] {
        &self.content
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn text(&self) -> String {
        super::content::render_items(&self.content)
    }
}
