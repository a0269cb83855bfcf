//! Reasoning step: one model call over the system instruction and the full history.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::warn;

use super::config::{AgentConfig, TOOLS_PLACEHOLDER};
use crate::client::{ModelProvider, ModelRequest, ModelResult, ModelStream, RawToolCall, StreamItem};
use crate::types::{Arguments, Message, ToolCallRequest, ToolDescriptor, Usage};

/// Renders the system instruction, listing each bound tool by name and description.
pub fn system_instruction(template: &str, tools: &[ToolDescriptor]) -> String {
    let listing: Vec<Value> = tools
        .iter()
        .map(|t| json!({"name": t.name, "description": t.description}))
        .collect();
    let rendered = serde_json::to_string_pretty(&listing).unwrap_or_default();
    template.replace(TOOLS_PLACEHOLDER, &rendered)
}

/// Model call bound to one turn's model and tool snapshot.
pub struct ReasoningStep {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: Option<f32>,
    instruction: String,
    tools: Vec<ToolDescriptor>,
}

impl ReasoningStep {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: impl Into<String>,
        tools: Vec<ToolDescriptor>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            instruction: system_instruction(&config.prompt.system_template, &tools),
            provider,
            model: model.into(),
            temperature: config.model.temperature,
            tools,
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// System instruction first, then the history in order.
    pub fn request(&self, history: &[Message]) -> ModelRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.instruction.clone()));
        messages.extend(history.iter().cloned());

        let request = ModelRequest::new(&self.model, messages).with_tools(self.tools.clone());
        match self.temperature {
            Some(t) => request.with_temperature(t),
            None => request,
        }
    }

    pub async fn stream(&self, history: &[Message]) -> ModelResult<ModelStream> {
        self.provider.stream(self.request(history)).await
    }

    /// Non-streaming form: the complete assistant message for `history`.
    pub async fn reason(&self, history: &[Message]) -> ModelResult<Message> {
        let completion = self.provider.complete(self.request(history)).await?;
        let draft = StepDraft {
            text: completion.text,
            calls: completion.tool_calls,
            usage: completion.usage,
        };
        Ok(draft.into_message())
    }
}

/// Output of a reasoning step while it is still streaming.
#[derive(Debug, Default)]
pub(crate) struct StepDraft {
    pub text: String,
    pub calls: Vec<RawToolCall>,
    pub usage: Usage,
}

impl StepDraft {
    /// Folds one stream item in. Returns the text delta, if the item was one.
    pub fn push(&mut self, item: StreamItem) -> Option<String> {
        match item {
            StreamItem::Text(text) => {
                self.text.push_str(&text);
                Some(text)
            }
            StreamItem::ToolCall(call) => {
                self.calls.push(call);
                None
            }
            StreamItem::Usage(usage) => {
                self.usage.add(&usage);
                None
            }
        }
    }

    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }

    pub fn into_message(self) -> Message {
        Message::assistant_with_calls(self.text, finalize_calls(self.calls))
    }
}

/// Parses arguments and gives every call an id that is non-empty and unique in the batch.
pub(crate) fn finalize_calls(raw: Vec<RawToolCall>) -> Vec<ToolCallRequest> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.into_iter()
        .map(|call| {
            let arguments = parse_arguments(&call.name, &call.arguments);
            let id = if call.id.trim().is_empty() || seen.contains(&call.id) {
                let fresh = format!("call_{}", uuid::Uuid::new_v4().simple());
                warn!(tool = %call.name, original = %call.id, assigned = %fresh, "Reassigned tool call id");
                fresh
            } else {
                call.id
            };
            seen.insert(id.clone());
            ToolCallRequest::new(id, call.name, arguments)
        })
        .collect()
}

/// Malformed or non-object arguments become an empty mapping.
pub(crate) fn parse_arguments(tool: &str, raw: &str) -> Arguments {
    if raw.trim().is_empty() {
        return Arguments::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(tool, value = %other, "Tool call arguments are not an object");
            Arguments::new()
        }
        Err(e) => {
            warn!(tool, error = %e, "Malformed tool call arguments");
            Arguments::new()
        }
    }
}
