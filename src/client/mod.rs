//! Language model providers.
//!
//! The agent depends only on [`ModelProvider`]: given the message history and the
//! bound tool descriptors, a provider streams text deltas and complete tool calls.

pub mod error;
pub mod openai;
pub mod scripted;
pub mod streaming;

pub use error::ModelError;
pub use openai::OpenAiProvider;
pub use scripted::{ScriptStep, ScriptedProvider};
pub use streaming::{SseParser, ToolCallAssembler};

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::types::{Message, ToolDescriptor, Usage};

pub type ModelResult<T> = std::result::Result<T, ModelError>;

pub type ModelStream = Pin<Box<dyn Stream<Item = ModelResult<StreamItem>> + Send>>;

/// One request to the model: ordered history plus the tools it may call.
#[derive(Clone, Debug, Default)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
    pub temperature: Option<f32>,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Raw tool call as emitted by the provider. `arguments` is unparsed JSON text.
#[derive(Clone, Debug, PartialEq)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem {
    Text(String),
    ToolCall(RawToolCall),
    Usage(Usage),
}

/// Collected output of one non-streaming completion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<RawToolCall>,
    pub usage: Usage,
}

#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn stream(&self, request: ModelRequest) -> ModelResult<ModelStream>;

    async fn complete(&self, request: ModelRequest) -> ModelResult<Completion> {
        let mut stream = self.stream(request).await?;
        let mut completion = Completion::default();
        while let Some(item) = stream.next().await {
            match item? {
                StreamItem::Text(text) => completion.text.push_str(&text),
                StreamItem::ToolCall(call) => completion.tool_calls.push(call),
                StreamItem::Usage(usage) => completion.usage.add(&usage),
            }
        }
        Ok(completion)
    }
}
