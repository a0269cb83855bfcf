//! Deterministic provider that replays pre-recorded steps.
//!
//! Each call to [`ModelProvider::stream`] consumes the next step. Requests are
//! recorded so callers can inspect exactly what the model was shown.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use futures::{StreamExt, stream};
use serde_json::Value;

use super::{
    ModelError, ModelProvider, ModelRequest, ModelResult, ModelStream, RawToolCall, StreamItem,
};

#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Stream these items, then end
    Reply(Vec<StreamItem>),
    /// Fail the request with an API error
    Fail { status: u16, message: String },
    /// Stream these items, then never produce another one
    Stall(Vec<StreamItem>),
}

#[derive(Debug, Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<ScriptStep>>,
    requests: Mutex<Vec<ModelRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, step: ScriptStep) -> Self {
        lock(&self.steps).push_back(step);
        self
    }

    /// A terminal answer streamed as the given fragments.
    pub fn then_text<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = fragments
            .into_iter()
            .map(|f| StreamItem::Text(f.into()))
            .collect();
        self.then(ScriptStep::Reply(items))
    }

    /// A step requesting the given `(id, name, arguments)` tool calls, in order.
    pub fn then_tool_calls<I, S>(self, calls: I) -> Self
    where
        I: IntoIterator<Item = (S, S, Value)>,
        S: Into<String>,
    {
        let items = calls
            .into_iter()
            .map(|(id, name, arguments)| {
                StreamItem::ToolCall(RawToolCall {
                    id: id.into(),
                    name: name.into(),
                    arguments: arguments.to_string(),
                })
            })
            .collect();
        self.then(ScriptStep::Reply(items))
    }

    pub fn then_fail(self, status: u16, message: impl Into<String>) -> Self {
        self.then(ScriptStep::Fail {
            status,
            message: message.into(),
        })
    }

    pub fn then_stall<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = fragments
            .into_iter()
            .map(|f| StreamItem::Text(f.into()))
            .collect();
        self.then(ScriptStep::Stall(items))
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.steps).len()
    }
}

#[async_trait::async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ModelRequest) -> ModelResult<ModelStream> {
        lock(&self.requests).push(request);
        let step = lock(&self.steps)
            .pop_front()
            .ok_or_else(|| ModelError::Stream("scripted provider has no steps left".into()))?;

        match step {
            ScriptStep::Reply(items) => Ok(Box::pin(stream::iter(items.into_iter().map(Ok)))),
            ScriptStep::Fail { status, message } => Err(ModelError::Api {
                status,
                message,
                error_type: None,
            }),
            ScriptStep::Stall(items) => Ok(Box::pin(
                stream::iter(items.into_iter().map(Ok)).chain(stream::pending()),
            )),
        }
    }
}
