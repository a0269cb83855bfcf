//! In-process tool session for tests and offline runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{Value, json};

use crate::mcp::{McpError, McpResult, McpToolDefinition, McpToolResult, ToolSession};
use crate::types::Arguments;

type Handler = Arc<dyn Fn(&Arguments) -> McpResult<McpToolResult> + Send + Sync>;

/// A recorded `call_tool` invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub name: String,
    pub arguments: Arguments,
}

/// [`ToolSession`] backed by closures instead of a remote process.
pub struct StaticSession {
    name: String,
    definitions: Vec<McpToolDefinition>,
    handlers: Vec<(String, Handler)>,
    delay: Option<Duration>,
    fail_list: bool,
    fail_close: bool,
    calls: Mutex<Vec<RecordedCall>>,
    list_count: AtomicUsize,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StaticSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: Vec::new(),
            handlers: Vec::new(),
            delay: None,
            fail_list: false,
            fail_close: false,
            calls: Mutex::new(Vec::new()),
            list_count: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Registers a tool taking an object of string parameters.
    pub fn with_tool<F>(self, name: &str, description: &str, handler: F) -> Self
    where
        F: Fn(&Arguments) -> McpResult<McpToolResult> + Send + Sync + 'static,
    {
        let schema = json!({"type": "object", "properties": {}});
        self.with_schema_tool(name, description, schema, handler)
    }

    pub fn with_schema_tool<F>(
        mut self,
        name: &str,
        description: &str,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Arguments) -> McpResult<McpToolResult> + Send + Sync + 'static,
    {
        self.definitions.push(McpToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        });
        self.handlers.push((name.to_string(), Arc::new(handler)));
        self
    }

    /// Lists a definition without a handler. Calls to it fail with `ToolNotFound`.
    pub fn with_definition(mut self, definition: McpToolDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    /// Delays every `call_tool` response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ToolSession for StaticSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> McpResult<Vec<McpToolDefinition>> {
        self.list_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_list {
            return Err(McpError::ConnectionFailed {
                server: self.name.clone(),
                message: "listing refused".to_string(),
            });
        }
        Ok(self.definitions.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Arguments) -> McpResult<McpToolResult> {
        if self.is_closed() {
            return Err(McpError::Closed {
                server: self.name.clone(),
            });
        }
        lock(&self.calls).push(RecordedCall {
            name: name.to_string(),
            arguments: arguments.clone(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let handler = self
            .handlers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| Arc::clone(h))
            .ok_or_else(|| McpError::ToolNotFound {
                name: name.to_string(),
            })?;
        handler(&arguments)
    }

    async fn close(&self) -> McpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(McpError::Protocol {
                message: format!("'{}' refused to close", self.name),
            });
        }
        Ok(())
    }
}
