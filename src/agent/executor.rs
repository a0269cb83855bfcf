//! Agent core structure and construction.

use std::sync::Arc;

use futures::StreamExt;
use tracing::instrument;

use super::config::{AgentConfig, ExecutionConfig, FragmentPolicy, ModelConfig};
use super::events::{AgentEvent, TurnResult};
use crate::client::{ModelProvider, OpenAiProvider};
use crate::config::{ConfigError, Settings};
use crate::session::{ConversationStore, MemoryStore, ThreadId};
use crate::tools::ToolRegistry;
use crate::types::Message;

/// Per-invocation snapshot: which thread, which model, which tools.
///
/// Fixed for the whole turn, so every reasoning step sees the same tool set.
#[derive(Clone, Debug)]
pub struct TurnConfig {
    pub thread: ThreadId,
    pub model: String,
    pub tools: Arc<ToolRegistry>,
}

/// Runs turns against a model provider, a conversation store and a tool snapshot.
#[derive(Clone)]
pub struct Agent {
    pub(crate) provider: Arc<dyn ModelProvider>,
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) config: Arc<AgentConfig>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("provider", &self.provider.name())
            .field("store", &self.store.name())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish()
    }
}

impl Agent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        store: Arc<dyn ConversationStore>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            store,
            tools,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn turn_config(&self, thread: &ThreadId) -> TurnConfig {
        TurnConfig {
            thread: thread.clone(),
            model: self.config.model.model.clone(),
            tools: Arc::clone(&self.tools),
        }
    }

    pub async fn history(&self, thread: &ThreadId) -> crate::Result<Vec<Message>> {
        Ok(self.store.read(thread).await?)
    }

    /// Runs a whole turn and returns its result, discarding intermediate events.
    #[instrument(skip(self, text), fields(thread = %thread))]
    pub async fn run_turn(&self, thread: &ThreadId, text: &str) -> crate::Result<TurnResult> {
        let mut stream = self.execute_stream(thread, text);
        while let Some(event) = stream.next().await {
            if let AgentEvent::Complete(result) = event? {
                return Ok(*result);
            }
        }
        Err(crate::Error::Internal(
            "turn ended without a result".to_string(),
        ))
    }
}

/// Builder for [`Agent`].
#[derive(Default)]
pub struct AgentBuilder {
    provider: Option<Arc<dyn ModelProvider>>,
    store: Option<Arc<dyn ConversationStore>>,
    tools: Option<Arc<ToolRegistry>>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider and config taken from environment-derived settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new()
            .provider(Arc::new(OpenAiProvider::from_settings(settings)))
            .config(AgentConfig::from_settings(settings))
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Defaults to a fresh [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to an empty registry.
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = ModelConfig {
            model: model.into(),
            ..self.config.model
        };
        self
    }

    pub fn execution(mut self, execution: ExecutionConfig) -> Self {
        self.config.execution = execution;
        self
    }

    pub fn max_cycles(mut self, max: Option<usize>) -> Self {
        self.config.execution.max_cycles = max;
        self
    }

    pub fn fragment_policy(mut self, policy: FragmentPolicy) -> Self {
        self.config.execution.fragment_policy = policy;
        self
    }

    pub fn system_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt.system_template = template.into();
        self
    }

    pub fn build(self) -> crate::Result<Agent> {
        let provider = self.provider.ok_or_else(|| ConfigError::MissingSetting {
            key: "provider".to_string(),
        })?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn ConversationStore>);
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(ToolRegistry::empty()));

        Ok(Agent::new(provider, store, tools, self.config))
    }
}
