//! Agent configuration types.
//!
//! Domain-separated configuration for clarity and maintainability.

use std::time::Duration;

use crate::config::Settings;
use crate::config::settings::{
    DEFAULT_CHUNK_TIMEOUT_SECS, DEFAULT_MAX_CYCLES, DEFAULT_MODEL, DEFAULT_TOOL_TIMEOUT_SECS,
};

/// Placeholder replaced by the JSON list of bound tools.
pub const TOOLS_PLACEHOLDER: &str = "{tools}";

pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are a helpful assistant. \
You can call the following tools when they help answer the user. \
Call a tool only when it is needed, and answer directly otherwise.\n\
Available tools:\n{tools}";

/// Model-related configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
        }
    }
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Which text fragments reach the caller during a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FragmentPolicy {
    /// Hold each step's fragments and release them only if the step is terminal
    #[default]
    Settled,
    /// Forward fragments as they arrive until the step requests its first tool call.
    ///
    /// Text a provider streams ahead of a tool call in the same step still reaches
    /// the caller, so the fragments may not concatenate to the committed answer.
    Live,
}

/// Execution behavior configuration.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Maximum reasoning steps per turn. `None` removes the cap.
    pub max_cycles: Option<usize>,
    pub tool_timeout: Option<Duration>,
    /// Timeout between streaming chunks (detects stalled connections)
    pub chunk_timeout: Duration,
    /// Dispatch a batch of tool calls concurrently
    pub parallel_tool_calls: bool,
    pub fragment_policy: FragmentPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_cycles: Some(DEFAULT_MAX_CYCLES),
            tool_timeout: Some(Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS)),
            chunk_timeout: Duration::from_secs(DEFAULT_CHUNK_TIMEOUT_SECS),
            parallel_tool_calls: false,
            fragment_policy: FragmentPolicy::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn with_max_cycles(mut self, max: usize) -> Self {
        self.max_cycles = Some(max);
        self
    }

    pub fn without_cycle_limit(mut self) -> Self {
        self.max_cycles = None;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn without_tool_timeout(mut self) -> Self {
        self.tool_timeout = None;
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn with_parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    pub fn with_fragment_policy(mut self, policy: FragmentPolicy) -> Self {
        self.fragment_policy = policy;
        self
    }
}

/// System instruction configuration.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    /// Template for the system instruction. `{tools}` is replaced by the bound tool list.
    pub system_template: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
        }
    }
}

impl PromptConfig {
    pub fn with_system_template(mut self, template: impl Into<String>) -> Self {
        self.system_template = template.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    pub model: ModelConfig,
    pub execution: ExecutionConfig,
    pub prompt: PromptConfig,
}

impl AgentConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            model: ModelConfig::new(&settings.model),
            execution: ExecutionConfig {
                max_cycles: settings.max_cycles,
                tool_timeout: Some(settings.tool_timeout),
                chunk_timeout: settings.chunk_timeout,
                ..Default::default()
            },
            prompt: PromptConfig::default(),
        }
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptConfig) -> Self {
        self.prompt = prompt;
        self
    }
}
