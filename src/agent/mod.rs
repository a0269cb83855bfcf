//! Agent execution engine.

mod config;
mod events;
mod executor;
mod reasoning;
mod router;
mod state;
mod streaming;

pub use config::{
    AgentConfig, DEFAULT_SYSTEM_TEMPLATE, ExecutionConfig, FragmentPolicy, ModelConfig,
    PromptConfig, TOOLS_PLACEHOLDER,
};
pub use events::{AgentEvent, TurnResult};
pub use executor::{Agent, AgentBuilder, TurnConfig};
pub use reasoning::{ReasoningStep, system_instruction};
pub use router::{Route, route};
pub use state::{AgentMetrics, LoopEvent, LoopState, ToolStats};
pub use streaming::{EventStream, FragmentStream};
