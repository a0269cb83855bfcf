//! Agent loop states and per-turn metrics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::router::Route;
use crate::types::Usage;

/// State of the agent loop within one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Start,
    Reasoning,
    Dispatching,
    Terminal,
}

/// Inputs that drive [`LoopState::next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// The user message was appended to the history
    UserAppended,
    /// The reasoning step's assistant message was appended and routed
    Routed(Route),
    /// Every tool result of the current batch was appended
    ResultsAppended,
}

impl LoopState {
    /// Pure transition function. Returns `None` for transitions the loop never takes.
    pub fn next(self, event: LoopEvent) -> Option<LoopState> {
        match (self, event) {
            (LoopState::Start, LoopEvent::UserAppended) => Some(LoopState::Reasoning),
            (LoopState::Reasoning, LoopEvent::Routed(Route::Terminate)) => Some(LoopState::Terminal),
            (LoopState::Reasoning, LoopEvent::Routed(Route::Dispatch)) => {
                Some(LoopState::Dispatching)
            }
            (LoopState::Dispatching, LoopEvent::ResultsAppended) => Some(LoopState::Reasoning),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Terminal)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LoopState::Start => "start",
            LoopState::Reasoning => "reasoning",
            LoopState::Dispatching => "dispatching",
            LoopState::Terminal => "terminal",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AgentMetrics {
    /// Reasoning steps run in the turn
    pub cycles: usize,
    pub api_calls: usize,
    pub tool_calls: usize,
    pub errors: usize,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub execution_time_ms: u64,
    pub tool_stats: HashMap<String, ToolStats>,
}

#[derive(Debug, Clone, Default)]
pub struct ToolStats {
    pub calls: usize,
    pub total_time_ms: u64,
    pub errors: usize,
}

impl AgentMetrics {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }

    pub fn add_usage(&mut self, usage: &Usage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }

    pub fn record_tool(&mut self, name: &str, duration_ms: u64, is_error: bool) {
        self.tool_calls += 1;
        let stats = self.tool_stats.entry(name.to_string()).or_default();
        stats.calls += 1;
        stats.total_time_ms += duration_ms;
        if is_error {
            stats.errors += 1;
            self.errors += 1;
        }
    }

    pub fn record_api_call(&mut self) {
        self.api_calls += 1;
    }

    pub fn avg_tool_time_ms(&self) -> f64 {
        if self.tool_calls == 0 {
            return 0.0;
        }
        let total: u64 = self.tool_stats.values().map(|s| s.total_time_ms).sum();
        total as f64 / self.tool_calls as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use LoopEvent::*;
        use LoopState::*;

        assert_eq!(Start.next(UserAppended), Some(Reasoning));
        assert_eq!(Reasoning.next(Routed(Route::Dispatch)), Some(Dispatching));
        assert_eq!(Reasoning.next(Routed(Route::Terminate)), Some(Terminal));
        assert_eq!(Dispatching.next(ResultsAppended), Some(Reasoning));
    }

    #[test]
    fn test_terminal_is_absorbing() {
        use LoopEvent::*;

        for event in [UserAppended, Routed(Route::Dispatch), Routed(Route::Terminate), ResultsAppended] {
            assert_eq!(LoopState::Terminal.next(event), None);
        }
        assert!(LoopState::Terminal.is_terminal());
        assert!(!LoopState::Dispatching.is_terminal());
    }

    #[test]
    fn test_no_shortcuts() {
        assert_eq!(LoopState::Start.next(LoopEvent::Routed(Route::Terminate)), None);
        assert_eq!(LoopState::Dispatching.next(LoopEvent::Routed(Route::Dispatch)), None);
        assert_eq!(LoopState::Reasoning.next(LoopEvent::ResultsAppended), None);
    }

    #[test]
    fn test_metrics_tool_recording() {
        let mut metrics = AgentMetrics::default();
        metrics.record_tool("summarize", 50, false);
        metrics.record_tool("summarize", 30, false);
        metrics.record_tool("translate", 100, true);

        assert_eq!(metrics.tool_calls, 3);
        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.tool_stats["summarize"].calls, 2);
        assert_eq!(metrics.tool_stats["summarize"].total_time_ms, 80);
        assert_eq!(metrics.tool_stats["translate"].errors, 1);
        assert!((metrics.avg_tool_time_ms() - 60.0).abs() < 0.1);
    }

    #[test]
    fn test_metrics_usage() {
        let mut metrics = AgentMetrics::default();
        metrics.add_usage(&Usage {
            input_tokens: 100,
            output_tokens: 50,
        });
        metrics.add_usage(&Usage {
            input_tokens: 200,
            output_tokens: 100,
        });
        assert_eq!(metrics.total_tokens(), 450);
    }
}
