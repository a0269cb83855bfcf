//! Routing decision after each reasoning step.

use crate::types::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The message is a final answer
    Terminate,
    /// The message requests one or more tool calls
    Dispatch,
}

/// `Dispatch` iff the message carries at least one tool-call request.
pub fn route(message: &Message) -> Route {
    if message.has_tool_calls() {
        Route::Dispatch
    } else {
        Route::Terminate
    }
}
