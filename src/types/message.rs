//! Conversation messages.

use serde::{Deserialize, Serialize};

use super::{ToolCallRequest, ToolResult};

/// Role tag of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        })
    }
}

/// A message in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        #[serde(default)]
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool(ToolResult),
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub(crate) fn assistant_with_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::System { .. } => Role::System,
            Message::User { .. } => Role::User,
            Message::Assistant { .. } => Role::Assistant,
            Message::Tool(_) => Role::Tool,
        }
    }

    /// Textual content. Tool results render their items joined by newlines.
    pub fn text(&self) -> String {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content, .. } => content.clone(),
            Message::Tool(result) => result.text(),
        }
    }

    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            Message::Tool(result) => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentItem;
    use serde_json::json;

    #[test]
    fn test_message_roles() {
        assert_eq!(Message::user("hi").role(), Role::User);
        assert_eq!(Message::assistant("ok").role(), Role::Assistant);
        assert_eq!(Message::system("sys").role(), Role::System);
        let result = ToolResult::success("call_1", vec![ContentItem::text("done")]);
        assert_eq!(Message::Tool(result).role(), Role::Tool);
    }

    #[test]
    fn test_assistant_serialization_round_trip() {
        let mut args = serde_json::Map::new();
        args.insert("text".into(), json!("hello"));
        let msg = Message::assistant_with_calls(
            "",
            vec![ToolCallRequest::new("call_1", "translate", args)],
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["tool_calls"][0]["name"], "translate");

        let back: Message = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
        assert!(back.has_tool_calls());
    }

    #[test]
    fn test_tool_message_text() {
        let result = ToolResult::success(
            "call_1",
            vec![ContentItem::text("a"), ContentItem::text("b")],
        );
        let msg = Message::Tool(result);
        assert_eq!(msg.text(), "a\nb");
        assert_eq!(msg.as_tool_result().unwrap().call_id(), "call_1");
    }

    #[test]
    fn test_plain_assistant_omits_tool_calls() {
        let value = serde_json::to_value(Message::assistant("done")).unwrap();
        assert!(value.get("tool_calls").is_none());
    }
}
