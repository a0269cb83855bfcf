//! Typed content items carried by tool results.

use serde::{Deserialize, Serialize};

/// One typed payload returned by a remote tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        ContentItem::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentItem::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Text shown to the model for this item. Binary payloads collapse to a placeholder.
    pub fn render(&self) -> String {
        match self {
            ContentItem::Text { text } => text.clone(),
            ContentItem::Image { mime_type, .. } => format!("[image: {mime_type}]"),
            ContentItem::Resource {
                text: Some(text), ..
            } => text.clone(),
            ContentItem::Resource { uri, .. } => format!("[resource: {uri}]"),
        }
    }
}

/// Joins the rendered items of a tool result with newlines.
pub fn render_items(items: &[ContentItem]) -> String {
    items
        .iter()
        .map(ContentItem::render)
        .collect::<Vec<_>>()
        .join("\n")
}
