//! Reference tool server offering text operations backed by a language model.

#[cfg(feature = "mcp")]
mod handler;

#[cfg(feature = "mcp")]
pub use handler::{SERVER_NAME, TextRequest, TextServer, TranslateRequest};

use std::sync::Arc;

use tracing::debug;

use crate::client::{ModelProvider, ModelRequest, ModelResult};
use crate::types::Message;

const SUMMARIZE_INSTRUCTION: &str = "Summarize the given text to roughly a quarter of its \
original length. For example, a 100 word text becomes a summary of about 25 to 30 words. \
If the text is too short to shorten meaningfully, say that it is too small to be summarized.";

const KEYWORDS_INSTRUCTION: &str = "Extract between 5 and 10 keywords from the given text. \
Use fewer for short text: a 20 word text should yield 5 or 6 keywords if possible, and never \
fewer than 2 or 3.";

/// The three text operations, each a single model call with its own instruction.
pub struct TextOps {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl TextOps {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub async fn summarize(&self, text: &str) -> ModelResult<String> {
        self.run("summarize", SUMMARIZE_INSTRUCTION.to_string(), text)
            .await
    }

    pub async fn extract_keywords(&self, text: &str) -> ModelResult<String> {
        self.run("extract_keywords", KEYWORDS_INSTRUCTION.to_string(), text)
            .await
    }

    pub async fn translate(&self, text: &str, language: &str) -> ModelResult<String> {
        let instruction = format!("Translate the input text into {}.", language);
        self.run("translate", instruction, text).await
    }

    async fn run(&self, operation: &str, instruction: String, text: &str) -> ModelResult<String> {
        debug!(operation, chars = text.len(), "Running text operation");
        let request = ModelRequest::new(
            &self.model,
            vec![Message::system(instruction), Message::user(text)],
        );
        let completion = self.provider.complete(request).await?;
        Ok(completion.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ModelError, ScriptedProvider};

    #[tokio::test]
    async fn test_translate_uses_language_and_trims() {
        let provider = Arc::new(ScriptedProvider::new().then_text(["  Bonjour\n"]));
        let ops = TextOps::new(provider.clone(), "gpt-4o");

        let out = ops.translate("hello", "French").await.unwrap();
        assert_eq!(out, "Bonjour");

        let request = &provider.requests()[0];
        assert_eq!(request.model, "gpt-4o");
        assert!(request.tools.is_empty());
        assert_eq!(
            request.messages[0],
            Message::system("Translate the input text into French.")
        );
        assert_eq!(request.messages[1], Message::user("hello"));
    }

    #[tokio::test]
    async fn test_each_operation_has_own_instruction() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_text(["short"])
                .then_text(["a, b, c"]),
        );
        let ops = TextOps::new(provider.clone(), "m");

        assert_eq!(ops.summarize("long text").await.unwrap(), "short");
        assert_eq!(ops.extract_keywords("long text").await.unwrap(), "a, b, c");

        let requests = provider.requests();
        assert!(requests[0].messages[0].text().contains("quarter"));
        assert!(requests[1].messages[0].text().contains("keywords"));
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new().then_fail(500, "upstream"));
        let ops = TextOps::new(provider, "m");
        let err = ops.summarize("x").await.unwrap_err();
        assert!(matches!(err, ModelError::Api { status: 500, .. }));
    }
}
