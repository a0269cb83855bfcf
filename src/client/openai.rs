//! OpenAI-compatible chat completions provider.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};

use super::streaming::ToolCallAssembler;
use super::{ModelError, ModelProvider, ModelRequest, ModelResult, ModelStream};
use crate::config::Settings;
use crate::config::settings::DEFAULT_BASE_URL;
use crate::types::Message;

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

#[derive(Clone, Debug)]
pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenAiProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.api_key.clone()).with_base_url(&settings.base_url)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn build_request_body(&self, request: &ModelRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": format_messages(&request.messages),
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = temperature.into();
        }

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = tools.into();
            body["tool_choice"] = "auto".into();
        }

        body
    }

    async fn error_from_response(response: reqwest::Response) -> ModelError {
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response.text().await.unwrap_or_default();
        let (message, error_type) = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => (parsed.error.message, parsed.error.error_type),
            Err(_) => (body, None),
        };

        match status {
            401 | 403 => ModelError::Auth(message),
            429 => ModelError::RateLimited { retry_after },
            400 | 404 | 422 => ModelError::InvalidRequest(message),
            _ => ModelError::Api {
                status,
                message,
                error_type,
            },
        }
    }
}

fn format_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message {
            Message::System { content } => json!({"role": "system", "content": content}),
            Message::User { content } => json!({"role": "user", "content": content}),
            Message::Assistant {
                content,
                tool_calls,
            } => {
                let mut value = json!({"role": "assistant", "content": content});
                if !tool_calls.is_empty() {
                    if content.is_empty() {
                        value["content"] = Value::Null;
                    }
                    value["tool_calls"] = tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id(),
                                "type": "function",
                                "function": {
                                    "name": call.name(),
                                    "arguments": Value::Object(call.arguments().clone()).to_string(),
                                }
                            })
                        })
                        .collect::<Vec<_>>()
                        .into();
                }
                value
            }
            Message::Tool(result) => json!({
                "role": "tool",
                "tool_call_id": result.call_id(),
                "content": result.text(),
            }),
        })
        .collect()
}

#[async_trait::async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: ModelRequest) -> ModelResult<ModelStream> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        tracing::debug!(
            url = %url,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(Box::pin(ToolCallAssembler::new(response.bytes_stream())))
    }
}
