//! Chat model client.
//!
//! Speaks the OpenAI `/chat/completions` wire format, which Gemini, Groq and
//! most local servers also accept.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sogo_core::types::{ChatMessage, Role};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// A model that turns a system prompt and a conversation into one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}

#[derive(Clone)]
pub struct OpenAiCompatModel {
    client: Client,
    config: LlmConfig,
}

impl OpenAiCompatModel {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatModel {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: system,
        });
        wire.extend(messages.iter().filter_map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Other => return None,
            };
            Some(WireMessage {
                role,
                content: &m.content,
            })
        }));

        let payload = CompletionRequest {
            model: &self.config.model,
            messages: wire,
            temperature: self.config.temperature,
        };

        debug!(
            "chat completion: {} messages to {}",
            payload.messages.len(),
            self.config.model
        );

        let mut request = self.client.post(self.url()).json(&payload);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::model(format!("{status}: {body}")));
        }

        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(MessageContent::into_text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::model("empty response"))
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<MessageContent>,
}

/// Some providers return content as a list of typed parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Parts(parts) => parts
                .into_iter()
                .filter(|p| p.kind == "text")
                .map(|p| p.text)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::test_support::serve;

    #[test]
    fn test_string_content() {
        let body: CompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "What is a variable?"}}]
        }))
        .unwrap();
        let text = body.choices.into_iter().next().unwrap().message.content.unwrap();
        assert_eq!(text.into_text(), "What is a variable?");
    }

    #[test]
    fn test_parts_content_joins_text_only() {
        let content: MessageContent = serde_json::from_value(json!([
            {"type": "text", "text": "Think of "},
            {"type": "image_url", "image_url": {"url": "x"}},
            {"type": "text", "text": "a scoreboard."}
        ]))
        .unwrap();
        assert_eq!(content.into_text(), "Think of a scoreboard.");
    }

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            base_url,
            api_key: "test-key".into(),
            model: "test-model".into(),
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn test_complete_sends_system_first_and_auth() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(req): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer test-key");
                assert_eq!(req["model"], "test-model");
                let messages = req["messages"].as_array().unwrap();
                assert_eq!(messages[0]["role"], "system");
                assert_eq!(messages.len(), 3);
                let last = messages.last().unwrap()["content"].as_str().unwrap().to_string();
                Json(json!({"choices": [{"message": {"content": format!("echo: {last}")}}]}))
            }),
        );
        let base = serve(app).await;
        let model = OpenAiCompatModel::new(config(base)).unwrap();

        let history = [
            ChatMessage::assistant("Hello!"),
            ChatMessage {
                role: Role::Other,
                content: "ignored".into(),
            },
            ChatMessage::user("print(runs)"),
        ];
        let reply = model.complete("be Socratic", &history).await.unwrap();
        assert_eq!(reply, "echo: print(runs)");
    }

    #[tokio::test]
    async fn test_error_status_is_model_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "quota") }),
        );
        let base = serve(app).await;
        let model = OpenAiCompatModel::new(config(base)).unwrap();
        let err = model.complete("s", &[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, Error::Model(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn test_empty_choices_is_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({"choices": []})) }),
        );
        let base = serve(app).await;
        let model = OpenAiCompatModel::new(config(base)).unwrap();
        assert!(model.complete("s", &[]).await.is_err());
    }
}
