//! OpenAI chat-completions backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::LanguageModel;
use crate::error::{ModelError, ModelResult};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat completions over plain REST.
///
/// No request timeout is set unless [`OpenAIModel::with_timeout`] is used; a
/// hung call then stalls the monitor until the server gives up.
#[derive(Clone)]
pub struct OpenAIModel {
    http_client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAIModel {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: Some(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// A model with no key; every call fails with a configuration error, so
    /// summaries fall back to the failure sentinel.
    pub fn unconfigured() -> Self {
        Self {
            api_key: None,
            ..Self::new("")
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (Azure, proxies, local test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> ModelResult<Self> {
        self.http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    async fn complete(&self, system: &str, user: &str) -> ModelResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ModelError::Config("OPENAI_API_KEY not set".into()))?;

        let start = std::time::Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                ModelError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI API error");
            return Err(ModelError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelError::Api("No response from OpenAI".into()))?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            "OpenAI chat completion"
        );

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_complete_sends_roles_and_returns_content() {
        let app = Router::new().route(
            "/chat/completions",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(
                    headers.get("authorization").unwrap().to_str().unwrap(),
                    "Bearer sk-test"
                );
                assert_eq!(body["model"], "gpt-4o-mini");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["role"], "user");
                let echoed = format!("saw: {}", body["messages"][1]["content"].as_str().unwrap());
                Json(json!({ "choices": [{ "message": { "role": "assistant", "content": echoed } }] }))
            }),
        );
        let base = serve(app).await;

        let model = OpenAIModel::new("sk-test").with_base_url(base);
        let out = model.complete("persona", "the diff").await.unwrap();
        assert_eq!(out, "saw: the diff");
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = serve(app).await;

        let model = OpenAIModel::new("sk-test").with_base_url(base);
        let err = model.complete("s", "u").await.unwrap_err();
        assert!(matches!(err, ModelError::Api(msg) if msg.contains("slow down")));
    }

    #[tokio::test]
    async fn test_empty_choices_is_api_error() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let base = serve(app).await;

        let model = OpenAIModel::new("sk-test").with_base_url(base);
        assert!(matches!(
            model.complete("s", "u").await.unwrap_err(),
            ModelError::Api(_)
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_model_fails_without_request() {
        let model = OpenAIModel::unconfigured().with_base_url("http://127.0.0.1:9");
        assert!(matches!(
            model.complete("s", "u").await.unwrap_err(),
            ModelError::Config(_)
        ));
    }

    #[test]
    fn test_builder() {
        let model = OpenAIModel::new("sk-test")
            .with_model("gpt-4o")
            .with_base_url("https://custom.api.com/v1/");
        assert_eq!(model.model(), "gpt-4o");
        assert_eq!(model.base_url, "https://custom.api.com/v1");
    }
}
