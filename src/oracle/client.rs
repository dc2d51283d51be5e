use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{OracleError, Prompt, TextGenerator};

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OracleClientConfig {
    /// Full URL of the `chat/completions` endpoint.
    pub endpoint: String,
    /// Bearer token; requests are sent unauthenticated when empty.
    pub api_key: String,
    /// Model identifier forwarded verbatim.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound for a single request.
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Debug, Deserialize)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
}

/// [`TextGenerator`] backed by an HTTP chat completions API.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    config: Arc<OracleClientConfig>,
}

impl ChatCompletionsClient {
    /// Build the HTTP client with the configured timeout.
    pub fn new(config: OracleClientConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| OracleError::Request(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    async fn send(&self, prompt: Prompt) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| OracleError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Request(format!(
                "oracle answered {status}: {body}"
            )));
        }

        let payload = response
            .json::<ChatResponse>()
            .await
            .map_err(|err| OracleError::Request(format!("undecodable oracle response: {err}")))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Request("oracle response has no content".into()))?;
        debug!(chars = content.len(), "oracle answered");
        Ok(content)
    }
}

impl TextGenerator for ChatCompletionsClient {
    fn complete(&self, prompt: Prompt) -> BoxFuture<'static, Result<String, OracleError>> {
        let client = self.clone();
        Box::pin(async move { client.send(prompt).await })
    }
}
