use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use triage_core::{response_excerpt, CompletionProvider, CompletionRequest, CoreError};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_OPENAI_MODEL.to_owned(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_OPENAI_TIMEOUT_SECS),
        }
    }
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoreError> {
        let api_key = api_key.into();
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(CoreError::Configuration(
                "OPENAI_API_KEY is empty. Provide a non-empty API key.".to_owned(),
            ));
        }

        Ok(Self {
            api_key: api_key.to_owned(),
            ..Self::default()
        })
    }

    fn completions_endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Chat-completions client that asks for a JSON object response.
#[derive(Clone)]
pub struct OpenAiCompletionProvider {
    endpoint: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl fmt::Debug for OpenAiCompletionProvider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OpenAiCompletionProvider")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiCompletionProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .user_agent("triage/integration-openai")
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                CoreError::DependencyUnavailable(format!(
                    "failed to initialize OpenAI HTTP client: {err}"
                ))
            })?;

        Ok(Self {
            endpoint: config.completions_endpoint(),
            api_key: config.api_key,
            model: config.model,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete_json(&self, request: CompletionRequest) -> Result<String, CoreError> {
        let images = request.images.len();
        let payload = chat_payload(&self.model, &request);
        debug!(model = %self.model, images, "requesting issue extraction completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                let cause = if err.is_timeout() { "timed out" } else { "failed" };
                CoreError::DependencyUnavailable(format!(
                    "call to OpenAI chat completions {cause}: {err}"
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            CoreError::DependencyUnavailable(format!(
                "failed to read response from OpenAI chat completions: {err}"
            ))
        })?;

        if !status.is_success() {
            return Err(CoreError::DependencyUnavailable(format!(
                "OpenAI chat completions returned HTTP {}: {}",
                status,
                response_excerpt(&body)
            )));
        }

        parse_chat_completion(&body)
    }
}

fn chat_payload(model: &str, request: &CompletionRequest) -> Value {
    let mut content = vec![json!({ "type": "text", "text": request.user_text })];
    content.extend(request.images.iter().map(|image| {
        json!({
            "type": "image_url",
            "image_url": { "url": image.data_url() }
        })
    }));

    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": request.instruction },
            { "role": "user", "content": content }
        ],
        "response_format": { "type": "json_object" }
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn parse_chat_completion(body: &str) -> Result<String, CoreError> {
    let completion: ChatCompletion = serde_json::from_str(body).map_err(|err| {
        CoreError::MalformedResponse(format!(
            "failed to parse OpenAI chat completion JSON: {err}: {}",
            response_excerpt(body)
        ))
    })?;

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| {
            CoreError::MalformedResponse(
                "OpenAI chat completion did not include any message content.".to_owned(),
            )
        })
}
