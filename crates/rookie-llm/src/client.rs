// OpenAI chat-completions streaming client using reqwest-eventsource.
//
// Sends one system + user message pair with `stream: true`, accumulates the
// `choices[0].delta.content` fragments from the Server-Sent Events, and
// returns the full text once the `[DONE]` sentinel arrives. The client is the
// production `DecisionStep` for mock draft picks.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use rookie_core::mock::generator::{DecisionRequest, DecisionStep};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DONE_SENTINEL: &str = "[DONE]";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 400;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The `[llm]` table of the mock draft configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Override for the chat-completions endpoint (proxies, local servers).
    #[serde(default)]
    pub api_url: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            api_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAiClient
// ---------------------------------------------------------------------------

/// Low-level OpenAI chat-completions streaming client.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    /// Create a new client with the given API key and model identifier.
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            url: OPENAI_API_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// JSON body for one streamed completion. The response is constrained to
    /// a JSON object.
    pub(crate) fn request_body(&self, system: &str, user_content: &str, seed: Option<u64>) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user_content }
            ]
        });
        if let Some(seed) = seed {
            body["seed"] = Value::from(seed);
        }
        body
    }

    /// Stream a completion and return the concatenated content.
    ///
    /// Returns an error for a missing API key, a failed connection, a
    /// non-success status, or a stream that ends without any content.
    pub async fn complete(
        &self,
        system: &str,
        user_content: &str,
        seed: Option<u64>,
    ) -> anyhow::Result<String> {
        if self.api_key.is_empty() {
            bail!("API key not configured");
        }

        let request = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&self.request_body(system, user_content, seed));

        let mut es = request
            .eventsource()
            .map_err(|e| anyhow!("Failed to create event source: {e}"))?;

        let mut full_text = String::new();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!("SSE connection opened");
                }
                Ok(Event::Message(msg)) => {
                    if is_done(&msg.data) {
                        debug!(chars = full_text.len(), "stream complete");
                        es.close();
                        break;
                    }
                    if let Some(text) = parse_delta_content(&msg.data) {
                        full_text.push_str(&text);
                    }
                    if let Some(reason) = parse_finish_reason(&msg.data) {
                        debug!(reason, "finish_reason");
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    es.close();
                    break;
                }
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    es.close();
                    bail!(extract_error_message(&err));
                }
            }
        }

        if full_text.is_empty() {
            bail!("Stream ended unexpectedly without any content");
        }
        Ok(full_text)
    }
}

#[async_trait]
impl DecisionStep for OpenAiClient {
    async fn decide(&self, request: &DecisionRequest) -> anyhow::Result<String> {
        self.complete(&request.system_prompt, &request.user_prompt, request.seed)
            .await
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// High-level wrapper that can be either an active OpenAI client or disabled.
pub enum LlmClient {
    /// The API is configured and ready.
    Active(OpenAiClient),
    /// No API key configured.
    Disabled,
}

impl LlmClient {
    /// Build an `LlmClient` from an optional API key and the `[llm]` settings.
    ///
    /// Returns `Active` if the key is present and non-empty, otherwise
    /// `Disabled`.
    pub fn from_config(api_key: Option<&str>, settings: &LlmSettings) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => {
                let mut client = OpenAiClient::new(key.to_string(), settings.model.clone())
                    .with_sampling(settings.max_tokens, settings.temperature);
                if let Some(url) = settings.api_url.as_deref().filter(|u| !u.is_empty()) {
                    client = client.with_url(url);
                }
                LlmClient::Active(client)
            }
            _ => LlmClient::Disabled,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }
}

#[async_trait]
impl DecisionStep for LlmClient {
    async fn decide(&self, request: &DecisionRequest) -> anyhow::Result<String> {
        match self {
            LlmClient::Active(client) => client.decide(request).await,
            LlmClient::Disabled => bail!("LLM not configured"),
        }
    }
}

// ---------------------------------------------------------------------------
// SSE JSON parsing helpers
// ---------------------------------------------------------------------------

/// Whether the SSE data line is the end-of-stream sentinel.
pub(crate) fn is_done(data: &str) -> bool {
    data.trim() == DONE_SENTINEL
}

/// Extract `choices[0].delta.content` from a chunk.
///
/// Expected shape: `{ "choices": [ { "index": 0, "delta": { "content": "..." } } ] }`
pub(crate) fn parse_delta_content(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract `choices[0].finish_reason` when the chunk carries one.
pub(crate) fn parse_finish_reason(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("choices")?
        .get(0)?
        .get("finish_reason")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract a human-readable error message from an SSE error.
fn extract_error_message(err: &reqwest_eventsource::Error) -> String {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, _response) => {
            format!("API returned status {status}")
        }
        reqwest_eventsource::Error::Transport(e) => {
            format!("Network error: {e}")
        }
        other => format!("Stream error: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
