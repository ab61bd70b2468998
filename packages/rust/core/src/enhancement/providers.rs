//! HTTP-backed enhancement capabilities.
//!
//! Both providers send one user message and read back one text completion.
//! API keys are held as [`SecretString`] and never appear in `Debug` output.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use thesisforge_shared::{AiConfig, AiProvider, ProviderConfig, Result, ThesisForgeError};

use super::prompt;
use super::{EnhancementCapability, EnhancementRequest, EnhancementResult};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|e| ThesisForgeError::Network(format!("failed to create HTTP client: {e}")))
}

async fn error_for_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ThesisForgeError::Enhancement(format!(
        "{provider} API error ({status}): {}",
        body.chars().take(200).collect::<String>()
    )))
}

// ---------------------------------------------------------------------------
// Anthropic Messages API
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

pub struct ClaudeCapability {
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl std::fmt::Debug for ClaudeCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeCapability")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ClaudeCapability {
    pub fn new(config: &ProviderConfig, api_key: SecretString) -> Result<Self> {
        Ok(Self {
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl EnhancementCapability for ClaudeCapability {
    async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResult> {
        let prompt = prompt::build(request, self.max_tokens);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: prompt.max_tokens,
            messages: vec![Message {
                role: "user",
                content: &prompt.text,
            }],
        };

        debug!(model = %self.model, span = %request.span, "sending Anthropic request");
        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ThesisForgeError::Network(format!("Anthropic request failed: {e}")))?;

        let parsed: MessagesResponse = error_for_status("Anthropic", response)
            .await?
            .json()
            .await
            .map_err(|e| ThesisForgeError::Enhancement(format!("invalid Anthropic response: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ThesisForgeError::Enhancement("no text in Anthropic response".into()))?;

        Ok(prompt::interpret(request, &text))
    }
}

// ---------------------------------------------------------------------------
// OpenAI Chat Completions
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCapability {
    api_key: SecretString,
    api_base: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCapability")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiCapability {
    pub fn new(config: &ProviderConfig, api_key: SecretString) -> Result<Self> {
        Ok(Self {
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            client: build_client()?,
        })
    }
}

#[async_trait]
impl EnhancementCapability for OpenAiCapability {
    async fn enhance(&self, request: &EnhancementRequest) -> Result<EnhancementResult> {
        let prompt = prompt::build(request, self.max_tokens);
        let body = ChatRequest {
            model: &self.model,
            max_tokens: prompt.max_tokens,
            messages: vec![Message {
                role: "user",
                content: &prompt.text,
            }],
        };

        debug!(model = %self.model, span = %request.span, "sending OpenAI request");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ThesisForgeError::Network(format!("OpenAI request failed: {e}")))?;

        let parsed: ChatResponse = error_for_status("OpenAI", response)
            .await?
            .json()
            .await
            .map_err(|e| ThesisForgeError::Enhancement(format!("invalid OpenAI response: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| ThesisForgeError::Enhancement("no content in OpenAI response".into()))?;

        Ok(prompt::interpret(request, &text))
    }
}

// ---------------------------------------------------------------------------
// Missing credentials
// ---------------------------------------------------------------------------

/// Stands in when no provider can be constructed; every call fails with
/// the stored reason so spans degrade visibly.
#[derive(Debug, Clone)]
pub struct UnavailableCapability {
    reason: String,
}

impl UnavailableCapability {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl EnhancementCapability for UnavailableCapability {
    async fn enhance(&self, _request: &EnhancementRequest) -> Result<EnhancementResult> {
        Err(ThesisForgeError::Enhancement(self.reason.clone()))
    }
}

/// Build the capability for `provider`, falling back to
/// [`UnavailableCapability`] when the key is missing or the client fails.
pub fn capability_for(
    config: &AiConfig,
    provider: AiProvider,
    api_key: Option<SecretString>,
) -> Arc<dyn EnhancementCapability> {
    let settings = config.provider(provider);
    let Some(api_key) = api_key else {
        let reason = format!(
            "{} API key not configured (set {})",
            provider.as_str(),
            settings.api_key_env
        );
        warn!(%reason, "AI enhancement unavailable");
        return Arc::new(UnavailableCapability::new(reason));
    };

    let built: Result<Arc<dyn EnhancementCapability>> = match provider {
        AiProvider::Claude => {
            ClaudeCapability::new(settings, api_key).map(|c| Arc::new(c) as Arc<dyn EnhancementCapability>)
        }
        AiProvider::Gpt4 => {
            OpenAiCapability::new(settings, api_key).map(|c| Arc::new(c) as Arc<dyn EnhancementCapability>)
        }
    };

    built.unwrap_or_else(|e| {
        warn!(error = %e, "AI enhancement unavailable");
        Arc::new(UnavailableCapability::new(e.to_string()))
    })
}
