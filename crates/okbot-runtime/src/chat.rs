//! [`ChatProvider`] – optional generative dialogue back-end.
//!
//! Every supported provider exposes an OpenAI-compatible
//! `/chat/completions` endpoint, so a single HTTP client,
//! [`OpenAiCompatible`], serves them all; only the base URL differs.
//!
//! Replies follow a small convention advertised in [`system_prompt`]: free
//! text is spoken, and an optional line starting with `ACTIONS:` lists action
//! names to perform. [`parse_reply`] splits the two.
//!
//! # Example
//!
//! ```rust,no_run
//! use okbot_runtime::chat::{ChatProvider, OpenAiCompatible, system_prompt};
//!
//! # async fn demo() -> Result<(), okbot_runtime::chat::ChatError> {
//! let provider = OpenAiCompatible::new("http://localhost:11434/v1", "llama3", "");
//! let reply = provider.chat("wave at me", &system_prompt("Robot")).await?;
//! # Ok(()) }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use okbot_hal::Action;
use okbot_types::RobotError;
use okbot_types::config::{LlmConfig, LlmProvider};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Prefix of the directive line in a model reply.
pub const ACTIONS_PREFIX: &str = "ACTIONS:";

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ChatError {
    /// The HTTP request to the provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The provider answered with something other than a chat completion.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
    /// The provider is misconfigured or refused the request.
    #[error("Provider error: {0}")]
    Provider(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider trait
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn chat(&self, user_text: &str, system_prompt: &str) -> Result<String, ChatError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes (OpenAI-compatible)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAiCompatible
// ─────────────────────────────────────────────────────────────────────────────

/// Async client for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatible {
    name: String,
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatible {
    /// `base_url` is everything before `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`. An empty `api_key` sends no
    /// `Authorization` header.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: base_url.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, user_text: &str, system_prompt: &str) -> Result<String, ChatError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: user_text.to_string(),
                },
            ],
            stream: false,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChatError::Provider(format!("{status}: {detail}")));
        }
        let response: ChatResponse = response.json().await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatError::BadResponse("empty choices array".into()))
    }
}

/// Default OpenAI-compatible base URL for each provider.
pub fn default_base_url(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAI => "https://api.openai.com/v1",
        LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        LlmProvider::DeepSeek => "https://api.deepseek.com/v1",
        LlmProvider::Doubao => "https://ark.cn-beijing.volces.com/api/v3",
        LlmProvider::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        LlmProvider::Grok => "https://api.x.ai/v1",
        LlmProvider::Ollama => "http://localhost:11434/v1",
    }
}

/// Build the configured provider, or `None` when generative mode is off.
///
/// # Errors
///
/// [`RobotError::Config`] when a hosted provider has no API key.
pub fn provider_from_config(cfg: &LlmConfig) -> Result<Option<Arc<dyn ChatProvider>>, RobotError> {
    if !cfg.enabled {
        return Ok(None);
    }
    if cfg.api_key.is_empty() && cfg.provider != LlmProvider::Ollama {
        return Err(RobotError::Config(format!(
            "LLM provider '{}' needs an api_key",
            cfg.provider
        )));
    }
    let base_url = if cfg.base_url.is_empty() {
        default_base_url(cfg.provider).to_string()
    } else {
        cfg.base_url.clone()
    };
    debug!(provider = %cfg.provider, %base_url, model = %cfg.model, "chat provider configured");
    let provider = OpenAiCompatible::new(base_url, cfg.model.clone(), cfg.api_key.clone())
        .named(cfg.provider.to_string());
    Ok(Some(Arc::new(provider)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompt and reply convention
// ─────────────────────────────────────────────────────────────────────────────

/// System prompt describing the robot's abilities and the directive format.
pub fn system_prompt(robot_name: &str) -> String {
    let actions: Vec<&str> = Action::ALL.iter().map(|a| a.name()).collect();
    format!(
        "You are {robot_name}, a friendly PiCar-X robot car assistant.\n\
         You can perform physical actions. When you want to perform an action, put them on a\n\
         line starting with \"{ACTIONS_PREFIX}\" followed by comma-separated action names.\n\
         \n\
         Available actions:\n\
         {}\n\
         \n\
         Available modes (say these to enter autonomous mode):\n\
         line_track, obstacle_avoid\n\
         \n\
         Keep responses short and fun. Use actions to express emotions.\n\
         Example response:\n\
         Sure, turning left now!\n\
         {ACTIONS_PREFIX} turn_left\n",
        actions.join(", ")
    )
}

/// A model reply split into speech and requested action names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    pub speech: String,
    /// Lowercase, with underscores turned into spaces (`"turn left"`).
    pub actions: Vec<String>,
}

/// Split `reply` into spoken text and the `ACTIONS:` directive.
///
/// The directive line is matched case-insensitively after trimming. If the
/// model emits several directive lines the last one wins.
pub fn parse_reply(reply: &str) -> ChatReply {
    let mut speech = Vec::new();
    let mut actions = Vec::new();
    for line in reply.lines().map(str::trim) {
        let directive = line
            .get(..ACTIONS_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(ACTIONS_PREFIX));
        if directive {
            actions = line[ACTIONS_PREFIX.len()..]
                .split(',')
                .map(|a| a.trim().to_lowercase().replace('_', " "))
                .filter(|a| !a.is_empty())
                .collect();
        } else if !line.is_empty() {
            speech.push(line);
        }
    }
    ChatReply {
        speech: speech.join(" "),
        actions,
    }
}
