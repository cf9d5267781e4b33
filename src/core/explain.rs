//! AI Explanations
//!
//! Asks a chat-completion service to explain the selected text. Supports
//! OpenAI-compatible, Anthropic and Ollama endpoints.

use crate::config::Config;
use crate::core::text::truncate_selection;
use crate::error::{ReadAloudError, ReadAloudResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You explain text that a reader selected on a web page. \
Answer in plain language, in at most a few short paragraphs, without preamble.";
const MAX_TOKENS: u32 = 500;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait Explainer: Send + Sync {
    /// Explain `text`, answering in `lang` when given
    async fn explain(&self, text: &str, lang: Option<&str>) -> ReadAloudResult<String>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Ollama,
}

impl FromStr for Provider {
    type Err = ReadAloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ReadAloudError::Config(format!(
                "unknown explain provider '{other}'"
            ))),
        }
    }
}

impl Provider {
    fn endpoint(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            Self::OpenAi => format!("{base}/v1/chat/completions"),
            Self::Anthropic => format!("{base}/v1/messages"),
            Self::Ollama => format!("{base}/api/chat"),
        }
    }

    fn build_body(&self, model: &str, prompt: &str) -> Value {
        match self {
            Self::OpenAi => json!({
                "model": model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": prompt }
                ],
                "temperature": 0.3,
                "max_tokens": MAX_TOKENS
            }),
            Self::Anthropic => json!({
                "model": model,
                "system": SYSTEM_PROMPT,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": MAX_TOKENS
            }),
            Self::Ollama => json!({
                "model": model,
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    { "role": "user", "content": prompt }
                ],
                "stream": false,
                "options": { "temperature": 0.3 }
            }),
        }
    }

    fn parse_answer(&self, body: &Value) -> Option<String> {
        let text = match self {
            Self::OpenAi => body["choices"][0]["message"]["content"].as_str(),
            Self::Anthropic => body["content"]
                .as_array()?
                .iter()
                .find(|block| block["type"] == "text")
                .and_then(|block| block["text"].as_str()),
            Self::Ollama => body["message"]["content"].as_str(),
        }?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

pub fn build_prompt(text: &str, lang: Option<&str>) -> String {
    let language_hint = lang
        .map(|lang| format!(" Answer in the language with tag {lang}."))
        .unwrap_or_default();
    format!("Explain the following text.{language_hint}\n\n\"\"\"\n{text}\n\"\"\"")
}

/// 429 and 5xx responses, timeouts and connection failures are worth retrying.
fn is_retryable(error: &ReadAloudError) -> bool {
    match error {
        ReadAloudError::Api { status, .. } => *status == 429 || *status >= 500,
        ReadAloudError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        _ => false,
    }
}

/// Chat-completion backed explainer
#[derive(Debug, Clone)]
pub struct ChatExplainer {
    client: reqwest::Client,
    provider: Provider,
    url: String,
    model: String,
    api_key: Option<String>,
    max_retries: usize,
    max_chars: usize,
    retry_base: Duration,
}

impl ChatExplainer {
    /// Create new explainer from config
    pub fn new(config: &Config) -> ReadAloudResult<Self> {
        if !config.explain_enabled {
            return Err(ReadAloudError::Config("explanations are disabled".into()));
        }
        let provider = config.explain_provider.parse()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.explain_timeout_secs.max(1)))
            .build()?;
        let api_key = (!config.explain_api_key.is_empty()).then(|| config.explain_api_key.clone());
        if api_key.is_none() && provider != Provider::Ollama {
            warn!("⚠️ No API key configured for {:?}", provider);
        }

        Ok(Self {
            client,
            provider,
            url: config.explain_url.clone(),
            model: config.explain_model.clone(),
            api_key,
            max_retries: config.explain_max_retries,
            max_chars: config.explain_max_chars.max(1),
            retry_base: Duration::from_millis(250),
        })
    }

    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    async fn request_once(&self, body: &Value) -> ReadAloudResult<String> {
        let mut request = self
            .client
            .post(self.provider.endpoint(&self.url))
            .json(body);
        request = match (self.provider, &self.api_key) {
            (Provider::OpenAi, Some(key)) => request.bearer_auth(key),
            (Provider::Anthropic, Some(key)) => request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (Provider::Anthropic, None) => request.header("anthropic-version", ANTHROPIC_VERSION),
            _ => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let body_text = response.text().await?;

        if !status.is_success() {
            warn!("❌ Explain API Error ({}): {}", status, body_text);
            return Err(ReadAloudError::Api {
                status: status.as_u16(),
                message: body_text,
            });
        }

        debug!("🧠 Explain raw body: {}", body_text);
        let parsed: Value = serde_json::from_str(&body_text)?;
        self.provider.parse_answer(&parsed).ok_or_else(|| {
            ReadAloudError::Explain(format!("no answer in response: {body_text}"))
        })
    }
}

#[async_trait]
impl Explainer for ChatExplainer {
    async fn explain(&self, text: &str, lang: Option<&str>) -> ReadAloudResult<String> {
        let selection = truncate_selection(text, self.max_chars);
        if selection.is_empty() {
            return Err(ReadAloudError::Explain("nothing selected to explain".into()));
        }

        info!(
            "🧠 Explaining {} chars via {:?} ({})",
            selection.chars().count(),
            self.provider,
            self.model
        );
        let body = self
            .provider
            .build_body(&self.model, &build_prompt(&selection, lang));

        let factor = (self.retry_base.as_millis() / 2).max(1) as u64;
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(Duration::from_secs(8))
            .map(jitter)
            .take(self.max_retries);

        RetryIf::spawn(strategy, || self.request_once(&body), |e: &ReadAloudError| {
            let retry = is_retryable(e);
            if retry {
                warn!("🔁 Retrying explain request: {}", e);
            }
            retry
        })
        .await
    }

    fn name(&self) -> &str {
        match self.provider {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Ollama => "ollama",
        }
    }
}
