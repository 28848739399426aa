use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::BotError;

/// Upper bound for a single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageContent,
}

#[derive(Debug, Deserialize)]
struct ChatMessageContent {
    content: Option<String>,
}

/// Outcome of a single HTTP attempt that did not produce a reply.
enum AttemptError {
    /// Worth retrying: network trouble, timeouts, 429, 5xx.
    Transient(String),
    Permanent(String),
}

/// OpenRouter chat-completions client.
pub struct LlmClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    referer: String,
    system_prompt: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl LlmClient {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.llm_timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base_url),
            api_key: config.openrouter_api_key.clone(),
            model: config.model_id.clone(),
            referer: config.http_referer.clone(),
            system_prompt: config.system_prompt.clone(),
            max_retries: config.llm_max_retries,
            retry_backoff: config.llm_retry_backoff,
        })
    }

    /// Ask the model for a reply to `prompt`.
    ///
    /// Only the latest message is sent, framed by the fixed system prompt.
    /// Transient failures are retried with exponential backoff up to the
    /// configured limit.
    pub async fn complete(&self, user_id: &str, prompt: &str) -> Result<String, BotError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Ok(text) => {
                    tracing::debug!("Completion for user {} ({} chars)", user_id, text.len());
                    return Ok(text);
                }
                Err(AttemptError::Transient(reason)) if attempt < self.max_retries => {
                    let delay = backoff_delay(self.retry_backoff, attempt);
                    attempt += 1;
                    tracing::warn!(
                        "Completion attempt {} for user {} failed: {}; retrying in {:?}",
                        attempt,
                        user_id,
                        reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(AttemptError::Transient(reason)) | Err(AttemptError::Permanent(reason)) => {
                    return Err(BotError::Upstream(reason));
                }
            }
        }
    }

    async fn send_once(&self, request: &ChatRequest<'_>) -> Result<String, AttemptError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .json(request)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let err_body = resp.text().await.unwrap_or_default();
            let reason = format!("OpenRouter API error ({}): {}", status, err_body);
            return Err(if is_retryable(status) {
                AttemptError::Transient(reason)
            } else {
                AttemptError::Permanent(reason)
            });
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| AttemptError::Permanent(format!("malformed response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                AttemptError::Permanent("response has no choices[0].message.content".into())
            })
    }
}

/// Exponential backoff: `base * 2^attempt`, capped at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
