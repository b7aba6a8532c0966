//! HTTP gateway to an OpenAI-compatible chat-completion provider.
//!
//! Single chokepoint for model calls: every request passes the token bucket,
//! carries the zero-data-retention header, and is retried with exponential
//! backoff on transient failure. 429s get their own lane — the first two per
//! call do not consume the retry budget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::rate::{RateLimits, TokenBucket};
use super::{CallOptions, ChatMessage, ChatModel, LlmError};

/// Asserted on every outbound request; the provider must not train on or
/// retain journal content.
const ZDR_HEADER: (&str, &str) = ("X-Data-Retention", "zero");

/// 429 occurrences per call that are forgiven before counting against the
/// retry budget.
const RATE_LIMIT_FREE_PASSES: u32 = 2;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Per-request timeout; must stay under the worker invocation budget.
    pub request_timeout: Duration,
    /// Transient-failure retries per call.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub limits: RateLimits,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            request_timeout: Duration::from_secs(45),
            max_retries: 3,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            limits: RateLimits::default(),
        }
    }
}

pub struct LlmGateway {
    config: GatewayConfig,
    client: reqwest::blocking::Client,
    bucket: TokenBucket,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl LlmGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        let bucket = TokenBucket::new(config.limits);
        Ok(Self {
            config,
            client,
            bucket,
        })
    }

    fn send_once(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: options.temperature,
            response_format: options.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header(ZDR_HEADER.0, ZDR_HEADER.1)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(LlmError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        let text = response
            .text()
            .map_err(|e| LlmError::Network(e.to_string()))?;
        extract_completion(&text)
    }
}

impl ChatModel for LlmGateway {
    fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CallOptions,
    ) -> Result<String, LlmError> {
        let mut attempt: u32 = 0;
        let mut rate_hits: u32 = 0;
        loop {
            self.bucket.acquire()?;
            let err = match self.send_once(messages, options) {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };
            match err {
                LlmError::RateLimited { retry_after } => {
                    let delay = retry_after
                        .unwrap_or_else(|| backoff_delay(self.config.backoff_base, attempt))
                        .min(self.config.backoff_cap);
                    if rate_hits < RATE_LIMIT_FREE_PASSES {
                        rate_hits += 1;
                    } else {
                        attempt += 1;
                        if attempt > self.config.max_retries {
                            return Err(LlmError::RetriesExhausted {
                                attempts: attempt,
                                last: "rate limited".into(),
                            });
                        }
                    }
                    tracing::warn!(delay_ms = delay.as_millis() as u64, "Provider rate limit, pausing");
                    std::thread::sleep(delay);
                }
                e if e.is_transient() => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(LlmError::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    let delay =
                        backoff_delay(self.config.backoff_base, attempt).min(self.config.backoff_cap);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient provider failure, backing off"
                    );
                    std::thread::sleep(delay);
                }
                e => return Err(e),
            }
        }
    }
}

/// `base × 2^attempt`, saturating.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Pull `choices[0].message.content` out of a chat-completion response.
fn extract_completion(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| LlmError::Api {
        status: 200,
        message: format!("Unparseable completion body: {e}"),
    })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(LlmError::EmptyCompletion)
}
