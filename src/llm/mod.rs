//! LLM provider plumbing. `ChatModel` is the seam the workers see; the
//! HTTP gateway behind it owns pacing, retries, and response extraction.

pub mod gateway;
pub mod rate;

pub use gateway::{GatewayConfig, LlmGateway};
pub use rate::{RateLimits, TokenBucket};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Provider rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Provider returned an empty completion")]
    EmptyCompletion,

    #[error("Daily request budget exhausted")]
    BudgetExhausted,

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl LlmError {
    /// Transient failures are retried with backoff; everything else bubbles.
    /// Rate limiting is handled separately (out of band of the retry budget).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Api { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// One message of an ordered chat exchange, OpenAI wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Per-call options. JSON mode is on for every pipeline call; temperature
/// stays low so replays converge.
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub temperature: f32,
    pub json_mode: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            json_mode: true,
        }
    }
}

/// The one operation the pipeline needs from a model provider.
pub trait ChatModel: Send + Sync {
    fn complete(&self, messages: &[ChatMessage], options: &CallOptions)
        -> Result<String, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::Network("reset".into()).is_transient());
        assert!(LlmError::Timeout.is_transient());
        assert!(LlmError::Api {
            status: 503,
            message: "overloaded".into()
        }
        .is_transient());
        assert!(!LlmError::Api {
            status: 400,
            message: "bad request".into()
        }
        .is_transient());
        assert!(!LlmError::RateLimited { retry_after: None }.is_transient());
        assert!(!LlmError::EmptyCompletion.is_transient());
    }

    #[test]
    fn default_options_are_conservative() {
        let opts = CallOptions::default();
        assert!(opts.json_mode);
        assert!(opts.temperature <= 0.3);
    }
}
