//! Language-model oracle trait and implementations.

pub mod chat;
pub mod mock;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::prompt::Prompt;

/// Sampling temperature for every extraction call: no randomness.
pub const EXTRACTION_TEMPERATURE: f32 = 0.0;

/// One completion call: the prompt plus sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: Prompt,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(prompt: Prompt, max_tokens: u32) -> Self {
        Self {
            prompt,
            temperature: EXTRACTION_TEMPERATURE,
            max_tokens,
        }
    }
}

/// Error type for oracle calls, split into transient and permanent faults.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("no API key configured for the language model")]
    MissingApiKey,
    #[error("language model request failed: {0}")]
    Transport(String),
    #[error("language model request timed out")]
    Timeout,
    #[error("language model rate limited the request (429)")]
    RateLimited { retry_after: Option<Duration> },
    #[error("language model server error (HTTP {status})")]
    Server { status: u16 },
    #[error("language model rejected the credentials (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("language model rejected the request (HTTP {status}): {body}")]
    BadRequest { status: u16, body: String },
    #[error("malformed response from language model: {0}")]
    MalformedResponse(String),
}

impl OracleError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OracleError::Transport(_)
                | OracleError::Timeout
                | OracleError::RateLimited { .. }
                | OracleError::Server { .. }
        )
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OracleError::Timeout
        } else if e.is_decode() {
            OracleError::MalformedResponse(e.to_string())
        } else {
            OracleError::Transport(e.to_string())
        }
    }
}

/// A text-completion backend: given a prompt, produce a completion.
///
/// Treated as an unreliable black box. Implementations must be cheap to
/// share across requests behind an `Arc`.
pub trait CompletionOracle: Send + Sync {
    /// Short name used in logs (e.g. "deepseek-chat").
    fn name(&self) -> &str;

    /// Run one completion call. No retries happen at this level.
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>>;
}
