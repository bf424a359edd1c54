//! OpenAI-compatible chat-completions client (DeepSeek by default).

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::{CompletionOracle, CompletionRequest, OracleError};
use crate::retry::retry_after_from_headers;
use crate::{Config, ConfigError};

/// Client for `POST {base_url}/chat/completions`.
///
/// Built once at startup and shared read-only across requests.
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    pub fn new(client: reqwest::Client, base_url: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Build a client with its own `reqwest::Client` using the configured timeout.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("formfill/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::new(
            client,
            &config.base_url,
            &config.model,
            config.api_key.clone(),
        ))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl CompletionOracle for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self.api_key.as_deref().ok_or(OracleError::MissingApiKey)?;

            let body = ChatRequest {
                model: &self.model,
                messages: [
                    ChatMessage {
                        role: "system",
                        content: &request.prompt.system,
                    },
                    ChatMessage {
                        role: "user",
                        content: &request.prompt.user,
                    },
                ],
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                stream: false,
            };

            let resp = self
                .client
                .post(self.endpoint())
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?;

            let resp = check_status(resp).await?;
            let data: ChatResponse = resp
                .json()
                .await
                .map_err(|e| OracleError::MalformedResponse(e.to_string()))?;

            extract_content(data)
        })
    }
}

/// Map a non-success HTTP status onto the oracle error taxonomy.
pub async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, OracleError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let code = status.as_u16();
    match code {
        429 => Err(OracleError::RateLimited {
            retry_after: retry_after_from_headers(resp.headers()),
        }),
        401 | 403 => Err(OracleError::Unauthorized { status: code }),
        500..=599 => Err(OracleError::Server { status: code }),
        _ => {
            let body = resp.text().await.unwrap_or_default();
            Err(OracleError::BadRequest {
                status: code,
                body: truncate(&body, 300),
            })
        }
    }
}

fn extract_content(data: ChatResponse) -> Result<String, OracleError> {
    data.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| OracleError::MalformedResponse("response contained no message content".into()))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
