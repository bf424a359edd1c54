use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

pub mod config_file;
pub mod extractor;
pub mod fields;
pub mod oracle;
pub mod prompt;
pub mod response;
pub mod retry;

// Re-export for convenience
pub use extractor::{ExtractionSettings, FieldExtractor};
pub use fields::{FieldDescriptor, FieldSpec, FieldSpecError, parse_field_specs, resolve_keys};
pub use oracle::chat::ChatCompletionsClient;
pub use oracle::{CompletionOracle, CompletionRequest, OracleError};
pub use prompt::{Prompt, build_prompt};
pub use retry::{RetryPolicy, complete_with_retry};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Extracted values keyed by resolved field key. `None` means the field was
/// not found in the document.
pub type FieldValues = BTreeMap<String, Option<String>>;

/// Outcome of one field-extraction run.
///
/// `Error` is the failure sentinel and never carries partial field data.
/// Serializes as the bare field map, or as `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Fields(FieldValues),
    Error(String),
}

impl ExtractionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ExtractionResult::Error(_))
    }

    pub fn fields(&self) -> Option<&FieldValues> {
        match self {
            ExtractionResult::Fields(values) => Some(values),
            ExtractionResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExtractionResult::Fields(_) => None,
            ExtractionResult::Error(msg) => Some(msg),
        }
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ExtractionResult::Fields(values) => values.serialize(serializer),
            ExtractionResult::Error(msg) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", msg)?;
                map.end()
            }
        }
    }
}

/// What to do when a supported document cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeFailurePolicy {
    /// Answer the request with a client error carrying the decoder message.
    #[default]
    Reject,
    /// Forward the decoder message as the document text and carry on.
    Degrade,
}

impl FromStr for DecodeFailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(DecodeFailurePolicy::Reject),
            "degrade" => Ok(DecodeFailurePolicy::Degrade),
            other => Err(ConfigError::Invalid {
                key: "decode_failure_policy",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Runtime configuration for the extraction pipeline.
///
/// Resolved once at startup (file config, then environment, then CLI flags)
/// and never mutated afterwards.
#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Retries for transient oracle failures (network, 429, 5xx).
    pub max_retries: u32,
    pub decode_failure_policy: DecodeFailurePolicy,
    /// Reject model replies whose key set differs from the requested one.
    pub enforce_key_set: bool,
    /// Fresh oracle calls allowed after an unparseable or mismatched reply.
    pub response_retries: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("decode_failure_policy", &self.decode_failure_policy)
            .field("enforce_key_set", &self.enforce_key_set)
            .field("response_retries", &self.response_retries)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2000,
            timeout_secs: 120,
            max_retries: 2,
            decode_failure_policy: DecodeFailurePolicy::Reject,
            enforce_key_set: true,
            response_retries: 1,
        }
    }
}

impl Config {
    /// Build a config from the on-disk file config, then apply environment
    /// overrides from the process environment.
    pub fn from_file_and_env(file: &config_file::ConfigFile) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_file(file);
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values present in the file config.
    pub fn apply_file(&mut self, file: &config_file::ConfigFile) {
        if let Some(oracle) = &file.oracle {
            if let Some(key) = oracle.api_key.as_ref().filter(|k| !k.is_empty()) {
                self.api_key = Some(key.clone());
            }
            if let Some(url) = &oracle.base_url {
                self.base_url = url.clone();
            }
            if let Some(model) = &oracle.model {
                self.model = model.clone();
            }
            if let Some(n) = oracle.max_tokens {
                self.max_tokens = n;
            }
            if let Some(secs) = oracle.timeout_secs {
                self.timeout_secs = secs;
            }
            if let Some(n) = oracle.max_retries {
                self.max_retries = n;
            }
        }
        if let Some(extraction) = &file.extraction {
            if let Some(policy) = extraction.decode_failure_policy {
                self.decode_failure_policy = policy;
            }
            if let Some(enforce) = extraction.enforce_key_set {
                self.enforce_key_set = enforce;
            }
            if let Some(n) = extraction.response_retries {
                self.response_retries = n;
            }
        }
    }

    /// Overlay environment variables, looked up through `lookup`.
    ///
    /// `DEEPSEEK_API_KEY` is honoured for compatibility; `FORMFILL_API_KEY`
    /// takes precedence when both are set.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("FORMFILL_API_KEY").or_else(|| non_empty("DEEPSEEK_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("FORMFILL_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("FORMFILL_MODEL") {
            self.model = model;
        }
        if let Some(secs) = non_empty("FORMFILL_TIMEOUT_SECS") {
            self.timeout_secs = secs.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "FORMFILL_TIMEOUT_SECS",
                value: secs.clone(),
            })?;
        }
        if let Some(policy) = non_empty("FORMFILL_DECODE_FAILURE_POLICY") {
            self.decode_failure_policy = policy.parse()?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }

    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            max_tokens: self.max_tokens,
            enforce_key_set: self.enforce_key_set,
            response_retries: self.response_retries,
            retry: self.retry_policy(),
        }
    }
}
