use std::sync::Arc;

use crate::fields::{FieldSpec, resolve_keys};
use crate::oracle::{CompletionOracle, CompletionRequest};
use crate::prompt::build_prompt;
use crate::response::{parse_completion, reconcile};
use crate::retry::{RetryPolicy, complete_with_retry};
use crate::ExtractionResult;

/// Knobs for one extraction run. See [`crate::Config::extraction_settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// Output-length ceiling passed to the oracle.
    pub max_tokens: u32,
    /// Treat a reply whose key set differs from the request as a failure.
    pub enforce_key_set: bool,
    /// Fresh oracle calls allowed after an unparseable or mismatched reply.
    pub response_retries: u32,
    /// Transport-level retry for transient oracle faults.
    pub retry: RetryPolicy,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        crate::Config::default().extraction_settings()
    }
}

/// Turns document text plus a list of requested fields into field values by
/// asking the oracle.
///
/// Holds no per-request state; one instance is shared by all requests.
#[derive(Clone)]
pub struct FieldExtractor {
    oracle: Arc<dyn CompletionOracle>,
    settings: ExtractionSettings,
}

impl FieldExtractor {
    pub fn new(oracle: Arc<dyn CompletionOracle>, settings: ExtractionSettings) -> Self {
        Self { oracle, settings }
    }

    pub fn settings(&self) -> &ExtractionSettings {
        &self.settings
    }

    /// Extract values for `specs` from `text`.
    ///
    /// Never fails outright: every failure path ends in
    /// [`ExtractionResult::Error`] with a non-empty message.
    pub async fn extract_fields(&self, text: &str, specs: &[FieldSpec]) -> ExtractionResult {
        let keys = resolve_keys(specs);
        if keys.is_empty() {
            return ExtractionResult::Error("No form fields requested".to_string());
        }

        let request = CompletionRequest::new(build_prompt(specs, text), self.settings.max_tokens);
        let attempts = self.settings.response_retries.saturating_add(1);

        tracing::info!(
            oracle = self.oracle.name(),
            fields = keys.len(),
            text_len = text.len(),
            "extracting form fields"
        );

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            let completion =
                match complete_with_retry(self.oracle.as_ref(), &request, &self.settings.retry).await {
                    Ok(completion) => completion,
                    Err(e) => return ExtractionResult::Error(e.to_string()),
                };

            tracing::debug!(attempt, completion = %completion, "model response");

            let outcome = parse_completion(&completion)
                .and_then(|object| reconcile(object, &keys, self.settings.enforce_key_set));

            match outcome {
                Ok(values) => {
                    let found = values.values().filter(|v| v.is_some()).count();
                    tracing::info!(attempt, fields = values.len(), found, "extraction complete");
                    return ExtractionResult::Fields(values);
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "unusable model response");
                    last_error = e.to_string();
                }
            }
        }

        ExtractionResult::Error(last_error)
    }
}
