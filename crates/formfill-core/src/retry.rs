//! Bounded retry with exponential backoff for oracle calls.
//!
//! Only transient failures (network, timeout, 429, 5xx) are retried. A 429
//! with a `Retry-After` header waits for the advertised delay, capped at the
//! policy's maximum backoff.

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::oracle::{CompletionOracle, CompletionRequest, OracleError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `0` disables retrying.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Exponential backoff for the given retry number (0-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before the next attempt after `error`.
    fn delay_for(&self, error: &OracleError, retry: u32) -> Duration {
        if let OracleError::RateLimited {
            retry_after: Some(after),
        } = error
        {
            return (*after).min(self.max_delay);
        }
        let base = self.backoff(retry);
        // Up to 25% jitter.
        let jitter_ms = fastrand::u64(0..=(base.as_millis() as u64 / 4));
        (base + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }
}

/// Call `oracle` once, retrying transient failures according to `policy`.
pub async fn complete_with_retry(
    oracle: &dyn CompletionOracle,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<String, OracleError> {
    let mut retry = 0;
    loop {
        match oracle.complete(request).await {
            Ok(text) => return Ok(text),
            Err(err) if err.is_transient() && retry < policy.max_retries => {
                let wait = policy.delay_for(&err, retry);
                tracing::info!(
                    oracle = oracle.name(),
                    attempt = retry + 1,
                    error = %err,
                    wait_ms = wait.as_millis() as u64,
                    "transient oracle failure, retrying"
                );
                tokio::time::sleep(wait).await;
                retry += 1;
            }
            Err(err) => {
                tracing::warn!(oracle = oracle.name(), error = %err, "oracle call failed");
                return Err(err);
            }
        }
    }
}

/// Extract a `Retry-After` delay from response headers.
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // HTTP-date: use a conservative fixed wait rather than parsing the date.
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::mock::MockOracle;
    use crate::prompt::build_prompt;
    use crate::FieldSpec;

    fn request() -> CompletionRequest {
        CompletionRequest::new(build_prompt(&[FieldSpec::Name("name".into())], "doc"), 100)
    }

    // ── parse_retry_after ──────────────────────────────────────────────

    #[test]
    fn parse_integer_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::from_secs(0)));
    }

    #[test]
    fn parse_http_date_gmt() {
        let val = "Wed, 21 Oct 2015 07:28:00 GMT";
        assert_eq!(parse_retry_after(val), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_garbage_none() {
        assert_eq!(parse_retry_after("xyz"), None);
    }

    // ── RetryPolicy ────────────────────────────────────────────────────

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(10), Duration::from_secs(8));
        assert_eq!(policy.backoff(40), Duration::from_secs(8));
    }

    #[test]
    fn retry_after_is_honoured_but_capped() {
        let policy = RetryPolicy::default();
        let short = OracleError::RateLimited {
            retry_after: Some(Duration::from_secs(3)),
        };
        let long = OracleError::RateLimited {
            retry_after: Some(Duration::from_secs(600)),
        };
        assert_eq!(policy.delay_for(&short, 0), Duration::from_secs(3));
        assert_eq!(policy.delay_for(&long, 0), Duration::from_secs(8));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let d = policy.delay_for(&OracleError::Timeout, 0);
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_millis(625));
        }
    }

    // ── complete_with_retry ────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn success_first_try() {
        let oracle = MockOracle::replying("{}").with_delay(Duration::from_secs(1));
        let out = complete_with_retry(&oracle, &request(), &RetryPolicy::default()).await;
        assert_eq!(out.unwrap(), "{}");
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success() {
        let oracle = MockOracle::with_sequence(vec![
            Err(OracleError::Server { status: 502 }),
            Ok("{\"name\": null}".into()),
        ]);
        let out = complete_with_retry(&oracle, &request(), &RetryPolicy::default()).await;
        assert_eq!(out.unwrap(), "{\"name\": null}");
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let oracle = MockOracle::failing(OracleError::Timeout);
        let policy = RetryPolicy::default();
        let out = complete_with_retry(&oracle, &request(), &policy).await;
        assert_eq!(out.unwrap_err(), OracleError::Timeout);
        assert_eq!(oracle.call_count(), 1 + policy.max_retries as usize);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_error_no_retry() {
        let oracle = MockOracle::failing(OracleError::Unauthorized { status: 401 });
        let out = complete_with_retry(&oracle, &request(), &RetryPolicy::default()).await;
        assert!(out.is_err());
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let oracle = MockOracle::failing(OracleError::Transport("connection refused".into()));
        let out = complete_with_retry(&oracle, &request(), &RetryPolicy::no_retries()).await;
        assert!(out.is_err());
        assert_eq!(oracle.call_count(), 1);
    }
}
