//! Mock oracle for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{CompletionOracle, CompletionRequest, OracleError};

/// A hand-rolled mock implementing [`CompletionOracle`] for tests.
///
/// Supports:
/// - A fixed reply (used for every call), **or**
/// - A sequence of replies (one per call, repeating the last if exhausted).
/// - Optional per-call latency.
/// - Call counting via [`call_count()`](MockOracle::call_count) and access to
///   the last request seen.
pub struct MockOracle {
    /// Pending replies, stored reversed so `pop()` yields the next one.
    replies: Mutex<Vec<Result<String, OracleError>>>,
    /// Returned once the sequence is exhausted.
    fallback: Result<String, OracleError>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    last_request: Mutex<Option<CompletionRequest>>,
}

impl MockOracle {
    /// Create a mock that always returns `reply`.
    pub fn new(reply: Result<String, OracleError>) -> Self {
        Self {
            replies: Mutex::new(Vec::new()),
            fallback: reply,
            delay: None,
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Create a mock that always answers with `text`.
    pub fn replying(text: &str) -> Self {
        Self::new(Ok(text.to_string()))
    }

    /// Create a mock that always fails with `error`.
    pub fn failing(error: OracleError) -> Self {
        Self::new(Err(error))
    }

    /// Create a mock that returns replies in order, repeating the last one.
    ///
    /// Panics if `replies` is empty.
    pub fn with_sequence(mut replies: Vec<Result<String, OracleError>>) -> Self {
        assert!(!replies.is_empty(), "sequence must have at least one reply");
        let fallback = replies[replies.len() - 1].clone();
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Set simulated latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `complete()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The most recent request passed to `complete()`.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> Result<String, OracleError> {
        match self.replies.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl CompletionOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        let reply = self.next_reply();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            reply
        })
    }
}
