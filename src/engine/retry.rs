//! Retry controller: turns a single adapter attempt into a resilient
//! fetch.
//!
//! One initial attempt plus up to `max_retries` retries with a fixed
//! delay between them. `fetch` always terminates in bounded time and
//! always returns a value; exhausting retries degrades to an empty
//! result rather than a hard error, because the orchestrator's round
//! loop is the outer safety net.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::types::{AttemptOutcome, ExtractionResult, FailureKind, Query};
use crate::session::BrowserSession;
use crate::sources::SourceAdapter;

/// Per-source retry parameters.
///
/// Shared by all adapters instead of being re-implemented per source;
/// an adapter overrides the defaults through
/// [`SourceAdapter::retry_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt, so `attempt` runs at most
    /// `max_retries + 1` times.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }
}

/// Resolves when the deadline passes; pends forever without one.
async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Drive `adapter` against `session` until it succeeds, fails fatally
/// or exhausts its retry budget.
///
/// Never returns an error: a fatal failure or exhaustion degrades to
/// an empty [`ExtractionResult`], which the orchestrator's
/// completeness test then treats as "this source is not done yet".
/// Cancellation and the deadline abort an in-flight attempt as well as
/// the retry delay, degrading the same way; the orchestrator surfaces
/// the cancellation or budget exhaustion itself.
pub async fn fetch(
    adapter: &dyn SourceAdapter,
    session: &dyn BrowserSession,
    query: &Query,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> ExtractionResult {
    let policy = adapter.retry_policy();
    let mut retries = 0u32;

    loop {
        // An attempt that completes on the same poll as a cancellation
        // keeps its outcome; only a pending attempt is abandoned.
        let outcome = tokio::select! {
            biased;
            outcome = adapter.attempt(session, query) => outcome,
            () = cancel.cancelled() => {
                debug!(source = adapter.id(), "cancelled mid-attempt");
                return ExtractionResult::default();
            }
            () = deadline_reached(deadline) => {
                warn!(source = adapter.id(), "deadline reached mid-attempt");
                return ExtractionResult::default();
            }
        };
        match outcome {
            AttemptOutcome::Success(result) => {
                debug!(
                    source = adapter.id(),
                    records = result.len(),
                    attempts = retries + 1,
                    "attempt succeeded"
                );
                return result;
            }
            AttemptOutcome::Fatal(kind) => {
                warn!(source = adapter.id(), failure = %kind, "fatal failure, giving up");
                return ExtractionResult::default();
            }
            AttemptOutcome::Retryable(kind) => {
                if retries >= policy.max_retries {
                    warn!(
                        source = adapter.id(),
                        failure = %kind,
                        attempts = retries + 1,
                        "retries exhausted, degrading to empty result"
                    );
                    return ExtractionResult::default();
                }
                retries += 1;
                match kind {
                    FailureKind::Unclassified => warn!(
                        source = adapter.id(),
                        failure = %kind,
                        retry = retries,
                        "retryable failure"
                    ),
                    _ => debug!(
                        source = adapter.id(),
                        failure = %kind,
                        retry = retries,
                        "retryable failure"
                    ),
                }
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!(source = adapter.id(), "cancelled during retry delay");
                        return ExtractionResult::default();
                    }
                    () = deadline_reached(deadline) => {
                        warn!(source = adapter.id(), "deadline reached during retry delay");
                        return ExtractionResult::default();
                    }
                    () = tokio::time::sleep(policy.retry_delay) => {}
                }
            }
        }
    }
}
