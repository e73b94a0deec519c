//! Retry controller behavior: attempt bounds, fixed delays, fatal
//! short-circuit and degradation to an empty result.

mod common;

use std::time::Duration;

use autovitrine::engine::{retry, AttemptOutcome, ExtractionResult, FailureKind, Query, RetryPolicy};
use common::{records, FakeSession, ScriptedAdapter};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn success_on_first_attempt_returns_immediately() {
    let adapter = ScriptedAdapter::new("icarros").then(AttemptOutcome::Success(records("Opala", 3)));
    let session = FakeSession::new();

    let result = retry::fetch(
        &adapter,
        &session,
        &Query::new("Opala"),
        &CancellationToken::new(),
        None,
    )
    .await;

    assert_eq!(result.len(), 3);
    assert_eq!(adapter.attempts(), 1);
}

// Scenario: two stale-list failures, then one record on the third
// attempt, well within a five-retry budget. The fetch must return that
// record after exactly two retry delays.
#[tokio::test(start_paused = true)]
async fn stale_list_twice_then_success() {
    let record = ExtractionResult::new(vec![
        autovitrine::engine::Record::new("Opala 1976", "R$50.000").expect("valid record"),
    ]);
    let adapter = ScriptedAdapter::new("icarros")
        .then(AttemptOutcome::Retryable(FailureKind::StaleList))
        .then(AttemptOutcome::Retryable(FailureKind::StaleList))
        .then(AttemptOutcome::Success(record.clone()))
        .with_policy(RetryPolicy::new(5, Duration::from_secs(5)));
    let session = FakeSession::new();

    let start = tokio::time::Instant::now();
    let result = retry::fetch(
        &adapter,
        &session,
        &Query::new("Opala"),
        &CancellationToken::new(),
        None,
    )
    .await;

    assert_eq!(result, record);
    assert_eq!(adapter.attempts(), 3);
    // Two retry delays of 5 s each, nothing more.
    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_is_bounded_and_degrades_to_empty() {
    let adapter = ScriptedAdapter::new("olx")
        .with_fallback(AttemptOutcome::Retryable(FailureKind::Timeout))
        .with_policy(RetryPolicy::new(3, Duration::from_secs(5)));
    let session = FakeSession::new();

    let start = tokio::time::Instant::now();
    let result = retry::fetch(
        &adapter,
        &session,
        &Query::new("Opala"),
        &CancellationToken::new(),
        None,
    )
    .await;

    assert!(result.is_empty());
    // One initial attempt plus max_retries retries.
    assert_eq!(adapter.attempts(), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn fatal_failure_short_circuits_without_delay() {
    let adapter = ScriptedAdapter::new("napista")
        .then(AttemptOutcome::Fatal(FailureKind::NavigationError))
        .with_policy(RetryPolicy::new(5, Duration::from_secs(5)));
    let session = FakeSession::new();

    let start = tokio::time::Instant::now();
    let result = retry::fetch(
        &adapter,
        &session,
        &Query::new("Opala"),
        &CancellationToken::new(),
        None,
    )
    .await;

    assert!(result.is_empty());
    assert_eq!(adapter.attempts(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_the_retry_delay() {
    let adapter = ScriptedAdapter::new("olx")
        .with_fallback(AttemptOutcome::Retryable(FailureKind::Timeout))
        .with_policy(RetryPolicy::new(100, Duration::from_secs(5)));
    let session = FakeSession::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let start = tokio::time::Instant::now();
    let result = retry::fetch(&adapter, &session, &Query::new("Opala"), &cancel, None).await;

    assert!(result.is_empty());
    assert_eq!(adapter.attempts(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

// Replaying the same outcome script twice yields the same result.
#[tokio::test(start_paused = true)]
async fn replay_of_the_same_script_is_deterministic() {
    let script = || {
        ScriptedAdapter::new("autoline")
            .then(AttemptOutcome::Retryable(FailureKind::StaleElement))
            .then(AttemptOutcome::Success(records("Chevette", 2)))
            .with_policy(RetryPolicy::new(5, Duration::from_secs(5)))
    };
    let session = FakeSession::new();
    let query = Query::new("Chevette");
    let cancel = CancellationToken::new();

    let first = retry::fetch(&script(), &session, &query, &cancel, None).await;
    let second = retry::fetch(&script(), &session, &query, &cancel, None).await;

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

// A cancellation that arrives while the attempt itself is still
// running must abort it, not wait the attempt out.
#[tokio::test(start_paused = true)]
async fn cancellation_aborts_an_in_flight_attempt() {
    let adapter = ScriptedAdapter::new("icarros")
        .with_attempt_delay(Duration::from_secs(1000))
        .with_fallback(AttemptOutcome::Success(records("Opala", 1)));
    let session = FakeSession::new();
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            cancel.cancel();
        }
    };

    let start = tokio::time::Instant::now();
    let query = Query::new("Opala");
    let (result, ()) = tokio::join!(
        retry::fetch(&adapter, &session, &query, &cancel, None),
        canceller
    );

    assert!(result.is_empty());
    assert_eq!(adapter.attempts(), 1);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_an_in_flight_attempt() {
    let adapter = ScriptedAdapter::new("icarros")
        .with_attempt_delay(Duration::from_secs(1000))
        .with_fallback(AttemptOutcome::Success(records("Opala", 1)));
    let session = FakeSession::new();
    let deadline = Some(tokio::time::Instant::now() + Duration::from_secs(12));

    let start = tokio::time::Instant::now();
    let result = retry::fetch(
        &adapter,
        &session,
        &Query::new("Opala"),
        &CancellationToken::new(),
        deadline,
    )
    .await;

    assert!(result.is_empty());
    assert_eq!(start.elapsed(), Duration::from_secs(12));
}
