//! Scripted fakes shared by the integration tests.
//!
//! The engine is driven entirely through the session and adapter
//! traits, so tests script those seams: `FakeSession` replays queued
//! DOM outcomes, `ScriptedAdapter` replays queued attempt outcomes,
//! and `FakeProvider` hands out fake sessions while counting
//! acquisitions and releases.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use autovitrine::engine::{AttemptOutcome, ExtractionResult, Query, Record, RetryPolicy};
use autovitrine::session::{
    BrowserSession, DomElement, SessionError, SessionProvider, SessionResult,
};
use autovitrine::sources::SourceAdapter;

// =============================================================================
// Fake DOM elements
// =============================================================================

/// A scripted DOM element: fixed text, optional children keyed by
/// sub-query, optionally stale.
#[derive(Clone, Default)]
pub struct FakeElement {
    text: String,
    stale: bool,
    children: HashMap<String, FakeElement>,
}

impl FakeElement {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn stale() -> Self {
        Self {
            stale: true,
            ..Self::default()
        }
    }

    pub fn child(mut self, query: &str, element: FakeElement) -> Self {
        self.children.insert(query.to_string(), element);
        self
    }

    /// A listing container exposing `name_query` and `price_query`
    /// children with the given texts.
    pub fn listing(name_query: &str, name: &str, price_query: &str, price: &str) -> Self {
        Self::default()
            .child(name_query, Self::with_text(name))
            .child(price_query, Self::with_text(price))
    }
}

#[async_trait]
impl DomElement for FakeElement {
    async fn find_one(&self, query: &str) -> SessionResult<Option<Box<dyn DomElement>>> {
        if self.stale {
            return Err(SessionError::Stale);
        }
        Ok(self
            .children
            .get(query)
            .cloned()
            .map(|el| Box::new(el) as Box<dyn DomElement>))
    }

    async fn text(&self) -> SessionResult<String> {
        if self.stale {
            return Err(SessionError::Stale);
        }
        Ok(self.text.clone())
    }

    async fn send_keys(&self, _text: &str) -> SessionResult<()> {
        if self.stale {
            return Err(SessionError::Stale);
        }
        Ok(())
    }

    async fn click(&self) -> SessionResult<()> {
        if self.stale {
            return Err(SessionError::Stale);
        }
        Ok(())
    }
}

// =============================================================================
// Fake session
// =============================================================================

/// Scripted browser session.
///
/// Outcomes are consumed front-to-back per operation; exhausted queues
/// fall back to permissive defaults (`navigate` → ok, `wait_for` →
/// matched, `find_all` → no elements) so tests only script what they
/// assert on.
#[derive(Default)]
pub struct FakeSession {
    navigate_outcomes: Mutex<VecDeque<SessionResult<()>>>,
    wait_outcomes: Mutex<VecDeque<SessionResult<bool>>>,
    find_outcomes: Mutex<VecDeque<SessionResult<Vec<FakeElement>>>>,
    pub navigated: Mutex<Vec<String>>,
    closes: Arc<AtomicUsize>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a close counter, so a provider can observe releases.
    pub fn with_close_counter(counter: Arc<AtomicUsize>) -> Self {
        Self {
            closes: counter,
            ..Self::default()
        }
    }

    pub fn on_navigate(self, outcome: SessionResult<()>) -> Self {
        self.navigate_outcomes
            .lock()
            .expect("lock poisoned")
            .push_back(outcome);
        self
    }

    pub fn on_wait(self, outcome: SessionResult<bool>) -> Self {
        self.wait_outcomes
            .lock()
            .expect("lock poisoned")
            .push_back(outcome);
        self
    }

    pub fn on_find(self, outcome: SessionResult<Vec<FakeElement>>) -> Self {
        self.find_outcomes
            .lock()
            .expect("lock poisoned")
            .push_back(outcome);
        self
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        self.navigated
            .lock()
            .expect("lock poisoned")
            .push(url.to_string());
        self.navigate_outcomes
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn wait_for(&self, _query: &str, _timeout: Duration) -> SessionResult<bool> {
        self.wait_outcomes
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(Ok(true))
    }

    async fn find_all(&self, _query: &str) -> SessionResult<Vec<Box<dyn DomElement>>> {
        let outcome = self
            .find_outcomes
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()));
        outcome.map(|elements| {
            elements
                .into_iter()
                .map(|el| Box::new(el) as Box<dyn DomElement>)
                .collect()
        })
    }

    async fn close(&self) -> SessionResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Fake provider
// =============================================================================

/// Hands out scripted sessions; defaults to a fresh permissive
/// `FakeSession` when the queue is empty. Counts how many sessions
/// were opened and how many were closed.
#[derive(Default)]
pub struct FakeProvider {
    sessions: Mutex<VecDeque<FakeSession>>,
    opened: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_session(&self, session: FakeSession) {
        self.sessions
            .lock()
            .expect("lock poisoned")
            .push_back(session);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn session(&self) -> SessionResult<Box<dyn BrowserSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let scripted = self.sessions.lock().expect("lock poisoned").pop_front();
        let session = match scripted {
            Some(mut session) => {
                session.closes = Arc::clone(&self.closes);
                session
            }
            None => FakeSession::with_close_counter(Arc::clone(&self.closes)),
        };
        Ok(Box::new(session))
    }
}

// =============================================================================
// Scripted adapter
// =============================================================================

/// Adapter replaying a queue of attempt outcomes, with a fallback
/// outcome once the queue is drained. An attempt delay models slow
/// navigation and selector waits.
pub struct ScriptedAdapter {
    id: &'static str,
    outcomes: Mutex<VecDeque<AttemptOutcome>>,
    fallback: AttemptOutcome,
    policy: RetryPolicy,
    requires_brand: bool,
    attempt_delay: Duration,
    attempts: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            outcomes: Mutex::new(VecDeque::new()),
            fallback: AttemptOutcome::Success(ExtractionResult::default()),
            policy: RetryPolicy::default(),
            requires_brand: false,
            attempt_delay: Duration::ZERO,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn then(self, outcome: AttemptOutcome) -> Self {
        self.outcomes
            .lock()
            .expect("lock poisoned")
            .push_back(outcome);
        self
    }

    /// Outcome returned for every attempt once the queue is drained.
    pub fn with_fallback(mut self, outcome: AttemptOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn needs_brand(mut self) -> Self {
        self.requires_brand = true;
        self
    }

    /// Make every attempt take `delay` before its outcome is returned.
    pub fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn id(&self) -> &'static str {
        self.id
    }

    fn requires_brand(&self) -> bool {
        self.requires_brand
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(&self, _session: &dyn BrowserSession, _query: &Query) -> AttemptOutcome {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.attempt_delay.is_zero() {
            tokio::time::sleep(self.attempt_delay).await;
        }
        self.outcomes
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Build a non-empty extraction result of `count` records.
pub fn records(prefix: &str, count: usize) -> ExtractionResult {
    let records: Vec<Record> = (0..count)
        .map(|i| {
            Record::new(&format!("{prefix} {i}"), &format!("R${}.000", 40 + i))
                .expect("valid record")
        })
        .collect();
    ExtractionResult::new(records)
}
