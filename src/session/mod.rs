//! Browser session capability traits.
//!
//! The aggregation engine drives sites through this narrow capability
//! surface: open a page, wait for a query to match, locate elements,
//! read text, type and click, release the session. The production
//! implementation lives in [`chrome`] on top of chromiumoxide; tests
//! drive the engine with scripted fakes.

pub mod chrome;

use crate::engine::FailureKind;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use chrome::ChromeSessionProvider;

/// Convenience alias for Result with [`SessionError`].
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by a browser session backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A previously located element handle became invalid because the
    /// underlying page mutated before it was read.
    #[error("element handle went stale")]
    Stale,

    /// The query matched no element.
    #[error("no element matched the query")]
    NotFound,

    /// The page failed to load.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Any other backend fault, with the backend's message preserved.
    #[error("browser backend error: {0}")]
    Backend(String),
}

impl SessionError {
    /// Map a session error to the engine's failure taxonomy.
    ///
    /// `Stale` maps to [`FailureKind::StaleElement`]; when the stale
    /// handle was the container list itself the caller upgrades it to
    /// [`FailureKind::StaleList`].
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Stale => FailureKind::StaleElement,
            Self::NotFound => FailureKind::ElementNotFound,
            Self::Navigation(_) => FailureKind::NavigationError,
            Self::Backend(msg) => {
                let msg = msg.to_lowercase();
                if msg.contains("timeout") || msg.contains("timed out") {
                    FailureKind::Timeout
                } else {
                    FailureKind::Unclassified
                }
            }
        }
    }
}

/// Handle to one located DOM element.
#[async_trait]
pub trait DomElement: Send + Sync {
    /// Locate a descendant by sub-query. `Ok(None)` when nothing
    /// matches; `Err(Stale)` when this handle is no longer valid.
    async fn find_one(&self, query: &str) -> SessionResult<Option<Box<dyn DomElement>>>;

    /// Visible text content of the element.
    async fn text(&self) -> SessionResult<String>;

    /// Type text into the element.
    async fn send_keys(&self, text: &str) -> SessionResult<()>;

    /// Click the element.
    async fn click(&self) -> SessionResult<()>;
}

/// One browser page, exclusively owned by its holder for the duration
/// of a round (sequential mode) or a single source (parallel mode).
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the page to `url` and wait for the load to settle.
    async fn navigate(&self, url: &str) -> SessionResult<()>;

    /// Wait until `query` matches, bounded by `timeout`. Returns
    /// `Ok(false)` when the timeout elapses without a match.
    async fn wait_for(&self, query: &str, timeout: Duration) -> SessionResult<bool>;

    /// All elements currently matching `query`, in document order.
    async fn find_all(&self, query: &str) -> SessionResult<Vec<Box<dyn DomElement>>>;

    /// Release the session. Called exactly once per acquired session;
    /// [`SessionGuard`] enforces this on every exit path.
    async fn close(&self) -> SessionResult<()>;
}

/// Hands out browser sessions to the orchestrator.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open a fresh session. Each call returns a page owned solely by
    /// the caller.
    async fn session(&self) -> SessionResult<Box<dyn BrowserSession>>;
}

/// RAII wrapper ensuring an acquired session is released on every exit
/// path, including cancellation and panics.
///
/// The graceful path is an explicit [`close`](Self::close); when the
/// guard is dropped without one (cancelled round, error path) the
/// close is spawned onto the runtime so release still happens.
pub struct SessionGuard {
    session: Option<Box<dyn BrowserSession>>,
    label: String,
}

impl SessionGuard {
    #[must_use]
    pub fn new(session: Box<dyn BrowserSession>, label: impl Into<String>) -> Self {
        Self {
            session: Some(session),
            label: label.into(),
        }
    }

    /// Borrow the guarded session.
    #[must_use]
    pub fn session(&self) -> &dyn BrowserSession {
        match &self.session {
            Some(session) => session.as_ref(),
            // close() consumes the guard, so the slot is always
            // populated while a borrow is possible.
            None => unreachable!("session guard accessed after close"),
        }
    }

    /// Release the session now.
    pub async fn close(mut self) -> SessionResult<()> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let label = std::mem::take(&mut self.label);
            tokio::spawn(async move {
                if let Err(e) = session.close().await {
                    warn!(%label, error = %e, "failed to release session on drop");
                }
            });
        }
    }
}
