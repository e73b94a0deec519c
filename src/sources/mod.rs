//! Source adapters, one per listing site.
//!
//! An adapter encapsulates one site's navigation and extraction logic
//! behind a single `attempt` operation. Adapters differ only in how
//! they reach the results page and in their selector sets; the wait
//! and pairing flow is shared in [`extract`] and the retry machinery
//! lives in the engine.

pub mod autoline;
pub mod extract;
pub mod icarros;
pub mod napista;
pub mod olx;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{AttemptOutcome, Query, RetryPolicy};
use crate::session::BrowserSession;

pub use autoline::AutolineAdapter;
pub use icarros::IcarrosAdapter;
pub use napista::NapistaAdapter;
pub use olx::OlxAdapter;

/// One external listing site adapted for retrieval.
///
/// `attempt` must never let a navigation or DOM error propagate: every
/// failure is classified into the engine's taxonomy and reported
/// through the returned [`AttemptOutcome`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable source id, used as the key of the aggregated response.
    fn id(&self) -> &'static str;

    /// Whether this source can only be searched with a brand present.
    /// Checked by the orchestrator at validation time, before any
    /// round starts.
    fn requires_brand(&self) -> bool {
        false
    }

    /// Retry parameters for this source.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Navigate the session to this site's results for `query` and
    /// extract listing records.
    async fn attempt(&self, session: &dyn BrowserSession, query: &Query) -> AttemptOutcome;
}

/// The full production adapter set, configured from the engine config.
#[must_use]
pub fn default_sources(config: &EngineConfig) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(IcarrosAdapter::new(config.wait_timeout, config.retry)),
        Arc::new(NapistaAdapter::new(config.wait_timeout, config.retry)),
        Arc::new(AutolineAdapter::new(config.wait_timeout, config.retry)),
        Arc::new(OlxAdapter::new(config.wait_timeout, config.retry)),
    ]
}
