//! Aggregation orchestrator: the round loop.
//!
//! Runs every registered source once per round and returns only when
//! each of them has produced a non-empty result. Incomplete rounds are
//! retried after a fixed delay, bounded by a configurable round cap
//! and/or wall-clock deadline; exhausting that budget is an explicit
//! [`AggregateError::Incomplete`] instead of a hang.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::AggregateError;
use super::retry;
use super::types::{ExtractionResult, Query, RoundResult};
use crate::config::EngineConfig;
use crate::session::{SessionError, SessionGuard, SessionProvider};
use crate::sources::SourceAdapter;

/// Runs all configured source adapters for one query and applies the
/// completion policy.
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    provider: Arc<dyn SessionProvider>,
    config: EngineConfig,
}

impl Aggregator {
    #[must_use]
    pub fn new(provider: Arc<dyn SessionProvider>, config: EngineConfig) -> Self {
        Self {
            adapters: Vec::new(),
            provider,
            config,
        }
    }

    /// Register a source adapter. Source ids must be unique; the set
    /// of sources is fixed before the first run and read-only
    /// afterwards.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) -> Result<(), AggregateError> {
        if self.adapters.iter().any(|a| a.id() == adapter.id()) {
            return Err(AggregateError::DuplicateSource(adapter.id().to_string()));
        }
        info!(source = adapter.id(), "registered source");
        self.adapters.push(adapter);
        Ok(())
    }

    /// Ids of all registered sources, in registration order.
    #[must_use]
    pub fn source_ids(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    /// Check the query against every registered source before any
    /// browser work starts. A source requiring a field the query lacks
    /// is a configuration error, not a runtime failure.
    fn validate(&self, query: &Query) -> Result<(), AggregateError> {
        if self.adapters.is_empty() {
            return Err(AggregateError::NoSources);
        }
        if query.model.trim().is_empty() {
            return Err(AggregateError::InvalidQuery(
                "model must not be empty".to_string(),
            ));
        }
        for adapter in &self.adapters {
            if adapter.requires_brand() && query.brand().is_none() {
                return Err(AggregateError::InvalidQuery(format!(
                    "source `{}` requires a brand but none was given",
                    adapter.id()
                )));
            }
        }
        Ok(())
    }

    /// Produce a complete round result for `query`.
    ///
    /// Loops whole rounds until every source's result is non-empty,
    /// the round budget runs out, or `cancel` fires. The browser
    /// session acquired for a round is released on every exit path.
    pub async fn run(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<RoundResult, AggregateError> {
        self.validate(query)?;

        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let mut rounds = 0u32;
        let mut last_empty: Vec<String> = self
            .adapters
            .iter()
            .map(|a| a.id().to_string())
            .collect();

        loop {
            if cancel.is_cancelled() {
                return Err(AggregateError::Cancelled);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(AggregateError::Incomplete {
                        rounds,
                        empty_sources: last_empty,
                    });
                }
            }

            rounds += 1;
            let result = if self.config.parallel_sources {
                self.run_round_parallel(query, cancel, deadline).await?
            } else {
                self.run_round_sequential(query, cancel, deadline).await?
            };

            // A cancelled round yields partial results; surface the
            // cancellation instead of judging completeness on them.
            if cancel.is_cancelled() {
                return Err(AggregateError::Cancelled);
            }

            if result.is_complete() {
                info!(rounds, sources = result.len(), "aggregation complete");
                return Ok(result);
            }

            last_empty = result.empty_sources();
            warn!(
                round = rounds,
                empty = ?last_empty,
                "incomplete round, retrying"
            );

            if let Some(cap) = self.config.max_rounds {
                if rounds >= cap {
                    return Err(AggregateError::Incomplete {
                        rounds,
                        empty_sources: last_empty,
                    });
                }
            }

            self.round_pause(deadline, cancel).await?;
        }
    }

    /// Sleep between rounds, shortened by the deadline and interrupted
    /// by cancellation.
    async fn round_pause(
        &self,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<(), AggregateError> {
        let mut pause = self.config.round_delay;
        if let Some(deadline) = deadline {
            pause = pause.min(deadline.saturating_duration_since(Instant::now()));
        }
        tokio::select! {
            () = cancel.cancelled() => Err(AggregateError::Cancelled),
            () = tokio::time::sleep(pause) => Ok(()),
        }
    }

    /// One round over a single shared session, sources one after
    /// another. Cheaper than opening one session per source at the
    /// cost of head-of-line latency.
    async fn run_round_sequential(
        &self,
        query: &Query,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<RoundResult, AggregateError> {
        let session = self.provider.session().await?;
        let guard = SessionGuard::new(session, "round");

        let mut result = RoundResult::default();
        for adapter in &self.adapters {
            if cancel.is_cancelled() {
                break;
            }
            debug!(source = adapter.id(), "fetching source");
            let extraction =
                retry::fetch(adapter.as_ref(), guard.session(), query, cancel, deadline).await;
            result.insert(adapter.id(), extraction);
        }

        if let Err(e) = guard.close().await {
            warn!(error = %e, "failed to release round session");
        }
        Ok(result)
    }

    /// One round with each source in its own task against its own
    /// session, joined with a wait-all barrier. Sources are
    /// independent, so no coordination beyond the barrier is needed;
    /// the round is still only evaluated once every source has
    /// returned.
    async fn run_round_parallel(
        &self,
        query: &Query,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<RoundResult, AggregateError> {
        let handles: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| {
                let adapter = Arc::clone(adapter);
                let provider = Arc::clone(&self.provider);
                let query = query.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let session = provider.session().await?;
                    let guard = SessionGuard::new(session, adapter.id());
                    let extraction =
                        retry::fetch(adapter.as_ref(), guard.session(), &query, &cancel, deadline)
                            .await;
                    if let Err(e) = guard.close().await {
                        warn!(source = adapter.id(), error = %e, "failed to release session");
                    }
                    Ok::<_, AggregateError>((adapter.id().to_string(), extraction))
                })
            })
            .collect();

        let mut result = RoundResult::default();
        for handle in handles {
            let (id, extraction): (String, ExtractionResult) = handle
                .await
                .map_err(|e| {
                    AggregateError::Session(SessionError::Backend(format!(
                        "source task failed: {e}"
                    )))
                })??;
            result.insert(id, extraction);
        }
        Ok(result)
    }
}
