//! Orchestrator-level error surface.
//!
//! Adapter failures never escape `attempt` and retry exhaustion never
//! escapes `fetch`; the variants here are the only failures a caller
//! of the aggregation engine can observe.

use crate::session::SessionError;
use thiserror::Error;

/// Errors surfaced by [`Aggregator::run`](crate::engine::Aggregator::run)
/// and by adapter registration.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The query cannot serve one of the registered sources. Detected
    /// before the first round; never a mid-round failure.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A source id was registered twice.
    #[error("source `{0}` is already registered")]
    DuplicateSource(String),

    /// `run` was called with no sources registered. An empty round is
    /// vacuously complete, so this is rejected up front instead of
    /// answering with an empty result.
    #[error("no sources registered")]
    NoSources,

    /// The round budget (cap or deadline) ran out before every source
    /// produced a non-empty result.
    #[error(
        "aggregation incomplete after {rounds} round(s); sources still empty: {}",
        empty_sources.join(", ")
    )]
    Incomplete {
        rounds: u32,
        empty_sources: Vec<String>,
    },

    /// The caller cancelled the run; in-flight adapter work was
    /// abandoned and the round's session released.
    #[error("aggregation cancelled")]
    Cancelled,

    /// A browser session could not be acquired for a round.
    #[error("browser session error: {0}")]
    Session(#[from] SessionError),
}
