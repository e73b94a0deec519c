//! Multi-source retrieval orchestration engine.
//!
//! The core of the service: the per-source retry state machine, the
//! failure taxonomy it recognizes, and the round-based aggregation
//! policy deciding when a response is complete versus when the whole
//! cycle restarts.

pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod types;

pub use error::AggregateError;
pub use orchestrator::Aggregator;
pub use retry::{fetch, RetryPolicy};
pub use types::{AttemptOutcome, ExtractionResult, FailureKind, Query, Record, RoundResult};
