//! Multi-source vehicle listing aggregation.
//!
//! Drives several structurally different marketplace sites through a
//! headless browser session, extracts (name, price) listing records
//! from each, and returns a single consolidated response once every
//! configured source has produced a non-empty result set.
//!
//! The interesting part is the [`engine`]: the per-source retry state
//! machine, the failure taxonomy, and the round-based completion
//! policy. The browser backend ([`session`]), the site adapters
//! ([`sources`]) and the HTTP surface ([`api`]) are collaborators
//! around that core.

pub mod api;
pub mod config;
pub mod engine;
pub mod session;
pub mod sources;

pub use config::{EngineConfig, ServerConfig};
pub use engine::{
    AggregateError, Aggregator, AttemptOutcome, ExtractionResult, FailureKind, Query, Record,
    RetryPolicy, RoundResult,
};
pub use session::{
    BrowserSession, ChromeSessionProvider, DomElement, SessionError, SessionGuard,
    SessionProvider, SessionResult,
};
pub use sources::SourceAdapter;
