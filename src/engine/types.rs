//! Core value types for the aggregation engine.
//!
//! This module contains the fundamental types passed between adapters,
//! the retry controller and the orchestrator: the query, the extracted
//! listing records and the attempt/round result structures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Immutable search input for one aggregation run.
///
/// Some sources search by model alone, others need the brand as well.
/// Whether a registered source can be served by a given query is
/// checked by the orchestrator before the first round starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub brand: Option<String>,
    pub model: String,
}

impl Query {
    /// Create a model-only query.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            brand: None,
            model: model.into(),
        }
    }

    /// Attach a brand to the query.
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Brand as a borrowed string, if present and non-blank.
    #[must_use]
    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }
}

/// One (name, price) listing pair extracted from a single container
/// element.
///
/// Both halves are non-empty by construction: a record is only ever
/// built as a whole pair, never assembled from independently collected
/// name and price lists. The price is the matched text verbatim; no
/// numeric parsing is performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    name: String,
    price: String,
}

impl Record {
    /// Build a record from raw extracted text.
    ///
    /// Returns `None` when either half is blank after trimming, so a
    /// container missing one half never produces a lone-name or
    /// lone-price record.
    #[must_use]
    pub fn new(name: &str, price: &str) -> Option<Self> {
        let name = name.trim();
        let price = price.trim();
        if name.is_empty() || price.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            price: price.to_string(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn price(&self) -> &str {
        &self.price
    }
}

/// Ordered sequence of records produced by one source on one attempt.
///
/// Empty means "this attempt found no usable data". That is not an
/// error by itself, it only fails the orchestrator's completeness
/// test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult(Vec<Record>);

impl ExtractionResult {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self(records)
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Record>> for ExtractionResult {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}

impl<'a> IntoIterator for &'a ExtractionResult {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Categorizes attempt failures for retry decisions.
///
/// Every kind observed against real sites is transient in principle,
/// so the retry controller treats all of them as retryable when an
/// adapter reports them through [`AttemptOutcome::Retryable`]. An
/// adapter that knows an attempt can never succeed (for example a URL
/// it cannot construct) reports the kind through
/// [`AttemptOutcome::Fatal`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The expected container query did not appear within the wait
    /// timeout.
    Timeout,
    /// The container list itself went stale before it could be walked.
    StaleList,
    /// A single element handle went stale mid-read.
    StaleElement,
    /// A required sub-query had no match.
    ElementNotFound,
    /// The page failed to load.
    NavigationError,
    /// Anything else; logged at higher severity than the kinds above.
    Unclassified,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout waiting for listings"),
            Self::StaleList => write!(f, "listing container list went stale"),
            Self::StaleElement => write!(f, "element went stale"),
            Self::ElementNotFound => write!(f, "required element not found"),
            Self::NavigationError => write!(f, "page navigation failed"),
            Self::Unclassified => write!(f, "unclassified failure"),
        }
    }
}

/// Outcome of one adapter attempt.
///
/// This is the only channel through which adapters communicate with
/// the retry controller; session errors never escape `attempt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Extraction ran to completion, possibly with zero records.
    Success(ExtractionResult),
    /// The attempt failed in a way a fresh attempt might fix.
    Retryable(FailureKind),
    /// The attempt can never succeed; retrying is pointless.
    Fatal(FailureKind),
}

/// Per-source results of one aggregation round, keyed by source id.
///
/// Serializes as a JSON object mapping source id to its record array.
/// `BTreeMap` keeps the key order deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoundResult(BTreeMap<String, ExtractionResult>);

impl RoundResult {
    pub fn insert(&mut self, source: impl Into<String>, result: ExtractionResult) {
        self.0.insert(source.into(), result);
    }

    #[must_use]
    pub fn get(&self, source: &str) -> Option<&ExtractionResult> {
        self.0.get(source)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A round is complete iff every source's result is non-empty.
    /// This is the sole termination condition of the round loop.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.0.values().all(|r| !r.is_empty())
    }

    /// Ids of sources whose result is still empty, in key order.
    #[must_use]
    pub fn empty_sources(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, r)| r.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtractionResult)> {
        self.0.iter()
    }
}
