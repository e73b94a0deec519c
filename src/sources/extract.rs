//! Shared extraction flow for listing pages.
//!
//! Every site follows the same shape once navigation is done: wait for
//! the listing containers to render, walk them, and pull a name and a
//! price out of each. Pairing is strictly per container: a container
//! missing either half is skipped whole, so a skipped element can
//! never shift names against prices.

use std::time::Duration;
use tracing::debug;

use crate::engine::{AttemptOutcome, ExtractionResult, FailureKind, Record};
use crate::session::{BrowserSession, DomElement, SessionError};

/// How long to wait for the listing containers to appear before the
/// attempt counts as timed out.
pub const LISTING_WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Turn a session error from an attempt-level operation into the
/// matching retryable outcome.
#[must_use]
pub fn retryable(err: &SessionError) -> AttemptOutcome {
    AttemptOutcome::Retryable(err.failure_kind())
}

/// Wait for the container query, walk the matched containers and pair
/// a record out of each.
///
/// Outcomes:
/// - container query absent within `wait_timeout` → `Retryable(Timeout)`
/// - container list itself stale → `Retryable(StaleList)`
/// - a single container stale or missing a half → that container is
///   skipped, the attempt continues
/// - otherwise → `Success`, with zero records being a legitimate
///   result (it only fails the orchestrator's completeness test)
pub async fn collect_listings(
    session: &dyn BrowserSession,
    container_query: &str,
    name_query: &str,
    price_query: &str,
    wait_timeout: Duration,
) -> AttemptOutcome {
    match session.wait_for(container_query, wait_timeout).await {
        Ok(true) => {}
        Ok(false) => return AttemptOutcome::Retryable(FailureKind::Timeout),
        Err(e) => return retryable(&e),
    }

    let containers = match session.find_all(container_query).await {
        Ok(elements) => elements,
        Err(SessionError::Stale) => {
            return AttemptOutcome::Retryable(FailureKind::StaleList);
        }
        Err(e) => return retryable(&e),
    };

    let mut records = Vec::with_capacity(containers.len());
    for (index, container) in containers.iter().enumerate() {
        match extract_pair(container.as_ref(), name_query, price_query).await {
            Ok(Some(record)) => records.push(record),
            Ok(None) => debug!(index, "container skipped: name or price missing"),
            Err(SessionError::Stale) => {
                debug!(index, "container went stale mid-read, skipping");
            }
            Err(e) => debug!(index, error = %e, "container unreadable, skipping"),
        }
    }

    AttemptOutcome::Success(ExtractionResult::new(records))
}

/// Extract at most one record from a single container.
///
/// `Ok(None)` when either sub-query misses or matches blank text; the
/// record is never backfilled from a different container.
async fn extract_pair(
    container: &dyn DomElement,
    name_query: &str,
    price_query: &str,
) -> Result<Option<Record>, SessionError> {
    let Some(name_el) = container.find_one(name_query).await? else {
        return Ok(None);
    };
    let Some(price_el) = container.find_one(price_query).await? else {
        return Ok(None);
    };
    let name = name_el.text().await?;
    let price = price_el.text().await?;
    Ok(Record::new(&name, &price))
}
