//! iCarros adapter.
//!
//! iCarros has no stable search URL, so the adapter goes through the
//! portal home: type the model into the search field and submit, then
//! read the offer cards off the results page.

use async_trait::async_trait;
use std::time::Duration;

use super::extract::{self, LISTING_WAIT_TIMEOUT};
use super::SourceAdapter;
use crate::engine::{AttemptOutcome, FailureKind, Query, RetryPolicy};
use crate::session::BrowserSession;

/// Portal entry page carrying the search form.
const PORTAL_URL: &str = "https://www.icarros.com.br/principal/index.jsp";

/// Model search input on the portal home.
const SEARCH_INPUT: &str = "#modelo";

/// Submit button of the search form.
const SEARCH_SUBMIT: &str = "button[type='submit']";

/// One offer card header per listing on the results page.
const CONTAINER: &str = "div.offer-card__header";

/// Listing title within an offer card.
const NAME: &str = ".offer-card__title";

/// Price tag within an offer card.
const PRICE: &str = ".offer-card__price";

pub struct IcarrosAdapter {
    wait_timeout: Duration,
    retry: RetryPolicy,
}

impl IcarrosAdapter {
    #[must_use]
    pub fn new(wait_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            wait_timeout,
            retry,
        }
    }
}

impl Default for IcarrosAdapter {
    fn default() -> Self {
        Self::new(LISTING_WAIT_TIMEOUT, RetryPolicy::default())
    }
}

#[async_trait]
impl SourceAdapter for IcarrosAdapter {
    fn id(&self) -> &'static str {
        "icarros"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn attempt(&self, session: &dyn BrowserSession, query: &Query) -> AttemptOutcome {
        if let Err(e) = session.navigate(PORTAL_URL).await {
            return extract::retryable(&e);
        }

        // Portal search: type the model, submit the form.
        let input = match session.find_all(SEARCH_INPUT).await {
            Ok(mut elements) if !elements.is_empty() => elements.remove(0),
            Ok(_) => return AttemptOutcome::Retryable(FailureKind::ElementNotFound),
            Err(e) => return extract::retryable(&e),
        };
        if let Err(e) = input.send_keys(&query.model).await {
            return extract::retryable(&e);
        }

        let submit = match session.find_all(SEARCH_SUBMIT).await {
            Ok(mut elements) if !elements.is_empty() => elements.remove(0),
            Ok(_) => return AttemptOutcome::Retryable(FailureKind::ElementNotFound),
            Err(e) => return extract::retryable(&e),
        };
        if let Err(e) = submit.click().await {
            return extract::retryable(&e);
        }

        extract::collect_listings(session, CONTAINER, NAME, PRICE, self.wait_timeout).await
    }
}
