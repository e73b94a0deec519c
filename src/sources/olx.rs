//! OLX adapter.
//!
//! URL search against the cars category; brand and model are combined
//! into one search term when the brand is present.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::extract::{self, LISTING_WAIT_TIMEOUT};
use super::SourceAdapter;
use crate::engine::{AttemptOutcome, FailureKind, Query, RetryPolicy};
use crate::session::BrowserSession;

const SEARCH_URL: &str = "https://www.olx.com.br/autos-e-pecas/carros-vans-e-utilitarios";

/// One ad card per listing.
const CONTAINER: &str = "section[data-ds-component='DS-AdCard']";

const NAME: &str = "h2";

const PRICE: &str = "h3";

pub struct OlxAdapter {
    wait_timeout: Duration,
    retry: RetryPolicy,
}

impl OlxAdapter {
    #[must_use]
    pub fn new(wait_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            wait_timeout,
            retry,
        }
    }

    fn search_term(query: &Query) -> String {
        match query.brand() {
            Some(brand) => format!("{brand} {}", query.model),
            None => query.model.clone(),
        }
    }
}

impl Default for OlxAdapter {
    fn default() -> Self {
        Self::new(LISTING_WAIT_TIMEOUT, RetryPolicy::default())
    }
}

#[async_trait]
impl SourceAdapter for OlxAdapter {
    fn id(&self) -> &'static str {
        "olx"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn attempt(&self, session: &dyn BrowserSession, query: &Query) -> AttemptOutcome {
        let mut url = match Url::parse(SEARCH_URL) {
            Ok(url) => url,
            Err(_) => return AttemptOutcome::Fatal(FailureKind::NavigationError),
        };
        url.query_pairs_mut()
            .append_pair("q", &Self::search_term(query));

        if let Err(e) = session.navigate(url.as_str()).await {
            return extract::retryable(&e);
        }

        extract::collect_listings(session, CONTAINER, NAME, PRICE, self.wait_timeout).await
    }
}
