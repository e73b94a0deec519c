//! Autoline adapter.
//!
//! Straight URL search with a query parameter; Autoline matches on the
//! model alone.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::extract::{self, LISTING_WAIT_TIMEOUT};
use super::SourceAdapter;
use crate::engine::{AttemptOutcome, FailureKind, Query, RetryPolicy};
use crate::session::BrowserSession;

const SEARCH_URL: &str = "https://www.autoline.com.br/carros";

/// One announcement card per listing.
const CONTAINER: &str = "div[class*='announcement-card']";

const NAME: &str = "h3[class*='announcement-card__title']";

const PRICE: &str = "div[class*='announcement-card__price']";

pub struct AutolineAdapter {
    wait_timeout: Duration,
    retry: RetryPolicy,
}

impl AutolineAdapter {
    #[must_use]
    pub fn new(wait_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            wait_timeout,
            retry,
        }
    }
}

impl Default for AutolineAdapter {
    fn default() -> Self {
        Self::new(LISTING_WAIT_TIMEOUT, RetryPolicy::default())
    }
}

#[async_trait]
impl SourceAdapter for AutolineAdapter {
    fn id(&self) -> &'static str {
        "autoline"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn attempt(&self, session: &dyn BrowserSession, query: &Query) -> AttemptOutcome {
        let mut url = match Url::parse(SEARCH_URL) {
            Ok(url) => url,
            Err(_) => return AttemptOutcome::Fatal(FailureKind::NavigationError),
        };
        url.query_pairs_mut().append_pair("q", &query.model);

        if let Err(e) = session.navigate(url.as_str()).await {
            return extract::retryable(&e);
        }

        extract::collect_listings(session, CONTAINER, NAME, PRICE, self.wait_timeout).await
    }
}
