//! Napista adapter.
//!
//! Napista searches by URL path built from brand and model, so this is
//! the one source that cannot be served by a model-only query.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use super::extract::{self, LISTING_WAIT_TIMEOUT};
use super::SourceAdapter;
use crate::engine::{AttemptOutcome, FailureKind, Query, RetryPolicy};
use crate::session::BrowserSession;

const BASE_URL: &str = "https://napista.com.br";

/// One card per listing on the search results page.
const CONTAINER: &str = "div[class*='vehicle-card']";

const NAME: &str = "h2[class*='vehicle-card__name']";

const PRICE: &str = "span[class*='vehicle-card__price']";

pub struct NapistaAdapter {
    wait_timeout: Duration,
    retry: RetryPolicy,
}

impl NapistaAdapter {
    #[must_use]
    pub fn new(wait_timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            wait_timeout,
            retry,
        }
    }

    /// Search URL of the form `/busca/<brand>-<model>`, both halves
    /// slugged the way the site expects.
    fn search_url(brand: &str, model: &str) -> Result<Url, url::ParseError> {
        let slug = format!("{}-{}", slugify(brand), slugify(model));
        let mut url = Url::parse(BASE_URL)?;
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push("busca")
            .push(&slug);
        Ok(url)
    }
}

/// Lowercase and join whitespace runs with hyphens.
fn slugify(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

impl Default for NapistaAdapter {
    fn default() -> Self {
        Self::new(LISTING_WAIT_TIMEOUT, RetryPolicy::default())
    }
}

#[async_trait]
impl SourceAdapter for NapistaAdapter {
    fn id(&self) -> &'static str {
        "napista"
    }

    fn requires_brand(&self) -> bool {
        true
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn attempt(&self, session: &dyn BrowserSession, query: &Query) -> AttemptOutcome {
        // The orchestrator validates brand presence at registration
        // scope; an empty brand here means the adapter was driven
        // outside the engine, and no retry can fix the URL.
        let Some(brand) = query.brand() else {
            return AttemptOutcome::Fatal(FailureKind::NavigationError);
        };
        let url = match Self::search_url(brand, &query.model) {
            Ok(url) => url,
            Err(_) => return AttemptOutcome::Fatal(FailureKind::NavigationError),
        };

        if let Err(e) = session.navigate(url.as_str()).await {
            return extract::retryable(&e);
        }

        extract::collect_listings(session, CONTAINER, NAME, PRICE, self.wait_timeout).await
    }
}
