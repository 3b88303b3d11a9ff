//! Follows share links through HTTP redirects to their final destination.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};

use crate::error::ScraperError;
use crate::source::LinkResolver;

/// Stateless redirect follower.
///
/// Holds only a `reqwest::Client`, which is internally pooled and cheap to
/// clone, so one resolver can serve any number of concurrent lookups.
#[derive(Debug, Clone)]
pub struct RedirectResolver {
    client: Client,
}

impl RedirectResolver {
    /// Creates a resolver with a request timeout, redirect cap, browser-like
    /// `User-Agent` and a bounded idle connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        max_redirects: usize,
        user_agent: &str,
        pool_max_idle: usize,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .redirect(Policy::limited(max_redirects))
            .user_agent(user_agent)
            .pool_max_idle_per_host(pool_max_idle)
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client. The caller is responsible for its redirect
    /// and timeout policy.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Issues the GET and returns the URL the client landed on.
    ///
    /// The status of the final response is not inspected; an error page at the
    /// end of the chain still tells us where the link points.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`] if `url` is not an absolute URL.
    /// - [`ScraperError::Http`] on connect failure, timeout or too many redirects.
    pub async fn final_url(&self, url: &str) -> Result<String, ScraperError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ScraperError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        let response = self
            .client
            .get(parsed)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        tracing::debug!(
            url,
            final_url = %response.url(),
            status = response.status().as_u16(),
            "redirect chain resolved"
        );

        Ok(response.url().to_string())
    }
}

#[async_trait]
impl LinkResolver for RedirectResolver {
    async fn resolve(&self, url: &str) -> Option<String> {
        match self.final_url(url).await {
            Ok(final_url) => Some(final_url),
            Err(e) => {
                tracing::warn!(url, error = %e, "redirect resolution failed");
                None
            }
        }
    }
}
