//! Seams between the orchestrator and the things that touch the network.

use async_trait::async_trait;

use crate::error::ScraperError;

/// Follows a single URL to its final destination.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Returns the absolute URL of the final response, or `None` on any
    /// failure. Must not panic or propagate errors.
    async fn resolve(&self, url: &str) -> Option<String>;
}

/// Discovers candidate links by querying the remote catalog API.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Returns purchase URLs for the post encoded in `page_url`. An empty
    /// list covers both "not a catalog URL" and "lookup failed".
    async fn extract_via_api(&self, page_url: &str) -> Vec<String>;
}

/// Discovers candidate links by rendering the page.
#[async_trait]
pub trait PageLinkSource: Send + Sync {
    /// Returns absolute share links found on the rendered page.
    ///
    /// # Errors
    ///
    /// Any rendering failure, including timing out while waiting for the first
    /// share link, is an error and is distinct from an empty result.
    async fn extract(&self, page_url: &str) -> Result<Vec<String>, ScraperError>;
}
