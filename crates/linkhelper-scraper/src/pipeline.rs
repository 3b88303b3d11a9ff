//! Resolution pipeline: pick a discovery strategy, resolve every candidate
//! concurrently, and collapse the results into an ordered [`ResultSet`].

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use linkhelper_core::{PipelineConfig, ResultSet};
use reqwest::{redirect::Policy, Client};

use crate::catalog::CatalogClient;
use crate::error::ScraperError;
use crate::page::BrowserExtractor;
use crate::pattern::{catalog_id, is_share_link};
use crate::redirect::RedirectResolver;
use crate::source::{CatalogSource, LinkResolver, PageLinkSource};

/// How candidates for a source URL were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The source URL is already a share link.
    Direct,
    /// The storefront catalog API listed the post's products.
    Catalog,
    /// A headless browser rendered the page and its share anchors were read.
    Page,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Direct => write!(f, "direct"),
            Strategy::Catalog => write!(f, "catalog"),
            Strategy::Page => write!(f, "page"),
        }
    }
}

/// Result of the discovery phase.
#[derive(Debug)]
pub enum Discovery {
    Candidates {
        strategy: Strategy,
        links: Vec<String>,
    },
    Failed(ScraperError),
}

/// Final result of one pipeline run.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Discovery worked. The set may be empty.
    Found(ResultSet),
    /// The page could not be rendered or never showed any share link.
    DiscoveryFailed { reason: String },
}

/// Turns one user-supplied URL into the ordered set of final destinations.
///
/// Holds its sources behind traits so tests can swap in fakes.
pub struct Pipeline {
    resolver: Arc<dyn LinkResolver>,
    catalog: Arc<dyn CatalogSource>,
    pages: Arc<dyn PageLinkSource>,
    max_concurrency: usize,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn LinkResolver>,
        catalog: Arc<dyn CatalogSource>,
        pages: Arc<dyn PageLinkSource>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            catalog,
            pages,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Wires the production resolver, catalog client and browser extractor
    /// around one shared, pool-bounded HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.resolver_timeout_secs))
            .connect_timeout(Duration::from_secs(config.resolver_timeout_secs.min(10)))
            .redirect(Policy::limited(config.resolver_max_redirects))
            .user_agent(&config.user_agent)
            .pool_max_idle_per_host(config.http_pool_max_idle)
            .build()?;

        let resolver = RedirectResolver::with_client(client.clone());
        let catalog = CatalogClient::with_client(
            client,
            &config.catalog_base_url,
            config.catalog_page_size,
            config.catalog_timeout_secs,
        );
        let pages = BrowserExtractor::new(config.browser.clone(), &config.user_agent);

        Ok(Self::new(
            Arc::new(resolver),
            Arc::new(catalog),
            Arc::new(pages),
            config.resolver_max_concurrency,
        ))
    }

    /// Finds candidate links for `source_url` without resolving them.
    pub async fn discover(&self, source_url: &str) -> Discovery {
        if is_share_link(source_url) {
            return Discovery::Candidates {
                strategy: Strategy::Direct,
                links: vec![source_url.to_owned()],
            };
        }

        if catalog_id(source_url).is_some() {
            let links = self.catalog.extract_via_api(source_url).await;
            if !links.is_empty() {
                return Discovery::Candidates {
                    strategy: Strategy::Catalog,
                    links,
                };
            }
            tracing::info!(
                source_url,
                "catalog lookup returned nothing; falling back to page rendering"
            );
        }

        match self.pages.extract(source_url).await {
            Ok(links) => Discovery::Candidates {
                strategy: Strategy::Page,
                links,
            },
            Err(e) => Discovery::Failed(e),
        }
    }

    /// Resolves `candidates` with bounded concurrency.
    ///
    /// Results are taken in candidate order, failures are dropped, and only
    /// the first occurrence of each final URL is kept.
    pub async fn resolve_all(&self, candidates: Vec<String>) -> ResultSet {
        let resolver = &self.resolver;
        let resolved: Vec<Option<String>> = stream::iter(candidates)
            .map(|candidate| async move { resolver.resolve(&candidate).await })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut results = ResultSet::new();
        for link in resolved.into_iter().flatten() {
            if url::Url::parse(&link).is_err() {
                tracing::warn!(link = %link, "dropping non-absolute resolved link");
                continue;
            }
            results.insert(link);
        }
        results
    }

    /// Runs discovery then resolution for one source URL.
    pub async fn run(&self, source_url: &str) -> Outcome {
        match self.discover(source_url).await {
            Discovery::Failed(e) => {
                tracing::warn!(source_url, error = %e, "link discovery failed");
                Outcome::DiscoveryFailed {
                    reason: e.to_string(),
                }
            }
            Discovery::Candidates { strategy, links } => {
                let candidates = links.len();
                let results = self.resolve_all(links).await;
                tracing::info!(
                    source_url,
                    %strategy,
                    candidates,
                    resolved = results.len(),
                    "pipeline run complete"
                );
                Outcome::Found(results)
            }
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
