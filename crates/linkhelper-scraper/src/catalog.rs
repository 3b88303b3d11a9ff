//! Client for the storefront catalog API.
//!
//! Post pages list their products through
//! `getPostOrCollectionProducts`, so the purchase links can be read straight
//! from JSON without rendering the page.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::ScraperError;
use crate::pattern::catalog_id;
use crate::source::CatalogSource;

const PRODUCTS_ENDPOINT: &str = "getPostOrCollectionProducts";
const STOREFRONT_ORIGIN: &str = "https://www.wishlink.com";

#[derive(Debug, Deserialize)]
struct ProductsEnvelope {
    #[serde(default)]
    data: Option<ProductsData>,
}

#[derive(Debug, Deserialize)]
struct ProductsData {
    #[serde(default)]
    products: Vec<CatalogProduct>,
}

#[derive(Debug, Deserialize)]
struct CatalogProduct {
    #[serde(rename = "purchaseUrl", default)]
    purchase_url: Option<String>,
}

/// Catalog API client.
///
/// Use [`CatalogClient::new`] with the configured base URL; tests point the
/// base URL at a `wiremock` server.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    page_size: u32,
    timeout: Duration,
}

impl CatalogClient {
    /// Creates a client with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(
        base_url: &str,
        page_size: u32,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self::with_client(client, base_url, page_size, timeout_secs))
    }

    /// Reuses an existing client. The timeout is applied per request.
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, page_size: u32, timeout_secs: u64) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            page_size,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Builds the products URL for one post.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if the configured base URL does
    /// not parse.
    fn products_url(&self, post_id: &str) -> Result<Url, ScraperError> {
        let base = format!("{}/{PRODUCTS_ENDPOINT}", self.base_url);
        let mut url = Url::parse(&base).map_err(|e| ScraperError::InvalidUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("page", "1")
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("postType", "POST")
            .append_pair("postOrCollectionId", post_id)
            .append_pair("sourceApp", "STOREFRONT");
        Ok(url)
    }

    /// Fetches purchase URLs for `post_id`, in response order.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::Http`] on network failure or timeout.
    /// - [`ScraperError::UnexpectedStatus`] on any non-2xx status.
    /// - [`ScraperError::Deserialize`] if the body is not the expected JSON.
    pub async fn fetch_purchase_urls(&self, post_id: &str) -> Result<Vec<String>, ScraperError> {
        let url = self.products_url(post_id)?;

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::ORIGIN, STOREFRONT_ORIGIN)
            .header(reqwest::header::REFERER, format!("{STOREFRONT_ORIGIN}/"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        let envelope: ProductsEnvelope =
            serde_json::from_str(&body).map_err(|e| ScraperError::Deserialize {
                context: format!("catalog products for post {post_id}"),
                source: e,
            })?;

        Ok(envelope
            .data
            .map(|d| d.products)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.purchase_url)
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty())
            .collect())
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn extract_via_api(&self, page_url: &str) -> Vec<String> {
        let Some(post_id) = catalog_id(page_url) else {
            return Vec::new();
        };

        match self.fetch_purchase_urls(&post_id).await {
            Ok(urls) => {
                tracing::info!(
                    page_url,
                    post_id = %post_id,
                    count = urls.len(),
                    "catalog API lookup complete"
                );
                urls
            }
            Err(e) => {
                tracing::warn!(
                    page_url,
                    post_id = %post_id,
                    error = %e,
                    "catalog API lookup failed"
                );
                Vec::new()
            }
        }
    }
}
