//! Share-link discovery by rendering the page in headless Chromium.
//!
//! Storefront pages insert their share links client-side, so the initial
//! HTML is usually empty of them. Each call launches its own browser
//! process with a private profile directory and tears it down afterwards.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use linkhelper_core::BrowserSettings;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::error::ScraperError;
use crate::pattern::{absolutize_hrefs, SHARE_LINK_SELECTOR};
use crate::source::PageLinkSource;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Renders pages and collects `a[href*='/share/']` links.
#[derive(Debug, Clone)]
pub struct BrowserExtractor {
    settings: BrowserSettings,
    user_agent: String,
}

/// A launched browser plus the task pumping its CDP event stream.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
}

impl BrowserSession {
    /// Closes the browser and waits for the process to exit. Never fails;
    /// problems are logged. If this is never reached (task aborted or
    /// panicked) dropping `Browser` kills the child process.
    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "failed to close browser cleanly");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!(error = %e, "failed to reap browser process");
        }
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            tracing::debug!(
                dir = %self.profile_dir.display(),
                error = %e,
                "could not remove browser profile directory"
            );
        }
    }
}

impl BrowserExtractor {
    #[must_use]
    pub fn new(settings: BrowserSettings, user_agent: &str) -> Self {
        Self {
            settings,
            user_agent: user_agent.to_owned(),
        }
    }

    fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.wait_timeout_secs)
    }

    fn browser_config(&self, profile_dir: PathBuf) -> Result<BrowserConfig, ScraperError> {
        let mut builder = BrowserConfig::builder()
            .viewport(Viewport {
                width: self.settings.viewport_width,
                height: self.settings.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .window_size(self.settings.viewport_width, self.settings.viewport_height)
            .request_timeout(self.wait_timeout())
            .user_data_dir(profile_dir)
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");

        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(path) = &self.settings.chrome_path {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(ScraperError::BrowserLaunch)
    }

    async fn launch(&self) -> Result<BrowserSession, ScraperError> {
        let profile_dir = unique_profile_dir();
        let config = self.browser_config(profile_dir.clone())?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScraperError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser event handler error");
                }
            }
        });

        Ok(BrowserSession {
            browser,
            handler,
            profile_dir,
        })
    }

    /// Launches a browser, collects share links from `page_url`, and closes
    /// the browser on every path out.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`] if `page_url` is not absolute.
    /// - [`ScraperError::BrowserLaunch`] if Chromium cannot be started.
    /// - [`ScraperError::Render`] if navigation or a DOM query fails.
    /// - [`ScraperError::MarkerTimeout`] if no share link appears in time.
    pub async fn extract_share_links(&self, page_url: &str) -> Result<Vec<String>, ScraperError> {
        let base = Url::parse(page_url).map_err(|e| ScraperError::InvalidUrl {
            url: page_url.to_owned(),
            reason: e.to_string(),
        })?;

        tracing::info!(page_url, "launching browser for share-link discovery");
        let session = self.launch().await?;
        let result = self.collect(&session.browser, &base).await;
        session.close().await;

        if let Ok(links) = &result {
            tracing::info!(page_url, count = links.len(), "share links found via browser");
        }
        result
    }

    async fn collect(&self, browser: &Browser, base: &Url) -> Result<Vec<String>, ScraperError> {
        let wait = self.wait_timeout();
        let deadline = Instant::now() + wait;

        let page = match tokio::time::timeout(wait, browser.new_page(base.as_str())).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                return Err(ScraperError::Render {
                    url: base.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ScraperError::MarkerTimeout {
                    url: base.to_string(),
                    waited_secs: self.settings.wait_timeout_secs,
                })
            }
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        poll_share_links(base, remaining, self.settings.wait_timeout_secs, || {
            share_hrefs(&page)
        })
        .await
    }
}

/// Runs `query` every [`POLL_INTERVAL`] until it reports share anchors or
/// `wait` runs out. The query is always run at least once.
async fn poll_share_links<F, Fut, E>(
    base: &Url,
    wait: Duration,
    waited_secs: u64,
    mut query: F,
) -> Result<Vec<String>, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<Vec<String>>, E>>,
    E: std::fmt::Display,
{
    let deadline = Instant::now() + wait;
    loop {
        let hrefs = query().await.map_err(|e| ScraperError::Render {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        if let Some(hrefs) = hrefs {
            return Ok(absolutize_hrefs(base, hrefs));
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ScraperError::MarkerTimeout {
                url: base.to_string(),
                waited_secs,
            });
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Returns `None` while no share anchors exist yet, otherwise the raw href
/// of every matching anchor.
async fn share_hrefs(page: &Page) -> Result<Option<Vec<String>>, chromiumoxide::error::CdpError> {
    let elements = page.find_elements(SHARE_LINK_SELECTOR).await?;
    if elements.is_empty() {
        return Ok(None);
    }
    let mut hrefs = Vec::with_capacity(elements.len());
    for element in &elements {
        if let Some(href) = element.attribute("href").await? {
            hrefs.push(href);
        }
    }
    Ok(Some(hrefs))
}

fn unique_profile_dir() -> PathBuf {
    let id: u64 = rand::random();
    std::env::temp_dir().join(format!("linkhelper-browser-{id:016x}"))
}

#[async_trait]
impl PageLinkSource for BrowserExtractor {
    /// Runs the browser work on its own task so a slow or stuck render never
    /// holds up the caller's executor thread.
    async fn extract(&self, page_url: &str) -> Result<Vec<String>, ScraperError> {
        let extractor = self.clone();
        let url = page_url.to_owned();
        tokio::spawn(async move { extractor.extract_share_links(&url).await })
            .await
            .map_err(|e| ScraperError::Render {
                url: page_url.to_owned(),
                reason: format!("extraction task failed: {e}"),
            })?
    }
}
