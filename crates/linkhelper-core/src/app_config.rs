use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Headless browser settings for the page link extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserSettings {
    /// Explicit Chromium/Chrome executable. `None` lets the driver discover one.
    pub chrome_path: Option<PathBuf>,
    /// Pass `--no-sandbox` to Chromium. Needed in most unprivileged containers.
    pub no_sandbox: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// How long to wait for the first share link to appear after navigation.
    pub wait_timeout_secs: u64,
}

/// Everything the resolution pipeline needs. Contains no secrets, so the CLI
/// can load it without a bot token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub user_agent: String,
    pub http_pool_max_idle: usize,
    pub resolver_timeout_secs: u64,
    pub resolver_max_redirects: usize,
    pub resolver_max_concurrency: usize,
    pub catalog_base_url: String,
    pub catalog_page_size: u32,
    pub catalog_timeout_secs: u64,
    pub browser: BrowserSettings,
}

#[derive(Clone)]
pub struct AppConfig {
    pub telegram_token: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub workers: usize,
    pub queue_capacity: usize,
    pub shutdown_drain_secs: u64,
    pub telegram_pool_max_idle: usize,
    pub pipeline: PipelineConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_token", &"[redacted]")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("shutdown_drain_secs", &self.shutdown_drain_secs)
            .field("telegram_pool_max_idle", &self.telegram_pool_max_idle)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
