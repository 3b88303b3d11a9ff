use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("rendering {url} failed: {reason}")]
    Render { url: String, reason: String },

    #[error("no share links appeared on {url} within {waited_secs}s")]
    MarkerTimeout { url: String, waited_secs: u64 },
}
