use std::env::VarError;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use crate::app_config::{AppConfig, BrowserSettings, Environment, PipelineConfig};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

const DEFAULT_CATALOG_BASE_URL: &str = "https://api.wishlink.com/api/store";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Load only the pipeline settings, after loading `.env`. No token required.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_pipeline_config() -> Result<PipelineConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_pipeline_config_from_env()
}

/// Load only the pipeline settings from the current process environment.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_pipeline_config_from_env() -> Result<PipelineConfig, ConfigError> {
    build_pipeline_config(&|key| std::env::var(key))
}

fn or_default<F>(lookup: &F, var: &str, default: &str) -> String
where
    F: Fn(&str) -> Result<String, VarError>,
{
    lookup(var).unwrap_or_else(|_| default.to_string())
}

fn parse_or<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr,
    T::Err: Display,
{
    let raw = or_default(lookup, var, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Like [`parse_or`] but rejects zero, for sizes and timeouts that make
/// no sense at zero.
fn parse_nonzero<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
    T: FromStr + Default + PartialEq,
    T::Err: Display,
{
    let value: T = parse_or(lookup, var, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_flag<F>(lookup: &F, var: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let raw = or_default(lookup, var, "false");
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got \"{other}\""),
        }),
    }
}

fn build_pipeline_config<F>(lookup: &F) -> Result<PipelineConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let chrome_path = lookup("LINKHELPER_BROWSER_CHROME_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let browser = BrowserSettings {
        chrome_path,
        no_sandbox: parse_flag(lookup, "LINKHELPER_BROWSER_NO_SANDBOX")?,
        viewport_width: parse_or(lookup, "LINKHELPER_BROWSER_VIEWPORT_WIDTH", "1920")?,
        viewport_height: parse_or(lookup, "LINKHELPER_BROWSER_VIEWPORT_HEIGHT", "1080")?,
        wait_timeout_secs: parse_nonzero(lookup, "LINKHELPER_BROWSER_WAIT_SECS", "30")?,
    };

    let catalog_base_url = or_default(lookup, "LINKHELPER_CATALOG_BASE_URL", DEFAULT_CATALOG_BASE_URL)
        .trim_end_matches('/')
        .to_string();

    Ok(PipelineConfig {
        user_agent: or_default(lookup, "LINKHELPER_USER_AGENT", DEFAULT_USER_AGENT),
        http_pool_max_idle: parse_or(lookup, "LINKHELPER_HTTP_POOL_MAX_IDLE", "20")?,
        resolver_timeout_secs: parse_nonzero(lookup, "LINKHELPER_RESOLVER_TIMEOUT_SECS", "15")?,
        resolver_max_redirects: parse_or(lookup, "LINKHELPER_RESOLVER_MAX_REDIRECTS", "10")?,
        resolver_max_concurrency: parse_nonzero(
            lookup,
            "LINKHELPER_RESOLVER_MAX_CONCURRENCY",
            "16",
        )?,
        catalog_base_url,
        catalog_page_size: parse_nonzero(lookup, "LINKHELPER_CATALOG_PAGE_SIZE", "50")?,
        catalog_timeout_secs: parse_nonzero(lookup, "LINKHELPER_CATALOG_TIMEOUT_SECS", "20")?,
        browser,
    })
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it from a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let telegram_token = lookup("TELEGRAM_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_TOKEN".to_string()))?;

    let env = parse_environment(&or_default(&lookup, "LINKHELPER_ENV", "development"));

    let host: IpAddr = parse_or(&lookup, "LINKHELPER_HOST", "0.0.0.0")?;
    let port: u16 = parse_or(&lookup, "PORT", "8000")?;

    Ok(AppConfig {
        telegram_token,
        env,
        bind_addr: SocketAddr::new(host, port),
        log_level: or_default(&lookup, "LINKHELPER_LOG_LEVEL", "info"),
        workers: parse_nonzero(&lookup, "LINKHELPER_WORKERS", "1")?,
        queue_capacity: parse_nonzero(&lookup, "LINKHELPER_QUEUE_CAPACITY", "100")?,
        shutdown_drain_secs: parse_or(&lookup, "LINKHELPER_SHUTDOWN_DRAIN_SECS", "30")?,
        telegram_pool_max_idle: parse_or(&lookup, "LINKHELPER_TELEGRAM_POOL_MAX_IDLE", "20")?,
        pipeline: build_pipeline_config(&lookup)?,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
