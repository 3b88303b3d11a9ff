mod app_config;
mod config;
mod types;

pub use app_config::{AppConfig, BrowserSettings, Environment, PipelineConfig};
pub use config::{
    load_app_config, load_app_config_from_env, load_pipeline_config,
    load_pipeline_config_from_env,
};
pub use types::{ChatRef, FormatMode, FormattedReply, MessageRef, ResolutionJob, ResultSet};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
