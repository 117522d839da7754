//! Error types for the panel controller

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("gesture script error: {0}")]
    Script(String),
}

pub type Result<T> = std::result::Result<T, PanelError>;
