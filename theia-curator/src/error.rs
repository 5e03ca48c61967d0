//! Error types for the curator.

use thiserror::Error;

/// Curator error type
#[derive(Error, Debug)]
pub enum CuratorError {
    #[error(transparent)]
    Core(#[from] theia_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for CuratorError {
    fn from(e: toml::de::Error) -> Self {
        CuratorError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CuratorError>;
