//! Error types for the head daemon.

use thiserror::Error;

/// Head daemon error type
#[derive(Error, Debug)]
pub enum HeadError {
    #[error(transparent)]
    Core(#[from] theia_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for HeadError {
    fn from(e: toml::de::Error) -> Self {
        HeadError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HeadError>;
