//! Error types for CoinForge

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CfError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Module error: {0}")]
    Module(String),

    #[error("Hook error in {module}:{hook}: {message}")]
    Hook {
        module: String,
        hook: String,
        message: String,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Scene error: {0}")]
    Scene(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CfError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias
pub type CfResult<T> = Result<T, CfError>;
